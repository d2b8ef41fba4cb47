use forkline_types::{ActivityEntry, ActivityKind, truncate_chars};

/// One message listing a batch of tool calls, one line per tool
pub fn render_tool_batch(entries: &[ActivityEntry]) -> String {
    entries
        .iter()
        .filter(|entry| entry.is_tool())
        .map(render_tool_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_tool_line(entry: &ActivityEntry) -> String {
    let marker = match (entry.kind, entry.is_error) {
        (ActivityKind::ToolComplete, false) => "✓",
        (ActivityKind::ToolComplete, true) => "✗",
        _ => "…",
    };
    let tool = entry.tool.as_deref().unwrap_or("tool");

    let mut line = format!("{} *{}*", marker, tool);
    if let Some(input) = &entry.tool_input {
        line.push_str(&format!(" `{}`", input));
    }
    if let Some(ms) = entry.duration_ms {
        line.push_str(&format!(" ({})", format_duration(ms)));
    }
    line
}

fn format_duration(ms: u64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else {
        format!("{:.1}s", ms as f64 / 1_000.0)
    }
}

/// Rolling thinking message, clipped to `limit` characters of content
pub fn render_thinking(content: &str, limit: usize) -> String {
    format!(
        "_Thinking_ ({} chars)\n{}",
        content.chars().count(),
        truncate_chars(content.trim(), limit)
    )
}

pub fn render_user_message(text: &str) -> String {
    format!("*User:* {}", text)
}
