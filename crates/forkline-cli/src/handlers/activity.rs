use crate::types::OutputFormat;
use anyhow::Result;
use chrono::{DateTime, Utc};
use forkline_runtime::Workspace;
use forkline_types::{ActivityEntry, ActivityKind, ConversationKey};

pub fn handle(
    workspace: &Workspace,
    key: &ConversationKey,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let mut entries = workspace.activity_log().read(key)?;
    if let Some(limit) = limit {
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            if entries.is_empty() {
                println!("No activity for {}", key);
            }
            for entry in &entries {
                println!("{}", format_entry(entry));
            }
        }
    }
    Ok(())
}

fn format_entry(entry: &ActivityEntry) -> String {
    let time = DateTime::<Utc>::from_timestamp_millis(entry.timestamp)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());

    let detail = match entry.kind {
        ActivityKind::Starting => "starting".to_string(),
        ActivityKind::Generating => match entry.char_count {
            Some(count) => format!("generating ({} chars)", count),
            None => "generating".to_string(),
        },
        ActivityKind::Thinking => format!(
            "thinking ({} chars)",
            entry.char_count.unwrap_or_default()
        ),
        ActivityKind::ToolStart | ActivityKind::ToolComplete => {
            let mut line = entry.tool.clone().unwrap_or_else(|| "tool".to_string());
            if let Some(input) = &entry.tool_input {
                line.push_str(&format!(" {}", input));
            }
            if let Some(ms) = entry.duration_ms {
                line.push_str(&format!(" ({}ms)", ms));
            }
            if entry.is_error {
                line.push_str(" [error]");
            }
            line
        }
    };

    match &entry.thread_message_link {
        Some(link) => format!("{}  {}  {}", time, detail, link),
        None => format!("{}  {}", time, detail),
    }
}
