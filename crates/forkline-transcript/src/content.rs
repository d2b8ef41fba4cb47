use serde_json::Value;

const TARGET_WIDTH: usize = 60;

/// Input fields that name what a tool acts on, in precedence order.
/// `file_path` wins over `path` when a tool input carries both.
const TARGET_FIELDS: &[&str] = &[
    "file_path",
    "notebook_path",
    "path",
    "command",
    "pattern",
    "url",
    "query",
    "description",
];

/// The raw target value of a tool call, untruncated
pub fn tool_target(input: &Value) -> Option<&str> {
    TARGET_FIELDS.iter().find_map(|field| {
        input
            .get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    })
}

/// One-line summary of a tool call's input, e.g. `src/main.rs` or `cargo test`
pub fn summarize_tool_input(input: &Value) -> Option<String> {
    let target = tool_target(input)?;
    let first_line = target.lines().next().unwrap_or(target);
    let mut summary: String = first_line.chars().take(TARGET_WIDTH).collect();
    if first_line.chars().count() > TARGET_WIDTH || first_line.len() < target.len() {
        summary.push('…');
    }
    Some(summary)
}
