use crate::types::OutputFormat;
use anyhow::Result;
use forkline_runtime::Workspace;
use serde_json::json;

pub fn handle(
    workspace: &Workspace,
    channel_id: &str,
    anchor_ts: &str,
    format: OutputFormat,
) -> Result<()> {
    let point = workspace.store().find_fork_point(channel_id, anchor_ts);

    match format {
        OutputFormat::Json => {
            let value = json!({
                "channelId": channel_id,
                "anchorTs": anchor_ts,
                "forkPoint": point,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Plain => match point {
            Some(point) => {
                println!("session: {}", point.session_id);
                println!("message: {}", point.message_id);
            }
            None => println!("No fork point for {} in {}", anchor_ts, channel_id),
        },
    }
    Ok(())
}
