//! Sub-turn activity: batching tool calls, rolling thinking messages and
//! rate limiting of surface writes.

mod batcher;
mod render;
mod throttle;

pub use batcher::{ActivityBatcher, TurnState};
pub use render::{render_thinking, render_tool_batch, render_user_message};
pub use throttle::Throttle;
