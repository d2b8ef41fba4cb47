pub mod activity;
pub mod conversation;
pub mod mapping;
pub mod session;
mod util;

pub use activity::{ActivityEntry, ActivityKind};
pub use conversation::ConversationKey;
pub use mapping::{ForkPoint, MappingEntry, MessageKind};
pub use session::{ChannelSession, PathConfig, PermissionMode, Session, ThreadSession};
pub use util::*;
