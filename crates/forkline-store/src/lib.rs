//! Persisted session store for forkline.
//!
//! - [`Store`]: keyed read-merge-write access to the session document
//! - [`resolve_fork_point`] / [`Store::find_fork_point`]: where a branch resumes
//! - [`ActivityLog`]: flushed activity entries for later inspection

mod activity_log;
mod document;
mod error;
mod fork;
mod store;

pub use activity_log::ActivityLog;
pub use document::StoreDocument;
pub use error::{Error, Result};
pub use fork::{ForkedThread, resolve_fork_point};
pub use store::{SessionPatch, Store};
