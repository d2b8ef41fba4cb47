//! Runtime of forkline: mirrors agent transcripts into a messaging surface.
//!
//! A [`WatchScheduler`] polls each watched conversation's transcript and
//! hands new records to the [`SyncEngine`], which posts them through the
//! [`Surface`] and [`Renderer`] collaborators and records every surface
//! message in the store's message map.

pub mod activity;
pub mod config;
pub mod error;
pub mod permalink;
pub mod scheduler;
pub mod split;
pub mod surface;
pub mod sync;

pub use activity::{ActivityBatcher, Throttle, TurnState};
pub use config::{Config, WatchSettings, Workspace, expand_tilde, resolve_data_dir};
pub use error::{Error, Result};
pub use permalink::{fallback_permalink, resolve_permalink};
pub use scheduler::{StartPosition, WatchRequest, WatchScheduler};
pub use split::split_message;
pub use surface::{Delivery, Rendered, Renderer, Surface};
pub use sync::{SyncEngine, TickReport, WatchState};
