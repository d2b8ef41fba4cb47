//! Testing infrastructure for forkline integration tests.
//!
//! - `TestWorld`: isolated data dir, transcript root and fake surface
//! - `surface`: `RecordingSurface`, a surface and renderer that records operations
//! - `transcript`: `TranscriptWriter`, appends agent transcript lines

pub mod surface;
pub mod transcript;
pub mod world;

pub use surface::{RecordingSurface, SurfaceOp};
pub use transcript::TranscriptWriter;
pub use world::{CliResult, TestWorld};
