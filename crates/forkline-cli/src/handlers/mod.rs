pub mod activity;
pub mod fork;
pub mod fork_point;
pub mod session;
pub mod watch;
