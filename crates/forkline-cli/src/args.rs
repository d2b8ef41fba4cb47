use crate::types::{LogLevel, ModeArg, OutputFormat};
use clap::{Args, Parser, Subcommand};
use forkline_types::ConversationKey;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "forkline")]
#[command(about = "Mirror agent transcripts into chat conversations and fork them", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Data directory (defaults to $FORKLINE_PATH, then the XDG data dir)
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[arg(long, default_value = "plain", global = true)]
    pub format: OutputFormat,

    #[arg(long, default_value = "info", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

/// A channel, or a thread when `--thread` is given
#[derive(Args, Debug, Clone)]
pub struct ConversationArgs {
    pub channel: String,

    #[arg(long)]
    pub thread: Option<String>,
}

impl ConversationArgs {
    pub fn key(&self) -> ConversationKey {
        match &self.thread {
            Some(ts) => ConversationKey::thread(self.channel.as_str(), ts.as_str()),
            None => ConversationKey::channel(self.channel.as_str()),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve where a fork anchored on a message would resume
    ForkPoint { channel: String, anchor_ts: String },

    /// Create (or return) the thread session forked from an anchor
    Fork {
        channel: String,

        /// Thread the forked conversation lives in
        thread_ts: String,

        /// Message the fork is anchored on; omit for an unanchored fork
        #[arg(long)]
        anchor: Option<String>,

        /// Fork from this thread's session instead of the channel's
        #[arg(long)]
        parent_thread: Option<String>,
    },

    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Show the logged activity of a conversation
    Activity {
        #[command(flatten)]
        conversation: ConversationArgs,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Mirror a transcript into the console until interrupted
    Watch {
        #[command(flatten)]
        conversation: ConversationArgs,

        /// Agent session whose transcript is mirrored (defaults to the stored one)
        #[arg(long)]
        session_id: Option<String>,

        /// Transcript file (defaults to the agent's project layout)
        #[arg(long)]
        transcript: Option<PathBuf>,

        #[arg(long)]
        working_dir: Option<String>,

        /// Replay the whole transcript instead of only new records
        #[arg(long)]
        from_beginning: bool,
    },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    List,

    Show {
        #[command(flatten)]
        conversation: ConversationArgs,
    },

    /// Merge settings into a session, creating it if needed
    Set {
        #[command(flatten)]
        conversation: ConversationArgs,

        #[arg(long)]
        session_id: Option<String>,

        #[arg(long)]
        working_dir: Option<String>,

        #[arg(long)]
        mode: Option<ModeArg>,

        #[arg(long)]
        update_rate: Option<u32>,

        #[arg(long)]
        char_limit: Option<usize>,
    },

    /// Retire the live session id; history keeps resolving
    Reset {
        #[command(flatten)]
        conversation: ConversationArgs,
    },

    /// Delete a channel with its threads and message map
    Delete { channel: String },
}
