use super::args::{Cli, Commands, SessionCommand};
use super::handlers;
use crate::logging;
use anyhow::Result;
use forkline_runtime::Workspace;

pub fn run(cli: Cli) -> Result<()> {
    logging::init(cli.log_level);

    let workspace = Workspace::open(cli.data_dir.as_deref())?;
    let format = cli.format;

    match cli.command {
        Commands::ForkPoint { channel, anchor_ts } => {
            handlers::fork_point::handle(&workspace, &channel, &anchor_ts, format)
        }

        Commands::Fork {
            channel,
            thread_ts,
            anchor,
            parent_thread,
        } => handlers::fork::handle(
            &workspace,
            &channel,
            &thread_ts,
            anchor.as_deref(),
            parent_thread.as_deref(),
            format,
        ),

        Commands::Session { command } => match command {
            SessionCommand::List => handlers::session::list(&workspace, format),
            SessionCommand::Show { conversation } => {
                handlers::session::show(&workspace, &conversation.key(), format)
            }
            SessionCommand::Set {
                conversation,
                session_id,
                working_dir,
                mode,
                update_rate,
                char_limit,
            } => {
                let patch = handlers::session::patch(
                    session_id,
                    working_dir,
                    mode.map(Into::into),
                    update_rate,
                    char_limit,
                );
                handlers::session::set(&workspace, &conversation.key(), patch, format)
            }
            SessionCommand::Reset { conversation } => {
                handlers::session::reset(&workspace, &conversation.key(), format)
            }
            SessionCommand::Delete { channel } => {
                handlers::session::delete(&workspace, &channel, format)
            }
        },

        Commands::Activity {
            conversation,
            limit,
        } => handlers::activity::handle(&workspace, &conversation.key(), limit, format),

        Commands::Watch {
            conversation,
            session_id,
            transcript,
            working_dir,
            from_beginning,
        } => handlers::watch::handle(
            workspace,
            handlers::watch::WatchArgs {
                key: conversation.key(),
                session_id,
                transcript,
                working_dir,
                from_beginning,
            },
        ),
    }
}
