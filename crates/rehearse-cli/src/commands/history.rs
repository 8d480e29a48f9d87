use chrono::Utc;
use rehearse_core::config::RuntimeConfig;
use rehearse_core::guard::Route;
use rehearse_core::history::HistoryView;

use crate::cli::HistoryCommands;
use crate::commands::common::{
    authorize, confirm_stdin, format_session_lines, format_timestamp, session_to_list_item,
    SessionListItem,
};
use crate::error::CliError;

pub async fn run_history(
    config: &RuntimeConfig,
    command: Option<HistoryCommands>,
) -> Result<(), CliError> {
    let authorized = authorize(Route::History, config).await?;
    let mut view = HistoryView::new();
    view.load(&authorized.identity, authorized.remote.as_ref())
        .await?;
    let now = Utc::now();

    match command.unwrap_or(HistoryCommands::List { json: false }) {
        HistoryCommands::List { json } => {
            if json {
                let items = view
                    .sessions()
                    .iter()
                    .map(|session| session_to_list_item(session, now))
                    .collect::<Vec<SessionListItem>>();
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if view.sessions().is_empty() {
                println!("No practice sessions yet. Run `rehearse practice` to record one.");
            } else {
                for line in format_session_lines(view.sessions(), now) {
                    println!("{line}");
                }
            }
        }
        HistoryCommands::Show { id } => {
            view.toggle(id);
            let session = view
                .expanded()
                .and_then(|expanded| view.find(expanded))
                .ok_or_else(|| CliError::InvalidArgument(format!("No practice session with id {id}")))?;
            println!("{}", session.question);
            println!("Recorded: {}", format_timestamp(session.created_at));
            println!("Rating:   {}", session.rating);
            if !session.notes.trim().is_empty() {
                println!("Notes:    {}", session.notes);
            }
            println!("Video:    {}", session.video_url);
        }
        HistoryCommands::Delete { id, yes } => {
            let Some(session) = view.find(id) else {
                return Err(CliError::InvalidArgument(format!(
                    "No practice session with id {id}"
                )));
            };
            if !yes
                && !confirm_stdin(&format!(
                    "Delete \"{}\" from {}? This cannot be undone.",
                    session.question,
                    format_timestamp(session.created_at)
                ))?
            {
                return Err(CliError::Cancelled);
            }
            view.delete(id, &authorized.identity, authorized.remote.as_ref())
                .await?;
            println!("Deleted session {id}");
        }
    }

    Ok(())
}
