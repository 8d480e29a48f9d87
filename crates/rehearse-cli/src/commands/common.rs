use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rehearse_core::auth::{AuthController, AuthSnapshot};
use rehearse_core::config::{ConfigOverrides, RuntimeConfig};
use rehearse_core::guard::{ConfigurationGuidance, GuardState, Route, RouteGuard};
use rehearse_core::models::{Identity, PracticeSession};
use rehearse_core::remote::RemoteClient;
use serde::Serialize;

use crate::auth::KeyringSessionStore;
use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "rehearse.json";

pub type Remote = RemoteClient<KeyringSessionStore>;

/// A signed-in context for a protected command.
pub struct Authorized {
    pub remote: Arc<Remote>,
    pub identity: Identity,
}

#[derive(Debug, Serialize)]
pub struct SessionListItem {
    pub id: i64,
    pub question: String,
    pub rating: i16,
    pub notes: String,
    pub video_url: String,
    pub created_at: String,
    pub relative_time: String,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rehearse").join(CONFIG_FILE_NAME))
}

/// Resolve configuration from an explicit file, the default config file, and the environment.
pub fn load_config(explicit_path: Option<&Path>) -> Result<RuntimeConfig, CliError> {
    let overrides = match explicit_path {
        Some(path) => ConfigOverrides::load_from_path(path)?,
        None => match default_config_path().filter(|path| path.exists()) {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                ConfigOverrides::load_from_path(&path)?
            }
            None => ConfigOverrides::default(),
        },
    };
    Ok(RuntimeConfig::resolve(&overrides)?)
}

pub fn connect(config: &RuntimeConfig) -> Result<Arc<Remote>, CliError> {
    if config.is_mock() {
        return Err(CliError::NotConfigured);
    }
    let store = KeyringSessionStore::for_project(&config.supabase_url);
    Ok(Arc::new(RemoteClient::connect(config, store)?))
}

/// Start the auth controller and wait until it has looked up any stored session.
pub async fn start_auth(config: &RuntimeConfig) -> Result<AuthController<Remote>, CliError> {
    let controller = AuthController::start(connect(config)?);
    controller.ready().await;
    Ok(controller)
}

/// Run the route guard for `route` and hand back the signed-in context.
pub async fn authorize(route: Route, config: &RuntimeConfig) -> Result<Authorized, CliError> {
    let mut guard = RouteGuard::new(route, config.mode);
    if config.is_mock() {
        let state = guard
            .evaluate(&AuthSnapshot {
                identity: None,
                loading: true,
            })
            .clone();
        guard_outcome(route, &state)?;
    }

    let remote = connect(config)?;
    let controller = AuthController::start(Arc::clone(&remote));
    let state = guard.resolve(&controller).await;
    guard_outcome(route, &state)?;

    let identity = controller
        .snapshot()
        .identity
        .ok_or_else(|| CliError::SignInRequired(route.to_string()))?;
    tracing::debug!("Authorized {} for {}", identity.id, route);
    Ok(Authorized { remote, identity })
}

/// Map a settled guard state onto the command outcome.
pub fn guard_outcome(route: Route, state: &GuardState) -> Result<(), CliError> {
    match state {
        GuardState::Authorized => Ok(()),
        GuardState::Unauthorized {
            redirect: Route::SetupError,
        } => Err(CliError::NotConfigured),
        GuardState::Unauthorized { .. } | GuardState::Undetermined | GuardState::Pending => {
            Err(CliError::SignInRequired(route.to_string()))
        }
        GuardState::ConfigurationError(guidance) => {
            for line in guidance_lines(guidance) {
                eprintln!("{line}");
            }
            Err(CliError::AuthTimedOut)
        }
    }
}

pub fn guidance_lines(guidance: &ConfigurationGuidance) -> Vec<String> {
    let mut lines = vec![guidance.title.to_string()];
    lines.extend(guidance.causes.iter().map(|cause| format!("  - {cause}")));
    lines.push(format!("Tip: {}", guidance.tip));
    lines.push(format!(
        "See: {}",
        guidance
            .links
            .iter()
            .map(|route| command_for(*route))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    lines
}

/// The subcommand that stands in for a route.
pub const fn command_for(route: Route) -> &'static str {
    match route {
        Route::Landing => "rehearse",
        Route::Login => "rehearse login",
        Route::Signup => "rehearse signup",
        Route::ForgotPassword => "rehearse forgot-password",
        Route::Practice => "rehearse practice",
        Route::History => "rehearse history",
        Route::TailoredQuestions => "rehearse tailor",
        Route::Diagnostics => "rehearse diagnostics",
        Route::SetupError => "rehearse setup",
    }
}

/// Print `prompt` and read one trimmed line.
pub fn ask(
    input: &mut impl BufRead,
    output: &mut impl Write,
    prompt: &str,
) -> Result<String, CliError> {
    write!(output, "{prompt}")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(CliError::Cancelled);
    }
    Ok(line.trim().to_string())
}

/// Yes/no question; anything but `y`/`yes` declines.
pub fn confirm(
    input: &mut impl BufRead,
    output: &mut impl Write,
    prompt: &str,
) -> Result<bool, CliError> {
    let answer = ask(input, output, &format!("{prompt} [y/N] "))?;
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}

pub fn prompt_stdin(prompt: &str) -> Result<String, CliError> {
    ask(&mut io::stdin().lock(), &mut io::stderr(), prompt)
}

pub fn confirm_stdin(prompt: &str) -> Result<bool, CliError> {
    confirm(&mut io::stdin().lock(), &mut io::stderr(), prompt)
}

/// Password from the flag, or from stdin.
pub fn resolve_password(explicit: Option<String>) -> Result<String, CliError> {
    if let Some(password) = explicit.filter(|password| !password.is_empty()) {
        return Ok(password);
    }
    if io::stdin().is_terminal() {
        eprintln!("(input is not hidden; pass --password or REHEARSE_PASSWORD to skip this prompt)");
    }
    let password = prompt_stdin("Password: ")?;
    if password.is_empty() {
        return Err(CliError::InvalidArgument(
            "Please enter both email and password".to_string(),
        ));
    }
    Ok(password)
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now
        .signed_duration_since(timestamp)
        .num_milliseconds()
        .max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_session_lines(sessions: &[PracticeSession], now: DateTime<Utc>) -> Vec<String> {
    sessions
        .iter()
        .map(|session| {
            format!(
                "{:<6}  {:<16}  {}  {:<50}  {}",
                session.id,
                session.created_at.format("%Y-%m-%d %H:%M"),
                session.rating,
                preview(&session.question, 50),
                format_relative_time(session.created_at, now)
            )
        })
        .collect()
}

pub fn session_to_list_item(session: &PracticeSession, now: DateTime<Utc>) -> SessionListItem {
    SessionListItem {
        id: session.id,
        question: session.question.clone(),
        rating: session.rating.value(),
        notes: session.notes.clone(),
        video_url: session.video_url.clone(),
        created_at: session.created_at.to_rfc3339(),
        relative_time: format_relative_time(session.created_at, now),
    }
}

pub fn read_text_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|error| {
        CliError::InvalidArgument(format!("Failed to read {}: {error}", path.display()))
    })
}
