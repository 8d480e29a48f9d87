use rehearse_core::auth::AuthController;
use rehearse_core::config::RuntimeConfig;
use rehearse_core::guard::Route;
use rehearse_core::models::Identity;

use crate::commands::common::{command_for, connect};
use crate::error::CliError;

pub async fn run_landing(config: &RuntimeConfig) -> Result<(), CliError> {
    let identity = if config.is_mock() {
        None
    } else {
        let controller = AuthController::start(connect(config)?);
        controller.ready().await.identity
    };
    for line in landing_lines(identity.as_ref(), config.is_mock()) {
        println!("{line}");
    }
    Ok(())
}

pub fn landing_lines(identity: Option<&Identity>, mock: bool) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(name) = identity.and_then(|identity| identity.display_name.as_deref()) {
        lines.push(format!("Welcome back, {name}!"));
    }
    lines.push(
        "Practice your job interview skills by recording yourself answering real interview questions."
            .to_string(),
    );
    lines.push(String::new());
    for (label, route) in [
        ("Start Practice Session", Route::Practice),
        ("Generate Tailored Questions", Route::TailoredQuestions),
        ("View Session History", Route::History),
    ] {
        lines.push(format!("  {label:<28} {}", command_for(route)));
    }
    lines.push(String::new());
    if mock {
        lines.push(format!(
            "Supabase is not configured yet. Run `{}` for guidance.",
            command_for(Route::SetupError)
        ));
    } else if identity.is_none() {
        lines.push(format!(
            "Sign in with `{}` or create an account with `{}`.",
            command_for(Route::Login),
            command_for(Route::Signup)
        ));
    }
    lines
}
