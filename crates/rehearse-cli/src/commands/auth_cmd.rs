use rehearse_core::auth::SignUpOutcome;
use rehearse_core::config::RuntimeConfig;

use crate::cli::Credentials;
use crate::commands::common::{resolve_password, start_auth};
use crate::error::CliError;

pub async fn run_login(config: &RuntimeConfig, credentials: Credentials) -> Result<(), CliError> {
    let password = resolve_password(credentials.password)?;
    let controller = start_auth(config).await?;
    let identity = controller.sign_in(&credentials.email, &password).await?;
    println!("Signed in as {}", identity.label());
    println!("Next: `rehearse practice` to record an answer.");
    Ok(())
}

pub async fn run_signup(
    config: &RuntimeConfig,
    credentials: Credentials,
    name: &str,
) -> Result<(), CliError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::InvalidArgument("Please enter your name".to_string()));
    }
    let password = resolve_password(credentials.password)?;
    let controller = start_auth(config).await?;
    match controller
        .sign_up(&credentials.email, &password, name)
        .await?
    {
        SignUpOutcome::SignedIn(session) => {
            println!("Account created. Signed in as {}", session.user.label());
        }
        SignUpOutcome::ConfirmationRequired => {
            println!(
                "Account created. Check {} for a confirmation link, then run `rehearse login`.",
                credentials.email
            );
        }
    }
    Ok(())
}

pub async fn run_forgot_password(config: &RuntimeConfig, email: &str) -> Result<(), CliError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(CliError::InvalidArgument(
            "Please enter your email address".to_string(),
        ));
    }
    let controller = start_auth(config).await?;
    controller.reset_password(email).await?;
    println!(
        "If an account exists with this email, you will receive a password reset link shortly."
    );
    Ok(())
}

pub async fn run_logout(config: &RuntimeConfig) -> Result<(), CliError> {
    let controller = start_auth(config).await?;
    let label = controller
        .snapshot()
        .identity
        .map(|identity| identity.label().to_string());
    controller.sign_out().await;
    match label {
        Some(label) => println!("Signed out {label}"),
        None => println!("Not signed in."),
    }
    Ok(())
}

pub async fn run_whoami(config: &RuntimeConfig) -> Result<(), CliError> {
    let controller = start_auth(config).await?;
    match controller.snapshot().identity {
        Some(identity) => {
            println!("{}", identity.label());
            if let Some(email) = identity.email.as_deref() {
                println!("email: {email}");
            }
            println!("id: {}", identity.id);
        }
        None => println!("Not signed in."),
    }
    Ok(())
}
