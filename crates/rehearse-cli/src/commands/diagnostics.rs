use rehearse_core::config::{ConfigReport, ConfigSource, ConnectionMode, RuntimeConfig};
use rehearse_core::diagnostics::{
    check_connection, check_storage_setup, describe_config, CheckStatus, ConnectionReport,
    StorageSetupReport,
};
use serde::Serialize;

use crate::auth::KeyringSessionStore;
use crate::commands::common::connect;
use crate::error::CliError;

#[derive(Serialize)]
struct DiagnosticsOutput<'a> {
    config: &'a ConfigReport,
    connection: Option<&'a ConnectionReport>,
    error: Option<String>,
}

pub async fn run_diagnostics(config: &RuntimeConfig, as_json: bool) -> Result<(), CliError> {
    let report = describe_config(config);
    let connection = if config.is_mock() {
        Err(CliError::NotConfigured)
    } else {
        check_connection(config, KeyringSessionStore::for_project(&config.supabase_url))
            .await
            .map_err(CliError::from)
    };

    if as_json {
        let output = DiagnosticsOutput {
            config: &report,
            connection: connection.as_ref().ok(),
            error: connection.as_ref().err().map(ToString::to_string),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for line in config_lines(&report) {
            println!("{line}");
        }
        println!();
        match &connection {
            Ok(connection) => {
                for line in connection_lines(connection) {
                    println!("{line}");
                }
            }
            Err(error) => println!("Connection test skipped: {error}"),
        }
    }

    match connection {
        Ok(connection) if connection.success() => Ok(()),
        Ok(_) => Err(CliError::InvalidArgument(
            "Supabase connection test failed".to_string(),
        )),
        Err(error) => Err(error),
    }
}

/// The setup-error view plus a storage check when a project is configured.
pub async fn run_setup(config: &RuntimeConfig) -> Result<(), CliError> {
    println!("Rehearse needs a Supabase project. Set these environment variables (or a .env file):");
    println!("  SUPABASE_URL        your project URL, e.g. https://xyz.supabase.co");
    println!("  SUPABASE_ANON_KEY   the project's anon/public key");
    println!("  OPENAI_API_KEY      optional, enables tailored question generation");
    println!("  REHEARSE_SITE_URL   optional, where password reset links send users");
    println!("Values can also come from a JSON file passed with --config.");
    println!();
    for line in config_lines(&describe_config(config)) {
        println!("{line}");
    }

    if config.is_mock() {
        println!();
        println!("Supabase credentials are missing; authenticated commands are unavailable.");
        return Ok(());
    }

    let remote = connect(config)?;
    let storage = check_storage_setup(remote.as_ref()).await?;
    println!();
    for line in storage_lines(&storage) {
        println!("{line}");
    }
    Ok(())
}

pub fn config_lines(report: &ConfigReport) -> Vec<String> {
    let mode = match report.mode {
        ConnectionMode::Configured => "configured",
        ConnectionMode::Mock => "mock (placeholder credentials)",
    };
    vec![
        format!("Mode:              {mode}"),
        format!(
            "SUPABASE_URL:      {} ({})",
            report.supabase_url,
            source_label(report.supabase_url_source)
        ),
        format!(
            "SUPABASE_ANON_KEY: {} ({})",
            report.supabase_anon_key_preview,
            source_label(report.supabase_anon_key_source)
        ),
        format!(
            "OPENAI_API_KEY:    {} ({})",
            if report.openai_configured { "set" } else { "not set" },
            source_label(report.openai_api_key_source)
        ),
        format!(
            "Site URL:          {}",
            report.site_url.as_deref().unwrap_or("(not set)")
        ),
    ]
}

pub fn connection_lines(report: &ConnectionReport) -> Vec<String> {
    let mut lines = report
        .checks
        .iter()
        .map(|check| {
            let detail = check
                .detail
                .as_deref()
                .map(|detail| format!(" - {detail}"))
                .unwrap_or_default();
            match &check.status {
                CheckStatus::Passed => format!("[ok]   {}{detail}", check.name),
                CheckStatus::Failed(message) => format!("[fail] {}: {message}", check.name),
            }
        })
        .collect::<Vec<_>>();
    if !report.buckets.is_empty() {
        lines.push(format!("Buckets: {}", report.buckets.join(", ")));
    }
    lines.push(if report.success() {
        "Supabase connection test passed".to_string()
    } else {
        "Supabase connection test failed".to_string()
    });
    lines
}

pub fn storage_lines(report: &StorageSetupReport) -> Vec<String> {
    if report.complete() {
        return vec!["Storage buckets: all required buckets exist".to_string()];
    }
    let mut lines = vec![format!(
        "Missing storage buckets: {}. Create them as public buckets in the Supabase dashboard, then apply:",
        report.missing.join(", ")
    )];
    for (name, sql) in report.policy_sql() {
        lines.push(format!("-- {name}"));
        lines.push(sql);
    }
    lines
}

const fn source_label(source: ConfigSource) -> &'static str {
    match source {
        ConfigSource::Override => "config file",
        ConfigSource::Environment => "environment",
        ConfigSource::Placeholder => "placeholder",
        ConfigSource::Unset => "unset",
    }
}
