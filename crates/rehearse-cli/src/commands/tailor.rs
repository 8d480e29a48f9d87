use rehearse_core::config::RuntimeConfig;
use rehearse_core::guard::Route;
use rehearse_core::tailored::{
    OpenAiClient, QuestionSource, ResumeDocument, SaveState, TailoredFlow, TailoredQuestion,
};
use serde::Serialize;

use crate::cli::TailorArgs;
use crate::commands::common::{authorize, read_text_file};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct TailoredOutput<'a> {
    resume: &'a str,
    fallback: bool,
    questions: Vec<QuestionItem<'a>>,
}

#[derive(Debug, Serialize)]
struct QuestionItem<'a> {
    position: usize,
    text: &'a str,
    saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    save_error: Option<&'a str>,
}

pub async fn run_tailor(config: &RuntimeConfig, args: TailorArgs) -> Result<(), CliError> {
    let job_description = resolve_job_description(&args)?;
    let positions = resolve_positions(&args.save)?;
    let authorized = authorize(Route::TailoredQuestions, config).await?;

    let bytes = std::fs::read(&args.resume)?;
    let file_name = args
        .resume
        .file_name()
        .map_or_else(|| "resume.pdf".to_string(), |name| name.to_string_lossy().into_owned());
    let document = ResumeDocument::from_upload(file_name, None, bytes)?;

    let mut flow = TailoredFlow::new();
    flow.upload_resume(Some(&authorized.identity), document, authorized.remote.as_ref())
        .await?;
    flow.set_job_description(job_description);

    let generator = config
        .openai_api_key
        .as_deref()
        .map(OpenAiClient::new)
        .transpose()?;
    if generator.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; using sample questions");
    }
    flow.generate(generator.as_ref()).await?;

    for position in &positions {
        if let Err(error) = flow
            .save_question(position - 1, Some(&authorized.identity), authorized.remote.as_ref())
            .await
        {
            eprintln!("Question {position}: {error}");
        }
    }

    let resume_name = flow
        .resume()
        .map_or("", |resume| resume.record.filename.as_str());
    if args.json {
        let output = TailoredOutput {
            resume: resume_name,
            fallback: flow.source() == Some(QuestionSource::Fallback),
            questions: question_items(flow.questions()),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(notice) = flow.notice() {
        eprintln!("{notice}");
    }
    for line in format_question_lines(flow.questions()) {
        println!("{line}");
    }
    if let Some(first) = flow.practice_question(0) {
        println!();
        if positions.is_empty() {
            println!("Save questions with --save 1,3.");
        }
        println!("Practice one with: rehearse practice --question \"{first}\"");
    }
    Ok(())
}

fn resolve_job_description(args: &TailorArgs) -> Result<String, CliError> {
    let text = match (&args.job_description, &args.job_description_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => read_text_file(path)?,
        (None, None) => String::new(),
    };
    if text.trim().is_empty() {
        return Err(CliError::InvalidArgument(
            "Please enter a job description.".to_string(),
        ));
    }
    Ok(text)
}

/// Deduplicated 1-based positions, in the order given.
fn resolve_positions(raw: &[usize]) -> Result<Vec<usize>, CliError> {
    let mut positions = Vec::with_capacity(raw.len());
    for &position in raw {
        if position == 0 {
            return Err(CliError::InvalidArgument(
                "Question positions start at 1".to_string(),
            ));
        }
        if !positions.contains(&position) {
            positions.push(position);
        }
    }
    Ok(positions)
}

fn format_question_lines(questions: &[TailoredQuestion]) -> Vec<String> {
    questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let marker = match &question.save {
                SaveState::Saved => "  [saved]",
                SaveState::Failed(_) => "  [not saved]",
                SaveState::Idle | SaveState::Saving => "",
            };
            format!("{:>2}. {}{marker}", index + 1, question.text)
        })
        .collect()
}

fn question_items(questions: &[TailoredQuestion]) -> Vec<QuestionItem<'_>> {
    questions
        .iter()
        .enumerate()
        .map(|(index, question)| QuestionItem {
            position: index + 1,
            text: &question.text,
            saved: question.save == SaveState::Saved,
            save_error: match &question.save {
                SaveState::Failed(message) => Some(message.as_str()),
                _ => None,
            },
        })
        .collect()
}
