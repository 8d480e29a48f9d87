//! OpenAI chat-completions client and response parsing.

use std::fmt;
use std::future::Future;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::compact_text;

pub const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1000;

pub const SYSTEM_PROMPT: &str =
    "You are a professional recruiter helping to prepare candidates for job interviews.";

static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*").expect("list marker regex should compile"));

/// Something that can complete a system + user prompt pair.
pub trait TextGenerator: Send + Sync {
    fn complete(&self, system: &str, user: &str) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    endpoint: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(Error::Configuration(
                "OpenAI API key must not be empty".to_string(),
            ));
        }
        Ok(Self {
            api_key,
            endpoint: OPENAI_CHAT_COMPLETIONS_URL.to_string(),
            client: Client::builder().build()?,
        })
    }
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl TextGenerator for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: OPENAI_MODEL,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Remote(format!(
                "OpenAI API request failed with HTTP {}: {}",
                status.as_u16(),
                compact_text(&body)
            )));
        }

        let payload = response.json::<ChatResponse>().await?;
        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| Error::Remote("Invalid response from OpenAI API".to_string()))
    }
}

/// The user prompt embedding résumé text and the job description.
pub fn question_prompt(resume_text: &str, job_description: &str) -> String {
    format!(
        "Based on the following resume and job description, generate 8-10 tailored interview \
         questions that would likely be asked in an interview for this position. The questions \
         should be specific to the candidate's experience and the job requirements.\n\n\
         Resume:\n{resume_text}\n\n\
         Job Description:\n{job_description}\n\n\
         Please format your response as a numbered list of questions only, with no additional \
         explanation or text."
    )
}

/// Keep `1.`-style and `- `-style list lines, without their markers.
pub fn parse_question_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            if NUMBERED_LINE.is_match(line) {
                Some(NUMBERED_LINE.replace(line, "").into_owned())
            } else {
                line.strip_prefix("- ").map(ToString::to_string)
            }
        })
        .filter(|question| !question.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn numbered_and_dashed_lines_are_kept() {
        let content = "Here are your questions:\n\
                       1. Why Rust?\n\
                       2.   How do you test async code?\n\
                       - What is ownership?\n\
                       \n\
                       Good luck!\n\
                       10. Last one?";
        assert_eq!(
            parse_question_list(content),
            vec![
                "Why Rust?".to_string(),
                "How do you test async code?".to_string(),
                "What is ownership?".to_string(),
                "Last one?".to_string(),
            ]
        );
    }

    #[test]
    fn prose_only_yields_nothing() {
        assert!(parse_question_list("I cannot help with that.").is_empty());
        assert!(parse_question_list("1.\n- ").is_empty());
    }

    #[test]
    fn prompt_embeds_both_inputs() {
        let prompt = question_prompt("Built React apps", "Join our team");
        assert!(prompt.contains("Resume:\nBuilt React apps"));
        assert!(prompt.contains("Job Description:\nJoin our team"));
        assert!(prompt.starts_with("Based on the following resume and job description, generate 8-10"));
    }

    #[test]
    fn request_body_matches_the_chat_schema() {
        let request = ChatRequest {
            model: OPENAI_MODEL,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: "hi",
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-3.5-turbo");
        assert_eq!(value["max_tokens"], 1000);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
    }

    #[test]
    fn empty_key_is_a_configuration_error() {
        assert!(matches!(OpenAiClient::new("  "), Err(Error::Configuration(_))));
    }
}
