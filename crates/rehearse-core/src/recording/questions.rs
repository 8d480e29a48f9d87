//! Built-in practice question bank.

use std::fmt;
use std::str::FromStr;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const BEHAVIORAL_QUESTIONS: [&str; 10] = [
    "Tell me about a time you faced a challenge and how you overcame it.",
    "Describe a situation where you had to work with a difficult team member.",
    "Give an example of when you showed leadership skills.",
    "Tell me about a time you failed and what you learned from it.",
    "How do you handle stress and pressure?",
    "Describe a time when you had to make a difficult decision.",
    "Tell me about a time you received negative feedback and how you responded.",
    "Give an example of a goal you achieved and how you did it.",
    "How do you prioritize your work when you have multiple deadlines?",
    "Tell me about a time you went above and beyond for a project.",
];

pub const TECHNICAL_QUESTIONS: [&str; 10] = [
    "What is your approach to debugging a complex issue?",
    "Explain the difference between synchronous and asynchronous programming.",
    "How do you ensure code quality in your projects?",
    "Describe your experience with version control systems.",
    "How do you stay updated with the latest technologies?",
    "What's your approach to testing your code?",
    "Explain a complex technical concept in simple terms.",
    "How would you optimize a slow-performing application?",
    "Describe a time when you had to learn a new technology quickly.",
    "What considerations do you take into account for secure coding practices?",
];

/// Which part of the bank to draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Behavioral,
    Technical,
    #[default]
    Both,
}

impl QuestionType {
    #[must_use]
    pub fn pool(self) -> Vec<&'static str> {
        match self {
            Self::Behavioral => BEHAVIORAL_QUESTIONS.to_vec(),
            Self::Technical => TECHNICAL_QUESTIONS.to_vec(),
            Self::Both => BEHAVIORAL_QUESTIONS
                .iter()
                .chain(TECHNICAL_QUESTIONS.iter())
                .copied()
                .collect(),
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Behavioral => "behavioral",
            Self::Technical => "technical",
            Self::Both => "both",
        })
    }
}

impl FromStr for QuestionType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "behavioral" => Ok(Self::Behavioral),
            "technical" => Ok(Self::Technical),
            "both" => Ok(Self::Both),
            other => Err(Error::InvalidInput(format!("Unknown question type: {other}"))),
        }
    }
}

/// Pick a question at random, avoiding `current` when the pool allows it.
#[must_use]
pub fn random_question(kind: QuestionType, current: Option<&str>) -> &'static str {
    let all = kind.pool();
    let fresh: Vec<&'static str> = all
        .iter()
        .copied()
        .filter(|question| Some(*question) != current)
        .collect();
    let mut rng = rand::rng();
    fresh
        .choose(&mut rng)
        .or_else(|| all.choose(&mut rng))
        .copied()
        .unwrap_or(BEHAVIORAL_QUESTIONS[0])
}
