//! Practice session model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Self-assessed answer quality, 1 (poor) to 5 (excellent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub struct Rating(i16);

impl Rating {
    pub const MIN: i16 = 1;
    pub const MAX: i16 = 5;

    pub fn new(value: i16) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::InvalidInput(format!(
                "Rating must be between {} and {}, got {value}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    #[must_use]
    pub const fn value(self) -> i16 {
        self.0
    }
}

impl TryFrom<i16> for Rating {
    type Error = Error;

    fn try_from(value: i16) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Rating> for i16 {
    fn from(value: Rating) -> Self {
        value.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/5", self.0)
    }
}

/// A stored practice answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeSession {
    pub id: i64,
    pub question: String,
    pub rating: Rating,
    #[serde(default)]
    pub notes: String,
    pub video_url: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `practice_sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPracticeSession {
    pub question: String,
    pub rating: Rating,
    pub notes: String,
    pub video_url: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl NewPracticeSession {
    pub fn new(
        question: impl Into<String>,
        rating: Rating,
        notes: impl Into<String>,
        video_url: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<Self> {
        let question = question.into().trim().to_string();
        if question.is_empty() {
            return Err(Error::InvalidInput(
                "Practice question cannot be empty".to_string(),
            ));
        }
        let video_url = video_url.into();
        if video_url.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Practice session requires a video URL".to_string(),
            ));
        }

        Ok(Self {
            question,
            rating,
            notes: notes.into().trim().to_string(),
            video_url,
            user_id: user_id.into(),
            created_at: Utc::now(),
        })
    }
}
