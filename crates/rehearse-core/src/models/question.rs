//! Custom question model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source tag stored with questions produced by the tailored flow.
pub const QUESTION_SOURCE_GENERATED: &str = "AI-generated";

/// A question the user chose to keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomQuestion {
    pub id: String,
    pub user_id: String,
    pub question_text: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for `custom_questions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCustomQuestion {
    pub user_id: String,
    pub question_text: String,
    pub source: String,
}

impl NewCustomQuestion {
    pub fn generated(user_id: impl Into<String>, question_text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            question_text: question_text.into(),
            source: QUESTION_SOURCE_GENERATED.to_string(),
        }
    }
}
