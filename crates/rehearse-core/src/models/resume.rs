//! Resume file model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for an uploaded résumé document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeFile {
    pub id: String,
    pub user_id: String,
    pub file_url: String,
    pub filename: String,
    pub upload_date: DateTime<Utc>,
}

/// Insert payload for `resume_files`; `id` and `upload_date` are server defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewResumeFile {
    pub user_id: String,
    pub file_url: String,
    pub filename: String,
}
