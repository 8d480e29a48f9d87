//! Data models for Rehearse
//!
//! Every row type maps one-to-one onto a remote table; the client only ever
//! holds transient copies.

mod identity;
mod practice_session;
mod question;
mod resume;

pub use identity::Identity;
pub use practice_session::{NewPracticeSession, PracticeSession, Rating};
pub use question::{CustomQuestion, NewCustomQuestion, QUESTION_SOURCE_GENERATED};
pub use resume::{NewResumeFile, ResumeFile};

pub const PRACTICE_SESSIONS_TABLE: &str = "practice_sessions";
pub const RESUME_FILES_TABLE: &str = "resume_files";
pub const CUSTOM_QUESTIONS_TABLE: &str = "custom_questions";

pub const RECORDINGS_BUCKET: &str = "interview-recordings";
pub const RESUMES_BUCKET: &str = "resume-files";
