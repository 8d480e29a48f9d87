//! Résumé upload, question generation, and per-question saving.

use uuid::Uuid;

use super::extract::{ResumeDocument, PDF_MIME_TYPE};
use super::fallback::fallback_questions;
use super::llm::{parse_question_list, question_prompt, TextGenerator, SYSTEM_PROMPT};
use crate::error::{Error, Result};
use crate::models::{Identity, NewCustomQuestion, NewResumeFile, ResumeFile, RESUMES_BUCKET};
use crate::remote::{BlobStore, RecordStore};

/// Which path produced the current question list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSource {
    Generated,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuestions {
    pub questions: Vec<String>,
    pub source: QuestionSource,
}

/// Ask the generator for tailored questions, falling back to the sample set.
///
/// Never returns an empty list.
pub async fn generate_questions<G: TextGenerator>(
    generator: Option<&G>,
    resume_text: &str,
    job_description: &str,
) -> GeneratedQuestions {
    let fallback = || GeneratedQuestions {
        questions: fallback_questions(resume_text, job_description),
        source: QuestionSource::Fallback,
    };

    let Some(generator) = generator else {
        tracing::warn!("OpenAI API key not configured, using sample questions");
        return fallback();
    };

    let prompt = question_prompt(resume_text, job_description);
    match generator.complete(SYSTEM_PROMPT, &prompt).await {
        Ok(content) => {
            let questions = parse_question_list(&content);
            if questions.is_empty() {
                tracing::warn!("No questions found in the generated response, using sample questions");
                fallback()
            } else {
                tracing::info!("Generated {} tailored questions", questions.len());
                GeneratedQuestions {
                    questions,
                    source: QuestionSource::Generated,
                }
            }
        }
        Err(error) => {
            tracing::warn!("Question generation failed, using sample questions: {}", error);
            fallback()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveState {
    #[default]
    Idle,
    Saving,
    Saved,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailoredQuestion {
    pub text: String,
    pub save: SaveState,
}

/// A résumé that has been stored remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedResume {
    pub document: ResumeDocument,
    pub record: ResumeFile,
}

#[derive(Debug, Default)]
pub struct TailoredFlow {
    resume: Option<UploadedResume>,
    job_description: String,
    questions: Vec<TailoredQuestion>,
    source: Option<QuestionSource>,
    busy: bool,
}

impl TailoredFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn resume(&self) -> Option<&UploadedResume> {
        self.resume.as_ref()
    }

    pub fn job_description(&self) -> &str {
        &self.job_description
    }

    pub fn questions(&self) -> &[TailoredQuestion] {
        &self.questions
    }

    pub const fn source(&self) -> Option<QuestionSource> {
        self.source
    }

    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// Message to show alongside sample questions.
    pub fn notice(&self) -> Option<&'static str> {
        (self.source == Some(QuestionSource::Fallback)).then_some(
            "Showing sample questions because tailored generation is unavailable right now.",
        )
    }

    pub fn set_job_description(&mut self, job_description: impl Into<String>) {
        self.job_description = job_description.into();
    }

    /// Store the résumé and record its metadata.
    pub async fn upload_resume<S>(
        &mut self,
        identity: Option<&Identity>,
        document: ResumeDocument,
        store: &S,
    ) -> Result<&UploadedResume>
    where
        S: RecordStore + BlobStore,
    {
        let Some(identity) = identity else {
            return Err(Error::Unauthorized(
                "Please select a file and ensure you are logged in.".to_string(),
            ));
        };
        self.begin()?;
        let result = store_resume(identity, &document, store).await;
        self.busy = false;

        let record = result?;
        tracing::info!("Uploaded résumé {}", record.filename);
        let uploaded: &UploadedResume = self.resume.insert(UploadedResume { document, record });
        Ok(uploaded)
    }

    /// Generate questions for the uploaded résumé and current job description.
    pub async fn generate<G: TextGenerator>(
        &mut self,
        generator: Option<&G>,
    ) -> Result<&[TailoredQuestion]> {
        let Some(resume) = &self.resume else {
            return Err(Error::InvalidInput(
                "Please upload your resume first.".to_string(),
            ));
        };
        if self.job_description.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Please enter a job description.".to_string(),
            ));
        }
        let resume_text = resume.document.text.clone();
        self.begin()?;

        let generated = generate_questions(generator, &resume_text, &self.job_description).await;
        self.busy = false;
        self.source = Some(generated.source);
        self.questions = generated
            .questions
            .into_iter()
            .map(|text| TailoredQuestion {
                text,
                save: SaveState::Idle,
            })
            .collect();
        Ok(&self.questions)
    }

    /// Save one question to the user's collection.
    pub async fn save_question<S: RecordStore>(
        &mut self,
        index: usize,
        identity: Option<&Identity>,
        store: &S,
    ) -> Result<()> {
        let Some(identity) = identity else {
            return Err(Error::Unauthorized(
                "You must be logged in to save questions.".to_string(),
            ));
        };
        let Some(question) = self.questions.get_mut(index) else {
            return Err(Error::InvalidInput(format!("No question at position {}", index + 1)));
        };
        match question.save {
            SaveState::Saving | SaveState::Saved => {
                return Err(Error::InvalidInput(
                    "This question is already saved".to_string(),
                ))
            }
            SaveState::Idle | SaveState::Failed(_) => {}
        }

        question.save = SaveState::Saving;
        let row = NewCustomQuestion::generated(identity.id.as_str(), question.text.as_str());
        match store.insert_custom_question(&row).await {
            Ok(_) => {
                question.save = SaveState::Saved;
                Ok(())
            }
            Err(error) => {
                let message = format!("Failed to save question: {error}");
                question.save = SaveState::Failed(message.clone());
                Err(Error::Remote(message))
            }
        }
    }

    /// The question to hand to the recording flow.
    pub fn practice_question(&self, index: usize) -> Option<&str> {
        self.questions.get(index).map(|question| question.text.as_str())
    }

    fn begin(&mut self) -> Result<()> {
        if self.busy {
            return Err(Error::InvalidInput(
                "Another operation is still in progress".to_string(),
            ));
        }
        self.busy = true;
        Ok(())
    }
}

async fn store_resume<S>(
    identity: &Identity,
    document: &ResumeDocument,
    store: &S,
) -> Result<ResumeFile>
where
    S: RecordStore + BlobStore,
{
    let object_path = format!(
        "resumes/{}/{}",
        identity.id,
        document.storage_name(&Uuid::new_v4().to_string())
    );
    let stored_path = store
        .upload(RESUMES_BUCKET, &object_path, PDF_MIME_TYPE, document.bytes.clone())
        .await
        .map_err(|error| Error::Remote(format!("Failed to upload file: {error}")))?;
    let file_url = store.public_url(RESUMES_BUCKET, &stored_path);

    let row = NewResumeFile {
        user_id: identity.id.clone(),
        file_url,
        filename: document.file_name.clone(),
    };
    store
        .insert_resume_file(&row)
        .await
        .map_err(|error| Error::Remote(format!("Failed to save file metadata: {error}")))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::{identity, FakeBackend, FakeGenerator};

    fn document() -> ResumeDocument {
        ResumeDocument {
            file_name: "cv.pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
            text: "Five years of React and Rust".to_string(),
        }
    }

    async fn flow_with_resume(backend: &FakeBackend) -> TailoredFlow {
        let mut flow = TailoredFlow::new();
        flow.upload_resume(Some(&identity("u1")), document(), backend)
            .await
            .unwrap();
        flow.set_job_description("Work with a small team on APIs");
        flow
    }

    #[tokio::test]
    async fn generation_without_key_uses_fallback() {
        let generated =
            generate_questions::<FakeGenerator>(None, "React", "team").await;
        assert_eq!(generated.source, QuestionSource::Fallback);
        assert_eq!(generated.questions, fallback_questions("React", "team"));
    }

    #[tokio::test]
    async fn generation_failure_uses_fallback() {
        let generator = FakeGenerator::failing("HTTP 429");
        let generated = generate_questions(Some(&generator), "x", "y").await;
        assert_eq!(generated.source, QuestionSource::Fallback);
        assert_eq!(generated.questions.len(), 10);
    }

    #[tokio::test]
    async fn unparseable_response_uses_fallback() {
        let generator = FakeGenerator::replying("Sorry, I can't do that.");
        let generated = generate_questions(Some(&generator), "x", "y").await;
        assert_eq!(generated.source, QuestionSource::Fallback);
    }

    #[tokio::test]
    async fn parsed_response_is_used_in_order() {
        let generator = FakeGenerator::replying("1. First?\n2. Second?");
        let generated = generate_questions(Some(&generator), "x", "y").await;
        assert_eq!(generated.source, QuestionSource::Generated);
        assert_eq!(generated.questions, vec!["First?".to_string(), "Second?".to_string()]);
        assert!(generator.last_prompt().unwrap().contains("Resume:\nx"));
    }

    #[tokio::test]
    async fn upload_stores_pdf_under_the_user_prefix() {
        let backend = FakeBackend::default();
        let flow = flow_with_resume(&backend).await;

        let uploads = backend.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, RESUMES_BUCKET);
        assert!(uploads[0].1.starts_with("resumes/u1/"));
        assert!(uploads[0].1.ends_with("_cv.pdf"));
        assert_eq!(uploads[0].2, PDF_MIME_TYPE);

        let resume = flow.resume().unwrap();
        assert_eq!(resume.record.filename, "cv.pdf");
        assert_eq!(backend.resume_files().len(), 1);
    }

    #[tokio::test]
    async fn upload_failure_keeps_no_resume() {
        let backend = FakeBackend::default();
        backend.fail_uploads("Bucket not found");
        let mut flow = TailoredFlow::new();

        let error = flow
            .upload_resume(Some(&identity("u1")), document(), &backend)
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Failed to upload file: Bucket not found");
        assert!(flow.resume().is_none());
        assert!(!flow.is_busy());
    }

    #[tokio::test]
    async fn generate_requires_resume_and_job_description() {
        let mut flow = TailoredFlow::new();
        let error = flow.generate::<FakeGenerator>(None).await.unwrap_err();
        assert_eq!(error.to_string(), "Invalid input: Please upload your resume first.");

        let backend = FakeBackend::default();
        let mut flow = flow_with_resume(&backend).await;
        flow.set_job_description("   ");
        assert!(flow.generate::<FakeGenerator>(None).await.is_err());
    }

    #[tokio::test]
    async fn fallback_list_sets_a_notice() {
        let backend = FakeBackend::default();
        let mut flow = flow_with_resume(&backend).await;
        let questions = flow.generate::<FakeGenerator>(None).await.unwrap();
        assert_eq!(
            questions[0].text,
            "Tell me about your experience with React development."
        );
        assert_eq!(
            questions[1].text,
            "The job requires teamwork. How do you approach this?"
        );
        assert!(flow.notice().is_some());
    }

    #[tokio::test]
    async fn saved_rows_reject_a_second_save() {
        let backend = FakeBackend::default();
        let mut flow = flow_with_resume(&backend).await;
        flow.generate::<FakeGenerator>(None).await.unwrap();

        flow.save_question(2, Some(&identity("u1")), &backend)
            .await
            .unwrap();
        assert_eq!(flow.questions()[2].save, SaveState::Saved);
        assert_eq!(flow.questions()[0].save, SaveState::Idle);
        assert!(flow
            .save_question(2, Some(&identity("u1")), &backend)
            .await
            .is_err());

        let saved = backend.custom_questions();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].source, "AI-generated");
        assert_eq!(saved[0].question_text, flow.questions()[2].text);
    }

    #[tokio::test]
    async fn failed_save_is_recorded_per_row_and_retryable() {
        let backend = FakeBackend::default();
        let mut flow = flow_with_resume(&backend).await;
        flow.generate::<FakeGenerator>(None).await.unwrap();

        backend.fail_inserts("duplicate key value");
        assert!(flow
            .save_question(0, Some(&identity("u1")), &backend)
            .await
            .is_err());
        assert_eq!(
            flow.questions()[0].save,
            SaveState::Failed("Failed to save question: duplicate key value".to_string())
        );

        backend.clear_failures();
        flow.save_question(0, Some(&identity("u1")), &backend)
            .await
            .unwrap();
        assert_eq!(flow.questions()[0].save, SaveState::Saved);
    }
}
