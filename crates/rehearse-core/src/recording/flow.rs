//! Record, review, and submit one practice answer.

use uuid::Uuid;

use super::device::{Capture, MediaDevice, Recording};
use super::questions::{random_question, QuestionType};
use crate::error::{Error, Result};
use crate::models::{Identity, NewPracticeSession, Rating, RECORDINGS_BUCKET};
use crate::remote::{BlobStore, RecordStore};

/// Where the flow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingStage {
    Selecting,
    Recording,
    Reviewing,
    Submitting,
    Complete,
    DeviceError,
}

pub struct RecordingFlow<D: MediaDevice> {
    device: D,
    kind: QuestionType,
    question: String,
    stage: RecordingStage,
    capture: Option<D::Capture>,
    recording: Option<Recording>,
    rating: Option<Rating>,
    notes: String,
    error: Option<String>,
    saved_url: Option<String>,
}

impl<D: MediaDevice> RecordingFlow<D> {
    /// Start in `Selecting` with a random question of the given type.
    pub fn new(device: D, kind: QuestionType) -> Self {
        Self {
            device,
            kind,
            question: random_question(kind, None).to_string(),
            stage: RecordingStage::Selecting,
            capture: None,
            recording: None,
            rating: None,
            notes: String::new(),
            error: None,
            saved_url: None,
        }
    }

    /// Start in `Selecting` with a question chosen elsewhere.
    pub fn with_question(device: D, question: impl Into<String>) -> Result<Self> {
        let mut flow = Self::new(device, QuestionType::default());
        flow.set_question(question)?;
        Ok(flow)
    }

    pub const fn stage(&self) -> RecordingStage {
        self.stage
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub const fn recording(&self) -> Option<&Recording> {
        self.recording.as_ref()
    }

    pub const fn rating(&self) -> Option<Rating> {
        self.rating
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn saved_url(&self) -> Option<&str> {
        self.saved_url.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.stage == RecordingStage::Submitting
    }

    pub const fn holds_device(&self) -> bool {
        self.capture.is_some()
    }

    pub fn set_question_type(&mut self, kind: QuestionType) -> Result<&str> {
        self.require_selecting("change the question type")?;
        self.kind = kind;
        self.next_question()
    }

    /// Re-roll the question. Only while nothing has been recorded.
    pub fn next_question(&mut self) -> Result<&str> {
        self.require_selecting("change the question")?;
        self.question = random_question(self.kind, Some(&self.question)).to_string();
        Ok(&self.question)
    }

    pub fn set_question(&mut self, question: impl Into<String>) -> Result<()> {
        self.require_selecting("change the question")?;
        let question = question.into().trim().to_string();
        if question.is_empty() {
            return Err(Error::InvalidInput("Question cannot be empty".to_string()));
        }
        self.question = question;
        Ok(())
    }

    /// Acquire the camera and microphone and begin capturing.
    pub async fn start_recording(&mut self) -> Result<()> {
        if !matches!(
            self.stage,
            RecordingStage::Selecting | RecordingStage::DeviceError | RecordingStage::Reviewing
        ) {
            return Err(self.wrong_stage("start recording"));
        }

        self.recording = None;
        self.error = None;
        match self.device.open().await {
            Ok(capture) => {
                self.capture = Some(capture);
                self.stage = RecordingStage::Recording;
                tracing::info!("Recording started");
                Ok(())
            }
            Err(error) => Err(self.device_failure("Could not access camera or microphone", error)),
        }
    }

    /// Stop capturing, release the device, and move to review.
    pub async fn stop_recording(&mut self) -> Result<&Recording> {
        if self.stage != RecordingStage::Recording {
            return Err(self.wrong_stage("stop recording"));
        }
        let Some(capture) = self.capture.take() else {
            return Err(self.device_failure(
                "Recording stopped unexpectedly",
                Error::Device("no active capture".to_string()),
            ));
        };

        let recording = match capture.finish().await {
            Ok(recording) if recording.is_empty() => {
                return Err(self.device_failure(
                    "Recording failed",
                    Error::Device("no data was captured".to_string()),
                ));
            }
            Ok(recording) => recording,
            Err(error) => return Err(self.device_failure("Recording failed", error)),
        };

        tracing::info!("Recording stopped ({} bytes)", recording.len());
        self.stage = RecordingStage::Reviewing;
        let recording: &Recording = self.recording.insert(recording);
        Ok(recording)
    }

    /// Throw away the reviewed take and record again.
    pub async fn discard(&mut self) -> Result<()> {
        if self.stage != RecordingStage::Reviewing {
            return Err(self.wrong_stage("discard the recording"));
        }
        self.recording = None;
        self.start_recording().await
    }

    pub fn set_rating(&mut self, value: i16) -> Result<Rating> {
        self.require_reviewing("rate the answer")?;
        let rating = Rating::new(value)?;
        self.rating = Some(rating);
        Ok(rating)
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) -> Result<()> {
        self.require_reviewing("add notes")?;
        self.notes = notes.into();
        Ok(())
    }

    /// Upload the take, then record the session row.
    ///
    /// Any failure returns the flow to `Reviewing` with the take and answers intact.
    pub async fn submit<S>(&mut self, identity: Option<&Identity>, store: &S) -> Result<String>
    where
        S: RecordStore + BlobStore,
    {
        if self.stage == RecordingStage::Submitting {
            return Err(Error::InvalidInput(
                "A submission is already in progress".to_string(),
            ));
        }
        self.require_reviewing("submit")?;
        let Some(rating) = self.rating else {
            return Err(self.review_failure(Error::InvalidInput(
                "Please rate your answer before saving".to_string(),
            )));
        };
        let Some(identity) = identity else {
            return Err(self.review_failure(Error::Unauthorized(
                "You must be logged in to save recordings".to_string(),
            )));
        };
        let Some((bytes, content_type, extension)) = self.recording.as_ref().map(|recording| {
            (
                recording.bytes.clone(),
                recording.mime_type.clone(),
                recording.file_extension(),
            )
        }) else {
            return Err(self.review_failure(Error::InvalidInput(
                "No video recording found".to_string(),
            )));
        };
        let object_path = format!("recordings/{}/{}.{extension}", identity.id, Uuid::now_v7());

        self.error = None;
        let question = self.question.as_str();
        let notes = self.notes.as_str();
        let saved = {
            let _submitting = SubmittingStage::enter(&mut self.stage);
            async {
                let stored_path = store
                    .upload(RECORDINGS_BUCKET, &object_path, &content_type, bytes)
                    .await
                    .map_err(explain_upload_error)?;
                let video_url = store.public_url(RECORDINGS_BUCKET, &stored_path);
                let row = NewPracticeSession::new(
                    question,
                    rating,
                    notes,
                    video_url.as_str(),
                    identity.id.as_str(),
                )?;
                store.insert_practice_session(&row).await?;
                Ok::<_, Error>(video_url)
            }
            .await
        };

        match saved {
            Ok(video_url) => {
                tracing::info!("Saved practice session for {}", identity.id);
                self.stage = RecordingStage::Complete;
                self.saved_url = Some(video_url.clone());
                Ok(video_url)
            }
            Err(error) => {
                tracing::warn!("Saving practice session failed: {}", error);
                Err(self.review_failure(error))
            }
        }
    }

    /// After a successful save, start over with a fresh question.
    pub fn record_another(&mut self) -> Result<&str> {
        if self.stage != RecordingStage::Complete {
            return Err(self.wrong_stage("record another answer"));
        }
        self.reset();
        Ok(&self.question)
    }

    /// Release the device and clear every local value.
    pub fn reset(&mut self) {
        self.capture = None;
        self.recording = None;
        self.rating = None;
        self.notes.clear();
        self.error = None;
        self.saved_url = None;
        self.stage = RecordingStage::Selecting;
        self.question = random_question(self.kind, Some(&self.question)).to_string();
    }

    fn device_failure(&mut self, context: &str, error: Error) -> Error {
        self.capture = None;
        self.stage = RecordingStage::DeviceError;
        let message = format!("{context}: {error}");
        tracing::warn!("{}", message);
        self.error = Some(message.clone());
        Error::Device(message)
    }

    fn review_failure(&mut self, error: Error) -> Error {
        self.stage = RecordingStage::Reviewing;
        self.error = Some(error.to_string());
        error
    }

    fn require_selecting(&self, action: &str) -> Result<()> {
        if self.stage == RecordingStage::Selecting {
            Ok(())
        } else {
            Err(self.wrong_stage(action))
        }
    }

    fn require_reviewing(&self, action: &str) -> Result<()> {
        if self.stage == RecordingStage::Reviewing {
            Ok(())
        } else {
            Err(self.wrong_stage(action))
        }
    }

    fn wrong_stage(&self, action: &str) -> Error {
        Error::InvalidInput(format!("Cannot {action} while {:?}", self.stage))
    }
}

/// Holds the stage at `Submitting` and falls back to `Reviewing` when released,
/// including when the submit future is dropped before it finishes.
struct SubmittingStage<'a> {
    stage: &'a mut RecordingStage,
}

impl<'a> SubmittingStage<'a> {
    fn enter(stage: &'a mut RecordingStage) -> Self {
        *stage = RecordingStage::Submitting;
        Self { stage }
    }
}

impl Drop for SubmittingStage<'_> {
    fn drop(&mut self) {
        if *self.stage == RecordingStage::Submitting {
            *self.stage = RecordingStage::Reviewing;
        }
    }
}

fn explain_upload_error(error: Error) -> Error {
    match error {
        Error::Remote(message) if message.contains("Bucket not found") => Error::Remote(format!(
            "Storage bucket \"{RECORDINGS_BUCKET}\" not found. Please create it in your Supabase project."
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::{identity, FakeBackend, FakeDevice};

    async fn reviewed_flow(device: FakeDevice) -> RecordingFlow<FakeDevice> {
        let mut flow = RecordingFlow::with_question(device, "Why this role?").unwrap();
        flow.start_recording().await.unwrap();
        flow.stop_recording().await.unwrap();
        flow
    }

    #[tokio::test]
    async fn happy_path_creates_exactly_one_row() {
        let device = FakeDevice::default();
        let backend = FakeBackend::default();
        let mut flow = reviewed_flow(device.clone()).await;
        flow.set_rating(4).unwrap();
        flow.set_notes("Rambled a bit").unwrap();

        let url = flow.submit(Some(&identity("user-1")), &backend).await.unwrap();

        assert_eq!(flow.stage(), RecordingStage::Complete);
        assert_eq!(flow.saved_url(), Some(url.as_str()));
        let rows = backend.sessions();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].question, "Why this role?");
        assert_eq!(rows[0].rating.value(), 4);
        assert_eq!(rows[0].notes, "Rambled a bit");
        assert_eq!(rows[0].video_url, url);

        let uploads = backend.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, RECORDINGS_BUCKET);
        assert!(uploads[0].1.starts_with("recordings/user-1/"));
        assert!(uploads[0].1.ends_with(".webm"));
    }

    #[tokio::test]
    async fn upload_keeps_the_capture_format() {
        let backend = FakeBackend::default();
        let mut flow = reviewed_flow(FakeDevice::producing("video/mp4")).await;
        flow.set_rating(3).unwrap();
        flow.submit(Some(&identity("u")), &backend).await.unwrap();

        let uploads = backend.uploads();
        assert!(uploads[0].1.ends_with(".mp4"));
        assert_eq!(uploads[0].2, "video/mp4");
    }

    #[tokio::test]
    async fn abandoned_submit_returns_to_review() {
        let backend = FakeBackend::default();
        backend.hang_uploads();
        let mut flow = reviewed_flow(FakeDevice::default()).await;
        flow.set_rating(4).unwrap();

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            flow.submit(Some(&identity("u")), &backend),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(flow.stage(), RecordingStage::Reviewing);
        assert!(flow.recording().is_some());

        backend.clear_failures();
        flow.submit(Some(&identity("u")), &backend).await.unwrap();
        assert_eq!(flow.stage(), RecordingStage::Complete);
    }

    #[test]
    fn switching_question_type_draws_from_that_pool() {
        let mut flow = RecordingFlow::new(FakeDevice::default(), QuestionType::Behavioral);
        let question = flow.set_question_type(QuestionType::Technical).unwrap().to_string();
        assert!(crate::recording::TECHNICAL_QUESTIONS.contains(&question.as_str()));
    }

    #[tokio::test]
    async fn question_is_fixed_once_recording_starts() {
        let mut flow = RecordingFlow::with_question(FakeDevice::default(), "Why this role?").unwrap();
        flow.start_recording().await.unwrap();
        assert!(flow.set_question_type(QuestionType::Technical).is_err());
        assert_eq!(flow.question(), "Why this role?");
    }

    #[tokio::test]
    async fn stopping_releases_the_device() {
        let device = FakeDevice::default();
        let flow = reviewed_flow(device.clone()).await;
        assert!(!flow.holds_device());
        assert_eq!(device.open_handles(), 0);
        assert_eq!(flow.recording().map(Recording::len), Some(device.payload_len()));
    }

    #[tokio::test]
    async fn device_denial_moves_to_device_error_without_a_handle() {
        let device = FakeDevice::denied();
        let mut flow = RecordingFlow::new(device.clone(), QuestionType::Both);

        let error = flow.start_recording().await.unwrap_err();
        assert!(matches!(error, Error::Device(_)));
        assert_eq!(flow.stage(), RecordingStage::DeviceError);
        assert!(flow.error().unwrap().contains("camera or microphone"));
        assert_eq!(device.open_handles(), 0);
    }

    #[tokio::test]
    async fn submit_without_identity_keeps_the_take() {
        let backend = FakeBackend::default();
        let mut flow = reviewed_flow(FakeDevice::default()).await;
        flow.set_rating(3).unwrap();

        let error = flow.submit(None, &backend).await.unwrap_err();
        assert!(matches!(error, Error::Unauthorized(_)));
        assert_eq!(flow.stage(), RecordingStage::Reviewing);
        assert!(flow.recording().is_some());
        assert!(backend.uploads().is_empty());
    }

    #[tokio::test]
    async fn submit_requires_a_rating() {
        let backend = FakeBackend::default();
        let mut flow = reviewed_flow(FakeDevice::default()).await;
        let error = flow.submit(Some(&identity("u")), &backend).await.unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert_eq!(flow.stage(), RecordingStage::Reviewing);
    }

    #[tokio::test]
    async fn upload_failure_returns_to_review_with_message() {
        let backend = FakeBackend::default();
        backend.fail_uploads("Bucket not found");
        let mut flow = reviewed_flow(FakeDevice::default()).await;
        flow.set_rating(5).unwrap();
        flow.set_notes("good").unwrap();

        let error = flow.submit(Some(&identity("u")), &backend).await.unwrap_err();
        assert!(error.to_string().contains("interview-recordings"));
        assert_eq!(flow.stage(), RecordingStage::Reviewing);
        assert_eq!(flow.rating().map(Rating::value), Some(5));
        assert_eq!(flow.notes(), "good");
        assert!(flow.recording().is_some());
        assert!(backend.sessions().is_empty());
    }

    #[tokio::test]
    async fn insert_failure_returns_to_review_and_can_retry() {
        let backend = FakeBackend::default();
        backend.fail_inserts("new row violates row-level security policy");
        let mut flow = reviewed_flow(FakeDevice::default()).await;
        flow.set_rating(2).unwrap();

        let error = flow.submit(Some(&identity("u")), &backend).await.unwrap_err();
        assert_eq!(error.to_string(), "new row violates row-level security policy");
        assert_eq!(flow.stage(), RecordingStage::Reviewing);

        backend.clear_failures();
        flow.submit(Some(&identity("u")), &backend).await.unwrap();
        assert_eq!(backend.sessions().len(), 1);
    }

    #[tokio::test]
    async fn discard_reopens_the_device() {
        let device = FakeDevice::default();
        let mut flow = reviewed_flow(device.clone()).await;
        flow.discard().await.unwrap();
        assert_eq!(flow.stage(), RecordingStage::Recording);
        assert!(flow.recording().is_none());
        assert_eq!(device.open_handles(), 1);
    }

    #[tokio::test]
    async fn record_another_resets_everything() {
        let backend = FakeBackend::default();
        let mut flow = reviewed_flow(FakeDevice::default()).await;
        flow.set_rating(4).unwrap();
        flow.submit(Some(&identity("u")), &backend).await.unwrap();

        flow.record_another().unwrap();
        assert_eq!(flow.stage(), RecordingStage::Selecting);
        assert!(flow.recording().is_none());
        assert!(flow.rating().is_none());
        assert!(flow.saved_url().is_none());
        assert_ne!(flow.question(), "Why this role?");
    }

    #[tokio::test]
    async fn dropping_the_flow_releases_a_live_capture() {
        let device = FakeDevice::default();
        let mut flow = RecordingFlow::new(device.clone(), QuestionType::Technical);
        flow.start_recording().await.unwrap();
        assert_eq!(device.open_handles(), 1);

        drop(flow);
        assert_eq!(device.open_handles(), 0);
    }

    #[test]
    fn question_changes_are_refused_mid_recording() {
        let mut flow = RecordingFlow::new(FakeDevice::default(), QuestionType::Behavioral);
        assert!(flow.next_question().is_ok());
        flow.stage = RecordingStage::Reviewing;
        assert!(flow.next_question().is_err());
    }
}
