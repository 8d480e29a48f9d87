//! In-memory fakes for the remote and device seams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Notify};

use crate::auth::{AuthError, AuthEvent, AuthResult, AuthSession, IdentityApi, SignUpOutcome};
use crate::error::{Error, Result};
use crate::models::{
    CustomQuestion, Identity, NewCustomQuestion, NewPracticeSession, NewResumeFile,
    PracticeSession, Rating, ResumeFile,
};
use crate::recording::{Capture, MediaDevice, Recording, RECORDING_MIME_TYPE};
use crate::remote::{BlobStore, RecordStore};
use crate::tailored::TextGenerator;

pub fn identity(id: &str) -> Identity {
    Identity {
        id: id.to_string(),
        email: Some(format!("{id}@example.com")),
        display_name: None,
    }
}

pub fn practice_session(id: i64, user_id: &str, created_at: &str, video_url: &str) -> PracticeSession {
    PracticeSession {
        id,
        question: format!("Question {id}"),
        rating: Rating::new(3).unwrap(),
        notes: String::new(),
        video_url: video_url.to_string(),
        user_id: user_id.to_string(),
        created_at: DateTime::parse_from_rfc3339(created_at)
            .unwrap()
            .with_timezone(&Utc),
    }
}

fn session_for(id: &str) -> AuthSession {
    AuthSession {
        access_token: format!("access-{id}"),
        refresh_token: format!("refresh-{id}"),
        expires_at: Utc::now().timestamp() + 3_600,
        user: identity(id),
    }
}

#[derive(Default)]
struct IdentityState {
    session: Option<AuthSession>,
    sign_in_failure: Option<String>,
    sign_out_failure: Option<String>,
    sign_out_calls: usize,
    hang_lookup: bool,
}

pub struct FakeIdentity {
    state: Mutex<IdentityState>,
    events: broadcast::Sender<AuthEvent>,
    lookup_gate: Notify,
}

impl Default for FakeIdentity {
    fn default() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(IdentityState::default()),
            events,
            lookup_gate: Notify::new(),
        }
    }
}

impl FakeIdentity {
    pub fn signed_in(id: &str) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().session = Some(session_for(id));
        fake
    }

    pub fn fail_next_sign_in(&self, message: &str) {
        self.state.lock().unwrap().sign_in_failure = Some(message.to_string());
    }

    pub fn fail_sign_out(&self, message: &str) {
        self.state.lock().unwrap().sign_out_failure = Some(message.to_string());
    }

    pub fn hang_session_lookup(&self) {
        self.state.lock().unwrap().hang_lookup = true;
    }

    /// Let a held session lookup finish.
    pub fn release_session_lookup(&self) {
        self.state.lock().unwrap().hang_lookup = false;
        self.lookup_gate.notify_one();
    }

    pub fn sign_out_calls(&self) -> usize {
        self.state.lock().unwrap().sign_out_calls
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Simulate a sign-in that happened outside the controller.
    pub fn sign_in_externally(&self, id: &str) {
        self.state.lock().unwrap().session = Some(session_for(id));
        let _ = self.events.send(AuthEvent::SignedIn);
    }
}

impl IdentityApi for FakeIdentity {
    async fn current_session(&self) -> AuthResult<Option<AuthSession>> {
        let hang = self.state.lock().unwrap().hang_lookup;
        if hang {
            self.lookup_gate.notified().await;
        }
        Ok(self.state.lock().unwrap().session.clone())
    }

    async fn current_identity(&self) -> AuthResult<Option<Identity>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .session
            .as_ref()
            .map(|session| session.user.clone()))
    }

    async fn sign_in(&self, email: &str, _password: &str) -> AuthResult<AuthSession> {
        let session = {
            let mut state = self.state.lock().unwrap();
            if let Some(message) = state.sign_in_failure.take() {
                return Err(AuthError::Api(message));
            }
            let session = session_for(email.split('@').next().unwrap_or(email));
            state.session = Some(session.clone());
            session
        };
        let _ = self.events.send(AuthEvent::SignedIn);
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        display_name: &str,
    ) -> AuthResult<SignUpOutcome> {
        let mut session = session_for(email.split('@').next().unwrap_or(email));
        session.user.display_name = Some(display_name.to_string());
        self.state.lock().unwrap().session = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn);
        Ok(SignUpOutcome::SignedIn(session))
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let failure = {
            let mut state = self.state.lock().unwrap();
            state.sign_out_calls += 1;
            state.session = None;
            state.sign_out_failure.clone()
        };
        let _ = self.events.send(AuthEvent::SignedOut);
        failure.map_or(Ok(()), |message| Err(AuthError::Api(message)))
    }

    async fn reset_password(&self, _email: &str) -> AuthResult<()> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
struct BackendState {
    sessions: Vec<PracticeSession>,
    next_id: i64,
    uploads: Vec<(String, String, String)>,
    removed: Vec<(String, String)>,
    resume_files: Vec<ResumeFile>,
    custom_questions: Vec<CustomQuestion>,
    buckets: Vec<String>,
    upload_failure: Option<String>,
    insert_failure: Option<String>,
    delete_failure: Option<String>,
    list_failure: Option<String>,
    remove_failure: Option<String>,
    hang_uploads: bool,
}

/// Tables and storage in one process-local store.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
}

impl FakeBackend {
    pub fn seed_session(&self, session: PracticeSession) {
        self.state.lock().unwrap().sessions.push(session);
    }

    pub fn set_buckets(&self, names: &[&str]) {
        self.state.lock().unwrap().buckets = names.iter().map(ToString::to_string).collect();
    }

    pub fn sessions(&self) -> Vec<PracticeSession> {
        self.state.lock().unwrap().sessions.clone()
    }

    /// `(bucket, path, content type)` for every stored object.
    pub fn uploads(&self) -> Vec<(String, String, String)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn removed(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().removed.clone()
    }

    pub fn resume_files(&self) -> Vec<ResumeFile> {
        self.state.lock().unwrap().resume_files.clone()
    }

    pub fn custom_questions(&self) -> Vec<CustomQuestion> {
        self.state.lock().unwrap().custom_questions.clone()
    }

    pub fn fail_uploads(&self, message: &str) {
        self.state.lock().unwrap().upload_failure = Some(message.to_string());
    }

    pub fn fail_inserts(&self, message: &str) {
        self.state.lock().unwrap().insert_failure = Some(message.to_string());
    }

    pub fn fail_deletes(&self, message: &str) {
        self.state.lock().unwrap().delete_failure = Some(message.to_string());
    }

    pub fn fail_lists(&self, message: &str) {
        self.state.lock().unwrap().list_failure = Some(message.to_string());
    }

    pub fn fail_removals(&self, message: &str) {
        self.state.lock().unwrap().remove_failure = Some(message.to_string());
    }

    pub fn hang_uploads(&self) {
        self.state.lock().unwrap().hang_uploads = true;
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.upload_failure = None;
        state.insert_failure = None;
        state.delete_failure = None;
        state.list_failure = None;
        state.remove_failure = None;
        state.hang_uploads = false;
    }
}

fn injected(failure: Option<&String>) -> Result<()> {
    failure.map_or(Ok(()), |message| Err(Error::Remote(message.clone())))
}

impl RecordStore for FakeBackend {
    async fn insert_practice_session(&self, row: &NewPracticeSession) -> Result<PracticeSession> {
        let mut state = self.state.lock().unwrap();
        injected(state.insert_failure.as_ref())?;
        state.next_id += 1;
        let session = PracticeSession {
            id: state.next_id,
            question: row.question.clone(),
            rating: row.rating,
            notes: row.notes.clone(),
            video_url: row.video_url.clone(),
            user_id: row.user_id.clone(),
            created_at: row.created_at,
        };
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn list_practice_sessions(&self, user_id: &str) -> Result<Vec<PracticeSession>> {
        let state = self.state.lock().unwrap();
        injected(state.list_failure.as_ref())?;
        let mut sessions: Vec<_> = state
            .sessions
            .iter()
            .filter(|session| session.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(sessions)
    }

    async fn delete_practice_session(&self, user_id: &str, id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        injected(state.delete_failure.as_ref())?;
        state
            .sessions
            .retain(|session| !(session.id == id && session.user_id == user_id));
        Ok(())
    }

    async fn insert_resume_file(&self, row: &NewResumeFile) -> Result<ResumeFile> {
        let mut state = self.state.lock().unwrap();
        injected(state.insert_failure.as_ref())?;
        let record = ResumeFile {
            id: format!("resume-{}", state.resume_files.len() + 1),
            user_id: row.user_id.clone(),
            file_url: row.file_url.clone(),
            filename: row.filename.clone(),
            upload_date: Utc::now(),
        };
        state.resume_files.push(record.clone());
        Ok(record)
    }

    async fn insert_custom_question(&self, row: &NewCustomQuestion) -> Result<CustomQuestion> {
        let mut state = self.state.lock().unwrap();
        injected(state.insert_failure.as_ref())?;
        let record = CustomQuestion {
            id: format!("question-{}", state.custom_questions.len() + 1),
            user_id: row.user_id.clone(),
            question_text: row.question_text.clone(),
            source: row.source.clone(),
            created_at: Utc::now(),
        };
        state.custom_questions.push(record.clone());
        Ok(record)
    }
}

impl BlobStore for FakeBackend {
    async fn upload(
        &self,
        bucket: &str,
        object_path: &str,
        content_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<String> {
        let hang = self.state.lock().unwrap().hang_uploads;
        if hang {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock().unwrap();
        injected(state.upload_failure.as_ref())?;
        state.uploads.push((
            bucket.to_string(),
            object_path.to_string(),
            content_type.to_string(),
        ));
        Ok(object_path.to_string())
    }

    fn public_url(&self, bucket: &str, object_path: &str) -> String {
        format!("https://fake.supabase.co/storage/v1/object/public/{bucket}/{object_path}")
    }

    async fn remove(&self, bucket: &str, object_paths: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        injected(state.remove_failure.as_ref())?;
        for path in object_paths {
            state.removed.push((bucket.to_string(), path.clone()));
        }
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().buckets.clone())
    }
}

struct DeviceState {
    denied: bool,
    payload: Vec<u8>,
    mime_type: &'static str,
    open: AtomicUsize,
}

/// Capture device that counts live handles.
#[derive(Clone)]
pub struct FakeDevice {
    inner: Arc<DeviceState>,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self {
            inner: Arc::new(DeviceState {
                denied: false,
                payload: b"\x1a\x45\xdf\xa3webm-answer".to_vec(),
                mime_type: RECORDING_MIME_TYPE,
                open: AtomicUsize::new(0),
            }),
        }
    }
}

impl FakeDevice {
    pub fn denied() -> Self {
        Self {
            inner: Arc::new(DeviceState {
                denied: true,
                payload: Vec::new(),
                mime_type: RECORDING_MIME_TYPE,
                open: AtomicUsize::new(0),
            }),
        }
    }

    pub fn producing(mime_type: &'static str) -> Self {
        Self {
            inner: Arc::new(DeviceState {
                denied: false,
                payload: b"\x00\x00\x00\x18ftypmp42".to_vec(),
                mime_type,
                open: AtomicUsize::new(0),
            }),
        }
    }

    pub fn open_handles(&self) -> usize {
        self.inner.open.load(Ordering::SeqCst)
    }

    pub fn payload_len(&self) -> usize {
        self.inner.payload.len()
    }
}

pub struct FakeCapture {
    inner: Arc<DeviceState>,
    released: bool,
}

impl FakeCapture {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.inner.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for FakeCapture {
    fn drop(&mut self) {
        self.release();
    }
}

impl MediaDevice for FakeDevice {
    type Capture = FakeCapture;

    async fn open(&self) -> Result<FakeCapture> {
        if self.inner.denied {
            return Err(Error::Device("Permission denied".to_string()));
        }
        self.inner.open.fetch_add(1, Ordering::SeqCst);
        Ok(FakeCapture {
            inner: Arc::clone(&self.inner),
            released: false,
        })
    }
}

impl Capture for FakeCapture {
    async fn finish(mut self) -> Result<Recording> {
        let bytes = self.inner.payload.clone();
        self.release();
        Ok(Recording {
            bytes,
            mime_type: self.inner.mime_type.to_string(),
            duration: Duration::from_secs(42),
        })
    }
}

/// Text generator with a canned reply or failure.
pub struct FakeGenerator {
    reply: Result<String>,
    last_prompt: Mutex<Option<String>>,
}

impl FakeGenerator {
    pub fn replying(content: &str) -> Self {
        Self {
            reply: Ok(content.to_string()),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(Error::Remote(message.to_string())),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

impl TextGenerator for FakeGenerator {
    async fn complete(&self, _system: &str, user: &str) -> Result<String> {
        *self.last_prompt.lock().unwrap() = Some(user.to_string());
        match &self.reply {
            Ok(content) => Ok(content.clone()),
            Err(error) => Err(Error::Remote(error.to_string())),
        }
    }
}
