//! Practice history: list, expand, and delete past sessions.

use crate::error::{Error, Result};
use crate::models::{Identity, PracticeSession, RECORDINGS_BUCKET};
use crate::remote::{BlobStore, RecordStore};

#[derive(Debug, Default)]
pub struct HistoryView {
    sessions: Vec<PracticeSession>,
    expanded: Option<i64>,
    loading: bool,
    error: Option<String>,
}

impl HistoryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> &[PracticeSession] {
        &self.sessions
    }

    pub const fn is_busy(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn find(&self, id: i64) -> Option<&PracticeSession> {
        self.sessions.iter().find(|session| session.id == id)
    }

    /// Fetch every session owned by `identity`, newest first.
    pub async fn load<S: RecordStore>(
        &mut self,
        identity: &Identity,
        store: &S,
    ) -> Result<&[PracticeSession]> {
        if self.loading {
            return Err(Error::InvalidInput("History is already loading".to_string()));
        }
        self.loading = true;
        self.error = None;
        let result = store.list_practice_sessions(&identity.id).await;
        self.loading = false;

        match result {
            Ok(mut sessions) => {
                sessions.retain(|session| session.user_id == identity.id);
                sessions.sort_by(|left, right| right.created_at.cmp(&left.created_at));
                self.sessions = sessions;
                if self.expanded.is_some_and(|id| self.find(id).is_none()) {
                    self.expanded = None;
                }
                Ok(&self.sessions)
            }
            Err(error) => {
                tracing::warn!("Failed to load practice sessions: {}", error);
                self.error =
                    Some("Failed to load your practice history. Please try again later.".to_string());
                Err(error)
            }
        }
    }

    /// Expand `id`, collapsing any other row; expanding the open row collapses it.
    pub fn toggle(&mut self, id: i64) -> Option<i64> {
        self.expanded = if self.expanded == Some(id) {
            None
        } else if self.find(id).is_some() {
            Some(id)
        } else {
            self.expanded
        };
        self.expanded
    }

    pub const fn expanded(&self) -> Option<i64> {
        self.expanded
    }

    /// Delete a confirmed session: best-effort blob removal, then the row.
    ///
    /// The local list only changes once the row delete succeeds.
    pub async fn delete<S>(&mut self, id: i64, identity: &Identity, store: &S) -> Result<()>
    where
        S: RecordStore + BlobStore,
    {
        let Some(session) = self.find(id) else {
            return Err(Error::InvalidInput(format!("No practice session with id {id}")));
        };

        match recording_path(&session.video_url) {
            Some(path) => {
                if let Err(error) = store.remove(RECORDINGS_BUCKET, &[path]).await {
                    tracing::warn!("Failed to remove recording for session {}: {}", id, error);
                }
            }
            None => tracing::warn!(
                "Could not find a storage path in {} for session {}",
                session.video_url,
                id
            ),
        }

        if let Err(error) = store.delete_practice_session(&identity.id, id).await {
            self.error = Some(format!("Failed to delete session: {error}"));
            return Err(error);
        }

        tracing::info!("Deleted practice session {}", id);
        self.sessions.retain(|session| session.id != id);
        if self.expanded == Some(id) {
            self.expanded = None;
        }
        Ok(())
    }
}

/// Object path inside the recordings bucket, taken from a public URL.
pub fn recording_path(video_url: &str) -> Option<String> {
    let marker = format!("{RECORDINGS_BUCKET}/");
    let start = video_url.find(&marker)? + marker.len();
    let raw = video_url[start..].split(['?', '#']).next()?;
    let path = urlencoding::decode(raw).ok()?.into_owned();
    if path.is_empty() || path.ends_with('/') {
        None
    } else {
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::{identity, practice_session, FakeBackend};

    const URL: &str = "https://p.supabase.co/storage/v1/object/public/interview-recordings/recordings/u1/171.webm";

    #[test]
    fn recording_path_is_extracted_from_public_url() {
        assert_eq!(recording_path(URL).as_deref(), Some("recordings/u1/171.webm"));
        assert_eq!(
            recording_path(&format!("{URL}?t=1")).as_deref(),
            Some("recordings/u1/171.webm")
        );
        assert_eq!(recording_path("https://elsewhere.example/video.webm"), None);
        assert_eq!(
            recording_path("https://p.supabase.co/storage/v1/object/public/interview-recordings/"),
            None
        );
    }

    #[tokio::test]
    async fn load_orders_newest_first_and_filters_owner() {
        let backend = FakeBackend::default();
        backend.seed_session(practice_session(1, "u1", "2024-01-01T00:00:00Z", URL));
        backend.seed_session(practice_session(2, "u1", "2024-03-01T00:00:00Z", URL));
        backend.seed_session(practice_session(3, "u2", "2024-05-01T00:00:00Z", URL));

        let mut view = HistoryView::new();
        let ids: Vec<i64> = view
            .load(&identity("u1"), &backend)
            .await
            .unwrap()
            .iter()
            .map(|session| session.id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn toggle_keeps_a_single_row_open() {
        let backend = FakeBackend::default();
        backend.seed_session(practice_session(1, "u1", "2024-01-01T00:00:00Z", URL));
        backend.seed_session(practice_session(2, "u1", "2024-02-01T00:00:00Z", URL));
        let mut view = HistoryView::new();
        view.load(&identity("u1"), &backend).await.unwrap();

        assert_eq!(view.toggle(1), Some(1));
        assert_eq!(view.toggle(2), Some(2));
        assert_eq!(view.toggle(2), None);
        assert_eq!(view.toggle(99), None);
    }

    #[tokio::test]
    async fn delete_removes_blob_then_row() {
        let backend = FakeBackend::default();
        backend.seed_session(practice_session(1, "u1", "2024-01-01T00:00:00Z", URL));
        let mut view = HistoryView::new();
        view.load(&identity("u1"), &backend).await.unwrap();
        view.toggle(1);

        view.delete(1, &identity("u1"), &backend).await.unwrap();
        assert!(view.sessions().is_empty());
        assert_eq!(view.expanded(), None);
        assert_eq!(
            backend.removed(),
            vec![(RECORDINGS_BUCKET.to_string(), "recordings/u1/171.webm".to_string())]
        );
        assert!(backend.sessions().is_empty());
    }

    #[tokio::test]
    async fn blob_failure_does_not_block_row_delete() {
        let backend = FakeBackend::default();
        backend.seed_session(practice_session(1, "u1", "2024-01-01T00:00:00Z", URL));
        backend.seed_session(practice_session(2, "u1", "2024-01-02T00:00:00Z", "not-a-storage-url"));
        backend.fail_removals("Object not found");
        let mut view = HistoryView::new();
        view.load(&identity("u1"), &backend).await.unwrap();

        view.delete(1, &identity("u1"), &backend).await.unwrap();
        view.delete(2, &identity("u1"), &backend).await.unwrap();
        assert!(view.sessions().is_empty());
        assert!(backend.sessions().is_empty());
    }

    #[tokio::test]
    async fn row_failure_keeps_the_local_entry() {
        let backend = FakeBackend::default();
        backend.seed_session(practice_session(1, "u1", "2024-01-01T00:00:00Z", URL));
        let mut view = HistoryView::new();
        view.load(&identity("u1"), &backend).await.unwrap();

        backend.fail_deletes("permission denied for table practice_sessions");
        assert!(view.delete(1, &identity("u1"), &backend).await.is_err());
        assert_eq!(view.sessions().len(), 1);
        assert!(view.error().unwrap().contains("permission denied"));
    }

    #[tokio::test]
    async fn load_failure_sets_a_friendly_error() {
        let backend = FakeBackend::default();
        backend.fail_lists("JWT expired");
        let mut view = HistoryView::new();
        assert!(view.load(&identity("u1"), &backend).await.is_err());
        assert_eq!(
            view.error(),
            Some("Failed to load your practice history. Please try again later.")
        );
        assert!(!view.is_busy());
    }
}
