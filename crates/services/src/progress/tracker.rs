use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use course_core::model::{
    CompletionState, ContentId, ContentKind, ContentRef, CourseId, CourseProgress,
    PlaybackPosition, ScrollPosition, UserId,
};

use crate::error::ProgressError;
use crate::session_manager::SessionManager;

use super::ProgressBackend;

//
// ─── STATE ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default)]
struct TrackerState {
    current: Option<ContentRef>,
    completion: CompletionState,
    /// Ids with a submission on the wire. A revisit during that window joins
    /// the pending submission instead of starting another.
    in_flight: BTreeSet<ContentId>,
    completed: BTreeSet<ContentId>,
}

impl TrackerState {
    fn entry_state(&self, content_id: ContentId) -> CompletionState {
        if self.completed.contains(&content_id) {
            CompletionState::Confirmed
        } else if self.in_flight.contains(&content_id) {
            CompletionState::PendingSubmit
        } else {
            CompletionState::NotStarted
        }
    }

    fn is_current(&self, content_id: ContentId) -> bool {
        self.current
            .is_some_and(|content| content.content_id == content_id)
    }
}

//
// ─── TRACKER ──────────────────────────────────────────────────────────────────
//

/// Turns playback and scroll signals into at most one completion submission
/// per content item.
///
/// Methods take `&self`; the state lock is never held across a backend call,
/// and `PendingSubmit` is set before the call so overlapping triggers are
/// dropped.
pub struct ProgressTracker {
    backend: Arc<dyn ProgressBackend>,
    user_id: UserId,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(backend: Arc<dyn ProgressBackend>, user_id: UserId) -> Self {
        Self {
            backend,
            user_id,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Build a tracker for the logged-in user.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotLoggedIn` when no user id is stored.
    pub async fn for_session(
        backend: Arc<dyn ProgressBackend>,
        session: &SessionManager,
    ) -> Result<Self, ProgressError> {
        let user_id = session.user_id().await.ok_or(ProgressError::NotLoggedIn)?;
        Ok(Self::new(backend, user_id))
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // The state stays consistent between statements, so a poisoned lock
        // is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Switch to another content item, resetting the one-shot completion.
    ///
    /// Items already in the completed set start as `Confirmed`, items with a
    /// submission still in flight start as `PendingSubmit`.
    pub fn select_content(&self, content: ContentRef) {
        let mut state = self.lock();
        state.completion = state.entry_state(content.content_id);
        state.current = Some(content);
    }

    /// Close the current content. Later signals are ignored until another
    /// item is selected.
    pub fn clear_content(&self) {
        let mut state = self.lock();
        state.current = None;
        state.completion = CompletionState::NotStarted;
    }

    #[must_use]
    pub fn current_content(&self) -> Option<ContentRef> {
        self.lock().current
    }

    #[must_use]
    pub fn state(&self) -> CompletionState {
        self.lock().completion
    }

    /// Answered from the local completed set; never hits the network.
    #[must_use]
    pub fn is_completed(&self, content_id: ContentId) -> bool {
        self.lock().completed.contains(&content_id)
    }

    /// Feed a video time update. Returns `Ok(true)` if it produced a
    /// confirmed completion.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Submit` if the completion was rejected; the
    /// next update past the threshold retries.
    pub async fn on_video_progress(
        &self,
        position: PlaybackPosition,
    ) -> Result<bool, ProgressError> {
        if !self.current_is(ContentKind::Video) || !position.reaches_completion() {
            return Ok(false);
        }
        self.mark_current_complete().await
    }

    /// Feed a document viewer scroll event. Returns `Ok(true)` if it produced
    /// a confirmed completion.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Submit` if the completion was rejected; the
    /// next scroll past the threshold retries.
    pub async fn on_document_scroll(
        &self,
        position: ScrollPosition,
    ) -> Result<bool, ProgressError> {
        if !self.current_is(ContentKind::Document) || !position.reaches_completion() {
            return Ok(false);
        }
        self.mark_current_complete().await
    }

    fn current_is(&self, kind: ContentKind) -> bool {
        self.lock().current.is_some_and(|content| content.kind == kind)
    }

    /// Submit completion for the current content unless it is already
    /// completed or being submitted.
    ///
    /// Returns `Ok(false)` without a request when nothing is selected, a
    /// submission is in flight, or the content is already confirmed. The
    /// result of a submission applies to whichever view of the same content
    /// is current when it lands.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Submit` if the backend rejects the record; the
    /// state moves to `Failed` so a later trigger retries.
    pub async fn mark_current_complete(&self) -> Result<bool, ProgressError> {
        let record = {
            let mut state = self.lock();
            let Some(content) = state.current else {
                return Ok(false);
            };
            if !state.completion.accepts_trigger() {
                return Ok(false);
            }
            let entry = state.entry_state(content.content_id);
            if entry != CompletionState::NotStarted {
                state.completion = entry;
                return Ok(false);
            }
            state.completion = CompletionState::PendingSubmit;
            state.in_flight.insert(content.content_id);
            content.completion_for(self.user_id)
        };

        let result = self.backend.mark_complete(&record).await;

        let mut state = self.lock();
        state.in_flight.remove(&record.content_id);
        let still_current = state.is_current(record.content_id);
        match result {
            Ok(()) => {
                state.completed.insert(record.content_id);
                if still_current {
                    state.completion = CompletionState::Confirmed;
                }
                tracing::info!(
                    course_id = %record.course_id,
                    content_id = %record.content_id,
                    "content marked complete"
                );
                Ok(true)
            }
            Err(err) => {
                if still_current {
                    state.completion = CompletionState::Failed;
                }
                tracing::warn!(
                    content_id = %record.content_id,
                    error = %err,
                    "completion submission failed"
                );
                Err(ProgressError::Submit(err))
            }
        }
    }

    /// Fetch the course aggregate and merge its completed set.
    ///
    /// The backend never un-completes an item, so ids confirmed locally are
    /// kept even if the response predates them.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Api` if the request fails.
    pub async fn refresh_course(&self, course_id: CourseId) -> Result<CourseProgress, ProgressError> {
        let progress = self.backend.course_progress(self.user_id, course_id).await?;

        let mut state = self.lock();
        state
            .completed
            .extend(progress.completed_content_ids.iter().copied());
        let current_done = state
            .current
            .is_some_and(|content| state.completed.contains(&content.content_id));
        // A pending submission settles the state itself when it returns.
        if current_done && state.completion.accepts_trigger() {
            state.completion = CompletionState::Confirmed;
        }
        tracing::debug!(%course_id, percent = progress.display_percent(), "course progress refreshed");
        Ok(progress)
    }
}
