mod tracker;

use async_trait::async_trait;
use course_core::model::{CompletionRecord, CourseId, CourseProgress, UserId};

use crate::error::ApiError;

pub use tracker::ProgressTracker;

/// Backend calls the tracker depends on.
#[async_trait]
pub trait ProgressBackend: Send + Sync {
    /// Record that a user finished a content item.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the submission is rejected or cannot be sent.
    async fn mark_complete(&self, record: &CompletionRecord) -> Result<(), ApiError>;

    /// Fetch the authoritative completed set and fraction for a course.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the body does not decode.
    async fn course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseProgress, ApiError>;
}
