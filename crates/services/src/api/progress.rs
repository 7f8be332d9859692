use async_trait::async_trait;
use course_core::model::{CompletionRecord, CourseId, CourseProgress, UserId};
use reqwest::Method;

use crate::error::ApiError;
use crate::progress::ProgressBackend;

use super::client::{ApiClient, Auth};

#[async_trait]
impl ProgressBackend for ApiClient {
    async fn mark_complete(&self, record: &CompletionRecord) -> Result<(), ApiError> {
        // The backend answers with a plain-text acknowledgement; only the
        // status matters.
        self.send(Method::POST, "progress/complete", Auth::Bearer, Some(record))
            .await?;
        Ok(())
    }

    async fn course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseProgress, ApiError> {
        let path = format!("progress/users/{user_id}/courses/{course_id}");
        self.send_json::<(), _>(Method::GET, &path, Auth::Bearer, None)
            .await
    }
}
