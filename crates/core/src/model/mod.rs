mod ids;
mod progress;
mod session;
mod token;

pub use ids::{ContentId, CourseId, ParseIdError, SectionId, UserId};
pub use progress::{
    CompletionRecord, CompletionState, ContentKind, ContentRef, CourseProgress,
    DOCUMENT_COMPLETION_PERCENT, PlaybackPosition, ScrollPosition, VIDEO_END_TOLERANCE_SECS,
};
pub use session::SessionId;
pub use token::{AuthToken, Role, TokenClaims, TokenError, is_token_expired};
