use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{ContentId, CourseId, SectionId, UserId};

/// Scroll percentage at which a document counts as read.
pub const DOCUMENT_COMPLETION_PERCENT: f64 = 95.0;

/// A video counts as watched once playback is within this many seconds of
/// the end.
pub const VIDEO_END_TOLERANCE_SECS: f64 = 1.0;

//
// ─── CONTENT ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Video,
    Document,
}

/// The content item currently open in the player or document viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentRef {
    pub course_id: CourseId,
    pub section_id: SectionId,
    pub content_id: ContentId,
    pub kind: ContentKind,
}

impl ContentRef {
    #[must_use]
    pub fn new(
        course_id: CourseId,
        section_id: SectionId,
        content_id: ContentId,
        kind: ContentKind,
    ) -> Self {
        Self {
            course_id,
            section_id,
            content_id,
            kind,
        }
    }

    #[must_use]
    pub fn completion_for(&self, user_id: UserId) -> CompletionRecord {
        CompletionRecord {
            course_id: self.course_id,
            section_id: self.section_id,
            content_id: self.content_id,
            user_id,
        }
    }
}

//
// ─── SIGNALS ──────────────────────────────────────────────────────────────────
//

/// Scroll metrics reported by the document viewer, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

impl ScrollPosition {
    #[must_use]
    pub fn new(scroll_top: f64, client_height: f64, scroll_height: f64) -> Self {
        Self {
            scroll_top,
            client_height,
            scroll_height,
        }
    }

    /// `(scroll_top + client_height) / scroll_height * 100`, or 0 for an
    /// empty document.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.scroll_height <= 0.0 {
            return 0.0;
        }
        (self.scroll_top + self.client_height) * 100.0 / self.scroll_height
    }

    #[must_use]
    pub fn reaches_completion(&self) -> bool {
        self.percentage() >= DOCUMENT_COMPLETION_PERCENT
    }
}

/// Playback position reported by the video player, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackPosition {
    pub current_time: f64,
    pub duration: f64,
}

impl PlaybackPosition {
    #[must_use]
    pub fn new(current_time: f64, duration: f64) -> Self {
        Self {
            current_time,
            duration,
        }
    }

    /// Unknown or zero durations (metadata not loaded yet) never complete.
    #[must_use]
    pub fn reaches_completion(&self) -> bool {
        self.duration.is_finite()
            && self.duration > 0.0
            && self.current_time >= self.duration - VIDEO_END_TOLERANCE_SECS
    }
}

//
// ─── COMPLETION ───────────────────────────────────────────────────────────────
//

/// Durable fact that a user finished a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub course_id: CourseId,
    pub section_id: SectionId,
    pub content_id: ContentId,
    pub user_id: UserId,
}

/// Completion state of the content item currently being viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionState {
    #[default]
    NotStarted,
    /// Submission in flight; further triggers are ignored.
    PendingSubmit,
    Confirmed,
    /// Last submission failed; the next threshold crossing retries.
    Failed,
}

impl CompletionState {
    /// Whether a threshold crossing in this state should submit.
    #[must_use]
    pub fn accepts_trigger(self) -> bool {
        matches!(self, Self::NotStarted | Self::Failed)
    }
}

/// Authoritative per-course progress as returned by the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    #[serde(default)]
    pub completed_content_ids: BTreeSet<ContentId>,
    /// Fraction in `0.0..=1.0`.
    #[serde(default)]
    pub complete_percentage: f64,
}

impl CourseProgress {
    #[must_use]
    pub fn contains(&self, content_id: ContentId) -> bool {
        self.completed_content_ids.contains(&content_id)
    }

    /// Integer percent for display: `round(fraction * 100)`, clamped to 0..=100.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn display_percent(&self) -> u8 {
        if !self.complete_percentage.is_finite() {
            return 0;
        }
        (self.complete_percentage * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

impl fmt::Display for CourseProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.display_percent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_threshold_is_inclusive_at_95() {
        assert!(ScrollPosition::new(850.0, 100.0, 1000.0).reaches_completion());
        assert!(!ScrollPosition::new(849.0, 100.0, 1000.0).reaches_completion());
    }

    #[test]
    fn scroll_just_below_threshold_does_not_complete() {
        let pos = ScrollPosition::new(849.0, 100.0, 1000.0);
        assert!((pos.percentage() - 94.9).abs() < 1e-9);
        assert!(!pos.reaches_completion());
    }

    #[test]
    fn empty_document_never_completes() {
        let pos = ScrollPosition::new(0.0, 0.0, 0.0);
        assert_eq!(pos.percentage(), 0.0);
        assert!(!pos.reaches_completion());
    }

    #[test]
    fn video_completes_near_the_end() {
        assert!(PlaybackPosition::new(119.0, 120.0).reaches_completion());
        assert!(PlaybackPosition::new(120.0, 120.0).reaches_completion());
        assert!(!PlaybackPosition::new(100.0, 120.0).reaches_completion());
    }

    #[test]
    fn video_without_duration_never_completes() {
        assert!(!PlaybackPosition::new(0.0, 0.0).reaches_completion());
        assert!(!PlaybackPosition::new(5.0, f64::NAN).reaches_completion());
    }

    #[test]
    fn display_rounds_fraction() {
        let progress = CourseProgress {
            completed_content_ids: BTreeSet::new(),
            complete_percentage: 0.667,
        };
        assert_eq!(progress.display_percent(), 67);
        assert_eq!(progress.to_string(), "67%");
    }

    #[test]
    fn display_clamps_out_of_range() {
        let over = CourseProgress {
            complete_percentage: 1.4,
            ..CourseProgress::default()
        };
        assert_eq!(over.display_percent(), 100);
        let nan = CourseProgress {
            complete_percentage: f64::NAN,
            ..CourseProgress::default()
        };
        assert_eq!(nan.display_percent(), 0);
    }

    #[test]
    fn progress_parses_backend_shape() {
        let json = r#"{"completedContentIds":[3,1],"completePercentage":0.5}"#;
        let progress: CourseProgress = serde_json::from_str(json).unwrap();
        assert!(progress.contains(ContentId::new(1)));
        assert!(progress.contains(ContentId::new(3)));
        assert_eq!(progress.display_percent(), 50);
    }

    #[test]
    fn completion_record_serializes_camel_case() {
        let content = ContentRef::new(
            CourseId::new(1),
            SectionId::new(2),
            ContentId::new(3),
            ContentKind::Video,
        );
        let json = serde_json::to_value(content.completion_for(UserId::new(4))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"courseId":1,"sectionId":2,"contentId":3,"userId":4})
        );
    }

    #[test]
    fn failed_state_accepts_retry() {
        assert!(CompletionState::NotStarted.accepts_trigger());
        assert!(CompletionState::Failed.accepts_trigger());
        assert!(!CompletionState::PendingSubmit.accepts_trigger());
        assert!(!CompletionState::Confirmed.accepts_trigger());
    }
}
