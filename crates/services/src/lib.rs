#![forbid(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod progress;
pub mod session_manager;

pub use course_core::Clock;

pub use api::{ApiClient, LoginResponse};
pub use config::ApiConfig;
pub use error::{ApiError, ConfigError, ErrorCategory, ProgressError};
pub use progress::{ProgressBackend, ProgressTracker};
pub use session_manager::{SessionEvent, SessionManager};
