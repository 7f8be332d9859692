//! HTTP access to the course backend.

mod auth;
mod client;
mod message;
mod progress;

pub use auth::{LoginRequest, LoginResponse};
pub use client::{ApiClient, Auth};
pub use message::extract_message;
