use std::sync::Arc;

use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::ApiConfig;
use crate::error::{ApiError, ErrorCategory};
use crate::session_manager::{SessionEvent, SessionManager};

use super::message::extract_message;

/// Whether a request carries the stored bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    /// Attach the token; a 401 forces a logout.
    Bearer,
    /// Send without a token; a 401 is an ordinary application error.
    Anonymous,
}

/// REST client shared by the auth and progress calls.
///
/// Cookies are kept in a per-client store and sent on every request.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
    session: Arc<SessionManager>,
}

impl ApiClient {
    /// Build a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the HTTP client cannot be constructed.
    pub fn new(config: ApiConfig, session: Arc<SessionManager>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            session,
        })
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Send a request and decode a JSON response.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send`]; also `ApiError::Decode` if the body does not
    /// match `T`.
    pub async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        auth: Auth,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(method, path, auth, body).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
    }

    /// Send a request, retrying transport failures and 408/504 responses up
    /// to `max_retries` extra times.
    ///
    /// # Errors
    ///
    /// - `ApiError::Unauthorized` on a 401 to a `Bearer` request, after the
    ///   session has been logged out.
    /// - `ApiError::Status` for any other error status, with a message taken
    ///   from the body.
    /// - `ApiError::Transport` once transport retries are exhausted.
    pub async fn send<B>(
        &self,
        method: Method,
        path: &str,
        auth: Auth,
        body: Option<&B>,
    ) -> Result<Response, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.config.endpoint(path)?;
        let mut attempt: u32 = 0;

        loop {
            let mut request = self.http.request(method.clone(), url.clone());
            if auth == Auth::Bearer {
                if let Some(token) = self.session.token().await {
                    request = request.bearer_auth(token.as_str());
                }
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let can_retry = attempt < self.config.max_retries;
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    match ErrorCategory::from_status(status) {
                        None => return Ok(response),
                        Some(ErrorCategory::Retryable) if can_retry => {
                            tracing::warn!(%url, %status, attempt, "retrying after timeout status");
                        }
                        Some(ErrorCategory::Unauthorized) if auth == Auth::Bearer => {
                            self.handle_unauthorized(&url).await;
                            return Err(ApiError::Unauthorized);
                        }
                        Some(_) => {
                            let text = response.text().await.unwrap_or_default();
                            let message = extract_message(&text);
                            tracing::debug!(%url, %status, %message, "request failed");
                            return Err(ApiError::Status { status, message });
                        }
                    }
                }
                Err(err) if can_retry && is_transport_failure(&err) => {
                    tracing::warn!(%url, error = %err, attempt, "retrying after transport failure");
                }
                Err(err) => return Err(ApiError::Transport(err)),
            }

            attempt += 1;
            if !self.config.retry_delay.is_zero() {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }
    }

    async fn handle_unauthorized(&self, url: &url::Url) {
        tracing::warn!(%url, "unauthorized response, ending session");
        self.session.logout().await;
        self.session.publish(SessionEvent::LoginRequired {
            route: self.config.login_route.clone(),
        });
    }
}

fn is_transport_failure(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
