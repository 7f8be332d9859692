use course_core::model::UserId;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

use super::client::{ApiClient, Auth};

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Credentials returned by `auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(alias = "accessToken")]
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default, alias = "id")]
    pub user_id: Option<UserId>,
}

impl ApiClient {
    /// Log in and persist the returned credentials.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` for rejected credentials and transport or
    /// decode errors otherwise.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = LoginRequest { email, password };
        let response: LoginResponse = self
            .send_json(Method::POST, "auth/login", Auth::Anonymous, Some(&request))
            .await?;
        self.session().store_login(&response).await;
        Ok(response)
    }

    /// Forget the stored credentials. No request is sent.
    pub async fn logout(&self) {
        self.session().logout().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_accepts_backend_aliases() {
        let parsed: LoginResponse =
            serde_json::from_str(r#"{"accessToken":"a.b.c","refreshToken":"r","id":3}"#).unwrap();
        assert_eq!(parsed.token, "a.b.c");
        assert_eq!(parsed.refresh_token.as_deref(), Some("r"));
        assert_eq!(parsed.user_id, Some(UserId::new(3)));
    }

    #[test]
    fn login_response_tolerates_missing_optionals() {
        let parsed: LoginResponse = serde_json::from_str(r#"{"token":"t"}"#).unwrap();
        assert_eq!(parsed.refresh_token, None);
        assert_eq!(parsed.user_id, None);
    }
}
