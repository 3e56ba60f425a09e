//! HTTP-backed credential exchange.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use fleetsync_core::traits::AuthApi;
use fleetsync_core::{
    AccessToken, ApiUrl, Credentials, RefreshToken, Result, TokenPair, UserProfile,
};

use crate::client::ApiClient;

/// POST /auth/login
pub const AUTH_LOGIN: &str = "/auth/login";

/// POST /auth/telegram
pub const AUTH_TELEGRAM: &str = "/auth/telegram";

/// POST /auth/register
pub const AUTH_REGISTER: &str = "/auth/register";

/// POST /auth/refresh
pub const AUTH_REFRESH: &str = "/auth/refresh";

/// POST /auth/logout
pub const AUTH_LOGOUT: &str = "/auth/logout";

/// GET /auth/me
pub const AUTH_ME: &str = "/auth/me";

/// POST /auth/change-password
pub const AUTH_CHANGE_PASSWORD: &str = "/auth/change-password";

#[derive(Serialize)]
struct PasswordRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct ChangePasswordRequest<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

/// Response shared by every token-issuing endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl From<TokenResponse> for TokenPair {
    fn from(response: TokenResponse) -> Self {
        TokenPair {
            access_token: AccessToken::new(response.access_token),
            refresh_token: RefreshToken::new(response.refresh_token),
            expires_in: response.expires_in,
        }
    }
}

/// [`AuthApi`] over the console's `/auth` endpoints.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: ApiClient,
}

impl HttpAuthApi {
    /// Create an auth API for the given origin.
    pub fn new(api: ApiUrl) -> Result<Self> {
        Ok(Self::from_client(ApiClient::new(api)?))
    }

    /// Reuse an existing client.
    pub fn from_client(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    #[instrument(skip(self, credentials), fields(identifier = %credentials.identifier()))]
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair> {
        let response: TokenResponse = match credentials {
            Credentials::Password { username, password } => {
                let request = PasswordRequest {
                    username: username.as_str(),
                    password: password.as_str(),
                };
                self.client.post_unsigned(AUTH_LOGIN, &request).await?
            }
            Credentials::Telegram(auth) => self.client.post_unsigned(AUTH_TELEGRAM, auth).await?,
        };
        debug!("Credentials exchanged");
        Ok(response.into())
    }

    #[instrument(skip(self, password))]
    async fn register(&self, username: &str, password: &str) -> Result<TokenPair> {
        let request = PasswordRequest { username, password };
        let response: TokenResponse = self.client.post_unsigned(AUTH_REGISTER, &request).await?;
        debug!("Account registered");
        Ok(response.into())
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair> {
        let request = RefreshRequest {
            refresh_token: refresh_token.as_str(),
        };
        let response: TokenResponse = self.client.post_unsigned(AUTH_REFRESH, &request).await?;
        debug!("Tokens refreshed");
        Ok(response.into())
    }

    #[instrument(skip_all)]
    async fn logout(&self, access_token: &AccessToken) -> Result<()> {
        self.client
            .post_with_token_no_response(AUTH_LOGOUT, &serde_json::json!({}), access_token)
            .await
    }

    #[instrument(skip_all)]
    async fn current_user(&self, access_token: &AccessToken) -> Result<UserProfile> {
        self.client.get_with_token(AUTH_ME, access_token).await
    }

    #[instrument(skip_all)]
    async fn change_password(
        &self,
        access_token: &AccessToken,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let request = ChangePasswordRequest {
            current_password,
            new_password,
        };
        self.client
            .post_with_token_no_response(AUTH_CHANGE_PASSWORD, &request, access_token)
            .await
    }
}
