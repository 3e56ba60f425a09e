//! Credential exchange trait.

use async_trait::async_trait;

use crate::session::UserProfile;
use crate::{AccessToken, Credentials, RefreshToken, Result, TokenPair};

/// The server side of authentication.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a token pair.
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair>;

    /// Create an account and return its first token pair.
    async fn register(&self, username: &str, password: &str) -> Result<TokenPair>;

    /// Mint a new token pair from a refresh token.
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair>;

    /// Invalidate a token server-side.
    async fn logout(&self, access_token: &AccessToken) -> Result<()>;

    /// Fetch the profile the token belongs to.
    async fn current_user(&self, access_token: &AccessToken) -> Result<UserProfile>;

    /// Change the password of the account the token belongs to.
    async fn change_password(
        &self,
        access_token: &AccessToken,
        current_password: &str,
        new_password: &str,
    ) -> Result<()>;
}
