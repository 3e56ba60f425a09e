//! REST client implementation.

use reqwest::RequestBuilder;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, trace};

use fleetsync_core::error::{Error, InvalidInputError, ProtocolError, TransportError};
use fleetsync_core::{AccessToken, ApiUrl, Result, registry};

/// HTTP client for the console API.
///
/// Signed requests read the bearer token from the auth registry at send
/// time; an unregistered or unauthenticated registry sends no header.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    api: ApiUrl,
}

impl ApiClient {
    /// Create a new client for the given API origin.
    pub fn new(api: ApiUrl) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fleetsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport_error)?;

        Ok(Self { client, api })
    }

    /// Returns the API origin this client talks to.
    pub fn api(&self) -> &ApiUrl {
        &self.api
    }

    /// GET a resource, signed with the current session token.
    #[instrument(skip(self), fields(api = %self.api))]
    pub async fn get<R>(&self, path: &str) -> Result<R>
    where
        R: DeserializeOwned,
    {
        debug!(path, "GET");
        let request = self.sign(self.client.get(self.api.endpoint(path)));
        self.send(request).await
    }

    /// POST a JSON body, signed with the current session token.
    #[instrument(skip(self, body), fields(api = %self.api))]
    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        debug!(path, "POST");
        let request = self.sign(self.client.post(self.api.endpoint(path)).json(body));
        self.send(request).await
    }

    /// POST without any credentials, for the credential exchange itself.
    #[instrument(skip(self, body), fields(api = %self.api))]
    pub(crate) async fn post_unsigned<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        debug!(path, "POST (unsigned)");
        let request = self.client.post(self.api.endpoint(path)).json(body);
        self.send(request).await
    }

    /// GET signed with an explicit token rather than the registry's.
    #[instrument(skip(self, token), fields(api = %self.api))]
    pub(crate) async fn get_with_token<R>(&self, path: &str, token: &AccessToken) -> Result<R>
    where
        R: DeserializeOwned,
    {
        debug!(path, "GET (explicit token)");
        let request = self
            .client
            .get(self.api.endpoint(path))
            .bearer_auth(token.as_str());
        self.send(request).await
    }

    /// POST signed with an explicit token, ignoring any response body.
    #[instrument(skip(self, body, token), fields(api = %self.api))]
    pub(crate) async fn post_with_token_no_response<B>(
        &self,
        path: &str,
        body: &B,
        token: &AccessToken,
    ) -> Result<()>
    where
        B: Serialize,
    {
        debug!(path, "POST (explicit token, no response)");
        let response = self
            .client
            .post(self.api.endpoint(path))
            .bearer_auth(token.as_str())
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        trace!(status = %status, "response");
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Protocol(parse_error_response(response).await))
        }
    }

    fn sign(&self, request: RequestBuilder) -> RequestBuilder {
        let state = registry::auth_state();
        match state.as_ref().and_then(|s| s.bearer()) {
            Some(token) => request.bearer_auth(token.as_str()),
            None => {
                trace!("No authenticated session, sending unsigned request");
                request
            }
        }
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        trace!(status = %status, "response");

        if status.is_success() {
            response.json::<R>().await.map_err(|e| {
                if e.is_decode() {
                    Error::InvalidInput(InvalidInputError::Body {
                        message: e.to_string(),
                    })
                } else {
                    transport_error(e)
                }
            })
        } else {
            Err(Error::Protocol(parse_error_response(response).await))
        }
    }
}

/// Map a reqwest failure onto the transport taxonomy.
pub(crate) fn transport_error(err: reqwest::Error) -> Error {
    let transport = if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connection {
            message: err.to_string(),
        }
    } else {
        TransportError::Http {
            message: err.to_string(),
        }
    };
    Error::Transport(transport)
}

/// Parse an error body of the form `{"detail": ...}`.
async fn parse_error_response(response: reqwest::Response) -> ProtocolError {
    let status = response.status().as_u16();

    let detail = match response.json::<serde_json::Value>().await {
        Ok(body) => match body.get("detail").or_else(|| body.get("message")) {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        },
        Err(_) => None,
    };

    ProtocolError::new(status, detail)
}
