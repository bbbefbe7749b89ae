//! API gateway: the single path every REST call takes
//!
//! The gateway attaches the bearer token, refreshes once on 401 and replays
//! the request, and reports an unreachable backend as [`Reply::Unavailable`]
//! instead of an error so callers can switch to demo data.

use reqwest::{Client, Method, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::session::{token_expiry, AuthEvent, SessionState};
use crate::auth::types::TokenResponse;
use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::fetch::FetchBuilder;
use crate::messages::{self, Language};
use crate::preferences::Preferences;

/// Outcome of a gateway call that reached no error
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    /// The server answered
    Data(T),
    /// The backend could not be reached (or the session is a demo session)
    Unavailable,
}

impl<T> Reply<T> {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Reply::Unavailable)
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Reply<U> {
        match self {
            Reply::Data(data) => Reply::Data(f(data)),
            Reply::Unavailable => Reply::Unavailable,
        }
    }

    /// The data, if the server answered
    pub fn into_data(self) -> Option<T> {
        match self {
            Reply::Data(data) => Some(data),
            Reply::Unavailable => None,
        }
    }
}

/// Description of one REST call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    bearer: Option<String>,
    auth_endpoint: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: Vec::new(),
            body: None,
            bearer: None,
            auth_endpoint: false,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &str) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: &str) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append query parameters
    pub fn query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Mark the call as part of the login flow: a 401 here means bad
    /// credentials, so no refresh is attempted, and demo sessions still hit
    /// the network.
    pub fn auth_endpoint(mut self) -> Self {
        self.auth_endpoint = true;
        self
    }

    /// Send `token` instead of the session's access token. A 401 on such a
    /// request is returned as is.
    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the call only reads data
    pub fn is_read(&self) -> bool {
        self.method == Method::GET
    }
}

/// Thin HTTP client wrapper shared by every service
pub struct ApiGateway {
    http_client: Client,
    base_url: String,
    state: Arc<SessionState>,
    preferences: Preferences,
    options: ClientOptions,
}

impl ApiGateway {
    /// Create a new gateway
    pub fn new(http_client: Client, state: Arc<SessionState>, options: ClientOptions) -> Self {
        Self {
            http_client,
            base_url: options.api_base(),
            preferences: Preferences::new(state.store().clone()),
            state,
            options,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// Language for error messages: the stored preference, else the
    /// configured default
    pub fn language(&self) -> Language {
        match self.preferences.language() {
            Ok(Some(language)) => language,
            Ok(None) => self.options.language,
            Err(e) => {
                debug!(error = %e, "could not read language preference");
                self.options.language
            }
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn builder(&self, request: &ApiRequest) -> Result<FetchBuilder<'_>> {
        let mut fetch = FetchBuilder::new(&self.http_client, &self.endpoint(&request.path), request.method.clone())
            .query(request.query.iter().cloned());
        if let Some(ref body) = request.body {
            fetch = fetch.json(body)?;
        }
        Ok(fetch)
    }

    /// Execute a request and deserialize the JSON response
    pub async fn execute<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Reply<T>> {
        if !request.auth_endpoint && self.state.is_demo() {
            debug!(path = %request.path, "demo session, skipping network");
            return Ok(Reply::Unavailable);
        }

        let fetch = self.builder(&request)?;
        let token = match request.bearer {
            Some(ref token) => Some(token.clone()),
            None if request.auth_endpoint => None,
            None => self.state.access_token(),
        };
        let first = match token {
            Some(ref token) => fetch.clone().bearer_auth(token),
            None => fetch.clone(),
        };

        debug!(method = %request.method, path = %request.path, "API request");
        let response = match self.send(&first).await? {
            Reply::Data(response) => response,
            Reply::Unavailable => return Ok(Reply::Unavailable),
        };

        let response = if response.status() == StatusCode::UNAUTHORIZED
            && !request.auth_endpoint
            && request.bearer.is_none()
            && self.state.is_authenticated()
        {
            match self.recover_unauthorized(&request).await? {
                Reply::Data(new_token) => {
                    debug!(path = %request.path, "replaying request with refreshed token");
                    match self.send(&fetch.bearer_auth(&new_token)).await? {
                        Reply::Data(response) => response,
                        Reply::Unavailable => return Ok(Reply::Unavailable),
                    }
                }
                Reply::Unavailable => return Ok(Reply::Unavailable),
            }
        } else {
            response
        };

        self.read_json(response).await.map(Reply::Data)
    }

    /// Execute a request whose response body is irrelevant
    pub async fn execute_unit(&self, request: ApiRequest) -> Result<Reply<()>> {
        Ok(self.execute::<IgnoredAny>(request).await?.map(|_| ()))
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// On success the session state is updated. Connection failure yields
    /// `Reply::Unavailable`; any server rejection is an error and leaves the
    /// session untouched.
    pub async fn refresh_access_token(&self) -> Result<Reply<TokenResponse>> {
        let refresh_token = self.state.refresh_token().ok_or(Error::MissingSession)?;

        let fetch = FetchBuilder::new(&self.http_client, &self.endpoint("/auth/refresh"), Method::POST)
            .bearer_auth(&refresh_token)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))?;

        let response = match self.send(&fetch).await? {
            Reply::Data(response) => response,
            Reply::Unavailable => return Ok(Reply::Unavailable),
        };
        let tokens: TokenResponse = self.read_json(response).await?;

        let expires_at = token_expiry(
            &tokens.access_token,
            tokens.expires_in,
            self.options.default_token_lifetime,
        );
        self.state
            .update_tokens(tokens.access_token.clone(), tokens.refresh_token.clone(), expires_at)?;

        info!("access token refreshed");
        self.state.emit(AuthEvent::TokenRefreshed);
        Ok(Reply::Data(tokens))
    }

    /// One refresh attempt after a 401. Failure drops the session.
    async fn recover_unauthorized(&self, request: &ApiRequest) -> Result<Reply<String>> {
        debug!(path = %request.path, "401 received, attempting token refresh");

        match self.refresh_access_token().await {
            Ok(Reply::Data(tokens)) => Ok(Reply::Data(tokens.access_token)),
            Ok(Reply::Unavailable) => Ok(Reply::Unavailable),
            Err(e) => {
                warn!(error = %e, "token refresh failed, dropping session");
                self.state.expire(&self.options.login_path);
                Err(Error::api(
                    401,
                    messages::status_message(401, self.language()),
                ))
            }
        }
    }

    async fn send(&self, fetch: &FetchBuilder<'_>) -> Result<Reply<reqwest::Response>> {
        match fetch.send().await {
            Ok(response) => Ok(Reply::Data(response)),
            Err(Error::Http(e)) if e.is_connect() => {
                info!(url = %fetch.url(), error = %e, "backend unreachable");
                Ok(Reply::Unavailable)
            }
            Err(e) => {
                warn!(url = %fetch.url(), error = %e, "request failed");
                Err(e)
            }
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap_or_default();
            let message = messages::server_message(&body).unwrap_or_else(|| {
                messages::status_message(status.as_u16(), self.language()).to_string()
            });
            warn!(status = status.as_u16(), %message, "API error");
            return Err(Error::api(status.as_u16(), message));
        }

        // 204 and empty bodies read as JSON null
        let raw: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        Ok(serde_json::from_slice(raw)?)
    }
}
