//! Authentication and session lifecycle

pub mod session;
pub mod types;

use chrono::Utc;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientOptions;
use crate::demo;
use crate::error::{Error, ErrorKind, Result};
use crate::gateway::{ApiGateway, ApiRequest, Reply};
use crate::messages;
use crate::sourced::Sourced;

pub use session::{AuthEvent, Session, SessionState};
pub use types::*;

/// Owns the authentication state of one client.
///
/// Cloning is cheap; clones share the session and the refresh timer.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    gateway: Arc<ApiGateway>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self
            .refresh_task
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
    }
}

impl SessionManager {
    /// Create a new session manager on top of `gateway`
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self {
            inner: Arc::new(Inner {
                gateway,
                refresh_task: Mutex::new(None),
            }),
        }
    }

    fn gateway(&self) -> &ApiGateway {
        &self.inner.gateway
    }

    fn state(&self) -> &SessionState {
        self.inner.gateway.state()
    }

    fn options(&self) -> &ClientOptions {
        self.inner.gateway.options()
    }

    fn unavailable(&self) -> Error {
        Error::Unavailable(messages::network_message(self.gateway().language()).to_string())
    }

    /// Sign in with email and password.
    ///
    /// If the backend is unreachable the demo account is tried instead and
    /// the session comes back tagged as demo.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<Sourced<Session>> {
        let request = ApiRequest::post("/auth/login")
            .auth_endpoint()
            .json(credentials)?;

        match self.gateway().execute::<AuthResponse>(request).await? {
            Reply::Data(response) => {
                let session = self.establish(response).await?;
                Ok(Sourced::Live(session))
            }
            Reply::Unavailable => {
                if !self.options().demo_fallback {
                    return Err(self.unavailable());
                }
                warn!(email = %credentials.email, "backend unreachable, trying demo login");
                let response =
                    demo::demo_login(credentials, Utc::now(), self.gateway().language())?;
                let session = self.establish(response).await?;
                Ok(Sourced::Demo(session))
            }
        }
    }

    /// Create an account and sign in to it
    pub async fn register(&self, data: &RegisterData) -> Result<Sourced<Session>> {
        let request = ApiRequest::post("/auth/register")
            .auth_endpoint()
            .json(data)?;

        match self.gateway().execute::<Value>(request).await? {
            Reply::Data(body) if body.get("access_token").is_some() => {
                let response: AuthResponse = serde_json::from_value(body)?;
                let session = self.establish(response).await?;
                Ok(Sourced::Live(session))
            }
            Reply::Data(_) => {
                debug!(email = %data.email, "account created without tokens, logging in");
                self.login(&LoginCredentials::new(&data.email, &data.password))
                    .await
            }
            Reply::Unavailable => {
                if !self.options().demo_fallback {
                    return Err(self.unavailable());
                }
                warn!(email = %data.email, "backend unreachable, registering demo account");
                let response = demo::demo_register(data, Utc::now())?;
                let session = self.establish(response).await?;
                Ok(Sourced::Demo(session))
            }
        }
    }

    /// Sign out.
    ///
    /// The server is told on a best-effort basis; local session keys are
    /// removed regardless.
    pub async fn logout(&self) -> Result<()> {
        self.end_session(AuthEvent::SignedOut).await
    }

    /// Replace the access token.
    ///
    /// Demo sessions mint a fresh synthetic token. A live refresh the server
    /// rejects ends the session and emits [`AuthEvent::SessionExpired`].
    pub async fn refresh_token(&self) -> Result<Sourced<Session>> {
        let current = self.state().get().ok_or(Error::MissingSession)?;

        if current.is_demo_mode() {
            let now = Utc::now();
            let (access_token, refresh_token) = session::mint_demo_tokens(now);
            let expires_at = session::token_expiry(
                &access_token,
                None,
                self.options().default_token_lifetime,
            );
            let refreshed = self
                .state()
                .update_tokens(access_token, Some(refresh_token), expires_at)?;
            self.state().emit(AuthEvent::TokenRefreshed);
            self.schedule_refresh(&refreshed);
            return Ok(Sourced::Demo(refreshed));
        }

        match self.gateway().refresh_access_token().await {
            Ok(Reply::Data(_)) => {
                let refreshed = self.state().get().ok_or(Error::MissingSession)?;
                self.schedule_refresh(&refreshed);
                Ok(Sourced::Live(refreshed))
            }
            Ok(Reply::Unavailable) => {
                warn!("backend unreachable, keeping current token");
                Err(self.unavailable())
            }
            Err(e) if self.state().get().is_none() => {
                debug!(error = %e, "session ended while refreshing");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "token refresh rejected, ending session");
                let redirect_to = self.options().login_path.clone();
                if let Err(clear_err) = self
                    .end_session(AuthEvent::SessionExpired { redirect_to })
                    .await
                {
                    warn!(error = %clear_err, "failed to clear session");
                }
                Err(e)
            }
        }
    }

    /// Fetch the signed-in user.
    ///
    /// In demo mode, or when the backend is unreachable, the cached user is
    /// returned tagged as demo.
    pub async fn get_profile(&self) -> Result<Sourced<User>> {
        let current = self.state().get().ok_or(Error::MissingSession)?;
        if current.is_demo_mode() {
            return Ok(Sourced::Demo(current.user().clone()));
        }

        match self.gateway().execute::<User>(ApiRequest::get("/auth/me")).await? {
            Reply::Data(user) => {
                self.cache_user(&user)?;
                Ok(Sourced::Live(user))
            }
            Reply::Unavailable if self.options().demo_fallback => {
                debug!("backend unreachable, serving cached profile");
                let cached = self.state().get().ok_or(Error::MissingSession)?;
                Ok(Sourced::Demo(cached.user().clone()))
            }
            Reply::Unavailable => Err(self.unavailable()),
        }
    }

    /// Change profile fields of the signed-in user
    pub async fn update_profile(&self, changes: &ProfileUpdate) -> Result<Sourced<User>> {
        let current = self.state().get().ok_or(Error::MissingSession)?;

        if current.is_demo_mode() {
            let mut user = current.user().clone();
            changes.apply_to(&mut user);
            self.cache_user(&user)?;
            return Ok(Sourced::Demo(user));
        }

        let request = ApiRequest::patch("/auth/me").json(changes)?;
        match self.gateway().execute::<User>(request).await? {
            Reply::Data(user) => {
                self.cache_user(&user)?;
                Ok(Sourced::Live(user))
            }
            Reply::Unavailable => Err(self.unavailable()),
        }
    }

    /// Load the persisted session at startup.
    ///
    /// Demo sessions are kept while their token is younger than a day. Live
    /// sessions are checked against `/auth/me`; the gateway refreshes a
    /// rejected token, and a failed refresh leaves no session. An unreachable
    /// backend keeps the stored session as is.
    pub async fn restore(&self) -> Result<Option<Sourced<Session>>> {
        let Some(stored) = self.state().load(self.options().default_token_lifetime)? else {
            debug!("no stored session");
            return Ok(None);
        };

        if stored.is_demo_mode() {
            if stored.is_expired() {
                info!("stored demo session is older than a day, discarding");
                self.state().clear()?;
                return Ok(None);
            }
            self.schedule_refresh(&stored);
            return Ok(Some(Sourced::Demo(stored)));
        }

        match self.gateway().execute::<User>(ApiRequest::get("/auth/me")).await {
            Ok(Reply::Data(user)) => {
                self.cache_user(&user)?;
            }
            Ok(Reply::Unavailable) => {
                info!("backend unreachable, keeping stored session");
            }
            Err(e) if e.kind() == Some(ErrorKind::Authentication) => {
                info!(error = %e, "stored session rejected");
                self.cancel_refresh();
                self.state().clear()?;
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "could not validate stored session, keeping it");
            }
        }

        let Some(session) = self.state().get() else {
            return Ok(None);
        };
        self.schedule_refresh(&session);
        Ok(Some(Sourced::Live(session)))
    }

    /// Get the current session
    pub fn session(&self) -> Option<Session> {
        self.state().get()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state().get().map(|s| s.user().clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    pub fn is_demo_mode(&self) -> bool {
        self.state().is_demo()
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.state().subscribe()
    }

    /// Turn a login or registration response into the current session
    async fn establish(&self, response: AuthResponse) -> Result<Session> {
        let user = match response.user {
            Some(user) => user,
            None => self.fetch_user_with(&response.access_token).await?,
        };

        let expires_at = session::token_expiry(
            &response.access_token,
            response.expires_in,
            self.options().default_token_lifetime,
        );
        let new_session =
            Session::new(response.access_token, response.refresh_token, expires_at, user)?;
        self.state().set(new_session.clone())?;

        info!(
            email = %new_session.user().email,
            demo = new_session.is_demo_mode(),
            "signed in"
        );
        self.state().emit(AuthEvent::SignedIn {
            email: new_session.user().email.clone(),
            demo: new_session.is_demo_mode(),
        });
        self.schedule_refresh(&new_session);
        Ok(new_session)
    }

    async fn fetch_user_with(&self, access_token: &str) -> Result<User> {
        let request = ApiRequest::get("/auth/me")
            .auth_endpoint()
            .bearer(access_token);

        self.gateway()
            .execute::<User>(request)
            .await?
            .into_data()
            .ok_or_else(|| self.unavailable())
    }

    fn cache_user(&self, user: &User) -> Result<()> {
        let changed = self.current_user().as_ref() != Some(user);
        self.state().update_user(user.clone())?;
        if changed {
            self.state().emit(AuthEvent::ProfileUpdated);
        }
        Ok(())
    }

    async fn end_session(&self, event: AuthEvent) -> Result<()> {
        self.cancel_refresh();

        if let Some(current) = self.state().get() {
            if !current.is_demo_mode() {
                let request = ApiRequest::post("/auth/logout")
                    .auth_endpoint()
                    .bearer(current.access_token());
                match self.gateway().execute_unit(request).await {
                    Ok(Reply::Data(())) => debug!("server session closed"),
                    Ok(Reply::Unavailable) => debug!("backend unreachable, skipping server logout"),
                    Err(e) => warn!(error = %e, "server logout failed"),
                }
            }
        }

        let cleared = self.state().clear();
        info!("signed out");
        self.state().emit(event);
        cleared
    }

    /// Start (or restart) the timer that refreshes the token shortly before
    /// it expires
    fn schedule_refresh(&self, session: &Session) {
        if !self.options().auto_refresh_token {
            return;
        }

        let delay = refresh_delay(session.time_to_expiry(), self.options().refresh_leeway);
        debug!(delay_secs = delay.as_secs(), "scheduling token refresh");

        // The slot stays locked until the new handle is stored, so the timer
        // task can never observe the previous handle.
        let mut slot = self
            .inner
            .refresh_task
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let weak = Arc::downgrade(&self.inner);
        *slot = Some(tokio::spawn(run_refresh_timer(weak, delay)));
    }

    fn cancel_refresh(&self) {
        let task = self
            .inner
            .refresh_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

/// Shortest wait before a proactive refresh
const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);

/// How long to wait before refreshing a token with `remaining` lifetime.
///
/// Tokens that outlive the leeway refresh `leeway` before expiry. Shorter
/// tokens refresh at half their remaining lifetime, but never sooner than
/// [`MIN_REFRESH_DELAY`].
fn refresh_delay(remaining: Duration, leeway: Duration) -> Duration {
    if remaining > leeway {
        remaining - leeway
    } else {
        (remaining / 2).max(MIN_REFRESH_DELAY)
    }
}

/// Sleeps until the refresh is due, then refreshes through a fresh handle.
/// Boxed because the task and `refresh_token` reference each other.
fn run_refresh_timer(
    inner: Weak<Inner>,
    delay: Duration,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        tokio::time::sleep(delay).await;

        let Some(inner) = inner.upgrade() else {
            return;
        };
        // Detach from the slot so rescheduling does not abort this task
        inner
            .refresh_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let manager = SessionManager { inner };
        match manager.refresh_token().await {
            Ok(_) => debug!("scheduled token refresh done"),
            Err(e) => warn!(error = %e, "scheduled token refresh failed"),
        }
    })
}
