//! Session management for authentication

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use lexcrm_storage::{keys, KeyValueStore, KeyValueStoreExt};

use crate::auth::types::User;
use crate::error::{Error, Result};

/// Prefix of every synthetic access token
pub const DEMO_TOKEN_PREFIX: &str = "demo-token-";

/// Prefix of every synthetic refresh token
pub const DEMO_REFRESH_TOKEN_PREFIX: &str = "demo-refresh-token-";

/// How long a demo token stays valid
pub const DEMO_TOKEN_TTL_HOURS: i64 = 24;

/// Session data
///
/// A session always carries a non-empty access token and a user; the
/// constructor refuses anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
    user: User,
}

impl Session {
    /// Create a new session
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
        user: User,
    ) -> Result<Self> {
        if access_token.trim().is_empty() {
            return Err(Error::auth("access token is empty"));
        }
        if user.email.trim().is_empty() {
            return Err(Error::auth("session user has no email"));
        }

        Ok(Self {
            access_token,
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            expires_at,
            user,
        })
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    /// Whether this session runs on synthetic demo data
    pub fn is_demo_mode(&self) -> bool {
        is_demo_token(&self.access_token)
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Time left until expiry, zero once expired
    pub fn time_to_expiry(&self) -> std::time::Duration {
        (self.expires_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }
}

/// Whether `token` was minted locally for demo mode
pub fn is_demo_token(token: &str) -> bool {
    token.starts_with(DEMO_TOKEN_PREFIX)
}

/// Mint a demo access/refresh token pair stamped with `now`
pub fn mint_demo_tokens(now: DateTime<Utc>) -> (String, String) {
    let millis = now.timestamp_millis();
    (
        format!("{}{}", DEMO_TOKEN_PREFIX, millis),
        format!("{}{}", DEMO_REFRESH_TOKEN_PREFIX, millis),
    )
}

/// Work out when an access token expires.
///
/// Demo tokens carry their mint time and live for a day. Live tokens use the
/// server's `expires_in`, then the JWT `exp` claim, then `default_lifetime`.
pub fn token_expiry(
    access_token: &str,
    expires_in: Option<i64>,
    default_lifetime: std::time::Duration,
) -> DateTime<Utc> {
    if let Some(minted) = demo_token_minted_at(access_token) {
        return minted + Duration::hours(DEMO_TOKEN_TTL_HOURS);
    }

    if let Some(secs) = expires_in.filter(|s| *s > 0) {
        return Utc::now() + Duration::seconds(secs);
    }

    match jwt_expiry(access_token) {
        Ok(exp) => return exp,
        Err(e) => debug!(error = %e, "no usable exp claim, assuming default lifetime"),
    }

    let fallback = Duration::from_std(default_lifetime).unwrap_or_else(|_| Duration::minutes(30));
    Utc::now() + fallback
}

fn demo_token_minted_at(token: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = token.strip_prefix(DEMO_TOKEN_PREFIX)?.parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

#[derive(Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

/// Read the `exp` claim of a JWT without verifying the signature; the
/// client never holds the signing key.
pub fn jwt_expiry(token: &str) -> Result<DateTime<Utc>> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data =
        jsonwebtoken::decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Utc.timestamp_opt(data.claims.exp, 0)
        .single()
        .ok_or_else(|| Error::auth(format!("exp claim out of range: {}", data.claims.exp)))
}

/// Session lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A session was established
    SignedIn { email: String, demo: bool },
    /// The access token was replaced
    TokenRefreshed,
    /// The cached user changed
    ProfileUpdated,
    /// The user logged out
    SignedOut,
    /// The session was dropped because it could not be refreshed; the UI
    /// should navigate to `redirect_to`
    SessionExpired { redirect_to: String },
}

/// Shared, persisted session state.
///
/// The session manager and the API gateway both hold an `Arc` of this. Every
/// change is written through to the key/value store.
pub struct SessionState {
    session: RwLock<Option<Session>>,
    store: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionState {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            session: RwLock::new(None),
            store,
            events,
        }
    }

    /// The backing store
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Get the current session
    pub fn get(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.get().map(|s| s.access_token)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.get().and_then(|s| s.refresh_token)
    }

    pub fn is_authenticated(&self) -> bool {
        self.get().is_some()
    }

    pub fn is_demo(&self) -> bool {
        self.get().map(|s| s.is_demo_mode()).unwrap_or(false)
    }

    /// Replace the session and persist it
    pub fn set(&self, session: Session) -> Result<()> {
        self.persist(&session)?;
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
        Ok(())
    }

    /// Swap in a refreshed token set, keeping the user
    pub fn update_tokens(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Result<Session> {
        let current = self.get().ok_or(Error::MissingSession)?;
        let refresh_token = refresh_token.or(current.refresh_token);
        let session = Session::new(access_token, refresh_token, expires_at, current.user)?;
        self.set(session.clone())?;
        Ok(session)
    }

    /// Replace the cached user, keeping the tokens
    pub fn update_user(&self, user: User) -> Result<()> {
        let mut current = self.get().ok_or(Error::MissingSession)?;
        current.user = user;
        self.set(current)
    }

    /// Drop the session from memory and from the store.
    ///
    /// Memory is cleared first so the client is logged out even if the store
    /// fails to remove its keys.
    pub fn clear(&self) -> Result<()> {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.store.remove_many(keys::SESSION_KEYS)?;
        debug!("session cleared");
        Ok(())
    }

    /// Clear the session after a failed refresh and tell listeners where to go
    pub fn expire(&self, redirect_to: &str) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "failed to clear expired session from storage");
        }
        self.emit(AuthEvent::SessionExpired {
            redirect_to: redirect_to.to_string(),
        });
    }

    /// Load a persisted session into memory.
    ///
    /// Token keys are read under both naming schemes. A missing or unreadable
    /// user record means there is no session.
    pub fn load(&self, default_lifetime: std::time::Duration) -> Result<Option<Session>> {
        let Some(access_token) = self.store.get_any(keys::ACCESS_TOKEN_KEYS)? else {
            return Ok(None);
        };

        let user = match self.store.get_json::<User>(keys::USER) {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("stored token without user, ignoring");
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "stored user record is unreadable, ignoring");
                return Ok(None);
            }
        };

        let refresh_token = self.store.get_any(keys::REFRESH_TOKEN_KEYS)?;
        let expires_at = self
            .store
            .get(keys::TOKEN_EXPIRES_AT)?
            .and_then(|raw| raw.parse::<i64>().ok())
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .unwrap_or_else(|| token_expiry(&access_token, None, default_lifetime));

        let session = match Session::new(access_token, refresh_token, expires_at, user) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "stored session is invalid, ignoring");
                return Ok(None);
            }
        };

        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
        Ok(Some(session))
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: AuthEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }

    fn persist(&self, session: &Session) -> Result<()> {
        self.store.set(keys::ACCESS_TOKEN, &session.access_token)?;
        match session.refresh_token {
            Some(ref token) => self.store.set(keys::REFRESH_TOKEN, token)?,
            None => self.store.remove(keys::REFRESH_TOKEN)?,
        }
        self.store.set_json(keys::USER, &session.user)?;
        self.store.set(
            keys::TOKEN_EXPIRES_AT,
            &session.expires_at.timestamp_millis().to_string(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::{Role, UserId, UserSettings};
    use lexcrm_storage::MemoryStore;
    use std::time::Duration as StdDuration;

    fn user(email: &str) -> User {
        User {
            id: UserId::Numeric(1),
            email: email.to_string(),
            full_name: "Test User".to_string(),
            role: Role::Lawyer,
            is_active: true,
            last_login: None,
            created_at: None,
            updated_at: None,
            settings: UserSettings::default(),
        }
    }

    fn jwt_with_exp(exp: i64) -> String {
        use jsonwebtoken::{encode, EncodingKey, Header};
        let claims = serde_json::json!({ "sub": "a@b.c", "exp": exp });
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"server-secret")).unwrap()
    }

    #[test]
    fn test_jwt_expiry_errors() {
        assert!(matches!(jwt_expiry("live-access"), Err(Error::Jwt(_))));

        let exp = (Utc::now() + Duration::minutes(5)).timestamp();
        assert_eq!(jwt_expiry(&jwt_with_exp(exp)).unwrap().timestamp(), exp);
    }

    #[test]
    fn test_session_rejects_empty_token() {
        let result = Session::new(String::new(), None, Utc::now(), user("a@b.c"));
        assert!(result.is_err());
        let result = Session::new("t".to_string(), None, Utc::now(), user(""));
        assert!(result.is_err());
    }

    #[test]
    fn test_demo_token_expiry() {
        let now = Utc::now();
        let (access, refresh) = mint_demo_tokens(now);
        assert!(access.starts_with(DEMO_TOKEN_PREFIX));
        assert!(refresh.starts_with(DEMO_REFRESH_TOKEN_PREFIX));
        assert!(is_demo_token(&access));
        assert!(!is_demo_token(&refresh));

        let expiry = token_expiry(&access, Some(60), StdDuration::from_secs(1800));
        let expected = Utc
            .timestamp_millis_opt(now.timestamp_millis())
            .unwrap()
            + Duration::hours(DEMO_TOKEN_TTL_HOURS);
        assert_eq!(expiry, expected);
    }

    #[test]
    fn test_live_token_expiry_sources() {
        let before = Utc::now();
        let from_expires_in = token_expiry("opaque", Some(120), StdDuration::from_secs(1800));
        assert!(from_expires_in >= before + Duration::seconds(120));
        assert!(from_expires_in <= Utc::now() + Duration::seconds(120));

        let exp = (Utc::now() + Duration::minutes(10)).timestamp();
        let from_jwt = token_expiry(&jwt_with_exp(exp), None, StdDuration::from_secs(1800));
        assert_eq!(from_jwt.timestamp(), exp);

        let fallback = token_expiry("opaque", None, StdDuration::from_secs(1800));
        assert!(fallback >= before + Duration::minutes(30));
    }

    #[test]
    fn test_state_persists_and_loads() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let state = SessionState::new(store.clone());
        let expires_at = Utc.timestamp_millis_opt(Utc::now().timestamp_millis() + 60_000).unwrap();

        let session = Session::new(
            "live-token".to_string(),
            Some("refresh".to_string()),
            expires_at,
            user("a@b.c"),
        )
        .unwrap();
        state.set(session.clone()).unwrap();

        assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), Some("live-token".to_string()));
        assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap(), Some("refresh".to_string()));

        let fresh = SessionState::new(store);
        let loaded = fresh.load(StdDuration::from_secs(1800)).unwrap();
        assert_eq!(loaded, Some(session));
        assert!(fresh.is_authenticated());
        assert!(!fresh.is_demo());
    }

    #[test]
    fn test_load_reads_legacy_keys() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(keys::LEGACY_ACCESS_TOKEN, "legacy").unwrap();
        store.set(keys::LEGACY_REFRESH_TOKEN, "legacy-refresh").unwrap();
        store.set_json(keys::USER, &user("a@b.c")).unwrap();

        let state = SessionState::new(store);
        let loaded = state.load(StdDuration::from_secs(1800)).unwrap().unwrap();
        assert_eq!(loaded.access_token(), "legacy");
        assert_eq!(loaded.refresh_token(), Some("legacy-refresh"));
    }

    #[test]
    fn test_load_ignores_corrupt_user() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(keys::ACCESS_TOKEN, "token").unwrap();
        store.set(keys::USER, "{broken").unwrap();

        let state = SessionState::new(store);
        assert!(state.load(StdDuration::from_secs(1800)).unwrap().is_none());
        assert!(!state.is_authenticated());
    }

    #[test]
    fn test_clear_removes_every_session_key() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        for key in keys::SESSION_KEYS {
            store.set(key, "x").unwrap();
        }
        store.set(keys::THEME, "dark").unwrap();

        let state = SessionState::new(store.clone());
        state.clear().unwrap();

        assert_eq!(store.keys().unwrap(), vec![keys::THEME.to_string()]);
    }

    #[tokio::test]
    async fn test_expire_emits_redirect() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let state = SessionState::new(store);
        let mut events = state.subscribe();

        state.expire("/login");

        assert_eq!(
            events.recv().await.unwrap(),
            AuthEvent::SessionExpired {
                redirect_to: "/login".to_string()
            }
        );
    }
}
