//! Well-known storage keys

/// Access token
pub const ACCESS_TOKEN: &str = "authToken";
/// Access token, older naming still read on startup
pub const LEGACY_ACCESS_TOKEN: &str = "access_token";
/// Refresh token
pub const REFRESH_TOKEN: &str = "refreshToken";
/// Refresh token, older naming
pub const LEGACY_REFRESH_TOKEN: &str = "refresh_token";
/// Cached user record as JSON
pub const USER: &str = "user";
/// Access token expiry in unix milliseconds
pub const TOKEN_EXPIRES_AT: &str = "tokenExpiresAt";
/// UI theme preference
pub const THEME: &str = "theme";
/// UI language preference
pub const LANGUAGE: &str = "i18nextLng";

/// Lookup order for the access token
pub const ACCESS_TOKEN_KEYS: &[&str] = &[ACCESS_TOKEN, LEGACY_ACCESS_TOKEN];

/// Lookup order for the refresh token
pub const REFRESH_TOKEN_KEYS: &[&str] = &[REFRESH_TOKEN, LEGACY_REFRESH_TOKEN];

/// Every key that belongs to a session, under both naming schemes
pub const SESSION_KEYS: &[&str] = &[
    ACCESS_TOKEN,
    LEGACY_ACCESS_TOKEN,
    REFRESH_TOKEN,
    LEGACY_REFRESH_TOKEN,
    USER,
    TOKEN_EXPIRES_AT,
];
