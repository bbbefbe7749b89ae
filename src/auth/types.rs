//! Types for authentication and user management

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User identifier. The backend issues UUIDs, older records and demo users
/// use integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Numeric(id) => write!(f, "{}", id),
            UserId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId::Numeric(id)
    }
}

/// Staff role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Lawyer,
    Assistant,
    Paralegal,
    Accountant,
    Viewer,
}

/// Coarse UI permission derived from a [`Role`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ReadUsers,
    WriteUsers,
    ReadCases,
    WriteCases,
    ReadClients,
    WriteClients,
    ReadDocuments,
    WriteDocuments,
    ReadInvoices,
    WriteInvoices,
    ReadReports,
    TrackTime,
    ReadSettings,
    WriteSettings,
}

impl Permission {
    pub const ALL: [Permission; 14] = [
        Permission::ReadUsers,
        Permission::WriteUsers,
        Permission::ReadCases,
        Permission::WriteCases,
        Permission::ReadClients,
        Permission::WriteClients,
        Permission::ReadDocuments,
        Permission::WriteDocuments,
        Permission::ReadInvoices,
        Permission::WriteInvoices,
        Permission::ReadReports,
        Permission::TrackTime,
        Permission::ReadSettings,
        Permission::WriteSettings,
    ];

    /// Dotted permission code, e.g. `cases.read`
    pub fn code(&self) -> &'static str {
        match self {
            Permission::ReadUsers => "users.read",
            Permission::WriteUsers => "users.write",
            Permission::ReadCases => "cases.read",
            Permission::WriteCases => "cases.write",
            Permission::ReadClients => "clients.read",
            Permission::WriteClients => "clients.write",
            Permission::ReadDocuments => "documents.read",
            Permission::WriteDocuments => "documents.write",
            Permission::ReadInvoices => "invoices.read",
            Permission::WriteInvoices => "invoices.write",
            Permission::ReadReports => "reports.read",
            Permission::TrackTime => "time.track",
            Permission::ReadSettings => "settings.read",
            Permission::WriteSettings => "settings.write",
        }
    }
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Lawyer,
        Role::Assistant,
        Role::Paralegal,
        Role::Accountant,
        Role::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Lawyer => "lawyer",
            Role::Assistant => "assistant",
            Role::Paralegal => "paralegal",
            Role::Accountant => "accountant",
            Role::Viewer => "viewer",
        }
    }

    /// Permissions granted to this role
    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;

        match self {
            Role::Admin => &Permission::ALL,
            Role::Lawyer => &[
                ReadCases,
                WriteCases,
                ReadClients,
                WriteClients,
                ReadDocuments,
                WriteDocuments,
                ReadInvoices,
                WriteInvoices,
                TrackTime,
                ReadSettings,
            ],
            Role::Paralegal => &[
                ReadCases,
                WriteCases,
                ReadClients,
                ReadDocuments,
                WriteDocuments,
                TrackTime,
            ],
            Role::Assistant => &[ReadCases, ReadClients, ReadDocuments, TrackTime],
            Role::Accountant => &[
                ReadCases,
                ReadClients,
                ReadInvoices,
                WriteInvoices,
                ReadReports,
            ],
            Role::Viewer => &[ReadCases, ReadClients, ReadDocuments, ReadInvoices],
        }
    }

    /// Whether this role holds `permission`
    pub fn can(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown role: {}", s))
    }
}

/// Per-user settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// User data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user ID
    pub id: UserId,

    /// The user's email address
    pub email: String,

    /// Display name
    pub full_name: String,

    /// The user's role
    pub role: Role,

    /// Whether the account is enabled
    #[serde(default = "default_active")]
    pub is_active: bool,

    /// The last sign-in time
    #[serde(default, alias = "last_login_at", skip_serializing_if = "Option::is_none")]
    pub last_login: Option<String>,

    /// The creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    /// The update time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    /// Phone, timezone and language, stored flat on the wire
    #[serde(flatten)]
    pub settings: UserSettings,
}

fn default_active() -> bool {
    true
}

impl User {
    /// Whether the user's role holds `permission`
    pub fn can(&self, permission: Permission) -> bool {
        self.is_active && self.role.can(permission)
    }
}

/// Profile fields a user may change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ProfileUpdate {
    /// Apply the changes to a cached user
    pub fn apply_to(&self, user: &mut User) {
        if let Some(ref full_name) = self.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(ref phone) = self.phone {
            user.settings.phone = Some(phone.clone());
        }
        if let Some(ref timezone) = self.timezone {
            user.settings.timezone = Some(timezone.clone());
        }
        if let Some(ref language) = self.language {
            user.settings.language = Some(language.clone());
        }
    }
}

/// Login credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
        }
    }
}

/// Registration data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

/// Login and registration response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The access token
    pub access_token: String,

    /// The refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// The token type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// The expiry time in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,

    /// The user data. The backend omits it on login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// Refresh endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub token_type: Option<String>,

    #[serde(default)]
    pub expires_in: Option<i64>,
}
