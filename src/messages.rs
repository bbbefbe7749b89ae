//! Localized messages for API failures
//!
//! Only the handful of strings the gateway shows for failed requests. Full UI
//! catalogs live with the front-end.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// UI language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Uk,
    En,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Uk => "uk",
            Language::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    /// Accepts bare codes and region-tagged ones such as `en-US`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let primary = s.split(['-', '_']).next().unwrap_or_default();
        match primary.to_ascii_lowercase().as_str() {
            "uk" | "ua" => Ok(Language::Uk),
            "en" => Ok(Language::En),
            other => Err(format!("unsupported language: {}", other)),
        }
    }
}

/// Human-readable message for an HTTP status
pub fn status_message(status: u16, lang: Language) -> &'static str {
    match lang {
        Language::Uk => match status {
            400 => "Невірний запит",
            401 => "Неавторизований доступ",
            403 => "Доступ заборонено",
            404 => "Ресурс не знайдено",
            409 => "Конфлікт даних",
            422 => "Невірні дані",
            429 => "Забагато запитів",
            500 => "Внутрішня помилка сервера",
            502 => "Помилка шлюзу",
            503 => "Сервіс недоступний",
            _ => "Сталася невідома помилка",
        },
        Language::En => match status {
            400 => "Bad request",
            401 => "Unauthorized",
            403 => "Access denied",
            404 => "Resource not found",
            409 => "Data conflict",
            422 => "Invalid data",
            429 => "Too many requests",
            500 => "Internal server error",
            502 => "Bad gateway",
            503 => "Service unavailable",
            _ => "An unknown error occurred",
        },
    }
}

/// Message for a request that never reached the server
pub fn network_message(lang: Language) -> &'static str {
    match lang {
        Language::Uk => "Помилка мережі. Перевірте підключення до інтернету.",
        Language::En => "Network error. Check your internet connection.",
    }
}

/// Message for rejected demo credentials
pub fn invalid_credentials_message(lang: Language) -> &'static str {
    match lang {
        Language::Uk => "Невірний email або пароль",
        Language::En => "Invalid email or password",
    }
}

/// Pick the most specific message out of an error body.
///
/// FastAPI-style `detail` strings win, then `message`, then `error`.
/// Validation errors arrive as a `detail` list; their `msg` fields are joined.
pub fn server_message(body: &serde_json::Value) -> Option<String> {
    for field in ["detail", "message", "error"] {
        match body.get(field) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(serde_json::Value::Array(items)) if !items.is_empty() => {
                let joined = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .collect::<Vec<_>>()
                    .join("; ");
                if !joined.is_empty() {
                    return Some(joined);
                }
            }
            _ => {}
        }
    }
    None
}
