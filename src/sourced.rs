//! Tagging results with where they came from

use serde::Serialize;

/// Data returned by a client call, tagged with its origin.
///
/// Together with the surrounding `Result` this gives callers three cases:
/// live data, demo data, or an error. Demo data is synthetic and must never
/// be treated as authoritative.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", content = "data", rename_all = "lowercase")]
pub enum Sourced<T> {
    /// Returned by the backend
    Live(T),
    /// Substituted from the local demo dataset
    Demo(T),
}

impl<T> Sourced<T> {
    pub fn is_live(&self) -> bool {
        matches!(self, Sourced::Live(_))
    }

    pub fn is_demo(&self) -> bool {
        matches!(self, Sourced::Demo(_))
    }

    /// Borrow the data regardless of origin
    pub fn data(&self) -> &T {
        match self {
            Sourced::Live(data) | Sourced::Demo(data) => data,
        }
    }

    /// Take the data regardless of origin
    pub fn into_inner(self) -> T {
        match self {
            Sourced::Live(data) | Sourced::Demo(data) => data,
        }
    }

    /// Take the data only if it came from the backend
    pub fn live(self) -> Option<T> {
        match self {
            Sourced::Live(data) => Some(data),
            Sourced::Demo(_) => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Sourced<U> {
        match self {
            Sourced::Live(data) => Sourced::Live(f(data)),
            Sourced::Demo(data) => Sourced::Demo(f(data)),
        }
    }
}
