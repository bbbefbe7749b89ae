//! CRM services: cases, clients, tasks, invoices, reports and admin users
//!
//! Every call goes through the [`ApiGateway`]. When the gateway reports the
//! backend unavailable the call is answered from the in-memory
//! [`DemoStore`] and tagged [`Sourced::Demo`].

pub mod cases;
pub mod clients;
pub mod invoices;
pub mod reports;
pub mod tasks;
pub mod types;
pub mod users;

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use crate::demo::DemoStore;
use crate::error::{Error, Result};
use crate::gateway::{ApiGateway, ApiRequest, Reply};
use crate::messages;
use crate::sourced::Sourced;

pub use cases::Cases;
pub use clients::Clients;
pub use invoices::Invoices;
pub use reports::{DateRange, Reports};
pub use tasks::Tasks;
pub use types::*;
pub use users::Users;

/// Gateway plus demo dataset, shared by every service
#[derive(Clone)]
pub(crate) struct Backend {
    gateway: Arc<ApiGateway>,
    demo: Arc<DemoStore>,
}

impl Backend {
    pub(crate) fn new(gateway: Arc<ApiGateway>, demo: Arc<DemoStore>) -> Self {
        Self { gateway, demo }
    }

    /// Demo sessions always use demo data. Otherwise reads fall back when
    /// fallback is enabled, writes only when there is no live session.
    fn demo_allowed(&self, access: Access) -> bool {
        let state = self.gateway.state();
        if state.is_demo() {
            return true;
        }
        match access {
            Access::Read => self.gateway.options().demo_fallback,
            Access::Write => self.gateway.options().demo_fallback && !state.is_authenticated(),
        }
    }

    /// Tag a gateway reply, answering from the demo dataset if the backend
    /// was unreachable
    pub(crate) fn settle<T, F>(&self, reply: Reply<T>, access: Access, demo: F) -> Result<Sourced<T>>
    where
        F: FnOnce(&DemoStore) -> Result<T>,
    {
        match reply {
            Reply::Data(data) => Ok(Sourced::Live(data)),
            Reply::Unavailable if self.demo_allowed(access) => demo(&self.demo).map(Sourced::Demo),
            Reply::Unavailable => Err(Error::Unavailable(
                messages::network_message(self.gateway.language()).to_string(),
            )),
        }
    }

    /// Run `request`, falling back to `demo`
    pub(crate) async fn fetch<T, F>(&self, request: ApiRequest, demo: F) -> Result<Sourced<T>>
    where
        T: DeserializeOwned,
        F: FnOnce(&DemoStore) -> Result<T>,
    {
        debug!(path = request.path(), "CRM request");
        let access = Access::of(&request);
        let reply = self.gateway.execute::<T>(request).await?;
        self.settle(reply, access, demo)
    }

    /// Run a request whose response body is ignored
    pub(crate) async fn send<F>(&self, request: ApiRequest, demo: F) -> Result<Sourced<()>>
    where
        F: FnOnce(&DemoStore) -> Result<()>,
    {
        debug!(path = request.path(), "CRM request");
        let access = Access::of(&request);
        let reply = self.gateway.execute_unit(request).await?;
        self.settle(reply, access, demo)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Read,
    Write,
}

impl Access {
    fn of(request: &ApiRequest) -> Self {
        if request.is_read() {
            Access::Read
        } else {
            Access::Write
        }
    }
}

/// Case-insensitive substring match
pub(crate) fn matches_text(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Whether any of `fields` matches the search term of `params`
pub(crate) fn matches_search<'a, I>(params: &PageParams, fields: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    match params.search.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(term) => fields.into_iter().any(|field| matches_text(field, term)),
    }
}
