//! LexCRM Rust Client Library
//!
//! A Rust client for the LexCRM law-practice API: session management with
//! token refresh, case, client, task, invoice, report and user services, and
//! an offline demo mode that serves synthetic data when the backend cannot be
//! reached.

pub mod auth;
pub mod config;
pub mod crm;
pub mod demo;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod messages;
pub mod network;
pub mod preferences;
pub mod sourced;

use reqwest::Client;
use std::sync::Arc;

use lexcrm_storage::{KeyValueStore, MemoryStore};

use crate::auth::{SessionManager, SessionState};
use crate::config::ClientOptions;
use crate::crm::{Backend, Cases, Clients, Invoices, Reports, Tasks, Users};
use crate::demo::DemoStore;
use crate::error::Result;
use crate::gateway::ApiGateway;
use crate::preferences::Preferences;

/// The main entry point for the LexCRM client
pub struct LexCrm {
    /// HTTP client used for requests
    pub http_client: Client,
    /// Client options
    pub options: ClientOptions,
    gateway: Arc<ApiGateway>,
    auth: SessionManager,
    backend: Backend,
    preferences: Preferences,
}

impl LexCrm {
    /// Create a client with default options and an in-memory session store
    ///
    /// # Example
    ///
    /// ```
    /// use lexcrm_client::LexCrm;
    ///
    /// let crm = LexCrm::new().unwrap();
    /// assert!(!crm.auth().is_authenticated());
    /// ```
    pub fn new() -> Result<Self> {
        Self::new_with_options(ClientOptions::default())
    }

    /// Create a client with custom options and an in-memory session store
    ///
    /// # Example
    ///
    /// ```
    /// use lexcrm_client::{LexCrm, config::ClientOptions};
    ///
    /// let options = ClientOptions::default()
    ///     .with_api_url("https://crm.example.com")
    ///     .with_demo_fallback(false);
    /// let crm = LexCrm::new_with_options(options).unwrap();
    /// ```
    pub fn new_with_options(options: ClientOptions) -> Result<Self> {
        Self::with_store(options, Arc::new(MemoryStore::new()))
    }

    /// Create a client whose session and preferences live in `store`
    pub fn with_store(options: ClientOptions, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        options.validate()?;

        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let state = Arc::new(SessionState::new(store.clone()));
        let gateway = Arc::new(ApiGateway::new(
            http_client.clone(),
            state,
            options.clone(),
        ));
        let backend = Backend::new(gateway.clone(), Arc::new(DemoStore::seeded()));

        Ok(Self {
            http_client,
            options,
            auth: SessionManager::new(gateway.clone()),
            gateway,
            backend,
            preferences: Preferences::new(store),
        })
    }

    /// Get a reference to the session manager
    pub fn auth(&self) -> &SessionManager {
        &self.auth
    }

    /// The gateway all services send their requests through
    pub fn gateway(&self) -> &ApiGateway {
        &self.gateway
    }

    pub fn cases(&self) -> Cases {
        Cases::new(self.backend.clone())
    }

    pub fn clients(&self) -> Clients {
        Clients::new(self.backend.clone())
    }

    pub fn tasks(&self) -> Tasks {
        Tasks::new(self.backend.clone())
    }

    pub fn invoices(&self) -> Invoices {
        Invoices::new(self.backend.clone())
    }

    pub fn reports(&self) -> Reports {
        Reports::new(self.backend.clone())
    }

    /// Admin user management
    pub fn users(&self) -> Users {
        Users::new(self.backend.clone())
    }

    /// Theme and language preferences
    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Whether the backend answers its health check
    pub async fn check_connectivity(&self) -> bool {
        network::check_connectivity(&self.http_client, &self.options.api_url).await
    }
}

/// Common imports
pub mod prelude {
    pub use crate::auth::{
        AuthEvent, LoginCredentials, ProfileUpdate, RegisterData, Role, Session, SessionManager,
        User, UserId,
    };
    pub use crate::config::ClientOptions;
    pub use crate::crm::{
        Case, CaseDraft, CaseStatus, Client, ClientDraft, DateRange, Invoice, InvoiceDraft, Page,
        PageParams, Task, TaskDraft, TaskStatus,
    };
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::messages::Language;
    pub use crate::sourced::Sourced;
    pub use crate::LexCrm;
}
