#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;

use lexcrm_client::config::ClientOptions;
use lexcrm_client::messages::Language;
use lexcrm_client::LexCrm;
use lexcrm_storage::{KeyValueStore, MemoryStore};

/// Nothing listens here; connecting fails immediately
pub const UNREACHABLE: &str = "http://127.0.0.1:1";

pub fn options(api_url: &str) -> ClientOptions {
    ClientOptions::default()
        .with_api_url(api_url)
        .with_auto_refresh_token(false)
        .with_language(Language::En)
}

pub fn client(api_url: &str) -> (LexCrm, Arc<dyn KeyValueStore>) {
    client_with(options(api_url))
}

pub fn client_with(options: ClientOptions) -> (LexCrm, Arc<dyn KeyValueStore>) {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let crm = LexCrm::with_store(options, store.clone()).unwrap();
    (crm, store)
}

pub fn user_json(email: &str) -> Value {
    json!({
        "id": "6f1c2a70-5b1c-4d8e-9a55-0e0b3f7c2d11",
        "email": email,
        "full_name": "Olena Shevchenko",
        "role": "lawyer",
        "is_active": true,
        "timezone": "Europe/Kyiv",
        "language": "uk"
    })
}

pub fn login_json(access_token: &str, refresh_token: &str, email: &str) -> Value {
    json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "token_type": "bearer",
        "expires_in": 1800,
        "user": user_json(email)
    })
}

pub fn case_json(id: i64, title: &str) -> Value {
    json!({
        "id": id,
        "case_number": format!("CASE-{:03}", id),
        "title": title,
        "client_id": 1,
        "status": "open",
        "stage": "pre_trial",
        "created_at": "2024-03-01T09:00:00Z",
        "updated_at": "2024-03-01T09:00:00Z"
    })
}
