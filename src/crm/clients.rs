//! Client records

use super::types::{Client, ClientDraft, ClientType, KycStatus, Page, PageParams};
use super::{matches_search, Backend};
use crate::error::{Error, Result};
use crate::gateway::ApiRequest;
use crate::sourced::Sourced;

/// Client for `/clients`
#[derive(Clone)]
pub struct Clients {
    backend: Backend,
}

impl Clients {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// List clients; the search term matches names and email addresses
    pub async fn list(&self, params: &PageParams) -> Result<Sourced<Page<Client>>> {
        let request = ApiRequest::get("/clients").query(params.to_query());
        self.backend
            .fetch(request, |demo| {
                let matching = demo.clients.filtered(|c| {
                    matches_search(
                        params,
                        std::iter::once(c.name.as_str()).chain(c.emails.iter().map(String::as_str)),
                    )
                });
                Ok(Page::paginate(matching, params))
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Sourced<Client>> {
        self.backend
            .fetch(ApiRequest::get(&format!("/clients/{}", id)), |demo| {
                demo.clients.get(&id).ok_or_else(|| not_found(id))
            })
            .await
    }

    /// Create a client. Demo clients start with a pending KYC check.
    pub async fn create(&self, draft: &ClientDraft) -> Result<Sourced<Client>> {
        let request = ApiRequest::post("/clients").json(draft)?;
        self.backend
            .fetch(request, |demo| {
                let now = demo.now();
                let mut client = Client {
                    id: demo.next_id(),
                    client_type: ClientType::Person,
                    name: "New client".to_string(),
                    emails: Vec::new(),
                    phones: Vec::new(),
                    address: None,
                    kyc_status: KycStatus::Pending,
                    notes: None,
                    created_at: now.clone(),
                    updated_at: now,
                };
                apply(draft, &mut client);
                Ok(demo.clients.insert(client))
            })
            .await
    }

    pub async fn update(&self, id: i64, draft: &ClientDraft) -> Result<Sourced<Client>> {
        let request = ApiRequest::put(&format!("/clients/{}", id)).json(draft)?;
        self.backend
            .fetch(request, |demo| {
                let now = demo.now();
                demo.clients
                    .update(&id, |client| {
                        apply(draft, client);
                        client.updated_at = now;
                    })
                    .ok_or_else(|| not_found(id))
            })
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<Sourced<()>> {
        self.backend
            .send(ApiRequest::delete(&format!("/clients/{}", id)), |demo| {
                if demo.clients.remove(&id) {
                    Ok(())
                } else {
                    Err(not_found(id))
                }
            })
            .await
    }

    pub async fn search(&self, query: &str) -> Result<Sourced<Vec<Client>>> {
        let params = PageParams::new(1, 50).with_search(query);
        Ok(self.list(&params).await?.map(|page| page.items))
    }
}

fn not_found(id: i64) -> Error {
    Error::not_found(format!("client {}", id))
}

fn apply(draft: &ClientDraft, client: &mut Client) {
    if let Some(client_type) = draft.client_type {
        client.client_type = client_type;
    }
    if let Some(ref name) = draft.name {
        client.name = name.clone();
    }
    if let Some(ref emails) = draft.emails {
        client.emails = emails.clone();
    }
    if let Some(ref phones) = draft.phones {
        client.phones = phones.clone();
    }
    if draft.address.is_some() {
        client.address = draft.address.clone();
    }
    if let Some(kyc_status) = draft.kyc_status {
        client.kyc_status = kyc_status;
    }
    if draft.notes.is_some() {
        client.notes = draft.notes.clone();
    }
}
