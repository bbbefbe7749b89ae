//! Invoicing

use chrono::{Duration, Utc};

use super::types::{Invoice, InvoiceDraft, InvoiceStatus, Page, PageParams};
use super::{matches_search, Backend};
use crate::demo::DemoStore;
use crate::error::{Error, Result};
use crate::gateway::ApiRequest;
use crate::sourced::Sourced;

/// Days until a new demo invoice falls due
const PAYMENT_TERM_DAYS: i64 = 30;

/// Client for `/invoices`
#[derive(Clone)]
pub struct Invoices {
    backend: Backend,
}

impl Invoices {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn list(&self, params: &PageParams) -> Result<Sourced<Page<Invoice>>> {
        let request = ApiRequest::get("/invoices").query(params.to_query());
        self.backend
            .fetch(request, |demo| {
                let matching = demo.invoices.filtered(|i| {
                    matches_search(
                        params,
                        [
                            i.number.as_str(),
                            i.client_name.as_deref().unwrap_or_default(),
                            i.description.as_deref().unwrap_or_default(),
                        ],
                    )
                });
                Ok(Page::paginate(matching, params))
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Sourced<Invoice>> {
        self.backend
            .fetch(ApiRequest::get(&format!("/invoices/{}", id)), |demo| {
                demo.invoices.get(&id).ok_or_else(|| not_found(id))
            })
            .await
    }

    /// Issue an invoice. Demo invoices start as drafts due in thirty days.
    pub async fn create(&self, draft: &InvoiceDraft) -> Result<Sourced<Invoice>> {
        let request = ApiRequest::post("/invoices").json(draft)?;
        self.backend
            .fetch(request, |demo| {
                let id = demo.next_id();
                let today = Utc::now().date_naive();
                let client_id = draft.client_id.unwrap_or(1);
                let now = demo.now();
                let mut invoice = Invoice {
                    id,
                    number: format!("INV-{}", id),
                    client_id,
                    client_name: demo.client_name(client_id),
                    amount: 0.0,
                    status: InvoiceStatus::Draft,
                    issue_date: today.to_string(),
                    due_date: (today + Duration::days(PAYMENT_TERM_DAYS)).to_string(),
                    description: None,
                    created_at: now.clone(),
                    updated_at: now,
                };
                apply(draft, &mut invoice, demo);
                Ok(demo.invoices.insert(invoice))
            })
            .await
    }

    pub async fn update(&self, id: i64, draft: &InvoiceDraft) -> Result<Sourced<Invoice>> {
        let request = ApiRequest::put(&format!("/invoices/{}", id)).json(draft)?;
        self.backend
            .fetch(request, |demo| {
                let now = demo.now();
                demo.invoices
                    .update(&id, |invoice| {
                        apply(draft, invoice, demo);
                        invoice.updated_at = now;
                    })
                    .ok_or_else(|| not_found(id))
            })
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<Sourced<()>> {
        self.backend
            .send(ApiRequest::delete(&format!("/invoices/{}", id)), |demo| {
                if demo.invoices.remove(&id) {
                    Ok(())
                } else {
                    Err(not_found(id))
                }
            })
            .await
    }
}

fn not_found(id: i64) -> Error {
    Error::not_found(format!("invoice {}", id))
}

fn apply(draft: &InvoiceDraft, invoice: &mut Invoice, demo: &DemoStore) {
    if let Some(ref number) = draft.number {
        invoice.number = number.clone();
    }
    if let Some(client_id) = draft.client_id {
        invoice.client_id = client_id;
        invoice.client_name = demo.client_name(client_id);
    }
    if let Some(amount) = draft.amount {
        invoice.amount = amount;
    }
    if let Some(status) = draft.status {
        invoice.status = status;
    }
    if let Some(ref issue_date) = draft.issue_date {
        invoice.issue_date = issue_date.clone();
    }
    if let Some(ref due_date) = draft.due_date {
        invoice.due_date = due_date.clone();
    }
    if draft.description.is_some() {
        invoice.description = draft.description.clone();
    }
}
