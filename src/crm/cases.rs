//! Case tracking

use std::collections::BTreeMap;

use super::types::{Case, CaseDraft, CaseStage, CaseStatus, Page, PageParams};
use super::{matches_search, Backend};
use crate::demo::DemoStore;
use crate::error::{Error, Result};
use crate::gateway::ApiRequest;
use crate::sourced::Sourced;

/// Client for `/cases`
#[derive(Clone)]
pub struct Cases {
    backend: Backend,
}

impl Cases {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// List cases, one page at a time
    pub async fn list(&self, params: &PageParams) -> Result<Sourced<Page<Case>>> {
        let request = ApiRequest::get("/cases").query(params.to_query());
        self.backend
            .fetch(request, |demo| {
                let matching = demo.cases.filtered(|c| {
                    matches_search(
                        params,
                        [
                            c.title.as_str(),
                            c.case_number.as_str(),
                            c.description.as_deref().unwrap_or_default(),
                        ],
                    )
                });
                Ok(Page::paginate(matching, params))
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Sourced<Case>> {
        self.backend
            .fetch(ApiRequest::get(&format!("/cases/{}", id)), |demo| {
                find(demo, id)
            })
            .await
    }

    pub async fn create(&self, draft: &CaseDraft) -> Result<Sourced<Case>> {
        let request = ApiRequest::post("/cases").json(draft)?;
        self.backend
            .fetch(request, |demo| {
                let id = demo.next_id();
                let now = demo.now();
                let client_id = draft.client_id.unwrap_or(1);
                let mut case = Case {
                    id,
                    case_number: format!("CASE-{}", id),
                    title: "New case".to_string(),
                    client_id,
                    client_name: demo.client_name(client_id),
                    status: CaseStatus::Open,
                    stage: CaseStage::PreTrial,
                    due_date: None,
                    hourly_rate: Some(1000.0),
                    budget: Some(0.0),
                    description: None,
                    created_at: now.clone(),
                    updated_at: now,
                };
                apply(draft, &mut case, demo);
                Ok(demo.cases.insert(case))
            })
            .await
    }

    /// Replace the given fields of a case
    pub async fn update(&self, id: i64, draft: &CaseDraft) -> Result<Sourced<Case>> {
        let request = ApiRequest::put(&format!("/cases/{}", id)).json(draft)?;
        self.backend
            .fetch(request, |demo| {
                let now = demo.now();
                demo.cases
                    .update(&id, |case| {
                        apply(draft, case, demo);
                        case.updated_at = now;
                    })
                    .ok_or_else(|| not_found(id))
            })
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<Sourced<()>> {
        self.backend
            .send(ApiRequest::delete(&format!("/cases/{}", id)), |demo| {
                if demo.cases.remove(&id) {
                    Ok(())
                } else {
                    Err(not_found(id))
                }
            })
            .await
    }

    /// Number of cases per status
    pub async fn status_stats(&self) -> Result<Sourced<BTreeMap<String, u64>>> {
        self.backend
            .fetch(ApiRequest::get("/cases/stats/status"), |demo| {
                Ok(demo.case_status_stats())
            })
            .await
    }

    /// Cases whose title, number or description contain `query`
    pub async fn search(&self, query: &str) -> Result<Sourced<Vec<Case>>> {
        let params = PageParams::new(1, 50).with_search(query);
        Ok(self.list(&params).await?.map(|page| page.items))
    }

    /// Cases in `status`, taken from the first hundred
    pub async fn by_status(&self, status: CaseStatus) -> Result<Sourced<Vec<Case>>> {
        let page = self.list(&PageParams::new(1, 100)).await?;
        Ok(page.map(|page| {
            page.items
                .into_iter()
                .filter(|c| c.status == status)
                .collect()
        }))
    }
}

fn find(demo: &DemoStore, id: i64) -> Result<Case> {
    demo.cases.get(&id).ok_or_else(|| not_found(id))
}

fn not_found(id: i64) -> Error {
    Error::not_found(format!("case {}", id))
}

fn apply(draft: &CaseDraft, case: &mut Case, demo: &DemoStore) {
    if let Some(ref case_number) = draft.case_number {
        case.case_number = case_number.clone();
    }
    if let Some(ref title) = draft.title {
        case.title = title.clone();
    }
    if let Some(client_id) = draft.client_id {
        case.client_id = client_id;
        case.client_name = demo.client_name(client_id);
    }
    if let Some(status) = draft.status {
        case.status = status;
    }
    if let Some(stage) = draft.stage {
        case.stage = stage;
    }
    if draft.due_date.is_some() {
        case.due_date = draft.due_date.clone();
    }
    if draft.hourly_rate.is_some() {
        case.hourly_rate = draft.hourly_rate;
    }
    if draft.budget.is_some() {
        case.budget = draft.budget;
    }
    if draft.description.is_some() {
        case.description = draft.description.clone();
    }
}
