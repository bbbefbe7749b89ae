//! Task board

use serde_json::json;

use super::types::{Page, PageParams, Task, TaskDraft, TaskPriority, TaskStatus};
use super::{matches_search, Backend};
use crate::error::{Error, Result};
use crate::gateway::ApiRequest;
use crate::sourced::Sourced;

/// Client for `/tasks`
#[derive(Clone)]
pub struct Tasks {
    backend: Backend,
}

impl Tasks {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn list(&self, params: &PageParams) -> Result<Sourced<Page<Task>>> {
        let request = ApiRequest::get("/tasks").query(params.to_query());
        self.backend
            .fetch(request, |demo| {
                let matching = demo.tasks.filtered(|t| {
                    matches_search(
                        params,
                        [
                            t.title.as_str(),
                            t.description.as_deref().unwrap_or_default(),
                        ],
                    )
                });
                Ok(Page::paginate(matching, params))
            })
            .await
    }

    /// Tasks attached to one case
    pub async fn list_for_case(&self, case_id: i64) -> Result<Sourced<Vec<Task>>> {
        let params = PageParams::new(1, 100);
        let request = ApiRequest::get("/tasks")
            .query(params.to_query())
            .query([("case_id", case_id.to_string())]);

        let page = self
            .backend
            .fetch::<Page<Task>, _>(request, |demo| {
                let matching = demo.tasks.filtered(|t| t.case_id == Some(case_id));
                Ok(Page::paginate(matching, &params))
            })
            .await?;

        Ok(page.map(|page| {
            page.items
                .into_iter()
                .filter(|t| t.case_id == Some(case_id))
                .collect()
        }))
    }

    pub async fn get(&self, id: i64) -> Result<Sourced<Task>> {
        self.backend
            .fetch(ApiRequest::get(&format!("/tasks/{}", id)), |demo| {
                demo.tasks.get(&id).ok_or_else(|| not_found(id))
            })
            .await
    }

    pub async fn create(&self, draft: &TaskDraft) -> Result<Sourced<Task>> {
        let request = ApiRequest::post("/tasks").json(draft)?;
        self.backend
            .fetch(request, |demo| {
                let now = demo.now();
                let mut task = Task {
                    id: demo.next_id(),
                    title: "New task".to_string(),
                    description: None,
                    priority: TaskPriority::Medium,
                    status: TaskStatus::Todo,
                    due_date: None,
                    assigned_to: None,
                    case_id: None,
                    created_at: now.clone(),
                    updated_at: now,
                };
                apply(draft, &mut task);
                Ok(demo.tasks.insert(task))
            })
            .await
    }

    pub async fn update(&self, id: i64, draft: &TaskDraft) -> Result<Sourced<Task>> {
        let request = ApiRequest::put(&format!("/tasks/{}", id)).json(draft)?;
        self.backend
            .fetch(request, |demo| {
                let now = demo.now();
                demo.tasks
                    .update(&id, |task| {
                        apply(draft, task);
                        task.updated_at = now;
                    })
                    .ok_or_else(|| not_found(id))
            })
            .await
    }

    /// Move a task to another board column
    pub async fn set_status(&self, id: i64, status: TaskStatus) -> Result<Sourced<Task>> {
        let request = ApiRequest::put(&format!("/tasks/{}", id)).json(&json!({ "status": status }))?;
        self.backend
            .fetch(request, |demo| {
                let now = demo.now();
                demo.tasks
                    .update(&id, |task| {
                        task.status = status;
                        task.updated_at = now;
                    })
                    .ok_or_else(|| not_found(id))
            })
            .await
    }

    pub async fn delete(&self, id: i64) -> Result<Sourced<()>> {
        self.backend
            .send(ApiRequest::delete(&format!("/tasks/{}", id)), |demo| {
                if demo.tasks.remove(&id) {
                    Ok(())
                } else {
                    Err(not_found(id))
                }
            })
            .await
    }
}

fn not_found(id: i64) -> Error {
    Error::not_found(format!("task {}", id))
}

fn apply(draft: &TaskDraft, task: &mut Task) {
    if let Some(ref title) = draft.title {
        task.title = title.clone();
    }
    if draft.description.is_some() {
        task.description = draft.description.clone();
    }
    if let Some(priority) = draft.priority {
        task.priority = priority;
    }
    if let Some(status) = draft.status {
        task.status = status;
    }
    if draft.due_date.is_some() {
        task.due_date = draft.due_date.clone();
    }
    if draft.assigned_to.is_some() {
        task.assigned_to = draft.assigned_to.clone();
    }
    if draft.case_id.is_some() {
        task.case_id = draft.case_id;
    }
}
