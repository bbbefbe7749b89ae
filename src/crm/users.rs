//! Staff accounts, managed by administrators

use chrono::Utc;

use super::types::{NewUser, Page, PageParams, UserUpdate};
use super::{matches_search, matches_text, Backend};
use crate::auth::types::{Role, User, UserId};
use crate::demo;
use crate::error::{Error, Result};
use crate::gateway::ApiRequest;
use crate::sourced::Sourced;

/// Client for `/admin/users`
#[derive(Clone)]
pub struct Users {
    backend: Backend,
}

impl Users {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    pub async fn list(&self, params: &PageParams) -> Result<Sourced<Page<User>>> {
        let request = ApiRequest::get("/admin/users").query(params.to_query());
        self.backend
            .fetch(request, |demo| {
                let matching = demo.users.filtered(|u| {
                    matches_search(params, [u.email.as_str(), u.full_name.as_str(), u.role.as_str()])
                });
                Ok(Page::paginate(matching, params))
            })
            .await
    }

    pub async fn get(&self, id: &UserId) -> Result<Sourced<User>> {
        self.backend
            .fetch(ApiRequest::get(&format!("/admin/users/{}", id)), |demo| {
                demo.users.get(id).ok_or_else(|| not_found(id))
            })
            .await
    }

    pub async fn create(&self, new_user: &NewUser) -> Result<Sourced<User>> {
        let request = ApiRequest::post("/admin/users").json(new_user)?;
        self.backend
            .fetch(request, |store| {
                let mut user = demo::demo_user(
                    store.next_id(),
                    &new_user.email,
                    &new_user.full_name,
                    new_user.role,
                    Utc::now(),
                );
                user.last_login = None;
                Ok(store.users.insert(user))
            })
            .await
    }

    pub async fn update(&self, id: &UserId, changes: &UserUpdate) -> Result<Sourced<User>> {
        let request = ApiRequest::put(&format!("/admin/users/{}", id)).json(changes)?;
        self.backend
            .fetch(request, |demo| {
                let now = demo.now();
                demo.users
                    .update(id, |user| {
                        changes.apply_to(user);
                        user.updated_at = Some(now);
                    })
                    .ok_or_else(|| not_found(id))
            })
            .await
    }

    pub async fn delete(&self, id: &UserId) -> Result<Sourced<()>> {
        self.backend
            .send(ApiRequest::delete(&format!("/admin/users/{}", id)), |demo| {
                if demo.users.remove(id) {
                    Ok(())
                } else {
                    Err(not_found(id))
                }
            })
            .await
    }

    /// Users whose email, name or role contain `query`, from the first fifty
    pub async fn search(&self, query: &str) -> Result<Sourced<Vec<User>>> {
        let page = self.list(&PageParams::new(1, 50)).await?;
        Ok(page.map(|page| {
            page.items
                .into_iter()
                .filter(|u| {
                    matches_text(&u.email, query)
                        || matches_text(&u.full_name, query)
                        || matches_text(u.role.as_str(), query)
                })
                .collect()
        }))
    }

    /// Active users holding `role`, from the first hundred
    pub async fn by_role(&self, role: Role) -> Result<Sourced<Vec<User>>> {
        let page = self.list(&PageParams::new(1, 100)).await?;
        Ok(page.map(|page| {
            page.items
                .into_iter()
                .filter(|u| u.role == role && u.is_active)
                .collect()
        }))
    }
}

fn not_found(id: &UserId) -> Error {
    Error::not_found(format!("user {}", id))
}
