//! REST calls shared by the resource implementations.
//!
//! Every call runs inside the rate-limit policy. Writes that race with other
//! writers add the conflict policy, and reads that follow a create may add the
//! not-found policy.

use crate::client::{LdClient, NO_QUERY};
use crate::error::{ProviderError, Result};
use crate::patch::PatchOperation;
use ld_provider_retries::{Attempt, Page, Paginator};
use reqwest::Method;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

/// Page size for team role listings.
pub const TEAM_ROLES_PAGE_SIZE: usize = 100;

/// Paged list response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEnvelope<T> {
    /// Items on this page.
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    /// Size of the whole collection. Missing counts read as zero.
    #[serde(default)]
    pub total_count: usize,
}

impl<T> From<ListEnvelope<T>> for Page<T> {
    fn from(envelope: ListEnvelope<T>) -> Self {
        Page::new(envelope.items, envelope.total_count)
    }
}

#[derive(Debug, Deserialize)]
struct RoleRef {
    key: String,
}

impl LdClient {
    /// Fetch a resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.with_rate_limit(move || self.send(Method::GET, path, NO_QUERY, None))
            .await
            .into_result()
    }

    /// Fetch a resource that may not be visible yet.
    ///
    /// `404` responses are retried; `Ok(None)` means the API still answered
    /// `404` once the retry budget ran out. Cancellation and every other
    /// failure are returned as errors.
    pub async fn get_eventually<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let outcome: Attempt<T, ProviderError> = self
            .with_rate_limit(move || {
                self.with_not_found_retry(move || self.send(Method::GET, path, NO_QUERY, None))
            })
            .await;
        match outcome.into_result() {
            Ok(value) => Ok(Some(value)),
            Err(ProviderError::Api { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Create a resource.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        let body = &body;
        self.with_rate_limit(move || self.send(Method::POST, path, NO_QUERY, Some(body)))
            .await
            .into_result()
    }

    /// Apply JSON Patch operations, retrying write conflicts.
    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        operations: &[PatchOperation],
    ) -> Result<T> {
        let body = serde_json::to_value(operations)?;
        let body = &body;
        self.with_rate_limit(move || {
            self.with_conflict_retry(move || self.send(Method::PATCH, path, NO_QUERY, Some(body)))
        })
        .await
        .into_result()
    }

    /// Delete a resource.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.with_rate_limit(move || self.send::<IgnoredAny>(Method::DELETE, path, NO_QUERY, None))
            .await
            .into_result()
            .map(|_| ())
    }

    /// Fetch every item of a paged collection.
    pub async fn list_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        self.drain_all(move |offset, limit| self.fetch_page(path, offset, limit, false))
            .await
    }

    /// Keys of the custom roles assigned to a team.
    ///
    /// Set `retry_not_found` right after creating the team, when the roles
    /// endpoint may still answer `404`.
    pub async fn team_role_keys(&self, team_key: &str, retry_not_found: bool) -> Result<Vec<String>> {
        let path = format!("api/v2/teams/{team_key}/roles");
        let path = path.as_str();
        let roles: Vec<RoleRef> = Paginator::new(TEAM_ROLES_PAGE_SIZE)
            .drain_all(move |offset, limit| self.fetch_page(path, offset, limit, retry_not_found))
            .await?;
        Ok(roles.into_iter().map(|role| role.key).collect())
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        path: &str,
        offset: usize,
        limit: usize,
        retry_not_found: bool,
    ) -> Result<Page<T>> {
        let query = [("offset", offset.to_string()), ("limit", limit.to_string())];
        let query = &query[..];
        let outcome: Attempt<ListEnvelope<T>, ProviderError> = if retry_not_found {
            self.with_rate_limit(move || {
                self.with_not_found_retry(move || self.send(Method::GET, path, query, None))
            })
            .await
        } else {
            self.with_rate_limit(move || self.send(Method::GET, path, query, None))
                .await
        };
        outcome.into_result().map(Page::from)
    }
}
