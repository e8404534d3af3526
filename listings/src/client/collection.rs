use std::time::Instant;

use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::config::PlannerConfig;
use crate::errors::PlannerError;
use crate::indexes;
use crate::pipeline::Pipeline;
use crate::planner::{ListingQueryPlanner, PageResult, to_page_result};
use crate::runtime::DocumentStore;
use crate::search::{FilterRequest, SearchQuery};
use crate::seed;
use crate::types::CollectionProfile;

/// Planner, store and profile for one collection.
#[derive(Debug)]
pub struct CollectionHandle<'a, S> {
    store: &'a S,
    config: &'a PlannerConfig,
    profile: &'a CollectionProfile,
}

impl<S> Clone for CollectionHandle<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for CollectionHandle<'_, S> {}

impl<'a, S: DocumentStore> CollectionHandle<'a, S> {
    pub(crate) fn new(store: &'a S, config: &'a PlannerConfig, profile: &'a CollectionProfile) -> Self {
        Self { store, config, profile }
    }

    pub fn profile(&self) -> &'a CollectionProfile {
        self.profile
    }

    pub fn planner(&self) -> ListingQueryPlanner<'a> {
        ListingQueryPlanner::new(self.config, self.profile)
    }

    /// Normalize raw query parameters into a request.
    pub fn request(&self, query: SearchQuery) -> Result<FilterRequest, PlannerError> {
        query.into_request(self.config)
    }

    /// Plan without executing; used by `listings plan`.
    pub fn plan(&self, query: SearchQuery) -> Result<Pipeline, PlannerError> {
        let request = self.request(query)?;
        self.planner().plan(&request)
    }

    pub async fn search<T>(&self, query: SearchQuery) -> Result<PageResult<T>, PlannerError>
    where
        T: DeserializeOwned,
    {
        let request = self.request(query)?;
        self.search_request(&request).await
    }

    /// Plan, execute under the configured deadline, and page the result.
    ///
    /// Dropping the returned future cancels the in-flight storage call.
    pub async fn search_request<T>(&self, request: &FilterRequest) -> Result<PageResult<T>, PlannerError>
    where
        T: DeserializeOwned,
    {
        let plan_id = Uuid::new_v4();
        let planner = self.planner();
        let page_size = planner.effective_page_size(request);
        let pipeline = planner.plan(request)?;

        log::debug!(
            "[{}] executing {}-stage pipeline on `{}`",
            plan_id,
            pipeline.len(),
            self.profile.collection
        );
        let started = Instant::now();
        let execution = self.store.execute(&self.profile.collection, &pipeline);
        let output = match tokio::time::timeout(self.config.query_timeout(), execution).await {
            Ok(result) => result.inspect_err(|err| log::warn!("[{}] storage failure: {}", plan_id, err))?,
            Err(_) => {
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                log::warn!("[{}] query on `{}` timed out after {} ms", plan_id, self.profile.collection, elapsed_ms);
                return Err(PlannerError::Timeout { elapsed_ms });
            }
        };

        let page = to_page_result(output, request.page, page_size)?;
        log::debug!(
            "[{}] page {} of `{}`: {} items, {} total in {} ms",
            plan_id,
            page.page,
            self.profile.collection,
            page.items.len(),
            page.total_count,
            started.elapsed().as_millis()
        );
        Ok(page)
    }

    /// Insert fixtures when the collection is empty; returns how many were written.
    pub async fn seed_if_empty(&self, count: usize) -> Result<u64, PlannerError> {
        seed::seed_if_empty(self.store, self.profile, count).await
    }

    pub async fn ensure_indexes(&self) -> Result<Vec<String>, PlannerError> {
        indexes::ensure_indexes(self.store, self.profile).await
    }

    pub async fn count(&self) -> Result<u64, PlannerError> {
        self.store.count(&self.profile.collection).await
    }
}
