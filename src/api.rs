//! Typed REST client over the session controller.
//!
//! Reads go through the [`QueryCache`]; mutations validate their payload first,
//! go straight to the network and invalidate the cached reads of their resource.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::auth::Session;
use crate::cache::{QueryCache, QueryKey};
use crate::error::ApiResult;
use crate::guard::ActionGuard;
use crate::models::{
    BedScheduleAdjust, BedScheduleClose, BedSchedules, Entity, Ground, GroundDonate, People,
    Seed, Tool, UsageRecord, UserResponse, Voluntary, VoluntaryRequest, VoluntaryStore,
    VoluntaryStoreMany, VoluntaryUsingSeed, VoluntaryUsingTool,
};
use crate::session::{Credentials, SessionController, ME_PATH};
use crate::transport::{ApiRequest, ApiResponse};
use crate::util::diff_update;
use crate::validation::Validate;

/// Query parameters of an `index` call.
///
/// Empty values are left out; `order_by` is sent once per entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
    pub order_by: Vec<String>,
    pub filters: Vec<(String, String)>,
}

impl IndexQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by.push(field.into());
        self
    }

    pub fn filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((name.into(), value.into()));
        self
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(page) = self.page {
            params.push(("page".to_string(), page.to_string()));
        }
        if let Some(page_size) = self.page_size {
            params.push(("page_size".to_string(), page_size.to_string()));
        }
        if let Some(search) = self.search.as_ref().filter(|s| !s.is_empty()) {
            params.push(("search".to_string(), search.clone()));
        }
        params.extend(
            self.order_by
                .iter()
                .filter(|field| !field.is_empty())
                .map(|field| ("order_by".to_string(), field.clone())),
        );
        params.extend(
            self.filters
                .iter()
                .filter(|(_, value)| !value.is_empty())
                .cloned(),
        );
        params
    }
}

/// Per-item result of a batched volunteer assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub stored: Vec<Voluntary>,
    /// `(index in the request, server message)`
    pub failed: Vec<(usize, String)>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct Api {
    session: SessionController,
    cache: Arc<QueryCache>,
    guard: ActionGuard,
}

impl Api {
    pub fn new(session: SessionController, cache: Arc<QueryCache>) -> Self {
        Self {
            session,
            cache,
            guard: ActionGuard::new(),
        }
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Mutations in flight across every clone of this client.
    pub fn guard(&self) -> &ActionGuard {
        &self.guard
    }

    pub fn resource<E: Entity>(&self) -> Resource<'_, E> {
        Resource {
            api: self,
            _entity: PhantomData,
        }
    }

    pub fn auth(&self) -> AuthEndpoint<'_> {
        AuthEndpoint { api: self }
    }

    pub fn peoples(&self) -> Resource<'_, People> {
        self.resource()
    }

    pub fn tools(&self) -> Resource<'_, Tool> {
        self.resource()
    }

    pub fn seeds(&self) -> Resource<'_, Seed> {
        self.resource()
    }

    pub fn grounds(&self) -> Resource<'_, Ground> {
        self.resource()
    }

    pub fn bed_schedules(&self) -> Resource<'_, BedSchedules> {
        self.resource()
    }

    pub fn voluntaries(&self) -> Resource<'_, Voluntary> {
        self.resource()
    }

    pub fn users(&self) -> Resource<'_, UserResponse> {
        self.resource()
    }

    pub fn grounds_donate(&self) -> Resource<'_, GroundDonate> {
        self.resource()
    }

    pub fn voluntaries_request(&self) -> Resource<'_, VoluntaryRequest> {
        self.resource()
    }

    pub fn voluntaries_using_tools(&self) -> Usage<'_, VoluntaryUsingTool> {
        Usage {
            api: self,
            _record: PhantomData,
        }
    }

    pub fn voluntaries_using_seeds(&self) -> Usage<'_, VoluntaryUsingSeed> {
        Usage {
            api: self,
            _record: PhantomData,
        }
    }

    /// Sends through the session controller and fails on non-2xx.
    async fn send(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        self.session.execute(request).await?.error_for_status()
    }

    async fn mutate<T: DeserializeOwned>(&self, resource: &str, request: ApiRequest) -> ApiResult<T> {
        let response = self.send(request).await?;
        self.cache.invalidate(resource);
        response.json()
    }

    async fn mutate_empty(&self, resource: &str, request: ApiRequest) -> ApiResult<()> {
        self.send(request).await?;
        self.cache.invalidate(resource);
        Ok(())
    }

    /// Cached GET keyed by `(resource, path, query)`.
    async fn read<T: DeserializeOwned>(&self, resource: &str, request: ApiRequest) -> ApiResult<T> {
        let key = QueryKey::new(resource, request.path.clone(), request.query.clone());
        let session = self.session.clone();
        self.cache
            .fetch_as(key, move || async move {
                session.execute(request).await?.error_for_status()?.value()
            })
            .await
    }
}

/// CRUD handle for one resource.
pub struct Resource<'a, E: Entity> {
    api: &'a Api,
    _entity: PhantomData<E>,
}

impl<'a, E: Entity> Resource<'a, E> {
    pub fn path(&self) -> &'static str {
        E::PATH
    }

    pub async fn index(&self, query: &IndexQuery) -> ApiResult<E::Listing> {
        let request = ApiRequest::get(E::PATH).with_query(query.to_params());
        self.api.read(E::PATH, request).await
    }

    pub async fn show(&self, id: &str) -> ApiResult<E> {
        let request = ApiRequest::get(format!("{}/{id}", E::PATH));
        self.api.read(E::PATH, request).await
    }

    pub async fn store(&self, body: &E::Store) -> ApiResult<E> {
        body.validate()?;
        let request = ApiRequest::post(E::PATH).json(body)?;
        let stored = self.mutate(request).await?;
        info!(resource = E::PATH, "stored");
        Ok(stored)
    }

    pub async fn update(&self, id: &str, body: &E::Update) -> ApiResult<E> {
        body.validate()?;
        let request = ApiRequest::put(format!("{}/{id}", E::PATH)).json(body)?;
        self.mutate(request).await
    }

    /// Sends only the fields of `body` that differ from `current`.
    pub async fn update_changed(&self, id: &str, current: &E, body: &E::Update) -> ApiResult<E> {
        body.validate()?;
        let changes: Value = diff_update(current, body)?;
        let request = ApiRequest::put(format!("{}/{id}", E::PATH)).json(&changes)?;
        self.mutate(request).await
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        let request = ApiRequest::delete(format!("{}/{id}", E::PATH));
        self.api.mutate_empty(E::PATH, request).await?;
        self.invalidate_dependents();
        info!(resource = E::PATH, %id, "deleted");
        Ok(())
    }

    async fn mutate<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let changed = self.api.mutate(E::PATH, request).await?;
        self.invalidate_dependents();
        Ok(changed)
    }

    fn invalidate_dependents(&self) {
        for dependent in E::DEPENDENTS {
            self.api.cache.invalidate(dependent);
        }
    }
}

impl Resource<'_, BedSchedules> {
    /// Moves the expected harvest date of the current schedule.
    pub async fn adjust(&self, id: &str, body: &BedScheduleAdjust) -> ApiResult<BedSchedules> {
        body.validate()?;
        let request =
            ApiRequest::patch(format!("{}/{id}/adjust", BedSchedules::PATH)).json(body)?;
        // Only the group changes; the ground's bed keeps its seed and link
        self.api.mutate(BedSchedules::PATH, request).await
    }

    /// Records the harvest and closes the current schedule.
    pub async fn close(&self, id: &str, body: &BedScheduleClose) -> ApiResult<BedSchedules> {
        body.validate()?;
        let request = ApiRequest::patch(format!("{}/{id}/close", BedSchedules::PATH)).json(body)?;
        self.mutate(request).await
    }
}

impl Resource<'_, Voluntary> {
    /// Assigns several volunteers in one call; each item succeeds or fails alone.
    pub async fn store_many(&self, items: &[VoluntaryStore]) -> ApiResult<BatchOutcome> {
        items.validate()?;
        let request = ApiRequest::post(format!("{}/many", Voluntary::PATH)).json(items)?;
        let response: VoluntaryStoreMany = self.api.mutate(Voluntary::PATH, request).await?;

        let mut outcome = BatchOutcome::default();
        for (index, result) in response.results.into_iter().enumerate() {
            match (result.voluntary, result.error) {
                (Some(voluntary), None) => outcome.stored.push(voluntary),
                (_, Some(error)) => outcome.failed.push((index, error)),
                (None, None) => outcome
                    .failed
                    .push((index, "no result returned".to_string())),
            }
        }
        if !outcome.is_complete() {
            warn!(
                stored = outcome.stored.len(),
                failed = outcome.failed.len(),
                "volunteer batch partially failed"
            );
        }
        Ok(outcome)
    }
}

/// Tool/seed usage tracking: records are started and ended, not edited.
pub struct Usage<'a, U: UsageRecord> {
    api: &'a Api,
    _record: PhantomData<U>,
}

impl<'a, U: UsageRecord> Usage<'a, U> {
    pub async fn index(&self, query: &IndexQuery) -> ApiResult<Vec<U>> {
        let request = ApiRequest::get(U::PATH).with_query(query.to_params());
        self.api.read(U::PATH, request).await
    }

    pub async fn show(&self, id: &str) -> ApiResult<U> {
        let request = ApiRequest::get(format!("{}/{id}", U::PATH));
        self.api.read(U::PATH, request).await
    }

    pub async fn start(&self, body: &U::Start) -> ApiResult<U> {
        body.validate()?;
        let request = ApiRequest::post(format!("{}/start", U::PATH)).json(body)?;
        self.api.mutate(U::PATH, request).await
    }

    pub async fn end(&self, id: &str) -> ApiResult<U> {
        let request = ApiRequest::put(format!("{}/end/{id}", U::PATH));
        self.api.mutate(U::PATH, request).await
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        let request = ApiRequest::delete(format!("{}/{id}", U::PATH));
        self.api.mutate_empty(U::PATH, request).await
    }
}

pub struct AuthEndpoint<'a> {
    api: &'a Api,
}

impl AuthEndpoint<'_> {
    /// Logs in and drops every cached read of the previous user.
    pub async fn login(&self, credentials: &Credentials) -> ApiResult<Session> {
        let session = self.api.session.login(credentials).await?;
        self.api.cache.clear();
        Ok(session)
    }

    /// Current user; never cached.
    pub async fn me(&self) -> ApiResult<UserResponse> {
        self.api.send(ApiRequest::get(ME_PATH)).await?.json()
    }

    pub fn logout(&self) -> ApiResult<()> {
        self.api.cache.clear();
        self.api.session.logout()
    }
}
