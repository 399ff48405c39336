//! Cursor-paginated incidence lists: the global list managed by TIC users
//! and the per-user "my incidences" list.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use super::ListenerSlot;
use crate::errors::AppError;
use crate::models::{Incidence, IncidenceStatus};
use crate::store::{paths, Direction, DocumentStore, FilterOp, QueryOptions};

/// Which half of the list is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    #[default]
    Open,
    Closed,
}

/// Collection a list reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncidenceScope {
    /// Global copies at `incidences`
    All,
    /// Owner copies at `users/{uid}/incidences`
    ReportedBy(String),
}

impl IncidenceScope {
    pub fn collection(&self) -> String {
        match self {
            IncidenceScope::All => paths::INCIDENCES.to_string(),
            IncidenceScope::ReportedBy(uid) => paths::user_incidences(uid),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub open: u64,
    pub closed: u64,
}

/// Current state of an incidence list, as served to the client.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidenceListState {
    pub segment: Segment,
    pub status_filter: Option<IncidenceStatus>,
    pub search: String,
    pub visible_count: usize,
    pub incidences: Vec<Incidence>,
    pub can_load_more: bool,
    pub loading: bool,
    pub summary: Summary,
    #[serde(skip)]
    last_visible: Option<Value>,
}

/// An incidence list view. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct IncidenceList {
    store: DocumentStore,
    scope: IncidenceScope,
    load_step: usize,
    state: Arc<RwLock<IncidenceListState>>,
    listener: Arc<ListenerSlot>,
}

impl IncidenceList {
    pub fn new(store: DocumentStore, scope: IncidenceScope, load_step: usize) -> Self {
        let state = IncidenceListState {
            visible_count: load_step,
            ..Default::default()
        };
        Self {
            store,
            scope,
            load_step,
            state: Arc::new(RwLock::new(state)),
            listener: Arc::new(ListenerSlot::default()),
        }
    }

    pub fn scope(&self) -> &IncidenceScope {
        &self.scope
    }

    /// Query of the first page, or of the page after `cursor`.
    pub async fn query_options(&self, cursor: Option<Value>) -> QueryOptions {
        let state = self.state.read().await;
        let mut options = QueryOptions::new();
        if let IncidenceScope::ReportedBy(uid) = &self.scope {
            options = options.filter("reportedByUserId", FilterOp::Eq, uid.as_str());
        }
        options = options.filter("isClosed", FilterOp::Eq, state.segment == Segment::Closed);
        if let Some(status) = state.status_filter {
            options = options.filter("status", FilterOp::Eq, status.as_str());
        }
        options = options
            .order_by("createdAt", Direction::Desc)
            .limit(self.load_step);
        match cursor {
            Some(cursor) => options.start_after(cursor),
            None => options,
        }
    }

    /// Replace the live first page.
    ///
    /// The previous listener is cancelled before the new subscription is
    /// opened. Returns once the first snapshot has been applied.
    pub async fn refresh(&self) -> Result<(), AppError> {
        self.listener.cancel().await;

        let options = self.query_options(None).await;
        self.state.write().await.loading = true;
        let mut subscription = self.store.subscribe(&self.scope.collection(), options);

        let first = subscription
            .next_snapshot()
            .await
            .unwrap_or_else(|| Err(AppError::Document("Subscription closed".to_string())));
        match first {
            Ok(page) => apply_page(&self.state, self.load_step, page).await,
            Err(e) => {
                self.state.write().await.loading = false;
                tracing::error!(collection = %self.scope.collection(), "Error loading incidences: {}", e);
                return Err(e);
            }
        }

        let state = Arc::clone(&self.state);
        let load_step = self.load_step;
        let task = tokio::spawn(async move {
            while let Some(snapshot) = subscription.next_snapshot().await {
                match snapshot {
                    Ok(page) => apply_page(&state, load_step, page).await,
                    Err(e) => {
                        tracing::error!("Incidence listener failed: {}", e);
                        state.write().await.loading = false;
                        break;
                    }
                }
            }
        });
        self.listener.replace(task).await;
        Ok(())
    }

    /// Append the page after the last loaded incidence.
    pub async fn load_more(&self) -> Result<(), AppError> {
        let cursor = self.state.read().await.last_visible.clone();
        let options = self.query_options(cursor).await;
        let page = self.store.list(&self.scope.collection(), &options).await?;

        let raw_len = page.len();
        let last = last_created_at(&page);
        let incidences = decode(page);

        let mut state = self.state.write().await;
        let search = state.search.clone();
        state
            .incidences
            .extend(incidences.into_iter().filter(|i| matches_search(&search, i)));
        if last.is_some() {
            state.last_visible = last;
        }
        state.can_load_more = raw_len == self.load_step;
        state.visible_count += self.load_step;
        Ok(())
    }

    pub async fn set_segment(&self, segment: Segment) -> Result<(), AppError> {
        {
            let mut state = self.state.write().await;
            state.segment = segment;
            state.visible_count = self.load_step;
        }
        self.refresh().await
    }

    pub async fn set_status_filter(&self, status: Option<IncidenceStatus>) -> Result<(), AppError> {
        self.state.write().await.status_filter = status;
        self.refresh().await
    }

    /// Apply a settled search term.
    pub async fn search(&self, term: String) -> Result<(), AppError> {
        self.state.write().await.search = term;
        self.refresh().await
    }

    /// Re-read the open and closed counts, concurrently.
    pub async fn refresh_summary(&self) -> Result<Summary, AppError> {
        let collection = self.scope.collection();
        let open = QueryOptions::new().filter("isClosed", FilterOp::Eq, false);
        let closed = QueryOptions::new().filter("isClosed", FilterOp::Eq, true);

        let (open, closed) = tokio::try_join!(
            self.store.count(&collection, &open),
            self.store.count(&collection, &closed)
        )?;

        let summary = Summary { open, closed };
        self.state.write().await.summary = summary;
        Ok(summary)
    }

    pub async fn snapshot(&self) -> IncidenceListState {
        self.state.read().await.clone()
    }

    /// Cancel the live listener.
    pub async fn stop(&self) {
        self.listener.cancel().await;
    }
}

async fn apply_page(state: &RwLock<IncidenceListState>, load_step: usize, page: Vec<Value>) {
    let raw_len = page.len();
    let last = last_created_at(&page);
    let incidences = decode(page);

    let mut state = state.write().await;
    let search = state.search.clone();
    state.incidences = incidences
        .into_iter()
        .filter(|i| matches_search(&search, i))
        .collect();
    state.last_visible = last;
    state.can_load_more = raw_len == load_step;
    state.loading = false;
}

fn last_created_at(page: &[Value]) -> Option<Value> {
    page.last().and_then(|doc| doc.get("createdAt")).cloned()
}

fn decode(page: Vec<Value>) -> Vec<Incidence> {
    page.into_iter()
        .filter_map(|doc| match serde_json::from_value(doc) {
            Ok(incidence) => Some(incidence),
            Err(e) => {
                tracing::warn!("Skipping malformed incidence: {}", e);
                None
            }
        })
        .collect()
}

fn matches_search(term: &str, incidence: &Incidence) -> bool {
    term.is_empty() || incidence.title.to_lowercase().contains(&term.to_lowercase())
}
