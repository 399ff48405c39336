//! Classroom list: the whole collection, filtered and sliced in memory.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{decode_all, ListenerSlot};
use crate::errors::AppError;
use crate::models::Classroom;
use crate::store::{paths, DocumentStore, QueryOptions};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomListState {
    pub search: String,
    pub visible_count: usize,
    pub classrooms: Vec<Classroom>,
    pub can_load_more: bool,
    pub loading: bool,
}

#[derive(Clone)]
pub struct ClassroomList {
    store: DocumentStore,
    load_step: usize,
    state: Arc<RwLock<ClassroomListState>>,
    listener: Arc<ListenerSlot>,
}

impl ClassroomList {
    pub fn new(store: DocumentStore, load_step: usize) -> Self {
        let state = ClassroomListState {
            visible_count: load_step,
            ..Default::default()
        };
        Self {
            store,
            load_step,
            state: Arc::new(RwLock::new(state)),
            listener: Arc::new(ListenerSlot::default()),
        }
    }

    /// Reset to the first page and follow the collection.
    pub async fn refresh(&self) -> Result<(), AppError> {
        self.state.write().await.visible_count = self.load_step;
        self.follow().await
    }

    /// Show `load_step` more classrooms.
    pub async fn load_more(&self) -> Result<(), AppError> {
        self.state.write().await.visible_count += self.load_step;
        let all = self.store.list(paths::CLASSROOMS, &QueryOptions::new()).await?;
        apply(&self.state, all).await;
        Ok(())
    }

    /// Apply a settled search term.
    pub async fn search(&self, term: String) -> Result<(), AppError> {
        self.state.write().await.search = term;
        self.follow().await
    }

    pub async fn snapshot(&self) -> ClassroomListState {
        self.state.read().await.clone()
    }

    pub async fn stop(&self) {
        self.listener.cancel().await;
    }

    async fn follow(&self) -> Result<(), AppError> {
        self.listener.cancel().await;
        self.state.write().await.loading = true;

        let mut subscription = self.store.subscribe(paths::CLASSROOMS, QueryOptions::new());
        match subscription.next_snapshot().await {
            Some(Ok(all)) => apply(&self.state, all).await,
            Some(Err(e)) => {
                self.state.write().await.loading = false;
                return Err(e);
            }
            None => {
                self.state.write().await.loading = false;
                return Err(AppError::Document("Subscription closed".to_string()));
            }
        }

        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            while let Some(Ok(all)) = subscription.next_snapshot().await {
                apply(&state, all).await;
            }
            state.write().await.loading = false;
        });
        self.listener.replace(task).await;
        Ok(())
    }
}

async fn apply(state: &RwLock<ClassroomListState>, all: Vec<Value>) {
    let classrooms: Vec<Classroom> = decode_all(all);
    let mut state = state.write().await;

    let term = state.search.to_lowercase();
    let filtered: Vec<Classroom> = classrooms
        .into_iter()
        .filter(|c| {
            term.is_empty()
                || c.name.to_lowercase().contains(&term)
                || c.location.to_lowercase().contains(&term)
        })
        .collect();

    let visible = state.visible_count;
    state.can_load_more = filtered.len() > visible;
    state.classrooms = filtered.into_iter().take(visible).collect();
    state.loading = false;
}
