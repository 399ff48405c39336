//! List views backed by live document-store queries.
//!
//! Incidence lists page with a cursor; the classroom and device lists read
//! the whole collection and slice it in memory. Every list cancels its
//! previous listener before subscribing again.

mod classrooms;
mod debounce;
mod devices;
mod incidences;

pub use classrooms::*;
pub use debounce::*;
pub use devices::*;
pub use incidences::*;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::store::DocumentStore;

/// Background listener of a list; aborted when replaced or dropped.
#[derive(Default)]
pub(crate) struct ListenerSlot(Mutex<Option<JoinHandle<()>>>);

impl ListenerSlot {
    pub(crate) async fn cancel(&self) {
        if let Some(task) = self.0.lock().await.take() {
            task.abort();
        }
    }

    pub(crate) async fn replace(&self, task: JoinHandle<()>) {
        if let Some(previous) = self.0.lock().await.replace(task) {
            previous.abort();
        }
    }
}

impl Drop for ListenerSlot {
    fn drop(&mut self) {
        if let Some(task) = self.0.get_mut().take() {
            task.abort();
        }
    }
}

/// Decode documents, skipping the ones that do not fit `T`.
pub(crate) fn decode_all<T: DeserializeOwned>(documents: Vec<Value>) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|doc| match serde_json::from_value(doc) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Skipping malformed document: {}", e);
                None
            }
        })
        .collect()
}

/// The current user's list and its search input.
struct MyIncidences {
    uid: String,
    list: IncidenceList,
    search: SearchDebouncer,
}

/// Every list view of the installation with its debounced search input.
pub struct Views {
    store: DocumentStore,
    load_step: usize,
    quiet: Duration,
    pub incidences: IncidenceList,
    pub classrooms: ClassroomList,
    pub devices: DeviceList,
    incidence_search: SearchDebouncer,
    classroom_search: SearchDebouncer,
    device_search: SearchDebouncer,
    mine: Mutex<Option<MyIncidences>>,
}

impl Views {
    /// Must be called from within a tokio runtime.
    pub fn new(store: DocumentStore, load_step: usize, quiet: Duration) -> Self {
        let incidences = IncidenceList::new(store.clone(), IncidenceScope::All, load_step);
        let classrooms = ClassroomList::new(store.clone(), load_step);
        let devices = DeviceList::new(store.clone(), load_step);

        let incidence_search = {
            let list = incidences.clone();
            SearchDebouncer::spawn(quiet, move |term| {
                let list = list.clone();
                async move {
                    if let Err(e) = list.search(term).await {
                        tracing::error!("Error searching incidences: {}", e);
                    }
                }
            })
        };
        let classroom_search = {
            let list = classrooms.clone();
            SearchDebouncer::spawn(quiet, move |term| {
                let list = list.clone();
                async move {
                    if let Err(e) = list.search(term).await {
                        tracing::error!("Error searching classrooms: {}", e);
                    }
                }
            })
        };
        let device_search = {
            let list = devices.clone();
            SearchDebouncer::spawn(quiet, move |term| {
                let list = list.clone();
                async move {
                    if let Err(e) = list.search(term).await {
                        tracing::error!("Error searching devices: {}", e);
                    }
                }
            })
        };

        Self {
            store,
            load_step,
            quiet,
            incidences,
            classrooms,
            devices,
            incidence_search,
            classroom_search,
            device_search,
            mine: Mutex::new(None),
        }
    }

    /// The "my incidences" list of `uid`, replacing another user's list.
    pub async fn my_incidences(&self, uid: &str) -> IncidenceList {
        let mut mine = self.mine.lock().await;
        if let Some(current) = mine.as_ref() {
            if current.uid == uid {
                return current.list.clone();
            }
            current.list.stop().await;
        }

        let list = IncidenceList::new(
            self.store.clone(),
            IncidenceScope::ReportedBy(uid.to_string()),
            self.load_step,
        );
        let search = {
            let list = list.clone();
            SearchDebouncer::spawn(self.quiet, move |term| {
                let list = list.clone();
                async move {
                    if let Err(e) = list.search(term).await {
                        tracing::error!("Error searching own incidences: {}", e);
                    }
                }
            })
        };
        *mine = Some(MyIncidences {
            uid: uid.to_string(),
            list: list.clone(),
            search,
        });
        list
    }

    pub fn search_incidences(&self, term: impl Into<String>) {
        self.incidence_search.push(term);
    }

    pub fn search_classrooms(&self, term: impl Into<String>) {
        self.classroom_search.push(term);
    }

    pub fn search_devices(&self, term: impl Into<String>) {
        self.device_search.push(term);
    }

    pub async fn search_my_incidences(&self, uid: &str, term: impl Into<String>) {
        self.my_incidences(uid).await;
        if let Some(mine) = self.mine.lock().await.as_ref() {
            mine.search.push(term);
        }
    }

    /// Stop every listener, as on sign-out.
    pub async fn close_all(&self) {
        self.incidences.stop().await;
        self.classrooms.stop().await;
        self.devices.stop().await;
        if let Some(mine) = self.mine.lock().await.take() {
            mine.list.stop().await;
        }
    }
}
