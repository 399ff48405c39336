//! Device inventory of the selected classroom, filtered, sorted and sliced
//! in memory.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use super::{decode_all, ListenerSlot};
use crate::errors::AppError;
use crate::models::{Classroom, Device, DeviceStatus};
use crate::store::{paths, DocumentStore, QueryOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceOrder {
    Type,
    Brand,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListState {
    pub classrooms: Vec<Classroom>,
    pub selected_classroom_id: Option<String>,
    pub status_filter: Option<DeviceStatus>,
    pub order_by: Option<DeviceOrder>,
    pub search: String,
    pub visible_count: usize,
    pub devices: Vec<Device>,
    pub can_load_more: bool,
    pub loading: bool,
}

#[derive(Clone)]
pub struct DeviceList {
    store: DocumentStore,
    load_step: usize,
    state: Arc<RwLock<DeviceListState>>,
    listener: Arc<ListenerSlot>,
}

impl DeviceList {
    pub fn new(store: DocumentStore, load_step: usize) -> Self {
        let state = DeviceListState {
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

    /// Read the classrooms, select the first one when none is selected and
    /// follow its devices.
    pub async fn load_classrooms(&self) -> Result<(), AppError> {
        let classrooms: Vec<Classroom> = self
            .store
            .list_as(paths::CLASSROOMS, &QueryOptions::new())
            .await?;

        let selected = {
            let mut state = self.state.write().await;
            let still_exists = state
                .selected_classroom_id
                .as_ref()
                .is_some_and(|id| classrooms.iter().any(|c| &c.id == id));
            if !still_exists {
                state.selected_classroom_id = classrooms.first().map(|c| c.id.clone());
            }
            state.classrooms = classrooms;
            state.selected_classroom_id.clone()
        };

        match selected {
            Some(_) => self.follow().await,
            None => {
                self.listener.cancel().await;
                let mut state = self.state.write().await;
                state.devices.clear();
                state.can_load_more = false;
                Ok(())
            }
        }
    }

    pub async fn select_classroom(&self, classroom_id: String) -> Result<(), AppError> {
        {
            let mut state = self.state.write().await;
            state.selected_classroom_id = Some(classroom_id);
            state.visible_count = self.load_step;
        }
        self.follow().await
    }

    pub async fn set_status_filter(&self, status: Option<DeviceStatus>) -> Result<(), AppError> {
        self.state.write().await.status_filter = status;
        self.follow().await
    }

    pub async fn set_order(&self, order: Option<DeviceOrder>) -> Result<(), AppError> {
        self.state.write().await.order_by = order;
        self.follow().await
    }

    /// Apply a settled search term.
    pub async fn search(&self, term: String) -> Result<(), AppError> {
        self.state.write().await.search = term;
        self.follow().await
    }

    /// Reset to the first page and follow the selected classroom.
    pub async fn refresh(&self) -> Result<(), AppError> {
        self.state.write().await.visible_count = self.load_step;
        self.follow().await
    }

    pub async fn load_more(&self) -> Result<(), AppError> {
        let selected = {
            let mut state = self.state.write().await;
            state.visible_count += self.load_step;
            state.selected_classroom_id.clone()
        };
        let Some(classroom_id) = selected else {
            return Ok(());
        };

        let all = self
            .store
            .list(&paths::devices(&classroom_id), &QueryOptions::new())
            .await?;
        apply(&self.state, all).await;
        Ok(())
    }

    pub async fn snapshot(&self) -> DeviceListState {
        self.state.read().await.clone()
    }

    pub async fn stop(&self) {
        self.listener.cancel().await;
    }

    async fn follow(&self) -> Result<(), AppError> {
        self.listener.cancel().await;
        let Some(classroom_id) = self.state.read().await.selected_classroom_id.clone() else {
            return Ok(());
        };
        self.state.write().await.loading = true;

        let mut subscription = self
            .store
            .subscribe(&paths::devices(&classroom_id), QueryOptions::new());
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

/// Case-insensitive order; exact text breaks ties.
fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

async fn apply(state: &RwLock<DeviceListState>, all: Vec<Value>) {
    let mut devices: Vec<Device> = decode_all(all);
    let mut state = state.write().await;

    if let Some(status) = state.status_filter {
        devices.retain(|d| d.status == status);
    }
    match state.order_by {
        Some(DeviceOrder::Type) => {
            devices.sort_by(|a, b| compare_text(a.device_type.as_str(), b.device_type.as_str()))
        }
        Some(DeviceOrder::Brand) => devices.sort_by(|a, b| compare_text(&a.brand, &b.brand)),
        None => {}
    }
    let term = state.search.to_lowercase();
    if !term.is_empty() {
        devices.retain(|d| {
            d.device_type.as_str().to_lowercase().contains(&term)
                || d.serial_number.to_lowercase().contains(&term)
                || d.brand.to_lowercase().contains(&term)
        });
    }

    let visible = state.visible_count;
    state.can_load_more = devices.len() > visible;
    devices.truncate(visible);
    state.devices = devices;
    state.loading = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::init_database;
    use serde_json::json;
    use tempfile::TempDir;

    async fn seeded_list() -> (DeviceList, DocumentStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite")).await.unwrap();
        let store = DocumentStore::new(pool);

        for id in ["c1", "c2"] {
            store
                .set(&paths::classroom(id), json!({"name": format!("Aula {id}"), "location": "Planta 1"}))
                .await
                .unwrap();
        }
        let devices = [
            ("d1", "Teclado", "WORKING", "Logitech"),
            ("d2", "PC", "OUT_OF_SERVICE", "Dell"),
            ("d3", "Proyector", "WORKING", "Epson"),
            ("d4", "PC", "WORKING", "Acer"),
        ];
        for (id, device_type, status, brand) in devices {
            store
                .set(
                    &paths::device("c1", id),
                    json!({
                        "image": "",
                        "type": device_type,
                        "status": status,
                        "serial_number": format!("SN-{id}-0001"),
                        "brand": brand,
                        "classroomId": "c1",
                    }),
                )
                .await
                .unwrap();
        }
        (DeviceList::new(store.clone(), 2), store, temp_dir)
    }

    fn ids(state: &DeviceListState) -> Vec<&str> {
        state.devices.iter().map(|d| d.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_selects_first_classroom() {
        let (list, _store, _dir) = seeded_list().await;
        list.load_classrooms().await.unwrap();

        let state = list.snapshot().await;
        assert_eq!(state.classrooms.len(), 2);
        assert_eq!(state.selected_classroom_id.as_deref(), Some("c1"));
        assert_eq!(state.devices.len(), 2);
        assert!(state.can_load_more);
        list.stop().await;
    }

    #[tokio::test]
    async fn test_filter_then_sort_then_search() {
        let (list, _store, _dir) = seeded_list().await;
        list.load_classrooms().await.unwrap();

        list.set_status_filter(Some(DeviceStatus::Working)).await.unwrap();
        list.set_order(Some(DeviceOrder::Brand)).await.unwrap();
        let state = list.snapshot().await;
        assert_eq!(ids(&state), vec!["d4", "d3"]);
        assert!(state.can_load_more);

        list.load_more().await.unwrap();
        assert_eq!(ids(&list.snapshot().await), vec!["d4", "d3", "d1"]);

        list.search("sn-d3".to_string()).await.unwrap();
        let state = list.snapshot().await;
        assert_eq!(ids(&state), vec!["d3"]);
        assert!(!state.can_load_more);
        list.stop().await;
    }

    #[test]
    fn test_compare_text_ignores_case() {
        let mut brands = vec!["Zebra", "apple", "Dell", "acer"];
        brands.sort_by(|a, b| compare_text(a, b));
        assert_eq!(brands, vec!["acer", "apple", "Dell", "Zebra"]);
        assert_eq!(compare_text("HP", "hp"), Ordering::Less);
    }

    #[tokio::test]
    async fn test_brand_order_ignores_case() {
        let (list, store, _dir) = seeded_list().await;
        for (id, brand) in [("d5", "Zebra"), ("d6", "apple")] {
            store
                .set(
                    &paths::device("c2", id),
                    json!({
                        "image": "",
                        "type": "PC",
                        "status": "WORKING",
                        "serial_number": format!("SN-{id}-0001"),
                        "brand": brand,
                        "classroomId": "c2",
                    }),
                )
                .await
                .unwrap();
        }
        list.load_classrooms().await.unwrap();
        list.select_classroom("c2".to_string()).await.unwrap();
        list.set_order(Some(DeviceOrder::Brand)).await.unwrap();

        assert_eq!(ids(&list.snapshot().await), vec!["d6", "d5"]);
        list.stop().await;
    }

    #[tokio::test]
    async fn test_empty_classroom_lists_nothing() {
        let (list, _store, _dir) = seeded_list().await;
        list.load_classrooms().await.unwrap();
        list.select_classroom("c2".to_string()).await.unwrap();

        let state = list.snapshot().await;
        assert!(state.devices.is_empty());
        assert!(!state.can_load_more);
        list.stop().await;
    }
}
