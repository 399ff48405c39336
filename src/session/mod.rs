//! Session helper for the single client installation.
//!
//! Holds the local persisted state (a JSON object on disk, the current user
//! under key `user`), the toast queue read by the HTTP layer and the loading
//! indicator.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Redirect;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};

use crate::errors::AppError;
use crate::models::User;

/// Key of the stored user in local storage.
pub const USER_KEY: &str = "user";

/// Toasts kept before the oldest ones are dropped.
const TOAST_QUEUE_CAPACITY: usize = 32;

/// A short notification shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub message: String,
    pub duration_ms: u64,
    pub color: String,
    pub position: String,
    pub icon: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            duration_ms: 1500,
            color: "success".to_string(),
            position: "middle".to_string(),
            icon: "checkmark-outline".to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            duration_ms: 2500,
            color: "danger".to_string(),
            position: "middle".to_string(),
            icon: "alert-circle-outline".to_string(),
        }
    }

    /// Neutral notice, as after requesting a recovery email.
    pub fn notice(message: impl Into<String>, icon: &str) -> Self {
        Self {
            color: "primary".to_string(),
            icon: icon.to_string(),
            ..Self::success(message)
        }
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = icon.to_string();
        self
    }
}

/// Side menu entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuPage {
    pub title: &'static str,
    pub url: &'static str,
    pub icon: &'static str,
}

/// Menu pages available to `user`.
pub fn menu_pages(user: &User) -> Vec<MenuPage> {
    let mut pages = vec![MenuPage {
        title: "Mis incidencias",
        url: "mis-incidencias",
        icon: "home-outline",
    }];
    if user.tic_role {
        pages.push(MenuPage {
            title: "Gestionar incidencias",
            url: "incidencias",
            icon: "build-outline",
        });
    }
    if user.admin_role {
        pages.extend([
            MenuPage {
                title: "Inventario de equipos",
                url: "inventario",
                icon: "laptop-outline",
            },
            MenuPage {
                title: "Gestión de aulas",
                url: "aulas",
                icon: "school-outline",
            },
            MenuPage {
                title: "Añadir usuario con privilegios",
                url: "create-privileged-user",
                icon: "person-add-outline",
            },
        ]);
    }
    pages
}

/// Redirect to an app route. Relative routes are rooted.
pub fn url_tree(path: &str) -> Redirect {
    Redirect::to(&format!("/{}", path.trim_start_matches('/')))
}

struct SessionInner {
    storage_path: PathBuf,
    storage: RwLock<Map<String, Value>>,
    toasts: Mutex<VecDeque<Toast>>,
    loading: AtomicUsize,
}

/// Handle to the session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Open the local storage file, starting empty when it does not exist.
    pub async fn open(storage_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let storage_path = storage_path.into();
        let storage = match tokio::fs::read_to_string(&storage_path).await {
            Ok(contents) if !contents.trim().is_empty() => serde_json::from_str(&contents)?,
            Ok(_) => Map::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            inner: Arc::new(SessionInner {
                storage_path,
                storage: RwLock::new(storage),
                toasts: Mutex::new(VecDeque::new()),
                loading: AtomicUsize::new(0),
            }),
        })
    }

    pub async fn save(&self, key: &str, value: Value) -> Result<(), AppError> {
        let mut storage = self.inner.storage.write().await;
        storage.insert(key.to_string(), value);
        self.flush(&storage).await
    }

    pub async fn load(&self, key: &str) -> Option<Value> {
        self.inner.storage.read().await.get(key).cloned()
    }

    pub async fn remove(&self, key: &str) -> Result<(), AppError> {
        let mut storage = self.inner.storage.write().await;
        if storage.remove(key).is_some() {
            self.flush(&storage).await?;
        }
        Ok(())
    }

    /// The stored user. An unreadable record counts as absent.
    pub async fn current_user(&self) -> Option<User> {
        let value = self.load(USER_KEY).await?;
        match serde_json::from_value(value) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("Stored user is unreadable: {}", e);
                None
            }
        }
    }

    pub async fn save_user(&self, user: &User) -> Result<(), AppError> {
        self.save(USER_KEY, serde_json::to_value(user)?).await
    }

    pub async fn clear_user(&self) -> Result<(), AppError> {
        self.remove(USER_KEY).await
    }

    pub async fn present_toast(&self, toast: Toast) {
        if toast.color == "danger" {
            tracing::warn!(message = %toast.message, "Toast");
        } else {
            tracing::info!(message = %toast.message, "Toast");
        }

        let mut toasts = self.inner.toasts.lock().await;
        if toasts.len() == TOAST_QUEUE_CAPACITY {
            toasts.pop_front();
        }
        toasts.push_back(toast);
    }

    /// Take every pending toast.
    pub async fn drain_toasts(&self) -> Vec<Toast> {
        self.inner.toasts.lock().await.drain(..).collect()
    }

    /// Mark the session busy until the returned guard is dropped.
    pub fn loading(&self) -> LoadingGuard {
        self.inner.loading.fetch_add(1, Ordering::SeqCst);
        LoadingGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::SeqCst) > 0
    }

    async fn flush(&self, storage: &Map<String, Value>) -> Result<(), AppError> {
        if let Some(parent) = self.inner.storage_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(storage)?;
        tokio::fs::write(&self.inner.storage_path, contents).await?;
        Ok(())
    }
}

/// Loading indicator; dismissed on drop.
pub struct LoadingGuard {
    inner: Arc<SessionInner>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.inner.loading.fetch_sub(1, Ordering::SeqCst);
    }
}
