//! Integration tests for the incidence tracker backend.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{redirect::Policy, Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::auth::AuthProvider;
use crate::blobs::{BlobPayload, BlobStore};
use crate::config::Config;
use crate::models::User;
use crate::session::Session;
use crate::store::{init_database, paths, DocumentStore};
use crate::views::Views;
use crate::{create_router, AppState};

/// One-pixel PNG as a data URL.
const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

const PASSWORD: &str = "contraseña1";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    store: DocumentStore,
    blobs: BlobStore,
    auth: AuthProvider,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some("test-api-key".to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        // Bind first so blob URLs point at this server
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        let config = Config {
            api_psk: psk.clone(),
            db_path: temp_dir.path().join("test.sqlite"),
            blob_root: temp_dir.path().join("blobs"),
            public_base_url: base_url.clone(),
            bucket: "images".to_string(),
            session_path: temp_dir.path().join("session.json"),
            bind_addr: addr,
            log_level: "warn".to_string(),
            load_step: 5,
            search_debounce: Duration::from_millis(50),
        };

        let pool = init_database(&config.db_path).await.expect("Failed to init DB");
        let store = DocumentStore::new(pool.clone());
        let auth = AuthProvider::new(pool);
        let blobs = BlobStore::open(&config.blob_root, &config.public_base_url, &config.bucket)
            .await
            .expect("Failed to open blob store");
        let session = Session::open(&config.session_path)
            .await
            .expect("Failed to open session");
        let views = Arc::new(Views::new(store.clone(), config.load_step, config.search_debounce));

        let state = AppState {
            store: store.clone(),
            blobs: blobs.clone(),
            auth: auth.clone(),
            session,
            views,
            config: Arc::new(config),
        };

        let app = create_router(state);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut client_builder = Client::builder().redirect(Policy::none());
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            store,
            blobs,
            auth,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn put(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.put(self.url(path)).json(&body).send().await.unwrap()
    }

    /// Register an account with a profile, bypassing the sign-up page.
    async fn create_user(&self, email: &str, name: &str, tic_role: bool, admin_role: bool) -> String {
        let account = self.auth.create_account(email, PASSWORD, Some(name)).await.unwrap();
        let user = User {
            uid: account.uid.clone(),
            name: name.to_string(),
            email: account.email,
            tic_role,
            admin_role,
        };
        self.store
            .set(&paths::user(&account.uid), serde_json::to_value(&user).unwrap())
            .await
            .unwrap();
        account.uid
    }

    async fn sign_in(&self, email: &str) -> Value {
        let resp = self
            .post("/auth", json!({"email": email, "password": PASSWORD}))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        resp.json().await.unwrap()
    }

    async fn sign_out(&self) {
        let resp = self.post("/main/sign-out", json!({})).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

fn location(resp: &reqwest::Response) -> &str {
    resp.headers()["location"].to_str().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    // Health is reachable without the key
    let resp = Client::new().get(fixture.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_psk_required() {
    let fixture = TestFixture::new().await;
    let client = Client::builder().redirect(Policy::none()).build().unwrap();

    let resp = client.get(fixture.url("/auth")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = client
        .get(fixture.url("/auth"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(fixture.url("/auth"))
        .header("Authorization", "Bearer test-api-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_navigation_without_session() {
    let fixture = TestFixture::new().await;

    let resp = fixture.get("/").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/auth");

    let resp = fixture.get("/main/mis-incidencias").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/auth");

    let resp = fixture.get("/auth").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["page"], "auth");

    let resp = fixture.get("/no-existe").await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_sign_up_and_role_guards() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .post(
            "/sign-up",
            json!({"email": "alumno@ies.es", "password": PASSWORD, "name": "Alumno Uno"}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["redirect"], "main/mis-incidencias");
    assert_eq!(body["toasts"][0]["color"], "success");

    // Signed in: the sign-in pages send the user home
    let resp = fixture.get("/auth").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/main/mis-incidencias");

    let resp = fixture.get("/main").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["user"]["name"], "Alumno Uno");
    assert_eq!(body["data"]["pages"].as_array().unwrap().len(), 1);

    for path in ["/main/incidencias", "/main/aulas", "/main/inventario"] {
        let resp = fixture.get(path).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&resp), "/auth");
    }

    fixture.sign_out().await;
    let resp = fixture.get("/main").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_wrong_credentials() {
    let fixture = TestFixture::new().await;
    fixture.create_user("tic@ies.es", "Técnico TIC", true, false).await;

    let resp = fixture
        .post("/auth", json!({"email": "tic@ies.es", "password": "incorrecta"}))
        .await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["toasts"][0]["message"], "Error, correo o contraseña equivocados");
    assert_eq!(body["toasts"][0]["color"], "danger");
}

#[tokio::test]
async fn test_classroom_crud() {
    let fixture = TestFixture::new().await;
    fixture.create_user("admin@ies.es", "Dirección", false, true).await;
    let body = fixture.sign_in("admin@ies.es").await;
    assert_eq!(body["data"]["redirect"], "main/mis-incidencias");

    let resp = fixture
        .post("/main/aulas", json!({"name": "Aula 101", "location": "Planta baja"}))
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["toasts"][0]["message"], "Aula añadida exitosamente");

    let resp = fixture
        .put(
            &format!("/main/aulas/{}", id),
            json!({"name": "Aula 102", "location": "Planta baja"}),
        )
        .await;
    assert_eq!(resp.status(), 200);

    let body: Value = fixture.get("/main/aulas").await.json().await.unwrap();
    assert_eq!(body["data"]["classrooms"][0]["name"], "Aula 102");
    assert_eq!(body["data"]["canLoadMore"], false);

    // Too short
    let resp = fixture
        .post("/main/aulas", json!({"name": "A1", "location": "Planta baja"}))
        .await;
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["toasts"][0]["color"], "danger");

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/main/aulas/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(fixture.store.get(&paths::classroom(&id)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_incidence_report_and_management() {
    let fixture = TestFixture::new().await;
    let reporter = fixture
        .create_user("alumno@ies.es", "Alumno Uno", false, false)
        .await;
    fixture.create_user("tic@ies.es", "Técnico TIC", true, false).await;

    fixture.sign_in("alumno@ies.es").await;
    let resp = fixture
        .post(
            "/main/mis-incidencias",
            json!({
                "title": "Proyector roto",
                "description": "No enciende desde el lunes",
                "image": PIXEL,
                "classroomId": "c1",
                "deviceId": "d1"
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // Both copies hold the same fields; the global one adds userId
    let mut owner = fixture
        .store
        .get(&paths::user_incidence(&reporter, &id))
        .await
        .unwrap()
        .unwrap();
    let mut global = fixture.store.get(&paths::incidence(&id)).await.unwrap().unwrap();
    assert_eq!(global["userId"], reporter.as_str());
    global.as_object_mut().unwrap().remove("userId");
    owner.as_object_mut().unwrap().remove("userId");
    assert_eq!(owner, global);

    // The image is served from its public URL
    let image_url = owner["image"].as_str().unwrap().to_string();
    let resp = fixture.client.get(&image_url).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/png");

    let body: Value = fixture.get("/main/mis-incidencias").await.json().await.unwrap();
    assert_eq!(body["data"]["incidences"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["summary"]["open"], 1);

    fixture.sign_out().await;
    let body = fixture.sign_in("tic@ies.es").await;
    assert_eq!(body["data"]["redirect"], "main/incidencias");

    let body: Value = fixture
        .get(&format!("/main/incidencias/detalles/{}", id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["form"]["status"], "IN_PROGRESS");

    let resp = fixture
        .put(
            &format!("/main/incidencias/detalles/{}", id),
            json!({"status": "IN_PROGRESS", "diagnose": "Lámpara fundida", "comment": "Pedida lámpara nueva"}),
        )
        .await;
    assert_eq!(resp.status(), 200);

    let body: Value = fixture
        .get("/main/incidencias?segment=closed&status=RESOLVED")
        .await
        .json()
        .await
        .unwrap();
    let listed = body["data"]["incidences"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["isClosed"], true);
    assert_eq!(body["data"]["summary"]["closed"], 1);

    let owner = fixture
        .store
        .get(&paths::user_incidence(&reporter, &id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(owner["status"], "RESOLVED");
    assert_eq!(owner["reportedByUserId"], reporter.as_str());

    let body: Value = fixture
        .get(&format!("/main/incidencias/detalles/{}", id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["comments"][0]["message"], "Pedida lámpara nueva");
}

#[tokio::test]
async fn test_own_incidence_delete_is_limited_to_reporter() {
    let fixture = TestFixture::new().await;
    let reporter = fixture
        .create_user("alumno@ies.es", "Alumno Uno", false, false)
        .await;
    fixture.create_user("otro@ies.es", "Alumno Dos", false, false).await;

    fixture.sign_in("alumno@ies.es").await;
    let body: Value = fixture
        .post(
            "/main/mis-incidencias",
            json!({
                "title": "Teclado sin teclas",
                "description": "Faltan varias teclas del teclado",
                "image": PIXEL,
                "classroomId": "c1",
                "deviceId": "d1"
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    fixture.sign_out().await;

    fixture.sign_in("otro@ies.es").await;
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/main/mis-incidencias/detalles/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert!(fixture
        .store
        .get(&paths::user_incidence(&reporter, &id))
        .await
        .unwrap()
        .is_some());
    assert!(fixture.store.get(&paths::incidence(&id)).await.unwrap().is_some());
    fixture.sign_out().await;

    fixture.sign_in("alumno@ies.es").await;
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/main/mis-incidencias/detalles/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(fixture.store.get(&paths::incidence(&id)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_device_move_between_classrooms() {
    let fixture = TestFixture::new().await;
    fixture.create_user("admin@ies.es", "Dirección", false, true).await;
    fixture.sign_in("admin@ies.es").await;

    for (id, name) in [("c1", "Aula 101"), ("c2", "Aula 202")] {
        fixture
            .store
            .set(&paths::classroom(id), json!({"name": name, "location": "Planta baja"}))
            .await
            .unwrap();
    }

    let device = json!({
        "image": PIXEL,
        "type": "PC",
        "status": "WORKING",
        "serial_number": "SN-00042",
        "brand": "Dell",
        "classroomId": "c1"
    });
    let body: Value = fixture.post("/main/inventario", device).await.json().await.unwrap();
    let device_id = body["data"]["id"].as_str().unwrap().to_string();

    let details: Value = fixture
        .get(&format!("/main/inventario/detalles/c1/{}", device_id))
        .await
        .json()
        .await
        .unwrap();
    let image = details["data"]["device"]["image"].clone();
    assert_eq!(details["data"]["classroom"]["name"], "Aula 101");

    let resp = fixture
        .put(
            &format!("/main/inventario/detalles/c1/{}", device_id),
            json!({
                "image": image,
                "type": "PC",
                "status": "OUT_OF_SERVICE",
                "serial_number": "SN-00042",
                "brand": "Dell",
                "classroomId": "c2"
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);

    assert!(fixture
        .store
        .get(&paths::device("c1", &device_id))
        .await
        .unwrap()
        .is_none());
    let moved = fixture
        .store
        .get(&paths::device("c2", &device_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved["status"], "OUT_OF_SERVICE");

    let body: Value = fixture
        .get("/main/inventario?classroomId=c2")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["devices"][0]["id"], device_id.as_str());
}

#[tokio::test]
async fn test_blob_overwrite_keeps_url() {
    let fixture = TestFixture::new().await;

    let first = fixture
        .blobs
        .upload("u1/1", BlobPayload::Bytes(b"first".to_vec()))
        .await
        .unwrap();
    let second = fixture
        .blobs
        .upload("u1/1", BlobPayload::Bytes(b"second".to_vec()))
        .await
        .unwrap();
    assert_eq!(first, second);

    let resp = fixture.client.get(&first).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/octet-stream");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"second");

    let resp = fixture
        .get("/storage/v1/object/public/other/u1/1")
        .await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_privileged_user_keeps_admin_session() {
    let fixture = TestFixture::new().await;
    let admin = fixture.create_user("admin@ies.es", "Dirección", false, true).await;
    fixture.sign_in("admin@ies.es").await;

    let resp = fixture
        .post(
            "/main/create-privileged-user",
            json!({
                "email": "tic@ies.es",
                "password": PASSWORD,
                "name": "Técnico TIC",
                "tic_role": 1,
                "admin_role": 0
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let uid = body["data"]["id"].as_str().unwrap().to_string();

    let body: Value = fixture.get("/main").await.json().await.unwrap();
    assert_eq!(body["data"]["user"]["uid"], admin.as_str());

    let profile = fixture.store.get(&paths::user(&uid)).await.unwrap().unwrap();
    assert_eq!(profile["tic_role"], true);
    assert_eq!(profile["admin_role"], false);
}

#[tokio::test]
async fn test_search_settles_after_quiet_period() {
    let fixture = TestFixture::new().await;
    fixture.create_user("admin@ies.es", "Dirección", false, true).await;
    fixture.sign_in("admin@ies.es").await;
    for (id, name) in [("c1", "Aula de música"), ("c2", "Laboratorio")] {
        fixture
            .store
            .set(&paths::classroom(id), json!({"name": name, "location": "Planta baja"}))
            .await
            .unwrap();
    }
    fixture.get("/main/aulas").await;

    fixture.post("/main/aulas/search", json!({"term": "lab"})).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let body: Value = fixture
        .post("/main/aulas/search", json!({"term": "lab"}))
        .await
        .json()
        .await
        .unwrap();
    let listed = body["data"]["classrooms"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "Laboratorio");
}
