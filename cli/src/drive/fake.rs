//! In-process stand-in for the slice of the Drive and userinfo APIs the
//! client uses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::Json;
use serde_json::{Value, json};

use recipebox_core::drive::FileMetadata;

#[derive(Debug, Clone)]
pub(crate) struct FakeFile {
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
    pub trashed: bool,
}

#[derive(Default)]
struct FakeState {
    files: HashMap<String, FakeFile>,
    order: Vec<String>,
    next_id: u32,
    requests: Vec<String>,
    reject_content: bool,
}

pub(crate) struct FakeDrive {
    token: String,
    state: Mutex<FakeState>,
}

impl FakeDrive {
    /// Serve on an ephemeral port. Returns the base URL and a handle for
    /// inspecting and seeding files.
    pub(crate) async fn spawn(token: &str) -> (String, Arc<FakeDrive>) {
        let fake = Arc::new(FakeDrive {
            token: token.to_string(),
            state: Mutex::new(FakeState::default()),
        });

        let app = Router::new()
            .route("/drive/v3/files", get(list_files).post(create_metadata))
            .route("/drive/v3/files/{id}", get(get_media))
            .route("/upload/drive/v3/files", post(create_multipart))
            .route("/upload/drive/v3/files/{id}", patch(put_media))
            .route("/userinfo/v2/me", get(user_info))
            .layer(middleware::from_fn_with_state(fake.clone(), require_bearer))
            .layer(middleware::from_fn_with_state(fake.clone(), record_request))
            .with_state(fake.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake drive");
        let addr = listener.local_addr().expect("fake drive address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (format!("http://{addr}"), fake)
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, name: &str, mime_type: &str, content: &[u8]) -> String {
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("file-{}", state.next_id);
        state.files.insert(
            id.clone(),
            FakeFile {
                name: name.to_string(),
                mime_type: mime_type.to_string(),
                content: content.to_vec(),
                trashed: false,
            },
        );
        state.order.push(id.clone());
        id
    }

    pub(crate) fn trash(&self, id: &str) {
        if let Some(file) = self.state().files.get_mut(id) {
            file.trashed = true;
        }
    }

    pub(crate) fn file(&self, id: &str) -> Option<FakeFile> {
        self.state().files.get(id).cloned()
    }

    /// Live files named `name`, oldest first.
    pub(crate) fn files_named(&self, name: &str) -> Vec<(String, FakeFile)> {
        let state = self.state();
        state
            .order
            .iter()
            .filter_map(|id| state.files.get(id).map(|f| (id.clone(), f.clone())))
            .filter(|(_, f)| f.name == name && !f.trashed)
            .collect()
    }

    /// `METHOD /path`, plus ` uploadType=..` when present.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.state().requests.clone()
    }

    pub(crate) fn reject_content(&self, reject: bool) {
        self.state().reject_content = reject;
    }
}

async fn record_request(State(fake): State<Arc<FakeDrive>>, req: Request, next: Next) -> Response {
    let mut line = format!("{} {}", req.method(), req.uri().path());
    if let Some(upload_type) = req
        .uri()
        .query()
        .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("uploadType=")))
    {
        line.push_str(" uploadType=");
        line.push_str(upload_type);
    }
    fake.state().requests.push(line);
    next.run(req).await
}

async fn require_bearer(State(fake): State<Arc<FakeDrive>>, req: Request, next: Next) -> Response {
    let expected = format!("Bearer {}", fake.token);
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"code": 401, "message": "Invalid Credentials"}})),
        )
            .into_response();
    }
    next.run(req).await
}

fn entry(id: &str, file: &FakeFile) -> Value {
    json!({"id": id, "name": file.name, "mimeType": file.mime_type})
}

/// Pull the name out of `name = '<name>' and trashed = false`.
fn queried_name(q: &str) -> Option<&str> {
    let rest = q.strip_prefix("name = '")?;
    rest.split('\'').next()
}

async fn list_files(
    State(fake): State<Arc<FakeDrive>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let files: Vec<Value> = match params.get("q").map(String::as_str).and_then(queried_name) {
        Some(name) => fake
            .files_named(name)
            .iter()
            .map(|(id, f)| entry(id, f))
            .collect(),
        None => Vec::new(),
    };
    Json(json!({"files": files}))
}

async fn create_metadata(
    State(fake): State<Arc<FakeDrive>>,
    Json(meta): Json<FileMetadata>,
) -> Result<Json<Value>, StatusCode> {
    let id = fake.insert(&meta.name, &meta.mime_type, b"");
    let file = fake.file(&id).ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(entry(&id, &file)))
}

async fn get_media(
    State(fake): State<Arc<FakeDrive>>,
    Path(id): Path<String>,
) -> Result<Vec<u8>, StatusCode> {
    fake.file(&id)
        .map(|f| f.content)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn put_media(
    State(fake): State<Arc<FakeDrive>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, StatusCode> {
    let mut state = fake.state();
    if state.reject_content {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let file = state.files.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    file.content = body.to_vec();
    Ok(Json(entry(&id, file)))
}

async fn create_multipart(
    State(fake): State<Arc<FakeDrive>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, StatusCode> {
    let mut meta: Option<FileMetadata> = None;
    let mut content: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        match name.as_str() {
            "metadata" => {
                meta = Some(serde_json::from_slice(&bytes).map_err(|_| StatusCode::BAD_REQUEST)?);
            }
            "file" => content = Some(bytes.to_vec()),
            _ => {}
        }
    }
    let (Some(meta), Some(content)) = (meta, content) else {
        return Err(StatusCode::BAD_REQUEST);
    };
    let id = fake.insert(&meta.name, &meta.mime_type, &content);
    let file = fake.file(&id).ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(entry(&id, &file)))
}

async fn user_info() -> Json<Value> {
    Json(json!({
        "id": "1234567890",
        "email": "cook@example.com",
        "verified_email": true,
        "name": "Test Cook",
        "given_name": "Test",
        "family_name": "Cook",
        "picture": "",
        "locale": "en"
    }))
}
