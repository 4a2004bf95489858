//! Mock Danbooru and Gelbooru served by axum on a background thread.
//!
//! Both sites share one base URL; their paths do not overlap. Every request
//! is recorded so tests can assert on what was sent.
//!
//! Fixture posts:
//!
//! | Site     | Post | Size (w x h) | Notes | Tags                           |
//! |----------|------|--------------|-------|--------------------------------|
//! | Danbooru | 1    | 200 x 100    | 2 (+1 inactive) | `translation_request solo` |
//! | Danbooru | 4    | 1064 x 1192  | 0     | `1girl check_translation`      |
//! | Gelbooru | 2    | 400 x 300    | 0     | `1girl translation_request solo` |
//! | Gelbooru | 3    | 532 x 596    | 2     | `translation_request`          |

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::json;

pub const GELBOORU_USER_ID: &str = "42";
pub const GELBOORU_PASS_HASH: &str = "abc123";
pub const GELBOORU_SESSION: &str = "sess1";
pub const GELBOORU_CSRF: &str = "tok123";
pub const GELBOORU_LUPDATED: &str = "1330391232";

/// One request seen by the mock.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
    pub query: HashMap<String, String>,
    pub form: HashMap<String, String>,
    pub cookie: Option<String>,
}

type Calls = Arc<Mutex<Vec<Call>>>;

pub struct MockSites {
    pub base_url: String,
    calls: Calls,
}

impl MockSites {
    pub fn start() -> Self {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let app = router(calls.clone());

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });

        Self {
            base_url: format!("http://{}", addr),
            calls,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str, path: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method && c.path == path)
            .collect()
    }

    /// Config file pointing both sites here, without cooldowns.
    pub fn config_toml(&self, auth_dir: &Path) -> String {
        format!(
            r#"auth_dir = "{auth}"

[http]
timeout_secs = 5

[sites.danbooru]
base_url = "{base}"
cooldown_secs = 0

[sites.gelbooru]
base_url = "{base}"
cooldown_secs = 0
"#,
            auth = auth_dir.display(),
            base = self.base_url
        )
    }
}

/// Write stored credentials for both sites into `dir`.
pub fn store_credentials(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    let danbooru: BTreeMap<&str, &str> = [("login", "alice"), ("api_key", "DKEY")].into();
    let gelbooru: BTreeMap<&str, &str> = [
        ("user_id", GELBOORU_USER_ID),
        ("pass_hash", GELBOORU_PASS_HASH),
        ("api_key", "GKEY"),
    ]
    .into();
    fs::write(
        dir.join("danbooru_auth.json"),
        serde_json::to_string(&danbooru).unwrap(),
    )
    .unwrap();
    fs::write(
        dir.join("gelbooru_auth.json"),
        serde_json::to_string(&gelbooru).unwrap(),
    )
    .unwrap();
}

fn router(calls: Calls) -> Router {
    Router::new()
        .route("/posts/{file}", get(danbooru_post).put(danbooru_update))
        .route("/notes.json", get(danbooru_notes).post(danbooru_create_note))
        .route("/index.php", get(gelbooru_index).post(gelbooru_login))
        .route("/public/note_save.php", post(gelbooru_note_save))
        .route("/public/edit_post.php", post(gelbooru_edit_post))
        .with_state(calls)
}

fn record(
    calls: &Calls,
    method: &'static str,
    path: &str,
    query: HashMap<String, String>,
    form: HashMap<String, String>,
    headers: &HeaderMap,
) {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    calls.lock().unwrap().push(Call {
        method,
        path: path.to_string(),
        query,
        form,
        cookie,
    });
}

fn has_session(headers: &HeaderMap) -> bool {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    cookie.contains(&format!("user_id={}", GELBOORU_USER_ID))
        && cookie.contains(&format!("pass_hash={}", GELBOORU_PASS_HASH))
}

// ─── Danbooru ───────────────────────────────────────────────────────

async fn danbooru_post(
    State(calls): State<Calls>,
    UrlPath(file): UrlPath<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    record(&calls, "GET", &format!("/posts/{}", file), query, HashMap::new(), &headers);
    match file.as_str() {
        "1.json" => Json(json!({
            "id": 1,
            "image_width": 200,
            "image_height": 100,
            "tag_string": "translation_request solo",
            "rating": "s",
            "parent_id": null
        }))
        .into_response(),
        "4.json" => Json(json!({
            "id": 4,
            "image_width": 1064,
            "image_height": 1192,
            "tag_string": "1girl check_translation",
            "rating": "s"
        }))
        .into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({ "success": false }))).into_response(),
    }
}

async fn danbooru_update(
    State(calls): State<Calls>,
    UrlPath(file): UrlPath<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    record(&calls, "PUT", &format!("/posts/{}", file), query, form, &headers);
    StatusCode::NO_CONTENT.into_response()
}

async fn danbooru_notes(
    State(calls): State<Calls>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let post_id = query.get("search[post_id]").cloned().unwrap_or_default();
    record(&calls, "GET", "/notes.json", query, HashMap::new(), &headers);
    match post_id.as_str() {
        "1" => Json(json!([
            { "id": 10, "x": 10, "y": 20, "width": 30, "height": 40,
              "body": "Hello\nworld", "is_active": true },
            { "id": 11, "x": 1, "y": 1, "width": 1, "height": 1,
              "body": "gone", "is_active": false },
            { "id": 12, "x": 0, "y": 0, "width": 200, "height": 100,
              "body": "Full", "is_active": true }
        ]))
        .into_response(),
        _ => Json(json!([])).into_response(),
    }
}

async fn danbooru_create_note(
    State(calls): State<Calls>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    record(&calls, "POST", "/notes.json", query, form, &headers);
    (StatusCode::CREATED, Json(json!({ "id": 99 }))).into_response()
}

// ─── Gelbooru ───────────────────────────────────────────────────────

fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

async fn gelbooru_index(
    State(calls): State<Calls>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let page = query.get("page").cloned().unwrap_or_default();
    let s = query.get("s").cloned().unwrap_or_default();
    let id = query
        .get("id")
        .or_else(|| query.get("post_id"))
        .cloned()
        .unwrap_or_default();
    record(&calls, "GET", "/index.php", query, HashMap::new(), &headers);

    match (page.as_str(), s.as_str(), id.as_str()) {
        ("dapi", "post", "2") => xml(api_post("2", 400, 300, "1girl translation_request solo")),
        ("dapi", "post", "3") => xml(api_post("3", 532, 596, "translation_request")),
        ("dapi", "post", _) => xml(
            r#"<?xml version="1.0" encoding="UTF-8"?><posts limit="100" offset="0" count="0"></posts>"#
                .to_string(),
        ),
        ("dapi", "note", "3") => xml(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<notes>
  <note id="1" x="17" y="32" width="59" height="120" is_active="true"
        body="first&lt;br /&gt;second" post_id="3"/>
  <note id="2" x="100" y="200" width="40" height="50" is_active="true"
        body="a &amp; b" post_id="3"/>
</notes>"#
                .to_string(),
        ),
        ("dapi", "note", _) => xml(r#"<?xml version="1.0" encoding="UTF-8"?><notes></notes>"#.to_string()),
        ("post", "view", "2") if has_session(&headers) => (
            AppendHeaders([(
                header::SET_COOKIE,
                format!("PHPSESSID={}; path=/", GELBOORU_SESSION),
            )]),
            Html(edit_page()),
        )
            .into_response(),
        ("post", "view", _) => Html("<html><body>You must be logged in.</body></html>").into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn gelbooru_login(
    State(calls): State<Calls>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let ok = form.get("user").map(String::as_str) == Some("alice")
        && form.get("pass").map(String::as_str) == Some("secret");
    record(&calls, "POST", "/index.php", query, form, &headers);
    if !ok {
        return Html("<html><body>Wrong username or password.</body></html>").into_response();
    }
    (
        AppendHeaders([
            (header::SET_COOKIE, format!("user_id={}; path=/", GELBOORU_USER_ID)),
            (header::SET_COOKIE, format!("pass_hash={}; path=/", GELBOORU_PASS_HASH)),
        ]),
        Html("<html><body>Welcome</body></html>"),
    )
        .into_response()
}

async fn gelbooru_note_save(
    State(calls): State<Calls>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let authorized = has_session(&headers);
    record(&calls, "POST", "/public/note_save.php", query, form, &headers);
    if authorized {
        StatusCode::OK.into_response()
    } else {
        StatusCode::FORBIDDEN.into_response()
    }
}

async fn gelbooru_edit_post(
    State(calls): State<Calls>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let authorized =
        has_session(&headers) && form.get("csrf-token").map(String::as_str) == Some(GELBOORU_CSRF);
    record(&calls, "POST", "/public/edit_post.php", query, form, &headers);
    if authorized {
        Html("<html><body>Saved</body></html>").into_response()
    } else {
        StatusCode::FORBIDDEN.into_response()
    }
}

fn api_post(id: &str, width: u32, height: u32, tags: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<posts limit="100" offset="0" count="1">
  <post id="{id}" width="{width}" height="{height}" tags=" {tags} " rating="s"
        change="{change}" source="" has_notes="true"/>
</posts>"#,
        change = GELBOORU_LUPDATED,
    )
}

fn edit_page() -> String {
    format!(
        r#"<!DOCTYPE html>
<html><body>
  <img id="image" src="/images/2.jpg" width="400" height="300" alt="">
  <form method="post" action="public/edit_post.php" id="edit_form">
    <input type="radio" name="rating" value="e"> Explicit
    <input type="radio" name="rating" value="q" checked> Questionable
    <input type="radio" name="rating" value="s"> Safe
    <input type="text" name="title" value="">
    <input type="text" name="source" value="https://pixiv.example/2">
    <textarea id="tags" name="tags">1girl translation_request solo</textarea>
    <input type="hidden" name="id" value="2">
    <input type="hidden" name="lupdated" value="{lupdated}">
    <input type="hidden" name="csrf-token" value="{csrf}">
    <input type="hidden" name="uname" value="alice">
    <input type="hidden" name="userid" value="{user_id}">
    <input type="submit" name="submit" value="Save changes">
  </form>
</body></html>"#,
        lupdated = GELBOORU_LUPDATED,
        csrf = GELBOORU_CSRF,
        user_id = GELBOORU_USER_ID,
    )
}
