//! Shared test fixtures: an in-process stub backend (HTTP) and a stub
//! chat stream server (WebSocket), both bound to ephemeral ports.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use sharecircle_client::models::{
    ChatUser, Comment, LoginRequest, LoginResponse, NewComment, NewLike, Post, PostLike,
    ProfilePhoto,
};
use sharecircle_client::protocol::{ClientCommand, ServerEvent, WireMessage};

pub const TEST_TOKEN: &str = "test-token";
pub const TEST_USER_ID: i64 = 7;

// --- HTTP stub backend ---

#[derive(Default)]
pub struct Backend {
    pub posts: Mutex<Vec<Post>>,
    pub comments: Mutex<HashMap<i64, Vec<Comment>>>,
    pub photo: Mutex<Option<Vec<u8>>>,
    /// When set, like create/delete answer 500.
    pub fail_likes: AtomicBool,
    next_id: AtomicI64,
}

impl Backend {
    pub fn alloc_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Seed a post directly into the backend, returning its id.
    pub fn seed_post(&self, user_id: i64, title: &str, text: &str, filter: &str) -> i64 {
        let id = self.alloc_id();
        self.posts.lock().unwrap().push(Post {
            id,
            user_id,
            user_name: format!("user{user_id}"),
            title: title.to_string(),
            text: text.to_string(),
            filter: filter.to_string(),
            image_data: None,
            post_likes: vec![],
        });
        id
    }
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {TEST_TOKEN}"))
        .unwrap_or(false)
}

async fn login(Json(req): Json<LoginRequest>) -> Result<Json<LoginResponse>, StatusCode> {
    if req.user_name.is_empty() || req.password.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password != "secret" {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(LoginResponse {
        access_token: TEST_TOKEN.to_string(),
        refresh_token: "refresh".to_string(),
        user_id: TEST_USER_ID,
    }))
}

async fn register(
    Json(_req): Json<serde_json::Value>,
) -> Json<LoginResponse> {
    Json(LoginResponse {
        access_token: TEST_TOKEN.to_string(),
        refresh_token: "refresh".to_string(),
        user_id: TEST_USER_ID + 1,
    })
}

async fn list_posts(
    State(backend): State<Arc<Backend>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<Post>> {
    let posts = backend.posts.lock().unwrap();
    let filtered = match params.get("userId").and_then(|v| v.parse::<i64>().ok()) {
        Some(user_id) => posts.iter().filter(|p| p.user_id == user_id).cloned().collect(),
        None => posts.clone(),
    };
    Json(filtered)
}

async fn create_post(
    State(backend): State<Arc<Backend>>,
    mut multipart: Multipart,
) -> Result<StatusCode, StatusCode> {
    let mut user_id = None;
    let mut title = String::new();
    let mut text = String::new();
    let mut filter = String::new();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "userId" => {
                let value = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                user_id = value.parse::<i64>().ok();
            }
            "title" => title = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?,
            "text" => text = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?,
            "filter" => filter = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?,
            "imageFile" => {
                let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                image = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let user_id = user_id.ok_or(StatusCode::BAD_REQUEST)?;
    let id = backend.alloc_id();
    backend.posts.lock().unwrap().push(Post {
        id,
        user_id,
        user_name: format!("user{user_id}"),
        title,
        text,
        filter,
        image_data: image,
        post_likes: vec![],
    });
    Ok(StatusCode::OK)
}

async fn delete_post(
    State(backend): State<Arc<Backend>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> StatusCode {
    if !bearer_ok(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    backend.posts.lock().unwrap().retain(|p| p.id != id);
    StatusCode::OK
}

async fn create_like(
    State(backend): State<Arc<Backend>>,
    Json(req): Json<NewLike>,
) -> Result<Json<PostLike>, StatusCode> {
    if backend.fail_likes.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let like = PostLike {
        id: backend.alloc_id(),
        user_id: req.user_id,
        post_id: req.post_id,
    };
    let mut posts = backend.posts.lock().unwrap();
    let post = posts
        .iter_mut()
        .find(|p| p.id == req.post_id)
        .ok_or(StatusCode::NOT_FOUND)?;
    post.post_likes.push(like.clone());
    Ok(Json(like))
}

async fn delete_like(
    State(backend): State<Arc<Backend>>,
    Path(id): Path<i64>,
) -> StatusCode {
    if backend.fail_likes.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    for post in backend.posts.lock().unwrap().iter_mut() {
        post.post_likes.retain(|l| l.id != id);
    }
    StatusCode::OK
}

async fn list_comments(
    State(backend): State<Arc<Backend>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<Comment>> {
    let post_id = params
        .get("postId")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or_default();
    let comments = backend.comments.lock().unwrap();
    Json(comments.get(&post_id).cloned().unwrap_or_default())
}

async fn create_comment(
    State(backend): State<Arc<Backend>>,
    Json(req): Json<NewComment>,
) -> Json<Comment> {
    let comment = Comment {
        id: backend.alloc_id(),
        user_id: req.user_id,
        text: req.text,
        user_name: req.user_name,
    };
    backend
        .comments
        .lock()
        .unwrap()
        .entry(req.post_id)
        .or_default()
        .push(comment.clone());
    Json(comment)
}

async fn update_user(
    Path(_id): Path<i64>,
    headers: HeaderMap,
) -> StatusCode {
    if !bearer_ok(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    StatusCode::OK
}

async fn get_photo(
    State(backend): State<Arc<Backend>>,
) -> Result<Json<ProfilePhoto>, StatusCode> {
    let photo = backend.photo.lock().unwrap();
    match photo.as_ref() {
        Some(bytes) => Ok(Json(ProfilePhoto { id: 1, image: bytes.clone() })),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn upload_photo(
    State(backend): State<Arc<Backend>>,
    mut multipart: Multipart,
) -> Result<StatusCode, StatusCode> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "imageFile" {
            let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            *backend.photo.lock().unwrap() = Some(bytes.to_vec());
        }
    }
    Ok(StatusCode::OK)
}

/// Spawn the stub backend on an ephemeral port.
pub async fn spawn_backend() -> (SocketAddr, Arc<Backend>) {
    sharecircle_client::logging::init();
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", delete(delete_post))
        .route("/likes", post(create_like))
        .route("/likes/{id}", delete(delete_like))
        .route("/comments", get(list_comments).post(create_comment))
        .route("/users/{id}", put(update_user))
        .route("/photos", get(get_photo).post(upload_photo))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, backend)
}

// --- WebSocket stub chat server ---

/// Spawn a stub chat stream server that understands `username`,
/// `joinRoom`, and `send`, answering each `joinRoom` with a full
/// `messages` snapshot. All connections share one message list.
pub async fn spawn_chat_server() -> SocketAddr {
    spawn_chat_server_dropping(0).await
}

/// Like [`spawn_chat_server`], but the first `drop_first` connections are
/// closed right after the handshake to exercise reconnect paths.
pub async fn spawn_chat_server_dropping(drop_first: usize) -> SocketAddr {
    sharecircle_client::logging::init();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let messages: Arc<Mutex<Vec<WireMessage>>> = Arc::default();
    tokio::spawn(async move {
        let mut accepted = 0usize;
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let drop_this = accepted < drop_first;
            accepted += 1;
            if drop_this {
                tokio::spawn(async move {
                    if let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await {
                        let _ = ws.close(None).await;
                    }
                });
            } else {
                tokio::spawn(handle_chat_conn(stream, messages.clone()));
            }
        }
    });
    addr
}

async fn handle_chat_conn(stream: TcpStream, messages: Arc<Mutex<Vec<WireMessage>>>) {
    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let mut username = String::from("anonymous");
    while let Some(Ok(frame)) = ws.next().await {
        let text = match frame {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };
        let Ok(cmd) = serde_json::from_str::<ClientCommand>(text.as_str()) else {
            continue;
        };
        match cmd {
            ClientCommand::Username(name) => username = name,
            ClientCommand::JoinRoom(_) => {
                let snapshot = ServerEvent::Messages(messages.lock().unwrap().clone());
                let json = serde_json::to_string(&snapshot).unwrap();
                if ws.send(WsMessage::Text(json.into())).await.is_err() {
                    return;
                }
            }
            ClientCommand::Send { message, room } => {
                messages.lock().unwrap().push(WireMessage {
                    room,
                    text: message,
                    user: ChatUser { name: username.clone() },
                });
            }
        }
    }
}
