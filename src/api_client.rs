//! HTTP API client for the sharecircle backend.

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::models::{
    LoginRequest, LoginResponse, ProfilePhoto, RegisterRequest, Session, UpdateUserRequest,
};
use crate::session::SessionStore;

/// HTTP client for one-shot API requests.
///
/// Cheap to clone; all clones share the same connection pool and session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionStore,
}

impl ApiClient {
    /// Create a client for the configured backend.
    pub fn new(config: &ClientConfig, session: SessionStore) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let path = path.trim_start_matches('/');
        format!("{}/{path}", self.base_url)
    }

    /// Attach the bearer token when a session exists.
    fn authorize(&self, rb: RequestBuilder) -> RequestBuilder {
        match self.session.access_token() {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn read_body(resp: reqwest::Response) -> Result<String, ApiError> {
        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::from_status(status, text));
        }
        Ok(text)
    }

    fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
        // Some endpoints answer 200 with an empty body
        let text = if text.is_empty() { "null" } else { text };
        serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Make a GET request and decode the JSON response.
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let rb = self.authorize(self.client.get(&url));
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        let text = Self::read_body(resp).await?;
        Self::decode(&text)
    }

    /// Make a POST request with a JSON body and decode the JSON response.
    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let url = self.url(path);
        debug!(%url, "POST");
        let rb = self.authorize(self.client.post(&url)).json(body);
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        let text = Self::read_body(resp).await?;
        Self::decode(&text)
    }

    /// Make a PUT request with a JSON body, ignoring the response body.
    pub async fn put_json<TReq: Serialize>(&self, path: &str, body: &TReq) -> Result<(), ApiError> {
        let url = self.url(path);
        debug!(%url, "PUT");
        let rb = self.authorize(self.client.put(&url)).json(body);
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        Self::read_body(resp).await?;
        Ok(())
    }

    /// Make a DELETE request, ignoring the response body.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        debug!(%url, "DELETE");
        let rb = self.authorize(self.client.delete(&url));
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        Self::read_body(resp).await?;
        Ok(())
    }

    /// Make a multipart POST request, ignoring the response body.
    pub async fn post_multipart(&self, path: &str, form: Form) -> Result<(), ApiError> {
        let url = self.url(path);
        debug!(%url, "POST multipart");
        let rb = self.authorize(self.client.post(&url)).multipart(form);
        let resp = rb.send().await.map_err(|e| ApiError::Network(e.to_string()))?;
        Self::read_body(resp).await?;
        Ok(())
    }

    /// Build a JPEG file part for an `imageFile` multipart field.
    pub(crate) fn jpeg_part(index: usize, bytes: Vec<u8>) -> Result<Part, ApiError> {
        Part::bytes(bytes)
            .file_name(format!("image{index}.jpeg"))
            .mime_str("image/jpeg")
            .map_err(|e| ApiError::Validation(e.to_string()))
    }

    // --- Auth ---

    /// Login and populate the session store.
    pub async fn login(&self, user_name: &str, password: &str) -> Result<Session, ApiError> {
        if user_name.trim().is_empty() || password.is_empty() {
            return Err(ApiError::Validation("user name and password are required".into()));
        }
        let req = LoginRequest {
            user_name: user_name.to_string(),
            password: password.to_string(),
        };
        let resp: LoginResponse = self.post_json("/auth/login", &req).await?;
        let session = Session {
            user_id: resp.user_id,
            user_name: user_name.to_string(),
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
        };
        self.session.set(session.clone());
        Ok(session)
    }

    /// Create an account and populate the session store with the returned
    /// tokens (same response shape as login).
    pub async fn register(&self, req: &RegisterRequest) -> Result<Session, ApiError> {
        if req.user_name.trim().is_empty() || req.password.is_empty() {
            return Err(ApiError::Validation("user name and password are required".into()));
        }
        let resp: LoginResponse = self.post_json("/auth/register", req).await?;
        let session = Session {
            user_id: resp.user_id,
            user_name: req.user_name.clone(),
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
        };
        self.session.set(session.clone());
        Ok(session)
    }

    /// Logout: clear the session and everything persisted with it.
    pub fn logout(&self) {
        self.session.clear();
    }

    // --- Profile ---

    /// Update the current user's profile fields, and keep the locally
    /// stored display name in sync.
    pub async fn update_user(&self, update: &UpdateUserRequest) -> Result<(), ApiError> {
        let user_id = self
            .session
            .user_id()
            .ok_or_else(|| ApiError::Validation("not logged in".into()))?;
        self.put_json(&format!("/users/{user_id}"), update).await?;
        self.session.update_user_name(&update.user_name);
        Ok(())
    }

    /// Fetch the current user's profile photo (base64 JSON).
    pub async fn fetch_profile_photo(&self) -> Result<ProfilePhoto, ApiError> {
        let user_id = self
            .session
            .user_id()
            .ok_or_else(|| ApiError::Validation("not logged in".into()))?;
        self.get_json(&format!("/photos?userId={user_id}")).await
    }

    /// Upload a profile photo as JPEG bytes (multipart).
    pub async fn upload_profile_photo(&self, jpeg: Vec<u8>) -> Result<(), ApiError> {
        let user_id = self
            .session
            .user_id()
            .ok_or_else(|| ApiError::Validation("not logged in".into()))?;
        if jpeg.is_empty() {
            return Err(ApiError::Validation("photo is empty".into()));
        }
        let form = Form::new()
            .text("userId", user_id.to_string())
            .part(
                "imageFile",
                Part::bytes(jpeg)
                    .file_name("photo.jpg")
                    .mime_str("image/jpeg")
                    .map_err(|e| ApiError::Validation(e.to_string()))?,
            );
        self.post_multipart("/photos", form).await
    }
}
