//! Data models shared across the client core.
//!
//! Field names follow the backend's camelCase JSON (`userId`, `postLikes`,
//! `imageData`, ...). Post image bytes travel as base64 strings inside the
//! JSON body, matching the backend's encoding.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Session ---

/// An authenticated session as returned by `/auth/login`.
///
/// Owned by [`crate::session::SessionStore`]; read by every API call and
/// mutated only by login/logout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: i64,
    pub user_name: String,
    pub access_token: String,
    pub refresh_token: String,
}

// --- Chat ---

/// A chat participant. The stream protocol only carries the display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    pub name: String,
}

/// A chat message, scoped to exactly one room.
///
/// The id is generated client-side on receipt; the backend does not assign
/// message ids. Messages are immutable once created and displayed
/// newest-first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub user: ChatUser,
    pub text: String,
    pub room: String,
}

// --- Feed ---

/// A feed post with its like list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub title: String,
    pub text: String,
    pub filter: String,
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    pub image_data: Option<Vec<u8>>,
    pub post_likes: Vec<PostLike>,
}

/// A like on a post. At most one per (user, post) pair is meaningful;
/// the backend is not known to enforce this, so the client treats it as
/// best effort.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PostLike {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
}

/// A comment on a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    pub user_name: String,
}

// --- Auth request/response types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub user_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: i64,
}

// --- Feed request types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLike {
    pub post_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub user_id: i64,
    pub text: String,
    pub user_name: String,
    pub post_id: i64,
}

/// Fields for a new post. Images are raw JPEG bytes; they are sent as
/// `imageFile` multipart parts, not JSON.
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub title: String,
    pub text: String,
    pub filter: String,
    pub images: Vec<Vec<u8>>,
}

// --- Profile ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: String,
    pub surname: String,
    pub user_name: String,
    pub email: String,
}

/// A profile photo as served by `GET /photos` (base64 JSON, not multipart).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePhoto {
    pub id: i64,
    #[serde(with = "base64_string")]
    pub image: Vec<u8>,
}

// --- base64 serde helpers ---

pub(crate) mod base64_string {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        BASE64.decode(s).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, ser: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => ser.serialize_str(&BASE64.encode(b)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Vec<u8>>, D::Error> {
        let s = Option::<String>::deserialize(de)?;
        match s {
            Some(s) => BASE64.decode(s).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
