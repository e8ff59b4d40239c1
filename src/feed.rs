//! Feed synchronization: posts, likes, and comments.
//!
//! The local cache is replaced wholesale on each fetch (snapshot
//! semantics, no incremental merge). Like toggling is optimistic: the
//! local flip happens before the network call and is rolled back if the
//! call fails.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::warn;

use crate::api_client::ApiClient;
use crate::error::ApiError;
use crate::models::{Comment, NewComment, NewLike, NewPost, Post, PostLike};

/// Owns the in-memory post and comment caches and reconciles them against
/// the backend.
pub struct FeedSynchronizer {
    api: ApiClient,
    state: Mutex<FeedState>,
}

#[derive(Default)]
struct FeedState {
    posts: Vec<Post>,
    comments: HashMap<i64, Vec<Comment>>,
}

enum Flip {
    Added,
    Removed(PostLike),
}

impl FeedSynchronizer {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Mutex::new(FeedState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FeedState> {
        self.state.lock().expect("feed lock poisoned")
    }

    // --- Posts ---

    /// Fetch the full post list and replace the local cache.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let posts: Vec<Post> = self.api.get_json("/posts").await?;
        self.lock().posts = posts;
        Ok(())
    }

    /// Current cached posts, newest first.
    ///
    /// The backend returns oldest-first array order; display reverses it.
    pub fn posts(&self) -> Vec<Post> {
        self.lock().posts.iter().rev().cloned().collect()
    }

    /// Fetch one user's posts, newest first. Does not touch the shared
    /// feed cache; profile views own this list.
    pub async fn user_posts(&self, user_id: i64) -> Result<Vec<Post>, ApiError> {
        let mut posts: Vec<Post> = self.api.get_json(&format!("/posts?userId={user_id}")).await?;
        posts.reverse();
        Ok(posts)
    }

    /// Create a post (multipart upload), then refresh the feed.
    pub async fn create_post(&self, new_post: NewPost) -> Result<(), ApiError> {
        if new_post.title.trim().is_empty()
            || new_post.text.trim().is_empty()
            || new_post.filter.trim().is_empty()
        {
            return Err(ApiError::Validation("title, text and tag are required".into()));
        }
        let user_id = self
            .api
            .session()
            .user_id()
            .ok_or_else(|| ApiError::Validation("not logged in".into()))?;

        let mut form = reqwest::multipart::Form::new()
            .text("userId", user_id.to_string())
            .text("title", new_post.title)
            .text("text", new_post.text)
            .text("filter", new_post.filter);
        for (index, image) in new_post.images.into_iter().enumerate() {
            form = form.part("imageFile", ApiClient::jpeg_part(index, image)?);
        }

        self.api.post_multipart("/posts", form).await?;
        self.refresh().await
    }

    /// Delete a post, then drop it from the local cache.
    pub async fn delete_post(&self, post_id: i64) -> Result<(), ApiError> {
        self.api.delete(&format!("/posts/{post_id}")).await?;
        let mut state = self.lock();
        state.posts.retain(|p| p.id != post_id);
        state.comments.remove(&post_id);
        Ok(())
    }

    // --- Likes ---

    /// Whether the current user has liked the cached post.
    pub fn is_liked(&self, post_id: i64) -> bool {
        let Some(user_id) = self.api.session().user_id() else {
            return false;
        };
        self.lock()
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .map(|p| find_like(&p.post_likes, user_id).is_some())
            .unwrap_or(false)
    }

    /// Toggle the current user's like on a post.
    ///
    /// The local like set is flipped optimistically before the create or
    /// delete call; if the call fails, the flip is rolled back and the
    /// error returned, so membership stays consistent under retry.
    /// Returns whether the post is liked after the toggle.
    pub async fn toggle_like(&self, post_id: i64) -> Result<bool, ApiError> {
        let user_id = self
            .api
            .session()
            .user_id()
            .ok_or_else(|| ApiError::Validation("not logged in".into()))?;

        let flip = {
            let mut state = self.lock();
            let post = state
                .posts
                .iter_mut()
                .find(|p| p.id == post_id)
                .ok_or_else(|| ApiError::Validation(format!("unknown post {post_id}")))?;
            match find_like(&post.post_likes, user_id) {
                Some(index) => Flip::Removed(post.post_likes.remove(index)),
                None => {
                    // Placeholder id until the backend assigns one
                    post.post_likes.push(PostLike { id: 0, user_id, post_id });
                    Flip::Added
                }
            }
        };

        match flip {
            Flip::Added => {
                let body = NewLike { post_id, user_id };
                match self.api.post_json::<_, PostLike>("/likes", &body).await {
                    Ok(created) => {
                        let mut state = self.lock();
                        if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
                            if let Some(index) = find_like(&post.post_likes, user_id) {
                                post.post_likes[index].id = created.id;
                            }
                        }
                        Ok(true)
                    }
                    Err(e) => {
                        warn!(post_id, error = %e, "like create failed, rolling back");
                        let mut state = self.lock();
                        if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
                            if let Some(index) = find_like(&post.post_likes, user_id) {
                                post.post_likes.remove(index);
                            }
                        }
                        Err(e)
                    }
                }
            }
            Flip::Removed(like) => match self.api.delete(&format!("/likes/{}", like.id)).await {
                Ok(()) => Ok(false),
                Err(e) => {
                    warn!(post_id, error = %e, "like delete failed, rolling back");
                    let mut state = self.lock();
                    if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
                        post.post_likes.push(like);
                    }
                    Err(e)
                }
            },
        }
    }

    // --- Comments ---

    /// Cached comments for a post, oldest first.
    pub fn comments(&self, post_id: i64) -> Vec<Comment> {
        self.lock().comments.get(&post_id).cloned().unwrap_or_default()
    }

    /// Create a comment and append it to the local cache for that post.
    ///
    /// The append does not merge with a concurrent full refresh; last
    /// write wins, as with the rest of the snapshot caches.
    pub async fn create_comment(&self, post_id: i64, text: &str) -> Result<Comment, ApiError> {
        if text.trim().is_empty() {
            return Err(ApiError::Validation("comment text is required".into()));
        }
        let session = self
            .api
            .session()
            .snapshot()
            .ok_or_else(|| ApiError::Validation("not logged in".into()))?;

        let body = NewComment {
            user_id: session.user_id,
            text: text.to_string(),
            user_name: session.user_name,
            post_id,
        };
        let comment: Comment = self.api.post_json("/comments", &body).await?;
        self.lock()
            .comments
            .entry(post_id)
            .or_default()
            .push(comment.clone());
        Ok(comment)
    }

    /// Fetch all comments for a post and replace that post's comment cache.
    pub async fn fetch_comments(&self, post_id: i64) -> Result<Vec<Comment>, ApiError> {
        let comments: Vec<Comment> = self
            .api
            .get_json(&format!("/comments?postId={post_id}"))
            .await?;
        self.lock().comments.insert(post_id, comments.clone());
        Ok(comments)
    }
}

fn find_like(likes: &[PostLike], user_id: i64) -> Option<usize> {
    likes.iter().position(|l| l.user_id == user_id)
}

#[cfg(test)]
impl FeedSynchronizer {
    fn seed_posts(&self, posts: Vec<Post>) {
        self.lock().posts = posts;
    }
}
