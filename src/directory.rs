use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::users::filter::VisibilityFilter;
use crate::users::repo_types::{FriendRequest, NewUser, SearchVisibility, User, UserSummary};

/// An insert hit a uniqueness constraint, usually a lost race with a
/// concurrent request. Carried inside `anyhow::Error`.
#[derive(Debug, Error)]
#[error("{0} already exists")]
pub struct Duplicate(pub &'static str);

/// Persistence for users, their privacy settings and the friendship graph.
///
/// `friends_of` returns the whole set in one round trip and the search
/// methods evaluate the visibility filter inside a single query.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Inserts the user together with default privacy settings. A taken
    /// email or username fails with `Duplicate`.
    async fn create_user(&self, new: &NewUser) -> anyhow::Result<User>;
    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// Case-insensitive lookup.
    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;

    /// `None` when the user has no settings row.
    async fn search_visibility(&self, user_id: Uuid) -> anyhow::Result<Option<SearchVisibility>>;
    async fn set_search_visibility(
        &self,
        user_id: Uuid,
        visibility: SearchVisibility,
    ) -> anyhow::Result<()>;

    /// Ids recorded as friends of `user_id` (outgoing edges).
    async fn friends_of(&self, user_id: Uuid) -> anyhow::Result<HashSet<Uuid>>;
    /// Active friends of `user_id` ordered by username.
    async fn list_friends(&self, user_id: Uuid) -> anyhow::Result<Vec<UserSummary>>;
    /// Drops both directions; `false` when there was no edge.
    async fn remove_friendship(&self, a: Uuid, b: Uuid) -> anyhow::Result<bool>;

    /// Fails with `Duplicate` when the same sender already asked.
    async fn create_friend_request(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> anyhow::Result<FriendRequest>;
    async fn find_friend_request(&self, id: Uuid) -> anyhow::Result<Option<FriendRequest>>;
    async fn find_friend_request_between(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> anyhow::Result<Option<FriendRequest>>;
    /// Requests received by `receiver_id`, oldest first.
    async fn pending_friend_requests(&self, receiver_id: Uuid)
        -> anyhow::Result<Vec<FriendRequest>>;
    /// Records both friendship edges and removes the request in one unit.
    async fn accept_friend_request(&self, request: &FriendRequest) -> anyhow::Result<()>;
    async fn delete_friend_request(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Number of active users matching `text` that pass `filter`.
    async fn count_matches(&self, text: &str, filter: &VisibilityFilter) -> anyhow::Result<u64>;
    /// One page of matches ordered by lowercased username, then username, then id.
    async fn fetch_matches(
        &self,
        text: &str,
        filter: &VisibilityFilter,
        limit: u32,
        offset: u64,
    ) -> anyhow::Result<Vec<UserSummary>>;
}
