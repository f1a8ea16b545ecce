use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::repo_types::FriendRequest;

#[derive(Debug, Deserialize)]
pub struct SendFriendRequest {
    pub receiver_id: Uuid,
}

/// Result of `POST /friends/requests`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendOutcome {
    /// A new pending request was stored.
    Requested { request: FriendRequest },
    /// The receiver had already asked; the two are now friends.
    Accepted { friend_id: Uuid },
}
