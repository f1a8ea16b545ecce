use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: OffsetDateTime,
}

/// Fields needed to register a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

/// The part of a user other people are allowed to see in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
        }
    }
}

/// Who may discover a user through search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchVisibility {
    Everyone,
    #[default]
    FriendsOnly,
    FriendsOfFriends,
    Nobody,
}

impl SearchVisibility {
    pub const ALL: [SearchVisibility; 4] = [
        SearchVisibility::Everyone,
        SearchVisibility::FriendsOnly,
        SearchVisibility::FriendsOfFriends,
        SearchVisibility::Nobody,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SearchVisibility::Everyone => "everyone",
            SearchVisibility::FriendsOnly => "friends_only",
            SearchVisibility::FriendsOfFriends => "friends_of_friends",
            SearchVisibility::Nobody => "nobody",
        }
    }

    /// Unknown values read back from storage fall back to the default, never to `Everyone`.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw {
            "everyone" => SearchVisibility::Everyone,
            "friends_only" => SearchVisibility::FriendsOnly,
            "friends_of_friends" => SearchVisibility::FriendsOfFriends,
            "nobody" => SearchVisibility::Nobody,
            _ => SearchVisibility::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PrivacySettings {
    pub user_id: Uuid,
    pub search_visibility: SearchVisibility,
}

/// Pending friendship proposal from `sender_id` to `receiver_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FriendRequest {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub created_at: OffsetDateTime,
}
