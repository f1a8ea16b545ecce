use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::directory::{Directory, Duplicate};
use crate::users::filter::{CandidateFacts, VisibilityFilter};
use crate::users::repo_types::{FriendRequest, NewUser, SearchVisibility, User, UserSummary};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    settings: HashMap<Uuid, SearchVisibility>,
    // directed edges, user -> friends
    edges: HashMap<Uuid, HashSet<Uuid>>,
    requests: Vec<FriendRequest>,
}

/// `Directory` kept in process memory, for tests and `AppState::fake()`.
#[derive(Default)]
pub struct MemoryDirectory {
    inner: RwLock<Inner>,
    search_calls: AtomicUsize,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> anyhow::Result<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| anyhow!("memory directory lock poisoned"))
    }

    fn write(&self) -> anyhow::Result<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| anyhow!("memory directory lock poisoned"))
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.write().expect("memory directory lock");
        f(&mut inner)
    }

    /// Adds an active user with default settings and returns its id.
    pub fn insert_user(&self, username: &str, first_name: &str, last_name: &str) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{}@example.com", username.to_lowercase()),
            password_hash: String::new(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            is_active: true,
            is_staff: false,
            created_at: OffsetDateTime::now_utc(),
        };
        let id = user.id;
        self.with(|inner| {
            inner.settings.insert(id, SearchVisibility::default());
            inner.users.insert(id, user);
        });
        id
    }

    pub fn set_visibility(&self, user: Uuid, visibility: SearchVisibility) {
        self.with(|inner| inner.settings.insert(user, visibility));
    }

    /// Drops the settings row, leaving the user without a policy.
    pub fn clear_settings(&self, user: Uuid) {
        self.with(|inner| inner.settings.remove(&user));
    }

    /// Records a friendship in both directions.
    pub fn befriend(&self, a: Uuid, b: Uuid) {
        self.add_edge(a, b);
        self.add_edge(b, a);
    }

    /// Records a single directed edge.
    pub fn add_edge(&self, from: Uuid, to: Uuid) {
        self.with(|inner| inner.edges.entry(from).or_default().insert(to));
    }

    pub fn deactivate(&self, user: Uuid) {
        self.with(|inner| {
            if let Some(u) = inner.users.get_mut(&user) {
                u.is_active = false;
            }
        });
    }

    pub fn make_staff(&self, user: Uuid) {
        self.with(|inner| {
            if let Some(u) = inner.users.get_mut(&user) {
                u.is_staff = true;
            }
        });
    }

    /// How many times the search methods were hit.
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    fn matches(&self, text: &str, filter: &VisibilityFilter) -> anyhow::Result<Vec<UserSummary>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let inner = self.read()?;
        let needle = text.to_lowercase();
        let empty = HashSet::new();

        let mut rows: Vec<&User> = inner
            .users
            .values()
            .filter(|u| u.is_active)
            .filter(|u| {
                [&u.username, &u.first_name, &u.last_name]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .filter(|u| {
                let requester_friends = requester_of(filter)
                    .and_then(|r| inner.edges.get(&r))
                    .unwrap_or(&empty);
                let facts = CandidateFacts {
                    id: u.id,
                    visibility: inner.settings.get(&u.id).copied().unwrap_or_default(),
                    friends: inner.edges.get(&u.id).unwrap_or(&empty),
                };
                filter.admits(&facts, requester_friends)
            })
            .collect();
        rows.sort_by(|a, b| {
            (a.username.to_lowercase(), &a.username, a.id)
                .cmp(&(b.username.to_lowercase(), &b.username, b.id))
        });
        Ok(rows.into_iter().map(UserSummary::from).collect())
    }
}

fn requester_of(filter: &VisibilityFilter) -> Option<Uuid> {
    use crate::users::filter::VisibilityClause;
    match filter {
        VisibilityFilter::Unrestricted => None,
        VisibilityFilter::AnyOf(clauses) => clauses.iter().find_map(|c| match *c {
            VisibilityClause::SelfMatch(id)
            | VisibilityClause::FriendsOnly { requester: id }
            | VisibilityClause::FriendsOfFriends { requester: id } => Some(id),
            VisibilityClause::Everyone => None,
        }),
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn create_user(&self, new: &NewUser) -> anyhow::Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            username: new.username.clone(),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            is_active: true,
            is_staff: false,
            created_at: OffsetDateTime::now_utc(),
        };
        let mut inner = self.write()?;
        let wanted = new.username.to_lowercase();
        if inner
            .users
            .values()
            .any(|u| u.email == new.email || u.username.to_lowercase() == wanted)
        {
            return Err(Duplicate("User").into());
        }
        inner.settings.insert(user.id, SearchVisibility::default());
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let wanted = username.to_lowercase();
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username.to_lowercase() == wanted)
            .cloned())
    }

    async fn search_visibility(&self, user_id: Uuid) -> anyhow::Result<Option<SearchVisibility>> {
        Ok(self.read()?.settings.get(&user_id).copied())
    }

    async fn set_search_visibility(
        &self,
        user_id: Uuid,
        visibility: SearchVisibility,
    ) -> anyhow::Result<()> {
        self.write()?.settings.insert(user_id, visibility);
        Ok(())
    }

    async fn friends_of(&self, user_id: Uuid) -> anyhow::Result<HashSet<Uuid>> {
        Ok(self.read()?.edges.get(&user_id).cloned().unwrap_or_default())
    }

    async fn list_friends(&self, user_id: Uuid) -> anyhow::Result<Vec<UserSummary>> {
        let inner = self.read()?;
        let mut friends: Vec<&User> = inner
            .edges
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.users.get(id))
            .filter(|u| u.is_active)
            .collect();
        friends.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(friends.into_iter().map(UserSummary::from).collect())
    }

    async fn remove_friendship(&self, a: Uuid, b: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.write()?;
        let ab = inner.edges.get_mut(&a).map(|s| s.remove(&b)).unwrap_or(false);
        let ba = inner.edges.get_mut(&b).map(|s| s.remove(&a)).unwrap_or(false);
        Ok(ab || ba)
    }

    async fn create_friend_request(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> anyhow::Result<FriendRequest> {
        let mut inner = self.write()?;
        if inner
            .requests
            .iter()
            .any(|r| r.sender_id == sender_id && r.receiver_id == receiver_id)
        {
            return Err(Duplicate("Friend request").into());
        }
        let request = FriendRequest {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.requests.push(request.clone());
        Ok(request)
    }

    async fn find_friend_request(&self, id: Uuid) -> anyhow::Result<Option<FriendRequest>> {
        Ok(self.read()?.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn find_friend_request_between(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> anyhow::Result<Option<FriendRequest>> {
        Ok(self
            .read()?
            .requests
            .iter()
            .find(|r| r.sender_id == sender_id && r.receiver_id == receiver_id)
            .cloned())
    }

    async fn pending_friend_requests(
        &self,
        receiver_id: Uuid,
    ) -> anyhow::Result<Vec<FriendRequest>> {
        Ok(self
            .read()?
            .requests
            .iter()
            .filter(|r| r.receiver_id == receiver_id)
            .cloned()
            .collect())
    }

    async fn accept_friend_request(&self, request: &FriendRequest) -> anyhow::Result<()> {
        let mut inner = self.write()?;
        let (a, b) = (request.sender_id, request.receiver_id);
        inner.edges.entry(a).or_default().insert(b);
        inner.edges.entry(b).or_default().insert(a);
        inner.requests.retain(|r| {
            r.id != request.id && !(r.sender_id == b && r.receiver_id == a)
        });
        Ok(())
    }

    async fn delete_friend_request(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.write()?;
        let before = inner.requests.len();
        inner.requests.retain(|r| r.id != id);
        Ok(inner.requests.len() != before)
    }

    async fn count_matches(&self, text: &str, filter: &VisibilityFilter) -> anyhow::Result<u64> {
        Ok(self.matches(text, filter)?.len() as u64)
    }

    async fn fetch_matches(
        &self,
        text: &str,
        filter: &VisibilityFilter,
        limit: u32,
        offset: u64,
    ) -> anyhow::Result<Vec<UserSummary>> {
        Ok(self
            .matches(text, filter)?
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}
