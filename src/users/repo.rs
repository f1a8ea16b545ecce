use std::collections::HashSet;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::directory::{Directory, Duplicate};
use crate::users::filter::{VisibilityClause, VisibilityFilter};
use crate::users::repo_types::{FriendRequest, NewUser, SearchVisibility, User, UserSummary};

/// Policy column with the missing-row default applied.
const POLICY: &str = "COALESCE(p.search_visibility, 'friends_only')";

/// Postgres-backed `Directory`.
#[derive(Clone)]
pub struct PgDirectory {
    db: PgPool,
}

impl PgDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Unique violations become `Duplicate(what)`; anything else keeps `context`.
fn insert_error(err: sqlx::Error, what: &'static str, context: &'static str) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Duplicate(what).into(),
        _ => anyhow::Error::new(err).context(context),
    }
}

/// `%text%` with LIKE metacharacters escaped, so the query matches literally.
pub(crate) fn contains_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

/// Requester is a direct friend of the candidate row `u`.
fn push_direct_friend(qb: &mut QueryBuilder<'_, Postgres>, requester: Uuid) {
    qb.push("EXISTS (SELECT 1 FROM friendships fd WHERE fd.user_id = u.id AND fd.friend_id = ");
    qb.push_bind(requester);
    qb.push(")");
}

/// Requester and candidate row `u` share a friend; one self-join, no per-row lookups.
fn push_mutual_friend(qb: &mut QueryBuilder<'_, Postgres>, requester: Uuid) {
    qb.push(
        "EXISTS (SELECT 1 FROM friendships fr \
         JOIN friendships fc ON fc.friend_id = fr.friend_id \
         WHERE fc.user_id = u.id AND fr.user_id = ",
    );
    qb.push_bind(requester);
    qb.push(")");
}

/// Compiles `filter` into an `AND (...)` fragment over `users u LEFT JOIN privacy_settings p`.
pub(crate) fn push_visibility(qb: &mut QueryBuilder<'_, Postgres>, filter: &VisibilityFilter) {
    let clauses = match filter {
        VisibilityFilter::Unrestricted => return,
        VisibilityFilter::AnyOf(clauses) => clauses,
    };
    qb.push(" AND (");
    if clauses.is_empty() {
        qb.push("FALSE");
    }
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        match *clause {
            VisibilityClause::SelfMatch(id) => {
                qb.push("u.id = ");
                qb.push_bind(id);
            }
            VisibilityClause::Everyone => {
                qb.push(POLICY).push(" = 'everyone'");
            }
            VisibilityClause::FriendsOnly { requester } => {
                qb.push("(").push(POLICY).push(" = 'friends_only' AND ");
                push_direct_friend(qb, requester);
                qb.push(")");
            }
            VisibilityClause::FriendsOfFriends { requester } => {
                qb.push("(").push(POLICY).push(" = 'friends_of_friends' AND (");
                push_direct_friend(qb, requester);
                qb.push(" OR ");
                push_mutual_friend(qb, requester);
                qb.push("))");
            }
        }
    }
    qb.push(")");
}

/// Shared `FROM ... WHERE ...` of both search queries.
fn push_search_from<'a>(
    qb: &mut QueryBuilder<'a, Postgres>,
    text: &str,
    filter: &VisibilityFilter,
) {
    let pattern = contains_pattern(text);
    qb.push(
        " FROM users u LEFT JOIN privacy_settings p ON p.user_id = u.id \
         WHERE u.is_active AND (u.username ILIKE ",
    );
    qb.push_bind(pattern.clone());
    qb.push(" OR u.first_name ILIKE ");
    qb.push_bind(pattern.clone());
    qb.push(" OR u.last_name ILIKE ");
    qb.push_bind(pattern);
    qb.push(")");
    push_visibility(qb, filter);
}

#[async_trait]
impl Directory for PgDirectory {
    async fn create_user(&self, new: &NewUser) -> anyhow::Result<User> {
        let mut tx = self.db.begin().await.context("begin create user")?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, password_hash, first_name, last_name,
                      is_active, is_staff, created_at
            "#,
        )
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| insert_error(e, "User", "insert user"))?;

        sqlx::query(
            r#"
            INSERT INTO privacy_settings (user_id, search_visibility)
            VALUES ($1, $2)
            "#,
        )
        .bind(user.id)
        .bind(SearchVisibility::default().as_str())
        .execute(&mut *tx)
        .await
        .context("insert privacy settings")?;

        tx.commit().await.context("commit create user")?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, first_name, last_name,
                   is_active, is_staff, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, first_name, last_name,
                   is_active, is_staff, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, first_name, last_name,
                   is_active, is_staff, created_at
            FROM users
            WHERE lower(username) = lower($1)
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn search_visibility(&self, user_id: Uuid) -> anyhow::Result<Option<SearchVisibility>> {
        let raw = sqlx::query_scalar::<_, String>(
            "SELECT search_visibility FROM privacy_settings WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("load search visibility")?;
        Ok(raw.as_deref().map(SearchVisibility::parse_or_default))
    }

    async fn set_search_visibility(
        &self,
        user_id: Uuid,
        visibility: SearchVisibility,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO privacy_settings (user_id, search_visibility)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET search_visibility = EXCLUDED.search_visibility, updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(visibility.as_str())
        .execute(&self.db)
        .await
        .context("upsert privacy settings")?;
        Ok(())
    }

    async fn friends_of(&self, user_id: Uuid) -> anyhow::Result<HashSet<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT friend_id FROM friendships WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("load friend ids")?;
        Ok(ids.into_iter().collect())
    }

    async fn list_friends(&self, user_id: Uuid) -> anyhow::Result<Vec<UserSummary>> {
        let rows = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.username, u.first_name, u.last_name
            FROM friendships f
            JOIN users u ON u.id = f.friend_id
            WHERE f.user_id = $1 AND u.is_active
            ORDER BY u.username ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list friends")?;
        Ok(rows)
    }

    async fn remove_friendship(&self, a: Uuid, b: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            DELETE FROM friendships
            WHERE (user_id = $1 AND friend_id = $2)
               OR (user_id = $2 AND friend_id = $1)
            "#,
        )
        .bind(a)
        .bind(b)
        .execute(&self.db)
        .await
        .context("delete friendship")?;
        Ok(res.rows_affected() > 0)
    }

    async fn create_friend_request(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> anyhow::Result<FriendRequest> {
        let request = sqlx::query_as::<_, FriendRequest>(
            r#"
            INSERT INTO friend_requests (sender_id, receiver_id)
            VALUES ($1, $2)
            RETURNING id, sender_id, receiver_id, created_at
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| insert_error(e, "Friend request", "insert friend request"))?;
        Ok(request)
    }

    async fn find_friend_request(&self, id: Uuid) -> anyhow::Result<Option<FriendRequest>> {
        let request = sqlx::query_as::<_, FriendRequest>(
            "SELECT id, sender_id, receiver_id, created_at FROM friend_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(request)
    }

    async fn find_friend_request_between(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> anyhow::Result<Option<FriendRequest>> {
        let request = sqlx::query_as::<_, FriendRequest>(
            r#"
            SELECT id, sender_id, receiver_id, created_at
            FROM friend_requests
            WHERE sender_id = $1 AND receiver_id = $2
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(request)
    }

    async fn pending_friend_requests(
        &self,
        receiver_id: Uuid,
    ) -> anyhow::Result<Vec<FriendRequest>> {
        let rows = sqlx::query_as::<_, FriendRequest>(
            r#"
            SELECT id, sender_id, receiver_id, created_at
            FROM friend_requests
            WHERE receiver_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(receiver_id)
        .fetch_all(&self.db)
        .await
        .context("list friend requests")?;
        Ok(rows)
    }

    async fn accept_friend_request(&self, request: &FriendRequest) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await.context("begin accept")?;
        sqlx::query(
            r#"
            INSERT INTO friendships (user_id, friend_id)
            VALUES ($1, $2), ($2, $1)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(request.sender_id)
        .bind(request.receiver_id)
        .execute(&mut *tx)
        .await
        .context("insert friendship")?;

        // a crossed request in the other direction is settled too
        sqlx::query(
            r#"
            DELETE FROM friend_requests
            WHERE id = $1 OR (sender_id = $2 AND receiver_id = $3)
            "#,
        )
        .bind(request.id)
        .bind(request.receiver_id)
        .bind(request.sender_id)
        .execute(&mut *tx)
        .await
        .context("delete friend request")?;

        tx.commit().await.context("commit accept")?;
        Ok(())
    }

    async fn delete_friend_request(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM friend_requests WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete friend request")?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_matches(&self, text: &str, filter: &VisibilityFilter) -> anyhow::Result<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        push_search_from(&mut qb, text, filter);
        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.db)
            .await
            .context("count search matches")?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_matches(
        &self,
        text: &str,
        filter: &VisibilityFilter,
        limit: u32,
        offset: u64,
    ) -> anyhow::Result<Vec<UserSummary>> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT u.id, u.username, u.first_name, u.last_name");
        push_search_from(&mut qb, text, filter);
        qb.push(" ORDER BY lower(u.username) ASC, u.username ASC, u.id ASC LIMIT ");
        qb.push_bind(i64::from(limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
        let rows = qb
            .build_query_as::<UserSummary>()
            .fetch_all(&self.db)
            .await
            .context("fetch search matches")?;
        Ok(rows)
    }
}
