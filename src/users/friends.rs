use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::directory::Directory;

/// Per-request memo of friend sets, keyed by user id.
///
/// Create one per request and pass it down; it is never shared between requests.
#[derive(Debug, Default)]
pub struct FriendCache {
    sets: HashMap<Uuid, Arc<HashSet<Uuid>>>,
}

impl FriendCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Friend ids of `user`, empty for anonymous. Each user is looked up at most once.
    pub async fn friends_of(
        &mut self,
        dir: &dyn Directory,
        user: Option<Uuid>,
    ) -> anyhow::Result<Arc<HashSet<Uuid>>> {
        let Some(user) = user else {
            return Ok(Arc::new(HashSet::new()));
        };
        if let Some(set) = self.sets.get(&user) {
            return Ok(Arc::clone(set));
        }
        let set = Arc::new(dir.friends_of(user).await?);
        debug!(user_id = %user, friends = set.len(), "friend set loaded");
        self.sets.insert(user, Arc::clone(&set));
        Ok(set)
    }
}

/// `true` iff both users exist, differ, and share at least one direct friend.
pub async fn have_mutual_connection(
    dir: &dyn Directory,
    cache: &mut FriendCache,
    a: Option<Uuid>,
    b: Option<Uuid>,
) -> anyhow::Result<bool> {
    let (Some(a), Some(b)) = (a, b) else {
        return Ok(false);
    };
    if a == b {
        return Ok(false);
    }
    let fa = cache.friends_of(dir, Some(a)).await?;
    let fb = cache.friends_of(dir, Some(b)).await?;
    Ok(!fa.is_disjoint(&fb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::memory::MemoryDirectory;

    #[tokio::test]
    async fn anonymous_has_no_friends() {
        let dir = MemoryDirectory::new();
        let mut cache = FriendCache::new();
        assert!(cache.friends_of(&dir, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn user_without_edges_has_no_friends() {
        let dir = MemoryDirectory::new();
        let loner = dir.insert_user("loner", "Lone", "Wolf");
        let mut cache = FriendCache::new();
        assert!(cache.friends_of(&dir, Some(loner)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn friend_set_is_memoized_per_request() {
        let dir = MemoryDirectory::new();
        let a = dir.insert_user("alice", "Alice", "A");
        let b = dir.insert_user("bob", "Bob", "B");
        dir.befriend(a, b);

        let mut cache = FriendCache::new();
        let first = cache.friends_of(&dir, Some(a)).await.unwrap();
        // a later edge is not observed through the same cache
        let c = dir.insert_user("carol", "Carol", "C");
        dir.befriend(a, c);
        let second = cache.friends_of(&dir, Some(a)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.len(), 1);

        let fresh = FriendCache::new().friends_of(&dir, Some(a)).await.unwrap();
        assert_eq!(fresh.len(), 2);
    }

    #[tokio::test]
    async fn mutual_connection_is_symmetric_and_irreflexive() {
        let dir = MemoryDirectory::new();
        let r = dir.insert_user("requester", "R", "R");
        let m = dir.insert_user("middle", "M", "M");
        let c = dir.insert_user("candidate", "C", "C");
        let x = dir.insert_user("stranger", "X", "X");
        dir.befriend(r, m);
        dir.befriend(m, c);

        let mut cache = FriendCache::new();
        for (a, b) in [(r, c), (r, x), (m, c), (r, m), (c, x)] {
            let ab = have_mutual_connection(&dir, &mut cache, Some(a), Some(b)).await.unwrap();
            let ba = have_mutual_connection(&dir, &mut cache, Some(b), Some(a)).await.unwrap();
            assert_eq!(ab, ba);
        }
        assert!(have_mutual_connection(&dir, &mut cache, Some(r), Some(c)).await.unwrap());
        assert!(!have_mutual_connection(&dir, &mut cache, Some(r), Some(x)).await.unwrap());
        // direct friends with nobody in common
        assert!(!have_mutual_connection(&dir, &mut cache, Some(r), Some(m)).await.unwrap());
        for u in [r, m, c, x] {
            assert!(!have_mutual_connection(&dir, &mut cache, Some(u), Some(u)).await.unwrap());
        }
        assert!(!have_mutual_connection(&dir, &mut cache, None, Some(c)).await.unwrap());
        assert!(!have_mutual_connection(&dir, &mut cache, Some(r), None).await.unwrap());
    }
}
