use uuid::Uuid;

use crate::directory::Directory;
use crate::users::friends::{have_mutual_connection, FriendCache};
use crate::users::repo_types::SearchVisibility;

/// How the requester stands relative to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Myself,
    Friend,
    /// Not a direct friend, but at least one friend in common.
    Mutual,
    Stranger,
    Anonymous,
}

/// Decides visibility from the candidate's policy and the requester's relation.
pub fn permits(policy: SearchVisibility, relation: Relation) -> bool {
    if relation == Relation::Myself {
        return true;
    }
    match policy {
        SearchVisibility::Everyone => true,
        SearchVisibility::FriendsOnly => relation == Relation::Friend,
        SearchVisibility::FriendsOfFriends => {
            matches!(relation, Relation::Friend | Relation::Mutual)
        }
        SearchVisibility::Nobody => false,
    }
}

/// Whether `requester` (None for anonymous) may discover `candidate`.
///
/// Friend sets are only loaded when the policy needs them. A candidate
/// without a settings row is treated as `friends_only`.
pub async fn is_visible(
    dir: &dyn Directory,
    cache: &mut FriendCache,
    requester: Option<Uuid>,
    candidate: Uuid,
) -> anyhow::Result<bool> {
    if requester == Some(candidate) {
        return Ok(true);
    }
    let policy = dir
        .search_visibility(candidate)
        .await?
        .unwrap_or_default();

    let relation = match (policy, requester) {
        (SearchVisibility::Everyone, _) | (SearchVisibility::Nobody, _) => Relation::Stranger,
        (_, None) => Relation::Anonymous,
        (_, Some(r)) => {
            let candidate_friends = cache.friends_of(dir, Some(candidate)).await?;
            if candidate_friends.contains(&r) {
                Relation::Friend
            } else if policy == SearchVisibility::FriendsOfFriends
                && have_mutual_connection(dir, cache, Some(r), Some(candidate)).await?
            {
                Relation::Mutual
            } else {
                Relation::Stranger
            }
        }
    };
    Ok(permits(policy, relation))
}
