use std::collections::HashSet;

use uuid::Uuid;

use crate::users::repo_types::SearchVisibility;

/// One independently evaluable condition of a visibility filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityClause {
    /// The candidate is the requester.
    SelfMatch(Uuid),
    /// The candidate's policy is `everyone`.
    Everyone,
    /// Policy `friends_only` and the requester is a direct friend.
    FriendsOnly { requester: Uuid },
    /// Policy `friends_of_friends` and the requester is a direct friend or
    /// shares at least one friend with the candidate.
    FriendsOfFriends { requester: Uuid },
}

/// Predicate over the candidate population, handed to a `Directory` which
/// compiles it into its own query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityFilter {
    /// No restriction at all (staff bypass).
    Unrestricted,
    /// Disjunction of clauses; an empty list admits nobody.
    AnyOf(Vec<VisibilityClause>),
}

/// What an in-memory adapter knows about one candidate row.
#[derive(Debug, Clone, Copy)]
pub struct CandidateFacts<'a> {
    pub id: Uuid,
    /// Already defaulted when the candidate has no settings row.
    pub visibility: SearchVisibility,
    pub friends: &'a HashSet<Uuid>,
}

/// Builds the filter for `requester`; anonymous requesters only see `everyone`.
pub fn compose(requester: Option<Uuid>) -> VisibilityFilter {
    match requester {
        None => VisibilityFilter::AnyOf(vec![VisibilityClause::Everyone]),
        Some(requester) => VisibilityFilter::AnyOf(vec![
            VisibilityClause::SelfMatch(requester),
            VisibilityClause::Everyone,
            VisibilityClause::FriendsOnly { requester },
            VisibilityClause::FriendsOfFriends { requester },
        ]),
    }
}

impl VisibilityClause {
    fn admits(&self, candidate: &CandidateFacts<'_>, requester_friends: &HashSet<Uuid>) -> bool {
        match *self {
            VisibilityClause::SelfMatch(id) => candidate.id == id,
            VisibilityClause::Everyone => candidate.visibility == SearchVisibility::Everyone,
            VisibilityClause::FriendsOnly { requester } => {
                candidate.visibility == SearchVisibility::FriendsOnly
                    && candidate.friends.contains(&requester)
            }
            VisibilityClause::FriendsOfFriends { requester } => {
                candidate.visibility == SearchVisibility::FriendsOfFriends
                    && (candidate.friends.contains(&requester)
                        || !requester_friends.is_disjoint(candidate.friends))
            }
        }
    }
}

impl VisibilityFilter {
    /// Row-by-row evaluation. `requester_friends` is the friend set of the
    /// requester the filter was composed for (empty for anonymous).
    pub fn admits(&self, candidate: &CandidateFacts<'_>, requester_friends: &HashSet<Uuid>) -> bool {
        match self {
            VisibilityFilter::Unrestricted => true,
            VisibilityFilter::AnyOf(clauses) => clauses
                .iter()
                .any(|c| c.admits(candidate, requester_friends)),
        }
    }
}
