//! Friendship state derived from directional friend-request rows.
//!
//! A single row `A -> B` is a pending request; rows in both directions mean
//! the two users are friends. The state is never stored, only computed.

use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::db::{FriendRequest, FriendRequestRepository};
use crate::error::AppError;

/// Relationship of `current` towards `other`, as seen by `current`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Friendship {
    #[serde(rename = "friend")]
    Friends,
    /// `current` asked `other` and is waiting.
    #[serde(rename = "request sent")]
    RequestSent,
    /// `other` asked `current`.
    #[serde(rename = "waits for your answer")]
    AwaitingAnswer,
    #[serde(rename = "none")]
    NoRelation,
}

impl Friendship {
    pub fn is_friend(&self) -> bool {
        matches!(self, Friendship::Friends)
    }
}

/// Resolves the relationship from the rows between the pair. Rows that do not
/// connect `current` and `other` are ignored. Two or more connecting rows are
/// treated as friendship.
pub fn resolve(current: i64, other: i64, rows: &[FriendRequest]) -> Friendship {
    if current <= 0 || other <= 0 || current == other {
        return Friendship::NoRelation;
    }

    let sent = rows
        .iter()
        .any(|r| r.user_id == current && r.requested_user_id == other);
    let received = rows
        .iter()
        .any(|r| r.user_id == other && r.requested_user_id == current);

    match (sent, received) {
        (true, true) => Friendship::Friends,
        (true, false) => Friendship::RequestSent,
        (false, true) => Friendship::AwaitingAnswer,
        (false, false) => Friendship::NoRelation,
    }
}

/// Looks up the rows between the pair and resolves them. Invalid identifiers
/// resolve to [`Friendship::NoRelation`] without touching the store.
pub async fn friendship_status(
    pool: &Pool<Sqlite>,
    current: i64,
    other: i64,
) -> Result<Friendship, AppError> {
    if current <= 0 || other <= 0 {
        return Ok(Friendship::NoRelation);
    }

    let rows = FriendRequestRepository::between(pool, current, other).await?;
    Ok(resolve(current, other, &rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(id: i64, from: i64, to: i64) -> FriendRequest {
        FriendRequest {
            id,
            user_id: from,
            requested_user_id: to,
            created_at: 0,
        }
    }

    #[test]
    fn test_decision_table() {
        assert_eq!(resolve(1, 2, &[]), Friendship::NoRelation);
        assert_eq!(resolve(1, 2, &[edge(1, 1, 2)]), Friendship::RequestSent);
        assert_eq!(resolve(1, 2, &[edge(1, 2, 1)]), Friendship::AwaitingAnswer);
        assert_eq!(resolve(1, 2, &[edge(1, 1, 2), edge(2, 2, 1)]), Friendship::Friends);
    }

    #[test]
    fn test_symmetry() {
        let cases: Vec<Vec<FriendRequest>> = vec![
            vec![],
            vec![edge(1, 1, 2)],
            vec![edge(1, 2, 1)],
            vec![edge(1, 2, 1), edge(2, 1, 2)],
        ];

        for rows in &cases {
            let ab = resolve(1, 2, rows);
            let ba = resolve(2, 1, rows);
            match ab {
                Friendship::RequestSent => assert_eq!(ba, Friendship::AwaitingAnswer),
                Friendship::AwaitingAnswer => assert_eq!(ba, Friendship::RequestSent),
                Friendship::Friends => assert_eq!(ba, Friendship::Friends),
                Friendship::NoRelation => assert_eq!(ba, Friendship::NoRelation),
            }
        }
    }

    #[test]
    fn test_invalid_ids_fail_closed() {
        let rows = [edge(1, 0, 2), edge(2, 2, 0)];
        assert_eq!(resolve(0, 2, &rows), Friendship::NoRelation);
        assert_eq!(resolve(-3, 2, &rows), Friendship::NoRelation);
        assert_eq!(resolve(4, 4, &[edge(1, 4, 4)]), Friendship::NoRelation);
    }

    #[test]
    fn test_unrelated_rows_are_ignored() {
        let rows = [edge(1, 1, 3), edge(2, 3, 2)];
        assert_eq!(resolve(1, 2, &rows), Friendship::NoRelation);
    }

    #[test]
    fn test_duplicate_rows_are_still_friends() {
        let rows = [edge(1, 1, 2), edge(2, 2, 1), edge(3, 1, 2)];
        assert_eq!(resolve(1, 2, &rows), Friendship::Friends);
    }

    #[test]
    fn test_serialized_labels() {
        assert_eq!(serde_json::to_string(&Friendship::Friends).unwrap(), "\"friend\"");
        assert_eq!(
            serde_json::to_string(&Friendship::AwaitingAnswer).unwrap(),
            "\"waits for your answer\""
        );
    }
}
