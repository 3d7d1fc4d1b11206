use sqlx::{Pool, Sqlite};

use crate::db::models::{Vote, VoteScore, VoteType};
use crate::error::AppError;

/// What a vote is attached to. Posts and comments share one table with one
/// nullable foreign key each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    Post(i64),
    Comment(i64),
}

impl VoteTarget {
    fn column(&self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "post_id",
            VoteTarget::Comment(_) => "comment_id",
        }
    }

    fn id(&self) -> i64 {
        match self {
            VoteTarget::Post(id) | VoteTarget::Comment(id) => *id,
        }
    }
}

/// Result of casting a vote: whether a new row was created or an existing
/// vote changed type.
#[derive(Debug, Clone)]
pub enum CastVote {
    Created(Vote),
    Updated(Vote),
}

pub struct VoteRepository;

impl VoteRepository {
    pub async fn find(
        pool: &Pool<Sqlite>,
        user_id: i64,
        target: VoteTarget,
    ) -> Result<Option<Vote>, AppError> {
        let sql = format!(
            "SELECT * FROM votes WHERE user_id = ? AND {} = ?",
            target.column()
        );
        let vote = sqlx::query_as::<_, Vote>(&sql)
            .bind(user_id)
            .bind(target.id())
            .fetch_optional(pool)
            .await?;

        Ok(vote)
    }

    /// One vote per user per target: a repeat vote overwrites the type. The
    /// write is a single upsert against the partial unique index, so two
    /// concurrent first votes collapse into one row.
    pub async fn cast(
        pool: &Pool<Sqlite>,
        user_id: i64,
        target: VoteTarget,
        vote_type: VoteType,
    ) -> Result<CastVote, AppError> {
        let existed = Self::find(pool, user_id, target).await?.is_some();

        let column = target.column();
        let sql = format!(
            r#"
INSERT INTO votes (user_id, {column}, vote_type)
VALUES (?, ?, ?)
ON CONFLICT (user_id, {column}) WHERE {column} IS NOT NULL
DO UPDATE SET vote_type = excluded.vote_type
RETURNING *
            "#
        );
        let vote = sqlx::query_as::<_, Vote>(&sql)
            .bind(user_id)
            .bind(target.id())
            .bind(vote_type)
            .fetch_one(pool)
            .await?;

        Ok(if existed {
            CastVote::Updated(vote)
        } else {
            CastVote::Created(vote)
        })
    }

    /// Returns false when the user had no vote on the target.
    pub async fn remove(
        pool: &Pool<Sqlite>,
        user_id: i64,
        target: VoteTarget,
    ) -> Result<bool, AppError> {
        let sql = format!("DELETE FROM votes WHERE user_id = ? AND {} = ?", target.column());
        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(target.id())
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn score(pool: &Pool<Sqlite>, target: VoteTarget) -> Result<VoteScore, AppError> {
        let sql = format!(
            r#"
SELECT
    COALESCE(SUM(CASE WHEN vote_type = 'upvote' THEN 1 ELSE 0 END), 0),
    COALESCE(SUM(CASE WHEN vote_type = 'downvote' THEN 1 ELSE 0 END), 0)
FROM votes
WHERE {} = ?
            "#,
            target.column()
        );
        let (upvotes, downvotes): (i64, i64) = sqlx::query_as(&sql)
            .bind(target.id())
            .fetch_one(pool)
            .await?;

        Ok(VoteScore {
            upvotes,
            downvotes,
            score: upvotes - downvotes,
        })
    }
}
