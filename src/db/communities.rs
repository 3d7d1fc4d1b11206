use sqlx::{Pool, Sqlite};

use crate::db::models::{Community, CommunityPost, Member, MemberRole};
use crate::error::AppError;

const COMMUNITY_COLUMNS: &str = r#"
SELECT c.id, c.name, c.description, c.captain_id,
       (SELECT COUNT(*) FROM community_members m WHERE m.community_id = c.id) AS member_count,
       c.created_at
FROM communities c
"#;

const POST_COLUMNS: &str = r#"
SELECT p.id, p.title, p.content, p.owner_id, u.username AS owner_username,
       p.community_id, p.created_at
FROM community_posts p
JOIN users u ON p.owner_id = u.id
"#;

pub struct CommunityRepository;

impl CommunityRepository {
    /// Creates the community and makes `captain_id` its first member, in one
    /// transaction.
    pub async fn create(
        pool: &Pool<Sqlite>,
        name: &str,
        description: Option<&str>,
        captain_id: i64,
    ) -> Result<Community, AppError> {
        let now = chrono::Utc::now();
        let mut tx = pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
INSERT INTO communities (name, description, captain_id, created_at)
VALUES (?, ?, ?, ?)
RETURNING id
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(captain_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO community_members (community_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(captain_id)
        .bind(MemberRole::Captain)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::Internal("Failed to fetch created community".to_string()))
    }

    pub async fn get_by_id(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Community>, AppError> {
        let sql = format!("{} WHERE c.id = ?", COMMUNITY_COLUMNS);
        let community = sqlx::query_as::<_, Community>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(community)
    }

    pub async fn get_by_name(pool: &Pool<Sqlite>, name: &str) -> Result<Option<Community>, AppError> {
        let sql = format!("{} WHERE c.name = ?", COMMUNITY_COLUMNS);
        let community = sqlx::query_as::<_, Community>(&sql)
            .bind(name)
            .fetch_optional(pool)
            .await?;

        Ok(community)
    }

    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Community>, AppError> {
        let sql = format!("{} ORDER BY c.id", COMMUNITY_COLUMNS);
        let communities = sqlx::query_as::<_, Community>(&sql).fetch_all(pool).await?;

        Ok(communities)
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM communities WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn membership(
        pool: &Pool<Sqlite>,
        community_id: i64,
        user_id: i64,
    ) -> Result<Option<MemberRole>, AppError> {
        let role = sqlx::query_scalar::<_, MemberRole>(
            "SELECT role FROM community_members WHERE community_id = ? AND user_id = ?",
        )
        .bind(community_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(role)
    }

    /// Returns false when the user already belongs to the community.
    pub async fn add_member(
        pool: &Pool<Sqlite>,
        community_id: i64,
        user_id: i64,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO community_members (community_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
        )
        .bind(community_id)
        .bind(user_id)
        .bind(MemberRole::Member)
        .bind(chrono::Utc::now())
        .execute(pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove_member(
        pool: &Pool<Sqlite>,
        community_id: i64,
        user_id: i64,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM community_members WHERE community_id = ? AND user_id = ?")
            .bind(community_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn members(pool: &Pool<Sqlite>, community_id: i64) -> Result<Vec<Member>, AppError> {
        let members = sqlx::query_as::<_, Member>(
            r#"
SELECT m.user_id, u.username, m.role, m.joined_at
FROM community_members m
JOIN users u ON m.user_id = u.id
WHERE m.community_id = ?
ORDER BY m.id
            "#,
        )
        .bind(community_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Swap roles between the current and the new captain and repoint
    /// `communities.captain_id`, atomically.
    pub async fn transfer_captaincy(
        pool: &Pool<Sqlite>,
        community_id: i64,
        old_captain_id: i64,
        new_captain_id: i64,
    ) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;

        sqlx::query("UPDATE community_members SET role = ? WHERE community_id = ? AND user_id = ?")
            .bind(MemberRole::Member)
            .bind(community_id)
            .bind(old_captain_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE community_members SET role = ? WHERE community_id = ? AND user_id = ?")
            .bind(MemberRole::Captain)
            .bind(community_id)
            .bind(new_captain_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE communities SET captain_id = ? WHERE id = ?")
            .bind(new_captain_id)
            .bind(community_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn create_post(
        pool: &Pool<Sqlite>,
        community_id: i64,
        owner_id: i64,
        title: &str,
        content: &str,
    ) -> Result<CommunityPost, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
INSERT INTO community_posts (community_id, title, content, owner_id, created_at)
VALUES (?, ?, ?, ?, ?)
RETURNING id
            "#,
        )
        .bind(community_id)
        .bind(title)
        .bind(content)
        .bind(owner_id)
        .bind(chrono::Utc::now())
        .fetch_one(pool)
        .await?;

        Self::get_post(pool, community_id, id)
            .await?
            .ok_or_else(|| AppError::Internal("Failed to fetch created post".to_string()))
    }

    pub async fn get_post(
        pool: &Pool<Sqlite>,
        community_id: i64,
        post_id: i64,
    ) -> Result<Option<CommunityPost>, AppError> {
        let sql = format!("{} WHERE p.id = ? AND p.community_id = ?", POST_COLUMNS);
        let post = sqlx::query_as::<_, CommunityPost>(&sql)
            .bind(post_id)
            .bind(community_id)
            .fetch_optional(pool)
            .await?;

        Ok(post)
    }

    pub async fn list_posts(
        pool: &Pool<Sqlite>,
        community_id: i64,
    ) -> Result<Vec<CommunityPost>, AppError> {
        let sql = format!("{} WHERE p.community_id = ? ORDER BY p.id", POST_COLUMNS);
        let posts = sqlx::query_as::<_, CommunityPost>(&sql)
            .bind(community_id)
            .fetch_all(pool)
            .await?;

        Ok(posts)
    }

    pub async fn delete_post(pool: &Pool<Sqlite>, post_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM community_posts WHERE id = ?")
            .bind(post_id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
