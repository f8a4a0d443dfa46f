use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::engagement::Comment;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
}

impl EngagementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn post_exists(&self, post_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(exists)
    }

    /// Flip the (user, post) like membership. The unique constraint on
    /// likes (user_id, post_id) makes the insert race-safe; if the insert
    /// hits the conflict, the existing like is removed instead.
    pub async fn toggle_like(&self, user_id: Uuid, post_id: Uuid) -> Result<bool> {
        let inserted = sqlx::query(
            "INSERT INTO likes (user_id, post_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, post_id) DO NOTHING \
             RETURNING id",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        if inserted.is_some() {
            return Ok(true);
        }

        sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(self.db.pool())
            .await?;

        Ok(false)
    }

    pub async fn like_count(&self, post_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    pub async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment> {
        let row = sqlx::query(
            "INSERT INTO comments (post_id, author_id, text) VALUES ($1, $2, $3) \
             RETURNING id, post_id, author_id, text, created_at",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Comment {
            id: row.get("id"),
            post_id: row.get("post_id"),
            author_id: row.get("author_id"),
            text: row.get("text"),
            created_at: row.get("created_at"),
        })
    }

    pub async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT id, post_id, author_id, text, created_at \
             FROM comments \
             WHERE post_id = $1 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in rows {
            comments.push(Comment {
                id: row.get("id"),
                post_id: row.get("post_id"),
                author_id: row.get("author_id"),
                text: row.get("text"),
                created_at: row.get("created_at"),
            });
        }

        Ok(comments)
    }
}
