use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::post::{DashboardPost, Post};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(
        &self,
        owner_id: Uuid,
        title: String,
        content: String,
        image_id: Option<Uuid>,
        video_id: Option<Uuid>,
    ) -> Result<Post> {
        let row = sqlx::query(
            "INSERT INTO posts (owner_id, title, content, image_id, video_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, owner_id, title, content, image_id, video_id, created_at",
        )
        .bind(owner_id)
        .bind(title)
        .bind(content)
        .bind(image_id)
        .bind(video_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(post_from_row(&row))
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query(
            "SELECT id, owner_id, title, content, image_id, video_id, created_at \
             FROM posts WHERE id = $1",
        )
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    /// Ownership lives in the WHERE clause: a wrong id and a post owned by
    /// someone else are indistinguishable (both yield None).
    pub async fn update_post(
        &self,
        post_id: Uuid,
        owner_id: Uuid,
        title: String,
        content: String,
        image_id: Option<Uuid>,
        video_id: Option<Uuid>,
    ) -> Result<Option<Post>> {
        // Attachments are replaced only when new ones are supplied.
        let row = sqlx::query(
            "UPDATE posts \
             SET title = $3, \
                 content = $4, \
                 image_id = COALESCE($5, image_id), \
                 video_id = COALESCE($6, video_id) \
             WHERE id = $1 AND owner_id = $2 \
             RETURNING id, owner_id, title, content, image_id, video_id, created_at",
        )
        .bind(post_id)
        .bind(owner_id)
        .bind(title)
        .bind(content)
        .bind(image_id)
        .bind(video_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    pub async fn delete_post(&self, post_id: Uuid, owner_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND owner_id = $2")
            .bind(post_id)
            .bind(owner_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Every post, newest first. Deliberately a full scan with no cursor:
    /// the dashboard shows the whole timeline.
    pub async fn dashboard(&self) -> Result<Vec<DashboardPost>> {
        let rows = sqlx::query(
            "SELECT p.id, p.owner_id, u.username AS owner_username, \
                    p.title, p.content, p.image_id, p.video_id, p.created_at, \
                    (SELECT count(*) FROM likes l WHERE l.post_id = p.id) AS like_count, \
                    (SELECT count(*) FROM comments c WHERE c.post_id = p.id) AS comment_count \
             FROM posts p \
             JOIN users u ON p.owner_id = u.id \
             ORDER BY p.created_at DESC, p.id DESC",
        )
        .fetch_all(self.db.pool())
        .await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            posts.push(DashboardPost {
                id: row.get("id"),
                owner_id: row.get("owner_id"),
                owner_username: row.get("owner_username"),
                title: row.get("title"),
                content: row.get("content"),
                image_id: row.get("image_id"),
                video_id: row.get("video_id"),
                created_at: row.get("created_at"),
                like_count: row.get("like_count"),
                comment_count: row.get("comment_count"),
            });
        }

        Ok(posts)
    }
}

fn post_from_row(row: &sqlx::postgres::PgRow) -> Post {
    Post {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        content: row.get("content"),
        image_id: row.get("image_id"),
        video_id: row.get("video_id"),
        created_at: row.get("created_at"),
    }
}
