use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub content: String,
    pub image_id: Option<Uuid>,
    pub video_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Dashboard projection of a post: owner name plus engagement counts,
/// computed at query time.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardPost {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_username: String,
    pub title: String,
    pub content: String,
    pub image_id: Option<Uuid>,
    pub video_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub like_count: i64,
    pub comment_count: i64,
}
