use anyhow::{anyhow, Result};
use aws_sdk_s3::presigning::PresigningConfig;
use serde::Serialize;
use sqlx::Row;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::domain::media::{Media, MediaKind};
use crate::infra::{db::Db, storage::ObjectStorage};

#[derive(Clone)]
pub struct MediaService {
    db: Db,
    storage: ObjectStorage,
    s3_public_endpoint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadIntent {
    pub media_id: Uuid,
    pub object_key: String,
    pub upload_url: String,
    pub expires_in_seconds: u64,
    pub headers: Vec<UploadHeader>,
}

#[derive(Debug, Serialize)]
pub struct UploadHeader {
    pub name: String,
    pub value: String,
}

impl MediaService {
    pub fn new(db: Db, storage: ObjectStorage, s3_public_endpoint: Option<String>) -> Self {
        Self {
            db,
            storage,
            s3_public_endpoint,
        }
    }

    /// Record a media row and hand back a presigned PUT the client uploads
    /// the blob through. The blob never passes through this process.
    pub async fn create_upload(
        &self,
        owner_id: Uuid,
        kind: MediaKind,
        content_type: String,
        bytes: i64,
        expires_in_seconds: u64,
    ) -> Result<UploadIntent> {
        let ext = extension_for(kind, &content_type)?;
        let media_id = Uuid::new_v4();
        let object_key = format!("media/{}/{}.{}", owner_id, media_id, ext);

        sqlx::query(
            "INSERT INTO media (id, owner_id, kind, object_key, content_type, bytes) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(media_id)
        .bind(owner_id)
        .bind(kind.as_db())
        .bind(&object_key)
        .bind(&content_type)
        .bind(bytes)
        .execute(self.db.pool())
        .await?;

        let presign_config = PresigningConfig::expires_in(Duration::from_secs(expires_in_seconds))?;
        let presigned = self
            .storage
            .client()
            .put_object()
            .bucket(self.storage.bucket())
            .key(&object_key)
            .content_type(content_type)
            .content_length(bytes)
            .presigned(presign_config)
            .await?;

        let headers = presigned
            .headers()
            .map(|(name, value)| UploadHeader {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect();

        let mut upload_url = presigned.uri().to_string();
        if let Some(ref public_endpoint) = self.s3_public_endpoint {
            match rewrite_presigned_url(&upload_url, public_endpoint) {
                Ok(rewritten) => upload_url = rewritten,
                Err(err) => tracing::warn!(error = ?err, "failed to rewrite presigned upload URL"),
            }
        }

        Ok(UploadIntent {
            media_id,
            object_key,
            upload_url,
            expires_in_seconds,
            headers,
        })
    }

    pub async fn get_media(&self, media_id: Uuid) -> Result<Option<Media>> {
        let row = sqlx::query(
            "SELECT id, owner_id, kind, object_key, content_type, bytes, created_at \
             FROM media WHERE id = $1",
        )
        .bind(media_id)
        .fetch_optional(self.db.pool())
        .await?;

        let media = match row {
            Some(row) => {
                let kind: String = row.get("kind");
                let kind = MediaKind::from_db(&kind)
                    .ok_or_else(|| anyhow!("unknown media kind: {}", kind))?;
                let object_key: String = row.get("object_key");

                let presign_config = PresigningConfig::expires_in(Duration::from_secs(3600))?;
                let presigned = self
                    .storage
                    .client()
                    .get_object()
                    .bucket(self.storage.bucket())
                    .key(&object_key)
                    .presigned(presign_config)
                    .await?;

                let mut download_url = presigned.uri().to_string();
                if let Some(ref public_endpoint) = self.s3_public_endpoint {
                    if let Ok(rewritten) = rewrite_presigned_url(&download_url, public_endpoint) {
                        download_url = rewritten;
                    }
                }

                Some(Media {
                    id: row.get("id"),
                    owner_id: row.get("owner_id"),
                    kind,
                    object_key,
                    content_type: row.get("content_type"),
                    bytes: row.get("bytes"),
                    created_at: row.get("created_at"),
                    download_url: Some(download_url),
                })
            }
            None => None,
        };

        Ok(media)
    }

    /// Kind of the media row if it exists and belongs to `owner_id`,
    /// None otherwise. Used to vet attachments before a post references
    /// them.
    pub async fn owned_media_kind(
        &self,
        media_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<MediaKind>> {
        let row = sqlx::query("SELECT kind FROM media WHERE id = $1 AND owner_id = $2")
            .bind(media_id)
            .bind(owner_id)
            .fetch_optional(self.db.pool())
            .await?;

        let kind = match row {
            Some(row) => {
                let kind: String = row.get("kind");
                Some(
                    MediaKind::from_db(&kind)
                        .ok_or_else(|| anyhow!("unknown media kind: {}", kind))?,
                )
            }
            None => None,
        };

        Ok(kind)
    }
}

fn extension_for(kind: MediaKind, content_type: &str) -> Result<&'static str> {
    let ext = match (kind, content_type) {
        (MediaKind::Image, "image/jpeg") => "jpg",
        (MediaKind::Image, "image/png") => "png",
        (MediaKind::Image, "image/webp") => "webp",
        (MediaKind::Video, "video/mp4") => "mp4",
        (MediaKind::Video, "video/webm") => "webm",
        _ => return Err(anyhow!("unsupported content type: {}", content_type)),
    };
    Ok(ext)
}

/// Swap the internal S3 endpoint for the public one while keeping path,
/// query string, and signature intact.
fn rewrite_presigned_url(presigned_url: &str, public_endpoint: &str) -> Result<String> {
    let mut url = Url::parse(presigned_url)?;
    let public = Url::parse(public_endpoint)?;

    url.set_scheme(public.scheme())
        .map_err(|_| anyhow!("invalid public endpoint scheme"))?;
    url.set_host(public.host_str())?;
    url.set_port(public.port())
        .map_err(|_| anyhow!("invalid public endpoint port"))?;

    Ok(url.to_string())
}
