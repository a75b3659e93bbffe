use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::{error, warn};
use uuid::Uuid;

use mixtape_db::models::NewFile;
use mixtape_types::api::UploadResponse;

use crate::auth::{self, AppState};
use crate::graphql::objects::UPLOADS_DIR;

/// 50 MB upload limit
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// POST /upload — accepts a multipart body with a single `file` field (plus
/// an optional `artist` text field), stores the payload under
/// `<public>/uploads/<uuid>`, inserts the DB row and returns `{ id, url }`.
///
/// Anonymous callers get a plain-text 403; a body without a file field gets
/// the legacy 502.
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, &'static str)> {
    let Some(identity) = auth::identity_from_headers(&headers, &state.jwt_secret) else {
        return Err((StatusCode::FORBIDDEN, "Files can't be uploaded anonymously"));
    };

    let mut artist: Option<String> = None;
    let mut upload: Option<(String, String, axum::body::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| (StatusCode::BAD_REQUEST, "Malformed multipart body"))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("artist") => {
                artist = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| (StatusCode::BAD_REQUEST, "Malformed multipart body"))?,
                );
            }
            Some("file") => {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let mimetype = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| (StatusCode::BAD_REQUEST, "Malformed multipart body"))?;
                upload = Some((original_name, mimetype, bytes));
            }
            _ => {}
        }
    }

    let Some((original_name, mimetype, bytes)) = upload else {
        return Err((StatusCode::BAD_GATEWAY, "Error"));
    };

    if bytes.len() > MAX_FILE_SIZE {
        return Err((StatusCode::PAYLOAD_TOO_LARGE, "File too large"));
    }

    let file_id = Uuid::new_v4();
    let stored_name = file_id.to_string();
    let uploads_dir = state.public_dir.join(UPLOADS_DIR);

    tokio::fs::create_dir_all(&uploads_dir).await.map_err(|e| {
        error!("Failed to create uploads directory: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Storage error")
    })?;

    let path = uploads_dir.join(&stored_name);
    tokio::fs::write(&path, &bytes).await.map_err(|e| {
        error!("Failed to write {}: {}", path.display(), e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Storage error")
    })?;

    // Blocking DB insert off the async runtime
    let db_state = state.clone();
    let size = bytes.len() as i64;
    let path_str = path.to_string_lossy().into_owned();
    let user_id = identity.sub.to_string();
    let id = stored_name.clone();
    let inserted = tokio::task::spawn_blocking(move || {
        db_state.db.insert_file(&NewFile {
            id: &id,
            original_name: &original_name,
            artist: artist.as_deref(),
            mimetype: &mimetype,
            filename: &id,
            path: &path_str,
            size,
            user_id: &user_id,
        })
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))
    .and_then(|res| res);

    if let Err(e) = inserted {
        error!("DB insert_file error: {}", e);
        // No row made it in; don't leave the blob orphaned on disk
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("failed to remove {}: {}", path.display(), e);
        }
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "Storage error"));
    }

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: file_id,
            url: format!("/{}/{}", UPLOADS_DIR, stored_name),
        }),
    ))
}
