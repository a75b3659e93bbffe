use std::path::PathBuf;
use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::http::{HeaderMap, header};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;
use uuid::Uuid;

use mixtape_db::Database;
use mixtape_types::api::Claims;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Directory served statically; uploads land under `<public_dir>/uploads`.
    pub public_dir: PathBuf,
}

/// Hash a raw password with Argon2id. Deliberately slow; callers run this
/// via `spawn_blocking` to keep it off the async workers.
pub fn hash_password(raw: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// Wrong password and malformed stored hash both come back false — callers
/// must not be able to tell the cases apart.
pub fn verify_password(stored_hash: &str, raw: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(raw.as_bytes(), &parsed)
        .is_ok()
}

pub fn create_token(secret: &str, user_id: Uuid, login: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        login: login.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Decode and validate a token. Expired, malformed and wrongly-signed tokens
/// all collapse to None; the cause is only logged.
pub fn verify_token(secret: &str, token: &str) -> Option<Claims> {
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            debug!("token verification failed: {}", e);
            None
        }
    }
}

/// Pull the caller identity out of an `Authorization: Bearer <token>` header.
/// Absent or invalid credentials yield an unauthenticated context, never an
/// error.
pub fn identity_from_headers(headers: &HeaderMap, secret: &str) -> Option<Claims> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))?;

    verify_token(secret, token)
}
