//! Ownership checks gating every mutation.
//!
//! The wire contract is null-on-failure, but internally every rejection
//! carries its cause so it can be logged before collapsing to None.

use anyhow::Result;
use tracing::debug;

use mixtape_db::Database;
use mixtape_db::models::{FileRow, PlaylistRow};
use mixtape_types::api::Claims;

pub enum Access<T> {
    Granted(T),
    Unauthenticated,
    NotFound,
    Denied,
}

impl<T> Access<T> {
    /// Collapse to the wire shape: null on any rejection, with the
    /// distinguished cause logged.
    pub fn into_option(self, op: &str) -> Option<T> {
        match self {
            Access::Granted(v) => Some(v),
            Access::Unauthenticated => {
                debug!(op, "rejected: no authenticated identity");
                None
            }
            Access::NotFound => {
                debug!(op, "rejected: entity not found");
                None
            }
            Access::Denied => {
                debug!(op, "rejected: caller is not the owner");
                None
            }
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted(_))
    }
}

/// Load a file and check the caller owns it.
pub fn owned_file(db: &Database, identity: Option<&Claims>, id: &str) -> Result<Access<FileRow>> {
    let Some(identity) = identity else {
        return Ok(Access::Unauthenticated);
    };
    let Some(file) = db.get_file(id)? else {
        return Ok(Access::NotFound);
    };
    if file.user_id != identity.sub.to_string() {
        return Ok(Access::Denied);
    }
    Ok(Access::Granted(file))
}

/// Load a playlist and check the caller owns it.
pub fn owned_playlist(
    db: &Database,
    identity: Option<&Claims>,
    id: &str,
) -> Result<Access<PlaylistRow>> {
    let Some(identity) = identity else {
        return Ok(Access::Unauthenticated);
    };
    let Some(playlist) = db.get_playlist(id)? else {
        return Ok(Access::NotFound);
    };
    if playlist.user_id != identity.sub.to_string() {
        return Ok(Access::Denied);
    }
    Ok(Access::Granted(playlist))
}

/// Strict bulk check: every id must resolve AND be owned by the caller,
/// otherwise the whole set is rejected. No silent partial application.
pub fn owned_files(
    db: &Database,
    identity: Option<&Claims>,
    ids: &[String],
) -> Result<Access<Vec<FileRow>>> {
    let Some(identity) = identity else {
        return Ok(Access::Unauthenticated);
    };

    let files = db.get_files_by_ids(ids)?;
    if files.len() != dedup_count(ids) {
        return Ok(Access::NotFound);
    }

    let caller = identity.sub.to_string();
    if files.iter().any(|f| f.user_id != caller) {
        return Ok(Access::Denied);
    }

    Ok(Access::Granted(files))
}

/// Strict existence check without the ownership requirement, used by the
/// library-attach operation which reassigns ownership.
pub fn existing_files(
    db: &Database,
    identity: Option<&Claims>,
    ids: &[String],
) -> Result<Access<Vec<FileRow>>> {
    if identity.is_none() {
        return Ok(Access::Unauthenticated);
    }

    let files = db.get_files_by_ids(ids)?;
    if files.len() != dedup_count(ids) {
        return Ok(Access::NotFound);
    }

    Ok(Access::Granted(files))
}

fn dedup_count(ids: &[String]) -> usize {
    let mut seen: Vec<&String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen.len()
}
