use async_graphql::{Context, Error, ID, Object, Result};
use tracing::{debug, warn};
use uuid::Uuid;

use mixtape_db::StoreError;
use mixtape_db::models::FileRow;
use mixtape_types::api::Claims;

use crate::auth::{self, AppState};
use crate::graphql::objects::{File, Playlist, PlaylistInput, User};
use crate::guard::{self, Access};

pub struct Mutation;

#[Object]
impl Mutation {
    async fn register(&self, ctx: &Context<'_>, login: String, password: String) -> Result<User> {
        let state = ctx.data_unchecked::<AppState>();

        // Argon2 hashing is CPU-bound; keep it off the async workers.
        let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
            .await
            .map_err(|e| Error::new(format!("join error: {e}")))??;

        let user_id = Uuid::new_v4().to_string();
        state
            .db
            .create_user(&user_id, &login, &password_hash)
            .map_err(|e| match e.downcast_ref::<StoreError>() {
                Some(StoreError::DuplicateLogin) => Error::new("login already taken"),
                None => e.into(),
            })?;

        let row = state
            .db
            .get_user_by_id(&user_id)?
            .ok_or_else(|| Error::new("registered user not found"))?;
        Ok(User::from(row))
    }

    /// A caller may only rename themselves.
    async fn update_user_nick(
        &self,
        ctx: &Context<'_>,
        id: ID,
        nick: String,
    ) -> Result<Option<User>> {
        let state = ctx.data_unchecked::<AppState>();

        let access = match ctx.data_opt::<Claims>() {
            None => Access::Unauthenticated,
            Some(identity) if identity.sub.to_string() != id.as_str() => Access::Denied,
            Some(identity) => Access::Granted(identity),
        };
        if access.into_option("updateUserNick").is_none() {
            return Ok(None);
        }

        state.db.update_user_nick(id.as_str(), &nick)?;
        Ok(state.db.get_user_by_id(id.as_str())?.map(User::from))
    }

    /// Flip the owned file's avatar flag and point the caller's avatar
    /// reference at it (one transaction in the store).
    async fn set_avatar(&self, ctx: &Context<'_>, avatar_id: ID) -> Result<Option<User>> {
        let state = ctx.data_unchecked::<AppState>();
        let identity = ctx.data_opt::<Claims>();

        let Some(file) =
            guard::owned_file(&state.db, identity, avatar_id.as_str())?.into_option("setAvatar")
        else {
            return Ok(None);
        };

        let caller = file.user_id;
        state.db.set_user_avatar(&caller, avatar_id.as_str())?;
        Ok(state.db.get_user_by_id(&caller)?.map(User::from))
    }

    async fn add_playlist(
        &self,
        ctx: &Context<'_>,
        playlist: PlaylistInput,
    ) -> Result<Option<Playlist>> {
        let state = ctx.data_unchecked::<AppState>();
        let identity = ctx.data_opt::<Claims>();

        let Some(identity) = identity else {
            debug!(op = "addPlaylist", "rejected: no authenticated identity");
            return Ok(None);
        };

        let title = playlist
            .title
            .ok_or_else(|| Error::new("playlist title is required"))?;

        let member_ids = id_strings(playlist.file_ids);
        if !member_ids.is_empty() {
            require_bulk(guard::owned_files(&state.db, Some(identity), &member_ids)?)?;
        }

        let playlist_id = Uuid::new_v4().to_string();
        state
            .db
            .create_playlist(&playlist_id, &title, &identity.sub.to_string(), &member_ids)?;

        Ok(state.db.get_playlist(&playlist_id)?.map(Playlist::from))
    }

    /// Title and/or FULL membership replace — members absent from the new
    /// set are dropped.
    async fn update_playlist(
        &self,
        ctx: &Context<'_>,
        id: ID,
        playlist: PlaylistInput,
    ) -> Result<Option<Playlist>> {
        let state = ctx.data_unchecked::<AppState>();
        let identity = ctx.data_opt::<Claims>();

        if guard::owned_playlist(&state.db, identity, id.as_str())?
            .into_option("updatePlaylist")
            .is_none()
        {
            return Ok(None);
        }

        let member_ids = playlist.file_ids.map(|ids| id_strings(Some(ids)));
        if let Some(member_ids) = member_ids.as_deref() {
            require_bulk(guard::owned_files(&state.db, identity, member_ids)?)?;
        }

        state
            .db
            .update_playlist(id.as_str(), playlist.title.as_deref(), member_ids.as_deref())?;

        Ok(state.db.get_playlist(id.as_str())?.map(Playlist::from))
    }

    async fn delete_playlist(&self, ctx: &Context<'_>, id: ID) -> Result<Option<Playlist>> {
        let state = ctx.data_unchecked::<AppState>();
        let identity = ctx.data_opt::<Claims>();

        let Some(playlist) =
            guard::owned_playlist(&state.db, identity, id.as_str())?.into_option("deletePlaylist")
        else {
            return Ok(None);
        };

        state.db.delete_playlist(id.as_str())?;
        Ok(Some(Playlist::from(playlist)))
    }

    /// Attach a set of existing files to the caller's library, reassigning
    /// ownership. Strict: every id must resolve or the whole set is rejected.
    async fn add_tracks_to_library(
        &self,
        ctx: &Context<'_>,
        file_ids: Vec<ID>,
    ) -> Result<Option<Vec<File>>> {
        let state = ctx.data_unchecked::<AppState>();
        let identity = ctx.data_opt::<Claims>();

        let Some(identity) = identity else {
            debug!(op = "addTracksToLibrary", "rejected: no authenticated identity");
            return Ok(None);
        };

        let ids = id_strings(Some(file_ids));
        require_bulk(guard::existing_files(&state.db, Some(identity), &ids)?)?;

        state.db.claim_files(&ids, &identity.sub.to_string())?;

        let rows = state.db.get_files_by_ids(&ids)?;
        Ok(Some(rows.into_iter().map(File::from).collect()))
    }

    async fn delete_track(&self, ctx: &Context<'_>, id: ID) -> Result<Option<File>> {
        self.delete_owned_file(ctx, id, "deleteTrack").await
    }

    async fn delete_file(&self, ctx: &Context<'_>, id: ID) -> Result<Option<File>> {
        self.delete_owned_file(ctx, id, "deleteFile").await
    }

    async fn add_tracks_to_playlist(
        &self,
        ctx: &Context<'_>,
        playlist_id: ID,
        file_ids: Vec<ID>,
    ) -> Result<Option<Playlist>> {
        let state = ctx.data_unchecked::<AppState>();
        let identity = ctx.data_opt::<Claims>();

        if guard::owned_playlist(&state.db, identity, playlist_id.as_str())?
            .into_option("addTracksToPlaylist")
            .is_none()
        {
            return Ok(None);
        }

        let ids = id_strings(Some(file_ids));
        require_bulk(guard::owned_files(&state.db, identity, &ids)?)?;

        state.db.add_playlist_files(playlist_id.as_str(), &ids)?;
        Ok(state.db.get_playlist(playlist_id.as_str())?.map(Playlist::from))
    }

    async fn remove_track_from_playlist(
        &self,
        ctx: &Context<'_>,
        playlist_id: ID,
        file_ids: Vec<ID>,
    ) -> Result<Option<Playlist>> {
        let state = ctx.data_unchecked::<AppState>();
        let identity = ctx.data_opt::<Claims>();

        if guard::owned_playlist(&state.db, identity, playlist_id.as_str())?
            .into_option("removeTrackFromPlaylist")
            .is_none()
        {
            return Ok(None);
        }

        let ids = id_strings(Some(file_ids));
        state.db.remove_playlist_files(playlist_id.as_str(), &ids)?;
        Ok(state.db.get_playlist(playlist_id.as_str())?.map(Playlist::from))
    }

    /// Ownership-checked tag edit; absent fields keep their current value.
    async fn update_track(
        &self,
        ctx: &Context<'_>,
        id: ID,
        originalname: Option<String>,
        artist: Option<String>,
    ) -> Result<Option<File>> {
        let state = ctx.data_unchecked::<AppState>();
        let identity = ctx.data_opt::<Claims>();

        if guard::owned_file(&state.db, identity, id.as_str())?
            .into_option("updateTrack")
            .is_none()
        {
            return Ok(None);
        }

        state
            .db
            .update_track_tags(id.as_str(), originalname.as_deref(), artist.as_deref())?;
        Ok(state.db.get_file(id.as_str())?.map(File::from))
    }
}

impl Mutation {
    async fn delete_owned_file(&self, ctx: &Context<'_>, id: ID, op: &str) -> Result<Option<File>> {
        let state = ctx.data_unchecked::<AppState>();
        let identity = ctx.data_opt::<Claims>();

        let Some(file) = guard::owned_file(&state.db, identity, id.as_str())?.into_option(op)
        else {
            return Ok(None);
        };

        state.db.delete_file(id.as_str())?;

        // Best-effort disk cleanup; the row is already gone.
        if let Err(e) = tokio::fs::remove_file(&file.path).await {
            warn!("failed to remove stored file {}: {}", file.path, e);
        }

        Ok(Some(File::from(file)))
    }
}

/// Map a rejected bulk check to an explicit error — partial application is
/// never silent.
fn require_bulk(access: Access<Vec<FileRow>>) -> Result<Vec<FileRow>> {
    match access {
        Access::Granted(files) => Ok(files),
        Access::NotFound => Err(Error::new("one or more file ids do not exist")),
        Access::Denied => Err(Error::new("one or more files are not owned by the caller")),
        Access::Unauthenticated => Err(Error::new("not authenticated")),
    }
}

fn id_strings(ids: Option<Vec<ID>>) -> Vec<String> {
    ids.unwrap_or_default().into_iter().map(|id| id.0).collect()
}
