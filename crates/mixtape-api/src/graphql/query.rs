use async_graphql::{Context, ID, Object, Result};
use tracing::debug;

use mixtape_types::api::Claims;

use crate::auth::{self, AppState};
use crate::graphql::objects::{File, Playlist, User};

pub struct Query;

#[Object]
impl Query {
    /// Credential check. Unknown login and wrong password are
    /// indistinguishable — both yield null, no user-existence leak.
    async fn login(
        &self,
        ctx: &Context<'_>,
        login: String,
        password: String,
    ) -> Result<Option<String>> {
        let state = ctx.data_unchecked::<AppState>().clone();

        let Some(user) = state.db.get_user_by_login(&login)? else {
            return Ok(None);
        };

        // Argon2 verification is CPU-bound; keep it off the async workers.
        let stored_hash = user.password.clone();
        let ok = tokio::task::spawn_blocking(move || auth::verify_password(&stored_hash, &password))
            .await
            .map_err(|e| async_graphql::Error::new(format!("join error: {e}")))?;
        if !ok {
            return Ok(None);
        }

        let user_id = user.id.parse()?;
        let token = auth::create_token(&state.jwt_secret, user_id, &user.login)?;
        Ok(Some(token))
    }

    /// Unauthenticated lookup by id.
    async fn get_user(&self, ctx: &Context<'_>, id: ID) -> Result<Option<User>> {
        let state = ctx.data_unchecked::<AppState>();
        Ok(state.db.get_user_by_id(id.as_str())?.map(User::from))
    }

    /// Playlists owned by the caller; null if unauthenticated.
    async fn get_playlists(&self, ctx: &Context<'_>) -> Result<Option<Vec<Playlist>>> {
        let state = ctx.data_unchecked::<AppState>();
        let Some(identity) = ctx.data_opt::<Claims>() else {
            debug!(op = "getPlaylists", "rejected: no authenticated identity");
            return Ok(None);
        };

        let rows = state.db.list_playlists_by_owner(&identity.sub.to_string())?;
        Ok(Some(rows.into_iter().map(Playlist::from).collect()))
    }

    /// Files owned by the caller; null if unauthenticated.
    async fn get_files(&self, ctx: &Context<'_>) -> Result<Option<Vec<File>>> {
        let state = ctx.data_unchecked::<AppState>();
        let Some(identity) = ctx.data_opt::<Claims>() else {
            debug!(op = "getFiles", "rejected: no authenticated identity");
            return Ok(None);
        };

        let rows = state.db.list_files_by_owner(&identity.sub.to_string())?;
        Ok(Some(rows.into_iter().map(File::from).collect()))
    }
}
