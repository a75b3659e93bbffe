//! GraphQL object types wrapping the store's row structs. Relation fields
//! are explicit store queries — no lazy loading behind property accessors.

use async_graphql::{Context, ID, InputObject, Object, Result};

use mixtape_db::models::{FileRow, PlaylistRow, UserRow};

use crate::auth::AppState;

/// URL segment under which stored files are served.
pub const UPLOADS_DIR: &str = "uploads";

pub struct User {
    pub row: UserRow,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self { row }
    }
}

#[Object]
impl User {
    async fn id(&self) -> ID {
        ID(self.row.id.clone())
    }

    async fn created_at(&self) -> &str {
        &self.row.created_at
    }

    async fn login(&self) -> &str {
        &self.row.login
    }

    async fn nick(&self) -> Option<&str> {
        self.row.nick.as_deref()
    }

    async fn avatar(&self, ctx: &Context<'_>) -> Result<Option<File>> {
        let Some(avatar_id) = self.row.avatar_id.as_deref() else {
            return Ok(None);
        };
        let state = ctx.data_unchecked::<AppState>();
        Ok(state.db.get_file(avatar_id)?.map(File::from))
    }

    async fn files(&self, ctx: &Context<'_>) -> Result<Vec<File>> {
        let state = ctx.data_unchecked::<AppState>();
        let rows = state.db.list_files_by_owner(&self.row.id)?;
        Ok(rows.into_iter().map(File::from).collect())
    }

    async fn avatars(&self, ctx: &Context<'_>) -> Result<Vec<File>> {
        let state = ctx.data_unchecked::<AppState>();
        let rows = state.db.list_avatars_by_owner(&self.row.id)?;
        Ok(rows.into_iter().map(File::from).collect())
    }

    async fn playlists(&self, ctx: &Context<'_>) -> Result<Vec<Playlist>> {
        let state = ctx.data_unchecked::<AppState>();
        let rows = state.db.list_playlists_by_owner(&self.row.id)?;
        Ok(rows.into_iter().map(Playlist::from).collect())
    }
}

pub struct File {
    pub row: FileRow,
}

impl From<FileRow> for File {
    fn from(row: FileRow) -> Self {
        Self { row }
    }
}

#[Object]
impl File {
    async fn id(&self) -> ID {
        ID(self.row.id.clone())
    }

    #[graphql(name = "originalname")]
    async fn original_name(&self) -> &str {
        &self.row.original_name
    }

    async fn artist(&self) -> Option<&str> {
        self.row.artist.as_deref()
    }

    async fn mimetype(&self) -> &str {
        &self.row.mimetype
    }

    async fn filename(&self) -> &str {
        &self.row.filename
    }

    async fn path(&self) -> &str {
        &self.row.path
    }

    async fn size(&self) -> i64 {
        self.row.size
    }

    async fn is_avatar(&self) -> bool {
        self.row.is_avatar
    }

    /// Static path the stored file is served at.
    async fn url(&self) -> String {
        format!("/{}/{}", UPLOADS_DIR, self.row.filename)
    }

    async fn created_at(&self) -> &str {
        &self.row.created_at
    }

    async fn user(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        let state = ctx.data_unchecked::<AppState>();
        Ok(state.db.get_user_by_id(&self.row.user_id)?.map(User::from))
    }

    async fn playlist(&self, ctx: &Context<'_>) -> Result<Option<Playlist>> {
        let Some(playlist_id) = self.row.playlist_id.as_deref() else {
            return Ok(None);
        };
        let state = ctx.data_unchecked::<AppState>();
        Ok(state.db.get_playlist(playlist_id)?.map(Playlist::from))
    }
}

pub struct Playlist {
    pub row: PlaylistRow,
}

impl From<PlaylistRow> for Playlist {
    fn from(row: PlaylistRow) -> Self {
        Self { row }
    }
}

#[Object]
impl Playlist {
    async fn id(&self) -> ID {
        ID(self.row.id.clone())
    }

    async fn user_id(&self) -> ID {
        ID(self.row.user_id.clone())
    }

    async fn title(&self) -> &str {
        &self.row.title
    }

    async fn created_at(&self) -> &str {
        &self.row.created_at
    }

    async fn updated_at(&self) -> &str {
        &self.row.updated_at
    }

    async fn user(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        let state = ctx.data_unchecked::<AppState>();
        Ok(state.db.get_user_by_id(&self.row.user_id)?.map(User::from))
    }

    /// Current membership set, loaded through the join table.
    async fn files(&self, ctx: &Context<'_>) -> Result<Vec<File>> {
        let state = ctx.data_unchecked::<AppState>();
        let rows = state.db.list_playlist_files(&self.row.id)?;
        Ok(rows.into_iter().map(File::from).collect())
    }
}

#[derive(InputObject)]
pub struct PlaylistInput {
    pub title: Option<String>,
    pub file_ids: Option<Vec<ID>>,
}
