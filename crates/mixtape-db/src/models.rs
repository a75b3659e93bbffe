/// Database row types — these map directly to SQLite rows.
/// Distinct from the GraphQL object types in mixtape-api to keep the
/// DB layer independent.

pub struct UserRow {
    pub id: String,
    pub login: String,
    pub nick: Option<String>,
    pub password: String,
    pub avatar_id: Option<String>,
    pub created_at: String,
}

pub struct FileRow {
    pub id: String,
    pub original_name: String,
    pub artist: Option<String>,
    pub mimetype: String,
    pub filename: String,
    pub path: String,
    pub size: i64,
    pub is_avatar: bool,
    pub user_id: String,
    pub playlist_id: Option<String>,
    pub created_at: String,
}

/// Insert-time fields for a file; id and owner are set by the caller,
/// created_at comes from the table default.
pub struct NewFile<'a> {
    pub id: &'a str,
    pub original_name: &'a str,
    pub artist: Option<&'a str>,
    pub mimetype: &'a str,
    pub filename: &'a str,
    pub path: &'a str,
    pub size: i64,
    pub user_id: &'a str,
}

pub struct PlaylistRow {
    pub id: String,
    pub title: String,
    pub user_id: String,
    pub created_at: String,
    pub updated_at: String,
}
