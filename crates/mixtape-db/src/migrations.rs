use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            login       TEXT NOT NULL UNIQUE,
            nick        TEXT,
            password    TEXT NOT NULL,
            avatar_id   TEXT REFERENCES files(id) ON DELETE SET NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS playlists (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL,
            user_id     TEXT NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_playlists_owner
            ON playlists(user_id);

        CREATE TABLE IF NOT EXISTS files (
            id              TEXT PRIMARY KEY,
            original_name   TEXT NOT NULL,
            artist          TEXT,
            mimetype        TEXT NOT NULL,
            filename        TEXT NOT NULL,
            path            TEXT NOT NULL,
            size            INTEGER NOT NULL,
            is_avatar       INTEGER NOT NULL DEFAULT 0,
            user_id         TEXT NOT NULL REFERENCES users(id),
            playlist_id     TEXT REFERENCES playlists(id) ON DELETE SET NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_files_owner
            ON files(user_id);

        CREATE TABLE IF NOT EXISTS playlist_files (
            playlist_id  TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
            file_id      TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
            PRIMARY KEY (playlist_id, file_id)
        );

        CREATE INDEX IF NOT EXISTS idx_playlist_files_file
            ON playlist_files(file_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
