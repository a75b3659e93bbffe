use crate::models::{FileRow, NewFile, PlaylistRow, UserRow};
use crate::{Database, StoreError};
use anyhow::Result;
use rusqlite::{Connection, Transaction};

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, login: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let res = conn.execute(
                "INSERT INTO users (id, login, password) VALUES (?1, ?2, ?3)",
                (id, login, password_hash),
            );
            match res {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateLogin.into())
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_login(&self, login: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "login", login))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn update_user_nick(&self, id: &str, nick: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("UPDATE users SET nick = ?2 WHERE id = ?1", (id, nick))?;
            Ok(())
        })
    }

    /// Flip the file's avatar flag and point the user's avatar reference at it.
    /// Both writes happen in one transaction so the reference never points at
    /// an unflagged file.
    pub fn set_user_avatar(&self, user_id: &str, file_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("UPDATE files SET is_avatar = 1 WHERE id = ?1", [file_id])?;
            tx.execute(
                "UPDATE users SET avatar_id = ?2 WHERE id = ?1",
                (user_id, file_id),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    // -- Files --

    pub fn insert_file(&self, file: &NewFile) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO files (id, original_name, artist, mimetype, filename, path, size, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    file.id,
                    file.original_name,
                    file.artist,
                    file.mimetype,
                    file.filename,
                    file.path,
                    file.size,
                    file.user_id,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_file(&self, id: &str) -> Result<Option<FileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{FILE_SELECT} WHERE id = ?1"))?;
            stmt.query_row([id], map_file).optional()
        })
    }

    /// Batch fetch by id. Callers compare the result length against the
    /// requested id set to detect ids that did not resolve.
    pub fn get_files_by_ids(&self, ids: &[String]) -> Result<Vec<FileRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!("{FILE_SELECT} WHERE id IN ({})", placeholders.join(", "));

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), map_file)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_files_by_owner(&self, user_id: &str) -> Result<Vec<FileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{FILE_SELECT} WHERE user_id = ?1 ORDER BY created_at"
            ))?;
            let rows = stmt
                .query_map([user_id], map_file)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_avatars_by_owner(&self, user_id: &str) -> Result<Vec<FileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{FILE_SELECT} WHERE user_id = ?1 AND is_avatar = 1 ORDER BY created_at"
            ))?;
            let rows = stmt
                .query_map([user_id], map_file)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Tag edit; absent fields keep their current value.
    pub fn update_track_tags(
        &self,
        id: &str,
        original_name: Option<&str>,
        artist: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE files
                 SET original_name = COALESCE(?2, original_name),
                     artist        = COALESCE(?3, artist)
                 WHERE id = ?1",
                (id, original_name, artist),
            )?;
            Ok(())
        })
    }

    /// Reassign a set of files to a new owner (library attach).
    pub fn claim_files(&self, ids: &[String], user_id: &str) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare("UPDATE files SET user_id = ?1 WHERE id = ?2")?;
                for id in ids {
                    stmt.execute((user_id, id))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn delete_file(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            // Membership rows go via ON DELETE CASCADE
            conn.execute("DELETE FROM files WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    // -- Playlists --

    /// Create a playlist and seed its membership set in one transaction.
    pub fn create_playlist(
        &self,
        id: &str,
        title: &str,
        user_id: &str,
        member_ids: &[String],
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO playlists (id, title, user_id) VALUES (?1, ?2, ?3)",
                (id, title, user_id),
            )?;
            insert_members(&tx, id, member_ids)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_playlist(&self, id: &str) -> Result<Option<PlaylistRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{PLAYLIST_SELECT} WHERE id = ?1"))?;
            stmt.query_row([id], map_playlist).optional()
        })
    }

    pub fn list_playlists_by_owner(&self, user_id: &str) -> Result<Vec<PlaylistRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{PLAYLIST_SELECT} WHERE user_id = ?1 ORDER BY created_at"
            ))?;
            let rows = stmt
                .query_map([user_id], map_playlist)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Update title and/or REPLACE the whole membership set. One transaction:
    /// a reader never observes the playlist between delete and re-insert.
    pub fn update_playlist(
        &self,
        id: &str,
        title: Option<&str>,
        member_ids: Option<&[String]>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE playlists
                 SET title = COALESCE(?2, title), updated_at = datetime('now')
                 WHERE id = ?1",
                (id, title),
            )?;
            if let Some(member_ids) = member_ids {
                tx.execute("DELETE FROM playlist_files WHERE playlist_id = ?1", [id])?;
                insert_members(&tx, id, member_ids)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn delete_playlist(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            // Membership rows cascade; files.playlist_id is set NULL
            conn.execute("DELETE FROM playlists WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    // -- Membership --

    /// Idempotent set-add: already-present pairs are ignored.
    pub fn add_playlist_files(&self, playlist_id: &str, file_ids: &[String]) -> Result<()> {
        if file_ids.is_empty() {
            return Ok(());
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            insert_members(&tx, playlist_id, file_ids)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn remove_playlist_files(&self, playlist_id: &str, file_ids: &[String]) -> Result<()> {
        if file_ids.is_empty() {
            return Ok(());
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "DELETE FROM playlist_files WHERE playlist_id = ?1 AND file_id = ?2",
                )?;
                for file_id in file_ids {
                    stmt.execute((playlist_id, file_id))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn list_playlist_files(&self, playlist_id: &str) -> Result<Vec<FileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT f.id, f.original_name, f.artist, f.mimetype, f.filename, f.path,
                        f.size, f.is_avatar, f.user_id, f.playlist_id, f.created_at
                 FROM files f
                 JOIN playlist_files pf ON pf.file_id = f.id
                 WHERE pf.playlist_id = ?1
                 ORDER BY f.created_at",
            )?;
            let rows = stmt
                .query_map([playlist_id], map_file)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_playlist_files(&self, playlist_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM playlist_files WHERE playlist_id = ?1",
                [playlist_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

const FILE_SELECT: &str = "SELECT id, original_name, artist, mimetype, filename, path, size, \
                           is_avatar, user_id, playlist_id, created_at FROM files";

const PLAYLIST_SELECT: &str = "SELECT id, title, user_id, created_at, updated_at FROM playlists";

fn insert_members(tx: &Transaction, playlist_id: &str, file_ids: &[String]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT OR IGNORE INTO playlist_files (playlist_id, file_id) VALUES (?1, ?2)",
    )?;
    for file_id in file_ids {
        stmt.execute((playlist_id, file_id))?;
    }
    Ok(())
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, login, nick, password, avatar_id, created_at FROM users WHERE {column} = ?1"
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                login: row.get(1)?,
                nick: row.get(2)?,
                password: row.get(3)?,
                avatar_id: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn map_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        original_name: row.get(1)?,
        artist: row.get(2)?,
        mimetype: row.get(3)?,
        filename: row.get(4)?,
        path: row.get(5)?,
        size: row.get(6)?,
        is_avatar: row.get(7)?,
        user_id: row.get(8)?,
        playlist_id: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn map_playlist(row: &rusqlite::Row<'_>) -> rusqlite::Result<PlaylistRow> {
    Ok(PlaylistRow {
        id: row.get(0)?,
        title: row.get(1)?,
        user_id: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
