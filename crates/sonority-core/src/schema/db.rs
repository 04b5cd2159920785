use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::error::Result;
use crate::model::Song;

use super::migrations::MIGRATIONS;

/// The song catalog: integer-keyed song rows sharing the search index's id
/// space.
#[derive(Debug)]
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open (or create) a catalog at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let catalog = Self { conn };
        catalog.apply_migrations()?;
        Ok(catalog)
    }

    /// Open an in-memory catalog (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let catalog = Self { conn };
        catalog.apply_migrations()?;
        Ok(catalog)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                self.conn.execute_batch(migration.sql)?;
                self.conn.execute(
                    "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }
}

// Song CRUD
impl Catalog {
    /// Insert or replace a single song.
    pub fn insert_song(&self, song: &Song) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO songs (id, name, artists, year, popularity)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![song.id, song.name, song.artists, song.year, song.popularity],
        )?;
        Ok(())
    }

    /// Insert a batch of songs in a single transaction.
    ///
    /// Returns the number of rows written.
    pub fn import_songs<'a, I>(&mut self, songs: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Song>,
    {
        let tx = self.conn.transaction()?;
        let written = insert_all(&tx, songs)?;
        tx.commit()?;
        Ok(written)
    }

    /// Replace every song with `songs` in a single transaction.
    ///
    /// Used after a build so the catalog holds exactly the ids the new
    /// index holds. On error the previous rows are left as they were.
    pub fn replace_songs<'a, I>(&mut self, songs: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Song>,
    {
        let tx = self.conn.transaction()?;
        let removed = tx.execute("DELETE FROM songs", [])?;
        let written = insert_all(&tx, songs)?;
        tx.commit()?;
        log::debug!("Replaced {removed} catalog rows with {written}");
        Ok(written)
    }

    /// Look up one song by id.
    pub fn get_song(&self, id: u32) -> Result<Option<Song>> {
        let song = self
            .conn
            .query_row(
                "SELECT id, name, artists, year, popularity FROM songs WHERE id = ?1",
                [id],
                row_to_song,
            )
            .optional()?;
        Ok(song)
    }

    /// Look up several songs, returned in the order the ids were given.
    ///
    /// Ids with no row are skipped.
    pub fn get_songs(&self, ids: &[u32]) -> Result<Vec<Song>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, artists, year, popularity FROM songs WHERE id = ?1")?;
        let mut songs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(song) = stmt.query_row([id], row_to_song).optional()? {
                songs.push(song);
            }
        }
        Ok(songs)
    }

    /// Substring search over song names and artists, most popular first.
    pub fn search(&self, text: &str, limit: usize) -> Result<Vec<Song>> {
        let pattern = format!("%{text}%");
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT id, name, artists, year, popularity
             FROM songs
             WHERE name LIKE ?1 OR artists LIKE ?1
             ORDER BY popularity DESC, id
             LIMIT ?2",
        )?;
        let songs = stmt
            .query_map(rusqlite::params![pattern, limit], row_to_song)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }

    /// Number of songs in the catalog.
    pub fn count_songs(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM songs", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn insert_all<'a, I>(tx: &rusqlite::Transaction<'_>, songs: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a Song>,
{
    let mut stmt = tx.prepare(
        "INSERT OR REPLACE INTO songs (id, name, artists, year, popularity)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    let mut written = 0;
    for song in songs {
        stmt.execute(rusqlite::params![
            song.id,
            song.name,
            song.artists,
            song.year,
            song.popularity
        ])?;
        written += 1;
    }
    Ok(written)
}

fn row_to_song(row: &rusqlite::Row) -> rusqlite::Result<Song> {
    Ok(Song {
        id: row.get(0)?,
        name: row.get(1)?,
        artists: row.get(2)?,
        year: row.get(3)?,
        popularity: row.get(4)?,
    })
}
