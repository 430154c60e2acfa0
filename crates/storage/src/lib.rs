use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use shared::domain::{
    License, LicenseId, Licensee, LicenseeId, Owner, OwnerId, Song, SongId,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct NewSong<'a> {
    pub title: &'a str,
    pub artist: &'a str,
    pub owner_id: OwnerId,
    pub year: u32,
    pub genre: &'a str,
    pub price: u32,
}

#[derive(Debug, Clone)]
pub struct NewLicense {
    pub song_id: SongId,
    pub owner_id: OwnerId,
    pub licensee_id: LicenseeId,
    pub price: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

const SONG_COLUMNS: &str = "id, title, artist, owner_id, year, genre, price";
const LICENSE_COLUMNS: &str =
    "id, song_id, owner_id, licensee_id, approved, price, start_time, end_time";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // Each in-memory connection would otherwise see its own empty database.
        let max_connections = if is_in_memory(database_url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_owner(&self, name: &str, email: &str, auth_key: &str) -> Result<OwnerId> {
        let rec = sqlx::query(
            "INSERT INTO owners (name, email, auth_key) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(name)
        .bind(email)
        .bind(auth_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(OwnerId(rec.get::<i64, _>(0)))
    }

    /// Loads an owner together with the songs they own and their approved licenses.
    pub async fn load_owner(&self, owner_id: OwnerId) -> Result<Option<Owner>> {
        let row = sqlx::query("SELECT id, name, email, auth_key FROM owners WHERE id = ?")
            .bind(owner_id.0)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let song_ids = sqlx::query_scalar::<_, i64>("SELECT id FROM songs WHERE owner_id = ? ORDER BY id")
            .bind(owner_id.0)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(SongId)
            .collect();
        let license_ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM licenses WHERE owner_id = ? AND approved = 1 ORDER BY id",
        )
        .bind(owner_id.0)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(LicenseId)
        .collect();

        Ok(Some(Owner {
            id: OwnerId(row.get::<i64, _>(0)),
            name: row.get::<String, _>(1),
            email: row.get::<String, _>(2),
            auth_key: row.get::<String, _>(3),
            song_ids,
            license_ids,
        }))
    }

    pub async fn create_song(&self, song: &NewSong<'_>) -> Result<SongId> {
        let rec = sqlx::query(
            "INSERT INTO songs (title, artist, owner_id, year, genre, price)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(song.title)
        .bind(song.artist)
        .bind(song.owner_id.0)
        .bind(i64::from(song.year))
        .bind(song.genre)
        .bind(i64::from(song.price))
        .fetch_one(&self.pool)
        .await?;
        Ok(SongId(rec.get::<i64, _>(0)))
    }

    pub async fn load_song(&self, song_id: SongId) -> Result<Option<Song>> {
        let row = sqlx::query(&format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?"))
            .bind(song_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(song_from_row))
    }

    pub async fn list_songs(&self) -> Result<Vec<Song>> {
        let rows = sqlx::query(&format!("SELECT {SONG_COLUMNS} FROM songs ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(song_from_row).collect())
    }

    pub async fn create_licensee(&self, name: &str, email: &str) -> Result<LicenseeId> {
        let rec = sqlx::query("INSERT INTO licensees (name, email) VALUES (?, ?) RETURNING id")
            .bind(name)
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(LicenseeId(rec.get::<i64, _>(0)))
    }

    pub async fn load_licensee(&self, licensee_id: LicenseeId) -> Result<Option<Licensee>> {
        let row = sqlx::query("SELECT id, name, email FROM licensees WHERE id = ?")
            .bind(licensee_id.0)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let licenses = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM licenses WHERE licensee_id = ? AND approved = 1 ORDER BY id",
        )
        .bind(licensee_id.0)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(LicenseId)
        .collect();

        Ok(Some(Licensee {
            id: LicenseeId(row.get::<i64, _>(0)),
            name: row.get::<String, _>(1),
            email: row.get::<String, _>(2),
            licenses,
        }))
    }

    pub async fn create_license(&self, license: &NewLicense) -> Result<LicenseId> {
        let rec = sqlx::query(
            "INSERT INTO licenses (song_id, owner_id, licensee_id, approved, price, start_time, end_time)
             VALUES (?, ?, ?, 0, ?, ?, ?)
             RETURNING id",
        )
        .bind(license.song_id.0)
        .bind(license.owner_id.0)
        .bind(license.licensee_id.0)
        .bind(i64::from(license.price))
        .bind(license.start_time)
        .bind(license.end_time)
        .fetch_one(&self.pool)
        .await?;
        Ok(LicenseId(rec.get::<i64, _>(0)))
    }

    pub async fn load_license(&self, license_id: LicenseId) -> Result<Option<License>> {
        let row = sqlx::query(&format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE id = ?"))
            .bind(license_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(license_from_row))
    }

    pub async fn list_licenses_for_owner(&self, owner_id: OwnerId) -> Result<Vec<License>> {
        let rows = sqlx::query(&format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses WHERE owner_id = ? ORDER BY id"
        ))
        .bind(owner_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(license_from_row).collect())
    }

    pub async fn list_licenses_for_licensee(&self, licensee_id: LicenseeId) -> Result<Vec<License>> {
        let rows = sqlx::query(&format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses WHERE licensee_id = ? ORDER BY id"
        ))
        .bind(licensee_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(license_from_row).collect())
    }

    /// Flips the approval flag only if it currently holds the opposite value,
    /// in a single statement. Returns `false` when no row was in that state.
    pub async fn set_license_approved(&self, license_id: LicenseId, approved: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE licenses SET approved = ?1 WHERE id = ?2 AND approved = ?3")
            .bind(approved)
            .bind(license_id.0)
            .bind(!approved)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to update approval for license {license_id}"))?;
        Ok(result.rows_affected() > 0)
    }
}

fn song_from_row(r: &SqliteRow) -> Song {
    Song {
        id: SongId(r.get::<i64, _>(0)),
        title: r.get::<String, _>(1),
        artist: r.get::<String, _>(2),
        owner_id: OwnerId(r.get::<i64, _>(3)),
        year: r.get::<i64, _>(4) as u32,
        genre: r.get::<String, _>(5),
        price: r.get::<i64, _>(6) as u32,
    }
}

fn license_from_row(r: &SqliteRow) -> License {
    License {
        id: LicenseId(r.get::<i64, _>(0)),
        song_id: SongId(r.get::<i64, _>(1)),
        owner_id: OwnerId(r.get::<i64, _>(2)),
        licensee_id: LicenseeId(r.get::<i64, _>(3)),
        approved: r.get::<bool, _>(4),
        price: r.get::<i64, _>(5) as u32,
        start_time: r.get::<DateTime<Utc>, _>(6),
        end_time: r.get::<DateTime<Utc>, _>(7),
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

/// Creates the directory holding a file-backed SQLite database. No-op for
/// in-memory and non-sqlite urls.
pub fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_in_memory(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
