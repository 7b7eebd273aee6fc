use anyhow::{Context, Result};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::auth::hash_password;
use crate::model::Game;

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Games Table (flat CLZ record + identity/dedup columns)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS games (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            game_uuid TEXT UNIQUE NOT NULL,
            dedup_hash TEXT UNIQUE NOT NULL,
            platform TEXT NOT NULL,
            title TEXT NOT NULL,
            release_date TEXT NOT NULL,
            publisher TEXT NOT NULL,
            developer TEXT NOT NULL,
            genre TEXT NOT NULL,
            added_date TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Users Table (API credentials)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Provider Cache Table (enrichment payloads keyed by provider + title)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS provider_cache (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            provider TEXT NOT NULL,
            title TEXT NOT NULL,
            payload TEXT NOT NULL,
            fetched_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(provider, title)
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_games_platform ON games(platform)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_games_title ON games(title)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_games_added ON games(added_date)",
        [],
    )?;

    Ok(())
}

/// Load a CLZ-style CSV export and assign identities to every record.
pub fn load_clz_csv(csv_path: &Path) -> Result<Vec<Game>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;

    let mut games = Vec::new();

    for result in rdr.deserialize() {
        let mut game: Game = result.context("Failed to deserialize game record")?;
        game.init_identity();
        games.push(game);
    }

    Ok(games)
}

/// Insert a batch of games, skipping duplicates (same platform + title).
/// Returns the number inserted.
pub fn insert_games(conn: &Connection, games: &[Game]) -> Result<usize> {
    let mut inserted = 0;
    let mut duplicates = 0;

    for game in games {
        if insert_game(conn, game)? {
            inserted += 1;
        } else {
            duplicates += 1;
        }
    }

    debug!("insert_games: {inserted} inserted, {duplicates} duplicates skipped");

    Ok(inserted)
}

/// Insert a single game. Returns false when an identical platform + title
/// pair is already cataloged.
pub fn insert_game(conn: &Connection, game: &Game) -> Result<bool> {
    let hash = game.compute_dedup_hash();

    let result = conn.execute(
        "INSERT INTO games (
            game_uuid, dedup_hash, platform, title, release_date,
            publisher, developer, genre, added_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            game.id,
            hash,
            game.platform,
            game.title,
            game.release_date,
            game.publisher,
            game.developer,
            game.genre,
            game.added_date,
        ],
    );

    match result {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

const GAME_COLUMNS: &str =
    "platform, title, release_date, publisher, developer, genre, added_date, game_uuid";

fn row_to_game(row: &rusqlite::Row) -> rusqlite::Result<Game> {
    Ok(Game {
        platform: row.get(0)?,
        title: row.get(1)?,
        release_date: row.get(2)?,
        publisher: row.get(3)?,
        developer: row.get(4)?,
        genre: row.get(5)?,
        added_date: row.get(6)?,
        id: row.get(7)?,
    })
}

pub fn get_all_games(conn: &Connection) -> Result<Vec<Game>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GAME_COLUMNS} FROM games ORDER BY title, platform"
    ))?;

    let games = stmt
        .query_map([], row_to_game)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(games)
}

/// One page of the collection in a stable order; this is what the
/// infinite-scroll callback pulls.
pub fn get_games_page(conn: &Connection, offset: i64, limit: i64) -> Result<Vec<Game>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GAME_COLUMNS} FROM games ORDER BY title, platform LIMIT ?1 OFFSET ?2"
    ))?;

    let games = stmt
        .query_map(params![limit, offset], row_to_game)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(games)
}

pub fn get_game(conn: &Connection, game_uuid: &str) -> Result<Option<Game>> {
    let game = conn
        .query_row(
            &format!("SELECT {GAME_COLUMNS} FROM games WHERE game_uuid = ?1"),
            params![game_uuid],
            row_to_game,
        )
        .optional()?;

    Ok(game)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
    /// The edit would give this record another record's platform + title.
    Conflict,
}

/// Standard field edit: overwrite every catalog field of an existing record.
pub fn update_game(conn: &Connection, game_uuid: &str, game: &Game) -> Result<UpdateOutcome> {
    let result = conn.execute(
        "UPDATE games SET
            dedup_hash = ?1, platform = ?2, title = ?3, release_date = ?4,
            publisher = ?5, developer = ?6, genre = ?7, added_date = ?8
         WHERE game_uuid = ?9",
        params![
            game.compute_dedup_hash(),
            game.platform,
            game.title,
            game.release_date,
            game.publisher,
            game.developer,
            game.genre,
            game.added_date,
            game_uuid,
        ],
    );

    match result {
        Ok(0) => Ok(UpdateOutcome::NotFound),
        Ok(_) => Ok(UpdateOutcome::Updated),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Ok(UpdateOutcome::Conflict)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn delete_game(conn: &Connection, game_uuid: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM games WHERE game_uuid = ?1", params![game_uuid])?;
    Ok(deleted > 0)
}

pub fn count_games(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// Users
// ============================================================================

pub fn create_user(conn: &Connection, username: &str, password: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
        params![username, hash_password(password)],
    )
    .context("Failed to create user")?;

    Ok(())
}

/// Check a login attempt against the stored hash.
pub fn verify_user(conn: &Connection, username: &str, password: &str) -> Result<bool> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT password_hash FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )
        .optional()?;

    Ok(match stored {
        Some(hash) => hash == hash_password(password),
        None => false,
    })
}

// ============================================================================
// Provider cache
// ============================================================================

pub fn cache_put(
    conn: &Connection,
    provider: &str,
    title: &str,
    payload: &serde_json::Value,
) -> Result<()> {
    conn.execute(
        "INSERT INTO provider_cache (provider, title, payload) VALUES (?1, ?2, ?3)
         ON CONFLICT(provider, title) DO UPDATE SET
            payload = excluded.payload,
            fetched_at = CURRENT_TIMESTAMP",
        params![provider, title, serde_json::to_string(payload)?],
    )?;

    Ok(())
}

pub fn cache_get(conn: &Connection, provider: &str, title: &str) -> Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT payload FROM provider_cache WHERE provider = ?1 AND title = ?2",
            params![provider, title],
            |row| row.get(0),
        )
        .optional()?;

    Ok(match raw {
        Some(json) => Some(serde_json::from_str(&json).context("Corrupt cached payload")?),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn test_game(platform: &str, title: &str) -> Game {
        let mut game = Game {
            platform: platform.to_string(),
            title: title.to_string(),
            release_date: "2001-03-21".to_string(),
            publisher: "Sega".to_string(),
            developer: "Sonic Team".to_string(),
            genre: "Platformer".to_string(),
            added_date: "2024-01-15".to_string(),
            id: String::new(),
        };
        game.init_identity();
        game
    }

    #[test]
    fn test_insert_and_get_roundtrip() {
        let conn = test_conn();
        let game = test_game("Dreamcast", "Sonic Adventure 2");

        assert!(insert_game(&conn, &game).unwrap());

        let loaded = get_game(&conn, &game.id).unwrap().unwrap();
        assert_eq!(loaded, game);
        assert_eq!(count_games(&conn).unwrap(), 1);
    }

    #[test]
    fn test_duplicate_platform_title_skipped() {
        let conn = test_conn();
        let first = test_game("Dreamcast", "Sonic Adventure 2");
        let mut second = test_game("Dreamcast", "Sonic Adventure 2");
        second.publisher = "Someone Else".to_string();

        let games = vec![first, second];
        let inserted = insert_games(&conn, &games).unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(count_games(&conn).unwrap(), 1);
    }

    #[test]
    fn test_load_clz_csv_assigns_identities() {
        let csv_path =
            std::env::temp_dir().join(format!("clz-import-{}.csv", uuid::Uuid::new_v4()));
        std::fs::write(
            &csv_path,
            "Platform,Title,ReleaseDate,Publisher,Developer,Genre,AddedDate\n\
             PS2,Okami,2006-04-20,Capcom,Clover Studio,Action-adventure,2024-01-15\n\
             GameCube,Pikmin,2001-10-26,Nintendo,Nintendo EAD,Strategy,\n",
        )
        .unwrap();

        let games = load_clz_csv(&csv_path).unwrap();
        std::fs::remove_file(&csv_path).unwrap();

        assert_eq!(games.len(), 2);
        assert_eq!(games[0].platform, "PS2");
        assert_eq!(games[0].title, "Okami");
        assert_eq!(games[1].developer, "Nintendo EAD");

        // The export carries no id column: every record gets a fresh uuid.
        assert!(!games[0].id.is_empty());
        assert!(!games[1].id.is_empty());
        assert_ne!(games[0].id, games[1].id);

        // A blank AddedDate is stamped with today; a filled one is kept.
        assert_eq!(games[0].added_date, "2024-01-15");
        assert!(!games[1].added_date.is_empty());

        let conn = test_conn();
        assert_eq!(insert_games(&conn, &games).unwrap(), 2);
    }

    #[test]
    fn test_same_title_different_platform_both_kept() {
        let conn = test_conn();
        let games = vec![
            test_game("Dreamcast", "Rayman 2"),
            test_game("N64", "Rayman 2"),
        ];

        assert_eq!(insert_games(&conn, &games).unwrap(), 2);
    }

    #[test]
    fn test_pagination_is_stable_and_ordered() {
        let conn = test_conn();
        let games = vec![
            test_game("SNES", "Chrono Trigger"),
            test_game("GBA", "Advance Wars"),
            test_game("PS1", "Vagrant Story"),
            test_game("PS2", "Ico"),
            test_game("N64", "Banjo-Kazooie"),
        ];
        insert_games(&conn, &games).unwrap();

        let page1 = get_games_page(&conn, 0, 2).unwrap();
        let page2 = get_games_page(&conn, 2, 2).unwrap();
        let page3 = get_games_page(&conn, 4, 2).unwrap();

        let titles: Vec<_> = page1
            .iter()
            .chain(&page2)
            .chain(&page3)
            .map(|g| g.title.as_str())
            .collect();

        assert_eq!(
            titles,
            vec![
                "Advance Wars",
                "Banjo-Kazooie",
                "Chrono Trigger",
                "Ico",
                "Vagrant Story"
            ]
        );
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let conn = test_conn();
        insert_game(&conn, &test_game("PS1", "Vagrant Story")).unwrap();

        assert!(get_games_page(&conn, 10, 5).unwrap().is_empty());
    }

    #[test]
    fn test_update_game_fields() {
        let conn = test_conn();
        let mut game = test_game("PS1", "Vagrant Story");
        insert_game(&conn, &game).unwrap();

        game.genre = "Action RPG".to_string();
        assert_eq!(
            update_game(&conn, &game.id, &game).unwrap(),
            UpdateOutcome::Updated
        );

        let loaded = get_game(&conn, &game.id).unwrap().unwrap();
        assert_eq!(loaded.genre, "Action RPG");
    }

    #[test]
    fn test_update_unknown_uuid_is_noop() {
        let conn = test_conn();
        let game = test_game("PS1", "Vagrant Story");

        assert_eq!(
            update_game(&conn, "no-such-uuid", &game).unwrap(),
            UpdateOutcome::NotFound
        );
    }

    #[test]
    fn test_update_into_existing_platform_title_conflicts() {
        let conn = test_conn();
        let kept = test_game("PS1", "Vagrant Story");
        let mut edited = test_game("PS1", "Parasite Eve");
        insert_game(&conn, &kept).unwrap();
        insert_game(&conn, &edited).unwrap();

        edited.title = "Vagrant Story".to_string();
        assert_eq!(
            update_game(&conn, &edited.id, &edited).unwrap(),
            UpdateOutcome::Conflict
        );

        // Both rows keep their original titles.
        let unchanged = get_game(&conn, &edited.id).unwrap().unwrap();
        assert_eq!(unchanged.title, "Parasite Eve");
        assert_eq!(count_games(&conn).unwrap(), 2);
    }

    #[test]
    fn test_delete_game() {
        let conn = test_conn();
        let game = test_game("PS1", "Vagrant Story");
        insert_game(&conn, &game).unwrap();

        assert!(delete_game(&conn, &game.id).unwrap());
        assert!(!delete_game(&conn, &game.id).unwrap());
        assert_eq!(count_games(&conn).unwrap(), 0);
    }

    #[test]
    fn test_user_verification() {
        let conn = test_conn();
        create_user(&conn, "collector", "hunter2").unwrap();

        assert!(verify_user(&conn, "collector", "hunter2").unwrap());
        assert!(!verify_user(&conn, "collector", "wrong").unwrap());
        assert!(!verify_user(&conn, "nobody", "hunter2").unwrap());
    }

    #[test]
    fn test_provider_cache_roundtrip_and_overwrite() {
        let conn = test_conn();

        assert!(cache_get(&conn, "metacritic", "Okami").unwrap().is_none());

        cache_put(&conn, "metacritic", "Okami", &serde_json::json!({ "score": 93 })).unwrap();
        let hit = cache_get(&conn, "metacritic", "Okami").unwrap().unwrap();
        assert_eq!(hit["score"], 93);

        cache_put(&conn, "metacritic", "Okami", &serde_json::json!({ "score": 94 })).unwrap();
        let hit = cache_get(&conn, "metacritic", "Okami").unwrap().unwrap();
        assert_eq!(hit["score"], 94);
    }
}
