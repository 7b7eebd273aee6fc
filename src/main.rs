// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::Result;
use rusqlite::Connection;
use std::env;
use std::path::{Path, PathBuf};

// Use library instead of local modules
use game_catalog::{count_games, create_user, insert_games, load_clz_csv, setup_database};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("import") => {
            let csv_path = match args.get(2) {
                Some(path) => PathBuf::from(path),
                None => {
                    eprintln!("Usage: game-catalog import <clz-export.csv>");
                    std::process::exit(1);
                }
            };
            run_import(&csv_path)?;
        }
        Some("add-user") => {
            let (username, password) = match (args.get(2), args.get(3)) {
                (Some(u), Some(p)) => (u.clone(), p.clone()),
                _ => {
                    eprintln!("Usage: game-catalog add-user <username> <password>");
                    std::process::exit(1);
                }
            };
            run_add_user(&username, &password)?;
        }
        _ => {
            // UI mode (default)
            run_ui_mode()?;
        }
    }

    Ok(())
}

fn db_path() -> PathBuf {
    env::var("DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("games.db"))
}

fn run_import(csv_path: &Path) -> Result<()> {
    println!("🗄️  Game Catalog - CLZ Import → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load CSV
    println!("\n📂 Loading {}...", csv_path.display());
    let games = load_clz_csv(csv_path)?;
    println!("✓ Loaded {} games from export", games.len());

    // 2. Setup database
    println!("\n🔧 Setting up database...");
    let conn = Connection::open(db_path())?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    // 3. Insert games
    println!("\n💾 Inserting games...");
    let inserted = insert_games(&conn, &games)?;
    println!("✓ Inserted: {} games", inserted);
    println!("✓ Skipped duplicates: {}", games.len() - inserted);

    // 4. Verify count
    println!("\n🔍 Verifying database...");
    let count = count_games(&conn)?;
    println!("✓ Database contains {} games", count);

    Ok(())
}

fn run_add_user(username: &str, password: &str) -> Result<()> {
    let conn = Connection::open(db_path())?;
    setup_database(&conn)?;
    create_user(&conn, username, password)?;

    println!("✓ User '{}' created", username);

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode() -> Result<()> {
    println!("🖥️  Loading Game Catalog UI...\n");

    // Open database
    let db_path = db_path();

    if !db_path.exists() {
        eprintln!("❌ Database not found at {:?}", db_path);
        eprintln!("   Run: game-catalog import <clz-export.csv>");
        eprintln!("   to import your collection first.");
        std::process::exit(1);
    }

    let conn = Connection::open(&db_path)?;

    println!("📊 Loading collection...");
    let mut app = ui::App::new(conn)?;
    println!("✓ {} games cataloged\n", app.total_count());
    println!("Starting UI... (Press 'q' to quit)\n");

    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode() -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin catalog-server --features server");
    std::process::exit(1);
}
