// Game Catalog - Core Library
// Exposes all modules for use in the CLI client, API server, and tests

pub mod auth;
pub mod config;
pub mod db;
pub mod model;
pub mod providers;
pub mod scroll;

// Re-export commonly used types
pub use config::{JwtConfig, ServerConfig};
pub use db::{
    cache_get, cache_put, count_games, create_user, delete_game, get_all_games, get_game,
    get_games_page, insert_game, insert_games, load_clz_csv, setup_database, update_game,
    verify_user, UpdateOutcome,
};
pub use model::Game;
pub use providers::{GameInfoProvider, ProviderRegistry, ReviewScoreProvider};
pub use scroll::{
    test_scroll, AttachPhase, ScrollCallback, ScrollHost, ScrollMetrics, ScrollRegistry,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
