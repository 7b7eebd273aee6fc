// Game Catalog - API Server
// REST API with Axum: CORS → bearer auth → routes

use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use log::warn;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};

use game_catalog::auth::{issue_token, validate_token};
use game_catalog::config::{JwtConfig, ServerConfig};
use game_catalog::model::Game;
use game_catalog::providers::ProviderRegistry;
use game_catalog::{db, VERSION};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    jwt: JwtConfig,
    providers: Arc<ProviderRegistry>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn error(message: &str) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
}

#[derive(Deserialize)]
struct PageParams {
    #[serde(default)]
    offset: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// Paginated list response (what the infinite-scroll client consumes)
#[derive(Serialize)]
struct GamePage {
    games: Vec<Game>,
    total: i64,
    offset: i64,
    limit: i64,
}

fn internal_error(context: &str, e: anyhow::Error) -> Response {
    eprintln!("Error {}: {:#}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::error("database error")),
    )
        .into_response()
}

// ============================================================================
// Middleware
// ============================================================================

/// Bearer-token gate for everything except /api/health and /api/login.
async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match token {
        Some(token) => match validate_token(&state.jwt, token) {
            Ok(_claims) => next.run(req).await,
            Err(_) => (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::error("Invalid bearer token")),
            )
                .into_response(),
        },
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Missing bearer token")),
        )
            .into_response(),
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok(format!("OK {VERSION}")))
}

/// POST /api/login - Verify credentials, issue a bearer token
async fn login(State(state): State<AppState>, Json(payload): Json<LoginRequest>) -> Response {
    let verified = {
        let conn = state.db.lock().unwrap();
        db::verify_user(&conn, &payload.username, &payload.password)
    };

    match verified {
        Ok(true) => match issue_token(&state.jwt, &payload.username) {
            Ok(token) => Json(ApiResponse::ok(LoginResponse { token })).into_response(),
            Err(e) => internal_error("issuing token", e),
        },
        Ok(false) => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Invalid username or password")),
        )
            .into_response(),
        Err(e) => internal_error("verifying login", e),
    }
}

/// GET /api/games - One page of the collection
async fn list_games(State(state): State<AppState>, Query(params): Query<PageParams>) -> Response {
    let offset = params.offset.max(0);
    let limit = params.limit.clamp(1, 200);

    let conn = state.db.lock().unwrap();

    let page = db::get_games_page(&conn, offset, limit)
        .and_then(|games| Ok((games, db::count_games(&conn)?)));

    match page {
        Ok((games, total)) => Json(ApiResponse::ok(GamePage {
            games,
            total,
            offset,
            limit,
        }))
        .into_response(),
        Err(e) => internal_error("listing games", e),
    }
}

/// POST /api/games - Catalog a new game
async fn create_game(State(state): State<AppState>, Json(mut game): Json<Game>) -> Response {
    game.init_identity();

    let conn = state.db.lock().unwrap();

    match db::insert_game(&conn, &game) {
        Ok(true) => (StatusCode::CREATED, Json(ApiResponse::ok(game))).into_response(),
        Ok(false) => (
            StatusCode::CONFLICT,
            Json(ApiResponse::error("Game already cataloged for this platform")),
        )
            .into_response(),
        Err(e) => internal_error("creating game", e),
    }
}

/// GET /api/games/:id
async fn get_game(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = state.db.lock().unwrap();

    match db::get_game(&conn, &id) {
        Ok(Some(game)) => Json(ApiResponse::ok(game)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Game not found")),
        )
            .into_response(),
        Err(e) => internal_error("getting game", e),
    }
}

/// PUT /api/games/:id - Standard field edits
async fn update_game(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(game): Json<Game>,
) -> Response {
    let conn = state.db.lock().unwrap();

    match db::update_game(&conn, &id, &game) {
        Ok(db::UpdateOutcome::Updated) => Json(ApiResponse::ok(())).into_response(),
        Ok(db::UpdateOutcome::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Game not found")),
        )
            .into_response(),
        Ok(db::UpdateOutcome::Conflict) => (
            StatusCode::CONFLICT,
            Json(ApiResponse::error("Game already cataloged for this platform")),
        )
            .into_response(),
        Err(e) => internal_error("updating game", e),
    }
}

/// DELETE /api/games/:id
async fn delete_game(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = state.db.lock().unwrap();

    match db::delete_game(&conn, &id) {
        Ok(true) => Json(ApiResponse::ok(())).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Game not found")),
        )
            .into_response(),
        Err(e) => internal_error("deleting game", e),
    }
}

/// GET /api/enrich/score/:title - Review score from the score provider
async fn enrich_score(State(state): State<AppState>, Path(title): Path<String>) -> Response {
    let title = decode_title(&title);

    match state.providers.scores.review_score(&title) {
        Ok(Some(payload)) => Json(ApiResponse::ok(payload)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("No score available for this title")),
        )
            .into_response(),
        Err(e) => internal_error("fetching score", e),
    }
}

/// GET /api/enrich/info/:title - Catalog info from the info provider
async fn enrich_info(State(state): State<AppState>, Path(title): Path<String>) -> Response {
    let title = decode_title(&title);

    match state.providers.info.game_info(&title) {
        Ok(Some(payload)) => Json(ApiResponse::ok(payload)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("No info available for this title")),
        )
            .into_response(),
        Err(e) => internal_error("fetching info", e),
    }
}

fn decode_title(raw: &str) -> String {
    urlencoding::decode(raw)
        .unwrap_or_else(|_| raw.into())
        .into_owned()
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("🌐 Game Catalog - API Server v{VERSION}");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Configuration: env overrides config file; a missing JWT secret is a
    // startup failure, not something to limp along without.
    let config = ServerConfig::load()?;
    println!("✓ Configuration loaded (issuer: {})", config.jwt.issuer);

    // Open database
    let conn = Connection::open(&config.db_path)?;
    db::setup_database(&conn)?;
    println!("✓ Database opened: {}", config.db_path);

    // Create shared state
    let db = Arc::new(Mutex::new(conn));
    let state = AppState {
        db: Arc::clone(&db),
        jwt: config.jwt.clone(),
        providers: Arc::new(ProviderRegistry::with_cache(db)),
    };

    // CORS: static dev origins + optional production CLIENT_URL. Credentials
    // are allowed, so methods/headers mirror the request instead of using
    // wildcards.
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring unparseable CORS origin: {origin}");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    // Build API routes: /health and /login are public, the rest sits behind
    // the bearer-token middleware.
    let protected = Router::new()
        .route("/games", get(list_games).post(create_game))
        .route(
            "/games/:id",
            get(get_game).put(update_game).delete(delete_game),
        )
        .route("/enrich/score/:title", get(enrich_score))
        .route("/enrich/info/:title", get(enrich_info))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/login", post(login))
        .merge(protected)
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(cors);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("\n🚀 Server running on http://localhost:{}", config.port);
    println!("   API: http://localhost:{}/api/games", config.port);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;

    Ok(())
}
