/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use kanban_api::{app::{build_router, AppState}, config::Config};
/// use kanban_shared::db::pool::create_pool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.pool_config()).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use kanban_shared::auth::middleware::authenticate;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the router with all routes and middleware
///
/// ```text
/// /health                                      public
/// /api/auth/registration    POST               public
/// /api/auth/login           POST               public
/// /api/auth/refresh         POST               public
/// /api/auth/email-check     GET                public
/// /api/boards               GET POST           bearer
/// /api/boards/:board_id     GET PUT PATCH DELETE
/// /api/boards/:board_id/members          POST
/// /api/boards/:board_id/members/:user_id DELETE
/// /api/tasks                POST
/// /api/tasks/assigned-to-me GET
/// /api/tasks/reviewing      GET
/// /api/tasks/:task_id       GET PUT PATCH DELETE
/// /api/tasks/:task_id/comments             GET POST
/// /api/tasks/:task_id/comments/:comment_id GET PUT PATCH DELETE
/// ```
///
/// Layers, outermost first: security headers, CORS, request tracing.
/// Bearer authentication is a route layer on the protected routes, so an
/// unknown path is a 404 rather than a 401.
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{auth, boards, comments, health, tasks};

    let auth_routes = Router::new()
        .route("/registration", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/email-check", get(auth::email_check));

    let protected_routes = Router::new()
        .route("/boards", get(boards::list_boards).post(boards::create_board))
        .route(
            "/boards/:board_id",
            get(boards::get_board)
                .put(boards::update_board)
                .patch(boards::update_board)
                .delete(boards::delete_board),
        )
        .route("/boards/:board_id/members", post(boards::add_member))
        .route(
            "/boards/:board_id/members/:user_id",
            axum::routing::delete(boards::remove_member),
        )
        .route("/tasks", post(tasks::create_task))
        .route("/tasks/assigned-to-me", get(tasks::assigned_to_me))
        .route("/tasks/reviewing", get(tasks::reviewing))
        .route(
            "/tasks/:task_id",
            get(tasks::get_task)
                .put(tasks::update_task)
                .patch(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route(
            "/tasks/:task_id/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/tasks/:task_id/comments/:comment_id",
            get(comments::get_comment)
                .put(comments::update_comment)
                .patch(comments::update_comment)
                .delete(comments::delete_comment),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Validates the bearer token and stores the caller's `AuthContext`
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = authenticate(req.headers(), state.jwt_secret())?;
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}
