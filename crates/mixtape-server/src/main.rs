use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::HeaderMap,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use mixtape_api::auth::{self, AppState, AppStateInner};
use mixtape_api::graphql::{MixtapeSchema, build_schema};
use mixtape_api::upload;

#[derive(Clone)]
struct ServerState {
    app: AppState,
    schema: MixtapeSchema,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mixtape=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("MIXTAPE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("MIXTAPE_DB_PATH").unwrap_or_else(|_| "mixtape.db".into());
    let public_dir = std::env::var("MIXTAPE_PUBLIC_DIR").unwrap_or_else(|_| "public".into());
    let host = std::env::var("MIXTAPE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("MIXTAPE_PORT")
        .unwrap_or_else(|_| "4000".into())
        .parse()?;

    // Init database
    let db = mixtape_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state + schema
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        public_dir: PathBuf::from(&public_dir),
    });
    let state = ServerState {
        app: app_state.clone(),
        schema: build_schema(app_state.clone()),
    };

    // Routes: GraphQL API, multipart upload, static file serving of the
    // public directory (uploaded files resolve at their url)
    let app = Router::new()
        .route("/graphql", get(graphiql).post(graphql_handler))
        .route(
            "/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(upload::MAX_FILE_SIZE + 1024 * 1024)),
        )
        .fallback_service(ServeDir::new(&public_dir))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Mixtape server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Single GraphQL endpoint. The bearer token is optional: a missing or
/// invalid one yields an unauthenticated context, not a transport failure.
async fn graphql_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let mut request = req.into_inner();
    if let Some(claims) = auth::identity_from_headers(&headers, &state.app.jwt_secret) {
        request = request.data(claims);
    }
    state.schema.execute(request).await.into()
}

async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

async fn upload_handler(
    State(state): State<ServerState>,
    headers: HeaderMap,
    multipart: axum::extract::Multipart,
) -> impl IntoResponse {
    upload::upload_file(State(state.app), headers, multipart).await
}
