use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use orgchart::api::HasPool;

#[derive(Clone)]
struct DemoApp {
    pool: Arc<PgPool>,
}

impl HasPool for DemoApp {
    fn pool(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let database_url = env::var("DATABASE_URL")
        .context("DATABASE_URL is required to run demos/orgchart_api_server.rs")?;
    let bind = env::var("ORGCHART_DEMO_BIND").unwrap_or_else(|_| "127.0.0.1:4020".to_string());
    let bind_addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid ORGCHART_DEMO_BIND '{}'", bind))?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to postgres")?;

    orgchart::db::create_orgchart_tables(&pool)
        .await
        .context("failed to run orgchart migrations")?;

    let app_state = DemoApp {
        pool: Arc::new(pool),
    };

    let api_v1 = Router::new()
        .route("/healthz", get(health_handler))
        .merge(orgchart::api::routes::<DemoApp>());

    let app = Router::new().nest("/api/v1", api_v1).with_state(app_state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", bind_addr))?;

    println!("orgchart demo server listening on http://{}", bind_addr);
    println!("api base path: /api/v1");

    axum::serve(listener, app)
        .await
        .context("demo server failed")
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true
    }))
}
