use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Json, Router};
use clap::Parser;
use fileclip_db::{Database, SqliteDatabase};
use fileclip_service::{
    AttachmentStorage, Capabilities, ClipService, DbJobQueue, Dispatcher, HttpMetadataFetcher,
    MirroredStorage, RemoteOnly, Worker,
};
use fileclip_store::{create_store, StoreConfig};
use fileclip_worker::config::WorkerConfig;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = WorkerConfig::parse();
    info!("fileclip-worker starting");

    let db: Arc<dyn Database> = Arc::new(SqliteDatabase::open(&config.db_config())?);
    let fetcher = Arc::new(HttpMetadataFetcher::with_timeout(config.http_timeout())?);

    let storage: Arc<dyn AttachmentStorage> = if config.mirror {
        let store = create_store(&StoreConfig::from_env()?)?;
        let client = reqwest_client(&config)?;
        Arc::new(MirroredStorage::with_client(store, client))
    } else {
        Arc::new(RemoteOnly)
    };

    let capabilities =
        Capabilities::none().with_job_backend(Arc::new(DbJobQueue::new(db.clone())));
    let mut builder = Dispatcher::builder(db.clone(), fetcher)
        .capabilities(Arc::new(capabilities))
        .storage(storage);
    for clip in &config.clips {
        info!("processing {} into '{}'", clip.type_name, clip.attachment_name);
        builder = builder.clip(&clip.type_name, clip.to_config());
    }
    let dispatcher = Arc::new(builder.build()?);
    let service = Arc::new(ClipService::new(db, dispatcher));

    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = run_health_server(health_port).await {
            error!("health server failed: {e}");
        }
    });
    info!("health endpoint: http://127.0.0.1:{health_port}/health");
    info!(
        "entering poll loop (interval: {}s, stale after: {}s)",
        config.poll_interval, config.stale_after
    );

    Worker::new(service, config.poll_interval())
        .with_stale_after(config.stale_after())
        .with_max_attempts(config.max_attempts)
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;
    Ok(())
}

fn reqwest_client(config: &WorkerConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()?)
}

async fn run_health_server(port: u16) -> Result<()> {
    let app = Router::new().route(
        "/health",
        get(|| async { Json(json!({"status": "ok", "role": "worker"})) }),
    );

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
