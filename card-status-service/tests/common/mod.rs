//! Common test utilities for card-status-service integration tests.

use card_status_service::config::{CardStatusConfig, DatabaseConfig, IngestConfig};
use card_status_service::models::StatusSource;
use card_status_service::startup::Application;
use service_core::config::Config as CommonConfig;
use service_core::error::AppError;
use std::path::Path;
use std::sync::Once;
use tempfile::TempDir;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,card_status_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub const PICKUP_HEADER: &str = "ID,Card ID,User contact,Timestamp";
pub const DELIVERED_HEADER: &str = "ID,Card ID,User Mobile,Timestamp";
pub const REDELIVERY_HEADER: &str = "ID,Card ID,User contact,Timestamp";
pub const RETURNED_HEADER: &str = "ID,Card ID,User contact,Timestamp";

/// CSV rows (headers excluded) for each of the four source files.
#[derive(Default)]
pub struct Fixtures {
    pub pickup: Vec<String>,
    pub delivered: Vec<String>,
    pub redelivery: Vec<String>,
    pub returned: Vec<String>,
}

pub fn csv_file(header: &str, rows: &[String]) -> String {
    let mut out = String::from(header);
    out.push('\n');
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    out
}

/// The four source files, with the default headers, for a fixture set.
pub fn source_files(fixtures: &Fixtures) -> Vec<(&'static str, String)> {
    vec![
        (
            StatusSource::Pickup.file_name(),
            csv_file(PICKUP_HEADER, &fixtures.pickup),
        ),
        (
            StatusSource::Delivered.file_name(),
            csv_file(DELIVERED_HEADER, &fixtures.delivered),
        ),
        (
            StatusSource::Redelivery.file_name(),
            csv_file(REDELIVERY_HEADER, &fixtures.redelivery),
        ),
        (
            StatusSource::Returned.file_name(),
            csv_file(RETURNED_HEADER, &fixtures.returned),
        ),
    ]
}

/// Write source files into a fresh temporary data directory.
pub fn write_sources(files: &[(&str, String)]) -> TempDir {
    let data_dir = TempDir::new().expect("Failed to create data dir");
    for (name, contents) in files {
        std::fs::write(data_dir.path().join(name), contents).expect("Failed to write fixture");
    }
    data_dir
}

/// Test configuration pointing at a store file inside the data directory.
pub fn test_config(data_dir: &Path) -> CardStatusConfig {
    CardStatusConfig {
        common: CommonConfig {
            port: 0,
            log_level: "debug".to_string(),
        },
        service_name: "card-status-service-test".to_string(),
        database: DatabaseConfig {
            url: format!(
                "sqlite://{}?mode=rwc",
                data_dir.join("card_status.db").display()
            ),
            max_connections: 2,
        },
        ingest: IngestConfig {
            data_dir: data_dir.to_path_buf(),
        },
    }
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub port: u16,
    // Keeps the data directory (CSV fixtures + store file) alive.
    _data_dir: TempDir,
}

/// Spawn a test application over the given fixtures.
pub async fn spawn_app(fixtures: Fixtures) -> TestApp {
    try_spawn_app(source_files(&fixtures))
        .await
        .expect("Failed to build application")
}

/// Spawn over raw source files; build errors are returned, not unwrapped.
pub async fn try_spawn_app(files: Vec<(&str, String)>) -> Result<TestApp, AppError> {
    init_tracing();

    let data_dir = write_sources(&files);
    let app = Application::build(test_config(data_dir.path())).await?;
    let port = app.port();
    let address = format!("http://127.0.0.1:{}", port);

    // Start the application in the background
    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    // Wait for the server to be ready with retry
    let client = reqwest::Client::new();
    let mut attempts = 0;
    loop {
        match client.get(format!("{}/ready", address)).send().await {
            Ok(_) => break,
            Err(_) if attempts < 20 => {
                attempts += 1;
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }
            Err(e) => panic!("Server not ready after 20 attempts: {}", e),
        }
    }

    Ok(TestApp {
        address,
        port,
        _data_dir: data_dir,
    })
}
