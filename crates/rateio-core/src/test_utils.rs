//! Test utilities for rateio-core
//!
//! Provides a mock spreadsheet server that publishes a CSV export over HTTP,
//! for `HttpCsvSource` tests and server integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use axum::{extract::State, http::StatusCode, routing::get, Router};
use tokio::sync::oneshot;

/// Mock published spreadsheet
pub struct MockSheetServer {
    addr: SocketAddr,
    csv: Arc<RwLock<String>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockSheetServer {
    /// Start the mock server on an available port, serving `csv`
    pub async fn start(csv: &str) -> Self {
        let csv = Arc::new(RwLock::new(csv.to_string()));

        let app = Router::new()
            .route("/sheet.csv", get(handle_sheet))
            .route("/fail.csv", get(handle_fail))
            .with_state(csv.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            csv,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of the published CSV
    pub fn csv_url(&self) -> String {
        format!("{}/sheet.csv", self.url())
    }

    /// URL that always answers 503
    pub fn failing_url(&self) -> String {
        format!("{}/fail.csv", self.url())
    }

    /// Replace the published CSV (simulates someone editing the sheet)
    pub fn set_csv(&self, csv: &str) {
        *self.csv.write().unwrap() = csv.to_string();
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockSheetServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_sheet(State(csv): State<Arc<RwLock<String>>>) -> String {
    csv.read().unwrap().clone()
}

async fn handle_fail() -> (StatusCode, &'static str) {
    (StatusCode::SERVICE_UNAVAILABLE, "try again later")
}
