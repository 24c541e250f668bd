//! Shared fixtures for the infra integration suites.

#![allow(dead_code)]

use std::io;
use std::sync::Arc;
use std::time::Duration;

use mintflow_domain::ClientConfig;
use mintflow_infra::api::{Credentials, InMemoryCredentialStore, SessionEvent};
use mintflow_infra::MintFlowClient;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;
use wiremock::MockServer;

/// Client configuration pointed at `server` with millisecond retry delays.
pub fn test_config(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.api.base_url = server.uri();
    config.api.timeout_secs = 5;
    config.query.retry_base_delay_ms = 1;
    config.query.retry_max_delay_ms = 5;
    config
}

pub fn signed_in_store(access: &str, refresh: &str) -> Arc<InMemoryCredentialStore> {
    Arc::new(InMemoryCredentialStore::with_credentials(Credentials::new(access, refresh)))
}

/// Client using `store`, with the stored session already restored.
pub fn client_with_store(server: &MockServer, store: Arc<InMemoryCredentialStore>) -> MintFlowClient {
    let client = MintFlowClient::builder()
        .config(test_config(server))
        .credential_store(store)
        .build()
        .expect("client should build");
    client.load_credentials().expect("in-memory credentials should load");
    client
}

pub fn token_body(access: &str, refresh: Option<&str>) -> Value {
    match refresh {
        Some(refresh) => json!({"access_token": access, "refresh_token": refresh, "token_type": "bearer"}),
        None => json!({"access_token": access, "token_type": "bearer"}),
    }
}

/// Next session event, failing the test if none arrives within a second.
pub async fn next_session_event(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("session event should arrive")
        .expect("session channel should stay open")
}

/// In-memory log sink for asserting on emitted events.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Route this thread's events into a [`LogCapture`] until the guard drops.
///
/// Only sees tasks polled on the test thread, so use it from
/// current-thread `#[tokio::test]`s.
pub fn capture_logs() -> (LogCapture, DefaultGuard) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    (capture, tracing::subscriber::set_default(subscriber))
}
