#![allow(dead_code)]

use grants_backend_lib::commands::{build_router, AppState};
use grants_backend_lib::services::auth::encrypt_service_token;
use grants_backend_lib::services::config::{LockConfig, ServiceAuthConfig};
use grants_backend_lib::services::lock::{LockTokenCodec, ReadLockPolicy};
use secrecy::SecretString;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

static INIT: Once = Once::new();

pub const LOCK_SECRET: &str = "integration-lock-secret";
pub const SERVICE_TOKEN: &str = "integration-service-token";
pub const SERVICE_PASSPHRASE: &str = "integration-passphrase";

pub struct TestContext {
    pub pool: Pool<Sqlite>,
}

fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub async fn init_test_db() -> TestContext {
    init_logging();

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    TestContext { pool }
}

/// Independent pool over a database file, as a separate service instance would open it.
pub async fn file_pool(path: &Path, max_connections: u32) -> Pool<Sqlite> {
    init_logging();

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .expect("Failed to open database file");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub fn lock_config(read_policy: ReadLockPolicy) -> LockConfig {
    LockConfig {
        secret: SecretString::from(LOCK_SECRET),
        ttl: chrono::Duration::hours(4),
        read_policy,
        sweep_interval: None,
    }
}

pub fn codec() -> LockTokenCodec {
    LockTokenCodec::new(SecretString::from(LOCK_SECRET))
}

/// A running server on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub pool: Pool<Sqlite>,
    pub client: reqwest::Client,
    pub auth_header: String,
    pub codec: LockTokenCodec,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(ReadLockPolicy::AcquireOrRefresh).await
    }

    pub async fn start_with(read_policy: ReadLockPolicy) -> Self {
        let pool = init_test_db().await.pool;
        let auth = ServiceAuthConfig {
            token: Some(SecretString::from(SERVICE_TOKEN)),
            encryption_key: Some(SecretString::from(SERVICE_PASSPHRASE)),
        };
        let state = AppState::new(pool.clone(), &lock_config(read_policy), &auth);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, build_router(state))
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await;
        });

        let encoded = encrypt_service_token(SERVICE_TOKEN, &SecretString::from(SERVICE_PASSPHRASE))
            .expect("encrypt service token");

        Self {
            addr,
            pool,
            client: reqwest::Client::new(),
            auth_header: format!("Bearer {encoded}"),
            codec: codec(),
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn owner_token(&self, user: &str, sbi: &str, grant_code: &str, version: i64) -> String {
        self.codec
            .issue_owner_token(user, sbi, grant_code, version)
            .expect("owner token")
    }

    pub fn release_token(&self, user: &str) -> String {
        self.codec.issue_release_token(user).expect("release token")
    }

    /// Request builder with service auth already attached.
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("authorization", &self.auth_header)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}
