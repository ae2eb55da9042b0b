#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum_test::TestServer;
use petlink_api::auth::{cookie, password, tokens};
use petlink_api::config::{Config, Environment, DEFAULT_SESSION_TTL_SECS};
use petlink_api::db::memory::MemoryStore;
use petlink_api::db::store::ChatStore;
use petlink_api::models::user::UserRecord;
use petlink_api::AppState;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_COOKIE_SECRET: &str = "test-cookie-secret";
pub const TEST_PASSWORD: &str = "secret123";

pub fn test_config() -> Config {
    Config {
        database_url: None,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        cookie_secret: TEST_COOKIE_SECRET.to_string(),
        port: 0,
        environment: Environment::Development,
        session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
    }
}

/// Build a test AppState over a fresh in-memory store. The store handle is
/// returned as well so tests can seed pets and adoption processes.
pub fn test_state() -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), test_config());
    (state, store)
}

/// In-process server for REST tests.
pub fn test_server() -> (TestServer, AppState, Arc<MemoryStore>) {
    let (state, store) = test_state();
    let server = TestServer::new(petlink_api::app(state.clone())).unwrap();
    (server, state, store)
}

/// Start an actual TCP server for socket tests. The server runs in the
/// background for the rest of the test.
pub async fn start_server() -> (SocketAddr, AppState, Arc<MemoryStore>) {
    let (state, store) = test_state();
    let addr = serve(state.clone()).await;
    (addr, state, store)
}

/// Serve `state` on an ephemeral local port.
pub async fn serve(state: AppState) -> SocketAddr {
    let app = petlink_api::app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Create a user with [`TEST_PASSWORD`] directly in the store.
pub async fn seed_user(store: &MemoryStore, email: &str, name: &str) -> UserRecord {
    let hash = password::hash_password(TEST_PASSWORD).expect("hash");
    store
        .create_user(email, Some(name), &hash)
        .await
        .expect("create user")
}

pub fn mint_token(user_id: &str) -> String {
    tokens::mint_session_token(TEST_JWT_SECRET, user_id, DEFAULT_SESSION_TTL_SECS)
        .expect("mint token")
}

pub fn mint_expired_token(user_id: &str) -> String {
    tokens::mint_session_token(TEST_JWT_SECRET, user_id, -60).expect("mint token")
}

/// `Cookie` header value carrying a signed session token, as a browser
/// would send it back after login.
pub fn session_cookie(token: &str) -> String {
    let set_cookie = cookie::session_set_cookie(token, TEST_COOKIE_SECRET, false, DEFAULT_SESSION_TTL_SECS);
    set_cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

/// Tutor owning `pet_1`, adopter with process `adp_1` on it.
pub struct Adoption {
    pub tutor: UserRecord,
    pub adopter: UserRecord,
    pub pet_id: &'static str,
    pub process_id: &'static str,
}

pub async fn seed_adoption(store: &MemoryStore) -> Adoption {
    let tutor = seed_user(store, "tutor@petlink.test", "Tutor").await;
    let adopter = seed_user(store, "adopter@petlink.test", "Adopter").await;
    store.insert_pet("pet_1", &tutor.id);
    store.insert_adoption_process("adp_1", "pet_1", &adopter.id);
    Adoption {
        tutor,
        adopter,
        pet_id: "pet_1",
        process_id: "adp_1",
    }
}
