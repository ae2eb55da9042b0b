mod common;

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::StatusCode;

// ---------------------------------------------------------------------------
// POST /auth/register
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_creates_user_without_exposing_hash() {
    let (server, _state, _store) = common::test_server();

    let resp = server
        .post("/auth/register")
        .json(&serde_json::json!({
            "email": "Maria@PetLink.test",
            "name": "Maria",
            "password": "secret123",
        }))
        .await;

    resp.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Usuário criado com sucesso");
    assert_eq!(body["data"]["email"], "maria@petlink.test");
    assert_eq!(body["data"]["name"], "Maria");
    assert!(body["data"]["id"].as_str().unwrap().starts_with("usr_"));
    assert!(body["data"].get("password").is_none());
    assert!(body["data"].get("passwordHash").is_none());
}

#[tokio::test]
async fn register_validates_fields() {
    let (server, _state, _store) = common::test_server();

    let resp = server
        .post("/auth/register")
        .json(&serde_json::json!({ "email": "not-an-email", "password": "123" }))
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["error"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"password"));
}

#[tokio::test]
async fn register_duplicate_email_conflicts() {
    let (server, _state, store) = common::test_server();
    common::seed_user(&store, "dup@petlink.test", "First").await;

    let resp = server
        .post("/auth/register")
        .json(&serde_json::json!({
            "email": "dup@petlink.test",
            "password": "secret123",
        }))
        .await;

    resp.assert_status(StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// POST /auth/login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_sets_signed_session_cookie() {
    let (server, _state, store) = common::test_server();
    let user = common::seed_user(&store, "login@petlink.test", "Login").await;

    let resp = server
        .post("/auth/login")
        .json(&serde_json::json!({
            "email": "login@petlink.test",
            "password": common::TEST_PASSWORD,
        }))
        .await;

    resp.assert_status_ok();

    let set_cookie = resp.header("set-cookie");
    let set_cookie = set_cookie.to_str().unwrap();
    assert!(set_cookie.starts_with("token=s%3A"), "signed cookie: {set_cookie}");
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
    assert!(!set_cookie.contains("Secure"));

    let body: serde_json::Value = resp.json();
    assert_eq!(body["message"], "Login realizado com sucesso");
    assert_eq!(body["data"]["user"]["id"], user.id.as_str());
    assert!(!body["data"]["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn login_cookie_expires_with_the_session_token() {
    let store = std::sync::Arc::new(petlink_api::db::memory::MemoryStore::new());
    let config = petlink_api::config::Config {
        session_ttl_secs: 3600,
        ..common::test_config()
    };
    let state = petlink_api::AppState::new(store.clone(), config);
    let server = axum_test::TestServer::new(petlink_api::app(state)).unwrap();
    common::seed_user(&store, "ttl@petlink.test", "Ttl").await;

    let resp = server
        .post("/auth/login")
        .json(&serde_json::json!({
            "email": "ttl@petlink.test",
            "password": common::TEST_PASSWORD,
        }))
        .await;

    resp.assert_status_ok();
    let set_cookie = resp.header("set-cookie");
    assert!(set_cookie.to_str().unwrap().contains("; Max-Age=3600;"));
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() {
    let (server, _state, store) = common::test_server();
    common::seed_user(&store, "wrong@petlink.test", "Wrong").await;

    for body in [
        serde_json::json!({ "email": "wrong@petlink.test", "password": "nope-nope" }),
        serde_json::json!({ "email": "missing@petlink.test", "password": "secret123" }),
    ] {
        let resp = server.post("/auth/login").json(&body).await;
        resp.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = resp.json();
        assert_eq!(body["error"]["message"], "Credenciais inválidas");
    }
}

// ---------------------------------------------------------------------------
// GET /auth/me
// ---------------------------------------------------------------------------

#[tokio::test]
async fn me_accepts_bearer_token() {
    let (server, _state, store) = common::test_server();
    let user = common::seed_user(&store, "me@petlink.test", "Me").await;
    let token = common::mint_token(&user.id);

    let resp = server
        .get("/auth/me")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["data"]["id"], user.id.as_str());
    assert_eq!(body["data"]["email"], "me@petlink.test");
}

#[tokio::test]
async fn me_accepts_signed_cookie() {
    let (server, _state, store) = common::test_server();
    let user = common::seed_user(&store, "cookie@petlink.test", "Cookie").await;
    let token = common::mint_token(&user.id);

    let resp = server
        .get("/auth/me")
        .add_header(COOKIE, common::session_cookie(&token))
        .await;

    resp.assert_status_ok();
    assert_eq!(resp.json::<serde_json::Value>()["data"]["id"], user.id.as_str());
}

#[tokio::test]
async fn me_rejects_missing_expired_and_tampered_credentials() {
    let (server, _state, store) = common::test_server();
    let user = common::seed_user(&store, "rej@petlink.test", "Rej").await;

    let resp = server.get("/auth/me").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.json::<serde_json::Value>()["error"]["message"],
        "Token de acesso requerido"
    );

    let expired = common::mint_expired_token(&user.id);
    let resp = server
        .get("/auth/me")
        .add_header(AUTHORIZATION, format!("Bearer {expired}"))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.json::<serde_json::Value>()["error"]["message"],
        "Token expirado"
    );

    // A signed cookie whose signature does not verify counts as absent.
    let token = common::mint_token(&user.id);
    let resp = server
        .get("/auth/me")
        .add_header(COOKIE, format!("token=s%3A{token}.forged"))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.json::<serde_json::Value>()["error"]["message"],
        "Token de acesso requerido"
    );
}

#[tokio::test]
async fn logout_clears_cookie() {
    let (server, _state, _store) = common::test_server();

    let resp = server.post("/auth/logout").await;

    resp.assert_status_ok();
    let set_cookie = resp.header("set-cookie");
    assert!(set_cookie.to_str().unwrap().starts_with("token=;"));
}

#[tokio::test]
async fn health_reports_environment() {
    let (server, _state, _store) = common::test_server();

    let resp = server.get("/health").await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["environment"], "development");
}
