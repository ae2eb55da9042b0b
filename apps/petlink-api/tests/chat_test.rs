mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;

async fn open_conversation(server: &TestServer, token: &str, body: serde_json::Value) -> String {
    let resp = server
        .post("/chat/conversations")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&body)
        .await;
    resp.assert_status_ok();
    resp.json::<serde_json::Value>()["data"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

// ---------------------------------------------------------------------------
// POST /chat/conversations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_conversation_from_pet_is_idempotent() {
    let (server, _state, store) = common::test_server();
    let adoption = common::seed_adoption(&store).await;
    let adopter_token = common::mint_token(&adoption.adopter.id);

    let resp = server
        .post("/chat/conversations")
        .add_header(AUTHORIZATION, format!("Bearer {adopter_token}"))
        .json(&serde_json::json!({ "petId": adoption.pet_id }))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["message"], "Conversa pronta");
    let conversation_id = body["data"]["id"].as_str().unwrap().to_string();
    assert!(conversation_id.starts_with("conv_"));
    let participants: Vec<&str> = body["data"]["participants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["userId"].as_str().unwrap())
        .collect();
    assert!(participants.contains(&adoption.tutor.id.as_str()));
    assert!(participants.contains(&adoption.adopter.id.as_str()));

    // The adoption process names the same pair, so the tutor gets the same
    // conversation back.
    let tutor_token = common::mint_token(&adoption.tutor.id);
    let again = open_conversation(
        &server,
        &tutor_token,
        serde_json::json!({ "adoptionProcessId": adoption.process_id }),
    )
    .await;
    assert_eq!(again, conversation_id);
}

#[tokio::test]
async fn create_conversation_rejects_bad_subjects() {
    let (server, _state, store) = common::test_server();
    let adoption = common::seed_adoption(&store).await;
    let tutor_token = common::mint_token(&adoption.tutor.id);

    let resp = server
        .post("/chat/conversations")
        .add_header(AUTHORIZATION, format!("Bearer {tutor_token}"))
        .json(&serde_json::json!({ "petId": adoption.pet_id }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = server
        .post("/chat/conversations")
        .add_header(AUTHORIZATION, format!("Bearer {tutor_token}"))
        .json(&serde_json::json!({ "petId": "pet_missing" }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);

    let resp = server
        .post("/chat/conversations")
        .add_header(AUTHORIZATION, format!("Bearer {tutor_token}"))
        .json(&serde_json::json!({}))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.json::<serde_json::Value>()["error"]["code"],
        "VALIDATION_ERROR"
    );
}

#[tokio::test]
async fn chat_routes_require_authentication() {
    let (server, _state, _store) = common::test_server();

    let resp = server.get("/chat/conversations").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    let resp = server
        .post("/chat/conversations/conv_x/messages")
        .json(&serde_json::json!({ "content": "oi" }))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// GET /chat/conversations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_conversations_includes_last_message_and_pagination() {
    let (server, _state, store) = common::test_server();
    let adoption = common::seed_adoption(&store).await;
    let adopter_token = common::mint_token(&adoption.adopter.id);

    open_conversation(
        &server,
        &adopter_token,
        serde_json::json!({
            "petId": adoption.pet_id,
            "initialMessage": "Olá! Ele ainda está disponível?",
        }),
    )
    .await;

    let tutor_token = common::mint_token(&adoption.tutor.id);
    let resp = server
        .get("/chat/conversations")
        .add_header(AUTHORIZATION, format!("Bearer {tutor_token}"))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["message"], "Conversas obtidas");
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["limit"], 10);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["pagination"]["totalPages"], 1);
    let conversation = &body["data"][0];
    assert_eq!(
        conversation["lastMessage"]["content"],
        "Olá! Ele ainda está disponível?"
    );
    assert_eq!(conversation["participants"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn list_conversations_rejects_out_of_range_limit() {
    let (server, _state, store) = common::test_server();
    let user = common::seed_user(&store, "limit@petlink.test", "Limit").await;
    let token = common::mint_token(&user.id);

    for query in ["limit=101", "limit=0", "page=0"] {
        let resp = server
            .get(&format!("/chat/conversations?{query}"))
            .add_header(AUTHORIZATION, format!("Bearer {token}"))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }
}

// ---------------------------------------------------------------------------
// /chat/conversations/{id}/messages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn messages_are_listed_in_requested_order() {
    let (server, _state, store) = common::test_server();
    let adoption = common::seed_adoption(&store).await;
    let adopter_token = common::mint_token(&adoption.adopter.id);
    let tutor_token = common::mint_token(&adoption.tutor.id);

    let conversation_id = open_conversation(
        &server,
        &adopter_token,
        serde_json::json!({ "petId": adoption.pet_id }),
    )
    .await;

    for (token, content) in [(&adopter_token, "primeira"), (&tutor_token, "segunda")] {
        let resp = server
            .post(&format!("/chat/conversations/{conversation_id}/messages"))
            .add_header(AUTHORIZATION, format!("Bearer {token}"))
            .json(&serde_json::json!({ "content": content }))
            .await;
        resp.assert_status_ok();
        assert_eq!(resp.json::<serde_json::Value>()["message"], "Mensagem enviada");
    }

    let resp = server
        .get(&format!("/chat/conversations/{conversation_id}/messages"))
        .add_header(AUTHORIZATION, format!("Bearer {tutor_token}"))
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["limit"], 20);
    assert_eq!(body["data"][0]["content"], "primeira");
    assert_eq!(body["data"][1]["content"], "segunda");
    assert_eq!(body["data"][1]["senderId"], adoption.tutor.id.as_str());

    let resp = server
        .get(&format!(
            "/chat/conversations/{conversation_id}/messages?sortOrder=desc&limit=1"
        ))
        .add_header(AUTHORIZATION, format!("Bearer {tutor_token}"))
        .await;
    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["content"], "segunda");
    assert_eq!(body["pagination"]["totalPages"], 2);
}

#[tokio::test]
async fn non_participant_cannot_read_or_send() {
    let (server, _state, store) = common::test_server();
    let adoption = common::seed_adoption(&store).await;
    let outsider = common::seed_user(&store, "outsider@petlink.test", "Outsider").await;
    let adopter_token = common::mint_token(&adoption.adopter.id);
    let outsider_token = common::mint_token(&outsider.id);

    let conversation_id = open_conversation(
        &server,
        &adopter_token,
        serde_json::json!({ "petId": adoption.pet_id }),
    )
    .await;

    let resp = server
        .get(&format!("/chat/conversations/{conversation_id}/messages"))
        .add_header(AUTHORIZATION, format!("Bearer {outsider_token}"))
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        resp.json::<serde_json::Value>()["error"]["message"],
        "Acesso negado à conversa"
    );

    let resp = server
        .post(&format!("/chat/conversations/{conversation_id}/messages"))
        .add_header(AUTHORIZATION, format!("Bearer {outsider_token}"))
        .json(&serde_json::json!({ "content": "intruso" }))
        .await;
    resp.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn send_message_validates_content() {
    let (server, _state, store) = common::test_server();
    let adoption = common::seed_adoption(&store).await;
    let adopter_token = common::mint_token(&adoption.adopter.id);

    let conversation_id = open_conversation(
        &server,
        &adopter_token,
        serde_json::json!({ "petId": adoption.pet_id }),
    )
    .await;

    for content in [String::new(), "a".repeat(2001)] {
        let resp = server
            .post(&format!("/chat/conversations/{conversation_id}/messages"))
            .add_header(AUTHORIZATION, format!("Bearer {adopter_token}"))
            .json(&serde_json::json!({ "content": content }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }
}
