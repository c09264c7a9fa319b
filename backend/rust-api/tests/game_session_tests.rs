use axum::http::StatusCode;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;

mod common;

use common::{create_request, create_test_app, pdf_item, sequencing_item, word_item};

#[tokio::test]
async fn test_sequencing_two_students_five_items() {
    let items = (1..=5)
        .map(|i| sequencing_item(&format!("seq-{}", i), &["b.png", "a.png"]))
        .collect();
    let app = create_test_app(items);

    let session = app.create_session("sequencing", &["A", "B"]).await;
    let id = session["id"].as_str().unwrap().to_string();
    assert_eq!(session["progress"]["total"], 4);
    assert_eq!(session["active_participant"]["session_participant_id"], "A");
    assert_eq!(session["current_item"]["id"], "seq-1");
    assert_eq!(session["current_item"]["slots"], 2);
    assert_eq!(session["phase"], "active");

    let uri = format!("/api/v1/game-sessions/{}/ordering", id);

    let (status, body) = app
        .send("POST", &uri, Some(json!({ "slots": ["b.png", null] })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feedback"]["outcome"], "incomplete");
    assert_eq!(body["feedback"]["check"]["filled_positions"], json!([0]));

    let (_, body) = app
        .send("POST", &uri, Some(json!({ "slots": ["a.png", "b.png"] })))
        .await;
    assert_eq!(body["feedback"]["outcome"], "incorrect");
    assert_eq!(body["feedback"]["incorrect_attempts"], 1);
    assert_eq!(
        body["session"]["active_participant"]["session_participant_id"],
        "A"
    );

    app.clock.advance_secs(4);
    let (_, body) = app
        .send("POST", &uri, Some(json!({ "slots": ["b.png", "a.png"] })))
        .await;
    assert_eq!(body["feedback"]["outcome"], "correct");
    assert_eq!(body["feedback"]["incorrect_attempts"], 1);
    assert_eq!(body["feedback"]["elapsed_seconds"], 4);
    assert_eq!(body["session"]["phase"], "celebrating");
    assert_eq!(body["session"]["progress"]["completed"], 1);

    app.clock.advance(Duration::from_millis(1500));
    let (status, view) = app
        .send("GET", &format!("/api/v1/game-sessions/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["active_participant"]["session_participant_id"], "B");
    assert_eq!(view["current_item"]["id"], "seq-2");
    assert_eq!(view["badges"][0]["completed_by"][0]["session_participant_id"], "A");
    assert_eq!(view["badges"][0]["completed_by"][0]["incorrect_attempts"], 1);
}

#[tokio::test]
async fn test_game_type_is_forwarded_to_content_query() {
    let app = create_test_app(vec![word_item("w1", "cow")]);
    app.create_session("image_matching", &["A"]).await;

    let query = app.content.last_query.lock().unwrap().clone().unwrap();
    assert_eq!(query.theme_id, "farm-animals");
    assert_eq!(
        query.game_type,
        Some(therapy_games_api::engine::GameKind::ImageMatching)
    );
}

#[tokio::test]
async fn test_answer_is_case_insensitive_and_finishes_session() {
    let app = create_test_app(vec![word_item("w1", "Cow"), word_item("w2", "Pig")]);
    let session = app.create_session("image_matching", &["A", "B"]).await;
    let id = session["id"].as_str().unwrap();
    let uri = format!("/api/v1/game-sessions/{}/answer", id);

    let (_, body) = app.send("POST", &uri, Some(json!({ "answer": " cow " }))).await;
    assert_eq!(body["feedback"]["outcome"], "correct");
    assert_eq!(
        body["session"]["active_participant"]["session_participant_id"],
        "B"
    );

    let (_, body) = app.send("POST", &uri, Some(json!({ "answer": "PIG" }))).await;
    assert_eq!(body["session"]["phase"], "finished");
    assert_eq!(body["session"]["progress"]["fraction"], 1.0);

    let (status, _) = app.send("POST", &uri, Some(json!({ "answer": "pig" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_pdf_only_pool_is_unprocessable() {
    let app = create_test_app(vec![pdf_item("p1"), pdf_item("p2")]);
    let (status, body) = app
        .send(
            "POST",
            "/api/v1/game-sessions",
            Some(create_request("flashcard", &["A"], None)),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.as_str().unwrap().contains("No usable content"));
}

#[tokio::test]
async fn test_empty_roster_is_rejected() {
    let app = create_test_app(vec![word_item("w1", "cow")]);
    let (status, _) = app
        .send(
            "POST",
            "/api/v1/game-sessions",
            Some(create_request("flashcard", &[], None)),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_content_fetch_failure_is_bad_gateway() {
    let app = create_test_app(vec![word_item("w1", "cow")]);
    app.content.fail.store(true, Ordering::SeqCst);
    let (status, _) = app
        .send(
            "POST",
            "/api/v1/game-sessions",
            Some(create_request("flashcard", &["A"], None)),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_wrong_interaction_is_bad_request() {
    let app = create_test_app(vec![word_item("w1", "cow")]);
    let session = app.create_session("image_matching", &["A"]).await;
    let id = session["id"].as_str().unwrap();

    let (status, body) = app
        .send("POST", &format!("/api/v1/game-sessions/{}/spin", id), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.as_str().unwrap().contains("image_matching"));
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = create_test_app(vec![]);
    let (status, _) = app
        .send("GET", "/api/v1/game-sessions/does-not-exist", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_replay_overwrites_previous_attempt() {
    let app = create_test_app(vec![word_item("w1", "cow")]);
    let session = app.create_session("flashcard", &["A"]).await;
    let id = session["id"].as_str().unwrap();

    let mark = format!("/api/v1/game-sessions/{}/mark", id);
    app.send("POST", &mark, Some(json!({ "correct": false }))).await;
    let (_, body) = app.send("POST", &mark, Some(json!({ "correct": true }))).await;
    assert_eq!(body["session"]["phase"], "finished");

    let (status, view) = app
        .send("POST", &format!("/api/v1/game-sessions/{}/replay", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["phase"], "active");
    assert_eq!(view["current_item"]["previous_result"]["completed"], false);
    assert_eq!(view["current_item"]["previous_result"]["incorrect_attempts"], 0);
    assert!(view["badges"][0]["completed_by"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_abandon_drops_unsaved_results() {
    let app = create_test_app(vec![word_item("w1", "cow"), word_item("w2", "pig")]);
    let session = app.create_session("flashcard", &["A"]).await;
    let id = session["id"].as_str().unwrap();

    app.send(
        "POST",
        &format!("/api/v1/game-sessions/{}/answer", id),
        Some(json!({ "answer": "cow" })),
    )
    .await;

    let (status, body) = app
        .send("DELETE", &format!("/api/v1/game-sessions/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unsaved_results"], 1);
    assert!(app.sink.attempts.lock().unwrap().is_empty());

    let (status, _) = app
        .send("GET", &format!("/api/v1/game-sessions/{}", id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_reports_active_sessions() {
    let app = create_test_app(vec![word_item("w1", "cow")]);
    app.create_session("flashcard", &["A"]).await;

    let (status, body) = app.send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["active_game_sessions"], 1);
}
