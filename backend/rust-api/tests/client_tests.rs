use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use therapy_games_api::{
    clients::{RestContentClient, RestResultClient},
    engine::{
        AnswerRepresentation, ContentQuery, ContentSource, GameKind, ParticipantBatch,
        ParticipantTuple, ResultSink,
    },
    utils::retry::RetryConfig,
};

#[derive(Default)]
struct FakeUpstream {
    queries: Mutex<Vec<HashMap<String, String>>>,
    posted: Mutex<Vec<Value>>,
    reject_results: Mutex<bool>,
}

async fn content_handler(
    State(upstream): State<Arc<FakeUpstream>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    upstream.queries.lock().unwrap().push(params);
    Json(json!([
        {
            "id": "c-1",
            "question": "Order the steps",
            "answer": "[\"wake.png\",\"dress.png\"]",
            "options": ["dress.png", "wake.png"],
            "option_urls": ["https://cdn/dress.png", "https://cdn/wake.png"],
            "exercise_type": "game",
            "category": "sequencing",
            "difficulty_level": 1
        },
        {
            "id": "c-2",
            "question": "Worksheet",
            "answer": "n/a",
            "exercise_type": "pdf"
        }
    ]))
}

async fn results_handler(
    State(upstream): State<Arc<FakeUpstream>>,
    Json(body): Json<Value>,
) -> StatusCode {
    if *upstream.reject_results.lock().unwrap() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    upstream.posted.lock().unwrap().push(body);
    StatusCode::CREATED
}

async fn spawn_upstream() -> (String, Arc<FakeUpstream>) {
    let upstream = Arc::new(FakeUpstream::default());
    let app = Router::new()
        .route("/content", get(content_handler))
        .route("/api/session-results/bulk", post(results_handler))
        .with_state(upstream.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), upstream)
}

fn query() -> ContentQuery {
    ContentQuery {
        theme_id: "morning-routine".into(),
        difficulty_level: 1,
        category: "sequencing".into(),
        question_type: "order".into(),
        game_type: Some(GameKind::Sequencing),
        limit: Some(10),
    }
}

#[tokio::test]
async fn test_content_client_sends_query_and_maps_records() {
    let (base_url, upstream) = spawn_upstream().await;
    let client = RestContentClient::new(base_url, Duration::from_secs(2));

    let items = client.fetch(&query()).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(
        items[0].answer,
        AnswerRepresentation::Ordered(vec!["wake.png".into(), "dress.png".into()])
    );
    assert!(items[0].is_playable());
    assert!(!items[1].is_playable());

    let queries = upstream.queries.lock().unwrap();
    assert_eq!(queries[0]["theme_id"], "morning-routine");
    assert_eq!(queries[0]["game_type"], "sequencing");
    assert_eq!(queries[0]["limit"], "10");
}

#[tokio::test]
async fn test_content_client_gives_up_after_retries() {
    let client = RestContentClient::new("http://127.0.0.1:9", Duration::from_millis(200))
        .with_retry(RetryConfig {
            max_attempts: 2,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            jitter_max: None,
        });
    assert!(client.fetch(&query()).await.is_err());
}

fn batch() -> ParticipantBatch {
    let mut tracker =
        therapy_games_api::engine::tracker::ResultTracker::new(ParticipantTuple::new("s1", "sp1"));
    let start = Utc::now();
    tracker.start("c-1", start);
    tracker.mark_incorrect("c-1");
    tracker.mark_complete("c-1", start + chrono::Duration::seconds(12));

    ParticipantBatch {
        session_id: "therapy-1".into(),
        participant: tracker.participant().clone(),
        records: tracker.pending_flush(),
        prepared_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_result_client_posts_submissions() {
    let (base_url, upstream) = spawn_upstream().await;
    let client = RestResultClient::new(&base_url, "/api/session-results/bulk", Duration::from_secs(2));

    client.submit(&batch()).await.unwrap();

    let posted = upstream.posted.lock().unwrap();
    let record = &posted[0][0];
    assert_eq!(record["content_id"], "c-1");
    assert_eq!(record["session_student_id"], "sp1");
    assert_eq!(record["session_id"], "therapy-1");
    assert_eq!(record["time_taken_sec"], 12);
    assert_eq!(record["count_of_incorrect_attempts"], 1);
    assert_eq!(record["completed"], true);
}

#[tokio::test]
async fn test_result_client_surfaces_server_errors() {
    let (base_url, upstream) = spawn_upstream().await;
    *upstream.reject_results.lock().unwrap() = true;
    let client = RestResultClient::new(&base_url, "api/session-results/bulk", Duration::from_secs(2));

    let err = client.submit(&batch()).await.unwrap_err();
    assert!(err.to_string().contains("503"));
}
