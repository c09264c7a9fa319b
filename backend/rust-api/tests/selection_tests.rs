use axum::http::StatusCode;
use serde_json::json;

mod common;

use common::create_test_app;

#[tokio::test]
async fn test_selection_round_trip_and_clear() {
    let app = create_test_app(vec![]);
    let uri = "/api/v1/selection/clinician-9";

    let (status, _) = app.send("GET", uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, saved) = app
        .send(
            "PUT",
            uri,
            Some(json!({
                "session_id": "therapy-3",
                "roster": [
                    { "student_id": "s1", "session_participant_id": "sp1" },
                    { "student_id": "s2", "session_participant_id": "sp2" }
                ],
                "curriculum_week": 6,
                "theme_id": "weather"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(saved["updated_at"].is_string());

    let (status, loaded) = app.send("GET", uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["curriculum_week"], 6);
    assert_eq!(loaded["roster"][1]["session_participant_id"], "sp2");

    let (status, _) = app.send("DELETE", uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send("GET", uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_selection_week_is_validated() {
    let app = create_test_app(vec![]);
    let (status, _) = app
        .send(
            "PUT",
            "/api/v1/selection/clinician-9",
            Some(json!({ "curriculum_week": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
