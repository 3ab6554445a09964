//! Role gating and the preferences endpoints

mod common;

use axum::http::StatusCode;
use serde_json::json;
use tokio_test::assert_ok;

use common::spawn_app;

fn preferences_body() -> serde_json::Value {
    json!({
        "favoriteSubjects": ["Math", "Physics"],
        "dreams": "Build a rocket",
        "dream_job": "Engineer",
    })
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let app = spawn_app();
    for uri in [
        "/api/students/preferences",
        "/api/teachers/dashboard",
        "/api/teachers/students/1/preferences",
        "/api/auth/me",
    ] {
        let reply = app.get(uri, None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(reply.body["status"], "fail");
    }
}

#[tokio::test]
async fn test_student_cannot_reach_teacher_routes() {
    let app = spawn_app();
    let student = app.student("sam").await;

    let dashboard = app.get("/api/teachers/dashboard", Some(&student)).await;
    assert_eq!(dashboard.status, StatusCode::FORBIDDEN);
    assert_eq!(
        dashboard.message(),
        "You do not have permission to perform this action"
    );

    let by_id = app
        .get("/api/teachers/students/1/preferences", Some(&student))
        .await;
    assert_eq!(by_id.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_teacher_cannot_reach_student_routes() {
    let app = spawn_app();
    let teacher = app.teacher("mr_t").await;

    let read = app.get("/api/students/preferences", Some(&teacher)).await;
    assert_eq!(read.status, StatusCode::FORBIDDEN);

    let write = app
        .post("/api/students/preferences", preferences_body(), Some(&teacher))
        .await;
    assert_eq!(write.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_student_preferences_roundtrip() {
    let app = spawn_app();
    let student = app.student("sam").await;

    let empty = app.get("/api/students/preferences", Some(&student)).await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.body["data"]["favorite_subjects"], json!([]));
    assert_eq!(empty.body["data"]["dreams"], "");

    let saved = app
        .post("/api/students/preferences", preferences_body(), Some(&student))
        .await;
    assert_eq!(saved.status, StatusCode::OK);
    assert_eq!(saved.message(), "Preferences saved successfully");
    assert_eq!(saved.body["data"]["favorite_subjects"], json!(["Math", "Physics"]));

    let read = app.get("/api/students/preferences", Some(&student)).await;
    assert_eq!(read.body["data"]["dream_job"], "Engineer");
}

#[tokio::test]
async fn test_preferences_validation() {
    let app = spawn_app();
    let student = app.student("sam").await;

    let wrong_shape = app
        .post(
            "/api/students/preferences",
            json!({ "favoriteSubjects": "Math", "dreams": "x", "dream_job": "y" }),
            Some(&student),
        )
        .await;
    assert_eq!(wrong_shape.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_shape.message(), "Invalid data format for preferences");

    let long_job = app
        .post(
            "/api/students/preferences",
            json!({ "favoriteSubjects": [], "dreams": "", "dream_job": "j".repeat(101) }),
            Some(&student),
        )
        .await;
    assert_eq!(long_job.status, StatusCode::BAD_REQUEST);
    assert_eq!(long_job.message(), "Dream job cannot exceed 100 characters.");
}

#[tokio::test]
async fn test_teacher_dashboard_and_lookup() {
    let app = spawn_app();
    let sam = app.student("sam").await;
    app.student("pat").await;
    let teacher = app.teacher("mr_t").await;

    app.post("/api/students/preferences", preferences_body(), Some(&sam))
        .await;

    let dashboard = app.get("/api/teachers/dashboard", Some(&teacher)).await;
    assert_eq!(dashboard.status, StatusCode::OK);
    assert_eq!(dashboard.body["results"], 2);
    let students = dashboard.body["data"]["students"].as_array().unwrap();
    assert_eq!(students[0]["username"], "sam");
    assert_eq!(students[0]["favorite_subjects"], json!(["Math", "Physics"]));
    assert_eq!(students[1]["username"], "pat");
    assert_eq!(students[1]["favorite_subjects"], json!([]));

    let sam_id = students[0]["user_id"].as_i64().unwrap();
    let pat_id = students[1]["user_id"].as_i64().unwrap();

    let found = app
        .get(
            &format!("/api/teachers/students/{sam_id}/preferences"),
            Some(&teacher),
        )
        .await;
    assert_eq!(found.status, StatusCode::OK);
    assert_eq!(found.body["data"]["dreams"], "Build a rocket");

    let unset = app
        .get(
            &format!("/api/teachers/students/{pat_id}/preferences"),
            Some(&teacher),
        )
        .await;
    assert_eq!(unset.status, StatusCode::OK);
    assert_eq!(unset.message(), "No preferences set by this student yet.");

    let missing = app
        .get("/api/teachers/students/9999/preferences", Some(&teacher))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.message(), "Student not found");

    let bad_id = app
        .get("/api/teachers/students/abc/preferences", Some(&teacher))
        .await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_id.message(), "Invalid student ID format");

    let roster = assert_ok!(app.state.preferences.roster());
    assert_eq!(roster.len(), 2);
}

#[tokio::test]
async fn test_teacher_lookup_of_teacher_is_forbidden() {
    let app = spawn_app();
    let teacher = app.teacher("mr_t").await;
    let me = app.get("/api/auth/me", Some(&teacher)).await;
    let id = me.body["data"]["user"]["id"].as_i64().unwrap();
    assert_eq!(me.body["data"]["user"]["role"], "teacher");

    let reply = app
        .get(&format!("/api/teachers/students/{id}/preferences"), Some(&teacher))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.message(), "User is not a student");
}
