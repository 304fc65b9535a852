// tests/auth_tests.rs

mod common;

use common::{ADMIN_EMAIL, spawn_app};
use serde_json::{Value, json};

#[tokio::test]
async fn register_assigns_user_role_and_hides_password() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/register"))
        .json(&json!({
            "email": "new.learner@example.com",
            "password": "password123",
            "full_name": "New Learner",
            "qualification": "B.Sc",
            "dob": "2001-04-09",
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["roles"], json!(["User"]));
    assert_eq!(body["dob"], "2001-04-09");
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn duplicate_registration_is_400() {
    let app = spawn_app().await;
    let payload = json!({
        "email": "twice@example.com",
        "password": "password123",
        "full_name": "Twice",
    });

    let first = app.client.post(app.url("/api/register")).json(&payload).send().await.unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let second = app.client.post(app.url("/api/register")).json(&payload).send().await.unwrap();
    assert_eq!(second.status().as_u16(), 400);
}

#[tokio::test]
async fn register_fails_validation() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/register"))
        .json(&json!({
            "email": "not-an-email",
            "password": "password123",
            "full_name": "Someone",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn wrong_password_is_401() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/login"))
        .json(&json!({ "email": ADMIN_EMAIL, "password": "wrong" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn login_returns_roles() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/login"))
        .json(&json!({ "email": ADMIN_EMAIL, "password": common::ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["type"], "Bearer");
    assert_eq!(body["user"]["roles"], json!(["Admin", "User"]));
}

#[tokio::test]
async fn protected_routes_require_token() {
    let app = spawn_app().await;

    for path in ["/api/subjects", "/api/leaderboard", "/api/user"] {
        let response = app.client.get(app.url(path)).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 401, "GET {path}");
    }

    let response = app.get("/api/subjects", "garbage-token").await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn admin_routes_reject_plain_users() {
    let app = spawn_app().await;
    let (_, _, token) = app.register_user("Plain User").await;

    assert_eq!(app.get("/api/admin", &token).await.status().as_u16(), 403);
    assert_eq!(app.get("/api/users", &token).await.status().as_u16(), 403);
    assert_eq!(
        app.post("/api/subjects", &token, json!({ "name": "Sneaky" }))
            .await
            .status()
            .as_u16(),
        403
    );

    // Reading the catalog is fine.
    assert_eq!(app.get("/api/subjects", &token).await.status().as_u16(), 200);
}

#[tokio::test]
async fn dashboards() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (user_id, email, token) = app.register_user("Dash User").await;

    assert_eq!(app.get("/api/admin", &admin).await.status().as_u16(), 200);

    let me: Value = app.get("/api/user", &token).await.json().await.unwrap();
    assert_eq!(me["id"], user_id);
    assert_eq!(me["email"], email);
    assert!(me.get("password").is_none());
}

#[tokio::test]
async fn inactive_user_cannot_log_in() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (user_id, email, _) = app.register_user("Soon Inactive").await;

    let response = app
        .put(&format!("/api/users/{user_id}"), &admin, json!({ "active": false }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["active"], false);
    assert_eq!(body["full_name"], "Soon Inactive");

    let response = app
        .client
        .post(app.url("/api/login"))
        .json(&json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn profile_is_private_and_email_unique() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, email, token) = app.register_user("Profile Owner").await;
    let (_, other_email, other_token) = app.register_user("Someone Else").await;

    let response = app.get(&format!("/api/get-profile?email={email}"), &token).await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .get(&format!("/api/get-profile?email={email}"), &other_token)
        .await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app.get(&format!("/api/get-profile?email={email}"), &admin).await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .put("/api/update-profile", &token, json!({ "email": other_email }))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .put(
            "/api/update-profile",
            &token,
            json!({ "full_name": "Renamed Owner", "qualification": "M.Sc" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["full_name"], "Renamed Owner");
    assert_eq!(body["email"], email);
}

#[tokio::test]
async fn user_admin_list_and_delete() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (user_id, _, user_token) = app.register_user("To Delete").await;
    let (_, _, quiz_id) = app.seed_quiz(&admin, "Logic", 1).await;

    app.post("/api/scores", &user_token, json!({ "quiz_id": quiz_id, "total_scored": 1 }))
        .await;

    let users: Value = app.get("/api/users", &admin).await.json().await.unwrap();
    assert_eq!(users.as_array().unwrap().len(), 2);

    let me: Value = app.get("/api/user", &admin).await.json().await.unwrap();
    let admin_id = me["id"].as_i64().unwrap();
    let response = app.delete(&format!("/api/users/{admin_id}"), &admin).await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app.delete(&format!("/api/users/{user_id}"), &admin).await;
    assert_eq!(response.status().as_u16(), 204);
    assert_eq!(app.count("scores").await, 0);

    let users: Value = app.get("/api/users", &admin).await.json().await.unwrap();
    assert_eq!(users.as_array().unwrap().len(), 1);

    assert_eq!(
        app.get(&format!("/api/users/{user_id}"), &admin).await.status().as_u16(),
        404
    );
}

#[tokio::test]
async fn deleted_account_token_is_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (user_id, _, user_token) = app.register_user("Gone Soon").await;
    let (_, _, quiz_id) = app.seed_quiz(&admin, "Geometry", 1).await;

    let response = app.delete(&format!("/api/users/{user_id}"), &admin).await;
    assert_eq!(response.status().as_u16(), 204);

    let response = app
        .post("/api/scores", &user_token, json!({ "quiz_id": quiz_id, "total_scored": 1 }))
        .await;
    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(app.count("scores").await, 0);
}

#[tokio::test]
async fn deactivated_account_token_is_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (user_id, _, user_token) = app.register_user("Paused").await;

    assert_eq!(app.get("/api/user", &user_token).await.status().as_u16(), 200);

    let response = app
        .put(&format!("/api/users/{user_id}"), &admin, json!({ "active": false }))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    assert_eq!(app.get("/api/user", &user_token).await.status().as_u16(), 401);
}

#[tokio::test]
async fn profile_lookup_does_not_reveal_unknown_emails() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (_, _, token) = app.register_user("Curious").await;
    let (_, other_email, _) = app.register_user("Registered").await;

    let known = app.get(&format!("/api/get-profile?email={other_email}"), &token).await;
    let unknown = app
        .get("/api/get-profile?email=nobody@example.com", &token)
        .await;
    assert_eq!(known.status().as_u16(), 403);
    assert_eq!(unknown.status().as_u16(), 403);

    let response = app
        .get("/api/get-profile?email=nobody@example.com", &admin)
        .await;
    assert_eq!(response.status().as_u16(), 404);
}
