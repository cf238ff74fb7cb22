mod common;

use common::{json_body, spawn, PASSWORD};
use rocket::http::{Header, Status};
use serde_json::json;

#[test]
fn register_returns_the_user_with_a_token() {
    let app = spawn();
    let response = app.post(
        "/api/users",
        None,
        json!({ "user": {
            "username": "jake",
            "email": "jake@jake.jake",
            "password": "jakejakejake",
        }}),
    );
    assert_eq!(response.status(), Status::Created);

    let body = json_body(response);
    assert_eq!(body["user"]["username"], "jake");
    assert_eq!(body["user"]["email"], "jake@jake.jake");
    assert!(body["user"]["bio"].is_null());
    assert!(body["user"]["image"].is_null());
    assert!(!body["user"]["token"].as_str().unwrap().is_empty());
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("hash").is_none());
}

#[test]
fn register_rejects_taken_username_and_email() {
    let app = spawn();
    app.register("jake");

    let response = app.post(
        "/api/users",
        None,
        json!({ "user": {
            "username": "jake",
            "email": "jake@example.com",
            "password": PASSWORD,
        }}),
    );
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let body = json_body(response);
    assert_eq!(body["errors"]["username"][0], "has already been taken");
    assert_eq!(body["errors"]["email"][0], "has already been taken");
}

#[test]
fn register_reports_every_invalid_field() {
    let app = spawn();
    let response = app.post(
        "/api/users",
        None,
        json!({ "user": { "email": "not-an-email", "password": "short" }}),
    );
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let body = json_body(response);
    assert_eq!(body["errors"]["username"][0], "can't be blank");
    assert_eq!(body["errors"]["email"][0], "is invalid");
    assert!(body["errors"]["password"].is_array());
}

#[test]
fn login_with_valid_credentials() {
    let app = spawn();
    app.register("jake");

    let response = app.post(
        "/api/users/login",
        None,
        json!({ "user": { "email": "jake@example.com", "password": PASSWORD }}),
    );
    assert_eq!(response.status(), Status::Ok);
    let body = json_body(response);
    assert_eq!(body["user"]["username"], "jake");
    assert!(body["user"]["token"].is_string());
}

#[test]
fn login_with_wrong_password_is_forbidden() {
    let app = spawn();
    app.register("jake");

    let response = app.post(
        "/api/users/login",
        None,
        json!({ "user": { "email": "jake@example.com", "password": "wrong-password" }}),
    );
    assert_eq!(response.status(), Status::Forbidden);
    let body = json_body(response);
    assert_eq!(
        body["errors"]["login"][0],
        "Not Registered email or invalid password"
    );

    let response = app.post(
        "/api/users/login",
        None,
        json!({ "user": { "email": "nobody@example.com", "password": PASSWORD }}),
    );
    assert_eq!(response.status(), Status::Forbidden);
}

#[test]
fn login_requires_both_fields() {
    let app = spawn();
    let response = app.post("/api/users/login", None, json!({ "user": {} }));
    assert_eq!(response.status(), Status::UnprocessableEntity);
    let body = json_body(response);
    assert_eq!(body["errors"]["email"][0], "can't be blank");
    assert_eq!(body["errors"]["password"][0], "can't be blank");
}

#[test]
fn current_user_requires_a_valid_token() {
    let app = spawn();
    let token = app.register("jake");

    let response = app.get("/api/user", None);
    assert_eq!(response.status(), Status::Unauthorized);
    assert!(json_body(response)["errors"]["authorization"].is_array());

    let response = app.get("/api/user", Some("not.a.token"));
    assert_eq!(response.status(), Status::Unauthorized);

    let response = app.get("/api/user", Some(&token));
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(json_body(response)["user"]["username"], "jake");
}

#[test]
fn bearer_prefix_is_accepted() {
    let app = spawn();
    let token = app.register("jake");

    let response = app
        .client
        .get("/api/user")
        .header(Header::new("Authorization", format!("Bearer {}", token)))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
}

#[test]
fn token_signed_with_another_secret_is_rejected() {
    let app = spawn();
    app.register("jake");

    let forged = conduit::users::token::issue(1, "some-other-secret", chrono::Duration::hours(1))
        .expect("token");
    let response = app.get("/api/user", Some(&forged));
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn update_changes_only_the_given_fields() {
    let app = spawn();
    let token = app.register("jake");

    let response = app.put(
        "/api/user",
        Some(&token),
        json!({ "user": { "bio": "I like to skateboard", "image": "https://i.stack.imgur.com/xHWG8.jpg" }}),
    );
    assert_eq!(response.status(), Status::Ok);
    let body = json_body(response);
    assert_eq!(body["user"]["username"], "jake");
    assert_eq!(body["user"]["email"], "jake@example.com");
    assert_eq!(body["user"]["bio"], "I like to skateboard");
    assert_eq!(body["user"]["image"], "https://i.stack.imgur.com/xHWG8.jpg");
}

#[test]
fn update_password_allows_logging_in_with_it() {
    let app = spawn();
    let token = app.register("jake");

    let response = app.put(
        "/api/user",
        Some(&token),
        json!({ "user": { "password": "a-brand-new-password" }}),
    );
    assert_eq!(response.status(), Status::Ok);

    let response = app.post(
        "/api/users/login",
        None,
        json!({ "user": { "email": "jake@example.com", "password": PASSWORD }}),
    );
    assert_eq!(response.status(), Status::Forbidden);

    let response = app.post(
        "/api/users/login",
        None,
        json!({ "user": { "email": "jake@example.com", "password": "a-brand-new-password" }}),
    );
    assert_eq!(response.status(), Status::Ok);
}

#[test]
fn update_rejects_a_taken_email() {
    let app = spawn();
    let token = app.register("jake");
    app.register("jane");

    let response = app.put(
        "/api/user",
        Some(&token),
        json!({ "user": { "email": "jane@example.com" }}),
    );
    assert_eq!(response.status(), Status::UnprocessableEntity);
    assert_eq!(
        json_body(response)["errors"]["email"][0],
        "has already been taken"
    );

    // keeping one's own email is not a conflict
    let response = app.put(
        "/api/user",
        Some(&token),
        json!({ "user": { "email": "jake@example.com" }}),
    );
    assert_eq!(response.status(), Status::Ok);
}

#[test]
fn emails_are_case_insensitive() {
    let app = spawn();
    let response = app.post(
        "/api/users",
        None,
        json!({ "user": {
            "username": "jake",
            "email": "Jake@Example.com",
            "password": PASSWORD,
        }}),
    );
    assert_eq!(response.status(), Status::Created);
    assert_eq!(json_body(response)["user"]["email"], "jake@example.com");

    let response = app.post(
        "/api/users",
        None,
        json!({ "user": {
            "username": "jake2",
            "email": "jake@example.com",
            "password": PASSWORD,
        }}),
    );
    assert_eq!(response.status(), Status::UnprocessableEntity);
    assert_eq!(
        json_body(response)["errors"]["email"][0],
        "has already been taken"
    );

    let response = app.post(
        "/api/users/login",
        None,
        json!({ "user": { "email": "JAKE@example.COM", "password": PASSWORD }}),
    );
    assert_eq!(response.status(), Status::Ok);
}
