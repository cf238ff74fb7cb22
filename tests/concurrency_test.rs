mod common;

use rocket::futures::future::join_all;
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use serde_json::{json, Value};

const USERS: usize = 12;

fn registration(i: usize) -> String {
    json!({ "user": {
        "username": format!("user{}", i),
        "email": format!("user{}@example.com", i),
        "password": common::PASSWORD,
    }})
    .to_string()
}

#[rocket::async_test]
async fn concurrent_registrations_all_complete() {
    let (rocket, _db) = common::build();
    let client = Client::tracked(rocket).await.expect("valid rocket instance");

    // more requests in flight than the pool has connections
    let responses = join_all((0..USERS).map(|i| {
        client
            .post("/api/users")
            .header(ContentType::JSON)
            .body(registration(i))
            .dispatch()
    }))
    .await;
    for response in responses {
        assert_eq!(response.status(), Status::Created);
    }

    let response = client.get("/api/profiles/user7").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
}

#[rocket::async_test]
async fn reads_proceed_while_writes_hash_passwords() {
    let (rocket, _db) = common::build();
    let client = Client::tracked(rocket).await.expect("valid rocket instance");

    let response = client
        .post("/api/users")
        .header(ContentType::JSON)
        .body(registration(0))
        .dispatch()
        .await;
    let token = response.into_json::<Value>().await.expect("JSON body")["user"]["token"]
        .as_str()
        .expect("token")
        .to_string();

    let logins = (0..4).map(|_| {
        client
            .post("/api/users/login")
            .header(ContentType::JSON)
            .body(
                json!({ "user": { "email": "user0@example.com", "password": common::PASSWORD }})
                    .to_string(),
            )
            .dispatch()
    });
    let reads = (0..4).map(|_| {
        client
            .get("/api/user")
            .header(Header::new("Authorization", format!("Token {}", token)))
            .dispatch()
    });
    let (logins, reads) = rocket::futures::join!(join_all(logins), join_all(reads));
    for response in logins.into_iter().chain(reads) {
        assert_eq!(response.status(), Status::Ok);
    }
}
