#![allow(dead_code)]

use conduit::config::Config;
use conduit::db;
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::{Client, LocalResponse};
use rocket::{Build, Rocket};
use serde_json::{json, Value};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_DB: AtomicUsize = AtomicUsize::new(0);

pub const PASSWORD: &str = "password123";

/// A throwaway SQLite file, removed with its WAL companions on drop.
pub struct ScratchDb {
    path: PathBuf,
}

impl Drop for ScratchDb {
    fn drop(&mut self) {
        for suffix in &["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = fs::remove_file(file);
        }
    }
}

/// A running application backed by its own scratch database.
pub struct TestApp {
    pub client: Client,
    _db: ScratchDb,
}

/// The application, unlaunched, over a freshly migrated database.
pub fn build() -> (Rocket<Build>, ScratchDb) {
    let path = env::temp_dir().join(format!(
        "conduit-test-{}-{}.db",
        process::id(),
        NEXT_DB.fetch_add(1, Ordering::SeqCst)
    ));
    let _ = fs::remove_file(&path);

    let config = Config {
        database_url: path.to_string_lossy().into_owned(),
        jwt_secret: "integration-test-secret".to_string(),
        token_ttl_hours: 24,
    };
    let pool = db::init_pool(&config.database_url).expect("database pool");
    db::run_migrations(&pool).expect("migrations");
    (conduit::rocket(config, pool), ScratchDb { path })
}

pub fn spawn() -> TestApp {
    let (rocket, db) = build();
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestApp { client, _db: db }
}

pub fn auth(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Token {}", token))
}

impl TestApp {
    pub fn post(&self, uri: &str, token: Option<&str>, body: Value) -> LocalResponse<'_> {
        let mut request = self
            .client
            .post(uri.to_string())
            .header(ContentType::JSON)
            .body(body.to_string());
        if let Some(token) = token {
            request = request.header(auth(token));
        }
        request.dispatch()
    }

    pub fn put(&self, uri: &str, token: Option<&str>, body: Value) -> LocalResponse<'_> {
        let mut request = self
            .client
            .put(uri.to_string())
            .header(ContentType::JSON)
            .body(body.to_string());
        if let Some(token) = token {
            request = request.header(auth(token));
        }
        request.dispatch()
    }

    pub fn get(&self, uri: &str, token: Option<&str>) -> LocalResponse<'_> {
        let mut request = self.client.get(uri.to_string());
        if let Some(token) = token {
            request = request.header(auth(token));
        }
        request.dispatch()
    }

    pub fn delete(&self, uri: &str, token: Option<&str>) -> LocalResponse<'_> {
        let mut request = self.client.delete(uri.to_string());
        if let Some(token) = token {
            request = request.header(auth(token));
        }
        request.dispatch()
    }

    /// Registers a user and returns its token.
    pub fn register(&self, username: &str) -> String {
        let response = self.post(
            "/api/users",
            None,
            json!({ "user": {
                "username": username,
                "email": format!("{}@example.com", username),
                "password": PASSWORD,
            }}),
        );
        assert_eq!(response.status(), Status::Created);
        let body = json_body(response);
        body["user"]["token"]
            .as_str()
            .expect("token in registration response")
            .to_string()
    }

    /// Creates an article and returns its slug.
    pub fn create_article(&self, token: &str, title: &str, tags: &[&str]) -> String {
        let response = self.post(
            "/api/articles",
            Some(token),
            json!({ "article": {
                "title": title,
                "description": format!("About {}", title),
                "body": format!("All there is to know about {}.", title),
                "tagList": tags,
            }}),
        );
        assert_eq!(response.status(), Status::Created);
        let body = json_body(response);
        body["article"]["slug"]
            .as_str()
            .expect("slug in article response")
            .to_string()
    }
}

pub fn json_body(response: LocalResponse<'_>) -> Value {
    response.into_json::<Value>().expect("JSON body")
}
