#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;

pub mod article;
pub mod comment;
pub mod config;
pub mod db;
pub mod fairings;
pub mod profile;
pub mod tags;
pub mod types;
pub mod users;
mod utils;

use config::Config;
use db::Pool;
use rocket::serde::json::{Json, Value};
use rocket::{catch, catchers, routes, Build, Request, Rocket};
use tracing::warn;
use types::error_body;

#[catch(400)]
fn bad_request() -> Json<Value> {
    Json(error_body("body", "malformed request"))
}

#[catch(401)]
fn unauthorized() -> Json<Value> {
    Json(error_body("authorization", "missing or invalid token"))
}

#[catch(404)]
fn not_found() -> Json<Value> {
    Json(error_body("body", "not found"))
}

#[catch(422)]
fn unprocessable() -> Json<Value> {
    Json(error_body("body", "unprocessable entity"))
}

#[catch(500)]
fn internal_error(req: &Request) -> Json<Value> {
    warn!("internal error while handling {} {}", req.method(), req.uri());
    Json(error_body("body", "internal server error"))
}

#[catch(503)]
fn unavailable() -> Json<Value> {
    Json(error_body("body", "service unavailable"))
}

/// Assembles the application around an already migrated pool.
pub fn rocket(config: Config, pool: Pool) -> Rocket<Build> {
    rocket::build()
        .manage(pool)
        .manage(config)
        .attach(fairings::RequestLog)
        .attach(fairings::SecurityHeaders)
        .attach(fairings::Cors)
        .mount("/api/users", routes![users::register, users::login])
        .mount(
            "/api",
            routes![
                users::current,
                users::update,
                profile::profile,
                profile::follow,
                profile::unfollow,
                tags::list,
                fairings::preflight,
            ],
        )
        .mount(
            "/api/articles",
            routes![
                article::list,
                article::feed,
                article::get,
                article::create,
                article::update,
                article::delete,
                article::favorite,
                article::unfavorite,
                comment::add,
                comment::get,
                comment::delete,
            ],
        )
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                not_found,
                unprocessable,
                internal_error,
                unavailable
            ],
        )
}
