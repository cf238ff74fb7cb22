use chrono::{NaiveDateTime, SecondsFormat};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::{Json, Value};
use serde::Serializer;

pub fn respond_with(req: &Request, json: Value, status: Status) -> response::Result<'static> {
    let resp = Json(json).respond_to(req)?;
    Response::build_from(resp).status(status).ok()
}

/// Timestamps are stored as naive UTC and rendered as RFC 3339 with
/// millisecond precision, e.g. `2018-05-01T12:00:00.000Z`.
pub fn serialize_date<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = date.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true);
    serializer.serialize_str(&s)
}
