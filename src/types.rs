use argon2::password_hash::Error as PasswordHashError;
use crate::db::Conn;
use crate::utils::respond_with;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::{Json, Value};
use std::collections::HashMap;
use tracing::{error, warn};

pub trait Validate
where
    Self: Sized,
{
    type Error;
    fn validate(self, connection: &mut Conn) -> Result<Self, Self::Error>;
}

#[derive(Debug)]
pub enum ApiError {
    Diesel(DieselError),
    Validation(ValidationError),
    Forbidden(ValidationError),
    NotFound(&'static str),
    Internal,
    Unauthorized,
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> ApiError {
        ApiError::Diesel(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> ApiError {
        ApiError::Validation(err)
    }
}

impl From<PasswordHashError> for ApiError {
    fn from(err: PasswordHashError) -> ApiError {
        error!("password hashing failed: {}", err);
        ApiError::Internal
    }
}

impl From<jwt::Error> for ApiError {
    fn from(err: jwt::Error) -> ApiError {
        error!("token signing failed: {}", err);
        ApiError::Internal
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize, Default, PartialEq)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_default();
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            let entry = self.0.entry(key).or_default();
            entry.extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(|v| v.as_slice())
    }

    /// `Ok(())` when nothing was recorded, the collected errors otherwise.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        match self {
            ApiError::Diesel(error) => match error {
                DieselError::NotFound => {
                    let body = json!({ "errors": { "body": ["not found"] } });
                    respond_with(req, body, Status::NotFound)
                }
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                    warn!("unique constraint violated: {}", info.message());
                    let body = json!({ "errors": { "body": ["has already been taken"] } });
                    respond_with(req, body, Status::UnprocessableEntity)
                }
                other => {
                    error!("database error on {} {}: {}", req.method(), req.uri(), other);
                    Err(Status::InternalServerError)
                }
            },

            ApiError::Validation(error) => {
                let body = json!({ "errors": error });
                respond_with(req, body, Status::UnprocessableEntity)
            }

            ApiError::Forbidden(error) => {
                let body = json!({ "errors": error });
                respond_with(req, body, Status::Forbidden)
            }

            ApiError::NotFound(resource) => {
                let body = json!({ "errors": { resource: ["not found"] } });
                respond_with(req, body, Status::NotFound)
            }

            ApiError::Unauthorized => {
                let body = json!({ "errors": {
                    "authorization": ["missing or invalid token"]
                }});
                respond_with(req, body, Status::Unauthorized)
            }

            ApiError::Internal => Err(Status::InternalServerError),
        }
    }
}

impl<T> Validate for Json<T>
where
    T: Validate,
{
    type Error = <T as Validate>::Error;
    fn validate(self, connection: &mut Conn) -> Result<Self, Self::Error> {
        let inner = self.into_inner();
        let validated = inner.validate(connection)?;
        Ok(Json(validated))
    }
}

/// Shapes the body of a catcher the same way handler errors are shaped.
pub fn error_body(field: &str, message: &str) -> Value {
    json!({ "errors": { field: [message] } })
}
