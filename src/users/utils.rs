use super::models::User;
use crate::db::schema::users::dsl::*;
use crate::db::Conn;
use crate::types::{ApiError, ValidationError};
use diesel::prelude::*;
use regex::Regex;

pub const PASSWORD_MIN: usize = 8;
pub const FIELD_MAX: usize = 255;

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).unwrap()
    };
    static ref USERNAME_RE: Regex = Regex::new(r"\A[A-Za-z0-9_-]+\z").unwrap();
}

/// Emails are stored and looked up in this form, so `Jake@Example.com` and
/// `jake@example.com` are one account.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn validate_email_re(email_to_validate: &str) -> Result<(), ValidationError> {
    if email_to_validate.trim().is_empty() {
        Err(ValidationError::from("email", "can't be blank"))
    } else if !EMAIL_RE.is_match(&email_to_validate.to_lowercase()) {
        Err(ValidationError::from("email", "is invalid"))
    } else {
        Ok(())
    }
}

pub fn validate_username_re(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        Err(ValidationError::from("username", "can't be blank"))
    } else if name.chars().count() > FIELD_MAX {
        Err(ValidationError::from(
            "username",
            format!("is too long (maximum is {} characters)", FIELD_MAX),
        ))
    } else if !USERNAME_RE.is_match(name) {
        Err(ValidationError::from(
            "username",
            "may only contain letters, digits, '_' and '-'",
        ))
    } else {
        Ok(())
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if length == 0 {
        Err(ValidationError::from("password", "can't be blank"))
    } else if length < PASSWORD_MIN {
        Err(ValidationError::from(
            "password",
            format!("is too short (minimum is {} characters)", PASSWORD_MIN),
        ))
    } else if length > FIELD_MAX {
        Err(ValidationError::from(
            "password",
            format!("is too long (maximum is {} characters)", FIELD_MAX),
        ))
    } else {
        Ok(())
    }
}

/// Format check plus a uniqueness check that ignores `except`, the user
/// being updated.
pub fn validate_email(
    email_to_validate: &str,
    except: Option<&User>,
    connection: &mut Conn,
) -> Result<(), ApiError> {
    let mut errors = ValidationError::default();
    if let Err(e) = validate_email_re(email_to_validate) {
        errors.merge(e);
    }

    let taken_by = users
        .filter(email.eq(email_to_validate))
        .select(id)
        .first::<i32>(connection)
        .optional()?;
    if is_taken(taken_by, except) {
        errors.add_error("email", "has already been taken");
    }

    errors.into_result().map_err(Into::into)
}

pub fn validate_username(
    username_to_validate: &str,
    except: Option<&User>,
    connection: &mut Conn,
) -> Result<(), ApiError> {
    let mut errors = ValidationError::default();
    if let Err(e) = validate_username_re(username_to_validate) {
        errors.merge(e);
    }

    let taken_by = users
        .filter(username.eq(username_to_validate))
        .select(id)
        .first::<i32>(connection)
        .optional()?;
    if is_taken(taken_by, except) {
        errors.add_error("username", "has already been taken");
    }

    errors.into_result().map_err(Into::into)
}

fn is_taken(owner: Option<i32>, except: Option<&User>) -> bool {
    match (owner, except) {
        (Some(owner), Some(user)) => owner != user.id,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
