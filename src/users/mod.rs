use crate::config::Config;
use crate::db::schema::users;
use crate::db::{Conn, DbConnection};
use crate::types::{ApiError, ApiResult, Validate, ValidationError};
use diesel::insert_into;
use diesel::prelude::*;
use rocket::http::Status;
use rocket::request::{self, FromRequest};
use rocket::response::status;
use rocket::serde::json::{Json, Value};
use rocket::{get, post, put, Request, State};
use tracing::info;

pub mod models;
pub mod token;
mod utils;

use self::models::User;
use self::utils::*;

/// The id of the caller, taken from a verified `Authorization` token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuthUser {
    pub id: i32,
}

impl AuthUser {
    /// Loads the caller's row. A token for a user that no longer exists is
    /// as good as no token.
    pub fn load(&self, connection: &mut Conn) -> Result<User, ApiError> {
        match User::load(self.id, connection) {
            Ok(user) => Ok(user),
            Err(ApiError::Diesel(diesel::result::Error::NotFound)) => Err(ApiError::Unauthorized),
            Err(e) => Err(e),
        }
    }
}

pub type CurrentUser = Result<AuthUser, ApiError>;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = match request.rocket().state::<Config>() {
            Some(config) => config,
            None => {
                return request::Outcome::Error((Status::InternalServerError, ApiError::Internal))
            }
        };

        let header = request.headers().get_one("Authorization");
        let claims = header
            .and_then(token::from_header)
            .ok_or(ApiError::Unauthorized)
            .and_then(|raw| token::decode(raw, &config.jwt_secret));

        match claims {
            Ok(claims) => request::Outcome::Success(AuthUser { id: claims.id }),
            Err(e) => request::Outcome::Error((Status::Unauthorized, e)),
        }
    }
}

fn user_response(user: &User, config: &Config) -> Result<Value, ApiError> {
    let token = token::issue(user.id, &config.jwt_secret, config.token_ttl())?;
    Ok(json!({ "user": user.view(token) }))
}

#[derive(Debug, Deserialize)]
struct RegistrationDetails {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    user: RegistrationDetails,
}

impl Validate for Registration {
    type Error = ApiError;
    fn validate(self, connection: &mut Conn) -> Result<Self, Self::Error> {
        let mut errors = ValidationError::default();

        match validate_username(&self.user.username, None, connection) {
            Ok(_) => {}
            Err(ApiError::Validation(e)) => errors.merge(e),
            Err(other) => return Err(other),
        }

        match validate_email(&self.user.email, None, connection) {
            Ok(_) => {}
            Err(ApiError::Validation(e)) => errors.merge(e),
            Err(other) => return Err(other),
        }

        if let Err(e) = validate_password(&self.user.password) {
            errors.merge(e);
        }

        errors.into_result()?;
        Ok(self)
    }
}

#[post("/", data = "<registration>")]
pub async fn register(
    connection: DbConnection,
    config: &State<Config>,
    registration: Json<Registration>,
) -> Result<status::Custom<Json<Value>>, ApiError> {
    let mut registration = registration.into_inner();
    registration.user.email = normalize_email(&registration.user.email);

    let user = connection
        .run(move |conn| {
            let details = registration.validate(conn)?.user;
            let new_user = models::NewUser {
                username: &details.username,
                email: &details.email,
                hash: User::make_password(&details.password)?,
            };
            let user = insert_into(users::table)
                .values(&new_user)
                .returning(User::as_returning())
                .get_result::<User>(conn)?;
            Ok(user)
        })
        .await?;
    info!(user_id = user.id, "registered {}", user.username);

    let body = user_response(&user, config)?;
    Ok(status::Custom(Status::Created, Json(body)))
}

#[derive(Debug, Deserialize)]
struct LoginDetails {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Login {
    user: LoginDetails,
}

#[post("/login", data = "<login>")]
pub async fn login(
    connection: DbConnection,
    config: &State<Config>,
    login: Json<Login>,
) -> ApiResult<Value> {
    let details = login.into_inner().user;
    let mut errors = ValidationError::default();
    if details.email.trim().is_empty() {
        errors.add_error("email", "can't be blank");
    }
    if details.password.is_empty() {
        errors.add_error("password", "can't be blank");
    }
    errors.into_result()?;

    let email = normalize_email(&details.email);
    let password = details.password;
    let user = connection
        .run(move |conn| match User::load_by_email(&email, conn)? {
            Some(user) if user.verify_password(&password) => Ok(user),
            _ => Err(ApiError::Forbidden(ValidationError::from(
                "login",
                "Not Registered email or invalid password",
            ))),
        })
        .await?;
    Ok(Json(user_response(&user, config)?))
}

#[get("/user")]
pub async fn current(
    current_user: CurrentUser,
    connection: DbConnection,
    config: &State<Config>,
) -> ApiResult<Value> {
    let current = current_user?;
    let user = connection.run(move |conn| current.load(conn)).await?;
    Ok(Json(user_response(&user, config)?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub user: UpdateUser,
}

#[put("/user", data = "<update>")]
pub async fn update(
    current_user: CurrentUser,
    connection: DbConnection,
    config: &State<Config>,
    update: Json<Update>,
) -> ApiResult<Value> {
    let current = current_user?;
    let update = update.into_inner().user;

    let user = connection
        .run(move |conn| {
            let mut user = current.load(conn)?;
            let mut error = ValidationError::default();

            if let Some(new_email) = update.email {
                let new_email = normalize_email(&new_email);
                match validate_email(&new_email, Some(&user), conn) {
                    Ok(_) => user.email = new_email,
                    Err(ApiError::Validation(e)) => error.merge(e),
                    Err(other) => return Err(other),
                }
            }

            if let Some(new_username) = update.username {
                match validate_username(&new_username, Some(&user), conn) {
                    Ok(_) => user.username = new_username,
                    Err(ApiError::Validation(e)) => error.merge(e),
                    Err(other) => return Err(other),
                }
            }

            if let Some(new_password) = update.password {
                match validate_password(&new_password) {
                    Ok(_) => user.new_password(&new_password)?,
                    Err(e) => error.merge(e),
                }
            }

            if update.bio.is_some() {
                user.bio = update.bio;
            }
            if update.image.is_some() {
                user.image = update.image;
            }

            error.into_result()?;
            diesel::update(&user).set(&user).execute(conn)?;
            Ok(user)
        })
        .await?;
    info!(user_id = user.id, "updated settings of {}", user.username);
    Ok(Json(user_response(&user, config)?))
}
