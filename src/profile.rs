use crate::db::schema::followers;
use crate::db::{Conn, DbConnection};
use crate::types::{ApiError, ApiResult, ValidationError};
use crate::users::models::User;
use crate::users::{AuthUser, CurrentUser};
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{delete as diesel_delete, insert_or_ignore_into, select};
use rocket::serde::json::Json;
use rocket::{delete, get, post};
use std::borrow::Cow;
use std::collections::HashSet;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct ProfileResponse<'a> {
    profile: Profile<'a>,
}

#[derive(Debug, Serialize)]
pub struct Profile<'a> {
    pub username: Cow<'a, str>,
    pub bio: Option<Cow<'a, str>>,
    pub image: Option<Cow<'a, str>>,
    pub following: bool,
}

impl<'a> Profile<'a> {
    pub fn into_owned(self) -> Profile<'static> {
        Profile {
            username: Cow::Owned(self.username.into_owned()),
            bio: self.bio.map(|v| Cow::Owned(v.into_owned())),
            image: self.image.map(|v| Cow::Owned(v.into_owned())),
            following: self.following,
        }
    }
}

/// Whether `follower` follows `followed`.
pub fn is_following(follower: i32, followed: i32, connection: &mut Conn) -> Result<bool, ApiError> {
    let query = select(exists(
        followers::table
            .filter(followers::user_id.eq(followed))
            .filter(followers::follower_id.eq(follower)),
    ));
    Ok(query.get_result::<bool>(connection)?)
}

/// The subset of `candidates` that `follower` follows.
pub fn followed_among(
    follower: i32,
    candidates: &[i32],
    connection: &mut Conn,
) -> Result<HashSet<i32>, ApiError> {
    let followed = followers::table
        .select(followers::user_id)
        .filter(followers::follower_id.eq(follower))
        .filter(followers::user_id.eq_any(candidates))
        .load::<i32>(connection)?;
    Ok(followed.into_iter().collect())
}

#[get("/profiles/<name>")]
pub async fn profile(
    connection: DbConnection,
    current_user: Option<AuthUser>,
    name: &str,
) -> ApiResult<ProfileResponse<'static>> {
    let name = name.to_owned();
    let profile = connection
        .run(move |conn| {
            let user = User::load_by_name(&name, conn)?;
            let following = match current_user {
                Some(current) => is_following(current.id, user.id, conn)?,
                None => false,
            };
            Ok(user.into_profile(following))
        })
        .await?;
    Ok(Json(ProfileResponse { profile }))
}

#[post("/profiles/<name>/follow")]
pub async fn follow(
    connection: DbConnection,
    current_user: CurrentUser,
    name: &str,
) -> ApiResult<ProfileResponse<'static>> {
    let current = current_user?;
    let name = name.to_owned();
    let followed = connection
        .run(move |conn| {
            let followed = User::load_by_name(&name, conn)?;
            if followed.id == current.id {
                return Err(ValidationError::from("profile", "you cannot follow yourself").into());
            }
            insert_or_ignore_into(followers::table)
                .values((
                    followers::user_id.eq(followed.id),
                    followers::follower_id.eq(current.id),
                ))
                .execute(conn)?;
            Ok(followed)
        })
        .await?;
    info!(follower = current.id, followed = followed.id, "follow");

    Ok(Json(ProfileResponse {
        profile: followed.into_profile(true),
    }))
}

#[delete("/profiles/<name>/follow")]
pub async fn unfollow(
    connection: DbConnection,
    current_user: CurrentUser,
    name: &str,
) -> ApiResult<ProfileResponse<'static>> {
    let current = current_user?;
    let name = name.to_owned();
    let followed = connection
        .run(move |conn| {
            let followed = User::load_by_name(&name, conn)?;
            diesel_delete(
                followers::table
                    .filter(followers::user_id.eq(followed.id))
                    .filter(followers::follower_id.eq(current.id)),
            )
            .execute(conn)?;
            Ok(followed)
        })
        .await?;
    info!(follower = current.id, followed = followed.id, "unfollow");

    Ok(Json(ProfileResponse {
        profile: followed.into_profile(false),
    }))
}
