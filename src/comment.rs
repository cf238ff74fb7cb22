use crate::article::models::Article;
use crate::db::schema::{comments, users};
use crate::db::{Conn, DbConnection};
use crate::profile::{self, Profile};
use crate::types::{ApiError, ApiResult, Validate, ValidationError};
use crate::users::models::User;
use crate::users::{AuthUser, CurrentUser};
use crate::utils::serialize_date;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::{delete as diesel_delete, insert_into};
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::{Json, Value};
use rocket::{delete, get, post};
use std::collections::HashSet;
use tracing::info;

pub const BODY_MAX: usize = 2048;

#[derive(Debug, Queryable, Selectable, Identifiable, Associations, PartialEq)]
#[diesel(table_name = comments, belongs_to(Article))]
pub struct Comment {
    pub id: i32,
    pub article_id: i32,
    pub user_id: i32,
    pub body: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommentView<'r> {
    id: i32,
    #[serde(serialize_with = "serialize_date")]
    created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    updated_at: NaiveDateTime,
    body: String,
    author: Profile<'r>,
}

impl<'r> From<(Comment, Profile<'r>)> for CommentView<'r> {
    fn from(comment_and_profile: (Comment, Profile<'r>)) -> Self {
        let (comment, profile) = comment_and_profile;
        CommentView {
            id: comment.id,
            author: profile,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            body: comment.body,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment<'a> {
    article_id: i32,
    user_id: i32,
    body: &'a str,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentBody {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentContainer<T> {
    comment: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentsContainer<T> {
    comments: T,
}

impl Validate for CommentContainer<CommentBody> {
    type Error = ValidationError;
    fn validate(self, _connection: &mut Conn) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if self.comment.body.trim().is_empty() {
            error.add_error("body", "can't be blank");
        } else if self.comment.body.chars().count() > BODY_MAX {
            error.add_error(
                "body",
                format!("is too long (maximum is {} characters)", BODY_MAX),
            );
        }
        error.into_result()?;
        Ok(self)
    }
}

#[post("/<slug>/comments", data = "<details>")]
pub async fn add(
    conn: DbConnection,
    user: CurrentUser,
    slug: &str,
    details: Json<CommentContainer<CommentBody>>,
) -> Result<status::Custom<Json<CommentContainer<CommentView<'static>>>>, ApiError> {
    let user = user?;
    let slug = slug.to_owned();
    let (comment, author) = conn
        .run(move |conn| {
            let author = user.load(conn)?;
            let article = Article::load_by_slug(&slug, conn)?;
            let details = details.validate(conn)?.into_inner();
            let now = Utc::now().naive_utc();
            let new_comment = NewComment {
                article_id: article.id,
                user_id: author.id,
                body: &details.comment.body,
                created_at: now,
                updated_at: now,
            };
            let comment = insert_into(comments::table)
                .values(&new_comment)
                .returning(Comment::as_returning())
                .get_result::<Comment>(conn)?;
            Ok((comment, author))
        })
        .await?;
    info!(author = author.id, article = comment.article_id, comment = comment.id, "comment added");

    let container = CommentContainer {
        comment: (comment, author.into_profile(false)).into(),
    };
    Ok(status::Custom(Status::Created, Json(container)))
}

/// Oldest first, each author's profile seen from `viewer`.
fn load_comments(
    article: &Article,
    viewer: Option<i32>,
    conn: &mut Conn,
) -> Result<Vec<CommentView<'static>>, ApiError> {
    let data = Comment::belonging_to(article)
        .inner_join(users::table.on(comments::user_id.eq(users::id)))
        .order(comments::id.asc())
        .select((Comment::as_select(), User::as_select()))
        .load::<(Comment, User)>(conn)?;

    let following = match viewer {
        Some(viewer) => {
            let authors = data
                .iter()
                .map(|elem| elem.1.id)
                .collect::<HashSet<i32>>()
                .into_iter()
                .collect::<Vec<i32>>();
            profile::followed_among(viewer, &authors, conn)?
        }
        None => HashSet::new(),
    };

    let comments = data
        .into_iter()
        .map(|(comment, author)| {
            let follows_author = following.contains(&author.id);
            (comment, author.into_profile(follows_author)).into()
        })
        .collect();
    Ok(comments)
}

#[get("/<slug>/comments")]
pub async fn get(
    conn: DbConnection,
    user: Option<AuthUser>,
    slug: &str,
) -> ApiResult<CommentsContainer<Vec<CommentView<'static>>>> {
    let slug = slug.to_owned();
    let comments = conn
        .run(move |conn| {
            let article = Article::load_by_slug(&slug, conn)?;
            load_comments(&article, user.map(|u| u.id), conn)
        })
        .await?;
    Ok(Json(CommentsContainer { comments }))
}

#[delete("/<slug>/comments/<id>")]
pub async fn delete(
    conn: DbConnection,
    user: CurrentUser,
    slug: &str,
    id: &str,
) -> ApiResult<Value> {
    let user = user?;
    // ids are numeric; anything else names no comment
    let id = id.parse::<i32>().map_err(|_| ApiError::NotFound("comment"))?;
    let slug = slug.to_owned();
    conn.run(move |conn| {
        let article = Article::load_by_slug(&slug, conn)?;
        let comment = Comment::belonging_to(&article)
            .filter(comments::id.eq(id))
            .select(Comment::as_select())
            .first::<Comment>(conn)
            .optional()?
            .ok_or(ApiError::NotFound("comment"))?;
        if comment.user_id != user.id {
            return Err(ApiError::Forbidden(ValidationError::from(
                "comment",
                "only the author may delete this",
            )));
        }
        diesel_delete(&comment).execute(conn)?;
        Ok(())
    })
    .await?;
    info!(author = user.id, comment = id, "comment deleted");
    Ok(Json(json!({})))
}
