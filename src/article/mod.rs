use crate::db::schema::{article_tags, articles, comments, favorites};
use crate::db::{Conn, DbConnection};
use crate::types::{ApiError, ApiResult, Validate, ValidationError};
use crate::users::{AuthUser, CurrentUser};
use chrono::Utc;
use diesel::prelude::*;
use diesel::{delete as diesel_delete, insert_into, insert_or_ignore_into};
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::{Json, Value};
use rocket::{delete, get, post, put, FromForm};
use tracing::info;

pub mod models;

use self::models::*;

#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    article: ArticleView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlesResponse {
    articles: Vec<ArticleView>,
    articles_count: i64,
}

#[derive(Debug, Default, FromForm)]
pub struct ListQuery {
    tag: Option<String>,
    author: Option<String>,
    favorited: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Default, FromForm)]
pub struct FeedQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

fn listing(
    filter: ArticleFilter,
    limit: Option<i64>,
    offset: Option<i64>,
    viewer: Option<i32>,
    connection: &mut Conn,
) -> Result<ArticlesResponse, ApiError> {
    let (limit, offset) = page_bounds(limit, offset);
    let articles_count = filter.count(connection)?;
    let page = filter.page(limit, offset, connection)?;
    let articles = ArticleView::load_many(page, viewer, connection)?;
    Ok(ArticlesResponse {
        articles,
        articles_count,
    })
}

#[get("/?<query..>")]
pub async fn list(
    connection: DbConnection,
    current_user: Option<AuthUser>,
    query: ListQuery,
) -> ApiResult<ArticlesResponse> {
    let filter = ArticleFilter {
        tag: query.tag,
        author: query.author,
        favorited: query.favorited,
        followed_by: None,
    };
    let viewer = current_user.map(|user| user.id);
    let (limit, offset) = (query.limit, query.offset);
    let response = connection
        .run(move |conn| listing(filter, limit, offset, viewer, conn))
        .await?;
    Ok(Json(response))
}

#[get("/feed?<query..>", rank = 1)]
pub async fn feed(
    connection: DbConnection,
    current_user: CurrentUser,
    query: FeedQuery,
) -> ApiResult<ArticlesResponse> {
    let user = current_user?;
    let filter = ArticleFilter {
        followed_by: Some(user.id),
        ..ArticleFilter::default()
    };
    let (limit, offset) = (query.limit, query.offset);
    let response = connection
        .run(move |conn| listing(filter, limit, offset, Some(user.id), conn))
        .await?;
    Ok(Json(response))
}

#[get("/<slug>", rank = 2)]
pub async fn get(
    slug: &str,
    connection: DbConnection,
    current_user: Option<AuthUser>,
) -> ApiResult<ArticleResponse> {
    let slug = slug.to_owned();
    let viewer = current_user.map(|user| user.id);
    let article = connection
        .run(move |conn| {
            let article = Article::load_by_slug(&slug, conn)?;
            ArticleView::load(article, viewer, conn)
        })
        .await?;
    Ok(Json(ArticleResponse { article }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDetails {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    tag_list: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateArticle {
    article: ArticleDetails,
}

impl Validate for CreateArticle {
    type Error = ValidationError;
    fn validate(self, _connection: &mut Conn) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if self.article.title.trim().is_empty() {
            error.add_error("title", "can't be blank");
        }

        if self.article.description.trim().is_empty() {
            error.add_error("description", "can't be blank");
        }

        if self.article.body.trim().is_empty() {
            error.add_error("body", "can't be blank");
        }

        error.into_result()?;
        Ok(self)
    }
}

#[post("/", data = "<create>")]
pub async fn create(
    connection: DbConnection,
    current_user: CurrentUser,
    create: Json<CreateArticle>,
) -> Result<status::Custom<Json<ArticleResponse>>, ApiError> {
    let current = current_user?;
    let article = connection
        .run(move |conn| {
            let user = current.load(conn)?;
            let details = create.validate(conn)?.into_inner().article;
            let tags = normalize_tags(details.tag_list);
            let now = Utc::now().naive_utc();

            let article = conn.transaction::<_, ApiError, _>(|conn| {
                let new_article = NewArticle {
                    author_id: user.id,
                    slug: unique_slug(&details.title, None, conn)?,
                    title: &details.title,
                    description: &details.description,
                    body: &details.body,
                    created_at: now,
                    updated_at: now,
                };
                let article = insert_into(articles::table)
                    .values(&new_article)
                    .returning(Article::as_returning())
                    .get_result::<Article>(conn)?;
                replace_tags(article.id, &tags, conn)?;
                Ok(article)
            })?;
            info!(author = user.id, slug = %article.slug, "article created");

            ArticleView::load(article, Some(user.id), conn)
        })
        .await?;
    Ok(status::Custom(
        Status::Created,
        Json(ArticleResponse { article }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDetails {
    title: Option<String>,
    description: Option<String>,
    body: Option<String>,
    tag_list: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateArticle {
    article: UpdateDetails,
}

impl Validate for UpdateArticle {
    type Error = ValidationError;
    fn validate(self, _connection: &mut Conn) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        let fields = [
            ("title", &self.article.title),
            ("description", &self.article.description),
            ("body", &self.article.body),
        ];
        for (name, value) in fields.iter() {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    error.add_error(*name, "can't be blank");
                }
            }
        }
        error.into_result()?;
        Ok(self)
    }
}

fn forbidden(resource: &str) -> ApiError {
    ApiError::Forbidden(ValidationError::from(
        resource,
        "only the author may change this",
    ))
}

#[put("/<slug>", data = "<update>")]
pub async fn update(
    slug: &str,
    connection: DbConnection,
    current_user: CurrentUser,
    update: Json<UpdateArticle>,
) -> ApiResult<ArticleResponse> {
    let user = current_user?;
    let slug = slug.to_owned();
    let article = connection
        .run(move |conn| {
            let article = Article::load_by_slug(&slug, conn)?;
            if article.author_id != user.id {
                return Err(forbidden("article"));
            }
            let details = update.validate(conn)?.into_inner().article;

            let article = conn.transaction::<_, ApiError, _>(|conn| {
                let new_slug = match details.title {
                    Some(ref title) if *title != article.title => {
                        Some(unique_slug(title, Some(article.id), conn)?)
                    }
                    _ => None,
                };
                let changes = ArticleChanges {
                    slug: new_slug,
                    title: details.title,
                    description: details.description,
                    body: details.body,
                    updated_at: Some(Utc::now().naive_utc()),
                };
                let updated = diesel::update(&article)
                    .set(&changes)
                    .returning(Article::as_returning())
                    .get_result::<Article>(conn)?;
                if let Some(tags) = details.tag_list {
                    replace_tags(updated.id, &normalize_tags(tags), conn)?;
                }
                Ok(updated)
            })?;
            info!(author = user.id, slug = %article.slug, "article updated");

            ArticleView::load(article, Some(user.id), conn)
        })
        .await?;
    Ok(Json(ArticleResponse { article }))
}

#[delete("/<slug>")]
pub async fn delete(
    slug: &str,
    connection: DbConnection,
    current_user: CurrentUser,
) -> ApiResult<Value> {
    let user = current_user?;
    let slug = slug.to_owned();
    connection
        .run(move |conn| {
            let article = Article::load_by_slug(&slug, conn)?;
            if article.author_id != user.id {
                return Err(forbidden("article"));
            }

            conn.transaction::<_, ApiError, _>(|conn| {
                diesel_delete(comments::table.filter(comments::article_id.eq(article.id)))
                    .execute(conn)?;
                diesel_delete(favorites::table.filter(favorites::article_id.eq(article.id)))
                    .execute(conn)?;
                diesel_delete(article_tags::table.filter(article_tags::article_id.eq(article.id)))
                    .execute(conn)?;
                diesel_delete(&article).execute(conn)?;
                Ok(())
            })?;
            info!(author = user.id, slug = %article.slug, "article deleted");
            Ok(())
        })
        .await?;

    Ok(Json(json!({})))
}

#[post("/<slug>/favorite")]
pub async fn favorite(
    slug: &str,
    connection: DbConnection,
    current_user: CurrentUser,
) -> ApiResult<ArticleResponse> {
    let user = current_user?;
    let slug = slug.to_owned();
    let article = connection
        .run(move |conn| {
            let article = Article::load_by_slug(&slug, conn)?;
            insert_or_ignore_into(favorites::table)
                .values((
                    favorites::user_id.eq(user.id),
                    favorites::article_id.eq(article.id),
                ))
                .execute(conn)?;
            ArticleView::load(article, Some(user.id), conn)
        })
        .await?;
    Ok(Json(ArticleResponse { article }))
}

#[delete("/<slug>/favorite")]
pub async fn unfavorite(
    slug: &str,
    connection: DbConnection,
    current_user: CurrentUser,
) -> ApiResult<ArticleResponse> {
    let user = current_user?;
    let slug = slug.to_owned();
    let article = connection
        .run(move |conn| {
            let article = Article::load_by_slug(&slug, conn)?;
            diesel_delete(
                favorites::table
                    .filter(favorites::user_id.eq(user.id))
                    .filter(favorites::article_id.eq(article.id)),
            )
            .execute(conn)?;
            ArticleView::load(article, Some(user.id), conn)
        })
        .await?;
    Ok(Json(ArticleResponse { article }))
}
