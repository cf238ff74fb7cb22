use crate::db::schema::article_tags;
use crate::db::DbConnection;
use crate::types::ApiResult;
use diesel::prelude::*;
use rocket::get;
use rocket::serde::json::Json;

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    tags: Vec<String>,
}

#[get("/tags")]
pub async fn list(connection: DbConnection) -> ApiResult<TagsResponse> {
    let tags = connection
        .run(|conn| {
            let tags = article_tags::table
                .select(article_tags::tag)
                .distinct()
                .order(article_tags::tag.asc())
                .load::<String>(conn)?;
            Ok(tags)
        })
        .await?;
    Ok(Json(TagsResponse { tags }))
}
