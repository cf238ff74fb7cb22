use crate::db::schema::{article_tags, articles, favorites, followers, users};
use crate::db::Conn;
use crate::profile::{self, Profile};
use crate::types::ApiError;
use crate::users::models::User;
use crate::utils::serialize_date;
use chrono::NaiveDateTime;
use diesel::dsl::count;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use diesel::{delete as diesel_delete, insert_or_ignore_into};
use slug::slugify;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Queryable, Selectable, Identifiable, PartialEq)]
#[diesel(table_name = articles)]
pub struct Article {
    pub id: i32,
    pub author_id: i32,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Article {
    pub fn load_by_slug(slug_: &str, connection: &mut Conn) -> Result<Article, ApiError> {
        articles::table
            .filter(articles::slug.eq(slug_))
            .select(Article::as_select())
            .get_result::<Article>(connection)
            .optional()?
            .ok_or(ApiError::NotFound("article"))
    }
}

#[derive(Insertable)]
#[diesel(table_name = articles)]
pub struct NewArticle<'a> {
    pub author_id: i32,
    pub slug: String,
    pub title: &'a str,
    pub description: &'a str,
    pub body: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = articles)]
pub struct ArticleChanges {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

/// An article as the API renders it, from the point of view of one viewer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: NaiveDateTime,
    pub favorited: bool,
    pub favorites_count: i64,
    pub author: Profile<'static>,
}

impl ArticleView {
    pub fn load(
        article: Article,
        viewer: Option<i32>,
        connection: &mut Conn,
    ) -> Result<ArticleView, ApiError> {
        ArticleView::load_many(vec![article], viewer, connection)?
            .pop()
            .ok_or(ApiError::Internal)
    }

    /// Decorates a page of articles with tags, authors, favorite counts and
    /// the viewer's favorite/follow flags using one query per concern.
    pub fn load_many(
        page: Vec<Article>,
        viewer: Option<i32>,
        connection: &mut Conn,
    ) -> Result<Vec<ArticleView>, ApiError> {
        if page.is_empty() {
            return Ok(Vec::new());
        }

        let ids = page.iter().map(|a| a.id).collect::<Vec<i32>>();
        let author_ids = page
            .iter()
            .map(|a| a.author_id)
            .collect::<HashSet<i32>>()
            .into_iter()
            .collect::<Vec<i32>>();

        let authors = users::table
            .filter(users::id.eq_any(&author_ids))
            .select(User::as_select())
            .load::<User>(connection)?
            .into_iter()
            .map(|user| (user.id, user))
            .collect::<HashMap<_, _>>();

        let mut tags = tags_for(&ids, connection)?;

        let counts = favorites::table
            .filter(favorites::article_id.eq_any(&ids))
            .group_by(favorites::article_id)
            .select((favorites::article_id, count(favorites::id)))
            .load::<(i32, i64)>(connection)?
            .into_iter()
            .collect::<HashMap<_, _>>();

        let (favorited, following) = match viewer {
            Some(viewer) => {
                let favorited = favorites::table
                    .select(favorites::article_id)
                    .filter(favorites::user_id.eq(viewer))
                    .filter(favorites::article_id.eq_any(&ids))
                    .load::<i32>(connection)?
                    .into_iter()
                    .collect::<HashSet<_>>();
                let following = profile::followed_among(viewer, &author_ids, connection)?;
                (favorited, following)
            }
            None => (HashSet::new(), HashSet::new()),
        };

        let mut views = Vec::with_capacity(page.len());
        for article in page {
            let author = authors.get(&article.author_id).ok_or(ApiError::Internal)?;
            views.push(ArticleView {
                tag_list: tags.remove(&article.id).unwrap_or_default(),
                favorited: favorited.contains(&article.id),
                favorites_count: counts.get(&article.id).cloned().unwrap_or(0),
                author: author
                    .profile(following.contains(&article.author_id))
                    .into_owned(),
                slug: article.slug,
                title: article.title,
                description: article.description,
                body: article.body,
                created_at: article.created_at,
                updated_at: article.updated_at,
            });
        }
        Ok(views)
    }
}

/// Which articles a listing selects. Every filter narrows the result.
#[derive(Debug, Default, Clone)]
pub struct ArticleFilter {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited: Option<String>,
    pub followed_by: Option<i32>,
}

impl ArticleFilter {
    fn query(&self) -> articles::BoxedQuery<'static, Sqlite> {
        let mut query = articles::table.into_boxed();

        if let Some(ref tag) = self.tag {
            query = query.filter(
                articles::id.eq_any(
                    article_tags::table
                        .select(article_tags::article_id)
                        .filter(article_tags::tag.eq(tag.clone())),
                ),
            );
        }

        if let Some(ref author) = self.author {
            query = query.filter(
                articles::author_id.eq_any(
                    users::table
                        .select(users::id)
                        .filter(users::username.eq(author.clone())),
                ),
            );
        }

        if let Some(ref name) = self.favorited {
            query = query.filter(
                articles::id.eq_any(
                    favorites::table.select(favorites::article_id).filter(
                        favorites::user_id.eq_any(
                            users::table
                                .select(users::id)
                                .filter(users::username.eq(name.clone())),
                        ),
                    ),
                ),
            );
        }

        if let Some(follower) = self.followed_by {
            query = query.filter(
                articles::author_id.eq_any(
                    followers::table
                        .select(followers::user_id)
                        .filter(followers::follower_id.eq(follower)),
                ),
            );
        }

        query
    }

    pub fn count(&self, connection: &mut Conn) -> Result<i64, ApiError> {
        Ok(self.query().count().get_result::<i64>(connection)?)
    }

    /// Newest first.
    pub fn page(
        &self,
        limit: i64,
        offset: i64,
        connection: &mut Conn,
    ) -> Result<Vec<Article>, ApiError> {
        let page = self
            .query()
            .order((articles::created_at.desc(), articles::id.desc()))
            .limit(limit)
            .offset(offset)
            .load::<Article>(connection)?;
        Ok(page)
    }
}

/// Clamps paging parameters to the supported range.
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// Tags per article, each list in the order the tags were attached.
pub fn tags_for(ids: &[i32], connection: &mut Conn) -> Result<HashMap<i32, Vec<String>>, ApiError> {
    let rows = article_tags::table
        .filter(article_tags::article_id.eq_any(ids))
        .order(article_tags::id.asc())
        .select((article_tags::article_id, article_tags::tag))
        .load::<(i32, String)>(connection)?;

    let mut tags: HashMap<i32, Vec<String>> = HashMap::new();
    for (article_id, tag) in rows {
        tags.entry(article_id).or_default().push(tag);
    }
    Ok(tags)
}

pub fn replace_tags(article_id: i32, tags: &[String], connection: &mut Conn) -> Result<(), ApiError> {
    diesel_delete(article_tags::table.filter(article_tags::article_id.eq(article_id)))
        .execute(connection)?;
    let rows = tags
        .iter()
        .map(|tag| {
            (
                article_tags::article_id.eq(article_id),
                article_tags::tag.eq(tag.as_str()),
            )
        })
        .collect::<Vec<_>>();
    if !rows.is_empty() {
        insert_or_ignore_into(article_tags::table)
            .values(rows)
            .execute(connection)?;
    }
    Ok(())
}

/// Trims tags, drops blanks and repeats, keeps first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

pub fn slug_base(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        "article".to_string()
    } else {
        slug
    }
}

/// The slugified title, suffixed with `-2`, `-3`, ... until no other
/// article owns it. `except` is the article being renamed.
pub fn unique_slug(
    title: &str,
    except: Option<i32>,
    connection: &mut Conn,
) -> Result<String, ApiError> {
    let base = slug_base(title);
    let mut candidate = base.clone();
    let mut suffix = 1;
    loop {
        let owner = articles::table
            .filter(articles::slug.eq(&candidate))
            .select(articles::id)
            .first::<i32>(connection)
            .optional()?;
        match owner {
            None => return Ok(candidate),
            Some(owner) if Some(owner) == except => return Ok(candidate),
            Some(_) => {
                suffix += 1;
                candidate = format!("{}-{}", base, suffix);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_follows_the_title() {
        assert_eq!(slug_base("How to train your dragon"), "how-to-train-your-dragon");
        assert_eq!(slug_base("  Ünïcödé & Friends!  "), "unicode-friends");
        assert_eq!(slug_base("???"), "article");
    }

    #[test]
    fn tags_are_trimmed_and_deduplicated() {
        let tags = vec![
            " dragons ".to_string(),
            "training".to_string(),
            "".to_string(),
            "dragons".to_string(),
            "   ".to_string(),
        ];
        assert_eq!(normalize_tags(tags), vec!["dragons", "training"]);
    }

    #[test]
    fn paging_defaults_and_limits() {
        assert_eq!(page_bounds(None, None), (DEFAULT_LIMIT, 0));
        assert_eq!(page_bounds(Some(5), Some(10)), (5, 10));
        assert_eq!(page_bounds(Some(10_000), Some(-3)), (MAX_LIMIT, 0));
        assert_eq!(page_bounds(Some(0), None), (1, 0));
    }
}
