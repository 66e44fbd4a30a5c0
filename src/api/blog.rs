//! Public feeds and the post detail page

use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use super::error::{parse_id, PageError};
use super::middleware::{AppState, RequestContext};
use crate::models::{PageNumber, PagedResult, PostSummary};
use crate::permissions::{can_delete_post, can_modify};

/// `?page=` query parameter
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// Page for feeds where a bad page number is a missing page
    pub fn strict(&self) -> Result<PageNumber, PageError> {
        PageNumber::parse(self.page.as_deref())
            .ok_or_else(|| PageError::NotFound(format!("invalid page {:?}", self.page)))
    }

    /// Page for feeds that snap to a page that exists: zero and negative
    /// numbers go to the last page, anything unparsable to the first.
    pub fn lenient(&self) -> PageNumber {
        let raw = self.page.as_deref();
        PageNumber::parse(raw).unwrap_or_else(|| {
            match raw.and_then(|value| value.trim().parse::<i64>().ok()) {
                Some(n) if n < 1 => PageNumber::Last,
                _ => PageNumber::default(),
            }
        })
    }
}

pub(crate) fn feed_context(posts: &PagedResult<PostSummary>) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("posts", &posts.items);
    context.insert("pagination", &posts.pagination());
    context
}

/// GET /
pub async fn index(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<PageQuery>,
) -> Result<Response, PageError> {
    let posts = state.post_service.list_published(query.strict()?).await?;
    state.render(&ctx, "blog/index.html", &feed_context(&posts))
}

/// GET /category/{slug}/
pub async fn category_posts(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, PageError> {
    let (category, posts) = state
        .post_service
        .list_by_category(&slug, query.strict()?)
        .await?;

    let mut context = feed_context(&posts);
    context.insert("category", &category);
    state.render(&ctx, "blog/category.html", &context)
}

/// GET /posts/{id}/
pub async fn post_detail(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let detail = state.post_service.get_detail(parse_id(&id)?).await?;

    let mut context = TeraContext::new();
    context.insert(
        "can_edit",
        &ctx.user.as_ref().is_some_and(|u| can_modify(u, &detail.post)),
    );
    context.insert(
        "can_delete",
        &ctx.user.as_ref().is_some_and(|u| can_delete_post(u, &detail.post)),
    );
    context.insert("post", &detail.post);
    context.insert("comments", &detail.comments);
    state.render(&ctx, "blog/detail.html", &context)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: &str) -> PageQuery {
        PageQuery {
            page: Some(page.to_string()),
        }
    }

    #[test]
    fn test_lenient_page() {
        assert_eq!(PageQuery::default().lenient(), PageNumber::Number(1));
        assert_eq!(query("4").lenient(), PageNumber::Number(4));
        assert_eq!(query("0").lenient(), PageNumber::Last);
        assert_eq!(query("-3").lenient(), PageNumber::Last);
        assert_eq!(query("abc").lenient(), PageNumber::Number(1));
        assert_eq!(query("last").lenient(), PageNumber::Last);
    }

    #[test]
    fn test_strict_page_rejects_zero() {
        assert!(query("0").strict().is_err());
        assert!(query("abc").strict().is_err());
        assert_eq!(query("2").strict().unwrap(), PageNumber::Number(2));
    }
}
