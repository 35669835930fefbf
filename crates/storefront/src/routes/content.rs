//! Blog and gallery route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::db::ContentRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::PageContext;
use crate::models::content::{BlogPost, GalleryImage};
use crate::state::AppState;

/// Posts listed on the blog index.
const INDEX_POSTS: i64 = 50;

/// Number of recent posts to show under a post.
const RECENT_POSTS_COUNT: usize = 3;

/// Post view for templates.
#[derive(Clone)]
pub struct PostView {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub cover_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub body_html: String,
    pub reading_minutes: usize,
}

impl From<&BlogPost> for PostView {
    fn from(post: &BlogPost) -> Self {
        Self {
            slug: post.slug.clone(),
            title: post.title.clone(),
            excerpt: post.excerpt.clone(),
            cover_url: post.cover_url.clone(),
            published_at: post.published_at,
            body_html: post.body_html(),
            reading_minutes: post.reading_minutes(),
        }
    }
}

/// Blog index page template.
#[derive(Template, WebTemplate)]
#[template(path = "blog/index.html")]
pub struct BlogIndexTemplate {
    pub page: PageContext,
    pub posts: Vec<PostView>,
}

/// Blog post detail template.
#[derive(Template, WebTemplate)]
#[template(path = "blog/show.html")]
pub struct BlogShowTemplate {
    pub page: PageContext,
    pub post: PostView,
    pub recent_posts: Vec<PostView>,
    /// Absolute URL for the canonical link.
    pub canonical_url: String,
}

/// Gallery page template.
#[derive(Template, WebTemplate)]
#[template(path = "gallery.html")]
pub struct GalleryTemplate {
    pub page: PageContext,
    pub images: Vec<GalleryImage>,
}

/// Display the blog index page with all published posts.
#[instrument(skip(state, page))]
pub async fn blog_index(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<impl IntoResponse> {
    let posts = ContentRepository::new(state.pool())
        .published_posts(INDEX_POSTS)
        .await?
        .iter()
        .map(PostView::from)
        .collect();
    Ok(BlogIndexTemplate { page, posts })
}

/// Display a single blog post by slug.
///
/// # Errors
///
/// Returns 404 if the post doesn't exist or is still a draft.
#[instrument(skip(state, page))]
pub async fn blog_post(
    State(state): State<AppState>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let content = ContentRepository::new(state.pool());
    let post = content
        .published_post(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {slug}")))?;

    let recent_posts = content
        .published_posts(i64::try_from(RECENT_POSTS_COUNT).unwrap_or(3) + 1)
        .await?
        .iter()
        .filter(|p| p.slug != slug)
        .take(RECENT_POSTS_COUNT)
        .map(PostView::from)
        .collect();

    Ok(BlogShowTemplate {
        page,
        canonical_url: state.config().url(&format!("/blog/{}", post.slug)),
        post: PostView::from(&post),
        recent_posts,
    })
}

/// Display the photo gallery.
#[instrument(skip(state, page))]
pub async fn gallery(State(state): State<AppState>, page: PageContext) -> Result<impl IntoResponse> {
    let images = ContentRepository::new(state.pool()).gallery().await?;
    Ok(GalleryTemplate { page, images })
}
