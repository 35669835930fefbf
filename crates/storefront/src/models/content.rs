//! Editorial content: home page banners, the photo gallery and blog posts.

use chrono::{DateTime, Utc};
use comrak::{Options, markdown_to_html};
use serde::Deserialize;

use roghan_core::{BannerId, BlogPostId, GalleryImageId, Slug};

use crate::validation::FieldErrors;

/// A home page carousel banner.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Banner {
    pub id: BannerId,
    pub title: String,
    pub image_url: String,
    pub link_url: String,
    pub position: i32,
    pub is_active: bool,
}

/// A gallery photo.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GalleryImage {
    pub id: GalleryImageId,
    pub title: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

/// A blog post written in Markdown.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BlogPost {
    pub id: BlogPostId,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub cover_url: Option<String>,
    /// `None` while the post is a draft.
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlogPost {
    /// Render the body to HTML.
    #[must_use]
    pub fn body_html(&self) -> String {
        render_markdown(&self.body_markdown)
    }

    /// Whether the post is visible on the public blog.
    #[must_use]
    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        self.published_at.is_some_and(|at| at <= now)
    }

    /// Estimated reading time at 200 words per minute, at least one minute.
    #[must_use]
    pub fn reading_minutes(&self) -> usize {
        self.body_markdown.split_whitespace().count().div_ceil(200).max(1)
    }
}

/// Render Markdown with GitHub-style extensions. Raw HTML is escaped.
fn render_markdown(content: &str) -> String {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.header_ids = Some(String::new());
    markdown_to_html(content, &options)
}

/// Banner form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BannerForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub link_url: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub is_active: Option<String>,
}

/// A validated banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerInput {
    pub title: String,
    pub image_url: String,
    pub link_url: String,
    pub position: i32,
    pub is_active: bool,
}

impl BannerForm {
    /// Validate every field. Links must be site-relative or absolute HTTP(S).
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(&self) -> Result<BannerInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        let title = errors.required("title", &self.title);
        let image_url = errors.required("image_url", &self.image_url);
        let link_url = self.link_url.trim().to_owned();
        if !link_url.is_empty() && !is_safe_link(&link_url) {
            errors.add("link_url", "پیوند باید با / یا https:// شروع شود.");
        }
        let position = errors
            .optional_int("position", &self.position, 0..=10_000)
            .unwrap_or(0);
        errors.finish(BannerInput {
            title,
            image_url,
            link_url,
            position,
            is_active: self.is_active.is_some(),
        })
    }
}

impl From<&Banner> for BannerForm {
    fn from(banner: &Banner) -> Self {
        Self {
            title: banner.title.clone(),
            image_url: banner.image_url.clone(),
            link_url: banner.link_url.clone(),
            position: banner.position.to_string(),
            is_active: banner.is_active.then(|| "on".to_string()),
        }
    }
}

/// Site-relative (but not protocol-relative) or absolute HTTP(S) link.
#[must_use]
pub fn is_safe_link(link: &str) -> bool {
    (link.starts_with('/') && !link.starts_with("//"))
        || link.starts_with("https://")
        || link.starts_with("http://")
}

/// Gallery upload form (image URL comes from `/admin/uploads`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GalleryForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image_url: String,
}

impl GalleryForm {
    /// Validate title and image, returning `(title, image_url)`.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when the image is missing or the title
    /// is too long.
    pub fn validate(&self) -> Result<(String, String), FieldErrors> {
        let mut errors = FieldErrors::new();
        let title = self.title.trim().to_owned();
        errors.max_chars("title", &title, 200);
        let image_url = errors.required("image_url", &self.image_url);
        errors.finish((title, image_url))
    }
}

/// Blog post form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogPostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub body_markdown: String,
    #[serde(default)]
    pub cover_url: String,
    #[serde(default)]
    pub publish: Option<String>,
}

/// A validated blog post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogPostInput {
    pub title: String,
    pub slug: Slug,
    pub excerpt: String,
    pub body_markdown: String,
    pub cover_url: Option<String>,
    pub publish: bool,
}

impl BlogPostForm {
    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(&self) -> Result<BlogPostInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        let title = errors.required("title", &self.title);
        errors.max_chars("title", &title, 200);
        let slug = errors.slug("slug", &self.slug, &title);
        let body_markdown = errors.required("body_markdown", &self.body_markdown);
        let excerpt = self.excerpt.trim().to_owned();
        errors.max_chars("excerpt", &excerpt, 300);
        let cover_url = self.cover_url.trim();
        let Some(slug) = slug else {
            return Err(errors);
        };
        errors.finish(BlogPostInput {
            title,
            slug,
            excerpt,
            body_markdown,
            cover_url: (!cover_url.is_empty()).then(|| cover_url.to_owned()),
            publish: self.publish.is_some(),
        })
    }
}

impl From<&BlogPost> for BlogPostForm {
    fn from(post: &BlogPost) -> Self {
        Self {
            title: post.title.clone(),
            slug: post.slug.clone(),
            excerpt: post.excerpt.clone(),
            body_markdown: post.body_markdown.clone(),
            cover_url: post.cover_url.clone().unwrap_or_default(),
            publish: post.published_at.map(|_| "on".to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn post(body: &str, published_at: Option<DateTime<Utc>>) -> BlogPost {
        BlogPost {
            id: BlogPostId::new(1),
            slug: "oil-change-guide".to_string(),
            title: "راهنمای تعویض روغن".to_string(),
            excerpt: String::new(),
            body_markdown: body.to_string(),
            cover_url: None,
            published_at,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_markdown_rendering_escapes_html() {
        let html = post("## عنوان\n\n<script>alert(1)</script>", None).body_html();
        assert!(html.contains("<h2"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_published_state() {
        let now = Utc::now();
        assert!(!post("x", None).is_published(now));
        assert!(post("x", Some(now - Duration::hours(1))).is_published(now));
        assert!(!post("x", Some(now + Duration::hours(1))).is_published(now));
    }

    #[test]
    fn test_reading_minutes() {
        assert_eq!(post("", None).reading_minutes(), 1);
        assert_eq!(post(&"word ".repeat(401), None).reading_minutes(), 3);
    }

    #[test]
    fn test_gallery_form_requires_image() {
        let form = GalleryForm {
            title: "کارگاه".to_string(),
            image_url: " ".to_string(),
        };
        assert!(form.validate().unwrap_err().has("image_url"));

        let form = GalleryForm {
            title: String::new(),
            image_url: "/uploads/2026/10/a.jpg".to_string(),
        };
        assert_eq!(
            form.validate().unwrap(),
            (String::new(), "/uploads/2026/10/a.jpg".to_string())
        );
    }

    #[test]
    fn test_safe_links() {
        assert!(is_safe_link("/products?brand=castrol"));
        assert!(is_safe_link("https://example.ir/sale"));
        assert!(!is_safe_link("//evil.example"));
        assert!(!is_safe_link("javascript:alert(1)"));
    }
}
