//! Editorial content repository: banners, gallery and blog.

use sqlx::PgPool;

use roghan_core::{BannerId, BlogPostId, GalleryImageId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::content::{Banner, BannerInput, BlogPost, BlogPostInput, GalleryImage};

const BANNER_COLUMNS: &str = "id, title, image_url, link_url, position, is_active";
const GALLERY_COLUMNS: &str = "id, title, image_url, created_at";
const POST_COLUMNS: &str =
    "id, slug, title, excerpt, body_markdown, cover_url, published_at, created_at, updated_at";

/// Repository for banners, gallery images and blog posts.
pub struct ContentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContentRepository<'a> {
    /// Create a new content repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Banners
    // =========================================================================

    /// Banners in display order; `active_only` for the home page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn banners(&self, active_only: bool) -> Result<Vec<Banner>, RepositoryError> {
        let banners = sqlx::query_as::<_, Banner>(&format!(
            r"
            SELECT {BANNER_COLUMNS} FROM shop.marketing_banner
            WHERE NOT $1 OR is_active
            ORDER BY position, id
            "
        ))
        .bind(active_only)
        .fetch_all(self.pool)
        .await?;
        Ok(banners)
    }

    /// A banner by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the banner does not exist.
    pub async fn banner(&self, id: BannerId) -> Result<Banner, RepositoryError> {
        sqlx::query_as::<_, Banner>(&format!(
            "SELECT {BANNER_COLUMNS} FROM shop.marketing_banner WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Create a banner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_banner(&self, input: &BannerInput) -> Result<BannerId, RepositoryError> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO shop.marketing_banner (title, image_url, link_url, position, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(&input.title)
        .bind(&input.image_url)
        .bind(&input.link_url)
        .bind(input.position)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Update a banner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the banner does not exist.
    pub async fn update_banner(&self, id: BannerId, input: &BannerInput) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.marketing_banner
            SET title = $2, image_url = $3, link_url = $4, position = $5, is_active = $6
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.image_url)
        .bind(&input.link_url)
        .bind(input.position)
        .bind(input.is_active)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a banner, returning its image URL so the file can be removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the banner does not exist.
    pub async fn delete_banner(&self, id: BannerId) -> Result<String, RepositoryError> {
        sqlx::query_scalar("DELETE FROM shop.marketing_banner WHERE id = $1 RETURNING image_url")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    // =========================================================================
    // Gallery
    // =========================================================================

    /// Gallery images, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn gallery(&self) -> Result<Vec<GalleryImage>, RepositoryError> {
        let images = sqlx::query_as::<_, GalleryImage>(&format!(
            "SELECT {GALLERY_COLUMNS} FROM shop.gallery_image ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(images)
    }

    /// Add a gallery image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn add_gallery_image(
        &self,
        title: &str,
        image_url: &str,
    ) -> Result<GalleryImageId, RepositoryError> {
        let id = sqlx::query_scalar(
            "INSERT INTO shop.gallery_image (title, image_url) VALUES ($1, $2) RETURNING id",
        )
        .bind(title)
        .bind(image_url)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Delete a gallery image, returning its URL.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the image does not exist.
    pub async fn delete_gallery_image(&self, id: GalleryImageId) -> Result<String, RepositoryError> {
        sqlx::query_scalar("DELETE FROM shop.gallery_image WHERE id = $1 RETURNING image_url")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    // =========================================================================
    // Blog
    // =========================================================================

    /// Published posts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn published_posts(&self, limit: i64) -> Result<Vec<BlogPost>, RepositoryError> {
        let posts = sqlx::query_as::<_, BlogPost>(&format!(
            r"
            SELECT {POST_COLUMNS} FROM shop.blog_post
            WHERE published_at IS NOT NULL AND published_at <= NOW()
            ORDER BY published_at DESC
            LIMIT $1
            "
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(posts)
    }

    /// A published post by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn published_post(&self, slug: &str) -> Result<Option<BlogPost>, RepositoryError> {
        let post = sqlx::query_as::<_, BlogPost>(&format!(
            r"
            SELECT {POST_COLUMNS} FROM shop.blog_post
            WHERE slug = $1 AND published_at IS NOT NULL AND published_at <= NOW()
            "
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(post)
    }

    /// Every post including drafts (back-office).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn all_posts(&self) -> Result<Vec<BlogPost>, RepositoryError> {
        let posts = sqlx::query_as::<_, BlogPost>(&format!(
            "SELECT {POST_COLUMNS} FROM shop.blog_post ORDER BY updated_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(posts)
    }

    /// A post by ID (back-office).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post does not exist.
    pub async fn post(&self, id: BlogPostId) -> Result<BlogPost, RepositoryError> {
        sqlx::query_as::<_, BlogPost>(&format!(
            "SELECT {POST_COLUMNS} FROM shop.blog_post WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Create a post, published now when `input.publish` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create_post(&self, input: &BlogPostInput) -> Result<BlogPostId, RepositoryError> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO shop.blog_post (slug, title, excerpt, body_markdown, cover_url, published_at)
            VALUES ($1, $2, $3, $4, $5, CASE WHEN $6 THEN NOW() END)
            RETURNING id
            ",
        )
        .bind(input.slug.as_str())
        .bind(&input.title)
        .bind(&input.excerpt)
        .bind(&input.body_markdown)
        .bind(input.cover_url.as_deref())
        .bind(input.publish)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("post slug"))?;
        Ok(id)
    }

    /// Update a post. An already published post keeps its original date;
    /// unpublishing turns it back into a draft.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post does not exist,
    /// `Conflict` if the slug is taken.
    pub async fn update_post(
        &self,
        id: BlogPostId,
        input: &BlogPostInput,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.blog_post SET
                slug = $2, title = $3, excerpt = $4, body_markdown = $5, cover_url = $6,
                published_at = CASE WHEN $7 THEN COALESCE(published_at, NOW()) END,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.slug.as_str())
        .bind(&input.title)
        .bind(&input.excerpt)
        .bind(&input.body_markdown)
        .bind(input.cover_url.as_deref())
        .bind(input.publish)
        .execute(self.pool)
        .await
        .map_err(conflict_on_unique("post slug"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a post.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the post does not exist.
    pub async fn delete_post(&self, id: BlogPostId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.blog_post WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
