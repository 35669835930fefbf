//! Banners, gallery and blog management.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use roghan_core::{BannerId, BlogPostId, GalleryImageId};

use crate::db::ContentRepository;
use crate::error::Result;
use crate::filters;
use crate::flash::Flash;
use crate::middleware::{PageContext, RequireAdmin};
use crate::models::content::{Banner, BannerForm, BlogPost, BlogPostForm, GalleryForm, GalleryImage};
use crate::routes::see_other;
use crate::state::AppState;
use crate::validation::FieldErrors;

use super::slug_conflict;

/// Remove a replaced or deleted image; the row is already gone, so failures
/// only leave an orphan file.
async fn discard_image(state: &AppState, url: &str) {
    if let Err(e) = state.storage().delete(url).await {
        tracing::warn!(error = %e, url, "Failed to delete stored image");
    }
}

// =============================================================================
// Banners
// =============================================================================

/// Banner list with the create form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/banners/index.html")]
pub struct BannersTemplate {
    pub page: PageContext,
    pub banners: Vec<Banner>,
    pub form: BannerForm,
    pub errors: FieldErrors,
}

/// Banner edit form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/banners/edit.html")]
pub struct BannerEditTemplate {
    pub page: PageContext,
    pub banner_id: BannerId,
    pub form: BannerForm,
    pub errors: FieldErrors,
}

/// List all banners, active or not.
#[instrument(skip(state, page, _admin))]
pub async fn banners(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let banners = ContentRepository::new(state.pool()).banners(false).await?;
    Ok(BannersTemplate {
        page,
        banners,
        form: BannerForm {
            is_active: Some("on".to_string()),
            ..BannerForm::default()
        },
        errors: FieldErrors::new(),
    })
}

/// Create a banner.
#[instrument(skip(state, page, session, headers, form), fields(admin_id = %admin.id))]
pub async fn create_banner(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<BannerForm>,
) -> Result<Response> {
    let content = ContentRepository::new(state.pool());
    match form.validate() {
        Ok(input) => {
            let id = content.create_banner(&input).await?;
            tracing::info!(banner_id = %id, "Banner created");
            state.catalog().invalidate_all().await;
            Flash::success("بنر اضافه شد.").set(&session).await;
            Ok(see_other(&headers, "/admin/banners"))
        }
        Err(errors) => {
            let banners = content.banners(false).await?;
            Ok(BannersTemplate {
                page,
                banners,
                form,
                errors,
            }
            .into_response())
        }
    }
}

/// Banner edit form.
#[instrument(skip(state, page, _admin))]
pub async fn edit_banner(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let banner = ContentRepository::new(state.pool())
        .banner(BannerId::new(id))
        .await?;
    Ok(BannerEditTemplate {
        page,
        banner_id: banner.id,
        form: BannerForm::from(&banner),
        errors: FieldErrors::new(),
    })
}

/// Update a banner, removing the old image when it was replaced.
#[instrument(skip(state, page, session, headers, form), fields(admin_id = %admin.id))]
pub async fn update_banner(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Form(form): Form<BannerForm>,
) -> Result<Response> {
    let banner_id = BannerId::new(id);
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => {
            return Ok(BannerEditTemplate {
                page,
                banner_id,
                form,
                errors,
            }
            .into_response());
        }
    };

    let content = ContentRepository::new(state.pool());
    let previous = content.banner(banner_id).await?;
    content.update_banner(banner_id, &input).await?;
    if previous.image_url != input.image_url {
        discard_image(&state, &previous.image_url).await;
    }
    tracing::info!(banner_id = %banner_id, "Banner updated");
    state.catalog().invalidate_all().await;
    Flash::success("بنر ذخیره شد.").set(&session).await;
    Ok(see_other(&headers, "/admin/banners"))
}

/// Delete a banner and its image.
#[instrument(skip(state, session, headers), fields(admin_id = %admin.id))]
pub async fn delete_banner(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response> {
    let image_url = ContentRepository::new(state.pool())
        .delete_banner(BannerId::new(id))
        .await?;
    discard_image(&state, &image_url).await;
    tracing::info!(banner_id = id, "Banner deleted");
    state.catalog().invalidate_all().await;
    Flash::success("بنر حذف شد.").set(&session).await;
    Ok(see_other(&headers, "/admin/banners"))
}

// =============================================================================
// Gallery
// =============================================================================

/// Gallery management template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/gallery.html")]
pub struct GalleryTemplate {
    pub page: PageContext,
    pub images: Vec<GalleryImage>,
    pub form: GalleryForm,
    pub errors: FieldErrors,
}

/// List gallery images with the upload form.
#[instrument(skip(state, page, _admin))]
pub async fn gallery(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let images = ContentRepository::new(state.pool()).gallery().await?;
    Ok(GalleryTemplate {
        page,
        images,
        form: GalleryForm::default(),
        errors: FieldErrors::new(),
    })
}

/// Add an uploaded image to the gallery.
#[instrument(skip(state, page, session, headers, form), fields(admin_id = %admin.id))]
pub async fn add_gallery_image(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<GalleryForm>,
) -> Result<Response> {
    let content = ContentRepository::new(state.pool());
    match form.validate() {
        Ok((title, image_url)) => {
            let id = content.add_gallery_image(&title, &image_url).await?;
            tracing::info!(image_id = %id, "Gallery image added");
            Flash::success("تصویر به گالری اضافه شد.").set(&session).await;
            Ok(see_other(&headers, "/admin/gallery"))
        }
        Err(errors) => {
            let images = content.gallery().await?;
            Ok(GalleryTemplate {
                page,
                images,
                form,
                errors,
            }
            .into_response())
        }
    }
}

/// Remove a gallery image and its file.
#[instrument(skip(state, session, headers), fields(admin_id = %admin.id))]
pub async fn delete_gallery_image(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response> {
    let image_url = ContentRepository::new(state.pool())
        .delete_gallery_image(GalleryImageId::new(id))
        .await?;
    discard_image(&state, &image_url).await;
    tracing::info!(image_id = id, "Gallery image deleted");
    Flash::success("تصویر حذف شد.").set(&session).await;
    Ok(see_other(&headers, "/admin/gallery"))
}

// =============================================================================
// Blog
// =============================================================================

/// Post list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/blog/index.html")]
pub struct PostsTemplate {
    pub page: PageContext,
    pub posts: Vec<BlogPost>,
}

/// Post editor template (new and edit).
#[derive(Template, WebTemplate)]
#[template(path = "admin/blog/form.html")]
pub struct PostFormTemplate {
    pub page: PageContext,
    /// `None` for a new post.
    pub post_id: Option<BlogPostId>,
    pub form: BlogPostForm,
    pub errors: FieldErrors,
}

/// List posts, drafts included.
#[instrument(skip(state, page, _admin))]
pub async fn posts(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let posts = ContentRepository::new(state.pool()).all_posts().await?;
    Ok(PostsTemplate { page, posts })
}

/// Empty post editor.
#[instrument(skip(page, _admin))]
pub async fn new_post(page: PageContext, RequireAdmin(_admin): RequireAdmin) -> impl IntoResponse {
    PostFormTemplate {
        page,
        post_id: None,
        form: BlogPostForm::default(),
        errors: FieldErrors::new(),
    }
}

/// Create a post.
#[instrument(skip(state, page, session, headers, form), fields(admin_id = %admin.id))]
pub async fn create_post(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<BlogPostForm>,
) -> Result<Response> {
    let errors = match form.validate() {
        Ok(input) => match ContentRepository::new(state.pool()).create_post(&input).await {
            Ok(id) => {
                tracing::info!(post_id = %id, slug = %input.slug, published = input.publish, "Post created");
                state.catalog().invalidate_all().await;
                Flash::success("نوشته ذخیره شد.").set(&session).await;
                return Ok(see_other(&headers, &format!("/admin/blog/{id}")));
            }
            Err(e) => {
                let mut errors = FieldErrors::new();
                slug_conflict(&mut errors, e)?;
                errors
            }
        },
        Err(errors) => errors,
    };
    Ok(PostFormTemplate {
        page,
        post_id: None,
        form,
        errors,
    }
    .into_response())
}

/// Post editor for an existing post.
#[instrument(skip(state, page, _admin))]
pub async fn edit_post(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let post = ContentRepository::new(state.pool())
        .post(BlogPostId::new(id))
        .await?;
    Ok(PostFormTemplate {
        page,
        post_id: Some(post.id),
        form: BlogPostForm::from(&post),
        errors: FieldErrors::new(),
    })
}

/// Update a post.
#[instrument(skip(state, page, session, headers, form), fields(admin_id = %admin.id))]
pub async fn update_post(
    State(state): State<AppState>,
    page: PageContext,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Form(form): Form<BlogPostForm>,
) -> Result<Response> {
    let post_id = BlogPostId::new(id);
    let errors = match form.validate() {
        Ok(input) => match ContentRepository::new(state.pool())
            .update_post(post_id, &input)
            .await
        {
            Ok(()) => {
                tracing::info!(post_id = %post_id, published = input.publish, "Post updated");
                state.catalog().invalidate_all().await;
                Flash::success("نوشته ذخیره شد.").set(&session).await;
                return Ok(see_other(&headers, &format!("/admin/blog/{post_id}")));
            }
            Err(e) => {
                let mut errors = FieldErrors::new();
                slug_conflict(&mut errors, e)?;
                errors
            }
        },
        Err(errors) => errors,
    };
    Ok(PostFormTemplate {
        page,
        post_id: Some(post_id),
        form,
        errors,
    }
    .into_response())
}

/// Delete a post.
#[instrument(skip(state, session, headers), fields(admin_id = %admin.id))]
pub async fn delete_post(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response> {
    ContentRepository::new(state.pool())
        .delete_post(BlogPostId::new(id))
        .await?;
    tracing::info!(post_id = id, "Post deleted");
    state.catalog().invalidate_all().await;
    Flash::success("نوشته حذف شد.").set(&session).await;
    Ok(see_other(&headers, "/admin/blog"))
}
