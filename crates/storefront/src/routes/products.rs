//! Product listing and detail route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, RawQuery, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use roghan_core::EngagementKind;

use crate::db::questions::QuestionSubject;
use crate::db::{
    EngagementRepository, ProductRepository, QuestionRepository, RepositoryError, ReviewRepository,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::flash::Flash;
use crate::middleware::{PageContext, RequireAuth, compare_ids};
use crate::models::catalog::{Car, Pagination, Product, ProductFilter, RatingSummary, SortOrder};
use crate::models::community::{Question, QuestionForm, Review, ReviewForm};
use crate::services::RateLimiter;
use crate::services::rate_limit::{QUESTION_PER_USER, REVIEW_PER_USER};
use crate::state::AppState;

use super::see_other;

/// One option of a filter facet (checkbox or select).
#[derive(Debug, Clone)]
pub struct FacetOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// Product listing page template, shared by `/products`, brand and category pages.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductListTemplate {
    pub page: PageContext,
    pub heading: String,
    pub intro: String,
    /// Path the filter form submits to.
    pub base_path: String,
    pub products: Vec<Product>,
    pub pagination: Pagination,
    pub q: String,
    pub min_price: String,
    pub max_price: String,
    pub in_stock: bool,
    pub narrowed: bool,
    pub brand_options: Vec<FacetOption>,
    pub category_options: Vec<FacetOption>,
    pub viscosity_options: Vec<FacetOption>,
    pub sort_options: Vec<FacetOption>,
    pub car: Option<String>,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

/// Which facets a listing page offers.
#[derive(Debug, Clone, Copy)]
pub struct Facets {
    pub brands: bool,
    pub categories: bool,
}

impl Facets {
    pub const ALL: Self = Self {
        brands: true,
        categories: true,
    };
}

/// Run a filtered listing and build its template.
pub(crate) async fn render_listing(
    state: &AppState,
    page: PageContext,
    filter: &ProductFilter,
    heading: String,
    intro: String,
    base_path: String,
    facets: Facets,
) -> Result<ProductListTemplate> {
    let pool = state.pool();
    let (products, pagination) = ProductRepository::new(pool).search(filter).await?;

    let brand_options = if facets.brands {
        state
            .catalog()
            .brands(pool)
            .await?
            .iter()
            .map(|b| FacetOption {
                value: b.slug.clone(),
                label: b.name.clone(),
                selected: filter.has_brand(&b.slug),
            })
            .collect()
    } else {
        Vec::new()
    };

    let category_options = if facets.categories {
        state
            .catalog()
            .categories(pool)
            .await?
            .iter()
            .map(|c| FacetOption {
                value: c.slug.clone(),
                label: c.name.clone(),
                selected: filter.category.as_deref() == Some(c.slug.as_str()),
            })
            .collect()
    } else {
        Vec::new()
    };

    let viscosity_options = state
        .catalog()
        .viscosities(pool)
        .await?
        .iter()
        .map(|v| FacetOption {
            value: v.clone(),
            label: v.clone(),
            selected: filter.viscosity.as_deref() == Some(v.as_str()),
        })
        .collect();

    let sort_options = SortOrder::ALL
        .into_iter()
        .map(|s| FacetOption {
            value: s.as_str().to_string(),
            label: s.label().to_string(),
            selected: s == filter.sort,
        })
        .collect();

    let page_url = |n: u32| {
        let query = filter.query_for_page(n);
        if query.is_empty() {
            base_path.clone()
        } else {
            format!("{base_path}?{query}")
        }
    };
    let prev_url = pagination.has_prev().then(|| page_url(pagination.prev()));
    let next_url = pagination.has_next().then(|| page_url(pagination.next()));

    Ok(ProductListTemplate {
        page,
        heading,
        intro,
        products,
        pagination,
        q: filter.q.clone().unwrap_or_default(),
        min_price: filter
            .min_price
            .map(|p| p.amount().to_string())
            .unwrap_or_default(),
        max_price: filter
            .max_price
            .map(|p| p.amount().to_string())
            .unwrap_or_default(),
        in_stock: filter.in_stock,
        narrowed: filter.is_narrowed(),
        brand_options,
        category_options,
        viscosity_options,
        sort_options,
        car: filter.car.clone(),
        prev_url,
        next_url,
        base_path,
    })
}

/// Display the filtered product listing.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse> {
    let filter = ProductFilter::from_query(query.as_deref().unwrap_or_default());
    render_listing(
        &state,
        page,
        &filter,
        "روغن موتور".to_string(),
        String::new(),
        "/products".to_string(),
        Facets::ALL,
    )
    .await
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductTemplate {
    pub page: PageContext,
    pub product: Product,
    pub cars: Vec<Car>,
    pub reviews: Vec<Review>,
    pub rating: RatingSummary,
    pub questions: Vec<Question>,
    pub in_compare: bool,
}

/// Display a product with fitment, reviews and answered questions.
#[instrument(skip(state, page, session))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let pool = state.pool();
    let products = ProductRepository::new(pool);
    let product = products
        .get_active_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;

    let reviews = ReviewRepository::new(pool);
    let question_repo = QuestionRepository::new(pool);
    let (cars, approved, rating, questions) = tokio::try_join!(
        products.cars_for(product.id),
        reviews.approved_for(product.id),
        reviews.summary(product.id),
        question_repo.published(QuestionSubject::Product(product.id)),
    )?;

    let session_key = session.id().map(|id| id.to_string());
    if let Err(e) = EngagementRepository::new(pool)
        .record(
            EngagementKind::ProductView,
            Some(product.id),
            page.user.as_ref().map(|u| u.id),
            session_key.as_deref(),
        )
        .await
    {
        tracing::warn!(error = %e, "Failed to record product view");
    }

    let in_compare = compare_ids(&session).await.contains(&product.id);

    Ok(ProductTemplate {
        page,
        product,
        cars,
        reviews: approved,
        rating,
        questions,
        in_compare,
    })
}

/// Ask a question about a product. Questions are published after moderation.
#[instrument(skip(state, session, headers, form), fields(user_id = %user.id))]
pub async fn ask_question(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Form(form): Form<QuestionForm>,
) -> Result<Response> {
    let pool = state.pool();
    let back = format!("/products/{slug}#questions");
    let product = ProductRepository::new(pool)
        .get_active_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;

    let body = match form.validate() {
        Ok(body) => body,
        Err(errors) => {
            Flash::error(errors.get("body").unwrap_or_default()).set(&session).await;
            return Ok(see_other(&headers, &back));
        }
    };

    let decision = RateLimiter::new(pool)
        .hit(QUESTION_PER_USER, &user.id.to_string())
        .await?;
    if !decision.allowed {
        Flash::error(decision.user_message()).set(&session).await;
        return Ok(see_other(&headers, &back));
    }

    QuestionRepository::new(pool)
        .create(QuestionSubject::Product(product.id), user.id, &body)
        .await?;
    add_breadcrumb("community", "Product question submitted", Some(&[("product", slug.as_str())]));

    Flash::success("سؤال شما ثبت شد و پس از بررسی منتشر می‌شود.")
        .set(&session)
        .await;
    Ok(see_other(&headers, &back))
}

/// Submit a review. One review per customer and product, shown after approval.
#[instrument(skip(state, session, headers, form), fields(user_id = %user.id))]
pub async fn submit_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Form(form): Form<ReviewForm>,
) -> Result<Response> {
    let pool = state.pool();
    let back = format!("/products/{slug}#reviews");
    let product = ProductRepository::new(pool)
        .get_active_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;

    let (rating, body) = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => {
            let message = errors
                .get("rating")
                .or_else(|| errors.get("body"))
                .unwrap_or_default();
            Flash::error(message).set(&session).await;
            return Ok(see_other(&headers, &back));
        }
    };

    let decision = RateLimiter::new(pool)
        .hit(REVIEW_PER_USER, &user.id.to_string())
        .await?;
    if !decision.allowed {
        Flash::error(decision.user_message()).set(&session).await;
        return Ok(see_other(&headers, &back));
    }

    let flash = match ReviewRepository::new(pool)
        .create(product.id, user.id, rating, &body)
        .await
    {
        Ok(_) => Flash::success("نظر شما ثبت شد و پس از تأیید نمایش داده می‌شود."),
        Err(RepositoryError::Conflict(_)) => {
            Flash::error("شما قبلاً برای این محصول نظر ثبت کرده‌اید.")
        }
        Err(e) => return Err(e.into()),
    };
    flash.set(&session).await;
    Ok(see_other(&headers, &back))
}
