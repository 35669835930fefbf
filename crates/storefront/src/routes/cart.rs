//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! Signed-in users own their cart; guests get a cart token in the session
//! that is merged into the user's cart at sign-in.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{AppendHeaders, Html, IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use roghan_core::{EngagementKind, ProductId};

use crate::db::carts::CartOwner;
use crate::db::{CartRepository, EngagementRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{OptionalAuth, PageContext, cart_owner, cart_owner_or_create};
use crate::models::cart::{CartView, clamp_quantity};
use crate::state::AppState;
use crate::validation::normalize_digits;

use super::{is_htmx, see_other};

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: PageContext,
    pub cart: CartView,
    pub unavailable: Vec<String>,
}

/// Cart items fragment template (for HTMX updates).
#[derive(Template, WebTemplate)]
#[template(path = "cart/items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
    pub unavailable: Vec<String>,
}

/// Cart count badge fragment.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: i64,
}

/// Form data for adding to cart.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i64,
    #[serde(default)]
    pub quantity: String,
}

/// Form data for updating a line.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: i64,
    #[serde(default)]
    pub quantity: String,
}

/// Form data for removing a line.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: i64,
}

/// Parse a quantity field; blank or malformed input means one.
fn parse_quantity(raw: &str) -> i32 {
    normalize_digits(raw.trim()).parse().unwrap_or(1)
}

/// Load the cart for an owner, or an empty view when there is none yet.
pub(crate) async fn load_cart(state: &AppState, owner: Option<CartOwner>) -> Result<CartView> {
    let Some(owner) = owner else {
        return Ok(CartView::new(Vec::new(), &state.config().shipping));
    };
    let carts = CartRepository::new(state.pool());
    let lines = match carts.find(owner).await? {
        Some(cart_id) => carts.lines(cart_id).await?,
        None => Vec::new(),
    };
    Ok(CartView::new(lines, &state.config().shipping))
}

async fn items_fragment(state: &AppState, owner: Option<CartOwner>) -> Result<Response> {
    let cart = load_cart(state, owner).await?;
    let unavailable = cart.unavailable();
    Ok((
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartItemsTemplate { cart, unavailable },
    )
        .into_response())
}

/// Display the cart page.
#[instrument(skip(state, page, session))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
) -> Result<impl IntoResponse> {
    let owner = cart_owner(&session, page.user.as_ref()).await;
    let cart = load_cart(&state, owner).await?;
    let unavailable = cart.unavailable();
    Ok(CartShowTemplate {
        page,
        cart,
        unavailable,
    })
}

/// Add a product to the cart.
///
/// HTMX requests get a short confirmation and a `cart-updated` trigger;
/// plain form posts are redirected to the cart page.
#[instrument(skip(state, session, user, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let product_id = ProductId::new(form.product_id);
    let quantity = clamp_quantity(parse_quantity(&form.quantity));

    let owner = cart_owner_or_create(&session, user.as_ref()).await?;
    let carts = CartRepository::new(state.pool());
    let cart_id = carts.get_or_create(owner).await?;
    carts
        .add(cart_id, product_id, quantity)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => {
                AppError::BadRequest("این محصول در حال حاضر قابل سفارش نیست.".to_string())
            }
            other => other.into(),
        })?;

    let session_key = session.id().map(|id| id.to_string());
    if let Err(e) = EngagementRepository::new(state.pool())
        .record(
            EngagementKind::AddToCart,
            Some(product_id),
            user.as_ref().map(|u| u.id),
            session_key.as_deref(),
        )
        .await
    {
        tracing::warn!(error = %e, "Failed to record add-to-cart event");
    }

    tracing::info!(product_id = %product_id, quantity, "Added to cart");

    if is_htmx(&headers) {
        Ok((
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            Html(r#"<span class="added-to-cart" role="status">به سبد خرید اضافه شد.</span>"#),
        )
            .into_response())
    } else {
        Ok(see_other(&headers, "/cart"))
    }
}

/// Update a line's quantity. Zero removes the line.
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let owner = cart_owner(&session, user.as_ref()).await;
    let carts = CartRepository::new(state.pool());
    let product_id = ProductId::new(form.product_id);

    if let Some(owner) = owner
        && let Some(cart_id) = carts.find(owner).await?
    {
        let requested = parse_quantity(&form.quantity);
        if requested <= 0 {
            carts.remove(cart_id, product_id).await?;
        } else {
            match carts
                .set_quantity(cart_id, product_id, clamp_quantity(requested))
                .await
            {
                Ok(()) | Err(RepositoryError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    items_fragment(&state, owner).await
}

/// Remove a line from the cart.
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let owner = cart_owner(&session, user.as_ref()).await;
    let carts = CartRepository::new(state.pool());

    if let Some(owner) = owner
        && let Some(cart_id) = carts.find(owner).await?
    {
        carts.remove(cart_id, ProductId::new(form.product_id)).await?;
    }

    items_fragment(&state, owner).await
}

/// Cart count badge fragment.
#[instrument(skip(state, session, user))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<impl IntoResponse> {
    let count = match cart_owner(&session, user.as_ref()).await {
        Some(owner) => CartRepository::new(state.pool()).item_count(owner).await?,
        None => 0,
    };
    Ok(CartCountTemplate { count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("3"), 3);
        assert_eq!(parse_quantity("۲"), 2);
        assert_eq!(parse_quantity(""), 1);
        assert_eq!(parse_quantity("abc"), 1);
        assert_eq!(parse_quantity("0"), 0);
    }
}
