//! Catalog models: brands, categories, products, cars and the listing filter.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use roghan_core::{BrandId, CarId, CategoryId, MaintenanceTaskId, ProductId, Slug, Toman};

use crate::validation::{FieldErrors, normalize_digits};

/// Products per listing page.
pub const PAGE_SIZE: u32 = 12;

/// Products allowed on the comparison board at once.
pub const COMPARE_LIMIT: usize = 4;

/// An oil manufacturer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Brand {
    pub id: BrandId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub logo_url: Option<String>,
}

/// A product category. Categories nest one level deep for filtering.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub slug: String,
    pub name: String,
    pub parent_id: Option<CategoryId>,
    pub position: i32,
}

/// A sellable product with its brand and category names joined in.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub brand_id: BrandId,
    pub brand_name: String,
    pub brand_slug: String,
    pub category_id: CategoryId,
    pub category_name: String,
    pub category_slug: String,
    pub description: String,
    pub viscosity: String,
    pub api_grade: String,
    pub acea_grade: String,
    pub oil_type: String,
    pub volume_liters: Decimal,
    pub price: Toman,
    pub compare_at: Option<Toman>,
    pub stock: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether at least one unit can be ordered.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.is_active && self.stock > 0
    }

    /// Percent off the "compare at" price, if discounted.
    #[must_use]
    pub fn discount_percent(&self) -> Option<u8> {
        self.compare_at
            .and_then(|compare_at| self.price.discount_percent_from(compare_at))
    }

    /// Volume without trailing zeros, e.g. `4` or `1.5`.
    #[must_use]
    pub fn volume_label(&self) -> String {
        self.volume_liters.normalize().to_string()
    }
}

/// Rating aggregate for a product's approved reviews.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct RatingSummary {
    pub average: Option<Decimal>,
    pub count: i64,
}

impl RatingSummary {
    /// Average rounded to one decimal place, e.g. `4.3`.
    #[must_use]
    pub fn average_label(&self) -> String {
        self.average
            .map(|avg| avg.round_dp(1).normalize().to_string())
            .unwrap_or_default()
    }
}

/// A car model that products can be matched against.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Car {
    pub id: CarId,
    pub slug: String,
    pub make: String,
    pub model: String,
    pub engine: String,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub oil_capacity_liters: Option<Decimal>,
    pub recommended_viscosity: String,
}

impl Car {
    /// `Make Model`, with the engine when known.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.engine.is_empty() {
            format!("{} {}", self.make, self.model)
        } else {
            format!("{} {} ({})", self.make, self.model, self.engine)
        }
    }

    /// Production years, e.g. `1390-1399` or `از 1395`.
    #[must_use]
    pub fn years_label(&self) -> String {
        match (self.year_from, self.year_to) {
            (Some(from), Some(to)) if from == to => from.to_string(),
            (Some(from), Some(to)) => format!("{from}-{to}"),
            (Some(from), None) => format!("از {from}"),
            (None, Some(to)) => format!("تا {to}"),
            (None, None) => String::new(),
        }
    }

    /// Oil capacity without trailing zeros.
    #[must_use]
    pub fn capacity_label(&self) -> String {
        self.oil_capacity_liters
            .map(|c| c.normalize().to_string())
            .unwrap_or_default()
    }
}

/// A recurring service item in a car's maintenance schedule.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MaintenanceTask {
    pub id: MaintenanceTaskId,
    pub car_id: CarId,
    pub title: String,
    pub interval_km: Option<i32>,
    pub interval_months: Option<i32>,
    pub notes: String,
    pub position: i32,
}

impl MaintenanceTask {
    /// Human-readable interval, e.g. `هر 5000 کیلومتر یا 6 ماه`.
    #[must_use]
    pub fn interval_label(&self) -> String {
        match (self.interval_km, self.interval_months) {
            (Some(km), Some(months)) => format!("هر {km} کیلومتر یا {months} ماه"),
            (Some(km), None) => format!("هر {km} کیلومتر"),
            (None, Some(months)) => format!("هر {months} ماه"),
            (None, None) => String::new(),
        }
    }
}

// =============================================================================
// Listing Filter
// =============================================================================

/// Listing sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    /// Most viewed in the last 30 days.
    Popular,
}

impl SortOrder {
    pub const ALL: [Self; 4] = [Self::Newest, Self::PriceAsc, Self::PriceDesc, Self::Popular];

    /// Query-string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Popular => "popular",
        }
    }

    /// Persian label for the sort dropdown.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Newest => "جدیدترین",
            Self::PriceAsc => "ارزان‌ترین",
            Self::PriceDesc => "گران‌ترین",
            Self::Popular => "پربازدیدترین",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

/// Product listing filter parsed from the query string.
///
/// Unknown parameters and malformed numbers are ignored rather than rejected,
/// so a hand-edited URL still yields a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub q: Option<String>,
    pub brands: Vec<String>,
    pub category: Option<String>,
    pub viscosity: Option<String>,
    pub car: Option<String>,
    pub min_price: Option<Toman>,
    pub max_price: Option<Toman>,
    pub in_stock: bool,
    pub sort: SortOrder,
    /// Requested 1-based page, before clamping against the result count.
    pub page: u32,
}

impl ProductFilter {
    /// Parse a raw query string such as `brand=castrol&brand=shell&page=2`.
    #[must_use]
    pub fn from_query(raw: &str) -> Self {
        let mut filter = Self {
            page: 1,
            ..Self::default()
        };

        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "q" => filter.q = Some(value.chars().take(100).collect()),
                "brand" => {
                    if !filter.brands.iter().any(|b| b == value) {
                        filter.brands.push(value.to_owned());
                    }
                }
                "category" => filter.category = Some(value.to_owned()),
                "viscosity" => filter.viscosity = Some(value.to_uppercase()),
                "car" => filter.car = Some(value.to_owned()),
                "min_price" => filter.min_price = Toman::parse(value).ok(),
                "max_price" => filter.max_price = Toman::parse(value).ok(),
                "in_stock" => filter.in_stock = matches!(value, "1" | "true" | "on"),
                "sort" => filter.sort = SortOrder::parse(value).unwrap_or_default(),
                "page" => {
                    filter.page = normalize_digits(value)
                        .parse::<u32>()
                        .ok()
                        .filter(|p| *p > 0)
                        .unwrap_or(1);
                }
                _ => {}
            }
        }

        if let (Some(min), Some(max)) = (filter.min_price, filter.max_price)
            && min > max
        {
            filter.min_price = Some(max);
            filter.max_price = Some(min);
        }

        filter
    }

    /// Query string for the same filter on another page.
    #[must_use]
    pub fn query_for_page(&self, page: u32) -> String {
        let mut out = url::form_urlencoded::Serializer::new(String::new());
        if let Some(q) = &self.q {
            out.append_pair("q", q);
        }
        for brand in &self.brands {
            out.append_pair("brand", brand);
        }
        if let Some(category) = &self.category {
            out.append_pair("category", category);
        }
        if let Some(viscosity) = &self.viscosity {
            out.append_pair("viscosity", viscosity);
        }
        if let Some(car) = &self.car {
            out.append_pair("car", car);
        }
        if let Some(min) = self.min_price {
            out.append_pair("min_price", &min.amount().to_string());
        }
        if let Some(max) = self.max_price {
            out.append_pair("max_price", &max.amount().to_string());
        }
        if self.in_stock {
            out.append_pair("in_stock", "1");
        }
        if self.sort != SortOrder::Newest {
            out.append_pair("sort", self.sort.as_str());
        }
        if page > 1 {
            out.append_pair("page", &page.to_string());
        }
        out.finish()
    }

    /// Whether a brand checkbox should render checked.
    #[must_use]
    pub fn has_brand(&self, slug: &str) -> bool {
        self.brands.iter().any(|b| b == slug)
    }

    /// Whether any narrowing parameter is set.
    #[must_use]
    pub fn is_narrowed(&self) -> bool {
        self.q.is_some()
            || !self.brands.is_empty()
            || self.category.is_some()
            || self.viscosity.is_some()
            || self.car.is_some()
            || self.min_price.is_some()
            || self.max_price.is_some()
            || self.in_stock
    }
}

/// Page position within a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current 1-based page, clamped to `[1, total_pages]`.
    pub page: u32,
    pub per_page: u32,
    pub total_items: i64,
}

impl Pagination {
    /// Clamp a requested page against the total item count.
    #[must_use]
    pub fn new(requested_page: u32, per_page: u32, total_items: i64) -> Self {
        let per_page = per_page.max(1);
        let total_pages = Self::pages_for(total_items, per_page);
        Self {
            page: requested_page.clamp(1, total_pages),
            per_page,
            total_items,
        }
    }

    fn pages_for(total_items: i64, per_page: u32) -> u32 {
        let total = u64::try_from(total_items.max(0)).unwrap_or(0);
        let pages = total.div_ceil(u64::from(per_page)).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Number of pages (at least one, even when empty).
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        Self::pages_for(self.total_items, self.per_page)
    }

    /// SQL `OFFSET` for the current page.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    /// SQL `LIMIT`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    #[must_use]
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    #[must_use]
    pub fn prev(&self) -> u32 {
        self.page.saturating_sub(1).max(1)
    }

    #[must_use]
    pub fn next(&self) -> u32 {
        (self.page + 1).min(self.total_pages())
    }
}

// =============================================================================
// Admin Forms
// =============================================================================

/// Raw product form from the back-office.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub brand_id: String,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub viscosity: String,
    #[serde(default)]
    pub api_grade: String,
    #[serde(default)]
    pub acea_grade: String,
    #[serde(default)]
    pub oil_type: String,
    #[serde(default)]
    pub volume_liters: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub compare_at: String,
    #[serde(default)]
    pub stock: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub is_active: Option<String>,
    /// Comma-separated car IDs this product fits.
    #[serde(default)]
    pub car_ids: String,
}

/// A validated product ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInput {
    pub name: String,
    pub slug: Slug,
    pub brand_id: BrandId,
    pub category_id: CategoryId,
    pub description: String,
    pub viscosity: String,
    pub api_grade: String,
    pub acea_grade: String,
    pub oil_type: String,
    pub volume_liters: Decimal,
    pub price: Toman,
    pub compare_at: Option<Toman>,
    pub stock: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub car_ids: Vec<CarId>,
}

impl ProductForm {
    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(&self) -> Result<ProductInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = errors.required("name", &self.name);
        errors.max_chars("name", &name, 200);
        let slug = errors.slug("slug", &self.slug, &name);
        let brand_id = parse_id(&mut errors, "brand_id", &self.brand_id).map(BrandId::new);
        let category_id =
            parse_id(&mut errors, "category_id", &self.category_id).map(CategoryId::new);
        let price = errors.price("price", &self.price);
        let compare_at = errors.optional_price("compare_at", &self.compare_at);
        if let (Some(price), Some(compare_at)) = (price, compare_at)
            && compare_at <= price
        {
            errors.add("compare_at", "قیمت قبل از تخفیف باید بیشتر از قیمت فروش باشد.");
        }
        let stock = errors.int_in_range("stock", &self.stock, 0..=1_000_000);
        let volume_liters = match normalize_digits(self.volume_liters.trim()).parse::<Decimal>() {
            Ok(v) if v > Decimal::ZERO && v < Decimal::from(1000) => Some(v),
            _ => {
                errors.add("volume_liters", "حجم را به لیتر وارد کنید (مثال: 4 یا 1.5).");
                None
            }
        };

        let mut car_ids = Vec::new();
        for part in self.car_ids.split([',', '،', ' ']).filter(|p| !p.is_empty()) {
            match normalize_digits(part).parse::<i64>() {
                Ok(id) if id > 0 => car_ids.push(CarId::new(id)),
                _ => errors.add("car_ids", "شناسه خودروها باید با ویرگول جدا شوند."),
            }
        }

        let (
            Some(slug),
            Some(brand_id),
            Some(category_id),
            Some(price),
            Some(stock),
            Some(volume_liters),
        ) = (slug, brand_id, category_id, price, stock, volume_liters)
        else {
            return Err(errors);
        };

        errors.finish(ProductInput {
            name,
            slug,
            brand_id,
            category_id,
            description: self.description.trim().to_owned(),
            viscosity: self.viscosity.trim().to_uppercase(),
            api_grade: self.api_grade.trim().to_uppercase(),
            acea_grade: self.acea_grade.trim().to_uppercase(),
            oil_type: self.oil_type.trim().to_owned(),
            volume_liters,
            price,
            compare_at,
            stock,
            image_url: non_empty(&self.image_url),
            is_active: self.is_active.is_some(),
            car_ids,
        })
    }
}

impl ProductForm {
    /// Pre-fill the form from an existing product.
    #[must_use]
    pub fn from_product(product: &Product, car_ids: &[CarId]) -> Self {
        Self {
            name: product.name.clone(),
            slug: product.slug.clone(),
            brand_id: product.brand_id.to_string(),
            category_id: product.category_id.to_string(),
            description: product.description.clone(),
            viscosity: product.viscosity.clone(),
            api_grade: product.api_grade.clone(),
            acea_grade: product.acea_grade.clone(),
            oil_type: product.oil_type.clone(),
            volume_liters: product.volume_label(),
            price: product.price.amount().to_string(),
            compare_at: product
                .compare_at
                .map(|p| p.amount().to_string())
                .unwrap_or_default(),
            stock: product.stock.to_string(),
            image_url: product.image_url.clone().unwrap_or_default(),
            is_active: product.is_active.then(|| "on".to_string()),
            car_ids: car_ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Raw car form from the back-office.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CarForm {
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub year_from: String,
    #[serde(default)]
    pub year_to: String,
    #[serde(default)]
    pub oil_capacity_liters: String,
    #[serde(default)]
    pub recommended_viscosity: String,
}

/// A validated car.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarInput {
    pub make: String,
    pub model: String,
    pub slug: Slug,
    pub engine: String,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub oil_capacity_liters: Option<Decimal>,
    pub recommended_viscosity: String,
}

impl CarForm {
    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(&self) -> Result<CarInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        let make = errors.required("make", &self.make);
        let model = errors.required("model", &self.model);
        let slug = errors.slug("slug", &self.slug, &format!("{make} {model} {}", self.engine));
        let year_from = errors.optional_int("year_from", &self.year_from, 1300..=2100);
        let year_to = errors.optional_int("year_to", &self.year_to, 1300..=2100);
        if let (Some(from), Some(to)) = (year_from, year_to)
            && from > to
        {
            errors.add("year_to", "سال پایان نمی‌تواند قبل از سال شروع باشد.");
        }
        let oil_capacity_liters = if self.oil_capacity_liters.trim().is_empty() {
            None
        } else {
            match normalize_digits(self.oil_capacity_liters.trim()).parse::<Decimal>() {
                Ok(v) if v > Decimal::ZERO && v < Decimal::from(100) => Some(v),
                _ => {
                    errors.add("oil_capacity_liters", "ظرفیت روغن را به لیتر وارد کنید.");
                    None
                }
            }
        };

        let Some(slug) = slug else {
            return Err(errors);
        };

        errors.finish(CarInput {
            make,
            model,
            slug,
            engine: self.engine.trim().to_owned(),
            year_from,
            year_to,
            oil_capacity_liters,
            recommended_viscosity: self.recommended_viscosity.trim().to_uppercase(),
        })
    }
}

impl From<&Car> for CarForm {
    fn from(car: &Car) -> Self {
        Self {
            make: car.make.clone(),
            model: car.model.clone(),
            slug: car.slug.clone(),
            engine: car.engine.clone(),
            year_from: car.year_from.map(|y| y.to_string()).unwrap_or_default(),
            year_to: car.year_to.map(|y| y.to_string()).unwrap_or_default(),
            oil_capacity_liters: car.capacity_label(),
            recommended_viscosity: car.recommended_viscosity.clone(),
        }
    }
}

/// Raw maintenance task form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaintenanceTaskForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub interval_km: String,
    #[serde(default)]
    pub interval_months: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub position: String,
}

/// A validated maintenance task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceTaskInput {
    pub title: String,
    pub interval_km: Option<i32>,
    pub interval_months: Option<i32>,
    pub notes: String,
    pub position: i32,
}

impl MaintenanceTaskForm {
    /// Validate every field. At least one interval is required.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(&self) -> Result<MaintenanceTaskInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        let title = errors.required("title", &self.title);
        let interval_km = errors.optional_int("interval_km", &self.interval_km, 1..=1_000_000);
        let interval_months =
            errors.optional_int("interval_months", &self.interval_months, 1..=240);
        if interval_km.is_none()
            && interval_months.is_none()
            && !errors.has("interval_km")
            && !errors.has("interval_months")
        {
            errors.add("interval_km", "حداقل یکی از بازه‌های کیلومتری یا زمانی را وارد کنید.");
        }
        let position = errors
            .optional_int("position", &self.position, 0..=10_000)
            .unwrap_or(0);

        errors.finish(MaintenanceTaskInput {
            title,
            interval_km,
            interval_months,
            notes: self.notes.trim().to_owned(),
            position,
        })
    }
}

impl From<&MaintenanceTask> for MaintenanceTaskForm {
    fn from(task: &MaintenanceTask) -> Self {
        Self {
            title: task.title.clone(),
            interval_km: task.interval_km.map(|km| km.to_string()).unwrap_or_default(),
            interval_months: task
                .interval_months
                .map(|m| m.to_string())
                .unwrap_or_default(),
            notes: task.notes.clone(),
            position: task.position.to_string(),
        }
    }
}

/// Raw brand form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrandForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo_url: String,
}

/// A validated brand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandInput {
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub logo_url: Option<String>,
}

impl BrandForm {
    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(&self) -> Result<BrandInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = errors.required("name", &self.name);
        let Some(slug) = errors.slug("slug", &self.slug, &name) else {
            return Err(errors);
        };
        errors.finish(BrandInput {
            name,
            slug,
            description: self.description.trim().to_owned(),
            logo_url: non_empty(&self.logo_url),
        })
    }
}

impl From<&Brand> for BrandForm {
    fn from(brand: &Brand) -> Self {
        Self {
            name: brand.name.clone(),
            slug: brand.slug.clone(),
            description: brand.description.clone(),
            logo_url: brand.logo_url.clone().unwrap_or_default(),
        }
    }
}

/// Raw category form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub position: String,
}

/// A validated category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInput {
    pub name: String,
    pub slug: Slug,
    pub parent_id: Option<CategoryId>,
    pub position: i32,
}

impl CategoryForm {
    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(&self) -> Result<CategoryInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = errors.required("name", &self.name);
        let slug = errors.slug("slug", &self.slug, &name);
        let parent_id = if self.parent_id.trim().is_empty() {
            None
        } else {
            parse_id(&mut errors, "parent_id", &self.parent_id).map(CategoryId::new)
        };
        let position = errors
            .optional_int("position", &self.position, 0..=10_000)
            .unwrap_or(0);
        let Some(slug) = slug else {
            return Err(errors);
        };
        errors.finish(CategoryInput {
            name,
            slug,
            parent_id,
            position,
        })
    }
}

impl From<&Category> for CategoryForm {
    fn from(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            slug: category.slug.clone(),
            parent_id: category.parent_id.map(|id| id.to_string()).unwrap_or_default(),
            position: category.position.to_string(),
        }
    }
}

fn parse_id(errors: &mut FieldErrors, field: &'static str, value: &str) -> Option<i64> {
    match normalize_digits(value.trim()).parse::<i64>() {
        Ok(id) if id > 0 => Some(id),
        _ => {
            errors.add(field, "یک گزینه را انتخاب کنید.");
            None
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_parses_repeated_brands_and_numbers() {
        let filter = ProductFilter::from_query(
            "q=edge&brand=castrol&brand=shell&brand=castrol&viscosity=5w30&min_price=۱۰۰۰۰۰&in_stock=1&sort=price_desc&page=3",
        );
        assert_eq!(filter.q.as_deref(), Some("edge"));
        assert_eq!(filter.brands, vec!["castrol", "shell"]);
        assert_eq!(filter.viscosity.as_deref(), Some("5W30"));
        assert_eq!(filter.min_price, Some(Toman::new(100_000)));
        assert!(filter.in_stock);
        assert_eq!(filter.sort, SortOrder::PriceDesc);
        assert_eq!(filter.page, 3);
    }

    #[test]
    fn test_filter_ignores_garbage() {
        let filter = ProductFilter::from_query("page=-4&min_price=cheap&sort=random&unknown=1&q=");
        assert_eq!(filter.page, 1);
        assert_eq!(filter.min_price, None);
        assert_eq!(filter.sort, SortOrder::Newest);
        assert_eq!(filter.q, None);
        assert!(!filter.is_narrowed());
    }

    #[test]
    fn test_filter_swaps_inverted_price_range() {
        let filter = ProductFilter::from_query("min_price=500000&max_price=100000");
        assert_eq!(filter.min_price, Some(Toman::new(100_000)));
        assert_eq!(filter.max_price, Some(Toman::new(500_000)));
    }

    #[test]
    fn test_query_for_page_preserves_filter() {
        let filter = ProductFilter::from_query("brand=mobil&sort=popular&page=2");
        assert_eq!(filter.query_for_page(3), "brand=mobil&sort=popular&page=3");
        assert_eq!(filter.query_for_page(1), "brand=mobil&sort=popular");
        let reparsed = ProductFilter::from_query(&filter.query_for_page(2));
        assert_eq!(reparsed, filter);
    }

    #[test]
    fn test_pagination_clamps_page() {
        let p = Pagination::new(10, PAGE_SIZE, 30);
        assert_eq!(p.total_pages(), 3);
        assert_eq!(p.page, 3);
        assert_eq!(p.offset(), 24);
        assert!(p.has_prev());
        assert!(!p.has_next());

        let empty = Pagination::new(5, PAGE_SIZE, 0);
        assert_eq!(empty.total_pages(), 1);
        assert_eq!(empty.page, 1);
        assert_eq!(empty.offset(), 0);
    }

    #[test]
    fn test_pagination_exact_multiple() {
        let p = Pagination::new(2, 12, 24);
        assert_eq!(p.total_pages(), 2);
        assert_eq!(p.prev(), 1);
        assert_eq!(p.next(), 2);
    }

    #[test]
    fn test_product_form_validation() {
        let form = ProductForm {
            name: "Castrol EDGE 5W-30".to_string(),
            brand_id: "1".to_string(),
            category_id: "2".to_string(),
            viscosity: "5w-30".to_string(),
            volume_liters: "۴".to_string(),
            price: "1,850,000".to_string(),
            compare_at: "2000000".to_string(),
            stock: "12".to_string(),
            is_active: Some("on".to_string()),
            car_ids: "3, 5".to_string(),
            ..ProductForm::default()
        };
        let input = form.validate().unwrap();
        assert_eq!(input.slug.as_str(), "castrol-edge-5w-30");
        assert_eq!(input.viscosity, "5W-30");
        assert_eq!(input.volume_liters, Decimal::from(4));
        assert_eq!(input.car_ids, vec![CarId::new(3), CarId::new(5)]);
        assert!(input.is_active);
    }

    #[test]
    fn test_product_form_rejects_compare_at_below_price() {
        let form = ProductForm {
            name: "X".to_string(),
            brand_id: "1".to_string(),
            category_id: "1".to_string(),
            volume_liters: "1".to_string(),
            price: "500".to_string(),
            compare_at: "400".to_string(),
            stock: "0".to_string(),
            ..ProductForm::default()
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.has("compare_at"));
    }

    #[test]
    fn test_task_form_requires_an_interval() {
        let form = MaintenanceTaskForm {
            title: "تعویض روغن".to_string(),
            ..MaintenanceTaskForm::default()
        };
        assert!(form.validate().unwrap_err().has("interval_km"));

        let form = MaintenanceTaskForm {
            title: "تعویض روغن".to_string(),
            interval_months: "6".to_string(),
            ..MaintenanceTaskForm::default()
        };
        assert_eq!(form.validate().unwrap().interval_months, Some(6));
    }

    #[test]
    fn test_car_labels() {
        let car = Car {
            id: CarId::new(1),
            slug: "peugeot-206".to_string(),
            make: "پژو".to_string(),
            model: "206".to_string(),
            engine: "TU5".to_string(),
            year_from: Some(1385),
            year_to: None,
            oil_capacity_liters: Some(Decimal::new(350, 2)),
            recommended_viscosity: "10W-40".to_string(),
        };
        assert_eq!(car.display_name(), "پژو 206 (TU5)");
        assert_eq!(car.years_label(), "از 1385");
        assert_eq!(car.capacity_label(), "3.5");
    }

    #[test]
    fn test_rating_average_label() {
        let summary = RatingSummary {
            average: Some(Decimal::new(43333, 4)),
            count: 3,
        };
        assert_eq!(summary.average_label(), "4.3");
        assert_eq!(RatingSummary::default().average_label(), "");
    }
}
