//! Catalog seeding from a YAML file.
//!
//! Entries are matched by slug: an existing brand, category, car or product
//! is updated in place, anything else is created, so the same file can be
//! applied repeatedly. Every entry goes through the same validation as the
//! back-office forms.
//!
//! ```yaml
//! brands:
//!   - { name: Castrol, slug: castrol }
//! categories:
//!   - { name: روغن موتور, slug: engine-oil }
//! cars:
//!   - make: ایران‌خودرو
//!     model: سمند
//!     slug: samand-ef7
//!     recommended_viscosity: 10W-40
//!     tasks:
//!       - { title: تعویض روغن موتور, interval_km: 5000, interval_months: 6 }
//! products:
//!   - name: Castrol Magnatec 10W-40
//!     brand: castrol
//!     category: engine-oil
//!     volume_liters: 4
//!     price: 2450000
//!     cars: [samand-ef7]
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use roghan_core::{BrandId, CarId, CategoryId};
use roghan_storefront::db::RepositoryError;
use roghan_storefront::db::brands::BrandRepository;
use roghan_storefront::db::cars::CarRepository;
use roghan_storefront::db::categories::CategoryRepository;
use roghan_storefront::db::products::ProductRepository;
use roghan_storefront::models::catalog::{
    BrandForm, CarForm, CategoryForm, MaintenanceTaskForm, ProductForm,
};
use roghan_storefront::validation::FieldErrors;

use super::ConnectError;

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid catalog YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An entry failed validation.
    #[error("{entry}: {message}")]
    Invalid { entry: String, message: String },

    /// A product or category refers to a slug not defined earlier.
    #[error("{entry}: unknown {kind} '{slug}'")]
    UnknownReference {
        entry: String,
        kind: &'static str,
        slug: String,
    },

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Top-level catalog file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    #[serde(default)]
    pub brands: Vec<BrandEntry>,
    /// Parents must be listed before their children.
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
    #[serde(default)]
    pub cars: Vec<CarEntry>,
    #[serde(default)]
    pub products: Vec<ProductEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrandEntry {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryEntry {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    /// Slug of the parent category.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CarEntry {
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub year_from: Option<i32>,
    #[serde(default)]
    pub year_to: Option<i32>,
    #[serde(default)]
    pub oil_capacity_liters: Option<f64>,
    #[serde(default)]
    pub recommended_viscosity: String,
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskEntry {
    pub title: String,
    #[serde(default)]
    pub interval_km: Option<i32>,
    #[serde(default)]
    pub interval_months: Option<i32>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductEntry {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    /// Brand slug.
    pub brand: String,
    /// Category slug.
    pub category: String,
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
    pub volume_liters: f64,
    pub price: i64,
    #[serde(default)]
    pub compare_at: Option<i64>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Slugs of the cars the product fits.
    #[serde(default)]
    pub cars: Vec<String>,
}

const fn default_active() -> bool {
    true
}

fn opt_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl BrandEntry {
    fn form(&self) -> BrandForm {
        BrandForm {
            name: self.name.clone(),
            slug: self.slug.clone(),
            description: self.description.clone(),
            logo_url: self.logo_url.clone().unwrap_or_default(),
        }
    }
}

impl CategoryEntry {
    fn form(&self, parent_id: Option<CategoryId>) -> CategoryForm {
        CategoryForm {
            name: self.name.clone(),
            slug: self.slug.clone(),
            parent_id: opt_string(parent_id),
            position: self.position.to_string(),
        }
    }
}

impl CarEntry {
    fn label(&self) -> String {
        format!("car {} {}", self.make, self.model)
    }

    fn form(&self) -> CarForm {
        CarForm {
            make: self.make.clone(),
            model: self.model.clone(),
            slug: self.slug.clone(),
            engine: self.engine.clone(),
            year_from: opt_string(self.year_from),
            year_to: opt_string(self.year_to),
            oil_capacity_liters: opt_string(self.oil_capacity_liters),
            recommended_viscosity: self.recommended_viscosity.clone(),
        }
    }
}

impl TaskEntry {
    fn form(&self, position: usize) -> MaintenanceTaskForm {
        MaintenanceTaskForm {
            title: self.title.clone(),
            interval_km: opt_string(self.interval_km),
            interval_months: opt_string(self.interval_months),
            notes: self.notes.clone(),
            position: position.to_string(),
        }
    }
}

impl ProductEntry {
    fn form(&self, brand_id: BrandId, category_id: CategoryId, car_ids: &[CarId]) -> ProductForm {
        ProductForm {
            name: self.name.clone(),
            slug: self.slug.clone(),
            brand_id: brand_id.to_string(),
            category_id: category_id.to_string(),
            description: self.description.clone(),
            viscosity: self.viscosity.clone(),
            api_grade: self.api_grade.clone(),
            acea_grade: self.acea_grade.clone(),
            oil_type: self.oil_type.clone(),
            volume_liters: self.volume_liters.to_string(),
            price: self.price.to_string(),
            compare_at: opt_string(self.compare_at),
            stock: self.stock.to_string(),
            image_url: self.image_url.clone().unwrap_or_default(),
            is_active: self.active.then(|| "on".to_owned()),
            car_ids: car_ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl CatalogFile {
    /// Parse a catalog document.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Parse` on malformed YAML or unknown keys.
    pub fn parse(yaml: &str) -> Result<Self, SeedError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

fn invalid(entry: impl Into<String>, errors: &FieldErrors) -> SeedError {
    SeedError::Invalid {
        entry: entry.into(),
        message: errors.first().unwrap_or("invalid entry").to_owned(),
    }
}

fn lookup<T: Copy>(
    map: &HashMap<String, T>,
    entry: &str,
    kind: &'static str,
    slug: &str,
) -> Result<T, SeedError> {
    map.get(slug)
        .copied()
        .ok_or_else(|| SeedError::UnknownReference {
            entry: entry.to_owned(),
            kind,
            slug: slug.to_owned(),
        })
}

/// Counts reported at the end of a run.
#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    created: u32,
    updated: u32,
}

impl Tally {
    const fn record(&mut self, existed: bool) {
        if existed {
            self.updated += 1;
        } else {
            self.created += 1;
        }
    }
}

/// Apply a catalog YAML file to the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, an entry is
/// invalid or refers to an unknown slug, or a database write fails. Entries
/// before the failing one stay applied.
pub async fn catalog(path: &Path) -> Result<(), SeedError> {
    let yaml = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let file = CatalogFile::parse(&yaml)?;

    // Validate everything that does not need the database before touching it
    for brand in &file.brands {
        brand
            .form()
            .validate()
            .map_err(|e| invalid(format!("brand {}", brand.name), &e))?;
    }
    for car in &file.cars {
        car.form().validate().map_err(|e| invalid(car.label(), &e))?;
        for (position, task) in car.tasks.iter().enumerate() {
            task.form(position)
                .validate()
                .map_err(|e| invalid(format!("{} task {}", car.label(), task.title), &e))?;
        }
    }

    let pool = super::connect().await?;

    let brands = BrandRepository::new(&pool);
    let mut brand_ids = HashMap::new();
    let mut tally = Tally::default();
    for brand in &file.brands {
        let input = brand
            .form()
            .validate()
            .map_err(|e| invalid(format!("brand {}", brand.name), &e))?;
        let existing = brands.get_by_slug(input.slug.as_str()).await?;
        tally.record(existing.is_some());
        let id = match existing {
            Some(found) => {
                brands.update(found.id, &input).await?;
                found.id
            }
            None => brands.create(&input).await?,
        };
        brand_ids.insert(input.slug.as_str().to_owned(), id);
    }
    tracing::info!(created = tally.created, updated = tally.updated, "Brands seeded");

    let categories = CategoryRepository::new(&pool);
    let mut category_ids = HashMap::new();
    let mut tally = Tally::default();
    for category in &file.categories {
        let entry = format!("category {}", category.name);
        let parent_id = match &category.parent {
            Some(parent) => Some(lookup(&category_ids, &entry, "category", parent)?),
            None => None,
        };
        let input = category
            .form(parent_id)
            .validate()
            .map_err(|e| invalid(&entry, &e))?;
        let existing = categories.get_by_slug(input.slug.as_str()).await?;
        tally.record(existing.is_some());
        let id = match existing {
            Some(found) => {
                categories.update(found.id, &input).await?;
                found.id
            }
            None => categories.create(&input).await?,
        };
        category_ids.insert(input.slug.as_str().to_owned(), id);
    }
    tracing::info!(created = tally.created, updated = tally.updated, "Categories seeded");

    let cars = CarRepository::new(&pool);
    let mut car_ids = HashMap::new();
    let mut tally = Tally::default();
    for car in &file.cars {
        let input = car.form().validate().map_err(|e| invalid(car.label(), &e))?;
        let existing = cars.get_by_slug(input.slug.as_str()).await?;
        tally.record(existing.is_some());
        let id = match existing {
            Some(found) => {
                cars.update(found.id, &input).await?;
                found.id
            }
            None => cars.create(&input).await?,
        };

        // Tasks are matched by title within the car
        let current = cars.tasks(id).await?;
        for (position, task) in car.tasks.iter().enumerate() {
            let task_input = task
                .form(position)
                .validate()
                .map_err(|e| invalid(format!("{} task {}", car.label(), task.title), &e))?;
            match current.iter().find(|t| t.title == task_input.title) {
                Some(found) => cars.update_task(id, found.id, &task_input).await?,
                None => {
                    cars.create_task(id, &task_input).await?;
                }
            }
        }
        car_ids.insert(input.slug.as_str().to_owned(), id);
    }
    tracing::info!(created = tally.created, updated = tally.updated, "Cars seeded");

    let products = ProductRepository::new(&pool);
    let mut tally = Tally::default();
    for product in &file.products {
        let entry = format!("product {}", product.name);

        // Products may refer to rows seeded by an earlier run
        if !brand_ids.contains_key(&product.brand)
            && let Some(brand) = brands.get_by_slug(&product.brand).await?
        {
            brand_ids.insert(brand.slug, brand.id);
        }
        if !category_ids.contains_key(&product.category)
            && let Some(category) = categories.get_by_slug(&product.category).await?
        {
            category_ids.insert(category.slug, category.id);
        }
        for slug in &product.cars {
            if !car_ids.contains_key(slug)
                && let Some(car) = cars.get_by_slug(slug).await?
            {
                car_ids.insert(car.slug, car.id);
            }
        }

        let brand_id = lookup(&brand_ids, &entry, "brand", &product.brand)?;
        let category_id = lookup(&category_ids, &entry, "category", &product.category)?;
        let fits = product
            .cars
            .iter()
            .map(|slug| lookup(&car_ids, &entry, "car", slug))
            .collect::<Result<Vec<_>, _>>()?;

        let input = product
            .form(brand_id, category_id, &fits)
            .validate()
            .map_err(|e| invalid(&entry, &e))?;
        let existing = products.id_by_slug(input.slug.as_str()).await?;
        tally.record(existing.is_some());
        match existing {
            Some(id) => products.update(id, &input).await?,
            None => {
                products.create(&input).await?;
            }
        }
    }
    tracing::info!(created = tally.created, updated = tally.updated, "Products seeded");

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../../seed/catalog.yaml");

    #[test]
    fn test_sample_catalog_parses_and_validates() {
        let file = CatalogFile::parse(SAMPLE).unwrap();
        assert!(!file.brands.is_empty());
        assert!(!file.products.is_empty());

        for brand in &file.brands {
            assert!(brand.form().validate().is_ok(), "{}", brand.name);
        }
        for car in &file.cars {
            assert!(car.form().validate().is_ok(), "{}", car.label());
            for (i, task) in car.tasks.iter().enumerate() {
                assert!(task.form(i).validate().is_ok(), "{}", task.title);
            }
        }
        for product in &file.products {
            let input = product
                .form(BrandId::new(1), CategoryId::new(1), &[CarId::new(7)])
                .validate()
                .unwrap();
            assert_eq!(input.car_ids, vec![CarId::new(7)]);
            assert_eq!(input.is_active, product.active);
        }
    }

    #[test]
    fn test_sample_references_resolve_within_file() {
        let file = CatalogFile::parse(SAMPLE).unwrap();
        let brand_slugs: Vec<_> = file.brands.iter().map(|b| b.slug.as_str()).collect();
        let car_slugs: Vec<_> = file.cars.iter().map(|c| c.slug.as_str()).collect();
        for product in &file.products {
            assert!(brand_slugs.contains(&product.brand.as_str()));
            for car in &product.cars {
                assert!(car_slugs.contains(&car.as_str()), "{car}");
            }
        }
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = CatalogFile::parse("brands:\n  - name: Castrol\n    colour: green\n").unwrap_err();
        assert!(matches!(err, SeedError::Parse(_)));
    }

    #[test]
    fn test_product_defaults() {
        let file = CatalogFile::parse(
            "products:\n  - name: Behran Super\n    brand: behran\n    category: engine-oil\n    volume_liters: 1.5\n    price: 480000\n",
        )
        .unwrap();
        let product = &file.products[0];
        assert!(product.active);
        assert!(product.cars.is_empty());

        let form = product.form(BrandId::new(2), CategoryId::new(3), &[]);
        assert_eq!(form.volume_liters, "1.5");
        assert_eq!(form.compare_at, "");
        assert_eq!(form.car_ids, "");
    }

    #[test]
    fn test_invalid_entry_reports_first_message() {
        let entry = BrandEntry {
            name: String::new(),
            slug: String::new(),
            description: String::new(),
            logo_url: None,
        };
        let err = invalid("brand", &entry.form().validate().unwrap_err());
        assert!(matches!(err, SeedError::Invalid { .. }));
    }

    #[test]
    fn test_lookup_reports_missing_slug() {
        let map: HashMap<String, CarId> = HashMap::from([("pride".to_owned(), CarId::new(1))]);
        assert_eq!(lookup(&map, "p", "car", "pride").unwrap(), CarId::new(1));
        let err = lookup(&map, "product X", "car", "tiba").unwrap_err();
        assert_eq!(err.to_string(), "product X: unknown car 'tiba'");
    }

    #[test]
    fn test_tally() {
        let mut tally = Tally::default();
        tally.record(false);
        tally.record(true);
        tally.record(false);
        assert_eq!(tally, Tally { created: 2, updated: 1 });
    }
}
