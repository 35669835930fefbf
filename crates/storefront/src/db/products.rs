//! Product repository: catalog listing, detail and back-office writes.
//!
//! The public listing is built with `sqlx::QueryBuilder` from a
//! [`ProductFilter`]; every user-supplied value is bound, never spliced.

use sqlx::{PgPool, Postgres, QueryBuilder};

use roghan_core::{CarId, ProductId};

use super::users::escape_like;
use super::{RepositoryError, conflict_on_unique};
use crate::models::catalog::{
    Car, PAGE_SIZE, Pagination, Product, ProductFilter, ProductInput, SortOrder,
};

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.slug, p.name,
           p.brand_id, b.name AS brand_name, b.slug AS brand_slug,
           p.category_id, c.name AS category_name, c.slug AS category_slug,
           p.description, p.viscosity, p.api_grade, p.acea_grade, p.oil_type,
           p.volume_liters, p.price_toman AS price, p.compare_at_toman AS compare_at,
           p.stock, p.image_url, p.is_active, p.created_at, p.updated_at
    FROM shop.product p
    JOIN shop.brand b ON b.id = p.brand_id
    JOIN shop.category c ON c.id = p.category_id
";

const CAR_COLUMNS: &str = "car.id, car.slug, car.make, car.model, car.engine, car.year_from, \
     car.year_to, car.oil_capacity_liters, car.recommended_viscosity";

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Filtered, sorted, paginated listing of active products.
    ///
    /// The requested page is clamped to the available pages.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn search(
        &self,
        filter: &ProductFilter,
    ) -> Result<(Vec<Product>, Pagination), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new(
            r"
            SELECT COUNT(*) FROM shop.product p
            JOIN shop.brand b ON b.id = p.brand_id
            JOIN shop.category c ON c.id = p.category_id
            ",
        );
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let pagination = Pagination::new(filter.page, PAGE_SIZE, total);

        let mut list = QueryBuilder::<Postgres>::new(PRODUCT_SELECT);
        if filter.sort == SortOrder::Popular {
            list.push(
                r"
                LEFT JOIN (
                    SELECT product_id, COUNT(*) AS views
                    FROM shop.engagement_event
                    WHERE kind = 'product_view' AND created_at > NOW() - INTERVAL '30 days'
                    GROUP BY product_id
                ) pv ON pv.product_id = p.id
                ",
            );
        }
        push_filter(&mut list, filter);
        list.push(match filter.sort {
            SortOrder::Newest => " ORDER BY p.created_at DESC, p.id DESC",
            SortOrder::PriceAsc => " ORDER BY p.price_toman ASC, p.id DESC",
            SortOrder::PriceDesc => " ORDER BY p.price_toman DESC, p.id DESC",
            SortOrder::Popular => " ORDER BY COALESCE(pv.views, 0) DESC, p.id DESC",
        });
        list.push(" LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let products = list
            .build_query_as::<Product>()
            .fetch_all(self.pool)
            .await?;

        Ok((products, pagination))
    }

    /// An active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.slug = $1 AND p.is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(product)
    }

    /// ID of the product with this slug, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn id_by_slug(&self, slug: &str) -> Result<Option<ProductId>, RepositoryError> {
        let id = sqlx::query_scalar("SELECT id FROM shop.product WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;
        Ok(id)
    }

    /// Any product by ID (back-office).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn get(&self, id: ProductId) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Active products by ID, in the order given. Unknown IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i64> = ids.iter().map(ProductId::as_i64).collect();
        let mut products = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.id = ANY($1) AND p.is_active"
        ))
        .bind(&raw)
        .fetch_all(self.pool)
        .await?;
        products.sort_by_key(|p| ids.iter().position(|id| *id == p.id));
        Ok(products)
    }

    /// Newest in-stock products for the home page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn featured(&self, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r"
            {PRODUCT_SELECT}
            WHERE p.is_active AND p.stock > 0
            ORDER BY p.created_at DESC
            LIMIT $1
            "
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }

    /// Active products that fit a car, recommended viscosity first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fitting_car(&self, car: &Car) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r"
            {PRODUCT_SELECT}
            JOIN shop.product_car pc ON pc.product_id = p.id
            WHERE pc.car_id = $1 AND p.is_active
            ORDER BY (replace(upper(p.viscosity), '-', '') = replace(upper($2), '-', '')) DESC,
                     p.stock > 0 DESC, p.price_toman
            "
        ))
        .bind(car.id)
        .bind(&car.recommended_viscosity)
        .fetch_all(self.pool)
        .await?;
        Ok(products)
    }

    /// Cars a product fits.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cars_for(&self, id: ProductId) -> Result<Vec<Car>, RepositoryError> {
        let cars = sqlx::query_as::<_, Car>(&format!(
            r"
            SELECT {CAR_COLUMNS} FROM shop.car car
            JOIN shop.product_car pc ON pc.car_id = car.id
            WHERE pc.product_id = $1
            ORDER BY car.make, car.model
            "
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(cars)
    }

    /// Distinct viscosity grades of active products, for the filter sidebar.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn viscosities(&self) -> Result<Vec<String>, RepositoryError> {
        let grades = sqlx::query_scalar(
            r"
            SELECT DISTINCT viscosity FROM shop.product
            WHERE is_active AND viscosity <> ''
            ORDER BY viscosity
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(grades)
    }

    /// Back-office list including inactive products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn admin_list(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let pattern = search.map(|s| format!("%{}%", escape_like(s)));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.product p WHERE $1::text IS NULL OR p.name ILIKE $1 OR p.slug ILIKE $1",
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            r"
            {PRODUCT_SELECT}
            WHERE $1::text IS NULL OR p.name ILIKE $1 OR p.slug ILIKE $1
            ORDER BY p.updated_at DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok((products, total))
    }

    /// IDs of the cars a product fits.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn car_ids_for(&self, id: ProductId) -> Result<Vec<CarId>, RepositoryError> {
        let ids = sqlx::query_scalar(
            "SELECT car_id FROM shop.product_car WHERE product_id = $1 ORDER BY car_id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }

    /// Create a product with its fitment list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken or a brand,
    /// category or car does not exist.
    pub async fn create(&self, input: &ProductInput) -> Result<ProductId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO shop.product (
                slug, name, brand_id, category_id, description, viscosity, api_grade,
                acea_grade, oil_type, volume_liters, price_toman, compare_at_toman,
                stock, image_url, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id
            ",
        )
        .bind(input.slug.as_str())
        .bind(&input.name)
        .bind(input.brand_id)
        .bind(input.category_id)
        .bind(&input.description)
        .bind(&input.viscosity)
        .bind(&input.api_grade)
        .bind(&input.acea_grade)
        .bind(&input.oil_type)
        .bind(input.volume_liters)
        .bind(input.price)
        .bind(input.compare_at)
        .bind(input.stock)
        .bind(input.image_url.as_deref())
        .bind(input.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(conflict_on_unique("product slug"))?;

        replace_fitment(&mut tx, id, &input.car_ids).await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Update a product and replace its fitment list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist,
    /// `Conflict` if the slug is taken.
    pub async fn update(&self, id: ProductId, input: &ProductInput) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE shop.product SET
                slug = $2, name = $3, brand_id = $4, category_id = $5, description = $6,
                viscosity = $7, api_grade = $8, acea_grade = $9, oil_type = $10,
                volume_liters = $11, price_toman = $12, compare_at_toman = $13,
                stock = $14, image_url = $15, is_active = $16, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.slug.as_str())
        .bind(&input.name)
        .bind(input.brand_id)
        .bind(input.category_id)
        .bind(&input.description)
        .bind(&input.viscosity)
        .bind(&input.api_grade)
        .bind(&input.acea_grade)
        .bind(&input.oil_type)
        .bind(input.volume_liters)
        .bind(input.price)
        .bind(input.compare_at)
        .bind(input.stock)
        .bind(input.image_url.as_deref())
        .bind(input.is_active)
        .execute(&mut *tx)
        .await
        .map_err(conflict_on_unique("product slug"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        replace_fitment(&mut tx, id, &input.car_ids).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete a product. Order items keep their name and price snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

async fn replace_fitment(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    id: ProductId,
    car_ids: &[CarId],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM shop.product_car WHERE product_id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    if !car_ids.is_empty() {
        let raw: Vec<i64> = car_ids.iter().map(CarId::as_i64).collect();
        sqlx::query(
            r"
            INSERT INTO shop.product_car (product_id, car_id)
            SELECT $1, UNNEST($2::bigint[])
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(id)
        .bind(&raw)
        .execute(&mut **tx)
        .await
        .map_err(conflict_on_unique("car"))?;
    }
    Ok(())
}

/// Append the `WHERE` clause for a listing filter.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" WHERE p.is_active");

    if let Some(q) = &filter.q {
        let pattern = format!("%{}%", escape_like(q));
        qb.push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR b.name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if !filter.brands.is_empty() {
        qb.push(" AND b.slug = ANY(")
            .push_bind(filter.brands.clone())
            .push(")");
    }
    if let Some(category) = &filter.category {
        qb.push(" AND (c.slug = ")
            .push_bind(category.clone())
            .push(" OR c.parent_id = (SELECT id FROM shop.category WHERE slug = ")
            .push_bind(category.clone())
            .push("))");
    }
    if let Some(viscosity) = &filter.viscosity {
        qb.push(" AND replace(upper(p.viscosity), '-', '') = replace(")
            .push_bind(viscosity.clone())
            .push(", '-', '')");
    }
    if let Some(car) = &filter.car {
        qb.push(
            " AND EXISTS (SELECT 1 FROM shop.product_car pc JOIN shop.car ON shop.car.id = pc.car_id \
             WHERE pc.product_id = p.id AND shop.car.slug = ",
        )
        .push_bind(car.clone())
        .push(")");
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND p.price_toman >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND p.price_toman <= ").push_bind(max);
    }
    if filter.in_stock {
        qb.push(" AND p.stock > 0");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_sql_binds_every_value() {
        let filter = ProductFilter::from_query(
            "q=%27;DROP&brand=castrol&category=engine-oil&viscosity=5W30&car=pride&min_price=1&max_price=9&in_stock=1",
        );
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM shop.product p");
        push_filter(&mut qb, &filter);
        let sql = qb.sql();

        assert!(!sql.contains("DROP"));
        assert!(!sql.contains("castrol"));
        assert!(sql.contains("b.slug = ANY($4)"));
        assert!(sql.contains("p.price_toman <= $10"));
        assert!(sql.ends_with("AND p.stock > 0"));
    }

    #[test]
    fn test_empty_filter_only_hides_inactive() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM shop.product p");
        push_filter(&mut qb, &ProductFilter::from_query(""));
        assert_eq!(qb.sql(), "SELECT 1 FROM shop.product p WHERE p.is_active");
    }
}
