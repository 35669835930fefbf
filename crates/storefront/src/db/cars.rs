//! Car catalog repository: models, fitment and maintenance schedules.

use sqlx::PgPool;

use roghan_core::{CarId, MaintenanceTaskId};

use super::users::escape_like;
use super::{RepositoryError, conflict_on_unique};
use crate::models::catalog::{Car, CarInput, MaintenanceTask, MaintenanceTaskInput};

const CAR_COLUMNS: &str = "id, slug, make, model, engine, year_from, year_to, \
     oil_capacity_liters, recommended_viscosity";

const TASK_COLUMNS: &str = "id, car_id, title, interval_km, interval_months, notes, position";

/// Repository for car database operations.
pub struct CarRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CarRepository<'a> {
    /// Create a new car repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All cars, optionally searching make, model and engine.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Car>, RepositoryError> {
        let pattern = search.map(|s| format!("%{}%", escape_like(s)));
        let cars = sqlx::query_as::<_, Car>(&format!(
            r"
            SELECT {CAR_COLUMNS} FROM shop.car
            WHERE $1::text IS NULL
               OR make ILIKE $1 OR model ILIKE $1 OR engine ILIKE $1
               OR (make || ' ' || model) ILIKE $1
            ORDER BY make, model, year_from NULLS LAST
            "
        ))
        .bind(pattern.as_deref())
        .fetch_all(self.pool)
        .await?;
        Ok(cars)
    }

    /// A car by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Car>, RepositoryError> {
        let car = sqlx::query_as::<_, Car>(&format!(
            "SELECT {CAR_COLUMNS} FROM shop.car WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(car)
    }

    /// A car by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the car does not exist.
    pub async fn get(&self, id: CarId) -> Result<Car, RepositoryError> {
        sqlx::query_as::<_, Car>(&format!("SELECT {CAR_COLUMNS} FROM shop.car WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Create a car.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &CarInput) -> Result<CarId, RepositoryError> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO shop.car (slug, make, model, engine, year_from, year_to,
                                  oil_capacity_liters, recommended_viscosity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(input.slug.as_str())
        .bind(&input.make)
        .bind(&input.model)
        .bind(&input.engine)
        .bind(input.year_from)
        .bind(input.year_to)
        .bind(input.oil_capacity_liters)
        .bind(&input.recommended_viscosity)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("car slug"))?;
        Ok(id)
    }

    /// Update a car.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the car does not exist,
    /// `Conflict` if the slug is taken.
    pub async fn update(&self, id: CarId, input: &CarInput) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.car SET
                slug = $2, make = $3, model = $4, engine = $5, year_from = $6,
                year_to = $7, oil_capacity_liters = $8, recommended_viscosity = $9
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.slug.as_str())
        .bind(&input.make)
        .bind(&input.model)
        .bind(&input.engine)
        .bind(input.year_from)
        .bind(input.year_to)
        .bind(input.oil_capacity_liters)
        .bind(&input.recommended_viscosity)
        .execute(self.pool)
        .await
        .map_err(conflict_on_unique("car slug"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a car together with its fitment rows, tasks and questions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the car does not exist.
    pub async fn delete(&self, id: CarId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.car WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Maintenance schedule
    // =========================================================================

    /// The maintenance schedule of a car, in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn tasks(&self, car_id: CarId) -> Result<Vec<MaintenanceTask>, RepositoryError> {
        let tasks = sqlx::query_as::<_, MaintenanceTask>(&format!(
            r"
            SELECT {TASK_COLUMNS} FROM shop.car_maintenance_task
            WHERE car_id = $1
            ORDER BY position, id
            "
        ))
        .bind(car_id)
        .fetch_all(self.pool)
        .await?;
        Ok(tasks)
    }

    /// Add a task to a car's schedule.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the car does not exist.
    pub async fn create_task(
        &self,
        car_id: CarId,
        input: &MaintenanceTaskInput,
    ) -> Result<MaintenanceTaskId, RepositoryError> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO shop.car_maintenance_task
                (car_id, title, interval_km, interval_months, notes, position)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            ",
        )
        .bind(car_id)
        .bind(&input.title)
        .bind(input.interval_km)
        .bind(input.interval_months)
        .bind(&input.notes)
        .bind(input.position)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("car"))?;
        Ok(id)
    }

    /// Update a task of a car's schedule.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the task does not belong to the car.
    pub async fn update_task(
        &self,
        car_id: CarId,
        id: MaintenanceTaskId,
        input: &MaintenanceTaskInput,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.car_maintenance_task SET
                title = $3, interval_km = $4, interval_months = $5, notes = $6, position = $7
            WHERE id = $1 AND car_id = $2
            ",
        )
        .bind(id)
        .bind(car_id)
        .bind(&input.title)
        .bind(input.interval_km)
        .bind(input.interval_months)
        .bind(&input.notes)
        .bind(input.position)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove a task. Logged services for it are removed with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the task does not belong to the car.
    pub async fn delete_task(
        &self,
        car_id: CarId,
        id: MaintenanceTaskId,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.car_maintenance_task WHERE id = $1 AND car_id = $2")
                .bind(id)
                .bind(car_id)
                .execute(self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
