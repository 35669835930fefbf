//! Car notebook repository.
//!
//! Every query is scoped to the owning user so one customer can never read
//! or write another customer's cars.

use sqlx::PgPool;

use roghan_core::{CarId, MaintenanceLogId, UserCarId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::garage::{LogServiceInput, MaintenanceLog, UserCar};

const USER_CAR_SELECT: &str = r"
    SELECT uc.id, uc.user_id, uc.car_id, c.slug AS car_slug,
           TRIM(c.make || ' ' || c.model || ' ' || c.engine) AS car_name,
           c.recommended_viscosity, uc.nickname, uc.odometer_km, uc.created_at
    FROM shop.user_car uc
    JOIN shop.car c ON c.id = uc.car_id
";

/// Repository for the car notebook.
pub struct GarageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GarageRepository<'a> {
    /// Create a new garage repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cars, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<UserCar>, RepositoryError> {
        let cars = sqlx::query_as::<_, UserCar>(&format!(
            "{USER_CAR_SELECT} WHERE uc.user_id = $1 ORDER BY uc.created_at"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(cars)
    }

    /// One of the user's cars.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the car is not in the user's notebook.
    pub async fn get(&self, user_id: UserId, id: UserCarId) -> Result<UserCar, RepositoryError> {
        sqlx::query_as::<_, UserCar>(&format!(
            "{USER_CAR_SELECT} WHERE uc.id = $1 AND uc.user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Add a car to the notebook.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the car model does not exist.
    pub async fn add(
        &self,
        user_id: UserId,
        car_id: CarId,
        nickname: &str,
        odometer_km: i32,
    ) -> Result<UserCarId, RepositoryError> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO shop.user_car (user_id, car_id, nickname, odometer_km)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(car_id)
        .bind(nickname)
        .bind(odometer_km)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("car"))?;
        Ok(id)
    }

    /// Set the current odometer reading.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the car is not in the user's notebook.
    pub async fn update_odometer(
        &self,
        user_id: UserId,
        id: UserCarId,
        odometer_km: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.user_car SET odometer_km = $3 WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .bind(odometer_km)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove a car and its service history.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the car is not in the user's notebook.
    pub async fn remove(&self, user_id: UserId, id: UserCarId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.user_car WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Service history of a car, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn logs(
        &self,
        user_id: UserId,
        id: UserCarId,
    ) -> Result<Vec<MaintenanceLog>, RepositoryError> {
        let logs = sqlx::query_as::<_, MaintenanceLog>(
            r"
            SELECT l.id, l.user_car_id, l.task_id, t.title AS task_title,
                   l.odometer_km, l.performed_on, l.note
            FROM shop.maintenance_log l
            JOIN shop.user_car uc ON uc.id = l.user_car_id
            JOIN shop.car_maintenance_task t ON t.id = l.task_id
            WHERE l.user_car_id = $1 AND uc.user_id = $2
            ORDER BY l.performed_on DESC, l.odometer_km DESC
            ",
        )
        .bind(id)
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(logs)
    }

    /// Record a completed service. The task must belong to the car's model,
    /// and a reading above the stored odometer moves the odometer forward.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the car is not in the user's
    /// notebook or the task is not on its schedule.
    pub async fn log_service(
        &self,
        user_id: UserId,
        id: UserCarId,
        input: &LogServiceInput,
    ) -> Result<MaintenanceLogId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let log_id: Option<MaintenanceLogId> = sqlx::query_scalar(
            r"
            INSERT INTO shop.maintenance_log (user_car_id, task_id, odometer_km, performed_on, note)
            SELECT uc.id, t.id, $4, $5, $6
            FROM shop.user_car uc
            JOIN shop.car_maintenance_task t ON t.car_id = uc.car_id AND t.id = $3
            WHERE uc.id = $1 AND uc.user_id = $2
            RETURNING id
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(input.task_id)
        .bind(input.odometer_km)
        .bind(input.performed_on)
        .bind(&input.note)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(log_id) = log_id else {
            return Err(RepositoryError::NotFound);
        };

        sqlx::query(
            "UPDATE shop.user_car SET odometer_km = GREATEST(odometer_km, $2) WHERE id = $1",
        )
        .bind(id)
        .bind(input.odometer_km)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(log_id)
    }

    /// Delete a service entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the entry is not the user's.
    pub async fn delete_log(
        &self,
        user_id: UserId,
        id: UserCarId,
        log_id: MaintenanceLogId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM shop.maintenance_log l
            USING shop.user_car uc
            WHERE l.id = $1 AND l.user_car_id = $2 AND uc.id = l.user_car_id AND uc.user_id = $3
            ",
        )
        .bind(log_id)
        .bind(id)
        .bind(user_id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
