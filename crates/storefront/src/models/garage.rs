//! The car notebook: a user's cars, their service history and what is due next.

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::Deserialize;

use roghan_core::{CarId, MaintenanceLogId, MaintenanceTaskId, UserCarId, UserId};

use super::catalog::MaintenanceTask;
use crate::validation::FieldErrors;

/// Kilometres before a task's due odometer at which it counts as "due soon".
pub const DUE_SOON_KM: i32 = 1_000;

/// Days before a task's due date at which it counts as "due soon".
pub const DUE_SOON_DAYS: i64 = 30;

/// A car registered in a user's notebook.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserCar {
    pub id: UserCarId,
    pub user_id: UserId,
    pub car_id: CarId,
    pub car_slug: String,
    pub car_name: String,
    pub recommended_viscosity: String,
    pub nickname: String,
    pub odometer_km: i32,
    pub created_at: DateTime<Utc>,
}

impl UserCar {
    /// The nickname, or the car model when none was given.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.nickname.is_empty() {
            &self.car_name
        } else {
            &self.nickname
        }
    }
}

/// A service performed on one of the user's cars.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MaintenanceLog {
    pub id: MaintenanceLogId,
    pub user_car_id: UserCarId,
    pub task_id: MaintenanceTaskId,
    pub task_title: String,
    pub odometer_km: i32,
    pub performed_on: NaiveDate,
    pub note: String,
}

/// How urgent a maintenance task is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DueStatus {
    Overdue,
    DueSoon,
    Ok,
    /// Never logged, so there is nothing to count from.
    NoHistory,
}

impl DueStatus {
    /// Persian label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Overdue => "موعد گذشته",
            Self::DueSoon => "نزدیک به موعد",
            Self::Ok => "به‌موقع",
            Self::NoHistory => "سابقه‌ای ثبت نشده",
        }
    }

    /// CSS modifier class.
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Overdue => "due-overdue",
            Self::DueSoon => "due-soon",
            Self::Ok => "due-ok",
            Self::NoHistory => "due-unknown",
        }
    }
}

/// When a task is next due for a particular car.
#[derive(Debug, Clone)]
pub struct DueTask {
    pub task: MaintenanceTask,
    pub last_odometer_km: Option<i32>,
    pub last_performed_on: Option<NaiveDate>,
    pub due_at_km: Option<i32>,
    pub due_on: Option<NaiveDate>,
    pub status: DueStatus,
}

/// Compute the next due point of every task from the car's service history.
///
/// Each task counts from its most recent log entry: the due odometer is the
/// logged odometer plus `interval_km`, the due date is the log date plus
/// `interval_months`. Whichever limit is reached first decides the status.
/// The result is ordered most urgent first, then by the task's position.
#[must_use]
pub fn next_due(
    tasks: &[MaintenanceTask],
    logs: &[MaintenanceLog],
    odometer_km: i32,
    today: NaiveDate,
) -> Vec<DueTask> {
    let mut due: Vec<DueTask> = tasks
        .iter()
        .map(|task| {
            let last = logs
                .iter()
                .filter(|log| log.task_id == task.id)
                .max_by_key(|log| (log.performed_on, log.odometer_km));

            let Some(last) = last else {
                return DueTask {
                    task: task.clone(),
                    last_odometer_km: None,
                    last_performed_on: None,
                    due_at_km: None,
                    due_on: None,
                    status: DueStatus::NoHistory,
                };
            };

            let due_at_km = task
                .interval_km
                .map(|km| last.odometer_km.saturating_add(km));
            let due_on = task.interval_months.and_then(|months| {
                u32::try_from(months)
                    .ok()
                    .and_then(|m| last.performed_on.checked_add_months(Months::new(m)))
            });

            DueTask {
                task: task.clone(),
                last_odometer_km: Some(last.odometer_km),
                last_performed_on: Some(last.performed_on),
                due_at_km,
                due_on,
                status: status_for(due_at_km, due_on, odometer_km, today),
            }
        })
        .collect();

    due.sort_by_key(|d| (d.status, d.task.position));
    due
}

fn status_for(
    due_at_km: Option<i32>,
    due_on: Option<NaiveDate>,
    odometer_km: i32,
    today: NaiveDate,
) -> DueStatus {
    let km_left = due_at_km.map(|km| km - odometer_km);
    let days_left = due_on.map(|date| (date - today).num_days());

    if km_left.is_some_and(|km| km <= 0) || days_left.is_some_and(|d| d <= 0) {
        DueStatus::Overdue
    } else if km_left.is_some_and(|km| km <= DUE_SOON_KM)
        || days_left.is_some_and(|d| d <= DUE_SOON_DAYS)
    {
        DueStatus::DueSoon
    } else {
        DueStatus::Ok
    }
}

/// Form for adding a car to the notebook.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddCarForm {
    #[serde(default)]
    pub car_id: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub odometer_km: String,
}

/// Form for updating the odometer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OdometerForm {
    #[serde(default)]
    pub odometer_km: String,
}

/// A validated notebook entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddCarInput {
    pub car_id: CarId,
    pub nickname: String,
    pub odometer_km: i32,
}

impl AddCarForm {
    /// Validate the entry.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(&self) -> Result<AddCarInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        let car_id = errors.int_in_range("car_id", &self.car_id, 1..=i32::MAX);
        let nickname = self.nickname.trim().to_owned();
        errors.max_chars("nickname", &nickname, 50);
        let odometer_km = errors.int_in_range("odometer_km", &self.odometer_km, 0..=5_000_000);

        let (Some(car_id), Some(odometer_km)) = (car_id, odometer_km) else {
            return Err(errors);
        };
        errors.finish(AddCarInput {
            car_id: CarId::new(i64::from(car_id)),
            nickname,
            odometer_km,
        })
    }
}

impl OdometerForm {
    /// Validate the reading.
    ///
    /// # Errors
    ///
    /// Returns the field message when the reading is not a sane number.
    pub fn validate(&self) -> Result<i32, FieldErrors> {
        let mut errors = FieldErrors::new();
        match errors.int_in_range("odometer_km", &self.odometer_km, 0..=5_000_000) {
            Some(km) => Ok(km),
            None => Err(errors),
        }
    }
}

/// Form for logging a completed service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogServiceForm {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub odometer_km: String,
    /// ISO date from an `<input type="date">`; empty means today.
    #[serde(default)]
    pub performed_on: String,
    #[serde(default)]
    pub note: String,
}

/// A validated service log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogServiceInput {
    pub task_id: MaintenanceTaskId,
    pub odometer_km: i32,
    pub performed_on: NaiveDate,
    pub note: String,
}

impl LogServiceForm {
    /// Validate the entry. Dates in the future are rejected.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(&self, today: NaiveDate) -> Result<LogServiceInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        let task_id = errors.int_in_range("task_id", &self.task_id, 1..=i32::MAX);
        let odometer_km = errors.int_in_range("odometer_km", &self.odometer_km, 0..=5_000_000);
        let performed_on = if self.performed_on.trim().is_empty() {
            Some(today)
        } else {
            match NaiveDate::parse_from_str(self.performed_on.trim(), "%Y-%m-%d") {
                Ok(date) if date <= today => Some(date),
                Ok(_) => {
                    errors.add("performed_on", "تاریخ نمی‌تواند در آینده باشد.");
                    None
                }
                Err(_) => {
                    errors.add("performed_on", "تاریخ معتبر نیست.");
                    None
                }
            }
        };
        errors.max_chars("note", &self.note, 500);

        let (Some(task_id), Some(odometer_km), Some(performed_on)) =
            (task_id, odometer_km, performed_on)
        else {
            return Err(errors);
        };

        errors.finish(LogServiceInput {
            task_id: MaintenanceTaskId::new(i64::from(task_id)),
            odometer_km,
            performed_on,
            note: self.note.trim().to_owned(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(id: i64, km: Option<i32>, months: Option<i32>, position: i32) -> MaintenanceTask {
        MaintenanceTask {
            id: MaintenanceTaskId::new(id),
            car_id: CarId::new(1),
            title: format!("task {id}"),
            interval_km: km,
            interval_months: months,
            notes: String::new(),
            position,
        }
    }

    fn log(task_id: i64, km: i32, on: NaiveDate) -> MaintenanceLog {
        MaintenanceLog {
            id: MaintenanceLogId::new(task_id * 100 + i64::from(km)),
            user_car_id: UserCarId::new(1),
            task_id: MaintenanceTaskId::new(task_id),
            task_title: String::new(),
            odometer_km: km,
            performed_on: on,
            note: String::new(),
        }
    }

    #[test]
    fn test_due_from_latest_log() {
        let tasks = [task(1, Some(5_000), Some(6), 0)];
        let logs = [
            log(1, 40_000, date(2026, 1, 10)),
            log(1, 45_000, date(2026, 6, 1)),
        ];
        let due = next_due(&tasks, &logs, 46_000, date(2026, 7, 1));
        let oil = due.first().unwrap();
        assert_eq!(oil.due_at_km, Some(50_000));
        assert_eq!(oil.due_on, Some(date(2026, 12, 1)));
        assert_eq!(oil.status, DueStatus::Ok);
    }

    #[test]
    fn test_overdue_by_km_or_date() {
        let tasks = [task(1, Some(5_000), None, 0), task(2, None, Some(12), 1)];
        let logs = [
            log(1, 10_000, date(2026, 1, 1)),
            log(2, 10_000, date(2025, 6, 1)),
        ];
        let due = next_due(&tasks, &logs, 15_200, date(2026, 7, 1));
        assert!(due.iter().all(|d| d.status == DueStatus::Overdue));
    }

    #[test]
    fn test_due_soon_thresholds() {
        let tasks = [task(1, Some(5_000), None, 0), task(2, None, Some(6), 1)];
        let logs = [
            log(1, 10_000, date(2026, 1, 1)),
            log(2, 10_000, date(2026, 1, 20)),
        ];
        let due = next_due(&tasks, &logs, 14_500, date(2026, 7, 1));
        assert!(due.iter().all(|d| d.status == DueStatus::DueSoon));
    }

    #[test]
    fn test_no_history_sorts_last() {
        let tasks = [task(1, Some(5_000), None, 0), task(2, Some(40_000), None, 1)];
        let logs = [log(2, 0, date(2020, 1, 1))];
        let due = next_due(&tasks, &logs, 41_000, date(2026, 1, 1));
        assert_eq!(due.first().unwrap().task.id, MaintenanceTaskId::new(2));
        assert_eq!(due.first().unwrap().status, DueStatus::Overdue);
        assert_eq!(due.last().unwrap().status, DueStatus::NoHistory);
    }

    #[test]
    fn test_month_end_is_clamped() {
        let tasks = [task(1, None, Some(1), 0)];
        let logs = [log(1, 0, date(2026, 1, 31))];
        let due = next_due(&tasks, &logs, 0, date(2026, 1, 31));
        assert_eq!(due.first().unwrap().due_on, Some(date(2026, 2, 28)));
    }

    #[test]
    fn test_add_car_form() {
        let form = AddCarForm {
            car_id: "12".to_string(),
            nickname: " ماشین خانواده ".to_string(),
            odometer_km: "۸۵۰۰۰".to_string(),
        };
        let input = form.validate().unwrap();
        assert_eq!(input.car_id, CarId::new(12));
        assert_eq!(input.nickname, "ماشین خانواده");
        assert_eq!(input.odometer_km, 85_000);

        let errors = AddCarForm::default().validate().unwrap_err();
        assert!(errors.has("car_id"));
        assert!(errors.has("odometer_km"));
    }

    #[test]
    fn test_odometer_rejects_negative() {
        let form = OdometerForm {
            odometer_km: "-5".to_string(),
        };
        assert!(form.validate().unwrap_err().has("odometer_km"));
    }

    #[test]
    fn test_log_form_rejects_future_date() {
        let today = date(2026, 5, 1);
        let form = LogServiceForm {
            task_id: "3".to_string(),
            odometer_km: "120000".to_string(),
            performed_on: "2026-06-01".to_string(),
            note: String::new(),
        };
        assert!(form.validate(today).unwrap_err().has("performed_on"));

        let form = LogServiceForm {
            performed_on: String::new(),
            ..form
        };
        let input = form.validate(today).unwrap();
        assert_eq!(input.performed_on, today);
        assert_eq!(input.task_id, MaintenanceTaskId::new(3));
    }
}
