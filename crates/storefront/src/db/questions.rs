//! Product and car question repository.
//!
//! Both question tables share one shape, so every query is written once and
//! parameterized by [`QuestionTarget`]. Table and column names come from a
//! fixed match, never from input.

use sqlx::PgPool;

use roghan_core::{CarId, ProductId, QuestionId, QuestionStatus, UserId};

use super::RepositoryError;
use crate::models::community::{Question, QuestionTarget};

/// The product or car a question is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSubject {
    Product(ProductId),
    Car(CarId),
}

impl QuestionSubject {
    const fn target(self) -> QuestionTarget {
        match self {
            Self::Product(_) => QuestionTarget::Product,
            Self::Car(_) => QuestionTarget::Car,
        }
    }

    const fn id(self) -> i64 {
        match self {
            Self::Product(id) => id.as_i64(),
            Self::Car(id) => id.as_i64(),
        }
    }
}

const fn table(target: QuestionTarget) -> &'static str {
    match target {
        QuestionTarget::Product => "shop.product_question",
        QuestionTarget::Car => "shop.car_question",
    }
}

const fn subject_column(target: QuestionTarget) -> &'static str {
    match target {
        QuestionTarget::Product => "product_id",
        QuestionTarget::Car => "car_id",
    }
}

fn select(target: QuestionTarget) -> String {
    let (join, name) = match target {
        QuestionTarget::Product => ("JOIN shop.product s ON s.id = q.product_id", "s.name"),
        QuestionTarget::Car => (
            "JOIN shop.car s ON s.id = q.car_id",
            "TRIM(s.make || ' ' || s.model || ' ' || s.engine)",
        ),
    };
    format!(
        r"
        SELECT q.id, {name} AS subject_name, s.slug AS subject_slug,
               COALESCE(NULLIF(u.full_name, ''), 'کاربر روغن') AS author_name,
               q.body, q.answer, q.status, q.created_at, q.answered_at
        FROM {table} q
        {join}
        JOIN shop.user u ON u.id = q.user_id
        ",
        table = table(target),
    )
}

/// Repository for question database operations.
pub struct QuestionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> QuestionRepository<'a> {
    /// Create a new question repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a new question, pending moderation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        subject: QuestionSubject,
        user_id: UserId,
        body: &str,
    ) -> Result<QuestionId, RepositoryError> {
        let target = subject.target();
        let id = sqlx::query_scalar(&format!(
            "INSERT INTO {} ({}, user_id, body) VALUES ($1, $2, $3) RETURNING id",
            table(target),
            subject_column(target),
        ))
        .bind(subject.id())
        .bind(user_id)
        .bind(body)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Published questions about a subject, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn published(&self, subject: QuestionSubject) -> Result<Vec<Question>, RepositoryError> {
        let target = subject.target();
        let questions = sqlx::query_as::<_, Question>(&format!(
            "{} WHERE q.{} = $1 AND q.status = 'published' ORDER BY q.created_at DESC",
            select(target),
            subject_column(target),
        ))
        .bind(subject.id())
        .fetch_all(self.pool)
        .await?;
        Ok(questions)
    }

    /// Back-office list, optionally by status, oldest pending first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn admin_list(
        &self,
        target: QuestionTarget,
        status: Option<QuestionStatus>,
    ) -> Result<Vec<Question>, RepositoryError> {
        let questions = sqlx::query_as::<_, Question>(&format!(
            r"
            {}
            WHERE $1::shop.question_status IS NULL OR q.status = $1
            ORDER BY q.status = 'pending' DESC, q.created_at DESC
            LIMIT 200
            ",
            select(target),
        ))
        .bind(status)
        .fetch_all(self.pool)
        .await?;
        Ok(questions)
    }

    /// Save an answer, publishing the question when asked to.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the question does not exist.
    pub async fn answer(
        &self,
        target: QuestionTarget,
        id: QuestionId,
        answer: &str,
        publish: bool,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(&format!(
            r"
            UPDATE {} SET
                answer = $2,
                answered_at = NOW(),
                status = CASE WHEN $3 THEN 'published'::shop.question_status ELSE status END
            WHERE id = $1
            ",
            table(target),
        ))
        .bind(id)
        .bind(answer)
        .bind(publish)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Change moderation status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the question does not exist.
    pub async fn set_status(
        &self,
        target: QuestionTarget,
        id: QuestionId,
        status: QuestionStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(&format!("UPDATE {} SET status = $2 WHERE id = $1", table(target)))
            .bind(id)
            .bind(status)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Pending questions across products and cars.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn pending_count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(
            r"
            SELECT (SELECT COUNT(*) FROM shop.product_question WHERE status = 'pending')
                 + (SELECT COUNT(*) FROM shop.car_question WHERE status = 'pending')
            ",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_uses_matching_table() {
        let sql = select(QuestionTarget::Car);
        assert!(sql.contains("FROM shop.car_question q"));
        assert!(sql.contains("s.id = q.car_id"));
        assert_eq!(
            QuestionSubject::Product(ProductId::new(7)).target(),
            QuestionTarget::Product
        );
    }
}
