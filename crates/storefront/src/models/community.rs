//! Customer questions and product reviews.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use roghan_core::{ProductId, QuestionId, QuestionStatus, ReviewId};

use crate::validation::FieldErrors;

/// What a question is about. Product and car questions live in separate tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionTarget {
    Product,
    Car,
}

impl QuestionTarget {
    /// Path segment used by admin routes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Car => "car",
        }
    }

    /// Persian label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Product => "محصول",
            Self::Car => "خودرو",
        }
    }
}

/// A question with its subject and author joined in.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Question {
    pub id: QuestionId,
    pub subject_name: String,
    pub subject_slug: String,
    pub author_name: String,
    pub body: String,
    pub answer: Option<String>,
    pub status: QuestionStatus,
    pub created_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
}

/// A product review with its author joined in.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub author_name: String,
    pub rating: i16,
    pub body: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Filled and empty stars, e.g. `★★★★☆`.
    #[must_use]
    pub fn stars(&self) -> String {
        let filled = usize::try_from(self.rating.clamp(0, 5)).unwrap_or(0);
        format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
    }
}

/// Question form (product or car page).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionForm {
    #[serde(default)]
    pub body: String,
}

impl QuestionForm {
    /// Validate the question text.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when the text is empty or too long.
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        let body = errors.required("body", &self.body);
        if !errors.has("body") && body.chars().count() < 10 {
            errors.add("body", "سؤال باید حداقل ۱۰ کاراکتر باشد.");
        }
        errors.max_chars("body", &body, 1000);
        errors.finish(body)
    }
}

/// Review form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub body: String,
}

impl ReviewForm {
    /// Validate rating (1-5) and text.
    ///
    /// # Errors
    ///
    /// Returns the per-field messages when any field is invalid.
    pub fn validate(&self) -> Result<(i16, String), FieldErrors> {
        let mut errors = FieldErrors::new();
        let rating = errors.int_in_range("rating", &self.rating, 1..=5);
        let body = self.body.trim().to_owned();
        errors.max_chars("body", &body, 2000);
        let Some(rating) = rating.and_then(|r| i16::try_from(r).ok()) else {
            return Err(errors);
        };
        errors.finish((rating, body))
    }
}

/// Admin answer form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnswerForm {
    #[serde(default)]
    pub answer: String,
    /// Publish together with the answer.
    #[serde(default)]
    pub publish: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_question_length_limits() {
        let short = QuestionForm {
            body: "کوتاه".to_string(),
        };
        assert!(short.validate().unwrap_err().has("body"));

        let ok = QuestionForm {
            body: "این روغن برای پژو ۴۰۵ مناسب است؟".to_string(),
        };
        assert!(ok.validate().is_ok());

        let long = QuestionForm {
            body: "a".repeat(1001),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_review_rating_range() {
        let form = ReviewForm {
            rating: "6".to_string(),
            body: String::new(),
        };
        assert!(form.validate().unwrap_err().has("rating"));

        let form = ReviewForm {
            rating: "4".to_string(),
            body: " عالی ".to_string(),
        };
        assert_eq!(form.validate().unwrap(), (4, "عالی".to_string()));
    }

    #[test]
    fn test_stars() {
        let review = Review {
            id: ReviewId::new(1),
            product_id: ProductId::new(1),
            product_name: String::new(),
            product_slug: String::new(),
            author_name: String::new(),
            rating: 3,
            body: String::new(),
            is_approved: true,
            created_at: Utc::now(),
        };
        assert_eq!(review.stars(), "★★★☆☆");
    }
}
