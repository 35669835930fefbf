//! URL slugs for products, brands, categories, cars and blog posts.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// The input string is empty.
    #[error("slug cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length in characters.
        max: usize,
    },
    /// The input contains a character that is not allowed in a slug.
    #[error("slug contains invalid character '{0}'")]
    InvalidCharacter(char),
    /// The slug starts or ends with a dash, or contains two dashes in a row.
    #[error("slug cannot start or end with '-' or contain '--'")]
    MisplacedDash,
}

/// A URL path segment identifying a catalog or content entity.
///
/// ## Constraints
///
/// - 1-120 characters
/// - Lowercase letters (Latin or Persian), digits and single `-` separators
///
/// ## Examples
///
/// ```
/// use roghan_core::Slug;
///
/// assert!(Slug::parse("castrol-edge-5w30-4l").is_ok());
/// assert!(Slug::parse("روغن-موتور").is_ok());
/// assert!(Slug::parse("Castrol").is_err());
/// assert_eq!(Slug::slugify("Castrol EDGE 5W-30 (4L)").as_str(), "castrol-edge-5w-30-4l");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Maximum slug length in characters.
    pub const MAX_LENGTH: usize = 120;

    /// Parse a `Slug`, rejecting anything that is not already canonical.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, contains uppercase or
    /// punctuation other than `-`, or has leading, trailing or doubled dashes.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.chars().count() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(*c == '-' || (c.is_alphanumeric() && !c.is_uppercase())))
        {
            return Err(SlugError::InvalidCharacter(c));
        }
        if s.starts_with('-') || s.ends_with('-') || s.contains("--") {
            return Err(SlugError::MisplacedDash);
        }
        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from a display name.
    ///
    /// Lowercases, turns every run of non-alphanumeric characters into a single
    /// dash and truncates to [`Self::MAX_LENGTH`]. An input with no usable
    /// characters yields `"item"`.
    #[must_use]
    pub fn slugify(name: &str) -> Self {
        let mut out = String::with_capacity(name.len());
        let mut pending_dash = false;
        for c in name.chars().flat_map(char::to_lowercase) {
            if c.is_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c);
            } else {
                pending_dash = true;
            }
        }

        let mut truncated: String = out.chars().take(Self::MAX_LENGTH).collect();
        while truncated.ends_with('-') {
            truncated.pop();
        }
        if truncated.is_empty() {
            truncated.push_str("item");
        }
        Self(truncated)
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Slug` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Slug::parse("mobil-1").is_ok());
        assert!(Slug::parse("5w30").is_ok());
        assert!(Slug::parse("روغن-موتور-بهران").is_ok());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
        assert_eq!(Slug::parse("Mobil"), Err(SlugError::InvalidCharacter('M')));
        assert_eq!(Slug::parse("mobil 1"), Err(SlugError::InvalidCharacter(' ')));
        assert_eq!(Slug::parse("-mobil"), Err(SlugError::MisplacedDash));
        assert_eq!(Slug::parse("mobil-"), Err(SlugError::MisplacedDash));
        assert_eq!(Slug::parse("mobil--1"), Err(SlugError::MisplacedDash));
        assert!(matches!(
            Slug::parse(&"a".repeat(121)),
            Err(SlugError::TooLong { .. })
        ));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(Slug::slugify("Total Quartz 9000").as_str(), "total-quartz-9000");
        assert_eq!(Slug::slugify("  --Shell  Helix--  ").as_str(), "shell-helix");
        assert_eq!(Slug::slugify("روغن موتور ۱۰W40").as_str(), "روغن-موتور-۱۰w40");
        assert_eq!(Slug::slugify("!!!").as_str(), "item");
    }

    #[test]
    fn test_slugify_output_always_parses() {
        for name in ["Castrol GTX 20W-50", "پژو ۲۰۶ تیپ ۲", "A", "a__b"] {
            let slug = Slug::slugify(name);
            assert!(Slug::parse(slug.as_str()).is_ok(), "{name} -> {slug}");
        }
    }
}
