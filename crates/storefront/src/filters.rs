//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use roghan_core::JalaliDate;

/// Iran Standard Time (no daylight saving since 1401).
const TEHRAN_OFFSET_SECS: i32 = 3 * 3600 + 30 * 60;

/// Today's calendar date in Tehran.
#[must_use]
pub fn today_in_tehran() -> NaiveDate {
    FixedOffset::east_opt(TEHRAN_OFFSET_SECS).map_or_else(
        || Utc::now().date_naive(),
        |tehran| Utc::now().with_timezone(&tehran).date_naive(),
    )
}

/// Values that can be shown as a Jalali date.
pub trait AsJalali {
    /// The calendar date in Tehran, if there is one.
    fn jalali_date(&self) -> Option<JalaliDate>;
}

impl AsJalali for DateTime<Utc> {
    fn jalali_date(&self) -> Option<JalaliDate> {
        let tehran = FixedOffset::east_opt(TEHRAN_OFFSET_SECS)?;
        Some(JalaliDate::from_gregorian(
            self.with_timezone(&tehran).date_naive(),
        ))
    }
}

impl AsJalali for NaiveDate {
    fn jalali_date(&self) -> Option<JalaliDate> {
        Some(JalaliDate::from_gregorian(*self))
    }
}

impl<T: AsJalali> AsJalali for Option<T> {
    fn jalali_date(&self) -> Option<JalaliDate> {
        self.as_ref().and_then(AsJalali::jalali_date)
    }
}

impl<T: AsJalali + ?Sized> AsJalali for &T {
    fn jalali_date(&self) -> Option<JalaliDate> {
        (**self).jalali_date()
    }
}

/// Returns the current Jalali year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i64> {
    Ok(Utc::now().jalali_date().map_or(0, |d| d.year))
}

/// Short Jalali date, e.g. `1403/01/01`. Empty for `None`.
///
/// Usage in templates: `{{ order.created_at|jalali }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn jalali(value: impl AsJalali, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(value.jalali_date().map(|d| d.to_string()).unwrap_or_default())
}

/// Long Jalali date, e.g. `1 فروردین 1403`. Empty for `None`.
///
/// Usage in templates: `{{ post.published_at|jalali_long }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn jalali_long(value: impl AsJalali, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(value.jalali_date().map(|d| d.long()).unwrap_or_default())
}

/// Returns the content hash for main.css.
///
/// The hash is computed at build time from the CSS file content.
///
/// Usage in templates: `{{ ""|css_hash }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn css_hash(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("CSS_HASH"))
}

/// Returns the content hash for app.js.
///
/// Usage in templates: `{{ ""|js_hash }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn js_hash(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("JS_HASH"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_jalali_uses_tehran_day() {
        // 21:00 UTC on 19 March is 00:30 on 20 March in Tehran (Nowruz 1403)
        let late = Utc.with_ymd_and_hms(2024, 3, 19, 21, 0, 0).unwrap();
        assert_eq!(late.jalali_date().unwrap().to_string(), "1403/01/01");

        let early = Utc.with_ymd_and_hms(2024, 3, 19, 20, 0, 0).unwrap();
        assert_eq!(early.jalali_date().unwrap().to_string(), "1402/12/29");
    }

    #[test]
    fn test_jalali_option_and_reference() {
        let none: Option<DateTime<Utc>> = None;
        assert!(none.jalali_date().is_none());

        let date = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        assert_eq!((&&date).jalali_date().unwrap().long(), "1 فروردین 1403");
    }
}
