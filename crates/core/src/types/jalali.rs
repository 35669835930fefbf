//! Persian (Jalali / Solar Hijri) calendar dates.
//!
//! Customers read dates in the Jalali calendar. Storage stays in UTC
//! `timestamptz`; conversion happens only at presentation time.

use core::fmt;

use chrono::{Datelike, NaiveDate};

/// Persian month names, Farvardin first.
const MONTH_NAMES: [&str; 12] = [
    "فروردین",
    "اردیبهشت",
    "خرداد",
    "تیر",
    "مرداد",
    "شهریور",
    "مهر",
    "آبان",
    "آذر",
    "دی",
    "بهمن",
    "اسفند",
];

/// Cumulative day counts at the start of each Gregorian month (non-leap).
const GREGORIAN_MONTH_OFFSETS: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

/// A date in the Jalali calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JalaliDate {
    /// Solar Hijri year (e.g. 1403).
    pub year: i64,
    /// Month, 1 = Farvardin.
    pub month: u32,
    /// Day of month, starting at 1.
    pub day: u32,
}

impl JalaliDate {
    /// Convert a Gregorian date.
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use roghan_core::JalaliDate;
    ///
    /// let nowruz = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
    /// assert_eq!(JalaliDate::from_gregorian(nowruz).to_string(), "1403/01/01");
    /// ```
    #[must_use]
    pub fn from_gregorian(date: NaiveDate) -> Self {
        let gy = i64::from(date.year());
        let gm = date.month();
        let gd = i64::from(date.day());

        let month_offset = GREGORIAN_MONTH_OFFSETS
            .get(usize::try_from(gm.saturating_sub(1)).unwrap_or(0))
            .copied()
            .unwrap_or(0);
        let gy2 = if gm > 2 { gy + 1 } else { gy };

        let mut days = 355_666 + 365 * gy + (gy2 + 3) / 4 - (gy2 + 99) / 100 + (gy2 + 399) / 400
            + gd
            + month_offset;

        let mut year = -1595 + 33 * (days / 12_053);
        days %= 12_053;
        year += 4 * (days / 1461);
        days %= 1461;
        if days > 365 {
            year += (days - 1) / 365;
            days = (days - 1) % 365;
        }

        let (month, day) = if days < 186 {
            (1 + days / 31, 1 + days % 31)
        } else {
            (7 + (days - 186) / 30, 1 + (days - 186) % 30)
        };

        Self {
            year,
            month: u32::try_from(month).unwrap_or(1),
            day: u32::try_from(day).unwrap_or(1),
        }
    }

    /// Persian name of the month.
    #[must_use]
    pub fn month_name(&self) -> &'static str {
        usize::try_from(self.month.saturating_sub(1))
            .ok()
            .and_then(|i| MONTH_NAMES.get(i))
            .copied()
            .unwrap_or("")
    }

    /// Long form, e.g. `1 فروردین 1403`.
    #[must_use]
    pub fn long(&self) -> String {
        format!("{} {} {}", self.day, self.month_name(), self.year)
    }
}

impl fmt::Display for JalaliDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn jalali(y: i32, m: u32, d: u32) -> JalaliDate {
        JalaliDate::from_gregorian(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_nowruz() {
        assert_eq!(jalali(2024, 3, 20).to_string(), "1403/01/01");
        assert_eq!(jalali(2023, 3, 21).to_string(), "1402/01/01");
    }

    #[test]
    fn test_last_day_of_year() {
        assert_eq!(jalali(2024, 3, 19).to_string(), "1402/12/29");
    }

    #[test]
    fn test_second_half_of_year() {
        // 1 Mehr 1403
        let date = jalali(2024, 9, 22);
        assert_eq!((date.month, date.day), (7, 1));
        assert_eq!(date.month_name(), "مهر");
    }

    #[test]
    fn test_long_format() {
        assert_eq!(jalali(2024, 3, 20).long(), "1 فروردین 1403");
    }

    #[test]
    fn test_conversion_is_monotonic_over_a_year() {
        let mut previous = jalali(2023, 1, 1);
        let mut day = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        while day.year() == 2023 {
            let current = JalaliDate::from_gregorian(day);
            assert!(current > previous, "{day}: {current} <= {previous}");
            assert!((1..=12).contains(&current.month));
            assert!((1..=31).contains(&current.day));
            previous = current;
            day = day.succ_opt().unwrap();
        }
    }
}
