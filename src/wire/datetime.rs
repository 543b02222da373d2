//! Calendar timestamps and their OLE Automation date encoding.
//!
//! [`DateTime`] counts 100-nanosecond ticks since 0001-01-01 00:00:00 (proleptic Gregorian).
//! On the wire a date is a 64-bit float: whole days since 1899-12-30 plus the time of day as a
//! fraction. Dates before the epoch keep a positive time fraction, so -1.25 is 1899-12-29 06:00.

use std::fmt;

use crate::{Error, Result};

const TICKS_PER_MILLISECOND: i64 = 10_000;
const TICKS_PER_DAY: i64 = TICKS_PER_MILLISECOND * MILLIS_PER_DAY;
const MILLIS_PER_DAY: i64 = 86_400_000;

const DAYS_PER_YEAR: i64 = 365;
const DAYS_PER_4_YEARS: i64 = DAYS_PER_YEAR * 4 + 1;
const DAYS_PER_100_YEARS: i64 = DAYS_PER_4_YEARS * 25 - 1;
const DAYS_PER_400_YEARS: i64 = DAYS_PER_100_YEARS * 4 + 1;
const DAYS_TO_1899: i64 = DAYS_PER_400_YEARS * 4 + DAYS_PER_100_YEARS * 3 - 367;
const DAYS_TO_10000: i64 = DAYS_PER_400_YEARS * 25 - 366;

const DOUBLE_DATE_OFFSET: i64 = DAYS_TO_1899 * TICKS_PER_DAY;
const OA_DATE_MIN_TICKS: i64 = (DAYS_PER_100_YEARS - DAYS_PER_YEAR) * TICKS_PER_DAY;
const OA_DATE_MIN: f64 = -657_435.0;
const OA_DATE_MAX: f64 = 2_958_466.0;
const MAX_MILLIS: i64 = DAYS_TO_10000 * MILLIS_PER_DAY;

const DAYS_TO_MONTH_365: [i64; 13] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];
const DAYS_TO_MONTH_366: [i64; 13] = [0, 31, 60, 91, 121, 152, 182, 213, 244, 274, 305, 335, 366];

/// A point in time with 100-nanosecond resolution between the years 1 and 9999.
///
/// # Examples
///
/// ```rust
/// use dispbind::wire::DateTime;
///
/// let noon = DateTime::from_ymd_hms(1900, 1, 1, 12, 0, 0)?;
/// assert_eq!(noon.to_oa_date()?, 2.5);
/// assert_eq!(DateTime::from_oa_date(2.5)?, noon);
/// # Ok::<(), dispbind::Error>(())
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DateTime {
    ticks: i64,
}

fn is_leap_year(year: i64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

impl DateTime {
    /// 0001-01-01 00:00:00
    pub const MIN: DateTime = DateTime { ticks: 0 };
    /// 9999-12-31 23:59:59.9999999
    pub const MAX: DateTime = DateTime {
        ticks: DAYS_TO_10000 * TICKS_PER_DAY - 1,
    };
    /// Ticks in one day
    pub const TICKS_PER_DAY: i64 = TICKS_PER_DAY;

    /// Creates a timestamp from ticks since 0001-01-01.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDate`] outside of the supported range.
    pub fn from_ticks(ticks: i64) -> Result<Self> {
        if !(Self::MIN.ticks..=Self::MAX.ticks).contains(&ticks) {
            return Err(Error::InvalidDate(format!("{ticks} ticks")));
        }
        Ok(DateTime { ticks })
    }

    /// Creates a timestamp from calendar fields.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDate`] for fields that do not form a valid date and time.
    pub fn from_ymd_hms(
        year: u32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Result<Self> {
        Self::from_ymd_hms_milli(year, month, day, hour, minute, second, 0)
    }

    /// Creates a timestamp from calendar fields with milliseconds.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDate`] for fields that do not form a valid date and time.
    pub fn from_ymd_hms_milli(
        year: u32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        milli: u32,
    ) -> Result<Self> {
        let invalid = || {
            Error::InvalidDate(format!(
                "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{milli:03}"
            ))
        };
        let (year, month, day) = (i64::from(year), i64::from(month), i64::from(day));
        if !(1..=9999).contains(&year) || !(1..=12).contains(&month) {
            return Err(invalid());
        }
        let days_to_month = if is_leap_year(year) {
            &DAYS_TO_MONTH_366
        } else {
            &DAYS_TO_MONTH_365
        };
        let month = month as usize;
        if day < 1 || day > days_to_month[month] - days_to_month[month - 1] {
            return Err(invalid());
        }
        if hour > 23 || minute > 59 || second > 59 || milli > 999 {
            return Err(invalid());
        }

        let y = year - 1;
        let days = y * 365 + y / 4 - y / 100 + y / 400 + days_to_month[month - 1] + day - 1;
        let millis = ((i64::from(hour) * 60 + i64::from(minute)) * 60 + i64::from(second))
            * 1000
            + i64::from(milli);
        Self::from_ticks(days * TICKS_PER_DAY + millis * TICKS_PER_MILLISECOND)
    }

    /// Ticks since 0001-01-01.
    #[must_use]
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Encodes as an OLE Automation date.
    ///
    /// A value below one day is a pure time of day and is placed on 1899-12-30.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDate`] for dates before 0100-01-01.
    pub fn to_oa_date(&self) -> Result<f64> {
        let mut ticks = self.ticks;
        if ticks == 0 {
            return Ok(0.0);
        }
        if ticks < TICKS_PER_DAY {
            ticks += DOUBLE_DATE_OFFSET;
        }
        if ticks < OA_DATE_MIN_TICKS {
            return Err(Error::InvalidDate(format!("{self} precedes 0100-01-01")));
        }

        let mut millis = (ticks - DOUBLE_DATE_OFFSET) / TICKS_PER_MILLISECOND;
        if millis < 0 {
            let frac = millis % MILLIS_PER_DAY;
            if frac != 0 {
                millis -= (MILLIS_PER_DAY + frac) * 2;
            }
        }
        Ok(millis as f64 / MILLIS_PER_DAY as f64)
    }

    /// Decodes an OLE Automation date, rounding to the nearest millisecond.
    ///
    /// # Errors
    /// Returns [`Error::InvalidDate`] outside of the representable range.
    pub fn from_oa_date(value: f64) -> Result<Self> {
        if !(value < OA_DATE_MAX && value > OA_DATE_MIN) {
            return Err(Error::InvalidDate(value.to_string()));
        }

        let mut millis = value * MILLIS_PER_DAY as f64 + if value >= 0.0 { 0.5 } else { -0.5 };
        if millis < 0.0 {
            millis -= (millis % MILLIS_PER_DAY as f64) * 2.0;
        }
        millis += (DOUBLE_DATE_OFFSET / TICKS_PER_MILLISECOND) as f64;

        let millis = millis as i64;
        if !(0..MAX_MILLIS).contains(&millis) {
            return Err(Error::InvalidDate(value.to_string()));
        }
        Self::from_ticks(millis * TICKS_PER_MILLISECOND)
    }

    /// Calendar fields: year, month, day, hour, minute, second, millisecond.
    #[must_use]
    pub fn fields(&self) -> (u32, u32, u32, u32, u32, u32, u32) {
        let mut days = self.ticks / TICKS_PER_DAY;
        let y400 = days / DAYS_PER_400_YEARS;
        days -= y400 * DAYS_PER_400_YEARS;
        let mut y100 = days / DAYS_PER_100_YEARS;
        if y100 == 4 {
            y100 = 3;
        }
        days -= y100 * DAYS_PER_100_YEARS;
        let y4 = days / DAYS_PER_4_YEARS;
        days -= y4 * DAYS_PER_4_YEARS;
        let mut y1 = days / DAYS_PER_YEAR;
        if y1 == 4 {
            y1 = 3;
        }
        days -= y1 * DAYS_PER_YEAR;

        let year = y400 * 400 + y100 * 100 + y4 * 4 + y1 + 1;
        let days_to_month = if y1 == 3 && (y4 != 24 || y100 == 3) {
            &DAYS_TO_MONTH_366
        } else {
            &DAYS_TO_MONTH_365
        };
        let mut month = 1;
        while days >= days_to_month[month] {
            month += 1;
        }
        let day = days - days_to_month[month - 1] + 1;

        let millis = (self.ticks % TICKS_PER_DAY) / TICKS_PER_MILLISECOND;
        (
            year as u32,
            month as u32,
            day as u32,
            (millis / 3_600_000) as u32,
            (millis / 60_000 % 60) as u32,
            (millis / 1000 % 60) as u32,
            (millis % 1000) as u32,
        )
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (year, month, day, hour, minute, second, milli) = self.fields();
        write!(
            f,
            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{milli:03}"
        )
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DateTime({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_oa_dates() {
        let cases = vec![
            ((1899, 12, 30, 0, 0, 0, 0), 0.0),
            ((1900, 1, 1, 12, 0, 0, 0), 2.5),
            ((1899, 12, 29, 18, 0, 0, 0), -1.75),
            ((1899, 12, 29, 6, 0, 0, 0), -1.25),
            ((100, 1, 1, 0, 0, 0, 0), -657_434.0),
            ((2000, 1, 1, 0, 0, 0, 0), 36_526.0),
        ];

        for ((y, mo, d, h, mi, s, ms), expected) in cases {
            let date = DateTime::from_ymd_hms_milli(y, mo, d, h, mi, s, ms).unwrap();
            assert_eq!(date.to_oa_date().unwrap(), expected, "{date}");
            assert_eq!(DateTime::from_oa_date(expected).unwrap(), date);
        }
    }

    #[test]
    fn millisecond_round_trip() {
        let date = DateTime::from_ymd_hms_milli(2024, 2, 29, 12, 34, 56, 789).unwrap();
        let oa = date.to_oa_date().unwrap();
        assert_eq!(DateTime::from_oa_date(oa).unwrap(), date);
        assert_eq!(date.to_string(), "2024-02-29 12:34:56.789");

        let last = DateTime::from_ymd_hms_milli(9999, 12, 31, 23, 59, 59, 999).unwrap();
        let oa = last.to_oa_date().unwrap();
        assert_eq!(DateTime::from_oa_date(oa).unwrap(), last);
    }

    #[test]
    fn time_of_day_only() {
        let six_hours = DateTime::from_ticks(6 * 3_600_000 * TICKS_PER_MILLISECOND).unwrap();
        assert_eq!(six_hours.to_oa_date().unwrap(), 0.25);
        assert_eq!(DateTime::MIN.to_oa_date().unwrap(), 0.0);
    }

    #[test]
    fn out_of_range() {
        assert!(DateTime::from_oa_date(OA_DATE_MAX).is_err());
        assert!(DateTime::from_oa_date(OA_DATE_MIN).is_err());
        assert!(DateTime::from_oa_date(f64::NAN).is_err());

        let early = DateTime::from_ymd_hms(50, 6, 1, 0, 0, 0).unwrap();
        assert!(early.to_oa_date().is_err());

        assert!(DateTime::from_ymd_hms(2023, 2, 29, 0, 0, 0).is_err());
        assert!(DateTime::from_ymd_hms(2023, 13, 1, 0, 0, 0).is_err());
        assert!(DateTime::from_ticks(-1).is_err());
    }
}
