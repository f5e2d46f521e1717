//! Conversion between Unix seconds and calendar fields.

const SECONDS_PER_DAY: u32 = 86_400;
const EPOCH_YEAR: u16 = 1970;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Weekday {
    Sunday = 0,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    fn from_days_since_epoch(days: u32) -> Self {
        // 1970-01-01 was a Thursday
        match (days + 4) % 7 {
            0 => Self::Sunday,
            1 => Self::Monday,
            2 => Self::Tuesday,
            3 => Self::Wednesday,
            4 => Self::Thursday,
            5 => Self::Friday,
            _ => Self::Saturday,
        }
    }
}

/// Broken-down local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    pub year: u16,
    /// 1 - 12
    pub month: u8,
    /// 1 - 31
    pub day: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub milliseconds: u16,
    /// 0 - 365
    pub yearday: u16,
    pub weekday: Weekday,
    /// Offset from UTC in minutes
    pub timezone: i16,
}

pub const fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

const fn days_in_year(year: u16) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// Days in `month` (1 - 12) of `year`; zero for an invalid month.
pub const fn days_in_month(month: u8, year: u16) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

impl DateTime {
    /// Local time for a UTC Unix timestamp.
    ///
    /// Local times before the epoch clamp to the epoch.
    pub fn from_unix(unix_seconds: u32, milliseconds: u16, timezone: i16) -> Self {
        let local = unix_seconds as i64 + timezone as i64 * 60;
        let local = local.clamp(0, u32::MAX as i64) as u32;

        let mut days = local / SECONDS_PER_DAY;
        let second_of_day = local % SECONDS_PER_DAY;
        let weekday = Weekday::from_days_since_epoch(days);

        let mut year = EPOCH_YEAR;
        while days >= days_in_year(year) {
            days -= days_in_year(year);
            year += 1;
        }
        let yearday = days as u16;

        let mut month = 1;
        loop {
            let length = days_in_month(month, year) as u32;
            if days < length {
                break;
            }
            days -= length;
            month += 1;
        }

        Self {
            year,
            month,
            day: days as u8 + 1,
            hours: (second_of_day / 3600) as u8,
            minutes: (second_of_day / 60 % 60) as u8,
            seconds: (second_of_day % 60) as u8,
            milliseconds,
            yearday,
            weekday,
            timezone,
        }
    }

    /// UTC Unix seconds for this local time. Weekday and yearday are
    /// ignored; the date is taken from year, month and day.
    pub fn to_unix(&self) -> u32 {
        let mut days: u32 = 0;
        for year in EPOCH_YEAR..self.year {
            days += days_in_year(year);
        }
        for month in 1..self.month {
            days += days_in_month(month, self.year) as u32;
        }
        days += self.day.saturating_sub(1) as u32;

        let local = days as i64 * SECONDS_PER_DAY as i64
            + self.hours as i64 * 3600
            + self.minutes as i64 * 60
            + self.seconds as i64;
        (local - self.timezone as i64 * 60).clamp(0, u32::MAX as i64) as u32
    }
}
