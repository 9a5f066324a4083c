use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Weekday};
use chrono_tz::America::Los_Angeles;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// First season scored with one bucket per Pacific calendar date
pub const DEFAULT_MODERN_CUTOFF_SEASON: i32 = 2025;

/// The league keeps its calendar on Pacific time
pub const LEAGUE_TIMEZONE: Tz = Los_Angeles;

/// Day groups used before the modern cutoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LegacyDay {
    Thursday,
    Friday,
    SundayMonday,
}

/// The grouping a pick is scored in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DayBucket {
    Legacy(LegacyDay),
    Date(NaiveDate),
}

impl DayBucket {
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DayBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayBucket::Legacy(LegacyDay::Thursday) => f.write_str("Thursday"),
            DayBucket::Legacy(LegacyDay::Friday) => f.write_str("Friday"),
            DayBucket::Legacy(LegacyDay::SundayMonday) => f.write_str("SundayMonday"),
            DayBucket::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

/// Classify a kickoff into its scoring bucket.
///
/// The instant is converted to Pacific time first, so a 03:00 UTC Tuesday
/// kickoff is a Monday night game. Seasons before `modern_cutoff_season`
/// group Thursday, Friday and everything else; later seasons use the date.
pub fn classify<T: TimeZone>(
    kickoff: &DateTime<T>,
    season: i32,
    modern_cutoff_season: i32,
) -> DayBucket {
    let local = kickoff.with_timezone(&LEAGUE_TIMEZONE);

    if season >= modern_cutoff_season {
        return DayBucket::Date(local.date_naive());
    }

    match local.weekday() {
        Weekday::Thu => DayBucket::Legacy(LegacyDay::Thursday),
        Weekday::Fri => DayBucket::Legacy(LegacyDay::Friday),
        // Saturday and early-week games fold into the weekend bucket
        _ => DayBucket::Legacy(LegacyDay::SundayMonday),
    }
}
