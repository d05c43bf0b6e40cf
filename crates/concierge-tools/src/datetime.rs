//! Lenient parsing of a visitor's preferred date and time.
//!
//! ISO-8601 is tried first. Otherwise the free-form `day/month[/year] [at|a las]
//! hour[:minutes][am|pm|h|hs]` shape is accepted, read in the configured offset.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use concierge_core::config::DateTimeConfig;
use concierge_core::error::{ConciergeError, Result};

// `%.f` also matches when there is no fraction. `%#z` takes `Z`, `-03`, `-0300`
// and `-03:00`.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
    "%Y-%m-%d %H:%M%#z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const LOCALE_PATTERN: &str = r"(?ix)
    ^(?P<a>\d{1,2}) [/.\-] (?P<b>\d{1,2})
    (?: [/.\-] (?P<year>\d{4}|\d{2}) )?
    (?: \s*,\s* | \s+ )
    (?: (?: at | a \s+ las? ) \s+ )?
    (?P<hour>\d{1,2})
    (?: : (?P<minute>\d{2}) )?
    \s*
    (?P<suffix> a\.?\s?m\.? | p\.?\s?m\.? | hs\.? | h\.? )?
    $";

pub struct DateParser {
    offset: FixedOffset,
    day_first: bool,
    two_digit_year_base: i32,
    roll_forward_missing_year: bool,
    pattern: Regex,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Meridiem {
    Am,
    Pm,
    TwentyFour,
}

impl DateParser {
    pub fn new(config: &DateTimeConfig) -> Result<Self> {
        let pattern = Regex::new(LOCALE_PATTERN)
            .map_err(|e| ConciergeError::Config(format!("date pattern: {e}")))?;
        Ok(Self {
            offset: config.offset()?,
            day_first: config.day_first,
            two_digit_year_base: config.two_digit_year_base,
            roll_forward_missing_year: config.roll_forward_missing_year,
            pattern,
        })
    }

    /// Parse relative to the current time.
    pub fn parse(&self, raw: &str) -> Result<DateTime<FixedOffset>> {
        self.parse_at(raw, Utc::now().with_timezone(&self.offset))
    }

    /// Parse relative to `now`, which only matters when the year is omitted.
    pub fn parse_at(&self, raw: &str, now: DateTime<FixedOffset>) -> Result<DateTime<FixedOffset>> {
        let input = raw.trim();
        if let Some(dt) = self.parse_iso(input) {
            return Ok(dt);
        }
        self.parse_locale(input, now)
            .ok_or_else(|| ConciergeError::InvalidDateTime(raw.to_string()))
    }

    fn parse_iso(&self, input: &str) -> Option<DateTime<FixedOffset>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Some(dt.with_timezone(&self.offset));
        }
        if let Some(dt) = OFFSET_FORMATS
            .iter()
            .find_map(|fmt| DateTime::parse_from_str(input, fmt).ok())
        {
            return Some(dt.with_timezone(&self.offset));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
            .and_then(|naive| self.offset.from_local_datetime(&naive).single())
    }

    fn parse_locale(&self, input: &str, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        let caps = self.pattern.captures(input)?;
        let a: u32 = caps.name("a")?.as_str().parse().ok()?;
        let b: u32 = caps.name("b")?.as_str().parse().ok()?;
        let (day, month) = if self.day_first { (a, b) } else { (b, a) };

        let minute: u32 = match caps.name("minute") {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        let meridiem = match caps.name("suffix") {
            Some(s) => {
                let s: String = s
                    .as_str()
                    .chars()
                    .filter(|c| c.is_ascii_alphabetic())
                    .collect::<String>()
                    .to_ascii_lowercase();
                match s.as_str() {
                    "am" => Meridiem::Am,
                    "pm" => Meridiem::Pm,
                    _ => Meridiem::TwentyFour,
                }
            }
            None => Meridiem::TwentyFour,
        };
        let hour = to_24h(caps.name("hour")?.as_str().parse().ok()?, meridiem)?;

        let explicit_year = match caps.name("year") {
            Some(y) if y.as_str().len() == 2 => {
                Some(self.two_digit_year_base + y.as_str().parse::<i32>().ok()?)
            }
            Some(y) => Some(y.as_str().parse::<i32>().ok()?),
            None => None,
        };

        let build = |year: i32| -> Option<DateTime<FixedOffset>> {
            let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
            self.offset.from_local_datetime(&naive).single()
        };

        match explicit_year {
            Some(year) => build(year),
            None => {
                let candidate = build(now.year())?;
                if self.roll_forward_missing_year && candidate < now {
                    build(now.year() + 1)
                } else {
                    Some(candidate)
                }
            }
        }
    }
}

fn to_24h(hour: u32, meridiem: Meridiem) -> Option<u32> {
    match meridiem {
        Meridiem::TwentyFour => (hour <= 23).then_some(hour),
        Meridiem::Am | Meridiem::Pm if !(1..=12).contains(&hour) => None,
        Meridiem::Am => Some(hour % 12),
        Meridiem::Pm => Some(hour % 12 + 12),
    }
}
