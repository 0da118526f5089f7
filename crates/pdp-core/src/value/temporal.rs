//! Date, time and duration values

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

const NANOS_PER_SECOND: i128 = 1_000_000_000;
const NANOS_PER_MINUTE: i128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i128 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: i128 = 24 * NANOS_PER_HOUR;

/// Split an optional `Z` / `(+|-)HH:MM` suffix off a lexical date or time
fn split_timezone(lexical: &str) -> Result<(&str, Option<FixedOffset>), String> {
    if let Some(body) = lexical.strip_suffix('Z') {
        return Ok((body, FixedOffset::east_opt(0)));
    }
    let bytes = lexical.as_bytes();
    let len = bytes.len();
    if len >= 6 && matches!(bytes[len - 6], b'+' | b'-') && bytes[len - 3] == b':' {
        let (body, tz) = lexical.split_at(len - 6);
        let sign = if tz.starts_with('-') { -1 } else { 1 };
        let hours: i32 = tz[1..3].parse().map_err(|_| format!("invalid timezone '{}'", tz))?;
        let minutes: i32 = tz[4..6].parse().map_err(|_| format!("invalid timezone '{}'", tz))?;
        if hours > 14 || minutes > 59 {
            return Err(format!("timezone out of range '{}'", tz));
        }
        let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .ok_or_else(|| format!("timezone out of range '{}'", tz))?;
        return Ok((body, Some(offset)));
    }
    Ok((lexical, None))
}

fn write_timezone(f: &mut fmt::Formatter<'_>, tz: Option<FixedOffset>) -> fmt::Result {
    match tz {
        None => Ok(()),
        Some(offset) if offset.local_minus_utc() == 0 => f.write_str("Z"),
        Some(offset) => {
            let secs = offset.local_minus_utc();
            let sign = if secs < 0 { '-' } else { '+' };
            let secs = secs.abs();
            write!(f, "{}{:02}:{:02}", sign, secs / 3600, (secs % 3600) / 60)
        },
    }
}

/// `xs:date` with optional timezone
#[derive(Debug, Clone, Copy)]
pub struct XacmlDate {
    pub date: NaiveDate,
    pub timezone: Option<FixedOffset>,
}

impl XacmlDate {
    pub fn parse(lexical: &str) -> Result<Self, String> {
        let (body, timezone) = split_timezone(lexical)?;
        let date = NaiveDate::parse_from_str(body, "%Y-%m-%d").map_err(|e| e.to_string())?;
        Ok(Self { date, timezone })
    }
}

impl PartialEq for XacmlDate {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date
            && self.timezone.map(|o| o.local_minus_utc()) == other.timezone.map(|o| o.local_minus_utc())
    }
}

impl fmt::Display for XacmlDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))?;
        write_timezone(f, self.timezone)
    }
}

/// `xs:time` with optional timezone
#[derive(Debug, Clone, Copy)]
pub struct XacmlTime {
    pub time: NaiveTime,
    pub timezone: Option<FixedOffset>,
}

impl XacmlTime {
    pub fn parse(lexical: &str) -> Result<Self, String> {
        let (body, timezone) = split_timezone(lexical)?;
        let time = NaiveTime::parse_from_str(body, "%H:%M:%S%.f").map_err(|e| e.to_string())?;
        Ok(Self { time, timezone })
    }

    fn utc_time(&self) -> NaiveTime {
        match self.timezone {
            Some(offset) => {
                self.time - chrono::Duration::seconds(i64::from(offset.local_minus_utc()))
            },
            None => self.time,
        }
    }
}

impl PartialEq for XacmlTime {
    fn eq(&self, other: &Self) -> bool {
        match (self.timezone, other.timezone) {
            (Some(_), Some(_)) => self.utc_time() == other.utc_time(),
            _ => self.time == other.time,
        }
    }
}

impl fmt::Display for XacmlTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.time.format("%H:%M:%S%.f"))?;
        write_timezone(f, self.timezone)
    }
}

/// `xs:dateTime` with optional timezone
#[derive(Debug, Clone, Copy)]
pub struct XacmlDateTime {
    pub date_time: NaiveDateTime,
    pub timezone: Option<FixedOffset>,
}

impl XacmlDateTime {
    pub fn parse(lexical: &str) -> Result<Self, String> {
        let (body, timezone) = split_timezone(lexical)?;
        let date_time = NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|e| e.to_string())?;
        Ok(Self { date_time, timezone })
    }

    fn utc_date_time(&self) -> NaiveDateTime {
        match self.timezone {
            Some(offset) => {
                self.date_time - chrono::Duration::seconds(i64::from(offset.local_minus_utc()))
            },
            None => self.date_time,
        }
    }
}

impl PartialEq for XacmlDateTime {
    fn eq(&self, other: &Self) -> bool {
        match (self.timezone, other.timezone) {
            (Some(_), Some(_)) => self.utc_date_time() == other.utc_date_time(),
            _ => self.date_time == other.date_time,
        }
    }
}

impl fmt::Display for XacmlDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date_time.format("%Y-%m-%dT%H:%M:%S%.f"))?;
        write_timezone(f, self.timezone)
    }
}

/// Reads `<digits><designator>` pairs from a duration body such as `1DT2H`
struct DurationScanner<'a> {
    rest: &'a str,
}

impl<'a> DurationScanner<'a> {
    /// Next `(number, designator)` pair, the number kept lexical so seconds can carry a fraction
    fn next_component(&mut self) -> Result<Option<(&'a str, char)>, String> {
        if self.rest.is_empty() || self.rest.starts_with('T') {
            return Ok(None);
        }
        let end = self
            .rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing designator after '{}'", self.rest))?;
        if end == 0 {
            return Err(format!("expected digits at '{}'", self.rest));
        }
        let number = &self.rest[..end];
        let designator = self.rest[end..].chars().next().unwrap_or('?');
        self.rest = &self.rest[end + designator.len_utf8()..];
        Ok(Some((number, designator)))
    }
}

fn parse_whole(number: &str) -> Result<i128, String> {
    number.parse::<i128>().map_err(|_| format!("invalid duration component '{}'", number))
}

/// `number` scaled by `unit`, or an error when it does not fit
fn parse_scaled(number: &str, unit: i128) -> Result<i128, String> {
    parse_whole(number)?.checked_mul(unit).ok_or_else(|| format!("duration overflow '{}'", number))
}

fn accumulate(total: i128, component: i128) -> Result<i128, String> {
    total.checked_add(component).ok_or_else(|| "duration overflow".to_string())
}

fn split_sign(lexical: &str) -> Result<(bool, &str), String> {
    let (negative, rest) = match lexical.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, lexical),
    };
    let body = rest.strip_prefix('P').ok_or_else(|| format!("duration must start with 'P': '{}'", lexical))?;
    if body.is_empty() {
        return Err(format!("empty duration '{}'", lexical));
    }
    Ok((negative, body))
}

/// `xs:dayTimeDuration`, stored as signed nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayTimeDuration {
    nanos: i128,
}

impl DayTimeDuration {
    pub fn from_nanos(nanos: i128) -> Self {
        Self { nanos }
    }

    pub fn as_nanos(&self) -> i128 {
        self.nanos
    }

    pub fn parse(lexical: &str) -> Result<Self, String> {
        let (negative, body) = split_sign(lexical)?;
        let (date_part, time_part) = match body.find('T') {
            Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
            None => (body, None),
        };

        let mut nanos: i128 = 0;
        let mut seen = false;
        let mut scanner = DurationScanner { rest: date_part };
        while let Some((number, designator)) = scanner.next_component()? {
            match designator {
                'D' => nanos = accumulate(nanos, parse_scaled(number, NANOS_PER_DAY)?)?,
                other => return Err(format!("unexpected designator '{}' in '{}'", other, lexical)),
            }
            seen = true;
        }

        if let Some(time_part) = time_part {
            if time_part.is_empty() {
                return Err(format!("empty time section in '{}'", lexical));
            }
            let mut scanner = DurationScanner { rest: time_part };
            while let Some((number, designator)) = scanner.next_component()? {
                match designator {
                    'H' => nanos = accumulate(nanos, parse_scaled(number, NANOS_PER_HOUR)?)?,
                    'M' => nanos = accumulate(nanos, parse_scaled(number, NANOS_PER_MINUTE)?)?,
                    'S' => nanos = accumulate(nanos, parse_seconds(number)?)?,
                    other => {
                        return Err(format!("unexpected designator '{}' in '{}'", other, lexical))
                    },
                }
                seen = true;
            }
            if !scanner.rest.is_empty() {
                return Err(format!("trailing characters in '{}'", lexical));
            }
        }

        if !seen {
            return Err(format!("duration without components '{}'", lexical));
        }
        Ok(Self { nanos: if negative { -nanos } else { nanos } })
    }
}

fn parse_seconds(number: &str) -> Result<i128, String> {
    let (whole, fraction) = match number.split_once('.') {
        Some((w, f)) => (w, f),
        None => (number, ""),
    };
    let mut nanos = parse_scaled(whole, NANOS_PER_SECOND)?;
    if !fraction.is_empty() {
        if !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("invalid seconds '{}'", number));
        }
        let digits: String = fraction.chars().chain(std::iter::repeat('0')).take(9).collect();
        nanos = accumulate(nanos, parse_whole(&digits)?)?;
    }
    Ok(nanos)
}

impl fmt::Display for DayTimeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.nanos.abs();
        if self.nanos < 0 {
            f.write_str("-")?;
        }
        f.write_str("P")?;
        let days = rest / NANOS_PER_DAY;
        rest %= NANOS_PER_DAY;
        if days > 0 {
            write!(f, "{}D", days)?;
        }
        if rest == 0 {
            return if days == 0 { f.write_str("T0S") } else { Ok(()) };
        }
        f.write_str("T")?;
        let hours = rest / NANOS_PER_HOUR;
        rest %= NANOS_PER_HOUR;
        let minutes = rest / NANOS_PER_MINUTE;
        rest %= NANOS_PER_MINUTE;
        if hours > 0 {
            write!(f, "{}H", hours)?;
        }
        if minutes > 0 {
            write!(f, "{}M", minutes)?;
        }
        if rest > 0 {
            let secs = rest / NANOS_PER_SECOND;
            let frac = rest % NANOS_PER_SECOND;
            if frac == 0 {
                write!(f, "{}S", secs)?;
            } else {
                let frac = format!("{:09}", frac);
                write!(f, "{}.{}S", secs, frac.trim_end_matches('0'))?;
            }
        }
        Ok(())
    }
}

/// `xs:yearMonthDuration`, stored as signed months
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonthDuration {
    months: i64,
}

impl YearMonthDuration {
    pub fn from_months(months: i64) -> Self {
        Self { months }
    }

    pub fn months(&self) -> i64 {
        self.months
    }

    pub fn parse(lexical: &str) -> Result<Self, String> {
        let (negative, body) = split_sign(lexical)?;
        let mut months: i128 = 0;
        let mut seen = false;
        let mut scanner = DurationScanner { rest: body };
        while let Some((number, designator)) = scanner.next_component()? {
            match designator {
                'Y' => months = accumulate(months, parse_scaled(number, 12)?)?,
                'M' => months = accumulate(months, parse_whole(number)?)?,
                other => return Err(format!("unexpected designator '{}' in '{}'", other, lexical)),
            }
            seen = true;
        }
        if !seen || !scanner.rest.is_empty() {
            return Err(format!("invalid yearMonthDuration '{}'", lexical));
        }
        let months = i64::try_from(months).map_err(|_| format!("duration overflow '{}'", lexical))?;
        Ok(Self { months: if negative { -months } else { months } })
    }
}

impl fmt::Display for YearMonthDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.months.unsigned_abs();
        if self.months < 0 {
            f.write_str("-")?;
        }
        let (years, months) = (abs / 12, abs % 12);
        match (years, months) {
            (0, m) => write!(f, "P{}M", m),
            (y, 0) => write!(f, "P{}Y", y),
            (y, m) => write!(f, "P{}Y{}M", y, m),
        }
    }
}
