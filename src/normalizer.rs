use chrono::{DateTime, Days, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};

/// Output form of every normalized timestamp: seconds precision, UTC, literal `Z`.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub const FORMAT_HINT: &str = "Expected an ISO 8601 timestamp such as '2018-11-05T22:44:00+05:30', \
     '2018-11-05T17:14:00Z' or '2018-11-05 22:44:00' (no offset means local time)";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Error parsing '{input}': {reason}")]
pub struct InvalidTimestamp {
    pub input: String,
    pub reason: String,
}

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

struct Parsed {
    local: NaiveDateTime,
    offset: Option<FixedOffset>,
}

/// Normalizes `input` into `YYYY-MM-DDTHH:MM:SSZ`.
///
/// A timestamp without an explicit offset is read in the local time zone of
/// this process, not in UTC. Callers running in a different zone than the
/// person who typed the timestamp will get a shifted instant; use
/// [`normalize_in`] to pin the zone.
pub fn normalize(input: &str) -> Result<String, InvalidTimestamp> {
    normalize_in(input, &Local)
}

/// Like [`normalize`], with `zone` used for timestamps that carry no offset.
pub fn normalize_in<Tz: TimeZone>(input: &str, zone: &Tz) -> Result<String, InvalidTimestamp> {
    let instant = parse_instant(input, zone)?;
    Ok(instant.format(CANONICAL_FORMAT).to_string())
}

pub fn parse_instant<Tz: TimeZone>(input: &str, zone: &Tz) -> Result<DateTime<Utc>, InvalidTimestamp> {
    let fail = |reason: &str| InvalidTimestamp {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let parsed = parse_iso(input.trim()).map_err(fail)?;
    let instant = match parsed.offset {
        Some(offset) => offset
            .from_local_datetime(&parsed.local)
            .single()
            .map(|dt| dt.with_timezone(&Utc)),
        // DST fold resolves to the earlier instant, a DST gap has none
        None => zone
            .from_local_datetime(&parsed.local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    };

    let instant = instant.ok_or_else(|| fail("time does not exist in the local time zone"))?;
    tracing::debug!(input, utc = %instant, "normalized timestamp");
    Ok(instant)
}

fn parse_iso(input: &str) -> Result<Parsed, &'static str> {
    let bytes = input.as_bytes();
    if bytes.is_empty() {
        return Err("empty timestamp");
    }

    let mut i = 0;
    let date = parse_date(bytes, &mut i)?;
    if i == bytes.len() {
        return Ok(Parsed {
            local: date.and_time(NaiveTime::MIN),
            offset: None,
        });
    }

    // any single character separates date and time, 'T' and ' ' being the usual ones
    i += input[i..].chars().next().map_or(1, char::len_utf8);

    let (time, next_day) = parse_time(bytes, &mut i)?;
    let offset = parse_offset(bytes, &mut i)?;
    if i != bytes.len() {
        return Err("unexpected trailing characters");
    }

    let mut local = date.and_time(time);
    if next_day {
        local = local.checked_add_days(Days::new(1)).ok_or("date out of range")?;
    }
    Ok(Parsed { local, offset })
}

/// Calendar (`YYYY-MM-DD`, `YYYYMMDD`, `YYYY-MM`, `YYYY`), ordinal (`YYYY-DDD`,
/// `YYYYDDD`) and week (`YYYY-Www-D`, `YYYYWwwD`, `YYYY-Www`, `YYYYWww`) dates.
/// The reduced forms `YYYY`, `YYYY-MM` and a week without weekday must end the input.
fn parse_date(bytes: &[u8], i: &mut usize) -> Result<NaiveDate, &'static str> {
    let year = digits(bytes, i, 4).ok_or("expected a four-digit year")? as i32;
    if *i == bytes.len() {
        return NaiveDate::from_ymd_opt(year, 1, 1).ok_or("date out of range");
    }

    let extended = bytes[*i] == b'-';
    if extended {
        *i += 1;
    }
    if bytes.get(*i) == Some(&b'W') {
        *i += 1;
        return parse_week_date(bytes, i, year, extended);
    }

    if digit_run(bytes, *i) == 3 {
        let ordinal = digits(bytes, i, 3).ok_or("expected a three-digit day of year")?;
        return NaiveDate::from_yo_opt(year, ordinal).ok_or("day of year out of range");
    }

    let month = digits(bytes, i, 2).ok_or("expected a two-digit month")?;
    let day = if extended && *i == bytes.len() {
        1
    } else {
        if extended {
            if bytes.get(*i) != Some(&b'-') {
                return Err("expected '-' between month and day");
            }
            *i += 1;
        }
        digits(bytes, i, 2).ok_or("expected a two-digit day")?
    };

    NaiveDate::from_ymd_opt(year, month, day).ok_or("date out of range")
}

/// Week number and optional ISO weekday (1 is Monday, the default).
fn parse_week_date(bytes: &[u8], i: &mut usize, year: i32, extended: bool) -> Result<NaiveDate, &'static str> {
    let week = digits(bytes, i, 2).ok_or("expected a two-digit week")?;
    let mut weekday = Weekday::Mon;
    if *i < bytes.len() {
        if (bytes[*i] == b'-') != extended {
            return Err("inconsistent use of '-' in week date");
        }
        if extended {
            *i += 1;
        }
        let day = digits(bytes, i, 1).ok_or("expected a one-digit weekday")?;
        weekday = match day {
            1..=7 => WEEKDAYS[day as usize - 1],
            _ => return Err("weekday out of range"),
        };
    }

    NaiveDate::from_isoywd_opt(year, week, weekday).ok_or("week out of range")
}

/// Returns the time of day and whether it rolled over to the next day (`24:00`).
fn parse_time(bytes: &[u8], i: &mut usize) -> Result<(NaiveTime, bool), &'static str> {
    let hour = digits(bytes, i, 2).ok_or("expected a two-digit hour")?;
    let (mut minute, mut second, mut nanos) = (0, 0, 0);

    let extended = bytes.get(*i) == Some(&b':');
    if extended || next_is_digit(bytes, *i) {
        if extended {
            *i += 1;
        }
        minute = digits(bytes, i, 2).ok_or("expected a two-digit minute")?;

        let has_seconds = if extended {
            bytes.get(*i) == Some(&b':')
        } else {
            next_is_digit(bytes, *i)
        };
        if has_seconds {
            if extended {
                *i += 1;
            }
            second = digits(bytes, i, 2).ok_or("expected a two-digit second")?;
            if matches!(bytes.get(*i), Some(b'.') | Some(b',')) {
                *i += 1;
                nanos = fraction(bytes, i)?;
            }
        }
    }

    if hour == 24 {
        if minute != 0 || second != 0 || nanos != 0 {
            return Err("hour 24 is only valid as 24:00:00");
        }
        return Ok((NaiveTime::MIN, true));
    }

    let time = NaiveTime::from_hms_nano_opt(hour, minute, second, nanos).ok_or("time out of range")?;
    Ok((time, false))
}

fn parse_offset(bytes: &[u8], i: &mut usize) -> Result<Option<FixedOffset>, &'static str> {
    let sign = match bytes.get(*i) {
        None => return Ok(None),
        Some(b'Z') | Some(b'z') => 0,
        Some(b'+') => 1,
        Some(b'-') => -1,
        Some(_) => return Err("expected a UTC offset such as 'Z' or '+05:30'"),
    };
    *i += 1;
    if sign == 0 {
        return FixedOffset::east_opt(0).ok_or("offset out of range").map(Some);
    }

    let hours = digits(bytes, i, 2).ok_or("expected a two-digit offset hour")?;
    let mut minutes = 0;
    if bytes.get(*i) == Some(&b':') {
        *i += 1;
        minutes = digits(bytes, i, 2).ok_or("expected a two-digit offset minute")?;
    } else if next_is_digit(bytes, *i) {
        minutes = digits(bytes, i, 2).ok_or("expected a two-digit offset minute")?;
    }
    if minutes >= 60 {
        return Err("offset minutes out of range");
    }

    let seconds = sign * (hours * 3600 + minutes * 60) as i32;
    FixedOffset::east_opt(seconds).ok_or("offset out of range").map(Some)
}

/// Fractional seconds, truncated to nanoseconds.
fn fraction(bytes: &[u8], i: &mut usize) -> Result<u32, &'static str> {
    let start = *i;
    while *i < bytes.len() && bytes[*i].is_ascii_digit() {
        *i += 1;
    }
    if *i == start {
        return Err("expected digits after the decimal separator");
    }

    let frac = &bytes[start..*i];
    Ok((0..9).fold(0u32, |acc, k| {
        acc * 10 + frac.get(k).map_or(0, |d| u32::from(d - b'0'))
    }))
}

/// Reads exactly `n` ASCII digits at `*i`, advancing only on success.
fn digits(bytes: &[u8], i: &mut usize, n: usize) -> Option<u32> {
    let end = i.checked_add(n)?;
    let slice = bytes.get(*i..end)?;
    if !slice.iter().all(u8::is_ascii_digit) {
        return None;
    }
    *i = end;
    Some(slice.iter().fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0')))
}

fn digit_run(bytes: &[u8], i: usize) -> usize {
    bytes.get(i..).map_or(0, |rest| rest.iter().take_while(|b| b.is_ascii_digit()).count())
}

fn next_is_digit(bytes: &[u8], i: usize) -> bool {
    bytes.get(i).is_some_and(|b| b.is_ascii_digit())
}
