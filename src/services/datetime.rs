//! Permissive parsing of spoken date/time phrases ("next Tuesday 3pm",
//! "June 15th at 2:30 pm", "2026-11-02T14:00:00") into naive wall-clock
//! timestamps, and the spoken rendering used in replies.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};

const STRUCTURED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

const FILLERS: &[&str] = &["at", "on", "the", "of", "this", "o'clock", "oclock", "in"];

/// Renders a timestamp the way the assistant reads it back to the caller.
pub fn spoken(dt: &NaiveDateTime) -> String {
    dt.format("%A, %B %-d at %I:%M %p").to_string()
}

/// Parses `input` relative to `now`. Returns `None` when the phrase is not
/// understood or lacks a time of day.
pub fn parse_when(input: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    parse_structured(trimmed).or_else(|| parse_natural(trimmed, now))
}

// Stored timestamps have whole-second precision; the fraction is dropped here
// so the parsed, compared and stored values agree.
fn parse_structured(input: &str) -> Option<NaiveDateTime> {
    let parsed = match DateTime::parse_from_rfc3339(input) {
        Ok(dt) => dt.naive_utc(),
        Err(_) => STRUCTURED_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())?,
    };
    parsed.with_nanosecond(0)
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum Meridiem {
    Am,
    Pm,
}

#[derive(Clone, Copy, PartialEq, Debug, Default)]
enum ClockKind {
    /// "3pm", "noon": the half of the day is fixed
    #[default]
    Meridiem,
    /// "15:00", "3:30"
    Colon,
    /// "3" next to "o'clock" or a part-of-day word; hour stored as 0..=11
    BareHour,
}

#[derive(Default)]
struct Phrase {
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    kind: ClockKind,
    hint: Option<Meridiem>,
    // plain weekday: may roll a week forward if the slot already passed
    floating_weekday: bool,
}

impl Phrase {
    fn set_date(&mut self, date: NaiveDate) -> Option<()> {
        if self.date.is_some() {
            return None;
        }
        self.date = Some(date);
        Some(())
    }

    fn set_time(&mut self, time: NaiveTime, kind: ClockKind) -> Option<()> {
        if self.time.is_some() {
            return None;
        }
        self.time = Some(time);
        self.kind = kind;
        Some(())
    }
}

fn normalize(input: &str) -> Vec<String> {
    let lowered = input
        .to_lowercase()
        .replace("a.m.", "am")
        .replace("p.m.", "pm")
        .replace([',', '!', '?'], " ");
    lowered
        .split_whitespace()
        .map(|t| t.trim_end_matches('.').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn parse_natural(input: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let tokens = normalize(input);
    let today = now.date();
    let mut phrase = Phrase::default();
    let mut next_modifier = false;
    // a bare hour is only read as a time when something else pins it down
    let bare_hour_ok = tokens.iter().any(|t| {
        matches!(
            t.as_str(),
            "o'clock" | "oclock" | "tonight" | "morning" | "afternoon" | "evening" | "night"
        )
    });
    let mut i = 0;

    while i < tokens.len() {
        let tok = tokens[i].as_str();
        let peek = tokens.get(i + 1).map(String::as_str);
        i += 1;

        if FILLERS.contains(&tok) {
            continue;
        }

        match tok {
            "next" => {
                // only "next <weekday>" is understood
                peek.and_then(parse_weekday)?;
                next_modifier = true;
                continue;
            }
            "today" => phrase.set_date(today)?,
            "tonight" => {
                phrase.set_date(today)?;
                phrase.hint = Some(Meridiem::Pm);
            }
            "tomorrow" => phrase.set_date(today + Duration::days(1))?,
            "noon" | "midday" => {
                phrase.set_time(NaiveTime::from_hms_opt(12, 0, 0)?, ClockKind::Meridiem)?
            }
            "midnight" => phrase.set_time(NaiveTime::from_hms_opt(0, 0, 0)?, ClockKind::Meridiem)?,
            "morning" => phrase.hint = Some(Meridiem::Am),
            "afternoon" | "evening" | "night" => phrase.hint = Some(Meridiem::Pm),
            _ => {
                if let Some(weekday) = parse_weekday(tok) {
                    phrase.set_date(resolve_weekday(today, weekday, next_modifier))?;
                    phrase.floating_weekday = !next_modifier;
                } else if let Some(month) = parse_month(tok) {
                    // "june 15" / "june 15th 2027"
                    let day = peek.and_then(parse_day)?;
                    i += 1;
                    let year = tokens.get(i).and_then(|t| parse_year(t));
                    if year.is_some() {
                        i += 1;
                    }
                    phrase.set_date(resolve_month_day(today, month, day, year)?)?;
                } else if let Some(day) = parse_day(tok).filter(|_| peek.and_then(parse_month).is_some()) {
                    // "15th june" / "15 june 2027"
                    let month = peek.and_then(parse_month)?;
                    i += 1;
                    let year = tokens.get(i).and_then(|t| parse_year(t));
                    if year.is_some() {
                        i += 1;
                    }
                    phrase.set_date(resolve_month_day(today, month, day, year)?)?;
                } else if let Some(date) = parse_numeric_date(tok, today) {
                    phrase.set_date(date)?;
                } else {
                    let meridiem = peek.and_then(parse_meridiem);
                    if meridiem.is_some() {
                        i += 1;
                    }
                    let (time, kind) = parse_clock(tok, meridiem, bare_hour_ok)?;
                    phrase.set_time(time, kind)?;
                }
            }
        }
        next_modifier = false;
    }

    let mut time = phrase.time?;
    let mut half_day_roll = false;
    match (phrase.kind, phrase.hint) {
        (ClockKind::BareHour, Some(Meridiem::Pm)) => time = time + Duration::hours(12),
        (ClockKind::BareHour, Some(Meridiem::Am)) => {}
        // "tomorrow at 3 o'clock": read as a daytime hour
        (ClockKind::BareHour, None) if phrase.date.is_some() => {
            if time.hour() < 7 {
                time = time + Duration::hours(12);
            }
        }
        // "3 o'clock" alone: the next time the clock shows it
        (ClockKind::BareHour, None) => half_day_roll = true,
        (ClockKind::Colon, Some(Meridiem::Pm)) if (1..12).contains(&time.hour()) => {
            time = time + Duration::hours(12)
        }
        _ => {}
    }

    match phrase.date {
        Some(date) => {
            let candidate = date.and_time(time);
            if phrase.floating_weekday && candidate <= now {
                Some(candidate + Duration::days(7))
            } else {
                Some(candidate)
            }
        }
        None => {
            let step = if half_day_roll {
                Duration::hours(12)
            } else {
                Duration::days(1)
            };
            let mut candidate = today.and_time(time);
            while candidate <= now {
                candidate = candidate + step;
            }
            Some(candidate)
        }
    }
}

fn parse_weekday(tok: &str) -> Option<Weekday> {
    let weekday = match tok {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" | "tues" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" | "thur" | "thurs" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return None,
    };
    Some(weekday)
}

fn parse_month(tok: &str) -> Option<u32> {
    let month = match tok {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn parse_meridiem(tok: &str) -> Option<Meridiem> {
    match tok {
        "am" => Some(Meridiem::Am),
        "pm" => Some(Meridiem::Pm),
        _ => None,
    }
}

fn parse_day(tok: &str) -> Option<u32> {
    let digits = tok
        .strip_suffix("st")
        .or_else(|| tok.strip_suffix("nd"))
        .or_else(|| tok.strip_suffix("rd"))
        .or_else(|| tok.strip_suffix("th"))
        .unwrap_or(tok);
    if digits.is_empty() || digits.len() > 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|d| (1..=31).contains(d))
}

fn parse_year(tok: &str) -> Option<i32> {
    if tok.len() != 4 || !tok.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    tok.parse().ok()
}

/// "2026-11-02", "11/2" or "11/2/2026".
fn parse_numeric_date(tok: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(tok, "%Y-%m-%d") {
        return Some(date);
    }
    let parts: Vec<&str> = tok.split('/').collect();
    match parts.as_slice() {
        [m, d] => resolve_month_day(today, m.parse().ok()?, d.parse().ok()?, None),
        [m, d, y] => NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?),
        _ => None,
    }
}

/// "3", "3pm", "3:30", "15:00", "3:30pm". A bare hour is accepted only when
/// `bare_hour_ok` is set.
fn parse_clock(
    tok: &str,
    trailing: Option<Meridiem>,
    bare_hour_ok: bool,
) -> Option<(NaiveTime, ClockKind)> {
    let (body, attached) = if let Some(rest) = tok.strip_suffix("am") {
        (rest, Some(Meridiem::Am))
    } else if let Some(rest) = tok.strip_suffix("pm") {
        (rest, Some(Meridiem::Pm))
    } else {
        (tok, None)
    };
    if attached.is_some() && trailing.is_some() {
        return None;
    }
    let meridiem = attached.or(trailing);

    let (hour_str, minute_str) = match body.split_once(':') {
        Some((h, m)) => (h, Some(m)),
        None => (body, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.len() <= 2 && s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(hour_str) || !minute_str.map_or(true, |m| m.len() == 2 && all_digits(m)) {
        return None;
    }

    let hour: u32 = hour_str.parse().ok()?;
    let minute: u32 = minute_str.map_or(Some(0), |m| m.parse().ok())?;

    match meridiem {
        Some(m) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            let hour = match (m, hour) {
                (Meridiem::Am, 12) => 0,
                (Meridiem::Am, h) => h,
                (Meridiem::Pm, 12) => 12,
                (Meridiem::Pm, h) => h + 12,
            };
            Some((NaiveTime::from_hms_opt(hour, minute, 0)?, ClockKind::Meridiem))
        }
        None if minute_str.is_none() => {
            if !bare_hour_ok || !(1..=12).contains(&hour) {
                return None;
            }
            Some((NaiveTime::from_hms_opt(hour % 12, 0, 0)?, ClockKind::BareHour))
        }
        None => Some((NaiveTime::from_hms_opt(hour, minute, 0)?, ClockKind::Colon)),
    }
}

fn resolve_weekday(today: NaiveDate, weekday: Weekday, strictly_after: bool) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let mut ahead = (target - current).rem_euclid(7);
    if strictly_after && ahead == 0 {
        ahead = 7;
    }
    today + Duration::days(ahead)
}

fn resolve_month_day(today: NaiveDate, month: u32, day: u32, year: Option<i32>) -> Option<NaiveDate> {
    if let Some(year) = year {
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
    match this_year {
        Some(date) if date >= today => Some(date),
        _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
    }
}
