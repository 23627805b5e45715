use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// One recognized free-text date format: a regex over the *whole* date
/// token and a parser from the matched text to a `NaiveDate`. Patterns are
/// tried in priority order; once a span converts to ISO-8601 no later
/// pattern can re-match it (ISO's own pattern is excluded from the list —
/// it is detected separately as "already normalized").
struct DateFormat {
    name: &'static str,
    regex: &'static LazyLock<Regex>,
    parse: fn(&regex::Captures) -> Option<NaiveDate>,
}

static ISO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());
static ISO_SLASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})/(\d{2})/(\d{2})\b").unwrap());
static ISO_DOT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})\.(\d{1,2})\.(\d{1,2})\b").unwrap());
static US_SLASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());
static US_DASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,2})-(\d{1,2})-(\d{4})\b").unwrap());
static DOT_SLASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,2})\.(\d{1,2})\.(\d{4})\b").unwrap());
static US_SLASH_2Y: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{2})\b").unwrap());
static COMPACT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(19|20)(\d{2})(\d{2})(\d{2})\b").unwrap());
static MONTH_FULL_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{1,2}),?\s+(\d{4})\b").unwrap()
});
static DAY_MONTH_FULL_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s+(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{4})\b").unwrap()
});
static MONTH_ABBR_DAY_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\.?\s+(\d{1,2}),?\s+(\d{4})\b").unwrap()
});
static DAY_MONTH_ABBR_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s+(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\.?\s+(\d{4})\b").unwrap()
});

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let full = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    if let Some(pos) = full.iter().position(|m| *m == lower) {
        return Some(pos as u32 + 1);
    }
    let abbr = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    abbr.iter().position(|m| *m == &lower[..lower.len().min(3)]).map(|p| p as u32 + 1)
}

/// Plausible clinical-note year range; anything outside is treated as not a
/// date (guards against MRNs and dose strings matching digit patterns).
fn plausible_year(year: i32) -> bool {
    (1920..=2099).contains(&year)
}

fn formats() -> Vec<DateFormat> {
    vec![
        DateFormat {
            name: "iso_slash",
            regex: &ISO_SLASH,
            parse: |c| {
                let y: i32 = c[1].parse().ok()?;
                let m: u32 = c[2].parse().ok()?;
                let d: u32 = c[3].parse().ok()?;
                if !plausible_year(y) {
                    return None;
                }
                NaiveDate::from_ymd_opt(y, m, d)
            },
        },
        DateFormat {
            name: "iso_dot",
            regex: &ISO_DOT,
            parse: |c| {
                let y: i32 = c[1].parse().ok()?;
                let m: u32 = c[2].parse().ok()?;
                let d: u32 = c[3].parse().ok()?;
                if !plausible_year(y) {
                    return None;
                }
                NaiveDate::from_ymd_opt(y, m, d)
            },
        },
        DateFormat {
            name: "compact",
            regex: &COMPACT,
            parse: |c| {
                let y: i32 = format!("{}{}", &c[1], &c[2]).parse().ok()?;
                let m: u32 = c[3].parse().ok()?;
                let d: u32 = c[4].parse().ok()?;
                if !plausible_year(y) {
                    return None;
                }
                NaiveDate::from_ymd_opt(y, m, d)
            },
        },
        DateFormat {
            name: "month_full_day_year",
            regex: &MONTH_FULL_DAY_YEAR,
            parse: |c| {
                let m = month_number(&c[1])?;
                let d: u32 = c[2].parse().ok()?;
                let y: i32 = c[3].parse().ok()?;
                NaiveDate::from_ymd_opt(y, m, d)
            },
        },
        DateFormat {
            name: "day_month_full_year",
            regex: &DAY_MONTH_FULL_YEAR,
            parse: |c| {
                let d: u32 = c[1].parse().ok()?;
                let m = month_number(&c[2])?;
                let y: i32 = c[3].parse().ok()?;
                NaiveDate::from_ymd_opt(y, m, d)
            },
        },
        DateFormat {
            name: "month_abbr_day_year",
            regex: &MONTH_ABBR_DAY_YEAR,
            parse: |c| {
                let m = month_number(&c[1])?;
                let d: u32 = c[2].parse().ok()?;
                let y: i32 = c[3].parse().ok()?;
                NaiveDate::from_ymd_opt(y, m, d)
            },
        },
        DateFormat {
            name: "day_month_abbr_year",
            regex: &DAY_MONTH_ABBR_YEAR,
            parse: |c| {
                let d: u32 = c[1].parse().ok()?;
                let m = month_number(&c[2])?;
                let y: i32 = c[3].parse().ok()?;
                NaiveDate::from_ymd_opt(y, m, d)
            },
        },
        DateFormat {
            name: "us_slash",
            regex: &US_SLASH,
            parse: |c| {
                let a: u32 = c[1].parse().ok()?;
                let b: u32 = c[2].parse().ok()?;
                let y: i32 = c[3].parse().ok()?;
                // MM/DD/YYYY, falling back to DD/MM/YYYY when the first
                // field cannot be a month.
                if a <= 12 {
                    NaiveDate::from_ymd_opt(y, a, b)
                } else {
                    NaiveDate::from_ymd_opt(y, b, a)
                }
            },
        },
        DateFormat {
            name: "us_dash",
            regex: &US_DASH,
            parse: |c| {
                let a: u32 = c[1].parse().ok()?;
                let b: u32 = c[2].parse().ok()?;
                let y: i32 = c[3].parse().ok()?;
                if a <= 12 {
                    NaiveDate::from_ymd_opt(y, a, b)
                } else {
                    NaiveDate::from_ymd_opt(y, b, a)
                }
            },
        },
        DateFormat {
            name: "dot_slash",
            regex: &DOT_SLASH,
            parse: |c| {
                let a: u32 = c[1].parse().ok()?;
                let b: u32 = c[2].parse().ok()?;
                let y: i32 = c[3].parse().ok()?;
                // European convention: day.month.year.
                NaiveDate::from_ymd_opt(y, b, a).or_else(|| NaiveDate::from_ymd_opt(y, a, b))
            },
        },
        DateFormat {
            name: "us_slash_2digit_year",
            regex: &US_SLASH_2Y,
            parse: |c| {
                let a: u32 = c[1].parse().ok()?;
                let b: u32 = c[2].parse().ok()?;
                let yy: i32 = c[3].parse().ok()?;
                let y = if yy < 70 { 2000 + yy } else { 1900 + yy };
                if a <= 12 {
                    NaiveDate::from_ymd_opt(y, a, b)
                } else {
                    NaiveDate::from_ymd_opt(y, b, a)
                }
            },
        },
    ]
}

struct Accepted {
    start: usize,
    end: usize,
    date: NaiveDate,
}

fn overlaps(a: (usize, usize), b: (usize, usize)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// Rewrites every recognized date occurrence in `text` to `YYYY-MM-DD`.
/// Twelve formats are recognized: ISO (dash/slash/dot), compact YYYYMMDD,
/// US month/day/year (slash, dash, 2-digit year), European day.month.year,
/// and four month-name spellings (full/abbreviated, name-first/day-first).
///
/// Idempotent: once every date is ISO dash form, a second pass makes no
/// further changes (ISO dates aren't covered by the non-ISO patterns above
/// since `ISO` itself is matched first and excluded from rewriting).
pub fn canonicalize_dates(text: &str) -> String {
    let already_iso: Vec<(usize, usize)> = ISO.find_iter(text).map(|m| (m.start(), m.end())).collect();

    let mut candidates: Vec<Accepted> = Vec::new();
    for fmt in formats().iter() {
        for m in fmt.regex.find_iter(text) {
            let span = (m.start(), m.end());
            if already_iso.iter().any(|iso| overlaps(*iso, span)) {
                continue;
            }
            if candidates
                .iter()
                .any(|a| overlaps((a.start, a.end), span))
            {
                continue;
            }
            let caps = fmt.regex.captures(&text[m.start()..m.end()]);
            let Some(caps) = caps else { continue };
            if let Some(date) = (fmt.parse)(&caps) {
                tracing::trace!(format = fmt.name, matched = m.as_str(), resolved = %date, "date normalized");
                candidates.push(Accepted {
                    start: m.start(),
                    end: m.end(),
                    date,
                });
            }
        }
    }

    candidates.sort_by_key(|a| a.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for accepted in &candidates {
        out.push_str(&text[cursor..accepted.start]);
        out.push_str(&accepted.date.format("%Y-%m-%d").to_string());
        cursor = accepted.end;
    }
    out.push_str(&text[cursor..]);
    out
}
