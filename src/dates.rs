//! Published-date resolution for search results.
//!
//! Providers return publish dates as free text: ISO timestamps, localized
//! absolute dates ("28 ene 2025"), or relative phrases ("4 hours ago",
//! "hace 2 días", "vor 3 tagen"). `resolve` turns any of these into a
//! `DateTime<Utc>`, falling back to now when nothing matches. Supported
//! languages: English, Spanish, French, German, Portuguese, Italian.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use tracing::warn;

// ── Relative pattern tables ─────────────────────────────────────────

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;
const MONTH_MS: i64 = 30 * DAY_MS;
const YEAR_MS: i64 = 365 * DAY_MS;

const ENGLISH: &[(&str, i64)] = &[
    (r"(\d+)\s*(?:hour|hr)s?\s*ago", HOUR_MS),
    (r"(\d+)\s*(?:minute|min)s?\s*ago", MINUTE_MS),
    (r"(\d+)\s*(?:day|d)s?\s*ago", DAY_MS),
    (r"(\d+)\s*(?:week|w)s?\s*ago", WEEK_MS),
    (r"(\d+)\s*(?:month|mo)s?\s*ago", MONTH_MS),
    (r"(\d+)\s*(?:year|yr)s?\s*ago", YEAR_MS),
    (r"(\d+)\s*(?:second|sec)s?\s*ago", SECOND_MS),
];

const SPANISH: &[(&str, i64)] = &[
    (r"hace\s*(\d+)\s*(?:hora|hr)s?", HOUR_MS),
    (r"hace\s*(\d+)\s*(?:minuto|min)s?", MINUTE_MS),
    (r"hace\s*(\d+)\s*(?:día|d)s?", DAY_MS),
    (r"hace\s*(\d+)\s*(?:semana|sem)s?", WEEK_MS),
    (r"hace\s*(\d+)\s*mes(?:es)?", MONTH_MS),
    (r"hace\s*(\d+)\s*años?", YEAR_MS),
    // "atrás" word order
    (r"(\d+)\s*(?:hora|hr)s?\s*atrás", HOUR_MS),
    (r"(\d+)\s*(?:minuto|min)s?\s*atrás", MINUTE_MS),
    (r"(\d+)\s*(?:día|d)s?\s*atrás", DAY_MS),
    (r"(\d+)\s*(?:semana|sem)s?\s*atrás", WEEK_MS),
    (r"(\d+)\s*mes(?:es)?\s*atrás", MONTH_MS),
    (r"(\d+)\s*años?\s*atrás", YEAR_MS),
];

const FRENCH: &[(&str, i64)] = &[
    (r"(?:il y a|depuis)\s*(\d+)\s*(?:heure|h)s?", HOUR_MS),
    (r"(?:il y a|depuis)\s*(\d+)\s*(?:minute|min)s?", MINUTE_MS),
    (r"(?:il y a|depuis)\s*(\d+)\s*(?:jour|j)s?", DAY_MS),
    (r"(?:il y a|depuis)\s*(\d+)\s*(?:semaine|sem)s?", WEEK_MS),
    (r"(?:il y a|depuis)\s*(\d+)\s*mois", MONTH_MS),
    (r"(?:il y a|depuis)\s*(\d+)\s*(?:année|an)s?", YEAR_MS),
    // reverse word order
    (r"(\d+)\s*(?:heure|h)s?\s*(?:il y a|depuis)", HOUR_MS),
    (r"(\d+)\s*(?:minute|min)s?\s*(?:il y a|depuis)", MINUTE_MS),
    (r"(\d+)\s*(?:jour|j)s?\s*(?:il y a|depuis)", DAY_MS),
    (r"(\d+)\s*(?:semaine|sem)s?\s*(?:il y a|depuis)", WEEK_MS),
    (r"(\d+)\s*mois\s*(?:il y a|depuis)", MONTH_MS),
    (r"(\d+)\s*(?:année|an)s?\s*(?:il y a|depuis)", YEAR_MS),
];

const GERMAN: &[(&str, i64)] = &[
    (r"(?:vor|her)\s*(\d+)\s*(?:stunde|std)n?", HOUR_MS),
    (r"(?:vor|her)\s*(\d+)\s*(?:minute|min)n?", MINUTE_MS),
    (r"(?:vor|her)\s*(\d+)\s*(?:tag|t)e?n?", DAY_MS),
    (r"(?:vor|her)\s*(\d+)\s*(?:woche|w)n?", WEEK_MS),
    (r"(?:vor|her)\s*(\d+)\s*(?:monat|mon)e?n?", MONTH_MS),
    (r"(?:vor|her)\s*(\d+)\s*(?:jahr|j)e?n?", YEAR_MS),
    // reverse word order
    (r"(\d+)\s*(?:stunde|std)n?\s*(?:vor|her)", HOUR_MS),
    (r"(\d+)\s*(?:minute|min)n?\s*(?:vor|her)", MINUTE_MS),
    (r"(\d+)\s*(?:tag|t)e?n?\s*(?:vor|her)", DAY_MS),
    (r"(\d+)\s*(?:woche|w)n?\s*(?:vor|her)", WEEK_MS),
    (r"(\d+)\s*(?:monat|mon)e?n?\s*(?:vor|her)", MONTH_MS),
    (r"(\d+)\s*(?:jahr|j)e?n?\s*(?:vor|her)", YEAR_MS),
];

const PORTUGUESE: &[(&str, i64)] = &[
    (r"(?:há|atrás)\s*(\d+)\s*(?:hora|hr)s?", HOUR_MS),
    (r"(?:há|atrás)\s*(\d+)\s*(?:minuto|min)s?", MINUTE_MS),
    (r"(?:há|atrás)\s*(\d+)\s*(?:dia|d)s?", DAY_MS),
    (r"(?:há|atrás)\s*(\d+)\s*(?:semana|sem)s?", WEEK_MS),
    (r"(?:há|atrás)\s*(\d+)\s*(?:mês|mes)(?:es)?", MONTH_MS),
    (r"(?:há|atrás)\s*(\d+)\s*anos?", YEAR_MS),
    // reverse word order
    (r"(\d+)\s*(?:hora|hr)s?\s*(?:atrás|há)", HOUR_MS),
    (r"(\d+)\s*(?:minuto|min)s?\s*(?:atrás|há)", MINUTE_MS),
    (r"(\d+)\s*(?:dia|d)s?\s*(?:atrás|há)", DAY_MS),
    (r"(\d+)\s*(?:semana|sem)s?\s*(?:atrás|há)", WEEK_MS),
    (r"(\d+)\s*(?:mês|mes)(?:es)?\s*(?:atrás|há)", MONTH_MS),
    (r"(\d+)\s*anos?\s*(?:atrás|há)", YEAR_MS),
];

const ITALIAN: &[(&str, i64)] = &[
    (r"(?:fa|indietro)\s*(\d+)\s*or[ae]", HOUR_MS),
    (r"(?:fa|indietro)\s*(\d+)\s*minut[oi]", MINUTE_MS),
    (r"(?:fa|indietro)\s*(\d+)\s*giorn[oi]", DAY_MS),
    (r"(?:fa|indietro)\s*(\d+)\s*settiman[ae]", WEEK_MS),
    (r"(?:fa|indietro)\s*(\d+)\s*mes[ei]", MONTH_MS),
    (r"(?:fa|indietro)\s*(\d+)\s*ann[oi]", YEAR_MS),
    // reverse word order
    (r"(\d+)\s*or[ae]\s*(?:fa|indietro)", HOUR_MS),
    (r"(\d+)\s*minut[oi]\s*(?:fa|indietro)", MINUTE_MS),
    (r"(\d+)\s*giorn[oi]\s*(?:fa|indietro)", DAY_MS),
    (r"(\d+)\s*settiman[ae]\s*(?:fa|indietro)", WEEK_MS),
    (r"(\d+)\s*mes[ei]\s*(?:fa|indietro)", MONTH_MS),
    (r"(\d+)\s*ann[oi]\s*(?:fa|indietro)", YEAR_MS),
];

/// All relative patterns, scanned in order; first match wins. Input is
/// lowercased before scanning, so patterns are written in lowercase.
static RELATIVE_PATTERNS: LazyLock<Vec<(Regex, i64)>> = LazyLock::new(|| {
    [ENGLISH, SPANISH, FRENCH, GERMAN, PORTUGUESE, ITALIAN]
        .concat()
        .into_iter()
        .map(|(pattern, multiplier)| {
            (
                Regex::new(pattern).expect("relative date pattern"),
                multiplier,
            )
        })
        .collect()
});

/// Markers that signal a relative phrase in any supported language.
const RELATIVE_MARKERS: &[&str] = &[
    "ago", "atrás", "hace", "il y a", "depuis", "vor", "her", "há", "fa", "indietro",
];

// ── Month abbreviation tables ───────────────────────────────────────

const EN_MONTHS: &[(&str, u32)] = &[
    ("jan", 1), ("feb", 2), ("mar", 3), ("apr", 4), ("may", 5), ("jun", 6),
    ("jul", 7), ("aug", 8), ("sep", 9), ("oct", 10), ("nov", 11), ("dec", 12),
];
const ES_MONTHS: &[(&str, u32)] = &[
    ("ene", 1), ("feb", 2), ("mar", 3), ("abr", 4), ("may", 5), ("jun", 6),
    ("jul", 7), ("ago", 8), ("sep", 9), ("oct", 10), ("nov", 11), ("dic", 12),
];
const FR_MONTHS: &[(&str, u32)] = &[
    ("jan", 1), ("fév", 2), ("mar", 3), ("avr", 4), ("mai", 5), ("juin", 6),
    ("juil", 7), ("août", 8), ("sept", 9), ("oct", 10), ("nov", 11), ("déc", 12),
];
const DE_MONTHS: &[(&str, u32)] = &[
    ("jan", 1), ("feb", 2), ("mär", 3), ("apr", 4), ("mai", 5), ("jun", 6),
    ("jul", 7), ("aug", 8), ("sep", 9), ("okt", 10), ("nov", 11), ("dez", 12),
];
const PT_MONTHS: &[(&str, u32)] = &[
    ("jan", 1), ("fev", 2), ("mar", 3), ("abr", 4), ("mai", 5), ("jun", 6),
    ("jul", 7), ("ago", 8), ("set", 9), ("out", 10), ("nov", 11), ("dez", 12),
];
const IT_MONTHS: &[(&str, u32)] = &[
    ("gen", 1), ("feb", 2), ("mar", 3), ("apr", 4), ("mag", 5), ("giu", 6),
    ("lug", 7), ("ago", 8), ("set", 9), ("ott", 10), ("nov", 11), ("dic", 12),
];

/// Language lookup order for month tokens; first table containing the
/// token wins.
const MONTH_TABLES: &[&[(&str, u32)]] = &[
    EN_MONTHS, ES_MONTHS, FR_MONTHS, DE_MONTHS, PT_MONTHS, IT_MONTHS,
];

/// `<day> <month token> <year>` in any supported language.
static DAY_MONTH_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+(\w{3,})\s+(\d{4})").expect("day-month-year pattern"));

// ── Resolution ──────────────────────────────────────────────────────

/// Resolve a free-text publish date to a UTC timestamp.
///
/// Never fails: when nothing matches, returns now and logs a warning.
pub fn resolve(text: &str) -> DateTime<Utc> {
    if text.trim().is_empty() {
        return Utc::now();
    }
    match parse_published(text) {
        Some(ts) => ts,
        None => {
            warn!(date_text = %text, "Could not resolve publish date, using now");
            Utc::now()
        }
    }
}

/// Fallible inner parse: absolute formats first, then relative phrases.
pub fn parse_published(text: &str) -> Option<DateTime<Utc>> {
    parse_absolute(text).or_else(|| parse_relative(text))
}

/// True when the text contains a relative-time marker in any language.
pub fn looks_relative(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    RELATIVE_MARKERS.iter().any(|m| lowered.contains(m))
}

fn parse_absolute(text: &str) -> Option<DateTime<Utc>> {
    // ISO-8601 / RFC 3339 style
    if text.contains('T') || text.contains('Z') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text.trim()) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(text.trim(), "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(ndt.and_utc());
        }
    }

    // Localized "<day> <month abbrev> <year>"
    if let Some(caps) = DAY_MONTH_YEAR.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month_token = caps[2].to_lowercase();
        let year: i32 = caps[3].parse().ok()?;

        let month = MONTH_TABLES.iter().find_map(|table| {
            table
                .iter()
                .find(|(token, _)| *token == month_token)
                .map(|(_, m)| *m)
        });

        if let Some(month) = month {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
            }
        }
    }

    // Generic absolute formats
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d", "%b %d, %Y", "%B %d, %Y", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }

    None
}

fn parse_relative(text: &str) -> Option<DateTime<Utc>> {
    let lowered = text.trim().to_lowercase();

    for (pattern, multiplier) in RELATIVE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&lowered) {
            let value: i64 = caps[1].parse().ok()?;
            let ago = Duration::milliseconds(value * multiplier);
            return Some(Utc::now() - ago);
        }
    }

    None
}

// ── Elapsed time ────────────────────────────────────────────────────

/// Total elapsed time split into truncated buckets. Each field counts
/// whole units of the full span (90 minutes → hours 1, minutes 90), not
/// a remainder breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

/// Elapsed buckets between two instants.
pub fn elapsed_between(now: DateTime<Utc>, earlier: DateTime<Utc>) -> Elapsed {
    let seconds = now.signed_duration_since(earlier).num_seconds();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;
    Elapsed {
        days,
        hours,
        minutes,
        seconds,
    }
}

/// Elapsed buckets from now.
pub fn elapsed_since(ts: DateTime<Utc>) -> Elapsed {
    elapsed_between(Utc::now(), ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Seconds between now-minus-`text` and the parsed result.
    fn seconds_ago(text: &str) -> i64 {
        let parsed = resolve(text);
        Utc::now().signed_duration_since(parsed).num_seconds()
    }

    fn assert_ago(text: &str, expected_secs: i64) {
        let diff = seconds_ago(text);
        assert!(
            (diff - expected_secs).abs() <= 2,
            "'{text}' resolved {diff}s ago, expected ~{expected_secs}s"
        );
    }

    // ── Relative phrases ────────────────────────────────────────────

    #[test]
    fn english_hours_ago() {
        assert_ago("4 hours ago", 4 * 3600);
        assert_ago("1 hour ago", 3600);
        assert_ago("2 hrs ago", 2 * 3600);
    }

    #[test]
    fn english_other_units() {
        assert_ago("30 minutes ago", 30 * 60);
        assert_ago("5 min ago", 5 * 60);
        assert_ago("2 days ago", 2 * 86_400);
        assert_ago("3 weeks ago", 3 * 7 * 86_400);
        assert_ago("2 months ago", 2 * 30 * 86_400);
        assert_ago("1 year ago", 365 * 86_400);
        assert_ago("45 seconds ago", 45);
    }

    #[test]
    fn spanish_hace_and_atras() {
        assert_ago("hace 2 días", 2 * 86_400);
        assert_ago("hace 3 horas", 3 * 3600);
        assert_ago("5 horas atrás", 5 * 3600);
    }

    #[test]
    fn french_il_y_a() {
        assert_ago("il y a 3 jours", 3 * 86_400);
        assert_ago("depuis 2 heures", 2 * 3600);
    }

    #[test]
    fn german_vor() {
        assert_ago("vor 2 stunden", 2 * 3600);
        assert_ago("vor 5 tagen", 5 * 86_400);
    }

    #[test]
    fn portuguese_ha() {
        assert_ago("há 2 horas", 2 * 3600);
        assert_ago("3 dias atrás", 3 * 86_400);
    }

    #[test]
    fn italian_fa() {
        assert_ago("2 ore fa", 2 * 3600);
        assert_ago("4 giorni fa", 4 * 86_400);
    }

    // ── Absolute formats ────────────────────────────────────────────

    #[test]
    fn iso_with_timezone() {
        let parsed = resolve("2024-01-15T10:30:00Z");
        assert_eq!(parsed.to_rfc3339(), "2024-01-15T10:30:00+00:00");
    }

    #[test]
    fn iso_naive_assumed_utc() {
        let parsed = resolve("2024-01-15T10:30:00");
        assert_eq!(parsed.to_rfc3339(), "2024-01-15T10:30:00+00:00");
    }

    #[test]
    fn localized_day_month_year() {
        let spanish = resolve("28 ene 2025");
        assert_eq!(spanish.date_naive(), NaiveDate::from_ymd_opt(2025, 1, 28).unwrap());

        let english = resolve("15 mar 2024");
        assert_eq!(english.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());

        let french = resolve("3 août 2024");
        assert_eq!(french.date_naive(), NaiveDate::from_ymd_opt(2024, 8, 3).unwrap());

        let german = resolve("11 dez 2024");
        assert_eq!(german.date_naive(), NaiveDate::from_ymd_opt(2024, 12, 11).unwrap());

        let italian = resolve("7 lug 2025");
        assert_eq!(italian.date_naive(), NaiveDate::from_ymd_opt(2025, 7, 7).unwrap());
    }

    #[test]
    fn generic_absolute_formats() {
        let rfc2822 = resolve("Wed, 15 Jan 2025 10:00:00 +0000");
        assert_eq!(rfc2822.to_rfc3339(), "2025-01-15T10:00:00+00:00");

        let ymd = resolve("2024-06-30");
        assert_eq!(ymd.date_naive(), NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());

        let month_day = resolve("Jan 5, 2025");
        assert_eq!(month_day.date_naive(), NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
    }

    #[test]
    fn invalid_day_is_rejected() {
        // No 31st of February in any language table.
        assert!(parse_published("31 feb 2024").is_none());
    }

    // ── Fallback behavior ───────────────────────────────────────────

    #[test]
    fn unparseable_falls_back_to_now() {
        assert!(parse_published("complete nonsense").is_none());
        let diff = seconds_ago("complete nonsense");
        assert!(diff.abs() <= 2);
    }

    #[test]
    fn empty_input_is_now() {
        let diff = seconds_ago("");
        assert!(diff.abs() <= 2);
    }

    // ── Markers ─────────────────────────────────────────────────────

    #[test]
    fn relative_marker_detection() {
        assert!(looks_relative("4 hours ago"));
        assert!(looks_relative("hace 2 días"));
        assert!(looks_relative("Il y a 3 jours"));
        assert!(looks_relative("vor 2 Stunden"));
        assert!(looks_relative("2 ore fa"));
        assert!(!looks_relative("2024-01-15T10:00:00Z"));
        assert!(!looks_relative("28 ene 2025"));
    }

    // ── Elapsed buckets ─────────────────────────────────────────────

    #[test]
    fn elapsed_buckets_are_totals() {
        let now = Utc::now();
        let elapsed = elapsed_between(now, now - Duration::minutes(90));
        assert_eq!(elapsed.hours, 1);
        assert_eq!(elapsed.minutes, 90);
        assert_eq!(elapsed.seconds, 5400);

        let elapsed = elapsed_between(now, now - Duration::hours(25));
        assert_eq!(elapsed.days, 1);
        assert_eq!(elapsed.hours, 25);
    }

    #[test]
    fn elapsed_exact_threshold() {
        let now = Utc::now();
        let elapsed = elapsed_between(now, now - Duration::hours(24));
        assert_eq!(elapsed.hours, 24);
        assert_eq!(elapsed.days, 1);
    }
}
