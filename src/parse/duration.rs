//! ISO-8601 durations (`P2DT3H`) to interval phrases (`2 days 3 hours`).

use crate::model::value::format_number;

const UNITS: [(&str, &str); 7] = [
    ("year", "years"),
    ("month", "months"),
    ("week", "weeks"),
    ("day", "days"),
    ("hour", "hours"),
    ("minute", "minutes"),
    ("second", "seconds"),
];

/// Normalize a duration that is present in the source.
///
/// Empty or all-zero gives `"0 seconds"`; text that is not an ISO-8601
/// duration comes back trimmed but otherwise unchanged.
pub fn normalize_duration(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "0 seconds".to_string();
    }
    match parse_iso_duration(trimmed) {
        Some(parts) => render(&parts),
        None => trimmed.to_string(),
    }
}

/// Components in `UNITS` order, or `None` if `s` is not `PnYnMnWnDTnHnMnS`.
fn parse_iso_duration(s: &str) -> Option<[f64; 7]> {
    let rest = s.strip_prefix('P').or_else(|| s.strip_prefix('p'))?;
    let mut parts = [0.0; 7];
    let mut in_time = false;
    let mut number = String::new();
    let mut found = false;

    for c in rest.chars() {
        match c.to_ascii_uppercase() {
            '0'..='9' | '.' | ',' => number.push(if c == ',' { '.' } else { c }),
            'T' => {
                if in_time || !number.is_empty() {
                    return None;
                }
                in_time = true;
            }
            designator => {
                let slot = match (designator, in_time) {
                    ('Y', false) => 0,
                    ('M', false) => 1,
                    ('W', false) => 2,
                    ('D', false) => 3,
                    ('H', true) => 4,
                    ('M', true) => 5,
                    ('S', true) => 6,
                    _ => return None,
                };
                let value: f64 = number.parse().ok()?;
                parts[slot] = value;
                number.clear();
                found = true;
            }
        }
    }

    if !number.is_empty() || !found {
        return None;
    }
    Some(parts)
}

fn render(parts: &[f64; 7]) -> String {
    let phrase: Vec<String> = parts
        .iter()
        .zip(UNITS.iter())
        .filter(|(value, _)| **value != 0.0)
        .map(|(value, (one, many))| {
            let unit = if *value == 1.0 { one } else { many };
            format!("{} {}", format_number(*value), unit)
        })
        .collect();
    if phrase.is_empty() {
        "0 seconds".to_string()
    } else {
        phrase.join(" ")
    }
}
