//! Variable name handling.
//!
//! BUFR keys are camelCase (`airTemperature`, `24HourPrecipitation`). The
//! normalised snake_case form is what the CF vocabulary is queried with and
//! what long names are built from.

use crate::constants::TIME_UNIT_WORDS;

/// Split `name.N` into `name` and `N` when `N` is a dedup counter
pub fn split_dedup_suffix(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((base, suffix))
            if !base.is_empty()
                && !suffix.is_empty()
                && suffix.chars().all(|c| c.is_ascii_digit()) =>
        {
            (base, Some(suffix))
        }
        _ => (name, None),
    }
}

/// `airTemperature` -> `air_temperature`, `totalPrecipitationPast24Hours` ->
/// `total_precipitation_past_24_hours`
pub fn normalize(name: &str) -> String {
    let mut camel = String::with_capacity(name.len() + 8);
    for (i, c) in name.chars().enumerate() {
        if i > 0 && c.is_uppercase() {
            camel.push('_');
        }
        camel.push(c);
    }

    let chars: Vec<char> = camel.chars().collect();
    let mut split = String::with_capacity(chars.len() + 4);
    for (i, c) in chars.iter().enumerate() {
        let two_digits = c.is_ascii_digit() && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        if i > 0 && two_digits {
            split.push('_');
        }
        split.push(*c);
    }

    split.to_lowercase()
}

/// Normalised name with spaces, used as the default long name
pub fn humanize(normalized: &str) -> String {
    normalized.replace('_', " ")
}

fn camel_tokens(name: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for c in name.chars() {
        if c.is_uppercase() || tokens.is_empty() {
            tokens.push(String::new());
        }
        if let Some(last) = tokens.last_mut() {
            last.push(c);
        }
    }
    tokens
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Turn a column name into a valid variable name.
///
/// The dedup dot is dropped (`a.1` -> `a1`). Names starting with a digit and
/// a time unit are rotated so the quantity comes first
/// (`1HourPrecipitation` -> `precipitation1Hours`).
pub fn rename(name: &str) -> String {
    let (base, suffix) = split_dedup_suffix(name);
    let normalized = normalize(base);

    let starts_with_digit = normalized.chars().next().is_some_and(|c| c.is_ascii_digit());
    let unit_follows = normalized
        .split('_')
        .nth(1)
        .is_some_and(|token| TIME_UNIT_WORDS.contains(&token));

    let mut renamed = if starts_with_digit && unit_follows {
        let tokens = camel_tokens(base);
        if tokens.len() > 2 {
            let rotated: String = tokens[2..]
                .iter()
                .chain(tokens[..2].iter())
                .map(String::as_str)
                .chain(std::iter::once("s"))
                .collect();
            lower_first(&rotated)
        } else {
            base.to_string()
        }
    } else {
        base.to_string()
    };

    if let Some(suffix) = suffix {
        renamed.push_str(suffix);
    }
    renamed
}
