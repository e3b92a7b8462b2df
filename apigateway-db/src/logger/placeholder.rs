//! Placeholder substitution for logged SQL.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static INDEXED_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\d+)").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderMode {
    /// `?` markers, filled left to right
    Positional,
    /// `$N` markers, filled by number
    Indexed,
}

impl PlaceholderMode {
    pub fn detect(sql: &str) -> Self {
        if INDEXED_PLACEHOLDER.is_match(sql) {
            PlaceholderMode::Indexed
        } else {
            PlaceholderMode::Positional
        }
    }
}

/// Replace placeholders in `sql` with already formatted values.
///
/// Placeholders with no matching value stay in place; surplus values are
/// ignored.
pub fn substitute(sql: &str, values: &[String]) -> String {
    match PlaceholderMode::detect(sql) {
        PlaceholderMode::Indexed => INDEXED_PLACEHOLDER
            .replace_all(sql, |caps: &Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| values.get(i))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned(),
        PlaceholderMode::Positional => {
            let mut out = String::with_capacity(sql.len() + values.iter().map(String::len).sum::<usize>());
            let mut pending = values.iter();
            for (i, part) in sql.split('?').enumerate() {
                if i > 0 {
                    match pending.next() {
                        Some(v) => out.push_str(v),
                        None => out.push('?'),
                    }
                }
                out.push_str(part);
            }
            out
        }
    }
}
