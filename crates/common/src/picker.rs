//! Uniform random selection over a listing snapshot

use rand::Rng;

/// Pick one name from `listing`, or `fallback` when there is nothing to pick.
///
/// Callers pass a single snapshot; the length and the index are read from the
/// same immutable slice so the index is always in range.
pub fn pick(listing: Option<&[String]>, fallback: &str) -> String {
    match listing {
        Some(names) if !names.is_empty() => {
            let idx = rand::rng().random_range(0..names.len());
            names[idx].clone()
        }
        _ => fallback.to_string(),
    }
}

/// Parse the first run of ASCII digits in `filename`, or 0 if there is none.
///
/// `"Gary76.jpg"` gives 76, `"v2beta3.jpg"` gives 2. Runs that do not fit in
/// a `u64` saturate.
pub fn extract_leading_number(filename: &str) -> u64 {
    filename
        .bytes()
        .skip_while(|b| !b.is_ascii_digit())
        .take_while(|b| b.is_ascii_digit())
        .fold(0u64, |acc, b| {
            acc.saturating_mul(10).saturating_add(u64::from(b - b'0'))
        })
}
