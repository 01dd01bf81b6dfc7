//! Formatting helpers for bundle sizes and digests

const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

/// Human-readable size in binary units, as image tools report them.
///
/// Image archives routinely pass a gigabyte, so one decimal is enough.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for &next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.1} {}", value, unit)
}

/// Leading `len` characters of a digest, without any `algo:` prefix
#[must_use]
pub fn short_digest(digest: &str, len: usize) -> &str {
    let hex = digest.split_once(':').map_or(digest, |(_, hex)| hex);
    match hex.char_indices().nth(len) {
        Some((end, _)) => &hex[..end],
        None => hex,
    }
}
