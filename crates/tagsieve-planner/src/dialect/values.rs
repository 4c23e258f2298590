//! Parsers for the typed values search fields accept.
//!
//! Each returns a plain reason string on failure; the caller attaches the
//! field, operator and value.

use std::time::Duration;

const SIZE_UNITS: [(&str, u64); 5] = [
    ("tb", 1 << 40),
    ("gb", 1 << 30),
    ("mb", 1 << 20),
    ("kb", 1 << 10),
    ("b", 1),
];

/// `1024`, `10KB`, `1.5 gb`; units are powers of 1024.
pub fn parse_size(value: &str) -> Result<u64, String> {
    let lower = value.trim().to_ascii_lowercase();
    let (number, unit) = SIZE_UNITS
        .iter()
        .find_map(|(suffix, mult)| lower.strip_suffix(suffix).map(|n| (n.trim(), *mult)))
        .unwrap_or((lower.as_str(), 1));

    if let Ok(n) = number.parse::<u64>() {
        return n.checked_mul(unit).ok_or_else(|| "size overflows 64 bits".to_string());
    }
    let n: f64 = number.parse().map_err(|_| format!("`{value}` is not a size"))?;
    if !n.is_finite() || n < 0.0 {
        return Err("size must be a non-negative number".into());
    }
    let bytes = (n * unit as f64).round();
    if bytes > u64::MAX as f64 {
        return Err("size overflows 64 bits".into());
    }
    Ok(bytes as u64)
}

/// Seconds as a float. Accepts `90`, `1.5`, `[[hh:]mm:]ss[.fff]` and
/// humantime literals such as `1m30s`.
pub fn parse_duration(value: &str) -> Result<f64, String> {
    let v = value.trim();
    if let Ok(secs) = v.parse::<f64>() {
        if secs.is_finite() && secs >= 0.0 {
            return Ok(secs);
        }
        return Err("duration must be a non-negative number of seconds".into());
    }
    if v.contains(':') {
        return parse_timespan(v);
    }
    humantime::parse_duration(v)
        .map(|d: Duration| d.as_secs_f64())
        .map_err(|e| format!("`{value}` is not a duration: {e}"))
}

fn parse_timespan(v: &str) -> Result<f64, String> {
    let parts: Vec<&str> = v.split(':').collect();
    if parts.len() > 3 {
        return Err(format!("`{v}` has too many `:` separated parts"));
    }
    let (last, leading) = parts.split_last().ok_or_else(|| "empty timespan".to_string())?;

    let seconds: f64 = last
        .parse()
        .map_err(|_| format!("`{last}` is not a number of seconds"))?;
    if !(0.0..60.0).contains(&seconds) {
        return Err(format!("seconds `{last}` out of range"));
    }

    let mut total = 0u64;
    for (i, part) in leading.iter().enumerate() {
        let n: u64 = part
            .parse()
            .map_err(|_| format!("`{part}` is not a whole number"))?;
        // every part after the first is bounded by its unit
        if i > 0 && n >= 60 {
            return Err(format!("minutes `{part}` out of range"));
        }
        total = total
            .checked_mul(60)
            .and_then(|t| t.checked_add(n))
            .ok_or_else(|| format!("`{v}` overflows the duration range"))?;
    }
    Ok(total as f64 * 60.0 + seconds)
}

/// Lowercase hex content hash.
pub fn parse_hash(value: &str) -> Result<String, String> {
    let v = value.trim();
    if v.is_empty() {
        return Err("hash is empty".into());
    }
    if !v.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("hash must be hexadecimal".into());
    }
    Ok(v.to_ascii_lowercase())
}

/// A portion in `0..=max`, scaled into `0..=1`.
pub fn parse_portion(value: &str, max: f64) -> Result<f64, String> {
    let v: f64 = value
        .trim()
        .trim_end_matches('%')
        .parse()
        .map_err(|_| format!("`{value}` is not a number"))?;
    if !(0.0..=max).contains(&v) {
        return Err(format!("must be between 0 and {max}"));
    }
    Ok(v / max)
}
