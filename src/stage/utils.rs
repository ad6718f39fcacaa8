use std::collections::BTreeMap;

/// 1) Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Cleaned value, or `None` when nothing is left.
pub fn non_empty(raw: &str) -> Option<String> {
    let c = clean_str(raw);
    if c.is_empty() {
        None
    } else {
        Some(c)
    }
}

/// Trim + uppercase; empty becomes `None`.
pub fn norm_text(raw: &str) -> Option<String> {
    non_empty(raw).map(|s| s.to_uppercase())
}

/// Uppercase, trim, then collapse aliases (e.g. Richmond → STATEN ISLAND).
/// Idempotent as long as every canonical label maps to itself or is not
/// an alias key.
pub fn norm_borough(raw: &str, aliases: &BTreeMap<String, String>) -> Option<String> {
    let text = norm_text(raw)?;
    Some(aliases.get(&text).cloned().unwrap_or(text))
}

/// Lenient float parse; non-finite values count as missing.
pub fn parse_f64(raw: &str) -> Option<f64> {
    let c = clean_str(raw);
    c.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integer coercion that accepts `"10001"` as well as `"10001.0"`.
pub fn parse_int(raw: &str) -> Option<i64> {
    let c = clean_str(raw);
    if let Ok(v) = c.parse::<i64>() {
        return Some(v);
    }
    float_to_int(c.parse::<f64>().ok()?)
}

pub fn float_to_int(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 {
        Some(v as i64)
    } else {
        None
    }
}

/// Duration in seconds; negatives and values at or above `sentinel` are
/// collection artifacts and become `None`.
pub fn clean_seconds(raw: &str, sentinel: f64) -> Option<f64> {
    parse_f64(raw).filter(|v| *v >= 0.0 && *v < sentinel)
}

/// `TRUE`/`Y`/`1` → 1, `FALSE`/`N`/`0` → 0, anything else → `None`.
pub fn parse_flag(raw: &str) -> Option<i8> {
    match norm_text(raw)?.as_str() {
        "TRUE" | "Y" | "YES" | "1" => Some(1),
        "FALSE" | "N" | "NO" | "0" => Some(0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StagingConfig;

    fn aliases() -> BTreeMap<String, String> {
        StagingConfig::default().borough_aliases
    }

    #[test]
    fn staten_island_aliases_collapse() {
        let a = aliases();
        for raw in [
            "RICHMOND",
            "  richmond ",
            "Richmond / Staten Island",
            "RICHMOND / STATEN ISLAND",
            "staten island",
            "\"Staten Island\"",
        ] {
            assert_eq!(norm_borough(raw, &a).as_deref(), Some("STATEN ISLAND"), "{raw}");
        }
        assert_eq!(norm_borough(" Brooklyn", &a).as_deref(), Some("BROOKLYN"));
        assert_eq!(norm_borough("   ", &a), None);
    }

    #[test]
    fn borough_normalisation_is_idempotent() {
        let a = aliases();
        for raw in ["Richmond", "queens ", "BRONX", "Manhattan", "RICHMOND / STATEN ISLAND"] {
            let once = norm_borough(raw, &a).unwrap();
            let twice = norm_borough(&once, &a).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn seconds_sentinels_become_missing() {
        assert_eq!(clean_seconds("-5", 999.0), None);
        assert_eq!(clean_seconds("999", 999.0), None);
        assert_eq!(clean_seconds("1500", 999.0), None);
        assert_eq!(clean_seconds("450", 999.0), Some(450.0));
        assert_eq!(clean_seconds("0", 999.0), Some(0.0));
        assert_eq!(clean_seconds("abc", 999.0), None);
        assert_eq!(clean_seconds("NaN", 999.0), None);
    }

    #[test]
    fn integers_accept_float_text() {
        assert_eq!(parse_int("10001"), Some(10001));
        assert_eq!(parse_int(" 10001.0 "), Some(10001));
        assert_eq!(parse_int("10001.5"), None);
        assert_eq!(parse_int("N/A"), None);
        assert_eq!(parse_int(""), None);
    }

    #[test]
    fn flags() {
        assert_eq!(parse_flag("Y"), Some(1));
        assert_eq!(parse_flag(" true"), Some(1));
        assert_eq!(parse_flag("N"), Some(0));
        assert_eq!(parse_flag("False"), Some(0));
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_flag(""), None);
    }
}
