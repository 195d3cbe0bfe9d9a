//! Parsing of the `key = value` initialisation text handed to the bundled
//! backends.

use std::collections::HashMap;

use catchflow_core::errors::{CoupleError, CoupleResult};

/// Parse lines of `key = value` pairs. Blank lines and `#` comments are
/// ignored; anything else malformed is a configuration error.
pub(crate) fn parse_pairs(text: &str) -> CoupleResult<HashMap<String, f64>> {
    let mut pairs = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            CoupleError::Config(format!("malformed init line '{line}', expected 'key = value'"))
        })?;
        let value: f64 = value.trim().parse().map_err(|_| {
            CoupleError::Config(format!("init key '{}' has non-numeric value", key.trim()))
        })?;
        pairs.insert(key.trim().to_string(), value);
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_with_comments() {
        let pairs = parse_pairs("# reservoir\nk = 0.25\n\nstorage = 1.5\n").unwrap();
        assert_eq!(pairs["k"], 0.25);
        assert_eq!(pairs["storage"], 1.5);
    }

    #[test]
    fn malformed_lines_error() {
        assert!(parse_pairs("k 0.25").is_err());
        assert!(parse_pairs("k = fast").is_err());
    }
}
