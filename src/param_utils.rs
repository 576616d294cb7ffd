use crate::error::BacktestError;
use serde_json::Value;
use std::collections::HashMap;

/// Largest lookback any window parameter may ask for.
pub const MAX_WINDOW: usize = 100_000;

/// Extract a whole-number window parameter with a default value, bounded to `[min, MAX_WINDOW]`
pub fn get_window_param(
    params: &HashMap<String, f64>,
    key: &str,
    default: usize,
    min: usize,
) -> Result<usize, BacktestError> {
    let Some(&raw) = params.get(key) else {
        return Ok(default);
    };
    if !raw.is_finite() || raw.fract() != 0.0 {
        return Err(BacktestError::configuration(format!(
            "Parameter {} must be a whole number (value: {})",
            key, raw
        )));
    }
    if raw < min as f64 {
        return Err(BacktestError::configuration(format!(
            "Parameter {} must be >= {} (value: {})",
            key, min, raw
        )));
    }
    if raw > MAX_WINDOW as f64 {
        return Err(BacktestError::configuration(format!(
            "Parameter {} must be <= {} (value: {})",
            key, MAX_WINDOW, raw
        )));
    }
    Ok(raw as usize)
}

/// Extract a finite f64 parameter with a default value, bounded to `[min, max]`
pub fn get_bounded_param(
    params: &HashMap<String, f64>,
    key: &str,
    default: f64,
    min: f64,
    max: f64,
) -> Result<f64, BacktestError> {
    let Some(&raw) = params.get(key) else {
        return Ok(default);
    };
    if !raw.is_finite() {
        return Err(BacktestError::configuration(format!(
            "Parameter {} must be finite (value: {})",
            key, raw
        )));
    }
    if raw < min || raw > max {
        return Err(BacktestError::configuration(format!(
            "Parameter {} must be between {} and {} (value: {})",
            key, min, max, raw
        )));
    }
    Ok(raw)
}

pub fn reject_unknown_params(
    params: &HashMap<String, f64>,
    allowed: &[&str],
    strategy: &str,
) -> Result<(), BacktestError> {
    let mut unknown: Vec<&str> = params
        .keys()
        .map(String::as_str)
        .filter(|key| !allowed.contains(key))
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    unknown.sort_unstable();
    Err(BacktestError::configuration(format!(
        "Unknown parameter{} for strategy {}: {} (expected one of: {})",
        if unknown.len() == 1 { "" } else { "s" },
        strategy,
        unknown.join(", "),
        allowed.join(", ")
    )))
}

/// Parses a JSON object of numeric parameters. Numeric strings are accepted;
/// anything else is rejected instead of being dropped.
pub fn parse_parameter_map(json: &str) -> Result<HashMap<String, f64>, BacktestError> {
    let raw: HashMap<String, Value> = serde_json::from_str(json).map_err(|error| {
        BacktestError::configuration(format!("Invalid parameter JSON: {}", error))
    })?;

    let mut cleaned = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let number = match &value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        match number {
            Some(number) if number.is_finite() => {
                cleaned.insert(key, number);
            }
            _ => {
                return Err(BacktestError::configuration(format!(
                    "Parameter {} must be numeric (value: {})",
                    key, value
                )));
            }
        }
    }
    Ok(cleaned)
}

/// Parses `key=value` pairs as given on the command line.
pub fn parse_parameter_pairs<S: AsRef<str>>(
    pairs: &[S],
) -> Result<HashMap<String, f64>, BacktestError> {
    let mut parsed = HashMap::with_capacity(pairs.len());
    for pair in pairs {
        let pair = pair.as_ref();
        let Some((key, value)) = pair.split_once('=') else {
            return Err(BacktestError::configuration(format!(
                "Parameter {} must be written as key=value",
                pair
            )));
        };
        let key = key.trim();
        let number = value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .ok_or_else(|| {
                BacktestError::configuration(format!(
                    "Parameter {} must be numeric (value: {})",
                    key,
                    value.trim()
                ))
            })?;
        if key.is_empty() {
            return Err(BacktestError::configuration(format!(
                "Parameter {} has an empty name",
                pair
            )));
        }
        parsed.insert(key.to_string(), number);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn params(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn window_defaults_when_missing() {
        assert_eq!(get_window_param(&HashMap::new(), "period", 14, 2).unwrap(), 14);
    }

    #[test]
    fn window_rejects_fractions_and_small_values() {
        let err = get_window_param(&params(&[("period", 2.5)]), "period", 14, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let err = get_window_param(&params(&[("period", 1.0)]), "period", 14, 2).unwrap_err();
        assert!(err.to_string().contains(">= 2"));
    }

    #[test]
    fn window_rejects_values_past_the_cap() {
        let err = get_window_param(&params(&[("period", 1e20)]), "period", 14, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("<= 100000"));
        let at_cap = params(&[("period", MAX_WINDOW as f64)]);
        assert_eq!(get_window_param(&at_cap, "period", 14, 2).unwrap(), MAX_WINDOW);
    }

    #[test]
    fn bounded_param_checks_range() {
        let p = params(&[("level", 120.0)]);
        assert!(get_bounded_param(&p, "level", 30.0, 0.0, 100.0).is_err());
        let p = params(&[("level", 25.0)]);
        assert_eq!(get_bounded_param(&p, "level", 30.0, 0.0, 100.0).unwrap(), 25.0);
    }

    #[test]
    fn unknown_keys_are_named() {
        let err = reject_unknown_params(&params(&[("shortWindw", 5.0)]), &["shortWindow"], "sma")
            .unwrap_err();
        assert!(err.to_string().contains("shortWindw"));
    }

    #[test]
    fn json_map_accepts_numbers_and_numeric_strings_only() {
        let parsed = parse_parameter_map(r#"{"shortWindow": 5, "longWindow": "20"}"#).unwrap();
        assert_eq!(parsed["shortWindow"], 5.0);
        assert_eq!(parsed["longWindow"], 20.0);

        assert!(parse_parameter_map(r#"{"shortWindow": true}"#).is_err());
        assert!(parse_parameter_map(r#"{"shortWindow": "five"}"#).is_err());
        assert!(parse_parameter_map("[1, 2]").is_err());
    }

    #[test]
    fn cli_pairs_are_parsed() {
        let parsed = parse_parameter_pairs(&["rsiWindow=10", " oversoldThreshold = 25 "]).unwrap();
        assert_eq!(parsed["rsiWindow"], 10.0);
        assert_eq!(parsed["oversoldThreshold"], 25.0);
        assert!(parse_parameter_pairs(&["rsiWindow"]).is_err());
        assert!(parse_parameter_pairs(&["rsiWindow=ten"]).is_err());
    }
}
