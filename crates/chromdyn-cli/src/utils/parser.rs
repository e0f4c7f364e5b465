use chromdyn::analysis::FrameRange;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid --set format: '{0}'. Expected KEY=VALUE.")]
    InvalidKeyValue(String),

    #[error("Invalid value for '{key}': '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Invalid frame range '{0}'. Expected FIRST:LAST:STEP (e.g., '1:100:1').")]
    InvalidFrameRange(String),
}

/// Splits `KEY=VALUE` at the first `=`.
pub fn parse_key_value(pair: &str) -> Result<(&str, &str), ParseError> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(ParseError::InvalidKeyValue(pair.to_string())),
    }
}

pub fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

pub fn parse_bool(key: &str, value: &str) -> Result<bool, ParseError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ParseError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

pub fn parse_frame_range(spec: &str) -> Result<FrameRange, ParseError> {
    spec.parse()
        .map_err(|_| ParseError::InvalidFrameRange(spec.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_splits_at_first_equals() {
        assert_eq!(parse_key_value("name=a=b"), Ok(("name", "a=b")));
        assert_eq!(
            parse_key_value(" run.steps = 100 "),
            Ok(("run.steps", "100"))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=5").is_err());
    }

    #[test]
    fn typed_values_report_their_key() {
        assert_eq!(parse_value::<u64>("run.steps", "250"), Ok(250));
        assert_eq!(
            parse_value::<f64>("integrator.temperature", "hot"),
            Err(ParseError::InvalidValue {
                key: "integrator.temperature".into(),
                value: "hot".into(),
            })
        );
        assert_eq!(parse_bool("reporters.statistics", "off"), Ok(false));
        assert!(parse_bool("reporters.statistics", "maybe").is_err());
    }

    #[test]
    fn frame_ranges_follow_first_last_step() {
        assert_eq!(
            parse_frame_range("2:10:2").unwrap(),
            FrameRange::new(2, Some(10), 2)
        );
        assert_eq!(parse_frame_range("1::1").unwrap(), FrameRange::default());
        assert!(matches!(
            parse_frame_range("x:y"),
            Err(ParseError::InvalidFrameRange(_))
        ));
    }
}
