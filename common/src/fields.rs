//! Helpers shared by every request payload: the validation error type,
//! required/optional field handling and the lenient date, time and boolean
//! parsing the forms rely on.

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::{Deserialize, Deserializer, Error as DeError};
use serde_json::Value;
use thiserror::Error;

/// Everything that can be wrong with a request before it reaches the
/// database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("No fields to update")]
    NoFields,

    #[error("Limit reached for role '{role}' (max {limit})")]
    LimitReached { role: String, limit: i64 },

    #[error("Unsupported entity: {0}")]
    UnsupportedEntity(String),

    #[error("items must be a list")]
    ItemsNotList,

    #[error("items must not be empty")]
    NoItems,

    #[error("Invalid item at index {index}: {reason}")]
    InvalidItem { index: usize, reason: String },

    #[error("Unknown report section: {0}")]
    UnknownSection(String),

    #[error("Please select at least one report section")]
    NoSections,
}

impl ValidationError {
    pub fn invalid(field: &'static str, reason: &str) -> Self {
        ValidationError::InvalidValue { field, reason: reason.to_owned() }
    }
}

/// Trims the value and treats blank strings as missing.
pub fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

/// Returns the trimmed value or [`ValidationError::MissingField`] if it is
/// absent or blank.
pub fn required(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    clean(value).ok_or(ValidationError::MissingField(field))
}

/// Cleans a nullable field on an update. `None` means the field wasn't sent,
/// `Some(None)` means it should be cleared.
pub fn clean_nullable(value: Option<Option<String>>) -> Option<Option<String>> {
    value.map(clean)
}

/// Cleans a non-nullable text field on an update, rejecting blank values as
/// they cannot be stored.
pub fn clean_non_null(field: &'static str, value: Option<String>) -> Result<Option<String>, ValidationError> {
    match value {
        None => Ok(None),
        Some(v) => required(field, Some(v)).map(Some),
    }
}

/// Parses a date formatted as `YYYY-MM-DD`.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::invalid(field, "expected a date formatted as YYYY-MM-DD"))
}

/// Parses a timestamp. Accepts a space or `T` separator, with or without
/// seconds, and a bare date which is taken as midnight.
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<NaiveDateTime, ValidationError> {
    const FORMATS: [&str; 4] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];
    let value = value.trim();

    // fractional seconds and offsets are dropped, forms never send them
    let value = value.split(['.', 'Z', '+']).next().unwrap_or(value);

    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().and_then(|d| d.and_hms_opt(0, 0, 0)))
        .ok_or_else(|| ValidationError::invalid(field, "expected a timestamp formatted as YYYY-MM-DD HH:MM:SS"))
}

/// Parses an optional date on create, blank strings count as missing.
pub fn optional_date(field: &'static str, value: Option<String>) -> Result<Option<NaiveDate>, ValidationError> {
    clean(value).map(|v| parse_date(field, &v)).transpose()
}

/// Parses an optional timestamp on create, blank strings count as missing.
pub fn optional_timestamp(field: &'static str, value: Option<String>) -> Result<Option<NaiveDateTime>, ValidationError> {
    clean(value).map(|v| parse_timestamp(field, &v)).transpose()
}

/// Parses a nullable date on update, keeping the sent/cleared distinction.
pub fn nullable_date(
    field: &'static str,
    value: Option<Option<String>>,
) -> Result<Option<Option<NaiveDate>>, ValidationError> {
    clean_nullable(value).map(|v| v.map(|d| parse_date(field, &d)).transpose()).transpose()
}

/// Parses a nullable timestamp on update, keeping the sent/cleared distinction.
pub fn nullable_timestamp(
    field: &'static str,
    value: Option<Option<String>>,
) -> Result<Option<Option<NaiveDateTime>>, ValidationError> {
    clean_nullable(value).map(|v| v.map(|t| parse_timestamp(field, &t)).transpose()).transpose()
}

/// Deserializes any present value, including `null`, as `Some`. Combined with
/// `#[serde(default)]` this tells a missing key (`None`) apart from an
/// explicit `null` (`Some(None)`).
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Accepts the many ways forms spell a boolean: `true`, `1`, `"true"`,
/// `"yes"`, `"Yes"` and their negatives. `null` counts as not sent.
pub fn flex_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            _ => Err(D::Error::custom(format!("expected 0 or 1, got {}", n))),
        },
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Ok(Some(true)),
            "false" | "no" | "n" | "0" => Ok(Some(false)),
            "" => Ok(None),
            other => Err(D::Error::custom(format!("expected a boolean, got {:?}", other))),
        },
        Some(other) => Err(D::Error::custom(format!("expected a boolean, got {}", other))),
    }
}

/// Accepts integers sent either as numbers or numeric strings. `null` and
/// blank strings count as not sent.
pub fn flex_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected an integer, got {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => {
            s.trim().parse::<i32>().map(Some).map_err(|_| D::Error::custom(format!("expected an integer, got {:?}", s)))
        }
        Some(other) => Err(D::Error::custom(format!("expected an integer, got {}", other))),
    }
}

/// Like [`flex_i32`] for nullable columns on update, where `null` or a blank
/// string clears the value.
pub fn nullable_i32<'de, D>(deserializer: D) -> Result<Option<Option<i32>>, D::Error>
where
    D: Deserializer<'de>,
{
    flex_i32(deserializer).map(Some)
}

/// Generates an `is_empty` method which is true when none of the listed
/// optional fields were sent.
#[macro_export]
macro_rules! changes_is_empty {
    ($($field:ident),+) => {
        /// Whether this update would change nothing
        pub fn is_empty(&self) -> bool {
            $(self.$field.is_none())&&+
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Flags {
        #[serde(default, deserialize_with = "flex_bool")]
        flag: Option<bool>,

        #[serde(default, deserialize_with = "deserialize_some")]
        note: Option<Option<String>>,
    }

    fn flags(json: &str) -> Flags {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn required_rejects_blank_values() {
        assert_eq!(required("name", Some("  Alice ".to_owned())), Ok("Alice".to_owned()));
        assert_eq!(required("name", Some("   ".to_owned())), Err(ValidationError::MissingField("name")));
        assert_eq!(required("name", None), Err(ValidationError::MissingField("name")));
    }

    #[test]
    fn timestamps_accept_form_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap().and_hms_opt(14, 0, 0).unwrap();

        assert_eq!(parse_timestamp("time", "2024-03-15 14:00:00"), Ok(expected));
        assert_eq!(parse_timestamp("time", "2024-03-15T14:00"), Ok(expected));
        assert_eq!(parse_timestamp("time", "2024-03-15T14:00:00.000Z"), Ok(expected));
        assert_eq!(
            parse_timestamp("time", "2024-03-15"),
            Ok(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap().and_hms_opt(0, 0, 0).unwrap())
        );
        assert!(parse_timestamp("time", "next tuesday").is_err());
    }

    #[test]
    fn dates_must_be_iso() {
        assert_eq!(parse_date("date_of_birth", "1990-01-15"), Ok(NaiveDate::from_ymd_opt(1990, 1, 15).unwrap()));
        assert!(parse_date("date_of_birth", "15/01/1990").is_err());
        assert_eq!(optional_date("date_of_birth", Some("".to_owned())), Ok(None));
    }

    #[test]
    fn nullable_fields_keep_cleared_values() {
        assert_eq!(nullable_date("d", None), Ok(None));
        assert_eq!(nullable_date("d", Some(None)), Ok(Some(None)));
        assert_eq!(nullable_date("d", Some(Some(" ".to_owned()))), Ok(Some(None)));
        assert_eq!(nullable_date("d", Some(Some("2024-01-02".to_owned()))), Ok(Some(NaiveDate::from_ymd_opt(2024, 1, 2))));
    }

    #[test]
    fn flex_bool_understands_form_values() {
        assert_eq!(flags(r#"{"flag": true}"#).flag, Some(true));
        assert_eq!(flags(r#"{"flag": "Yes"}"#).flag, Some(true));
        assert_eq!(flags(r#"{"flag": "No"}"#).flag, Some(false));
        assert_eq!(flags(r#"{"flag": 0}"#).flag, Some(false));
        assert_eq!(flags(r#"{"flag": null}"#).flag, None);
        assert_eq!(flags(r#"{}"#).flag, None);
        assert!(serde_json::from_str::<Flags>(r#"{"flag": "maybe"}"#).is_err());
    }

    #[derive(Deserialize)]
    struct Numbers {
        #[serde(default, deserialize_with = "flex_i32")]
        count: Option<i32>,

        #[serde(default, deserialize_with = "nullable_i32")]
        parent: Option<Option<i32>>,
    }

    #[test]
    fn integers_may_arrive_as_strings() {
        let numbers: Numbers = serde_json::from_str(r#"{"count": "12", "parent": ""}"#).unwrap();
        assert_eq!(numbers.count, Some(12));
        assert_eq!(numbers.parent, Some(None));

        let numbers: Numbers = serde_json::from_str(r#"{"count": 3}"#).unwrap();
        assert_eq!(numbers.count, Some(3));
        assert_eq!(numbers.parent, None);

        assert!(serde_json::from_str::<Numbers>(r#"{"count": "twelve"}"#).is_err());
        assert!(serde_json::from_str::<Numbers>(r#"{"count": 1.5}"#).is_err());
    }

    #[test]
    fn explicit_null_differs_from_missing() {
        assert_eq!(flags(r#"{}"#).note, None);
        assert_eq!(flags(r#"{"note": null}"#).note, Some(None));
        assert_eq!(flags(r#"{"note": "hi"}"#).note, Some(Some("hi".to_owned())));
    }
}
