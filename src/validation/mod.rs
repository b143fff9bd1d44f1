//! Request input validation
//!
//! Validates request input (query string or JSON body, both represented as a
//! JSON object) and collects field-level messages. Every check records its
//! failure and returns a placeholder value; callers run all checks, then call
//! [`Validator::finish`] before using the values.
//!
//! ```
//! use s3_upload_signer::validation::Validator;
//! use serde_json::json;
//!
//! let input = json!({"filename": "a.png"});
//! let input = input.as_object().unwrap();
//!
//! let mut validator = Validator::new(input);
//! let _filename = validator.required_string("filename");
//! let _content_type = validator.required_string("type");
//! let errors = validator.finish().unwrap_err();
//! assert_eq!(errors.messages("type"), ["The type field is required."]);
//! ```

use crate::s3::{CompletedPart, Metadata};
use hyper::header::HeaderName;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::OnceLock;

/// Smallest and largest part numbers S3 accepts
pub const MIN_PART_NUMBER: i32 = 1;
pub const MAX_PART_NUMBER: i32 = 10_000;

/// Comma separated part numbers, each in 1..=10000 without leading zeros
pub const PART_NUMBERS_PATTERN: &str =
    r"^(10000|[1-9][0-9]{0,3})(,(10000|[1-9][0-9]{0,3}))*$";

fn part_numbers_regex() -> &'static regex_lite::Regex {
    static RE: OnceLock<regex_lite::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex_lite::Regex::new(PART_NUMBERS_PATTERN).expect("part numbers pattern is valid")
    })
}

/// Field-level validation failures, in the order fields were checked
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationErrors {
    errors: Map<String, Value>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    /// Record a message for a field
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        let entry = self
            .errors
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(messages) = entry {
            messages.push(Value::String(message.into()));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Messages recorded for one field
    pub fn messages(&self, field: &str) -> Vec<&str> {
        match self.errors.get(field) {
            Some(Value::Array(messages)) => messages.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Names of all failing fields
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// First message plus a count of the rest
    pub fn summary(&self) -> String {
        let mut messages = self
            .errors
            .values()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Value::as_str);

        let Some(first) = messages.next() else {
            return "The given data was invalid.".to_string();
        };

        match messages.count() {
            0 => first.to_string(),
            1 => format!("{} (and 1 more error)", first),
            n => format!("{} (and {} more errors)", first, n),
        }
    }

    /// JSON error bag: `{field: [messages]}`
    pub fn to_json(&self) -> Value {
        Value::Object(self.errors.clone())
    }
}

/// Human readable attribute name: `partNumbers` -> `part numbers`
fn attribute_name(field: &str) -> String {
    let mut name = String::with_capacity(field.len() + 4);
    for ch in field.chars() {
        if ch.is_ascii_uppercase() {
            name.push(' ');
            name.push(ch.to_ascii_lowercase());
        } else if ch == '_' {
            name.push(' ');
        } else {
            name.push(ch);
        }
    }
    name
}

/// `required` fails on missing values, `null` and empty strings
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

/// Integer rule: JSON integers or strings holding one
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accumulating validator over one input object
pub struct Validator<'a> {
    input: &'a Map<String, Value>,
    errors: ValidationErrors,
}

impl<'a> Validator<'a> {
    pub fn new(input: &'a Map<String, Value>) -> Self {
        Self {
            input,
            errors: ValidationErrors::default(),
        }
    }

    /// Required, string-typed field
    pub fn required_string(&mut self, field: &str) -> String {
        let value = self.input.get(field);
        if !is_present(value) {
            self.errors.add(
                field,
                format!("The {} field is required.", attribute_name(field)),
            );
            return String::new();
        }

        match value {
            Some(Value::String(s)) => s.clone(),
            _ => {
                self.errors.add(
                    field,
                    format!("The {} field must be a string.", attribute_name(field)),
                );
                String::new()
            }
        }
    }

    /// Metadata map: every value must be a string
    ///
    /// Missing or `null` metadata is an empty map. Keys become `x-amz-meta-*`
    /// header names and must be valid header tokens; non-ASCII values are
    /// encoded later when the provider request is built.
    pub fn metadata(&mut self, field: &str) -> Metadata {
        let Some(value) = self.input.get(field) else {
            return Metadata::new();
        };

        match validate_metadata(value) {
            Some(metadata) => {
                let invalid: Vec<String> = metadata
                    .keys()
                    .filter(|key| !is_header_token(key))
                    .cloned()
                    .collect();
                if invalid.is_empty() {
                    return metadata;
                }
                for key in invalid {
                    self.errors.add(
                        field,
                        format!(
                            "The {} key \"{}\" is not a valid header name.",
                            attribute_name(field),
                            key
                        ),
                    );
                }
                Metadata::new()
            }
            None => {
                self.errors.add(
                    field,
                    format!("The {} cannot be accepted as metadata.", attribute_name(field)),
                );
                Metadata::new()
            }
        }
    }

    /// Required comma separated part numbers, order kept
    pub fn part_numbers(&mut self, field: &str) -> Vec<i32> {
        let raw = self.required_string(field);
        if raw.is_empty() {
            return Vec::new();
        }

        match parse_part_numbers(&raw) {
            Some(numbers) => numbers,
            None => {
                self.errors.add(
                    field,
                    format!("The {} field format is invalid.", attribute_name(field)),
                );
                Vec::new()
            }
        }
    }

    /// Required non-empty array of `{PartNumber: integer, ETag: string}`
    pub fn completed_parts(&mut self, field: &str) -> Vec<CompletedPart> {
        let value = self.input.get(field);
        if !is_present(value) {
            self.errors.add(
                field,
                format!("The {} field is required.", attribute_name(field)),
            );
            return Vec::new();
        }

        let Some(items) = value.and_then(Value::as_array) else {
            self.errors.add(
                field,
                format!("The {} field must be an array.", attribute_name(field)),
            );
            return Vec::new();
        };

        let mut parts = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let part_field = format!("{}.{}.PartNumber", field, index);
            let etag_field = format!("{}.{}.ETag", field, index);

            let part_number = match item.get("PartNumber") {
                value if !is_present(value) => {
                    self.errors
                        .add(&part_field, format!("The {} field is required.", part_field));
                    None
                }
                Some(value) => match as_integer(value).and_then(|n| i32::try_from(n).ok()) {
                    Some(n) => Some(n),
                    None => {
                        self.errors.add(
                            &part_field,
                            format!("The {} field must be an integer.", part_field),
                        );
                        None
                    }
                },
                None => None,
            };

            let etag = match item.get("ETag") {
                value if !is_present(value) => {
                    self.errors
                        .add(&etag_field, format!("The {} field is required.", etag_field));
                    None
                }
                Some(Value::String(etag)) => Some(etag.clone()),
                Some(_) => {
                    self.errors.add(
                        &etag_field,
                        format!("The {} field must be a string.", etag_field),
                    );
                    None
                }
                None => None,
            };

            if let (Some(part_number), Some(etag)) = (part_number, etag) {
                parts.push(CompletedPart { part_number, etag });
            }
        }

        parts
    }

    /// Record a custom failure
    pub fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    /// Succeed when no check failed
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Check that a metadata value is a string to string mapping
pub fn validate_metadata(value: &Value) -> Option<Metadata> {
    match value {
        Value::Null => Some(Metadata::new()),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
            .collect(),
        _ => None,
    }
}

/// Whether a metadata key can be sent as an `x-amz-meta-*` header name
pub fn is_header_token(key: &str) -> bool {
    HeaderName::from_bytes(key.as_bytes()).is_ok()
}

/// Parse `"3,1,2"` into part numbers, keeping the given order
///
/// Returns `None` unless the whole string matches [`PART_NUMBERS_PATTERN`].
pub fn parse_part_numbers(raw: &str) -> Option<Vec<i32>> {
    if !part_numbers_regex().is_match(raw) {
        return None;
    }
    raw.split(',').map(|n| n.parse().ok()).collect()
}
