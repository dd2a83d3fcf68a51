//! Payload format descriptors and container rendering.
//!
//! A channel may ask for its generated value to be wrapped before it goes on the
//! wire. Device files describe the wrapper either as a tuple literal string
//! (`"('list', 2)"`, `"('dict', 'POWER')"`) or as a two element YAML sequence
//! (`[list, 2]`, `[dict, POWER]`). Both forms are parsed once while the
//! configuration loads, so a malformed descriptor stops the simulator before it
//! connects to the broker.

use std::fmt;

use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;

use super::generator::SampleValue;

/// How scalars and containers are turned into payload text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PayloadStyle {
    /// Python literal text: `[None, 12.5]`, `{'POWER': 'true'}`
    #[default]
    Repr,
    /// Compact JSON: `[null,12.5]`, `{"POWER":"true"}`
    Json,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadFormatError {
    #[error("unknown container kind '{0}', expected 'list' or 'dict'")]
    UnknownContainer(String),

    #[error("list position must be a non-negative integer, got {0}")]
    InvalidPosition(String),

    #[error("malformed payload format literal: {0}")]
    MalformedLiteral(String),
}

/// Key of a single-entry mapping payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DictKey {
    Int(i64),
    Name(String),
}

impl fmt::Display for DictKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictKey::Int(i) => write!(f, "{}", i),
            DictKey::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Container a generated value is placed into.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawPayloadFormat")]
pub enum PayloadFormat {
    /// List with `position` null placeholders in front of the value.
    List { position: usize },
    /// Mapping holding the value under a single key.
    Dict { key: DictKey },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPayloadFormat {
    Literal(String),
    Pair(String, DictKey),
}

impl TryFrom<RawPayloadFormat> for PayloadFormat {
    type Error = PayloadFormatError;

    fn try_from(raw: RawPayloadFormat) -> Result<Self, Self::Error> {
        match raw {
            RawPayloadFormat::Literal(literal) => PayloadFormat::parse_literal(&literal),
            RawPayloadFormat::Pair(kind, location) => PayloadFormat::from_parts(&kind, location),
        }
    }
}

impl PayloadFormat {
    fn from_parts(kind: &str, location: DictKey) -> Result<Self, PayloadFormatError> {
        match kind.trim() {
            "list" => match location {
                DictKey::Int(position) if position >= 0 => Ok(PayloadFormat::List {
                    position: position as usize,
                }),
                other => Err(PayloadFormatError::InvalidPosition(other.to_string())),
            },
            "dict" => Ok(PayloadFormat::Dict { key: location }),
            other => Err(PayloadFormatError::UnknownContainer(other.to_string())),
        }
    }

    /// Parses a tuple literal such as `('list', 2)` or `("dict", "value")`.
    pub fn parse_literal(literal: &str) -> Result<Self, PayloadFormatError> {
        let malformed = || PayloadFormatError::MalformedLiteral(literal.to_string());

        let inner = literal
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(malformed)?;

        let (kind, location) = inner.split_once(',').ok_or_else(malformed)?;
        let kind = unquote(kind.trim()).ok_or_else(malformed)?;

        let location = location.trim();
        let location = location.strip_suffix(',').unwrap_or(location).trim();
        let location = match unquote(location) {
            Some(name) => DictKey::Name(name.to_string()),
            None => DictKey::Int(location.parse().map_err(|_| malformed())?),
        };

        Self::from_parts(kind, location)
    }

    /// Wraps `value` and renders the container in the requested style.
    pub fn render(&self, value: &SampleValue, style: PayloadStyle) -> String {
        match style {
            PayloadStyle::Repr => self.render_repr(value),
            PayloadStyle::Json => self.to_json(value).to_string(),
        }
    }

    fn render_repr(&self, value: &SampleValue) -> String {
        match self {
            PayloadFormat::List { position } => {
                let mut slots: Vec<String> = vec!["None".to_string(); *position];
                slots.push(value.repr_in_container());
                format!("[{}]", slots.join(", "))
            }
            PayloadFormat::Dict { key } => {
                let key = match key {
                    DictKey::Int(i) => i.to_string(),
                    DictKey::Name(name) => python_str_repr(name),
                };
                format!("{{{}: {}}}", key, value.repr_in_container())
            }
        }
    }

    fn to_json(&self, value: &SampleValue) -> serde_json::Value {
        match self {
            PayloadFormat::List { position } => {
                let mut slots = vec![serde_json::Value::Null; *position];
                slots.push(value.to_json());
                serde_json::Value::Array(slots)
            }
            PayloadFormat::Dict { key } => {
                let mut map = serde_json::Map::new();
                map.insert(key.to_string(), value.to_json());
                serde_json::Value::Object(map)
            }
        }
    }
}

fn unquote(token: &str) -> Option<&str> {
    ['\'', '"'].iter().find_map(|quote| {
        token
            .strip_prefix(*quote)
            .and_then(|rest| rest.strip_suffix(*quote))
    })
}

/// Quotes a string the way Python's `repr` does for plain text.
pub(crate) fn python_str_repr(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_quoted_list_literal() {
        let format = PayloadFormat::parse_literal("('list', 2)").unwrap();
        assert_eq!(format, PayloadFormat::List { position: 2 });
    }

    #[test]
    fn parses_double_quoted_dict_literal() {
        let format = PayloadFormat::parse_literal(r#"( "dict" , "value" )"#).unwrap();
        assert_eq!(
            format,
            PayloadFormat::Dict {
                key: DictKey::Name("value".into())
            }
        );
    }

    #[test]
    fn dict_literal_accepts_integer_key() {
        let format = PayloadFormat::parse_literal("('dict', 3)").unwrap();
        assert_eq!(format, PayloadFormat::Dict { key: DictKey::Int(3) });
    }

    #[test]
    fn rejects_malformed_literals() {
        for literal in ["list, 2", "('list')", "('list', two)", "(list, 2)", ""] {
            assert!(
                matches!(
                    PayloadFormat::parse_literal(literal),
                    Err(PayloadFormatError::MalformedLiteral(_))
                ),
                "{literal} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_unknown_container_and_bad_position() {
        assert_eq!(
            PayloadFormat::parse_literal("('set', 1)"),
            Err(PayloadFormatError::UnknownContainer("set".into()))
        );
        assert_eq!(
            PayloadFormat::parse_literal("('list', -1)"),
            Err(PayloadFormatError::InvalidPosition("-1".into()))
        );
        assert_eq!(
            PayloadFormat::parse_literal("('list', 'x')"),
            Err(PayloadFormatError::InvalidPosition("x".into()))
        );
    }

    #[test]
    fn deserializes_both_yaml_forms() {
        let literal: PayloadFormat = serde_yaml::from_str("\"('list', 1)\"").unwrap();
        let pair: PayloadFormat = serde_yaml::from_str("[dict, POWER]").unwrap();
        assert_eq!(literal, PayloadFormat::List { position: 1 });
        assert_eq!(
            pair,
            PayloadFormat::Dict {
                key: DictKey::Name("POWER".into())
            }
        );
        assert!(serde_yaml::from_str::<PayloadFormat>("[tuple, 1]").is_err());
    }

    #[test]
    fn list_repr_pads_with_none() {
        let format = PayloadFormat::List { position: 2 };
        assert_eq!(
            format.render(&SampleValue::Float(12.35), PayloadStyle::Repr),
            "[None, None, 12.35]"
        );
        let first = PayloadFormat::List { position: 0 };
        assert_eq!(
            first.render(&SampleValue::Integer(7), PayloadStyle::Repr),
            "[7]"
        );
    }

    #[test]
    fn dict_repr_quotes_string_values_and_keys() {
        let named = PayloadFormat::Dict {
            key: DictKey::Name("POWER".into()),
        };
        assert_eq!(
            named.render(&SampleValue::Boolean(true), PayloadStyle::Repr),
            "{'POWER': 'true'}"
        );
        let numbered = PayloadFormat::Dict { key: DictKey::Int(1) };
        assert_eq!(
            numbered.render(&SampleValue::Float(7.0), PayloadStyle::Repr),
            "{1: 7.0}"
        );
    }

    #[test]
    fn json_style_renders_compact_json() {
        let list = PayloadFormat::List { position: 1 };
        assert_eq!(
            list.render(&SampleValue::Integer(42), PayloadStyle::Json),
            "[null,42]"
        );
        let dict = PayloadFormat::Dict {
            key: DictKey::Int(2),
        };
        assert_eq!(
            dict.render(&SampleValue::Boolean(false), PayloadStyle::Json),
            r#"{"2":"false"}"#
        );
    }

    #[test]
    fn python_repr_switches_quotes() {
        assert_eq!(python_str_repr("plain"), "'plain'");
        assert_eq!(python_str_repr("it's"), "\"it's\"");
        assert_eq!(python_str_repr("a'b\"c"), "'a\\'b\"c'");
    }
}
