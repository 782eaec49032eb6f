//! JSON parse nodes backed by `serde_json`.

use std::io::Read;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::error::{AdapterError, Result};
use crate::parse_node::{ParseNode, ParseNodeFactory, PeriodAndDuration};

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Creates `JsonParseNode`s from `application/json` payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParseNodeFactory;

impl ParseNodeFactory for JsonParseNodeFactory {
    fn valid_content_type(&self) -> &str {
        JSON_CONTENT_TYPE
    }

    fn get_parse_node(
        &self,
        content_type: &str,
        content: &mut dyn Read,
    ) -> Result<Box<dyn ParseNode>> {
        if content_type.is_empty() {
            return Err(AdapterError::InvalidArgument(
                "content type cannot be empty".to_string(),
            ));
        }
        if !content_type.eq_ignore_ascii_case(JSON_CONTENT_TYPE) {
            return Err(AdapterError::InvalidArgument(format!(
                "expected a {JSON_CONTENT_TYPE} content type, got {content_type}"
            )));
        }
        let mut raw = Vec::new();
        content
            .read_to_end(&mut raw)
            .map_err(|e| AdapterError::Deserialization(e.to_string()))?;
        // An empty body parses as a null document.
        let value = if raw.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&raw).map_err(|e| AdapterError::Deserialization(e.to_string()))?
        };
        Ok(Box::new(JsonParseNode::new(value)))
    }
}

/// A node of a parsed JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonParseNode {
    value: Value,
}

impl JsonParseNode {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    fn mismatch<T>(&self, expected: &str) -> Result<T> {
        Err(AdapterError::Deserialization(format!(
            "expected {expected}, found {}",
            kind_of(&self.value)
        )))
    }

    fn string(&self, expected: &str) -> Result<Option<&str>> {
        match &self.value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            _ => self.mismatch(expected),
        }
    }

    fn integer(&self, expected: &str) -> Result<Option<i64>> {
        match &self.value {
            Value::Null => Ok(None),
            Value::Number(n) => match n.as_i64() {
                Some(v) => Ok(Some(v)),
                None => self.mismatch(expected),
            },
            _ => self.mismatch(expected),
        }
    }

    fn narrowed<T: TryFrom<i64>>(&self, expected: &str) -> Result<Option<T>> {
        match self.integer(expected)? {
            None => Ok(None),
            Some(v) => T::try_from(v).map(Some).map_err(|_| {
                AdapterError::Deserialization(format!("{v} is out of range for {expected}"))
            }),
        }
    }

    fn parsed_string<T, E: std::fmt::Display>(
        &self,
        expected: &str,
        parse: impl FnOnce(&str) -> std::result::Result<T, E>,
    ) -> Result<Option<T>> {
        match self.string(expected)? {
            None => Ok(None),
            Some(raw) => parse(raw).map(Some).map_err(|e| {
                AdapterError::Deserialization(format!("invalid {expected} {raw:?}: {e}"))
            }),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl ParseNode for JsonParseNode {
    fn is_null(&self) -> bool {
        self.value.is_null()
    }

    fn get_string_value(&self) -> Result<Option<String>> {
        Ok(self.string("a string")?.map(str::to_string))
    }

    fn get_bool_value(&self) -> Result<Option<bool>> {
        match &self.value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(*b)),
            _ => self.mismatch("a boolean"),
        }
    }

    fn get_byte_value(&self) -> Result<Option<i8>> {
        self.narrowed("a byte")
    }

    fn get_short_value(&self) -> Result<Option<i16>> {
        self.narrowed("a short")
    }

    fn get_int_value(&self) -> Result<Option<i32>> {
        self.narrowed("an int")
    }

    fn get_long_value(&self) -> Result<Option<i64>> {
        self.integer("a long")
    }

    fn get_float_value(&self) -> Result<Option<f32>> {
        Ok(self.get_double_value()?.map(|v| v as f32))
    }

    fn get_double_value(&self) -> Result<Option<f64>> {
        match &self.value {
            Value::Null => Ok(None),
            Value::Number(n) => match n.as_f64() {
                Some(v) => Ok(Some(v)),
                None => self.mismatch("a double"),
            },
            _ => self.mismatch("a double"),
        }
    }

    fn get_decimal_value(&self) -> Result<Option<Number>> {
        match &self.value {
            Value::Null => Ok(None),
            Value::Number(n) => Ok(Some(n.clone())),
            // Decimals are often sent as strings to survive lossy parsers.
            Value::String(s) => serde_json::from_str::<Number>(s)
                .map(Some)
                .map_err(|e| AdapterError::Deserialization(format!("invalid decimal {s:?}: {e}"))),
            _ => self.mismatch("a decimal"),
        }
    }

    fn get_uuid_value(&self) -> Result<Option<Uuid>> {
        self.parsed_string("uuid", Uuid::parse_str)
    }

    fn get_date_value(&self) -> Result<Option<NaiveDate>> {
        self.parsed_string("date", str::parse::<NaiveDate>)
    }

    fn get_time_value(&self) -> Result<Option<NaiveTime>> {
        self.parsed_string("time", str::parse::<NaiveTime>)
    }

    fn get_date_time_value(&self) -> Result<Option<DateTime<FixedOffset>>> {
        self.parsed_string("date-time", DateTime::parse_from_rfc3339)
    }

    fn get_period_and_duration_value(&self) -> Result<Option<PeriodAndDuration>> {
        self.parsed_string("duration", str::parse::<PeriodAndDuration>)
    }

    fn get_byte_array_value(&self) -> Result<Option<Vec<u8>>> {
        self.parsed_string("base64", |raw| STANDARD.decode(raw))
    }

    fn get_child_node(&self, name: &str) -> Result<Option<Box<dyn ParseNode>>> {
        match &self.value {
            Value::Null => Ok(None),
            Value::Object(map) => Ok(map
                .get(name)
                .map(|child| Box::new(JsonParseNode::new(child.clone())) as Box<dyn ParseNode>)),
            _ => self.mismatch("an object"),
        }
    }

    fn get_collection_elements(&self) -> Result<Option<Vec<Box<dyn ParseNode>>>> {
        match &self.value {
            Value::Null => Ok(None),
            Value::Array(items) => Ok(Some(
                items
                    .iter()
                    .map(|item| Box::new(JsonParseNode::new(item.clone())) as Box<dyn ParseNode>)
                    .collect(),
            )),
            _ => self.mismatch("an array"),
        }
    }
}
