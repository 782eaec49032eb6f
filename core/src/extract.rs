//! Dispatch from a parsed response to the shape the caller asked for.
//!
//! # Design
//! Object, collection and enum shapes are driven by caller-supplied
//! closures. Primitive shapes are driven by `PrimitiveKind`, a closed set of
//! value kinds; kinds named at runtime go through `PrimitiveKind::from_str`,
//! which is where an unknown kind is rejected. `Void` and `Stream` are
//! decided by the adapter before any parsing happens.
//!
//! Every extractor maps an absent node to `Ok(None)`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde_json::Number;
use tracing::trace;
use uuid::Uuid;

use crate::error::{AdapterError, Result};
use crate::http::ResponseBody;
use crate::parse_node::{ParseNode, PeriodAndDuration};

/// Primitive result kinds understood by `send_primitive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Void,
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    String,
    Uuid,
    Date,
    Time,
    DateTime,
    Duration,
    ByteArray,
    /// The raw response body, unparsed.
    Stream,
}

impl PrimitiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::Void => "void",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Decimal => "decimal",
            PrimitiveKind::String => "string",
            PrimitiveKind::Uuid => "uuid",
            PrimitiveKind::Date => "date",
            PrimitiveKind::Time => "time",
            PrimitiveKind::DateTime => "date-time",
            PrimitiveKind::Duration => "duration",
            PrimitiveKind::ByteArray => "byte-array",
            PrimitiveKind::Stream => "stream",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrimitiveKind {
    type Err = AdapterError;

    /// Accepts the kind names plus the usual aliases (`boolean`, `i32`,
    /// `integer`, `binary`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "void" | "unit" | "()" => PrimitiveKind::Void,
            "bool" | "boolean" => PrimitiveKind::Bool,
            "byte" | "i8" | "sbyte" => PrimitiveKind::Byte,
            "short" | "i16" | "int16" => PrimitiveKind::Short,
            "int" | "integer" | "i32" | "int32" => PrimitiveKind::Int,
            "long" | "i64" | "int64" => PrimitiveKind::Long,
            "float" | "f32" => PrimitiveKind::Float,
            "double" | "f64" => PrimitiveKind::Double,
            "decimal" | "bigdecimal" | "number" => PrimitiveKind::Decimal,
            "string" | "str" => PrimitiveKind::String,
            "uuid" | "guid" => PrimitiveKind::Uuid,
            "date" | "localdate" => PrimitiveKind::Date,
            "time" | "localtime" => PrimitiveKind::Time,
            "date-time" | "datetime" | "offsetdatetime" => PrimitiveKind::DateTime,
            "duration" | "period" | "periodandduration" => PrimitiveKind::Duration,
            "byte-array" | "bytes" | "base64" => PrimitiveKind::ByteArray,
            "stream" | "binary" | "inputstream" => PrimitiveKind::Stream,
            _ => return Err(AdapterError::UnsupportedPayloadType(s.to_string())),
        };
        Ok(kind)
    }
}

/// A primitive result value, tagged with its kind.
#[derive(Debug)]
pub enum PrimitiveValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Decimal(Number),
    String(String),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<FixedOffset>),
    Duration(PeriodAndDuration),
    ByteArray(Vec<u8>),
    /// Raw body; the caller owns and must drop it.
    Stream(ResponseBody),
}

impl PrimitiveValue {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            PrimitiveValue::Bool(_) => PrimitiveKind::Bool,
            PrimitiveValue::Byte(_) => PrimitiveKind::Byte,
            PrimitiveValue::Short(_) => PrimitiveKind::Short,
            PrimitiveValue::Int(_) => PrimitiveKind::Int,
            PrimitiveValue::Long(_) => PrimitiveKind::Long,
            PrimitiveValue::Float(_) => PrimitiveKind::Float,
            PrimitiveValue::Double(_) => PrimitiveKind::Double,
            PrimitiveValue::Decimal(_) => PrimitiveKind::Decimal,
            PrimitiveValue::String(_) => PrimitiveKind::String,
            PrimitiveValue::Uuid(_) => PrimitiveKind::Uuid,
            PrimitiveValue::Date(_) => PrimitiveKind::Date,
            PrimitiveValue::Time(_) => PrimitiveKind::Time,
            PrimitiveValue::DateTime(_) => PrimitiveKind::DateTime,
            PrimitiveValue::Duration(_) => PrimitiveKind::Duration,
            PrimitiveValue::ByteArray(_) => PrimitiveKind::ByteArray,
            PrimitiveValue::Stream(_) => PrimitiveKind::Stream,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PrimitiveValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Any integer kind, widened.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PrimitiveValue::Byte(v) => Some(i64::from(*v)),
            PrimitiveValue::Short(v) => Some(i64::from(*v)),
            PrimitiveValue::Int(v) => Some(i64::from(*v)),
            PrimitiveValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PrimitiveValue::Float(v) => Some(f64::from(*v)),
            PrimitiveValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrimitiveValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_stream(self) -> Option<ResponseBody> {
        match self {
            PrimitiveValue::Stream(body) => Some(body),
            _ => None,
        }
    }
}

/// Read one primitive of `kind` from `node`.
///
/// `Void` and `Stream` never reach a parse node; asking for them here is a
/// payload type error.
pub fn read_primitive(node: &dyn ParseNode, kind: PrimitiveKind) -> Result<Option<PrimitiveValue>> {
    let value = match kind {
        PrimitiveKind::Bool => node.get_bool_value()?.map(PrimitiveValue::Bool),
        PrimitiveKind::Byte => node.get_byte_value()?.map(PrimitiveValue::Byte),
        PrimitiveKind::Short => node.get_short_value()?.map(PrimitiveValue::Short),
        PrimitiveKind::Int => node.get_int_value()?.map(PrimitiveValue::Int),
        PrimitiveKind::Long => node.get_long_value()?.map(PrimitiveValue::Long),
        PrimitiveKind::Float => node.get_float_value()?.map(PrimitiveValue::Float),
        PrimitiveKind::Double => node.get_double_value()?.map(PrimitiveValue::Double),
        PrimitiveKind::Decimal => node.get_decimal_value()?.map(PrimitiveValue::Decimal),
        PrimitiveKind::String => node.get_string_value()?.map(PrimitiveValue::String),
        PrimitiveKind::Uuid => node.get_uuid_value()?.map(PrimitiveValue::Uuid),
        PrimitiveKind::Date => node.get_date_value()?.map(PrimitiveValue::Date),
        PrimitiveKind::Time => node.get_time_value()?.map(PrimitiveValue::Time),
        PrimitiveKind::DateTime => node.get_date_time_value()?.map(PrimitiveValue::DateTime),
        PrimitiveKind::Duration => node
            .get_period_and_duration_value()?
            .map(PrimitiveValue::Duration),
        PrimitiveKind::ByteArray => node.get_byte_array_value()?.map(PrimitiveValue::ByteArray),
        PrimitiveKind::Void | PrimitiveKind::Stream => {
            return Err(AdapterError::UnsupportedPayloadType(kind.to_string()))
        }
    };
    Ok(value)
}

pub fn object<T, F>(node: Option<Box<dyn ParseNode>>, factory: F) -> Result<Option<T>>
where
    F: Fn(&dyn ParseNode) -> Result<T>,
{
    trace!(shape = "object", "extracting response");
    match node {
        Some(node) => node.get_object_value(factory),
        None => Ok(None),
    }
}

pub fn collection<T, F>(node: Option<Box<dyn ParseNode>>, factory: F) -> Result<Option<Vec<T>>>
where
    F: Fn(&dyn ParseNode) -> Result<T>,
{
    trace!(shape = "collection", "extracting response");
    match node {
        Some(node) => node.get_collection_of_object_values(factory),
        None => Ok(None),
    }
}

pub fn primitive(
    node: Option<Box<dyn ParseNode>>,
    kind: PrimitiveKind,
) -> Result<Option<PrimitiveValue>> {
    trace!(shape = "primitive", %kind, "extracting response");
    match node {
        Some(node) => read_primitive(node.as_ref(), kind),
        None => Ok(None),
    }
}

/// Elements that read as null are skipped.
pub fn primitive_collection(
    node: Option<Box<dyn ParseNode>>,
    kind: PrimitiveKind,
) -> Result<Option<Vec<PrimitiveValue>>> {
    trace!(shape = "primitive_collection", %kind, "extracting response");
    let Some(node) = node else {
        return Ok(None);
    };
    let Some(elements) = node.get_collection_elements()? else {
        return Ok(None);
    };
    let mut values = Vec::with_capacity(elements.len());
    for element in &elements {
        if let Some(value) = read_primitive(element.as_ref(), kind)? {
            values.push(value);
        }
    }
    Ok(Some(values))
}

pub fn enumeration<E, R>(node: Option<Box<dyn ParseNode>>, resolver: R) -> Result<Option<E>>
where
    R: Fn(&str) -> Option<E>,
{
    trace!(shape = "enum", "extracting response");
    match node {
        Some(node) => node.get_enum_value(resolver),
        None => Ok(None),
    }
}

pub fn enum_collection<E, R>(node: Option<Box<dyn ParseNode>>, resolver: R) -> Result<Option<Vec<E>>>
where
    R: Fn(&str) -> Option<E>,
{
    trace!(shape = "enum_collection", "extracting response");
    match node {
        Some(node) => node.get_collection_of_enum_values(resolver),
        None => Ok(None),
    }
}
