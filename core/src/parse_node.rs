//! Format-neutral view over a parsed response body.
//!
//! # Design
//! A `ParseNode` wraps one node of a parsed body and exposes typed reads.
//! Every read returns `Ok(None)` for a null node and a `Deserialization`
//! error when the node holds a different kind of value. Generated models
//! build themselves from a node through factory closures, so the trait only
//! needs the scalar reads plus navigation (`get_child_node`,
//! `get_collection_elements`); the generic helpers live on `dyn ParseNode`.
//!
//! `ParseNodeFactoryRegistry` picks the factory for a response by its media
//! type. An unknown media type yields no node rather than an error.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;
use uuid::Uuid;

use crate::error::{AdapterError, Result};
use crate::json::JsonParseNodeFactory;

/// One node of a parsed response body.
pub trait ParseNode: Send {
    fn is_null(&self) -> bool;
    fn get_string_value(&self) -> Result<Option<String>>;
    fn get_bool_value(&self) -> Result<Option<bool>>;
    fn get_byte_value(&self) -> Result<Option<i8>>;
    fn get_short_value(&self) -> Result<Option<i16>>;
    fn get_int_value(&self) -> Result<Option<i32>>;
    fn get_long_value(&self) -> Result<Option<i64>>;
    fn get_float_value(&self) -> Result<Option<f32>>;
    fn get_double_value(&self) -> Result<Option<f64>>;
    /// Arbitrary-precision decimal, kept in its textual form.
    fn get_decimal_value(&self) -> Result<Option<Number>>;
    fn get_uuid_value(&self) -> Result<Option<Uuid>>;
    fn get_date_value(&self) -> Result<Option<NaiveDate>>;
    fn get_time_value(&self) -> Result<Option<NaiveTime>>;
    fn get_date_time_value(&self) -> Result<Option<DateTime<FixedOffset>>>;
    fn get_period_and_duration_value(&self) -> Result<Option<PeriodAndDuration>>;
    fn get_byte_array_value(&self) -> Result<Option<Vec<u8>>>;
    /// Property `name` of an object node.
    fn get_child_node(&self, name: &str) -> Result<Option<Box<dyn ParseNode>>>;
    /// Elements of a collection node, in order.
    fn get_collection_elements(&self) -> Result<Option<Vec<Box<dyn ParseNode>>>>;
}

impl<'a> dyn ParseNode + 'a {
    /// Build one object through `factory`.
    pub fn get_object_value<T, F>(&self, factory: F) -> Result<Option<T>>
    where
        F: Fn(&dyn ParseNode) -> Result<T>,
    {
        if self.is_null() {
            return Ok(None);
        }
        factory(self).map(Some)
    }

    pub fn get_collection_of_object_values<T, F>(&self, factory: F) -> Result<Option<Vec<T>>>
    where
        F: Fn(&dyn ParseNode) -> Result<T>,
    {
        let Some(elements) = self.get_collection_elements()? else {
            return Ok(None);
        };
        elements
            .iter()
            .map(|element| factory(element.as_ref()))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Read a string and resolve it through `resolver`. Unknown symbols read
    /// as absent.
    pub fn get_enum_value<E, R>(&self, resolver: R) -> Result<Option<E>>
    where
        R: Fn(&str) -> Option<E>,
    {
        Ok(self.get_string_value()?.and_then(|raw| resolver(&raw)))
    }

    /// Resolve every element; elements the resolver rejects are skipped.
    pub fn get_collection_of_enum_values<E, R>(&self, resolver: R) -> Result<Option<Vec<E>>>
    where
        R: Fn(&str) -> Option<E>,
    {
        let Some(elements) = self.get_collection_elements()? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(elements.len());
        for element in &elements {
            if let Some(value) = element.get_enum_value(&resolver)? {
                values.push(value);
            }
        }
        Ok(Some(values))
    }
}

/// Builds parse nodes for one content type.
pub trait ParseNodeFactory: Send + Sync {
    fn valid_content_type(&self) -> &str;
    fn get_parse_node(&self, content_type: &str, content: &mut dyn Read)
        -> Result<Box<dyn ParseNode>>;
}

/// Content-type keyed set of parse node factories.
#[derive(Clone)]
pub struct ParseNodeFactoryRegistry {
    factories: HashMap<String, Arc<dyn ParseNodeFactory>>,
}

impl ParseNodeFactoryRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register `factory` under its valid content type, replacing any
    /// previous factory for that type.
    pub fn register(&mut self, factory: Arc<dyn ParseNodeFactory>) {
        let key = factory.valid_content_type().to_ascii_lowercase();
        self.factories.insert(key, factory);
    }

    pub fn content_types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Find the factory for `media_type`. Vendor types such as
    /// `application/vnd.acme+json` fall back to `application/json`.
    pub fn factory_for(&self, media_type: &str) -> Option<&Arc<dyn ParseNodeFactory>> {
        let media_type = media_type.to_ascii_lowercase();
        if let Some(factory) = self.factories.get(&media_type) {
            return Some(factory);
        }
        let (kind, subtype) = media_type.split_once('/')?;
        let (_, suffix) = subtype.rsplit_once('+')?;
        self.factories.get(&format!("{kind}/{suffix}"))
    }

    /// Parse `content` with the factory registered for `media_type`, or
    /// `Ok(None)` when no factory handles it.
    pub fn get_parse_node(
        &self,
        media_type: &str,
        content: &mut dyn Read,
    ) -> Result<Option<Box<dyn ParseNode>>> {
        match self.factory_for(media_type) {
            Some(factory) => {
                let valid = factory.valid_content_type().to_string();
                factory.get_parse_node(&valid, content).map(Some)
            }
            None => Ok(None),
        }
    }
}

impl Default for ParseNodeFactoryRegistry {
    /// Registry with the JSON factory registered.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(JsonParseNodeFactory));
        registry
    }
}

impl fmt::Debug for ParseNodeFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.content_types().collect();
        types.sort_unstable();
        f.debug_struct("ParseNodeFactoryRegistry")
            .field("content_types", &types)
            .finish()
    }
}

/// ISO 8601 duration with a calendar part (years, months, days) and a time
/// part, e.g. `P1Y2M3DT4H5M6.5S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodAndDuration {
    pub years: i32,
    pub months: i32,
    pub days: i32,
    pub time: Duration,
}

impl PeriodAndDuration {
    pub fn new(years: i32, months: i32, days: i32, time: Duration) -> Self {
        Self {
            years,
            months,
            days,
            time,
        }
    }
}

impl Default for PeriodAndDuration {
    fn default() -> Self {
        Self::new(0, 0, 0, Duration::zero())
    }
}

impl FromStr for PeriodAndDuration {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AdapterError::Deserialization(format!("invalid ISO 8601 duration {s:?}"));

        let (negative, unsigned) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let body = unsigned
            .strip_prefix(|c: char| c == 'P' || c == 'p')
            .ok_or_else(invalid)?;
        let (date_part, time_part) = match body.split_once(|c: char| c == 'T' || c == 't') {
            Some((date, time)) => (date, Some(time)),
            None => (body, None),
        };
        if date_part.is_empty() && time_part.map_or(true, str::is_empty) {
            return Err(invalid());
        }

        let mut result = PeriodAndDuration::default();
        for (value, unit) in designators(date_part).ok_or_else(invalid)? {
            let n: i32 = value.parse().map_err(|_| invalid())?;
            let (field, n) = match unit {
                'Y' => (&mut result.years, n),
                'M' => (&mut result.months, n),
                'W' => (&mut result.days, n.checked_mul(7).ok_or_else(invalid)?),
                'D' => (&mut result.days, n),
                _ => return Err(invalid()),
            };
            *field = field.checked_add(n).ok_or_else(invalid)?;
        }
        for (value, unit) in designators(time_part.unwrap_or_default()).ok_or_else(invalid)? {
            let part = match unit {
                'H' => Duration::try_hours(value.parse().map_err(|_| invalid())?),
                'M' => Duration::try_minutes(value.parse().map_err(|_| invalid())?),
                'S' => parse_seconds(value),
                _ => return Err(invalid()),
            };
            result.time = part
                .and_then(|part| result.time.checked_add(&part))
                .ok_or_else(invalid)?;
        }

        if negative {
            result = result.checked_neg().ok_or_else(invalid)?;
        }
        Ok(result)
    }
}

impl PeriodAndDuration {
    fn checked_neg(self) -> Option<Self> {
        Some(Self {
            years: self.years.checked_neg()?,
            months: self.months.checked_neg()?,
            days: self.days.checked_neg()?,
            time: Duration::zero().checked_sub(&self.time)?,
        })
    }

    /// No positive component and at least one negative one.
    fn is_negative(&self) -> bool {
        let signs = [
            self.years.signum(),
            self.months.signum(),
            self.days.signum(),
            self.time.cmp(&Duration::zero()) as i32,
        ];
        signs.iter().all(|&sign| sign <= 0) && signs.contains(&-1)
    }
}

/// Split `5Y3M` into `[("5", 'Y'), ("3", 'M')]`.
fn designators(s: &str) -> Option<Vec<(&str, char)>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if c.is_ascii_alphabetic() {
            if i == start {
                return None;
            }
            out.push((&s[start..i], c.to_ascii_uppercase()));
            start = i + c.len_utf8();
        }
    }
    (start == s.len()).then_some(out)
}

fn parse_seconds(value: &str) -> Option<Duration> {
    let (whole, fraction) = value.split_once(|c: char| c == '.' || c == ',').unwrap_or((value, ""));
    let negative = whole.starts_with('-');
    let seconds: i64 = whole.parse().ok()?;
    if fraction.len() > 9 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let nanos: i64 = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<9}").parse().ok()?
    };
    let nanos = if negative { -nanos } else { nanos };
    Duration::try_seconds(seconds)?.checked_add(&Duration::nanoseconds(nanos))
}

impl fmt::Display for PeriodAndDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            if let Some(magnitude) = self.checked_neg() {
                f.write_str("-")?;
                return magnitude.fmt(f);
            }
        }
        f.write_str("P")?;
        if self.years != 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months != 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days != 0 {
            write!(f, "{}D", self.days)?;
        }
        let calendar_empty = self.years == 0 && self.months == 0 && self.days == 0;
        if self.time.is_zero() {
            if calendar_empty {
                f.write_str("T0S")?;
            }
            return Ok(());
        }

        f.write_str("T")?;
        let hours = self.time.num_hours();
        let minutes = self.time.num_minutes() % 60;
        let seconds = self.time.num_seconds() % 60;
        let nanos = self.time.subsec_nanos();
        if hours != 0 {
            write!(f, "{hours}H")?;
        }
        if minutes != 0 {
            write!(f, "{minutes}M")?;
        }
        if seconds != 0 || nanos != 0 {
            if seconds == 0 && nanos < 0 {
                f.write_str("-")?;
            }
            write!(f, "{seconds}")?;
            if nanos != 0 {
                let fraction = format!("{:09}", nanos.unsigned_abs());
                write!(f, ".{}", fraction.trim_end_matches('0'))?;
            }
            f.write_str("S")?;
        }
        Ok(())
    }
}

impl Serialize for PeriodAndDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeriodAndDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
