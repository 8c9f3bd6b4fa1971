// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Records and the metric instances they are projected from
//!
//! A [`Record`] is one serialized metric event: the compact JSON object of an
//! instance's projected dimensions. Records are immutable once created and
//! carry no identity beyond arrival order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// One opaque serialized metric event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(String);

impl Record {
    /// Wrap already-serialized record text
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Project an instance's dimensions into a record
    pub fn from_instance(instance: &InstanceMsg) -> Self {
        Self(Value::Object(project_dimensions(&instance.dimensions)).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A metric instance as pushed by the control plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceMsg {
    pub name: String,
    #[serde(default)]
    pub dimensions: BTreeMap<String, DimensionValue>,
}

/// A dimension value: one of the known typed kinds, or anything else
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DimensionValue {
    Typed(TypedValue),
    /// Value kind this relay does not know; projected to its text form
    Unrecognized(Value),
}

/// Typed scalar kinds understood by the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypedValue {
    StringValue(String),
    Int64Value(i64),
    DoubleValue(f64),
    BoolValue(bool),
    /// Raw address bytes, 4 for IPv4 or 16 for IPv6
    IpAddressValue(Vec<u8>),
    DurationValue(WireDuration),
}

/// Duration as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireDuration {
    #[serde(default)]
    pub seconds: i64,
    #[serde(default)]
    pub nanos: i32,
}

impl WireDuration {
    /// Total length in nanoseconds, saturating at the i64 bounds
    pub fn as_nanos(&self) -> i64 {
        self.seconds
            .saturating_mul(1_000_000_000)
            .saturating_add(i64::from(self.nanos))
    }
}

impl DimensionValue {
    /// Project to the native JSON representation stored in a record
    pub fn project(&self) -> Value {
        match self {
            DimensionValue::Typed(typed) => typed.project(),
            DimensionValue::Unrecognized(Value::String(s)) => Value::String(s.clone()),
            DimensionValue::Unrecognized(other) => Value::String(other.to_string()),
        }
    }
}

impl TypedValue {
    pub fn project(&self) -> Value {
        match self {
            TypedValue::StringValue(s) => Value::String(s.clone()),
            TypedValue::Int64Value(n) => Value::from(*n),
            TypedValue::DoubleValue(d) => Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(d.to_string())),
            TypedValue::BoolValue(b) => Value::Bool(*b),
            TypedValue::IpAddressValue(bytes) => Value::String(ip_text(bytes)),
            TypedValue::DurationValue(d) => Value::from(d.as_nanos()),
        }
    }
}

fn ip_text(bytes: &[u8]) -> String {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        return IpAddr::V4(Ipv4Addr::from(octets)).to_string();
    }
    if let Ok(octets) = <[u8; 16]>::try_from(bytes) {
        return IpAddr::V6(Ipv6Addr::from(octets)).to_string();
    }
    format!("{:?}", bytes)
}

/// Project every dimension of an instance
pub fn project_dimensions(dimensions: &BTreeMap<String, DimensionValue>) -> Map<String, Value> {
    dimensions
        .iter()
        .map(|(name, value)| (name.clone(), value.project()))
        .collect()
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
