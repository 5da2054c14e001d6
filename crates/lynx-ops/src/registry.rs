// Registry - build operators from a name and a JSON attribute object
//
// Importers see operator names and attribute bags, not Rust types. The
// registry maps every catalog name to a constructor:
//
//   make_op("convolution", json!({"padding": [1, 1]}))
//   make_op("add", json!({"broadcast": 1}))
//   make_op("relu", json!({}))            -> error, "relu" is an activation mode
//
// Missing attributes take their defaults and unknown ones are rejected.
// `null` is accepted as "no attributes". `check_context` is generic over the
// context type and cannot be built from a name.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use lynx_core::{Error, Result};

use crate::conv::Convolution;
use crate::elementwise::{Activation, Binary, BinaryOp, Unary, UnaryOp};
use crate::gemm::Gemm;
use crate::operator::{Operation, Operator};
use crate::outline::Outline;
use crate::pooling::Pooling;
use crate::shape_ops::{Broadcast, Contiguous, Reshape, Transpose};

type Builder = fn(&str, Value) -> Result<Operation>;

lazy_static! {
    static ref REGISTRY: BTreeMap<&'static str, Builder> = {
        let mut m: BTreeMap<&'static str, Builder> = BTreeMap::new();
        m.insert("convolution", from_attrs::<Convolution>);
        m.insert("pooling", from_attrs::<Pooling>);
        m.insert("activation", from_attrs::<Activation>);
        m.insert("transpose", from_attrs::<Transpose>);
        m.insert("reshape", from_attrs::<Reshape>);
        m.insert("broadcast", from_attrs::<Broadcast>);
        m.insert("outline", from_attrs::<Outline>);
        m.insert("contiguous", |name, attrs| no_attrs(name, attrs, Contiguous));
        m.insert("gemm", |name, attrs| no_attrs(name, attrs, Gemm));
        for op in UnaryOp::ALL {
            m.insert(op.as_str(), unary);
        }
        for op in BinaryOp::ALL {
            m.insert(op.as_str(), binary);
        }
        m
    };
}

/// Build the operator registered under `name`.
pub fn make_op(name: &str, attrs: Value) -> Result<Operation> {
    match REGISTRY.get(name) {
        Some(build) => build(name, attrs),
        None => Err(Error::structural(format!("unknown operator '{}'", name))),
    }
}

/// Every registered operator name, sorted.
pub fn registered_ops() -> Vec<&'static str> {
    REGISTRY.keys().copied().collect()
}

pub fn is_registered(name: &str) -> bool {
    REGISTRY.contains_key(name)
}

fn parse<T: DeserializeOwned>(name: &str, attrs: Value) -> Result<T> {
    let attrs = match attrs {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(attrs).map_err(|e| {
        Error::invalid_parameter(Some(name), format!("invalid attributes: {}", e))
    })
}

fn from_attrs<T: Operator + DeserializeOwned>(name: &str, attrs: Value) -> Result<Operation> {
    parse::<T>(name, attrs).map(Operation::new)
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoAttrs {}

fn no_attrs<T: Operator>(name: &str, attrs: Value, op: T) -> Result<Operation> {
    parse::<NoAttrs>(name, attrs)?;
    Ok(Operation::new(op))
}

fn unary(name: &str, attrs: Value) -> Result<Operation> {
    let op: UnaryOp = name.parse()?;
    no_attrs(name, attrs, Unary::new(op))
}

#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct BinaryAttrs {
    broadcast: Option<usize>,
}

fn binary(name: &str, attrs: Value) -> Result<Operation> {
    let op: BinaryOp = name.parse()?;
    let attrs: BinaryAttrs = parse(name, attrs)?;
    Ok(Operation::new(Binary {
        op,
        broadcast: attrs.broadcast,
    }))
}
