//! Small helpers for pulling plain Rust data out of `ValueRef` arguments and
//! building return values, shared by every host class in this crate.

use script::value::{new_ref, Value, ValueRef};
use script::HostError;

pub fn expect_args(args: &[ValueRef], n: usize, what: &str) -> Result<(), HostError> {
    if args.len() != n {
        return Err(HostError::Custom(format!("{what}: expected {n} argument(s), got {}", args.len())));
    }
    Ok(())
}

pub fn expect_str(v: &ValueRef, what: &str) -> Result<String, HostError> {
    match &*v.borrow() {
        Value::Str(s) => Ok(String::from_utf8_lossy(s).into_owned()),
        other => Err(HostError::Custom(format!("{what}: expected a string, got {}", other.type_name()))),
    }
}

pub fn expect_vec(v: &ValueRef, what: &str) -> Result<Vec<ValueRef>, HostError> {
    match &*v.borrow() {
        Value::Vec(items) => Ok(items.clone()),
        other => Err(HostError::Custom(format!("{what}: expected a vector, got {}", other.type_name()))),
    }
}

pub fn expect_str_vec(v: &ValueRef, what: &str) -> Result<Vec<String>, HostError> {
    expect_vec(v, what)?
        .iter()
        .enumerate()
        .map(|(i, item)| expect_str(item, &format!("{what}[{i}]")))
        .collect()
}

pub fn str_val(s: impl Into<String>) -> ValueRef {
    new_ref(Value::Str(s.into().into_bytes()))
}

pub fn vec_val(items: Vec<ValueRef>) -> ValueRef {
    new_ref(Value::Vec(items))
}

pub fn str_vec_val(items: impl IntoIterator<Item = String>) -> ValueRef {
    vec_val(items.into_iter().map(str_val).collect())
}
