//! `Platform` host class: host OS and environment introspection, exported as
//! plain functions on the class itself (`Platform.os()`, `Platform.getenv(k)`).

use std::rc::Rc;

use script::value::{new_ref, HostValue, Value, ValueRef};
use script::{HostClass, HostError};

use crate::convert::{expect_args, expect_str, str_val};

pub struct Platform;

impl HostClass for Platform {
    fn name(&self) -> &str {
        "Platform"
    }

    fn instantiate(&self, _args: &[ValueRef]) -> Result<Rc<dyn HostValue>, HostError> {
        Err(HostError::Custom("Platform cannot be instantiated".to_string()))
    }

    fn call(&self, _instance: &script::value::Instance, method: &str, _args: &[ValueRef]) -> Result<ValueRef, HostError> {
        Err(HostError::Custom(format!("Platform has no instance method '{method}'")))
    }

    fn call_function(&self, name: &str, args: &[ValueRef]) -> Result<ValueRef, HostError> {
        match name {
            "os" => os(args),
            "getenv" => getenv(args),
            other => Err(HostError::Custom(format!("Platform has no function '{other}'"))),
        }
    }
}

fn os(args: &[ValueRef]) -> Result<ValueRef, HostError> {
    expect_args(args, 0, "Platform.os")?;
    Ok(str_val(std::env::consts::OS))
}

fn getenv(args: &[ValueRef]) -> Result<ValueRef, HostError> {
    expect_args(args, 1, "Platform.getenv")?;
    let key = expect_str(&args[0], "Platform.getenv key")?;

    Ok(match std::env::var(&key) {
        Ok(val) => str_val(val),
        Err(_) => new_ref(Value::None),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getenv_returns_none_for_missing_var() {
        let platform = Platform;
        let arg = new_ref(Value::Str(b"BOB_DEFINITELY_UNSET_VAR".to_vec()));
        let result = platform.call_function("getenv", &[arg]).unwrap();
        assert!(matches!(&*result.borrow(), Value::None));
    }

    #[test]
    fn os_returns_nonempty_string() {
        let platform = Platform;
        let result = platform.call_function("os", &[]).unwrap();
        assert!(!result.borrow().render().is_empty());
    }
}
