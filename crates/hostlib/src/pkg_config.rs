//! `PkgConfig` host class: thin wrapper around the `pkg-config` executable
//! (`PkgConfig.cflags(mod)`, `PkgConfig.libs(mod)`), never instantiated.

use std::process::Command;
use std::rc::Rc;

use launch::run_captured;
use script::value::{HostValue, ValueRef};
use script::{HostClass, HostError};

use crate::cmd::cmd_exists;
use crate::convert::{expect_args, expect_str, str_vec_val};

pub struct PkgConfig;

impl HostClass for PkgConfig {
    fn name(&self) -> &str {
        "PkgConfig"
    }

    fn instantiate(&self, _args: &[ValueRef]) -> Result<Rc<dyn HostValue>, HostError> {
        Err(HostError::Custom("PkgConfig cannot be instantiated".to_string()))
    }

    fn call(&self, _instance: &script::value::Instance, method: &str, _args: &[ValueRef]) -> Result<ValueRef, HostError> {
        Err(HostError::Custom(format!("PkgConfig has no instance method '{method}'")))
    }

    fn call_function(&self, name: &str, args: &[ValueRef]) -> Result<ValueRef, HostError> {
        match name {
            "cflags" => common("cflags", "--cflags", args),
            "libs" => common("libs", "--libs", args),
            other => Err(HostError::Custom(format!("PkgConfig has no function '{other}'"))),
        }
    }
}

fn common(fn_name: &str, flag: &str, args: &[ValueRef]) -> Result<ValueRef, HostError> {
    expect_args(args, 1, &format!("PkgConfig.{fn_name}"))?;
    let module = expect_str(&args[0], &format!("PkgConfig.{fn_name} module"))?;

    if !cmd_exists("pkg-config") {
        return Err(HostError::Custom(
            "PkgConfig: couldn't find 'pkg-config' executable in PATH; it must be installed separately".to_string(),
        ));
    }

    let mut cmd = Command::new("pkg-config");
    cmd.arg(flag).arg(&module);

    let output = run_captured(&mut cmd).map_err(|e| HostError::Custom(format!("PkgConfig.{fn_name}: {e}")))?;

    if !output.success() {
        return Err(HostError::Custom(format!(
            "PkgConfig.{fn_name}: pkg-config failed:\n{}",
            output.stdout_string()
        )));
    }

    let tokens = output.stdout_string().split_whitespace().map(str::to_string).collect::<Vec<_>>();
    Ok(str_vec_val(tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use script::value::{new_ref, Value};

    #[test]
    fn wrong_arg_count_errors() {
        let pkg = PkgConfig;
        assert!(pkg.call_function("cflags", &[]).is_err());
    }

    #[test]
    fn unknown_function_errors() {
        let pkg = PkgConfig;
        let arg = new_ref(Value::Str(b"zlib".to_vec()));
        assert!(pkg.call_function("ldflags", &[arg]).is_err());
    }
}
