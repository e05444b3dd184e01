//! `Fs` host class: filesystem helpers exported as plain functions on the
//! class itself (`Fs.list(dir)`, `Fs.exists(path)`), never instantiated.

use std::path::Path;
use std::rc::Rc;

use script::value::{HostValue, ValueRef};
use script::{HostClass, HostError};

use crate::convert::{expect_args, expect_str, str_vec_val};

pub struct Fs;

impl HostClass for Fs {
    fn name(&self) -> &str {
        "Fs"
    }

    fn instantiate(&self, _args: &[ValueRef]) -> Result<Rc<dyn HostValue>, HostError> {
        Err(HostError::Custom("Fs cannot be instantiated".to_string()))
    }

    fn call(&self, _instance: &script::value::Instance, method: &str, _args: &[ValueRef]) -> Result<ValueRef, HostError> {
        Err(HostError::Custom(format!("Fs has no instance method '{method}'")))
    }

    fn call_function(&self, name: &str, args: &[ValueRef]) -> Result<ValueRef, HostError> {
        match name {
            "list" => list(args),
            "exists" => exists(args),
            other => Err(HostError::Custom(format!("Fs has no function '{other}'"))),
        }
    }
}

/// Recursively lists everything under `dir`, root entry included, in
/// pre-order with each directory level sorted alphabetically.
fn list(args: &[ValueRef]) -> Result<ValueRef, HostError> {
    expect_args(args, 1, "Fs.list")?;
    let dir = expect_str(&args[0], "Fs.list directory")?;

    let mut paths = Vec::new();
    walk(Path::new(&dir), &mut paths).map_err(|e| HostError::Custom(format!("Fs.list: couldn't walk '{dir}': {e}")))?;
    Ok(str_vec_val(paths))
}

fn walk(path: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
    out.push(path.to_string_lossy().into_owned());

    let meta = fs_err::symlink_metadata(path)?;
    let is_dir = if meta.is_symlink() {
        fs_err::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    } else {
        meta.is_dir()
    };

    if !is_dir {
        return Ok(());
    }

    let mut children: Vec<_> = fs_err::read_dir(path)?.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    children.sort();

    for child in children {
        walk(&child, out)?;
    }

    Ok(())
}

fn exists(args: &[ValueRef]) -> Result<ValueRef, HostError> {
    expect_args(args, 1, "Fs.exists")?;
    let path = expect_str(&args[0], "Fs.exists path")?;
    Ok(script::value::new_ref(script::value::Value::Bool(Path::new(&path).exists())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use script::value::{new_ref, Value};

    #[test]
    fn exists_reports_missing_path() {
        let fs = Fs;
        let arg = new_ref(Value::Str(b"/no/such/path".to_vec()));
        let result = fs.call_function("exists", &[arg]).unwrap();
        assert!(matches!(&*result.borrow(), Value::Bool(false)));
    }

    #[test]
    fn unknown_function_errors() {
        let fs = Fs;
        assert!(fs.call_function("frobnicate", &[]).is_err());
    }

    #[test]
    fn list_walks_recursively_in_alpha_order() {
        let dir = tempfile::tempdir().unwrap();
        fs_err::create_dir(dir.path().join("b")).unwrap();
        fs_err::write(dir.path().join("a.txt"), "").unwrap();
        fs_err::write(dir.path().join("b/c.txt"), "").unwrap();

        let fs = Fs;
        let arg = new_ref(Value::Str(dir.path().to_string_lossy().into_owned().into_bytes()));
        let result = fs.call_function("list", &[arg]).unwrap();

        let Value::Vec(items) = &*result.borrow() else { panic!("expected a vector") };
        let rendered: Vec<String> = items.iter().map(|v| v.borrow().render()).collect();

        assert_eq!(rendered.len(), 4);
        assert!(rendered[0].ends_with(dir.path().file_name().unwrap().to_str().unwrap()));
        assert!(rendered.iter().any(|p| p.ends_with("b/c.txt")));
    }
}
