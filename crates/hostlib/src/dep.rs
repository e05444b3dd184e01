//! `Dep` host class: the only host class a `build.fl` script is expected to
//! instantiate directly rather than call through. Each instance just carries
//! enough to be converted into a [`depgraph::DepSpec`] once the script has
//! finished running and the top-level `deps` vector is read back out.

use std::rc::Rc;

use script::value::{HostValue, Instance, ValueRef};
use script::{HostClass, HostError};

use crate::convert::expect_str;

#[derive(Debug, Clone)]
pub enum DepState {
    Local { path: String },
    Git { url: String, branch: String },
}

impl HostValue for DepState {
    fn type_name(&self) -> &'static str {
        "Dep"
    }

    fn display(&self) -> String {
        match self {
            DepState::Local { path } => format!("<Dep local {path}>"),
            DepState::Git { url, branch } => format!("<Dep git {url}@{branch}>"),
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub struct Dep;

impl HostClass for Dep {
    fn name(&self) -> &str {
        "Dep"
    }

    fn instantiate(&self, args: &[ValueRef]) -> Result<Rc<dyn HostValue>, HostError> {
        if args.is_empty() {
            return Err(HostError::Custom(
                "Dep: expected a kind (\"local\" or \"git\") as the first argument".to_string(),
            ));
        }

        let kind = expect_str(&args[0], "Dep kind")?;

        match kind.as_str() {
            "local" => {
                if args.len() != 2 {
                    return Err(HostError::Custom(format!(
                        "Dep(\"local\", path) takes 2 arguments, got {}",
                        args.len()
                    )));
                }
                let path = expect_str(&args[1], "Dep local path")?;
                Ok(Rc::new(DepState::Local { path }))
            }
            "git" => {
                if args.len() != 3 {
                    return Err(HostError::Custom(format!(
                        "Dep(\"git\", url, branch) takes 3 arguments, got {}",
                        args.len()
                    )));
                }
                let url = expect_str(&args[1], "Dep git url")?;
                let branch = expect_str(&args[2], "Dep git branch")?;
                Ok(Rc::new(DepState::Git { url, branch }))
            }
            other => Err(HostError::Custom(format!(
                "Dep: unknown kind '{other}', expected \"local\" or \"git\""
            ))),
        }
    }

    fn call(&self, _instance: &Instance, method: &str, _args: &[ValueRef]) -> Result<ValueRef, HostError> {
        Err(HostError::Custom(format!("Dep has no instance method '{method}'")))
    }
}

/// Converts a script-side `Dep` instance back into the plain [`depgraph::DepSpec`]
/// the resolver works with. Returns `None` if `inst` isn't backed by [`DepState`]
/// (which should never happen for anything found inside the `deps` vector, since
/// only this class's `instantiate` ever produces that state).
pub fn to_dep_spec(inst: &Instance) -> Option<depgraph::DepSpec> {
    let state_rc = inst.host_state.borrow().clone()?;
    let state = state_rc.as_any().downcast_ref::<DepState>()?.clone();
    Some(match state {
        DepState::Local { path } => depgraph::DepSpec::Local { path },
        DepState::Git { url, branch } => depgraph::DepSpec::Git { url, branch },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use script::value::{new_ref, Value};

    fn str_arg(s: &str) -> ValueRef {
        new_ref(Value::Str(s.as_bytes().to_vec()))
    }

    #[test]
    fn local_dep_round_trips() {
        let dep = Dep;
        let state = dep.instantiate(&[str_arg("local"), str_arg("../zlib")]).unwrap();
        let inst = Instance {
            class: Rc::new(script::value::ClassDef {
                name: "Dep".to_string(),
                body: script::ast::Block { stmts: Vec::new() },
                methods: Default::default(),
                static_methods: Default::default(),
                host_id: None,
            }),
            fields: Default::default(),
            host_state: std::cell::RefCell::new(Some(state)),
        };
        match to_dep_spec(&inst).unwrap() {
            depgraph::DepSpec::Local { path } => assert_eq!(path, "../zlib"),
            depgraph::DepSpec::Git { .. } => panic!("expected local dep"),
        }
    }

    #[test]
    fn git_dep_requires_branch() {
        let dep = Dep;
        assert!(dep.instantiate(&[str_arg("git"), str_arg("https://example.com/x.git")]).is_err());
    }

    #[test]
    fn unknown_kind_errors() {
        let dep = Dep;
        assert!(dep.instantiate(&[str_arg("svn"), str_arg("x")]).is_err());
    }
}
