use std::collections::BTreeMap;
use std::rc::Rc;

use crate::value::{ClassDef, HostValue, Instance, ValueRef};

/// Identifies which registered host class backs a `ClassDef`, so `call` and
/// `instantiate` dispatch reach the right extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HostClassId(pub u32);

#[derive(Debug)]
pub enum HostError {
    Custom(String),
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::Custom(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for HostError {}

/// The three callbacks every host extension provides, named to match the
/// `populate` / `call` / `instantiate` triple a build-system class
/// implements.
pub trait HostClass {
    fn name(&self) -> &str;

    /// Declares any static members or nested classes onto `class` before
    /// instances can be created. Most classes have nothing to add here.
    fn populate(&self, _class: &ClassDef) -> Result<(), HostError> {
        Ok(())
    }

    /// Validates constructor arguments and returns the opaque per-instance
    /// state stored on the `Instance`.
    fn instantiate(&self, args: &[ValueRef]) -> Result<Rc<dyn HostValue>, HostError>;

    /// Dispatches a method call by name against an instance's host state.
    fn call(&self, instance: &Instance, method: &str, args: &[ValueRef]) -> Result<ValueRef, HostError>;

    /// Dispatches a call to an `external fn` bound directly to this
    /// extension rather than to a class instance.
    fn call_function(&self, _name: &str, _args: &[ValueRef]) -> Result<ValueRef, HostError> {
        Err(HostError::Custom("extension does not export functions".to_string()))
    }
}

/// Registry of host extensions keyed by name, consulted whenever the
/// interpreter meets an `external class` or `external fn` declaration.
#[derive(Default)]
pub struct HostRegistry {
    classes: Vec<Rc<dyn HostClass>>,
    by_name: BTreeMap<String, HostClassId>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: Rc<dyn HostClass>) -> HostClassId {
        let id = HostClassId(self.classes.len() as u32);
        self.by_name.insert(class.name().to_string(), id);
        self.classes.push(class);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<HostClassId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: HostClassId) -> &dyn HostClass {
        self.classes[id.0 as usize].as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{new_ref, Value};

    struct Noop;

    impl HostClass for Noop {
        fn name(&self) -> &str {
            "Noop"
        }

        fn instantiate(&self, _args: &[ValueRef]) -> Result<Rc<dyn HostValue>, HostError> {
            struct State;
            impl HostValue for State {
                fn type_name(&self) -> &'static str {
                    "Noop"
                }
                fn display(&self) -> String {
                    "<Noop>".to_string()
                }
                fn as_any(&self) -> &dyn std::any::Any {
                    self
                }
            }
            Ok(Rc::new(State))
        }

        fn call(&self, _instance: &Instance, _method: &str, _args: &[ValueRef]) -> Result<ValueRef, HostError> {
            Ok(new_ref(Value::None))
        }
    }

    #[test]
    fn registry_lookup_roundtrip() {
        let mut reg = HostRegistry::new();
        let id = reg.register(Rc::new(Noop));
        assert_eq!(reg.lookup("Noop"), Some(id));
        assert_eq!(reg.get(id).name(), "Noop");
    }
}
