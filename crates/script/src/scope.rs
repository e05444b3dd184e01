use std::cell::RefCell;
use std::rc::Rc;

use crate::value::ValueRef;

/// A declared variable. Kept as a `Vec` entry rather than hashed by name so
/// declaration order survives for diagnostics and for `self`-lookup
/// shadowing rules, mirroring the original interpreter's array-based scope.
pub struct Variable {
    pub name: String,
    pub value: ValueRef,
    /// Declarations made with an explicit `: type` annotation reject
    /// assignments of a different primitive type.
    pub ty: Option<String>,
}

#[derive(Default)]
pub struct ScopeData {
    vars: Vec<Variable>,
}

impl ScopeData {
    pub fn declare(&mut self, name: String, value: ValueRef, ty: Option<String>) {
        if let Some(existing) = self.vars.iter_mut().find(|v| v.name == name) {
            existing.value = value;
            existing.ty = ty;
        } else {
            self.vars.push(Variable { name, value, ty });
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.vars.iter().find(|v| v.name == name)
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.vars.iter_mut().find(|v| v.name == name)
    }
}

pub type ScopeRef = Rc<RefCell<ScopeData>>;

pub fn new_scope() -> ScopeRef {
    Rc::new(RefCell::new(ScopeData::default()))
}
