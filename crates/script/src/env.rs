use crate::scope::{new_scope, ScopeRef};
use crate::value::ValueRef;

/// A stack of lexical scopes. Cloning an `Environment` clones the `Rc`
/// pointers only, so a closure snapshot shares mutations with the defining
/// scope exactly as the enclosing function body does.
#[derive(Clone)]
pub struct Environment {
    scopes: Vec<ScopeRef>,
}

impl Environment {
    pub fn new() -> Self {
        Self { scopes: vec![new_scope()] }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(new_scope());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        assert!(!self.scopes.is_empty(), "popped the top-level scope");
    }

    pub fn declare(&self, name: &str, value: ValueRef, ty: Option<String>) {
        self.scopes
            .last()
            .expect("environment always has a scope")
            .borrow_mut()
            .declare(name.to_string(), value, ty);
    }

    pub fn get(&self, name: &str) -> Option<ValueRef> {
        for scope in self.scopes.iter().rev() {
            if let Some(var) = scope.borrow().lookup(name) {
                return Some(var.value.clone());
            }
        }
        None
    }

    pub fn declared_type(&self, name: &str) -> Option<String> {
        for scope in self.scopes.iter().rev() {
            if let Some(var) = scope.borrow().lookup(name) {
                return var.ty.clone();
            }
        }
        None
    }

    /// Rebinds an existing variable in whichever scope it was declared in;
    /// `false` if no such variable is visible.
    pub fn assign(&self, name: &str, value: ValueRef) -> bool {
        for scope in self.scopes.iter().rev() {
            let mut scope = scope.borrow_mut();
            if let Some(var) = scope.lookup_mut(name) {
                var.value = value;
                return true;
            }
        }
        false
    }

    /// Snapshot of the current scope chain, used to give a script-defined
    /// function its lexical closure at definition time.
    pub fn snapshot(&self) -> Environment {
        Environment {
            scopes: self.scopes.clone(),
        }
    }

    /// Entered when invoking a closure: the closure's captured scopes plus a
    /// fresh call scope on top, so the call doesn't leak locals back into
    /// the closure.
    pub fn call_frame(&self) -> Environment {
        let mut env = self.snapshot();
        env.push_scope();
        env
    }

    pub fn top_level(&self) -> ScopeRef {
        self.scopes[0].clone()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{new_ref, Value};

    #[test]
    fn shadowing_and_lookup() {
        let mut env = Environment::new();
        env.declare("x", new_ref(Value::Int(1)), None);
        env.push_scope();
        env.declare("x", new_ref(Value::Int(2)), None);
        assert_eq!(env.get("x").unwrap().borrow().render(), "2");
        env.pop_scope();
        assert_eq!(env.get("x").unwrap().borrow().render(), "1");
    }

    #[test]
    fn closure_shares_mutation() {
        let mut env = Environment::new();
        env.declare("counter", new_ref(Value::Int(0)), None);
        let closure = env.snapshot();
        assert!(closure.assign("counter", new_ref(Value::Int(5))));
        assert_eq!(env.get("counter").unwrap().borrow().render(), "5");
    }
}
