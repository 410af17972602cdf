use std::collections::HashMap;

/// alias, we use String as key everywhere in the project
pub type Env<T> = HashMap<String, T>;

/// Stack of lexical scope frames. A frame is opened on function entry and
/// on each `if` arm; lookups walk from the innermost frame outwards, so
/// inner definitions shadow outer ones. Definitions always go into the
/// innermost frame.
#[derive(Debug, Default)]
pub struct ScopeStack<T> {
    frames: Vec<Env<T>>,
}

impl<T> ScopeStack<T> {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn begin_scope(&mut self) {
        self.frames.push(Env::new());
    }

    pub fn end_scope(&mut self) {
        self.frames.pop();
    }

    /// bind a name in the innermost frame, shadowing any outer binding
    pub fn define(&mut self, name: String, value: T) {
        self.frames
            .last_mut()
            .expect("definition outside of any scope")
            .insert(name, value);
    }

    /// variables can be shadowed, so we start searching from the top
    pub fn get(&self, name: &str) -> Option<&T> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_frames_shadow_outer_ones() {
        let mut scopes = ScopeStack::new();
        scopes.begin_scope();
        scopes.define(String::from("x"), 1);
        scopes.begin_scope();
        scopes.define(String::from("x"), 2);

        assert_eq!(scopes.get("x"), Some(&2));
        scopes.end_scope();
        assert_eq!(scopes.get("x"), Some(&1));
    }

    #[test]
    fn lookup_reaches_through_frames() {
        let mut scopes = ScopeStack::new();
        scopes.begin_scope();
        scopes.define(String::from("a"), 1);
        scopes.begin_scope();

        assert_eq!(scopes.get("a"), Some(&1));
        assert_eq!(scopes.get("b"), None);
    }
}
