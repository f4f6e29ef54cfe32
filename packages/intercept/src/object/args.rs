// packages/intercept/src/object/args.rs
//! Call arguments

use crate::object::Value;

/// Positional and keyword arguments, both in caller order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Add a keyword argument, replacing an earlier one with the same name
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.keywords.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.keywords.push((name, value)),
        }
        self
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_order() {
        let args = Args::new().arg(1).arg("two").kwarg("b", true).kwarg("a", 0.5);
        assert_eq!(args.positional, vec![Value::Int(1), Value::from("two")]);
        let names: Vec<&str> = args.keywords.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_repeated_keyword_replaces() {
        let args = Args::new().kwarg("label", "Go").kwarg("label", "Stop");
        assert_eq!(args.keywords.len(), 1);
        assert_eq!(args.keyword("label"), Some(&Value::from("Stop")));
        assert!(!args.is_empty());
        assert!(Args::new().is_empty());
    }
}
