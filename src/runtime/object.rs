use indexmap::IndexMap;

use crate::runtime::error::EvalError;
use crate::runtime::value::Value;

/// Property slot: the value plus the flags a descriptor carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub value: Value,
    pub writable: bool,
    pub configurable: bool,
    pub enumerable: bool,
}

impl Descriptor {
    fn new(value: Value) -> Descriptor {
        Descriptor {
            value,
            writable: true,
            configurable: true,
            enumerable: true,
        }
    }
}

/// String-keyed property map with insertion-order iteration. `freeze`
/// rejects every write; `seal` rejects new keys but lets existing ones
/// change.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Object {
    values: IndexMap<String, Descriptor>,
    frozen: bool,
    sealed: bool,
}

impl Object {
    pub fn new() -> Object {
        Object::default()
    }

    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Object {
        let mut object = Object::new();
        for (key, value) in pairs {
            object.values.insert(key, Descriptor::new(value));
        }
        object
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Own property, then `length`, then Undefined.
    pub fn get(&self, prop: &str) -> Value {
        if let Some(descriptor) = self.values.get(prop) {
            return descriptor.value.clone();
        }
        if prop == "length" {
            return Value::Number(self.values.len() as f64);
        }
        Value::Undefined
    }

    pub fn get_own(&self, prop: &str) -> Option<Value> {
        self.values.get(prop).map(|d| d.value.clone())
    }

    pub fn contains(&self, prop: &str) -> bool {
        self.values.contains_key(prop)
    }

    pub fn set(&mut self, prop: &str, value: Value) -> Result<(), EvalError> {
        if self.frozen {
            return Err(EvalError::Operation);
        }
        if let Some(descriptor) = self.values.get_mut(prop) {
            if !descriptor.writable {
                return Err(EvalError::Operation);
            }
            descriptor.value = value;
            return Ok(());
        }
        if self.sealed {
            return Err(EvalError::Operation);
        }
        self.values.insert(prop.to_string(), Descriptor::new(value));
        Ok(())
    }

    /// Enumerable keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.values
            .iter()
            .filter(|(_, d)| d.enumerable)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.values
            .iter()
            .filter(|(_, d)| d.enumerable)
            .map(|(k, d)| (k.clone(), d.value.clone()))
            .collect()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Object {
        Object::from_pairs(vec![
            ("a".to_string(), Value::Number(1.0)),
            ("b".to_string(), Value::Number(2.0)),
        ])
    }

    #[test]
    fn keys_keep_insertion_order() {
        let mut object = sample();
        object.set("c", Value::Number(3.0)).expect("set");
        assert_eq!(object.keys(), vec!["a", "b", "c"]);
    }

    #[test]
    fn missing_properties_read_as_undefined() {
        let object = sample();
        assert_eq!(object.get("zzz"), Value::Undefined);
        assert_eq!(object.get("length"), Value::Number(2.0));
    }

    #[test]
    fn own_property_shadows_length() {
        let mut object = sample();
        object.set("length", Value::Number(99.0)).expect("set");
        assert_eq!(object.get("length"), Value::Number(99.0));
    }

    #[test]
    fn frozen_objects_reject_every_write() {
        let mut object = sample();
        object.freeze();
        assert!(object.set("a", Value::Number(9.0)).is_err());
        assert!(object.set("new", Value::Number(9.0)).is_err());
    }

    #[test]
    fn sealed_objects_reject_only_new_keys() {
        let mut object = sample();
        object.seal();
        object.set("a", Value::Number(9.0)).expect("update existing");
        assert!(object.set("new", Value::Number(9.0)).is_err());
        assert_eq!(object.get("a"), Value::Number(9.0));
    }

    #[test]
    fn updates_keep_the_original_position() {
        let mut object = sample();
        object.set("a", Value::Number(7.0)).expect("update");
        assert_eq!(object.keys(), vec!["a", "b"]);
    }
}
