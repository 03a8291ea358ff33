use std::collections::{BTreeMap, HashMap};

/// An enum type: integer values and their symbolic names.
///
/// The definition is informational only. Integers without a name still
/// decode and are carried as raw values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    name: String,
    names_by_value: BTreeMap<i32, String>,
    values_by_name: HashMap<String, i32>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            names_by_value: BTreeMap::new(),
            values_by_name: HashMap::new(),
        }
    }

    /// Add a named value. Aliases are allowed; the first name given for a
    /// number is the one reported by [`EnumDef::name_of`].
    pub fn with_value(mut self, name: impl Into<String>, value: i32) -> Self {
        let name = name.into();
        self.names_by_value
            .entry(value)
            .or_insert_with(|| name.clone());
        self.values_by_name.insert(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_of(&self, value: i32) -> Option<&str> {
        self.names_by_value.get(&value).map(String::as_str)
    }

    pub fn value_of(&self, name: &str) -> Option<i32> {
        self.values_by_name.get(name).copied()
    }

    /// `(value, name)` pairs in ascending value order.
    pub fn values(&self) -> impl Iterator<Item = (i32, &str)> {
        self.names_by_value
            .iter()
            .map(|(value, name)| (*value, name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_both_ways() {
        let color = EnumDef::new("test.Color")
            .with_value("RED", 0)
            .with_value("GREEN", 1)
            .with_value("VERDE", 1);

        assert_eq!(color.name_of(0), Some("RED"));
        assert_eq!(color.name_of(1), Some("GREEN"));
        assert_eq!(color.value_of("VERDE"), Some(1));
        assert_eq!(color.name_of(7), None);
        assert_eq!(color.values().count(), 2);
    }
}
