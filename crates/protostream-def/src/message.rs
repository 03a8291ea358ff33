use std::collections::HashMap;

use crate::field::FieldDescriptor;

/// A message type: qualified name and fields in declared order.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDef {
    name: String,
    fields: Vec<FieldDescriptor>,
    by_number: HashMap<u32, usize>,
}

impl MessageDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            by_number: HashMap::new(),
        }
    }

    /// Append a field. Declaration order is the encoding order.
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.push_field(field);
        self
    }

    pub fn push_field(&mut self, field: FieldDescriptor) {
        // First declaration wins the index; the registry builder rejects
        // the duplicate before the definition becomes usable.
        let idx = self.fields.len();
        self.by_number.entry(field.number()).or_insert(idx);
        self.fields.push(field);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field with `number`, in O(1).
    pub fn lookup_field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|&idx| &self.fields[idx])
    }

    /// Fields in declared order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [FieldDescriptor] {
        &mut self.fields
    }
}
