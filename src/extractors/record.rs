//! Extraction output
//!
//! Records keep their keys in a fixed order when serialized: `type`, section
//! metadata, fields in rule order, then `items`.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{Error, Result};
use crate::rules::{Field, OptionSet, OptionValue, VALUE};

/// One extracted value, or several when more than one element matched
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum Extracted {
    One(String),
    Many(Vec<String>),
}

impl Extracted {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Extracted::One(s) => Some(s),
            Extracted::Many(_) => None,
        }
    }
}

/// A value plus passthrough metadata copied from options.
///
/// Serializes as the bare value when there is no metadata, otherwise as a map
/// with the value under `value`. The `value` slot is write-once.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged<T> {
    value: Option<T>,
    metadata: Vec<(String, OptionValue)>,
}

impl<T> Tagged<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Some(value),
            metadata: Vec::new(),
        }
    }

    /// Wrap `value` and copy every non-executable option onto it.
    pub fn with_passthrough(value: T, options: &OptionSet) -> Result<Self> {
        let mut tagged = Self::new(value);
        for (key, option) in options.passthrough() {
            tagged.insert(key, option.clone())?;
        }
        Ok(tagged)
    }

    pub fn set_value(&mut self, value: T) -> Result<()> {
        if self.value.is_some() {
            return Err(Error::ValueOverwrite);
        }
        self.value = Some(value);
        Ok(())
    }

    /// Attach metadata. Writing `value` through here is an invariant
    /// violation; other keys keep their first value.
    pub fn insert(&mut self, key: &str, option: OptionValue) -> Result<()> {
        if key == VALUE {
            return Err(Error::ValueOverwrite);
        }
        if !self.metadata.iter().any(|(k, _)| k == key) {
            self.metadata.push((key.to_string(), option));
        }
        Ok(())
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn metadata(&self, key: &str) -> Option<&OptionValue> {
        self.metadata.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_bare(&self) -> bool {
        self.metadata.is_empty()
    }
}

impl<T: Serialize> Serialize for Tagged<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.metadata.is_empty() {
            return self.value.serialize(serializer);
        }
        let mut map = serializer.serialize_map(Some(self.metadata.len() + 1))?;
        map.serialize_entry(VALUE, &self.value)?;
        for (key, option) in &self.metadata {
            map.serialize_entry(key, option)?;
        }
        map.end()
    }
}

pub type FieldValues = Vec<(Field, Tagged<Extracted>)>;

fn lookup(fields: &FieldValues, field: Field) -> Option<&Tagged<Extracted>> {
    fields.iter().find(|(f, _)| *f == field).map(|(_, v)| v)
}

/// One repeated child extracted through an item template
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub fields: FieldValues,
}

impl Item {
    pub fn get(&self, field: Field) -> Option<&Tagged<Extracted>> {
        lookup(&self.fields, field)
    }

    /// Scalar value of a field, ignoring metadata
    pub fn text(&self, field: Field) -> Option<&str> {
        self.get(field)?.value()?.as_str()
    }
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, value) in &self.fields {
            map.serialize_entry(field.as_str(), value)?;
        }
        map.end()
    }
}

/// One matched section
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Name of the section rule that produced this record
    pub section: String,
    pub metadata: Vec<(String, OptionValue)>,
    pub fields: FieldValues,
    pub items: Option<Tagged<Vec<Item>>>,
}

impl Record {
    pub fn get(&self, field: Field) -> Option<&Tagged<Extracted>> {
        lookup(&self.fields, field)
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        self.get(field)?.value()?.as_str()
    }

    pub fn items(&self) -> &[Item] {
        self.items
            .as_ref()
            .and_then(Tagged::value)
            .map_or(&[], Vec::as_slice)
    }

    /// Keys a section option cannot use as record metadata
    pub fn is_reserved_key(key: &str) -> bool {
        key == "type" || key == "items" || Field::parse(key).is_some()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = 1 + self.metadata.len() + self.fields.len() + usize::from(self.items.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("type", &self.section)?;
        for (key, option) in &self.metadata {
            map.serialize_entry(key, option)?;
        }
        for (field, value) in &self.fields {
            map.serialize_entry(field.as_str(), value)?;
        }
        if let Some(items) = &self.items {
            map.serialize_entry("items", items)?;
        }
        map.end()
    }
}
