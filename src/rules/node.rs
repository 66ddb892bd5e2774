//! Compiled rule nodes
//!
//! A node is built once through [`RuleNodeBuilder`] and is read-only from then
//! on. The builder enforces first-write-wins for every slot.

use std::fmt;

use serde::Serialize;

use super::options::OptionSet;

/// The three value kinds a rule can extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Text,
    Img,
    Link,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Text, Field::Img, Field::Link];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Text => "text",
            Field::Img => "img",
            Field::Link => "link",
        }
    }

    /// Case-insensitive lookup by DSL keyword
    pub fn parse(name: &str) -> Option<Field> {
        Field::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(name))
    }

    /// Attribute read when no `attr` chain is configured
    pub fn default_attr(self) -> Option<&'static str> {
        match self {
            Field::Text => None,
            Field::Img => Some("src"),
            Field::Link => Some("href"),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One compiled section, or the item template nested inside a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleNode {
    name: String,
    selector: String,
    field_selectors: Vec<(Field, String)>,
    field_options: Vec<(Field, OptionSet)>,
    item_template: Option<Box<RuleNode>>,
    section_options: OptionSet,
}

impl RuleNode {
    pub fn builder(name: impl Into<String>, selector: impl Into<String>) -> RuleNodeBuilder {
        RuleNodeBuilder::new(name, selector)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn field_selector(&self, field: Field) -> Option<&str> {
        self.field_selectors
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, s)| s.as_str())
    }

    /// Fields that carry a selector, in declaration order
    pub fn field_selectors(&self) -> impl Iterator<Item = (Field, &str)> {
        self.field_selectors.iter().map(|(f, s)| (*f, s.as_str()))
    }

    pub fn field_options(&self, field: Field) -> Option<&OptionSet> {
        self.field_options
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, o)| o)
    }

    pub fn item_template(&self) -> Option<&RuleNode> {
        self.item_template.as_deref()
    }

    pub fn section_options(&self) -> &OptionSet {
        &self.section_options
    }
}

impl fmt::Display for RuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {{", self.name, self.selector)?;
        for (field, selector) in &self.field_selectors {
            write!(f, " {}: {};", field, selector)?;
        }
        if let Some(items) = &self.item_template {
            write!(f, " items: {}", items)?;
        }
        f.write_str(" }")
    }
}

#[derive(Debug, Clone)]
pub struct RuleNodeBuilder {
    node: RuleNode,
}

impl RuleNodeBuilder {
    pub fn new(name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            node: RuleNode {
                name: name.into(),
                selector: selector.into(),
                field_selectors: Vec::new(),
                field_options: Vec::new(),
                item_template: None,
                section_options: OptionSet::new(),
            },
        }
    }

    pub fn has_field_selector(&self, field: Field) -> bool {
        self.node.field_selector(field).is_some()
    }

    /// Returns false when the field already has a selector.
    pub fn field_selector(&mut self, field: Field, selector: impl Into<String>) -> bool {
        if self.has_field_selector(field) {
            return false;
        }
        self.node.field_selectors.push((field, selector.into()));
        true
    }

    /// Returns false when the field already has options.
    pub fn field_options(&mut self, field: Field, options: OptionSet) -> bool {
        if self.node.field_options(field).is_some() {
            return false;
        }
        self.node.field_options.push((field, options));
        true
    }

    /// Attach the item template. Refused when one is already attached or
    /// when the template carries its own nested items.
    pub fn item_template(&mut self, template: RuleNode) -> bool {
        if self.node.item_template.is_some() || template.item_template.is_some() {
            return false;
        }
        self.node.item_template = Some(Box::new(template));
        true
    }

    pub fn has_item_template(&self) -> bool {
        self.node.item_template.is_some()
    }

    /// Merge options into the section-level set, keeping existing keys.
    pub fn section_options(&mut self, options: OptionSet) -> &mut Self {
        for (key, value) in options.iter() {
            self.node.section_options.insert(key, value.clone());
        }
        self
    }

    pub fn build(self) -> RuleNode {
        self.node
    }
}
