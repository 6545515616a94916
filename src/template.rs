//! # Template Documents and Fragments
//!
//! This module defines the document model shared by every fragment builder
//! and by the composer.
//!
//! ## Key Components
//!
//! - **`Resource`**: one entry of the `Resources` section (`Type`,
//!   `Properties`, optional `DependsOn`). Any other attribute, such as
//!   `DeletionPolicy` or `Condition`, is carried through untouched.
//! - **`Fragment`**: an ordered map of logical id to resource. Fragments are
//!   pure values; merging two fragments is deterministic and refuses to
//!   silently replace an existing resource with a different one.
//! - **`Template`**: the full document with `Parameters`, `Resources` and
//!   `Outputs`, plus any other top-level section (`Conditions`, `Mappings`).
//!
//! Cross-references between resources are string-keyed (`Ref`,
//! `Fn::GetAtt`, `Fn::Sub`), so every builder derives logical ids with the
//! same rule: a fixed prefix followed by [`pascal_case`] of a name.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Template format version written at the top of every document.
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Upper-case the first character of `name`, leaving the rest untouched.
///
/// ```
/// use routestack::template::pascal_case;
///
/// assert_eq!(pascal_case("listUsers"), "ListUsers");
/// assert_eq!(pascal_case(""), "");
/// ```
pub fn pascal_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `{ "Ref": id }`
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{ "Fn::GetAtt": [id, attribute] }`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{ "Fn::Sub": template }`
pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

/// `{ "Fn::Join": ["", parts] }`
pub fn join(parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": ["", parts] })
}

/// A single resource description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(
        rename = "DependsOn",
        default,
        deserialize_with = "deserialize_depends_on",
        skip_serializing_if = "Option::is_none"
    )]
    pub depends_on: Option<Vec<String>>,
    #[serde(rename = "Properties", default)]
    pub properties: Value,
    /// `DeletionPolicy`, `Condition`, `Metadata` and the like
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

/// `DependsOn` may be a single logical id or a list of them.
fn deserialize_depends_on<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }
    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::One(logical_id)) => Some(vec![logical_id]),
        Some(Raw::Many(logical_ids)) => Some(logical_ids),
    })
}

impl Resource {
    pub fn new(resource_type: &str, properties: Value) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            depends_on: None,
            properties,
            attributes: BTreeMap::new(),
        }
    }

    /// Attach an explicit dependency list.
    pub fn depends_on(mut self, logical_ids: Vec<String>) -> Self {
        self.depends_on = Some(logical_ids);
        self
    }
}

/// An ordered, conflict-checked set of resources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    resources: BTreeMap<String, Resource>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fragment holding exactly one resource.
    pub fn single(logical_id: impl Into<String>, resource: Resource) -> Self {
        let mut resources = BTreeMap::new();
        resources.insert(logical_id.into(), resource);
        Self { resources }
    }

    /// Builder-style insert for fragments whose logical ids are fixed
    /// constants and distinct by construction.
    pub fn with(mut self, logical_id: impl Into<String>, resource: Resource) -> Self {
        self.resources.insert(logical_id.into(), resource);
        self
    }

    /// Insert a resource.
    ///
    /// Re-inserting an identical resource is a no-op, which is what lets many
    /// route bindings share one content model. A different resource under an
    /// existing id is a [`Error::FragmentConflict`].
    pub fn insert(&mut self, logical_id: impl Into<String>, resource: Resource) -> Result<()> {
        let logical_id = logical_id.into();
        match self.resources.get(&logical_id) {
            Some(existing) if *existing == resource => Ok(()),
            Some(_) => Err(Error::FragmentConflict { logical_id }),
            None => {
                self.resources.insert(logical_id, resource);
                Ok(())
            }
        }
    }

    /// Merge every resource of `other` into `self` with [`Fragment::insert`] semantics.
    pub fn merge(&mut self, other: Fragment) -> Result<()> {
        for (logical_id, resource) in other.resources {
            self.insert(logical_id, resource)?;
        }
        Ok(())
    }

    pub fn get(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.resources.contains_key(logical_id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn logical_ids(&self) -> impl Iterator<Item = &String> {
        self.resources.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Resource)> {
        self.resources.iter()
    }

    pub fn into_resources(self) -> BTreeMap<String, Resource> {
        self.resources
    }
}

/// A named output value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    #[serde(rename = "Value")]
    pub value: Value,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `Export`, `Condition`
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl Output {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            description: None,
            attributes: BTreeMap::new(),
        }
    }
}

/// A complete deployable document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Parameters", default)]
    pub parameters: BTreeMap<String, Value>,
    #[serde(rename = "Resources", default)]
    pub resources: BTreeMap<String, Resource>,
    #[serde(rename = "Outputs", default)]
    pub outputs: BTreeMap<String, Output>,
    /// `Conditions`, `Mappings`, `Metadata`, `Transform`
    #[serde(flatten)]
    pub sections: BTreeMap<String, Value>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: None,
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
            sections: BTreeMap::new(),
        }
    }
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every resource of `fragment`, refusing conflicting redefinitions.
    pub fn add_fragment(&mut self, fragment: Fragment) -> Result<()> {
        for (logical_id, resource) in fragment.into_resources() {
            match self.resources.get(&logical_id) {
                Some(existing) if *existing == resource => {}
                Some(_) => return Err(Error::FragmentConflict { logical_id }),
                None => {
                    self.resources.insert(logical_id, resource);
                }
            }
        }
        Ok(())
    }

    /// Deep-merge an arbitrary document over this template.
    ///
    /// This is the intentional-override path used for user supplied
    /// fragments: objects merge key by key, everything else is replaced.
    pub fn overlay(&mut self, document: &Value) -> Result<()> {
        let mut merged = serde_json::to_value(&*self)?;
        deep_merge(&mut merged, document);
        *self = serde_json::from_value(merged)?;
        Ok(())
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Recursively merge `source` into `target`.
///
/// - Objects: keys are merged recursively; source wins on scalar conflicts
/// - Arrays and scalars: source replaces target
/// - `null` in source leaves the target untouched
pub fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (_, Value::Null) => {}
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}
