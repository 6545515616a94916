//! # Route Path Resolution
//!
//! Turns slash-delimited route paths such as `users/{id}/posts` into a tree
//! of routing nodes and emits one `AWS::ApiGateway::Resource` per node.
//!
//! ## Naming
//!
//! - Literal segments are stripped of every non-alphanumeric character and
//!   their first character is upper-cased: `user-list` becomes `Userlist`.
//! - `{name}` segments use the parameter name: `{id}` becomes `Id`.
//! - Greedy `{name+}` segments replace the `+` with [`GREEDY_MARKER`]:
//!   `{proxy+}` becomes `ProxyGreedy`.
//!
//! A [`PathResolver`] keeps a registry of clean names seen during one
//! composition run. Two different literal segments that clean to the same
//! identifier (`foo-1` and `foo_1`) are a fatal [`Error::PathConflict`].

use std::collections::HashMap;

use serde_json::json;

use crate::error::{Error, Result};
use crate::fragments::api::API_ID;
use crate::template::{get_att, pascal_case, reference, Fragment, Resource};

/// Token substituted for the trailing `+` of a greedy path parameter.
pub const GREEDY_MARKER: &str = "Greedy";

/// Logical id of the routing node named `resource_name`.
pub fn resource_logical_id(resource_name: &str) -> String {
    format!("Resource{}", resource_name)
}

/// One segment of a resolved path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNode {
    /// Derived PascalCase name, e.g. `Users`, `Id`, `ProxyGreedy`
    pub logical_name: String,
    /// The raw path part, kept verbatim for the routing rule
    pub literal_segment: String,
    /// Index of the parent node in [`ResolvedPath::nodes`]; `None` for the root
    pub parent: Option<usize>,
}

/// Result of resolving one path.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    pub nodes: Vec<ResourceNode>,
    pub fragment: Fragment,
}

impl ResolvedPath {
    /// Name of the last node, or `None` when the path binds to the routing root.
    pub fn terminal(&self) -> Option<&str> {
        self.nodes.last().map(|node| node.logical_name.as_str())
    }

    /// Parent node of `node`, or `None` if it hangs off the routing root.
    pub fn parent_of(&self, node: &ResourceNode) -> Option<&ResourceNode> {
        node.parent.and_then(|index| self.nodes.get(index))
    }
}

/// Resolves route paths while tracking naming collisions across calls.
#[derive(Debug, Default)]
pub struct PathResolver {
    /// clean segment -> first original segment that produced it
    registry: HashMap<String, String>,
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `path` into nodes and routing-node resources.
    ///
    /// Resolving the same path twice yields identical output.
    pub fn resolve(&mut self, path: &str) -> Result<ResolvedPath> {
        let trimmed = path.trim();
        if trimmed.starts_with('/') {
            return Err(Error::MalformedPath {
                path: path.to_string(),
                message: "path should not begin with a '/'".to_string(),
            });
        }

        let mut nodes: Vec<ResourceNode> = Vec::new();
        let mut fragment = Fragment::new();

        for segment in trimmed.split('/').filter(|s| !s.is_empty()) {
            let logical_name = if segment.starts_with('{') {
                parameter_name(path, segment)?
            } else {
                self.literal_name(path, segment)?
            };

            let parent = nodes.len().checked_sub(1);
            let parent_id = match parent {
                Some(index) => reference(&resource_logical_id(&nodes[index].logical_name)),
                None => get_att(API_ID, "RootResourceId"),
            };

            fragment.insert(
                resource_logical_id(&logical_name),
                Resource::new(
                    "AWS::ApiGateway::Resource",
                    json!({
                        "RestApiId": reference(API_ID),
                        "ParentId": parent_id,
                        "PathPart": segment,
                    }),
                ),
            )?;

            nodes.push(ResourceNode {
                logical_name,
                literal_segment: segment.to_string(),
                parent,
            });
        }

        Ok(ResolvedPath { nodes, fragment })
    }

    fn literal_name(&mut self, path: &str, segment: &str) -> Result<String> {
        if segment.contains('{') || segment.contains('}') {
            return Err(Error::MalformedPath {
                path: path.to_string(),
                message: format!(
                    "segment '{}' must either be wrapped in braces or contain none",
                    segment
                ),
            });
        }

        // Logical ids accept ASCII letters and digits only.
        let clean: String = segment.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        if clean.is_empty() {
            return Err(Error::MalformedPath {
                path: path.to_string(),
                message: format!("segment '{}' has no ASCII letters or digits", segment),
            });
        }

        match self.registry.get(&clean) {
            Some(existing) if existing != segment => {
                return Err(Error::PathConflict {
                    clean,
                    existing: existing.clone(),
                    incoming: segment.to_string(),
                });
            }
            Some(_) => {}
            None => {
                self.registry.insert(clean.clone(), segment.to_string());
            }
        }

        Ok(pascal_case(&clean))
    }
}

fn parameter_name(path: &str, segment: &str) -> Result<String> {
    let inner = segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| Error::MalformedPath {
            path: path.to_string(),
            message: format!("parameter segment '{}' is not closed by '}}'", segment),
        })?;

    let base = inner.strip_suffix('+').unwrap_or(inner);
    if base.is_empty() || !base.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidPathParameter {
            path: path.to_string(),
            segment: segment.to_string(),
        });
    }

    let name = if inner.ends_with('+') {
        format!("{}{}", base, GREEDY_MARKER)
    } else {
        base.to_string()
    };
    Ok(pascal_case(&name))
}
