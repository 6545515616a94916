//! # Artifact Version Resolution
//!
//! Build artifacts are uploaded to the support bucket under a stable key per
//! function. The bucket is versioned, so the key alone does not pin a
//! deployment; every compute unit references the exact object version.
//!
//! When a deploy skips re-uploading a function (`--skip-upload`, or a
//! `--function-name` filter that excludes it), the previously stored latest
//! version is looked up instead. A function that was never uploaded cannot
//! be skipped: that is a hard [`Error::NeverDeployed`], never a fallback to
//! inline code.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Placeholder source used when no artifact exists yet, e.g. for offline
/// template rendering.
pub const INLINE_PLACEHOLDER: &str = "exports.handler = (event, context, callback) => callback(null, { html: 'Deployed with routestack' });";

/// One stored version of an object in a versioned bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactVersion {
    pub key: String,
    pub version_id: String,
    pub is_latest: bool,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

/// Where a compute unit's code comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeLocation {
    Stored {
        bucket: String,
        key: String,
        version_id: String,
    },
    Inline {
        source: String,
    },
}

impl CodeLocation {
    pub fn placeholder() -> Self {
        CodeLocation::Inline {
            source: INLINE_PLACEHOLDER.to_string(),
        }
    }
}

/// Stable identifier of a function's bundle, `{app}-{function}-bundle`.
pub fn function_uuid(app_name: &str, function_name: &str) -> String {
    format!("{}-{}-bundle", app_name, function_name)
}

/// Storage key of a function bundle under `prefix`.
///
/// An empty prefix puts the bundle at the bucket root.
pub fn storage_key(prefix: &str, function_uuid: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}.zip", function_uuid)
    } else {
        format!("{}/{}.zip", prefix, function_uuid)
    }
}

/// Return the version id of the latest stored bundle for `function_uuid`.
pub fn resolve_skipped_version(
    function_uuid: &str,
    known_versions: &[ArtifactVersion],
    prefix: &str,
) -> Result<String> {
    let key = storage_key(prefix, function_uuid);
    known_versions
        .iter()
        .find(|version| version.is_latest && version.key == key)
        .map(|version| version.version_id.clone())
        .ok_or_else(|| Error::NeverDeployed {
            function: function_uuid.to_string(),
            key,
        })
}

/// Which functions are not re-uploaded in this deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipPolicy {
    /// Skip every function.
    pub skip_all: bool,
    /// Only this function is uploaded; all others are skipped.
    pub only_function: Option<String>,
}

impl SkipPolicy {
    pub fn is_skipped(&self, function_name: &str) -> bool {
        if self.skip_all {
            return true;
        }
        match &self.only_function {
            Some(only) => only != function_name,
            None => false,
        }
    }
}

/// Inputs for [`resolve_code_locations`].
#[derive(Debug, Clone)]
pub struct ArtifactRequest<'a> {
    pub app_name: &'a str,
    pub bucket: &'a str,
    pub prefix: &'a str,
    pub policy: &'a SkipPolicy,
}

/// Resolve a code location for every function name.
///
/// `uploaded` holds the locations produced by the build pipeline for
/// functions that were uploaded in this run. Skipped functions are resolved
/// against `known_versions`. A function that is neither skipped nor uploaded
/// gets the inline placeholder.
///
/// All skipped functions are checked before anything is returned, so a
/// never-deployed function fails the whole call before any upload starts.
pub fn resolve_code_locations<'f>(
    request: &ArtifactRequest<'_>,
    function_names: impl IntoIterator<Item = &'f str>,
    known_versions: &[ArtifactVersion],
    uploaded: &BTreeMap<String, CodeLocation>,
) -> Result<BTreeMap<String, CodeLocation>> {
    let mut locations = BTreeMap::new();
    for name in function_names {
        let location = if request.policy.is_skipped(name) {
            let uuid = function_uuid(request.app_name, name);
            let version_id = resolve_skipped_version(&uuid, known_versions, request.prefix)?;
            log::debug!("reusing stored bundle {} version {}", uuid, version_id);
            CodeLocation::Stored {
                bucket: request.bucket.to_string(),
                key: storage_key(request.prefix, &uuid),
                version_id,
            }
        } else if let Some(location) = uploaded.get(name) {
            location.clone()
        } else {
            CodeLocation::placeholder()
        };
        locations.insert(name.to_string(), location);
    }
    Ok(locations)
}

/// Parse an artifacts manifest produced by the build pipeline:
/// `{ "<function>": { "bucket": ..., "key": ..., "version_id": ... } }`.
pub fn parse_manifest(content: &str) -> Result<BTreeMap<String, CodeLocation>> {
    Ok(serde_json::from_str(content)?)
}
