//! Documents the sync agent is bootstrapped with

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Result, manifest};

pub const SOURCE_API_VERSION: &str = "source.toolkit.fluxcd.io/v1";
pub const SYNC_API_VERSION: &str = "kustomize.toolkit.fluxcd.io/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
}

impl ObjectMeta {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }
}

/// Basic-auth `Secret` the source object pulls with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub string_data: BTreeMap<String, String>,
}

impl Secret {
    pub fn basic_auth(meta: ObjectMeta, username: &str, password: &str) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "Secret".to_string(),
            metadata: meta,
            string_data: BTreeMap::from([
                ("username".to_string(), username.to_string()),
                ("password".to_string(), password.to_string()),
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitRepository {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: GitRepositorySpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositorySpec {
    pub interval: String,
    #[serde(rename = "ref")]
    pub reference: GitReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalObjectReference>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitReference {
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalObjectReference {
    pub name: String,
}

/// The sync object: applies a repository path to the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncKustomization {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: SyncKustomizationSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncKustomizationSpec {
    pub interval: String,
    pub path: String,
    pub prune: bool,
    pub source_ref: CrossNamespaceSourceReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossNamespaceSourceReference {
    pub kind: String,
    pub name: String,
}

/// One YAML document, prefixed with a `---` separator
pub fn yaml_document<T: Serialize>(what: &str, doc: &T) -> Result<String> {
    let yaml = serde_yaml::to_string(doc)
        .map_err(|e| manifest::serialization_failed(what, e.to_string()))?;
    Ok(format!("---\n{yaml}"))
}

/// Interval in the duration format sync agents accept, e.g. `1m0s`
pub fn format_interval(secs: u64) -> String {
    let (hours, rest) = (secs / 3600, secs % 3600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Path the sync object reconciles, relative to the repository root
pub fn sync_path(target_path: &str) -> String {
    let trimmed = target_path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/");
    format!("./{trimmed}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(60), "1m0s");
        assert_eq!(format_interval(45), "45s");
        assert_eq!(format_interval(3725), "1h2m5s");
    }

    #[test]
    fn test_sync_path() {
        assert_eq!(sync_path(""), "./");
        assert_eq!(sync_path("./clusters/prod/"), "./clusters/prod");
    }

    #[test]
    fn test_secret_serialization() {
        let secret = Secret::basic_auth(ObjectMeta::new("flux-system", "flux-system"), "git", "s3cret");
        let yaml = serde_yaml::to_string(&secret).unwrap();
        assert!(yaml.contains("kind: Secret"));
        assert!(yaml.contains("stringData:"));
        assert!(yaml.contains("password: s3cret"));
    }
}
