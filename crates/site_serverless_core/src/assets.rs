use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::fragment::{ConfigFragment, JAVASCRIPT_CONTENT_TYPE, NO_CACHE};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset directory '{0}' does not exist or is not a directory")]
    MissingDirectory(PathBuf),
    #[error("failed to walk asset directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("asset path '{0}' is not valid UTF-8")]
    NonUtf8Path(PathBuf),
    #[error("failed to read asset '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    pub key: String,
    pub path: PathBuf,
    pub content_type: String,
}

/// Files found under the local asset root, sorted by object key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssetManifest {
    pub root: PathBuf,
    pub entries: Vec<AssetEntry>,
}

impl AssetManifest {
    pub fn scan(root: &Path) -> Result<Self, AssetError> {
        if !root.is_dir() {
            return Err(AssetError::MissingDirectory(root.to_path_buf()));
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let key = object_key(root, path)?;
            entries.push(AssetEntry {
                key,
                path: path.to_path_buf(),
                content_type: content_type_for(path),
            });
        }
        entries.sort_by(|left, right| left.key.cmp(&right.key));

        Ok(Self {
            root: root.to_path_buf(),
            entries,
        })
    }
}

fn object_key(root: &Path, path: &Path) -> Result<String, AssetError> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| AssetError::NonUtf8Path(path.to_path_buf()))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectBody {
    File(PathBuf),
    Generated(String),
}

impl ObjectBody {
    pub fn read(&self) -> Result<Vec<u8>, AssetError> {
        match self {
            Self::File(path) => std::fs::read(path).map_err(|source| AssetError::Read {
                path: path.clone(),
                source,
            }),
            Self::Generated(contents) => Ok(contents.as_bytes().to_vec()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedObject {
    pub key: String,
    pub content_type: String,
    pub cache_control: Option<String>,
    pub body: ObjectBody,
}

/// Everything one provisioning run writes into the site bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    pub objects: Vec<PlannedObject>,
}

impl DeploymentPlan {
    /// The fragment is written last and shadows any local file with its key.
    pub fn new(manifest: AssetManifest, fragment: &ConfigFragment) -> Self {
        let mut objects: Vec<PlannedObject> = manifest
            .entries
            .into_iter()
            .filter(|entry| entry.key != fragment.key())
            .map(|entry| PlannedObject {
                key: entry.key,
                content_type: entry.content_type,
                cache_control: None,
                body: ObjectBody::File(entry.path),
            })
            .collect();
        objects.push(PlannedObject {
            key: fragment.key().to_string(),
            content_type: JAVASCRIPT_CONTENT_TYPE.to_string(),
            cache_control: Some(NO_CACHE.to_string()),
            body: ObjectBody::Generated(fragment.contents()),
        });
        Self { objects }
    }

    pub fn keys(&self) -> BTreeSet<&str> {
        self.objects
            .iter()
            .map(|object| object.key.as_str())
            .collect()
    }

    /// Keys already in the bucket that this plan no longer contains.
    pub fn stale_keys(&self, existing: &[String]) -> Vec<String> {
        let planned = self.keys();
        let mut stale: Vec<String> = existing
            .iter()
            .filter(|key| !planned.contains(key.as_str()))
            .cloned()
            .collect();
        stale.sort_unstable();
        stale.dedup();
        stale
    }
}
