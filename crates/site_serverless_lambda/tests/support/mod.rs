#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use site_serverless_core::contract::{API_URL_OUTPUT, SITE_BUCKET_OUTPUT, WEBSITE_URL_OUTPUT};
use site_serverless_lambda::adapters::object_store::{ObjectStore, ObjectVersion};
use site_serverless_lambda::adapters::stack::{StackDeployer, StackOutputMap};

pub const API_URL: &str = "https://abc123.execute-api.us-east-1.amazonaws.com/";
pub const WEBSITE_URL: &str = "http://site-bucket.s3-website-us-east-1.amazonaws.com";
pub const SITE_BUCKET: &str = "site-bucket";

pub fn resolved_outputs() -> StackOutputMap {
    BTreeMap::from([
        (WEBSITE_URL_OUTPUT.to_string(), WEBSITE_URL.to_string()),
        (API_URL_OUTPUT.to_string(), API_URL.to_string()),
        (SITE_BUCKET_OUTPUT.to_string(), SITE_BUCKET.to_string()),
    ])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
    pub cache_control: Option<String>,
}

/// In-memory buckets; every write adds a version, deletes add a marker.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    versions: Mutex<Vec<(String, ObjectVersion)>>,
    writes: Mutex<Vec<(String, String)>>,
    fail_on_key: Option<String>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(key: &str) -> Self {
        Self {
            fail_on_key: Some(key.to_string()),
            ..Self::default()
        }
    }

    pub fn seed(&self, bucket: &str, key: &str, body: &[u8]) {
        self.write_object(bucket, key, body, "text/plain", None)
            .expect("seeding should succeed");
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .expect("poisoned mutex")
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().expect("poisoned mutex").clone()
    }

    pub fn version_count(&self, bucket: &str) -> usize {
        self.versions
            .lock()
            .expect("poisoned mutex")
            .iter()
            .filter(|(owner, _)| owner == bucket)
            .count()
    }

    fn next_version_id(&self) -> String {
        let count = self.versions.lock().expect("poisoned mutex").len();
        format!("v{}", count + 1)
    }
}

impl ObjectStore for MemoryObjectStore {
    fn write_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
        cache_control: Option<&str>,
    ) -> Result<(), String> {
        if self.fail_on_key.as_deref() == Some(key) {
            return Err(format!("access denied for {key}"));
        }
        let version_id = self.next_version_id();
        self.objects.lock().expect("poisoned mutex").insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.to_vec(),
                content_type: content_type.to_string(),
                cache_control: cache_control.map(str::to_string),
            },
        );
        self.versions.lock().expect("poisoned mutex").push((
            bucket.to_string(),
            ObjectVersion {
                key: key.to_string(),
                version_id: Some(version_id),
            },
        ));
        self.writes
            .lock()
            .expect("poisoned mutex")
            .push((bucket.to_string(), key.to_string()));
        Ok(())
    }

    fn list_keys(&self, bucket: &str) -> Result<Vec<String>, String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .expect("poisoned mutex")
            .keys()
            .filter(|(owner, _)| owner == bucket)
            .map(|(_, key)| key.clone())
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), String> {
        let version_id = self.next_version_id();
        self.objects
            .lock()
            .expect("poisoned mutex")
            .remove(&(bucket.to_string(), key.to_string()));
        self.versions.lock().expect("poisoned mutex").push((
            bucket.to_string(),
            ObjectVersion {
                key: key.to_string(),
                version_id: Some(version_id),
            },
        ));
        Ok(())
    }

    fn list_versions(&self, bucket: &str) -> Result<Vec<ObjectVersion>, String> {
        Ok(self
            .versions
            .lock()
            .expect("poisoned mutex")
            .iter()
            .filter(|(owner, _)| owner == bucket)
            .map(|(_, version)| version.clone())
            .collect())
    }

    fn delete_version(&self, bucket: &str, version: &ObjectVersion) -> Result<(), String> {
        self.versions
            .lock()
            .expect("poisoned mutex")
            .retain(|(owner, existing)| !(owner == bucket && existing == version));
        let remaining = self
            .versions
            .lock()
            .expect("poisoned mutex")
            .iter()
            .any(|(owner, existing)| owner == bucket && existing.key == version.key);
        if !remaining {
            self.objects
                .lock()
                .expect("poisoned mutex")
                .remove(&(bucket.to_string(), version.key.clone()));
        }
        Ok(())
    }
}

/// Records deployed templates and answers with canned outputs.
pub struct CapturingDeployer {
    outputs: StackOutputMap,
    deployed: Mutex<Vec<(String, String)>>,
    deleted: Mutex<Vec<String>>,
    exists: Mutex<bool>,
    failure: Option<String>,
}

impl CapturingDeployer {
    pub fn new(outputs: StackOutputMap) -> Self {
        Self {
            outputs,
            deployed: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            exists: Mutex::new(false),
            failure: None,
        }
    }

    pub fn existing(outputs: StackOutputMap) -> Self {
        let deployer = Self::new(outputs);
        *deployer.exists.lock().expect("poisoned mutex") = true;
        deployer
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(StackOutputMap::new())
        }
    }

    pub fn deployed(&self) -> Vec<(String, String)> {
        self.deployed.lock().expect("poisoned mutex").clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().expect("poisoned mutex").clone()
    }
}

impl StackDeployer for CapturingDeployer {
    fn deploy_stack(&self, name: &str, template_body: &str) -> Result<StackOutputMap, String> {
        if let Some(message) = &self.failure {
            return Err(message.clone());
        }
        self.deployed
            .lock()
            .expect("poisoned mutex")
            .push((name.to_string(), template_body.to_string()));
        *self.exists.lock().expect("poisoned mutex") = true;
        Ok(self.outputs.clone())
    }

    fn stack_outputs(&self, _name: &str) -> Result<Option<StackOutputMap>, String> {
        if *self.exists.lock().expect("poisoned mutex") {
            Ok(Some(self.outputs.clone()))
        } else {
            Ok(None)
        }
    }

    fn delete_stack(&self, name: &str) -> Result<(), String> {
        self.deleted
            .lock()
            .expect("poisoned mutex")
            .push(name.to_string());
        *self.exists.lock().expect("poisoned mutex") = false;
        Ok(())
    }
}
