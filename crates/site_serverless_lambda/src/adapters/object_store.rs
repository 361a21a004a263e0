#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    pub key: String,
    pub version_id: Option<String>,
}

pub trait ObjectStore {
    fn write_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
        cache_control: Option<&str>,
    ) -> Result<(), String>;

    fn list_keys(&self, bucket: &str) -> Result<Vec<String>, String>;

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), String>;

    /// Every version and delete marker, so a versioned bucket can be emptied.
    fn list_versions(&self, bucket: &str) -> Result<Vec<ObjectVersion>, String>;

    fn delete_version(&self, bucket: &str, version: &ObjectVersion) -> Result<(), String>;
}
