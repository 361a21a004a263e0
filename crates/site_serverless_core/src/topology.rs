use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::cors::{CorsPolicy, HttpMethod};
use crate::fragment::CONFIG_FRAGMENT_KEY;

pub const DEFAULT_STAGE: &str = "$default";
pub const HANDLER_FUNCTION_NAME: &str = "hello_lambda";
pub const HANDLER_ENTRY_POINT: &str = "bootstrap";
pub const HANDLER_RUNTIME: &str = "provided.al2023";
pub const INDEX_DOCUMENT: &str = "index.html";
pub const ERROR_DOCUMENT: &str = "error.html";
pub const BOUND_PATHS: &[&str] = &["/", "/hello"];

const MAX_NAME_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("invalid stack name '{0}': must only consist of alphanumeric characters and hyphens, start with a letter, and be at most 128 characters")]
    InvalidStackName(String),
    #[error("invalid stage name '{0}': must be '$default' or alphanumeric characters, hyphens and underscores (at most 128)")]
    InvalidStage(String),
    #[error("lambda artifact bucket cannot be empty")]
    MissingArtifactBucket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Architecture {
    #[default]
    X86_64,
    Arm64,
}

impl Architecture {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Arm64 => "arm64",
        }
    }
}

/// Location of the packaged handler zip in the artifact bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaArtifact {
    pub bucket: String,
    pub key: String,
}

impl LambdaArtifact {
    /// Keys the artifact by content hash so a code change always produces a
    /// template change.
    pub fn for_package(bucket: &str, function_name: &str, package: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(package);
        Self {
            bucket: bucket.to_string(),
            key: format!("{function_name}/{:x}.zip", hasher.finalize()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackInputs {
    pub stack_name: String,
    pub stage: String,
    pub asset_dir: PathBuf,
    pub artifact: LambdaArtifact,
    pub architecture: Architecture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteBucket {
    pub index_document: String,
    pub error_document: String,
    pub versioned: bool,
    pub public_read: bool,
    pub destroy_on_delete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFunction {
    pub name: String,
    pub artifact: LambdaArtifact,
    pub entry_point: String,
    pub runtime: String,
    pub architecture: Architecture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: HttpMethod,
    pub path: String,
}

impl Route {
    pub fn route_key(&self) -> String {
        format!("{} {}", self.method.as_str(), self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpGateway {
    pub name: String,
    pub stage: String,
    pub routes: Vec<Route>,
    pub cors: CorsPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDeployment {
    pub source_dir: PathBuf,
    pub fragment_key: String,
}

/// The complete, immutable resource graph of one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub stack_name: String,
    pub bucket: SiteBucket,
    pub function: HandlerFunction,
    pub gateway: HttpGateway,
    pub deployment: AssetDeployment,
}

impl Topology {
    pub fn declare(inputs: &StackInputs) -> Result<Self, TopologyError> {
        validate_stack_name(&inputs.stack_name)?;
        validate_stage(&inputs.stage)?;
        if inputs.artifact.bucket.trim().is_empty() {
            return Err(TopologyError::MissingArtifactBucket);
        }

        let routes = BOUND_PATHS
            .iter()
            .map(|path| Route {
                method: HttpMethod::Get,
                path: path.to_string(),
            })
            .collect();

        Ok(Self {
            stack_name: inputs.stack_name.clone(),
            bucket: SiteBucket {
                index_document: INDEX_DOCUMENT.to_string(),
                error_document: ERROR_DOCUMENT.to_string(),
                versioned: true,
                public_read: true,
                destroy_on_delete: true,
            },
            function: HandlerFunction {
                name: HANDLER_FUNCTION_NAME.to_string(),
                artifact: inputs.artifact.clone(),
                entry_point: HANDLER_ENTRY_POINT.to_string(),
                runtime: HANDLER_RUNTIME.to_string(),
                architecture: inputs.architecture,
            },
            gateway: HttpGateway {
                name: format!("{}-api", inputs.stack_name),
                stage: inputs.stage.clone(),
                routes,
                cors: CorsPolicy::site_default(),
            },
            deployment: AssetDeployment {
                source_dir: inputs.asset_dir.clone(),
                fragment_key: CONFIG_FRAGMENT_KEY.to_string(),
            },
        })
    }
}

fn validate_stack_name(name: &str) -> Result<(), TopologyError> {
    let starts_with_letter = name
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic());
    let valid_chars = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !starts_with_letter || !valid_chars || name.len() > MAX_NAME_LEN {
        return Err(TopologyError::InvalidStackName(name.to_string()));
    }
    Ok(())
}

fn validate_stage(stage: &str) -> Result<(), TopologyError> {
    if stage == DEFAULT_STAGE {
        return Ok(());
    }
    let valid_chars = stage
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if stage.is_empty() || !valid_chars || stage.len() > MAX_NAME_LEN {
        return Err(TopologyError::InvalidStage(stage.to_string()));
    }
    Ok(())
}
