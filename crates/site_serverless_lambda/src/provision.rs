use std::path::PathBuf;

use site_serverless_core::assets::{AssetError, AssetManifest, DeploymentPlan};
use site_serverless_core::fragment::ConfigFragment;
use site_serverless_core::outputs::{OutputsError, PublishedOutputs, StackOutputs};
use site_serverless_core::topology::{
    Architecture, LambdaArtifact, StackInputs, Topology, TopologyError, HANDLER_FUNCTION_NAME,
};

use crate::adapters::object_store::ObjectStore;
use crate::adapters::stack::StackDeployer;
use crate::settings::DeploySettings;

const ZIP_CONTENT_TYPE: &str = "application/zip";

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Outputs(#[from] OutputsError),
    #[error(transparent)]
    Assets(#[from] AssetError),
    #[error("failed to read lambda package '{path}': {source}")]
    Package {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize template: {0}")]
    Template(#[from] serde_json::Error),
    #[error("failed to upload '{key}' to '{bucket}': {message}")]
    Upload {
        bucket: String,
        key: String,
        message: String,
    },
    #[error("failed to delete '{key}' from '{bucket}': {message}")]
    Delete {
        bucket: String,
        key: String,
        message: String,
    },
    #[error("failed to list objects in '{bucket}': {message}")]
    List { bucket: String, message: String },
    #[error("stack '{stack}' failed: {message}")]
    Stack { stack: String, message: String },
}

/// Everything a provisioning run needs, already loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub stack_name: String,
    pub stage: String,
    pub asset_dir: PathBuf,
    pub artifact_bucket: String,
    pub architecture: Architecture,
    pub lambda_package: Vec<u8>,
}

impl ProvisionRequest {
    pub fn load(settings: &DeploySettings) -> Result<Self, ProvisionError> {
        let lambda_package =
            std::fs::read(&settings.lambda_package).map_err(|source| ProvisionError::Package {
                path: settings.lambda_package.clone(),
                source,
            })?;
        Ok(Self {
            stack_name: settings.stack.stack_name.clone(),
            stage: settings.stage.clone(),
            asset_dir: settings.asset_dir.clone(),
            artifact_bucket: settings.artifact_bucket.clone(),
            architecture: settings.architecture.into(),
            lambda_package,
        })
    }

    pub fn artifact(&self) -> LambdaArtifact {
        LambdaArtifact::for_package(
            &self.artifact_bucket,
            HANDLER_FUNCTION_NAME,
            &self.lambda_package,
        )
    }

    pub fn stack_inputs(&self) -> StackInputs {
        StackInputs {
            stack_name: self.stack_name.clone(),
            stage: self.stage.clone(),
            asset_dir: self.asset_dir.clone(),
            artifact: self.artifact(),
            architecture: self.architecture,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synthesized {
    pub topology: Topology,
    pub template_body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub outputs: PublishedOutputs,
    pub uploaded_keys: Vec<String>,
    pub pruned_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TeardownReport {
    pub stack_existed: bool,
    pub deleted_versions: usize,
}

pub fn synthesize(request: &ProvisionRequest) -> Result<Synthesized, ProvisionError> {
    let topology = Topology::declare(&request.stack_inputs())?;
    let template_body = topology.template().to_json_pretty()?;
    Ok(Synthesized {
        topology,
        template_body,
    })
}

/// One sequential provisioning run. Any failure aborts the run; nothing
/// already written is rolled back.
pub fn provision(
    request: &ProvisionRequest,
    deployer: &dyn StackDeployer,
    store: &dyn ObjectStore,
) -> Result<ProvisionReport, ProvisionError> {
    let synthesized = synthesize(request)?;
    let topology = &synthesized.topology;
    let artifact = &topology.function.artifact;

    log_provision_info("artifact_upload_started", &artifact.key);
    store
        .write_object(
            &artifact.bucket,
            &artifact.key,
            &request.lambda_package,
            ZIP_CONTENT_TYPE,
            None,
        )
        .map_err(|message| ProvisionError::Upload {
            bucket: artifact.bucket.clone(),
            key: artifact.key.clone(),
            message,
        })?;

    log_provision_info("stack_deploy_started", &topology.stack_name);
    let raw_outputs = deployer
        .deploy_stack(&topology.stack_name, &synthesized.template_body)
        .map_err(|message| ProvisionError::Stack {
            stack: topology.stack_name.clone(),
            message,
        })?;
    let outputs = StackOutputs::from_stack(&raw_outputs)?;

    let fragment = ConfigFragment::for_api(&outputs.api_url);
    let manifest = AssetManifest::scan(&topology.deployment.source_dir)?;
    let plan = DeploymentPlan::new(manifest, &fragment);

    let bucket = outputs.bucket_name.as_str();
    let mut uploaded_keys = Vec::with_capacity(plan.objects.len());
    for object in &plan.objects {
        let body = object.body.read()?;
        store
            .write_object(
                bucket,
                &object.key,
                &body,
                &object.content_type,
                object.cache_control.as_deref(),
            )
            .map_err(|message| ProvisionError::Upload {
                bucket: bucket.to_string(),
                key: object.key.clone(),
                message,
            })?;
        uploaded_keys.push(object.key.clone());
    }
    log_provision_info("assets_uploaded", &uploaded_keys.len().to_string());

    let existing = store
        .list_keys(bucket)
        .map_err(|message| ProvisionError::List {
            bucket: bucket.to_string(),
            message,
        })?;
    let pruned_keys = plan.stale_keys(&existing);
    for key in &pruned_keys {
        store
            .delete_object(bucket, key)
            .map_err(|message| ProvisionError::Delete {
                bucket: bucket.to_string(),
                key: key.clone(),
                message,
            })?;
    }

    let published = outputs.published();
    tracing::info!(
        component = "provisioner",
        event = "outputs_published",
        website_url = %published.website_url,
        api_url = %published.api_url,
        pruned = pruned_keys.len(),
    );

    Ok(ProvisionReport {
        outputs: published,
        uploaded_keys,
        pruned_keys,
    })
}

/// Empties every object version from the site bucket, then deletes the stack.
pub fn teardown(
    stack_name: &str,
    deployer: &dyn StackDeployer,
    store: &dyn ObjectStore,
) -> Result<TeardownReport, ProvisionError> {
    let stack_error = |message: String| ProvisionError::Stack {
        stack: stack_name.to_string(),
        message,
    };

    let Some(raw_outputs) = deployer.stack_outputs(stack_name).map_err(stack_error)? else {
        log_provision_info("teardown_skipped_missing_stack", stack_name);
        return Ok(TeardownReport::default());
    };

    let mut deleted_versions = 0usize;
    if let Some(bucket) = raw_outputs.get(site_serverless_core::contract::SITE_BUCKET_OUTPUT) {
        let versions = store
            .list_versions(bucket)
            .map_err(|message| ProvisionError::List {
                bucket: bucket.clone(),
                message,
            })?;
        for version in &versions {
            store
                .delete_version(bucket, version)
                .map_err(|message| ProvisionError::Delete {
                    bucket: bucket.clone(),
                    key: version.key.clone(),
                    message,
                })?;
            deleted_versions += 1;
        }
        log_provision_info("bucket_emptied", bucket);
    }

    deployer.delete_stack(stack_name).map_err(stack_error)?;
    log_provision_info("stack_deleted", stack_name);

    Ok(TeardownReport {
        stack_existed: true,
        deleted_versions,
    })
}

fn log_provision_info(event: &str, subject: &str) {
    tracing::info!(component = "provisioner", event, subject);
}
