use std::error::Error;
use std::future::Future;
use std::time::Duration;

use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::{Capability, OnFailure, Stack};
use aws_sdk_s3::primitives::ByteStream;
use site_serverless_lambda::adapters::object_store::{ObjectStore, ObjectVersion};
use site_serverless_lambda::adapters::stack::{
    classify_stack_status, StackDeployer, StackOperation, StackOutputMap, StackPhase,
};

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MISSING_STACK_MESSAGE: &str = "does not exist";
const NO_UPDATES_MESSAGE: &str = "No updates are to be performed";

/// Runs SDK calls from the synchronous adapter traits on the ambient runtime.
fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

fn sdk_failure<E: Error>(action: &str, error: E) -> String {
    format!("failed to {action}: {}", DisplayErrorContext(error))
}

fn error_mentions<E: ProvideErrorMetadata>(error: &E, needle: &str) -> bool {
    error
        .message()
        .is_some_and(|message| message.contains(needle))
}

fn log_stack_event(event: &str, stack: &str) {
    tracing::info!(component = "cloudformation", event, stack);
}

struct DescribedStack {
    phase: StackPhase,
    stack: Stack,
}

pub struct CloudFormationStackDeployer {
    client: aws_sdk_cloudformation::Client,
}

impl CloudFormationStackDeployer {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudformation::Client::new(config),
        }
    }

    /// `None` when the stack does not exist or finished deleting.
    async fn describe(&self, name: &str) -> Result<Option<DescribedStack>, String> {
        let request = self.client.describe_stacks().stack_name(name);
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) if error_mentions(&error, MISSING_STACK_MESSAGE) => return Ok(None),
            Err(error) => return Err(sdk_failure("describe stack", error)),
        };

        let Some(stack) = response.stacks().first() else {
            return Ok(None);
        };
        let Some(status) = stack.stack_status() else {
            return Err(format!("stack {name} has no status"));
        };
        let phase = classify_stack_status(status.as_str(), stack.stack_status_reason());
        if phase == StackPhase::Missing {
            return Ok(None);
        }
        Ok(Some(DescribedStack {
            phase,
            stack: stack.clone(),
        }))
    }

    async fn wait_until_stable(&self, name: &str) -> Result<Option<DescribedStack>, String> {
        loop {
            match self.describe(name).await? {
                Some(described) if described.phase == StackPhase::InProgress => {
                    tracing::debug!(
                        component = "cloudformation",
                        event = "waiting",
                        stack = name
                    );
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                stable => return Ok(stable),
            }
        }
    }

    async fn delete_and_wait(&self, name: &str) -> Result<(), String> {
        log_stack_event("delete_stack", name);
        self.client
            .delete_stack()
            .stack_name(name)
            .send()
            .await
            .map_err(|error| sdk_failure("delete stack", error))?;

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            let described = self.describe(name).await?;
            match described.map(|described| described.phase) {
                None => return Ok(()),
                Some(failed @ StackPhase::Failed { .. }) => return Err(failed.to_string()),
                Some(_) => {}
            }
        }
    }

    async fn create(&self, name: &str, body: &str) -> Result<(), String> {
        log_stack_event("create_stack", name);
        self.client
            .create_stack()
            .stack_name(name)
            .template_body(body)
            .capabilities(Capability::CapabilityIam)
            .on_failure(OnFailure::Rollback)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| sdk_failure("create stack", error))
    }

    /// `false` when CloudFormation reports the template as unchanged.
    async fn update(&self, name: &str, body: &str) -> Result<bool, String> {
        log_stack_event("update_stack", name);
        let result = self
            .client
            .update_stack()
            .stack_name(name)
            .template_body(body)
            .capabilities(Capability::CapabilityIam)
            .send()
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(error) if error_mentions(&error, NO_UPDATES_MESSAGE) => {
                log_stack_event("stack_unchanged", name);
                Ok(false)
            }
            Err(error) => Err(sdk_failure("update stack", error)),
        }
    }

    /// Creates or updates the stack. A rollback only fails the run when this
    /// run's create or update caused it.
    async fn deploy(&self, name: &str, template_body: &str) -> Result<StackOutputMap, String> {
        let operation = match self.wait_until_stable(name).await? {
            None => StackOperation::Create,
            Some(current) => match current.phase {
                StackPhase::RolledBackOnCreate { .. } => {
                    self.delete_and_wait(name).await?;
                    StackOperation::Create
                }
                phase if phase.is_updatable() => StackOperation::Update,
                phase => return Err(format!("stack {name} cannot be deployed: {phase}")),
            },
        };

        match operation {
            StackOperation::Create => self.create(name, template_body).await?,
            StackOperation::Update => {
                if !self.update(name, template_body).await? {
                    return self
                        .stable_outputs(name)
                        .await?
                        .ok_or_else(|| format!("stack {name} disappeared"));
                }
            }
        }

        let Some(settled) = self.wait_until_stable(name).await? else {
            return Err(format!("stack {name} disappeared"));
        };
        operation.outcome(&settled.phase)?;
        Ok(outputs_of(&settled.stack))
    }

    async fn stable_outputs(&self, name: &str) -> Result<Option<StackOutputMap>, String> {
        let stable = self.wait_until_stable(name).await?;
        Ok(stable.map(|described| outputs_of(&described.stack)))
    }
}

fn outputs_of(stack: &Stack) -> StackOutputMap {
    stack
        .outputs()
        .iter()
        .filter_map(|output| match (output.output_key(), output.output_value()) {
            (Some(key), Some(value)) => Some((key.to_string(), value.to_string())),
            _ => None,
        })
        .collect()
}

impl StackDeployer for CloudFormationStackDeployer {
    fn deploy_stack(&self, name: &str, template_body: &str) -> Result<StackOutputMap, String> {
        block_on(self.deploy(name, template_body))
    }

    /// Outputs of any stable stack, including one left behind by a rolled
    /// back update or a failed delete.
    fn stack_outputs(&self, name: &str) -> Result<Option<StackOutputMap>, String> {
        block_on(self.stable_outputs(name))
    }

    fn delete_stack(&self, name: &str) -> Result<(), String> {
        block_on(self.delete_and_wait(name))
    }
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
        }
    }
}

impl ObjectStore for S3ObjectStore {
    fn write_object(
        &self,
        bucket: &str,
        key: &str,
        body: &[u8],
        content_type: &str,
        cache_control: Option<&str>,
    ) -> Result<(), String> {
        let request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .set_cache_control(cache_control.map(str::to_string))
            .body(ByteStream::from(body.to_vec()));

        block_on(async move {
            request
                .send()
                .await
                .map(|_| ())
                .map_err(|error| sdk_failure("write object to s3", error))
        })
    }

    fn list_keys(&self, bucket: &str) -> Result<Vec<String>, String> {
        block_on(async {
            let mut keys = Vec::new();
            let mut continuation_token: Option<String> = None;
            loop {
                let page = self
                    .client
                    .list_objects_v2()
                    .bucket(bucket)
                    .set_continuation_token(continuation_token.take())
                    .send()
                    .await
                    .map_err(|error| sdk_failure("list objects in s3", error))?;
                keys.extend(
                    page.contents()
                        .iter()
                        .filter_map(|object| object.key().map(str::to_string)),
                );
                match page.next_continuation_token() {
                    Some(token) if page.is_truncated().unwrap_or(false) => {
                        continuation_token = Some(token.to_string());
                    }
                    _ => return Ok(keys),
                }
            }
        })
    }

    fn delete_object(&self, bucket: &str, key: &str) -> Result<(), String> {
        block_on(async {
            self.client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map(|_| ())
                .map_err(|error| sdk_failure("delete object from s3", error))
        })
    }

    fn list_versions(&self, bucket: &str) -> Result<Vec<ObjectVersion>, String> {
        block_on(async {
            let mut versions = Vec::new();
            let mut key_marker: Option<String> = None;
            let mut version_id_marker: Option<String> = None;
            loop {
                let page = self
                    .client
                    .list_object_versions()
                    .bucket(bucket)
                    .set_key_marker(key_marker.take())
                    .set_version_id_marker(version_id_marker.take())
                    .send()
                    .await
                    .map_err(|error| sdk_failure("list object versions in s3", error))?;

                for version in page.versions() {
                    if let Some(key) = version.key() {
                        versions.push(ObjectVersion {
                            key: key.to_string(),
                            version_id: version.version_id().map(str::to_string),
                        });
                    }
                }
                for marker in page.delete_markers() {
                    if let Some(key) = marker.key() {
                        versions.push(ObjectVersion {
                            key: key.to_string(),
                            version_id: marker.version_id().map(str::to_string),
                        });
                    }
                }

                if !page.is_truncated().unwrap_or(false) {
                    return Ok(versions);
                }
                key_marker = page.next_key_marker().map(str::to_string);
                version_id_marker = page.next_version_id_marker().map(str::to_string);
            }
        })
    }

    fn delete_version(&self, bucket: &str, version: &ObjectVersion) -> Result<(), String> {
        block_on(async {
            self.client
                .delete_object()
                .bucket(bucket)
                .key(&version.key)
                .set_version_id(version.version_id.clone())
                .send()
                .await
                .map(|_| ())
                .map_err(|error| sdk_failure("delete object version from s3", error))
        })
    }
}
