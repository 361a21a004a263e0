use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::contract::{API_URL_OUTPUT, SITE_BUCKET_OUTPUT, WEBSITE_URL_OUTPUT};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputsError {
    #[error("stack output '{0}' is missing")]
    Missing(&'static str),
    #[error("stack output '{key}' is not a valid http(s) URL: '{value}'")]
    InvalidUrl { key: &'static str, value: String },
}

/// Base URL of the HTTP gateway, always ending with `/`.
///
/// Only obtainable from resolved stack outputs, which is what lets the
/// configuration fragment depend on the gateway having been deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBaseUrl(String);

impl ApiBaseUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteUrl(String);

impl WebsiteUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutputs {
    pub website_url: WebsiteUrl,
    pub api_url: ApiBaseUrl,
    pub bucket_name: String,
}

impl StackOutputs {
    pub fn from_stack(outputs: &BTreeMap<String, String>) -> Result<Self, OutputsError> {
        let raw_website = required(outputs, WEBSITE_URL_OUTPUT)?;
        let raw_api = required(outputs, API_URL_OUTPUT)?;
        let website_url = parse_http_url(WEBSITE_URL_OUTPUT, raw_website)?;
        let mut api_url = parse_http_url(API_URL_OUTPUT, raw_api)?;
        if !api_url.ends_with('/') {
            api_url.push('/');
        }
        let bucket_name = required(outputs, SITE_BUCKET_OUTPUT)?.trim();
        if bucket_name.is_empty() {
            return Err(OutputsError::Missing(SITE_BUCKET_OUTPUT));
        }

        Ok(Self {
            website_url: WebsiteUrl(website_url),
            api_url: ApiBaseUrl(api_url),
            bucket_name: bucket_name.to_string(),
        })
    }

    pub fn published(&self) -> PublishedOutputs {
        PublishedOutputs {
            website_url: self.website_url.as_str().to_string(),
            api_url: self.api_url.as_str().to_string(),
        }
    }
}

/// The two values downstream tooling consumes after a provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishedOutputs {
    #[serde(rename = "WebsiteUrl")]
    pub website_url: String,
    #[serde(rename = "ApiUrl")]
    pub api_url: String,
}

impl PublishedOutputs {
    /// `{"<stack>": {"WebsiteUrl": .., "ApiUrl": ..}}`
    pub fn to_outputs_file(&self, stack_name: &str) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&BTreeMap::from([(stack_name, self)]))
    }
}

fn required<'a>(
    outputs: &'a BTreeMap<String, String>,
    key: &'static str,
) -> Result<&'a str, OutputsError> {
    outputs
        .get(key)
        .map(String::as_str)
        .ok_or(OutputsError::Missing(key))
}

fn parse_http_url(key: &'static str, raw: &str) -> Result<String, OutputsError> {
    let trimmed = raw.trim();
    let invalid = || OutputsError::InvalidUrl {
        key,
        value: raw.to_string(),
    };
    let parsed = Url::parse(trimmed).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_stack_outputs() -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                WEBSITE_URL_OUTPUT.to_string(),
                "http://site-bucket.s3-website-us-east-1.amazonaws.com".to_string(),
            ),
            (
                API_URL_OUTPUT.to_string(),
                "https://abc123.execute-api.us-east-1.amazonaws.com/".to_string(),
            ),
            (SITE_BUCKET_OUTPUT.to_string(), "site-bucket".to_string()),
        ])
    }

    #[test]
    fn parses_resolved_outputs() {
        let outputs =
            StackOutputs::from_stack(&sample_stack_outputs()).expect("outputs should parse");

        assert_eq!(
            outputs.api_url.as_str(),
            "https://abc123.execute-api.us-east-1.amazonaws.com/"
        );
        assert_eq!(outputs.bucket_name, "site-bucket");
    }

    #[test]
    fn api_url_gains_trailing_slash() {
        let mut raw = sample_stack_outputs();
        raw.insert(
            API_URL_OUTPUT.to_string(),
            "https://abc123.execute-api.us-east-1.amazonaws.com/prod".to_string(),
        );
        let outputs = StackOutputs::from_stack(&raw).expect("outputs should parse");
        assert_eq!(
            outputs.api_url.as_str(),
            "https://abc123.execute-api.us-east-1.amazonaws.com/prod/"
        );
    }

    #[test]
    fn missing_api_url_is_an_error() {
        let mut raw = sample_stack_outputs();
        raw.remove(API_URL_OUTPUT);
        let error = StackOutputs::from_stack(&raw).expect_err("missing output should fail");
        assert_eq!(error, OutputsError::Missing(API_URL_OUTPUT));
    }

    #[test]
    fn rejects_non_http_urls() {
        let mut raw = sample_stack_outputs();
        raw.insert(
            WEBSITE_URL_OUTPUT.to_string(),
            "s3://site-bucket".to_string(),
        );
        let error = StackOutputs::from_stack(&raw).expect_err("s3 scheme should fail");
        assert_eq!(
            error,
            OutputsError::InvalidUrl {
                key: WEBSITE_URL_OUTPUT,
                value: "s3://site-bucket".to_string(),
            }
        );
    }

    #[test]
    fn outputs_file_is_keyed_by_stack_name() {
        let outputs =
            StackOutputs::from_stack(&sample_stack_outputs()).expect("outputs should parse");
        let rendered = outputs
            .published()
            .to_outputs_file("site-serverless")
            .expect("outputs file should render");
        let file: serde_json::Value =
            serde_json::from_str(&rendered).expect("outputs file should be json");

        assert_eq!(
            file["site-serverless"]["ApiUrl"],
            "https://abc123.execute-api.us-east-1.amazonaws.com/"
        );
        assert_eq!(
            file["site-serverless"].as_object().map(|object| object.len()),
            Some(2)
        );
    }
}
