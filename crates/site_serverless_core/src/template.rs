use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::contract::{API_URL_OUTPUT, SITE_BUCKET_OUTPUT, WEBSITE_URL_OUTPUT};
use crate::topology::{Route, Topology, DEFAULT_STAGE};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

pub const SITE_BUCKET_ID: &str = "SiteBucket";
pub const SITE_BUCKET_POLICY_ID: &str = "SiteBucketPolicy";
pub const FUNCTION_ROLE_ID: &str = "HelloFunctionRole";
pub const FUNCTION_ID: &str = "HelloFunction";
pub const FUNCTION_PERMISSION_ID: &str = "HelloFunctionInvokePermission";
pub const HTTP_API_ID: &str = "HttpApi";
pub const HTTP_API_INTEGRATION_ID: &str = "HttpApiIntegration";
pub const HTTP_API_STAGE_ID: &str = "HttpApiStage";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateResource {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
    #[serde(rename = "DependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(
        rename = "DeletionPolicy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub deletion_policy: Option<String>,
    #[serde(
        rename = "UpdateReplacePolicy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub update_replace_policy: Option<String>,
}

impl TemplateResource {
    fn new(ty: &str, properties: Value) -> Self {
        Self {
            ty: ty.to_string(),
            properties,
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateOutput {
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Value")]
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, TemplateResource>,
    #[serde(rename = "Outputs")]
    pub outputs: BTreeMap<String, TemplateOutput>,
}

impl Template {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Topology {
    pub fn template(&self) -> Template {
        let mut resources = BTreeMap::new();
        self.declare_bucket(&mut resources);
        self.declare_function(&mut resources);
        self.declare_gateway(&mut resources);

        Template {
            version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: format!("Static site with a hello endpoint ({})", self.stack_name),
            resources,
            outputs: self.declare_outputs(),
        }
    }

    fn declare_bucket(&self, resources: &mut BTreeMap<String, TemplateResource>) {
        let bucket = &self.bucket;
        let mut properties = json!({
            "WebsiteConfiguration": {
                "IndexDocument": bucket.index_document,
                "ErrorDocument": bucket.error_document,
            },
        });
        if bucket.versioned {
            properties["VersioningConfiguration"] = json!({ "Status": "Enabled" });
        }
        if bucket.public_read {
            // ACLs stay blocked; public reads go through the bucket policy.
            properties["PublicAccessBlockConfiguration"] = json!({
                "BlockPublicAcls": true,
                "IgnorePublicAcls": true,
                "BlockPublicPolicy": false,
                "RestrictPublicBuckets": false,
            });
        }

        let mut site_bucket = TemplateResource::new("AWS::S3::Bucket", properties);
        if bucket.destroy_on_delete {
            site_bucket.deletion_policy = Some("Delete".to_string());
            site_bucket.update_replace_policy = Some("Delete".to_string());
        }
        resources.insert(SITE_BUCKET_ID.to_string(), site_bucket);

        if bucket.public_read {
            resources.insert(
                SITE_BUCKET_POLICY_ID.to_string(),
                TemplateResource::new(
                    "AWS::S3::BucketPolicy",
                    json!({
                        "Bucket": { "Ref": SITE_BUCKET_ID },
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [{
                                "Action": "s3:GetObject",
                                "Effect": "Allow",
                                "Principal": { "AWS": "*" },
                                "Resource": {
                                    "Fn::Sub": format!("arn:${{AWS::Partition}}:s3:::${{{SITE_BUCKET_ID}}}/*")
                                },
                            }],
                        },
                    }),
                ),
            );
        }
    }

    fn declare_function(&self, resources: &mut BTreeMap<String, TemplateResource>) {
        let function = &self.function;
        resources.insert(
            FUNCTION_ROLE_ID.to_string(),
            TemplateResource::new(
                "AWS::IAM::Role",
                json!({
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": "lambda.amazonaws.com" },
                            "Action": "sts:AssumeRole",
                        }],
                    },
                    "ManagedPolicyArns": [{
                        "Fn::Sub": "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"
                    }],
                }),
            ),
        );
        resources.insert(
            FUNCTION_ID.to_string(),
            TemplateResource::new(
                "AWS::Lambda::Function",
                json!({
                    "Description": format!("{} request handler", function.name),
                    "Runtime": function.runtime,
                    "Handler": function.entry_point,
                    "Architectures": [function.architecture.as_str()],
                    "Code": {
                        "S3Bucket": function.artifact.bucket,
                        "S3Key": function.artifact.key,
                    },
                    "Role": { "Fn::GetAtt": [FUNCTION_ROLE_ID, "Arn"] },
                }),
            ),
        );
    }

    fn declare_gateway(&self, resources: &mut BTreeMap<String, TemplateResource>) {
        let gateway = &self.gateway;
        resources.insert(
            HTTP_API_ID.to_string(),
            TemplateResource::new(
                "AWS::ApiGatewayV2::Api",
                json!({
                    "Name": gateway.name,
                    "ProtocolType": "HTTP",
                    "CorsConfiguration": gateway.cors.to_cloudformation(),
                }),
            ),
        );
        resources.insert(
            HTTP_API_INTEGRATION_ID.to_string(),
            TemplateResource::new(
                "AWS::ApiGatewayV2::Integration",
                json!({
                    "ApiId": { "Ref": HTTP_API_ID },
                    "IntegrationType": "AWS_PROXY",
                    "IntegrationUri": { "Fn::GetAtt": [FUNCTION_ID, "Arn"] },
                    "PayloadFormatVersion": "2.0",
                }),
            ),
        );

        let mut route_ids = Vec::with_capacity(gateway.routes.len());
        for route in &gateway.routes {
            let route_id = route_logical_id(route);
            resources.insert(
                route_id.clone(),
                TemplateResource::new(
                    "AWS::ApiGatewayV2::Route",
                    json!({
                        "ApiId": { "Ref": HTTP_API_ID },
                        "RouteKey": route.route_key(),
                        "Target": {
                            "Fn::Sub": format!("integrations/${{{HTTP_API_INTEGRATION_ID}}}")
                        },
                    }),
                ),
            );
            route_ids.push(route_id);
        }

        let mut stage = TemplateResource::new(
            "AWS::ApiGatewayV2::Stage",
            json!({
                "ApiId": { "Ref": HTTP_API_ID },
                "StageName": gateway.stage,
                "AutoDeploy": true,
            }),
        );
        stage.depends_on = route_ids;
        resources.insert(HTTP_API_STAGE_ID.to_string(), stage);

        resources.insert(
            FUNCTION_PERMISSION_ID.to_string(),
            TemplateResource::new(
                "AWS::Lambda::Permission",
                json!({
                    "Action": "lambda:InvokeFunction",
                    "FunctionName": { "Fn::GetAtt": [FUNCTION_ID, "Arn"] },
                    "Principal": "apigateway.amazonaws.com",
                    "SourceArn": {
                        "Fn::Sub": format!(
                            "arn:${{AWS::Partition}}:execute-api:${{AWS::Region}}:${{AWS::AccountId}}:${{{HTTP_API_ID}}}/*/*"
                        )
                    },
                }),
            ),
        );
    }

    fn declare_outputs(&self) -> BTreeMap<String, TemplateOutput> {
        BTreeMap::from([
            (
                WEBSITE_URL_OUTPUT.to_string(),
                TemplateOutput {
                    description: "Public website endpoint of the site bucket".to_string(),
                    value: json!({ "Fn::GetAtt": [SITE_BUCKET_ID, "WebsiteURL"] }),
                },
            ),
            (
                API_URL_OUTPUT.to_string(),
                TemplateOutput {
                    description: "Base URL of the HTTP gateway".to_string(),
                    value: json!({ "Fn::Sub": api_url_expression(&self.gateway.stage) }),
                },
            ),
            (
                SITE_BUCKET_OUTPUT.to_string(),
                TemplateOutput {
                    description: "Name of the site bucket".to_string(),
                    value: json!({ "Ref": SITE_BUCKET_ID }),
                },
            ),
        ])
    }
}

fn api_url_expression(stage: &str) -> String {
    let base =
        format!("https://${{{HTTP_API_ID}}}.execute-api.${{AWS::Region}}.${{AWS::URLSuffix}}/");
    if stage == DEFAULT_STAGE {
        base
    } else {
        format!("{base}{stage}/")
    }
}

/// `GET /` -> `HttpApiRouteRoot`, `GET /hello` -> `HttpApiRouteHello`.
fn route_logical_id(route: &Route) -> String {
    let mut suffix = String::new();
    for segment in route.path.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            suffix.push(first.to_ascii_uppercase());
            suffix.extend(chars);
        }
    }
    if suffix.is_empty() {
        suffix.push_str("Root");
    }
    format!("HttpApiRoute{suffix}")
}
