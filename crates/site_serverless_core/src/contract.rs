use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const GREETING: &str = "Hello OP, from the backend";
pub const JSON_CONTENT_TYPE: &str = "application/json";

pub const WEBSITE_URL_OUTPUT: &str = "WebsiteUrl";
pub const API_URL_OUTPUT: &str = "ApiUrl";
/// Not published; the provisioner needs it to upload assets and to empty the
/// bucket on teardown.
pub const SITE_BUCKET_OUTPUT: &str = "SiteBucketName";

/// Body returned by the hello endpoint.
///
/// `path` serializes as `null` when the inbound request carried none, so the
/// body always has exactly `message`, `path` and `time`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelloBody {
    pub message: String,
    pub path: Option<String>,
    pub time: String,
}

impl HelloBody {
    pub fn new(path: Option<String>, time: DateTime<Utc>) -> Self {
        Self {
            message: GREETING.to_string(),
            path,
            time: format_timestamp(time),
        }
    }
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2026-02-14T09:30:00.123Z`.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}
