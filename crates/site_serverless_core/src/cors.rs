use serde_json::{json, Value};

pub const DEFAULT_ALLOW_HEADERS: &[&str] = &[
    "Content-Type",
    "X-Amz-Date",
    "Authorization",
    "X-Api-Key",
    "X-Amz-Security-Token",
    "X-Amz-User-Agent",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    Get,
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Options => "OPTIONS",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    pub allow_origins: AllowedOrigins,
    pub allow_methods: Vec<HttpMethod>,
    pub allow_headers: Vec<String>,
    pub max_age_secs: Option<u32>,
}

/// Headers carried by a preflight answer, in a stable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
}

impl PreflightResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl CorsPolicy {
    /// All origins, `GET` only, default request headers.
    pub fn site_default() -> Self {
        Self {
            allow_origins: AllowedOrigins::Any,
            allow_methods: vec![HttpMethod::Get],
            allow_headers: DEFAULT_ALLOW_HEADERS
                .iter()
                .map(|header| header.to_string())
                .collect(),
            max_age_secs: None,
        }
    }

    pub fn allows_method(&self, method: HttpMethod) -> bool {
        self.allow_methods.contains(&method)
    }

    pub fn allowed_origin(&self, origin: Option<&str>) -> Option<String> {
        match &self.allow_origins {
            AllowedOrigins::Any => Some("*".to_string()),
            AllowedOrigins::List(origins) => {
                let origin = origin?;
                origins
                    .iter()
                    .any(|allowed| allowed == origin)
                    .then(|| origin.to_string())
            }
        }
    }

    pub fn preflight(&self, origin: Option<&str>) -> PreflightResponse {
        let mut headers = Vec::with_capacity(4);
        if let Some(allowed) = self.allowed_origin(origin) {
            headers.push(("access-control-allow-origin".to_string(), allowed));
        }
        headers.push((
            "access-control-allow-methods".to_string(),
            self.method_list().join(","),
        ));
        headers.push((
            "access-control-allow-headers".to_string(),
            self.allow_headers.join(","),
        ));
        if let Some(max_age) = self.max_age_secs {
            headers.push(("access-control-max-age".to_string(), max_age.to_string()));
        }

        PreflightResponse {
            status_code: 204,
            headers,
        }
    }

    /// `CorsConfiguration` block of an `AWS::ApiGatewayV2::Api`.
    pub fn to_cloudformation(&self) -> Value {
        let origins = match &self.allow_origins {
            AllowedOrigins::Any => vec!["*".to_string()],
            AllowedOrigins::List(origins) => origins.clone(),
        };
        let mut config = json!({
            "AllowOrigins": origins,
            "AllowMethods": self.method_list(),
            "AllowHeaders": self.allow_headers,
        });
        if let Some(max_age) = self.max_age_secs {
            config["MaxAge"] = Value::from(max_age);
        }
        config
    }

    fn method_list(&self) -> Vec<&'static str> {
        self.allow_methods
            .iter()
            .map(|method| method.as_str())
            .collect()
    }
}
