use crate::outputs::ApiBaseUrl;

pub const CONFIG_FRAGMENT_KEY: &str = "config.js";
pub const CONFIG_FRAGMENT_GLOBAL: &str = "window.API_BASE_URL";
pub const JAVASCRIPT_CONTENT_TYPE: &str = "application/javascript";
pub const NO_CACHE: &str = "no-cache";

/// Generated `config.js` exposing the gateway URL to the static front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFragment {
    api_url: ApiBaseUrl,
}

impl ConfigFragment {
    pub fn for_api(api_url: &ApiBaseUrl) -> Self {
        Self {
            api_url: api_url.clone(),
        }
    }

    pub fn key(&self) -> &'static str {
        CONFIG_FRAGMENT_KEY
    }

    pub fn api_url(&self) -> &ApiBaseUrl {
        &self.api_url
    }

    pub fn contents(&self) -> String {
        // A JSON string literal is also a valid JavaScript string literal.
        let literal = serde_json::Value::from(self.api_url.as_str()).to_string();
        format!("{CONFIG_FRAGMENT_GLOBAL} = {literal};\n")
    }

    /// Recovers the URL embedded by [`ConfigFragment::contents`].
    pub fn embedded_url(contents: &str) -> Option<String> {
        let literal = contents
            .trim()
            .strip_prefix(CONFIG_FRAGMENT_GLOBAL)?
            .trim_start()
            .strip_prefix('=')?
            .trim()
            .strip_suffix(';')?;
        serde_json::from_str(literal).ok()
    }
}
