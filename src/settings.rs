use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_API_VERSION: &str = "2024-10";
pub const DEFAULT_MODEL: &str = "gpt-4o";
const SETTINGS_FILE: &str = "copysync";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("missing {0}; set it in the environment, copysync.toml or on the command line")]
    Missing(&'static str),
    #[error("invalid settings: {0}")]
    Invalid(#[from] config::ConfigError),
}

/// Shop connection settings: `copysync.toml`, then `SHOPIFY_*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopSettings {
    #[serde(default)]
    pub shop: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_timeout() -> u64 {
    60
}

impl Default for ShopSettings {
    fn default() -> Self {
        Self {
            shop: None,
            access_token: None,
            api_version: default_api_version(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Validated shop domain and token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopCredentials {
    pub domain: String,
    pub token: String,
}

impl ShopSettings {
    pub fn load() -> Result<Self, SettingsError> {
        let settings = Config::builder()
            .add_source(File::with_name(SETTINGS_FILE).required(false))
            .add_source(Environment::with_prefix("SHOPIFY"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Command-line values win over loaded ones.
    pub fn with_overrides(mut self, shop: Option<String>, token: Option<String>) -> Self {
        if shop.is_some() {
            self.shop = shop;
        }
        if token.is_some() {
            self.access_token = token;
        }
        self
    }

    pub fn credentials(&self) -> Result<ShopCredentials, SettingsError> {
        let shop = non_empty(&self.shop).ok_or(SettingsError::Missing("SHOPIFY_SHOP"))?;
        let token = non_empty(&self.access_token)
            .ok_or(SettingsError::Missing("SHOPIFY_ACCESS_TOKEN"))?;
        Ok(ShopCredentials {
            domain: shop_domain(shop),
            token: token.to_string(),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// `my-store`, `my-store.myshopify.com` and `https://my-store.myshopify.com/`
/// all name the same shop.
pub fn shop_domain(shop: &str) -> String {
    let host = shop
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    if host.contains('.') {
        host.to_string()
    } else {
        format!("{}.myshopify.com", host)
    }
}

/// Copy generator settings from `OPENAI_*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_generator_timeout() -> u64 {
    180
}

impl GeneratorSettings {
    pub fn load() -> Result<Self, SettingsError> {
        let settings = Config::builder()
            .add_source(Environment::with_prefix("OPENAI"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn api_key(&self) -> Result<&str, SettingsError> {
        non_empty(&self.api_key).ok_or(SettingsError::Missing("OPENAI_API_KEY"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains() {
        assert_eq!(shop_domain("my-store"), "my-store.myshopify.com");
        assert_eq!(shop_domain("my-store.myshopify.com"), "my-store.myshopify.com");
        assert_eq!(shop_domain("https://my-store.myshopify.com/"), "my-store.myshopify.com");
    }

    #[test]
    fn overrides_win() {
        let settings = ShopSettings {
            shop: Some("env-store".into()),
            access_token: Some("env-token".into()),
            ..ShopSettings::default()
        }
        .with_overrides(Some("cli-store".into()), None);
        let creds = settings.credentials().unwrap();
        assert_eq!(creds.domain, "cli-store.myshopify.com");
        assert_eq!(creds.token, "env-token");
        assert_eq!(settings.api_version, DEFAULT_API_VERSION);
    }

    #[test]
    fn missing_credentials_fatal() {
        let err = ShopSettings::default().credentials().unwrap_err();
        assert!(matches!(err, SettingsError::Missing("SHOPIFY_SHOP")));

        let blank_token = ShopSettings {
            shop: Some("s".into()),
            access_token: Some("  ".into()),
            ..ShopSettings::default()
        };
        assert!(matches!(
            blank_token.credentials(),
            Err(SettingsError::Missing("SHOPIFY_ACCESS_TOKEN"))
        ));
    }
}
