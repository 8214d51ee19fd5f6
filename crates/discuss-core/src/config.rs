use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 3000;
pub const DEFAULT_MULTIPART_TTL_SECS: u64 = 60 * 60; // one hour per multipart reference
pub const DEFAULT_SUPPORT_CONTACT: &str = "support@discusswithai.com";

/// Top-level config (discuss.toml + DISCUSS_* env overrides).
///
/// Every section has a default so an empty file (or no file at all) yields a
/// runnable gateway; credentials are the only thing an operator must supply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscussConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub openai: Option<OpenAiProviderConfig>,
    /// Additional OpenAI-compatible endpoints, tried in order after `openai`
    /// when it fails.
    #[serde(default)]
    pub openai_compat: Vec<OpenAiCompatEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

/// A single OpenAI-compatible fallback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatEntry {
    /// Label used in logs.
    pub id: String,
    pub api_key: String,
    /// Base URL (without trailing slash).
    pub base_url: String,
    /// Override the chat completions path. Defaults to "/v1/chat/completions".
    pub chat_path: Option<String>,
    /// Override the model for requests routed to this endpoint.
    /// Falls back to `agent.model` when not set.
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    pub sms: Option<NexmoConfig>,
    pub whatsapp: Option<WhatsAppConfig>,
}

/// Vonage (Nexmo) SMS API credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NexmoConfig {
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_nexmo_base_url")]
    pub base_url: String,
}

/// WhatsApp Cloud API credentials and webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    pub access_token: String,
    #[serde(default = "default_whatsapp_base_url")]
    pub base_url: String,
    /// Token Meta echoes back in the `hub.verify_token` handshake parameter.
    /// When unset the handshake accepts any token.
    pub verify_token: Option<String>,
    /// App secret used to check `X-Hub-Signature-256` on webhook deliveries.
    /// When unset signatures are not checked.
    pub app_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Contact address quoted in the "response too long" notice.
    #[serde(default = "default_support_contact")]
    pub support_contact: String,
    /// How long a multipart reference stays suppressed after the first notice.
    #[serde(default = "default_multipart_ttl_secs")]
    pub multipart_ttl_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            support_contact: default_support_contact(),
            multipart_ttl_secs: DEFAULT_MULTIPART_TTL_SECS,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}
fn default_support_contact() -> String {
    DEFAULT_SUPPORT_CONTACT.to_string()
}
fn default_multipart_ttl_secs() -> u64 {
    DEFAULT_MULTIPART_TTL_SECS
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_nexmo_base_url() -> String {
    "https://rest.nexmo.com".to_string()
}
fn default_whatsapp_base_url() -> String {
    "https://graph.facebook.com".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.discuss/discuss.db", home)
}

impl DiscussConfig {
    /// Load config from a TOML file with DISCUSS_* env var overrides.
    ///
    /// Nested keys are separated by a double underscore, e.g.
    /// `DISCUSS_CHANNELS__SMS__API_KEY`. Falls back to `~/.discuss/discuss.toml`
    /// when no path is given; a missing file is not an error.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: DiscussConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("DISCUSS_").split("__"))
            .extract()
            .map_err(|e| crate::error::DiscussError::Config(e.to_string()))?;

        tracing::debug!(path = %path, "configuration loaded");
        Ok(config.with_legacy_env())
    }

    /// Fill sections that are still unset from the plain provider env vars
    /// (`OPENAI_API_KEY`, `NEXMO_API_KEY` + `NEXMO_API_SECRET`,
    /// `WHATSAPP_ACCESS_TOKEN`). Explicit config always wins.
    pub fn with_legacy_env(mut self) -> Self {
        if self.providers.openai.is_none() {
            if let Some(api_key) = non_empty_env("OPENAI_API_KEY") {
                self.providers.openai = Some(OpenAiProviderConfig {
                    api_key,
                    base_url: default_openai_base_url(),
                });
            }
        }

        if self.channels.sms.is_none() {
            if let (Some(api_key), Some(api_secret)) =
                (non_empty_env("NEXMO_API_KEY"), non_empty_env("NEXMO_API_SECRET"))
            {
                self.channels.sms = Some(NexmoConfig {
                    api_key,
                    api_secret,
                    base_url: default_nexmo_base_url(),
                });
            }
        }

        if self.channels.whatsapp.is_none() {
            if let Some(access_token) = non_empty_env("WHATSAPP_ACCESS_TOKEN") {
                self.channels.whatsapp = Some(WhatsAppConfig {
                    access_token,
                    base_url: default_whatsapp_base_url(),
                    verify_token: non_empty_env("WHATSAPP_VERIFY_TOKEN"),
                    app_secret: non_empty_env("WHATSAPP_APP_SECRET"),
                });
            }
        }

        self
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.discuss/discuss.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn empty_file_yields_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("discuss.toml", "")?;
            let cfg = DiscussConfig::load(Some("discuss.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.gateway.port, DEFAULT_PORT);
            assert_eq!(cfg.agent.model, DEFAULT_MODEL);
            assert_eq!(cfg.relay.multipart_ttl_secs, 3600);
            assert!(cfg.channels.sms.is_none());
            Ok(())
        });
    }

    #[test]
    fn toml_sections_are_read() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "discuss.toml",
                r#"
                [gateway]
                port = 9000

                [channels.sms]
                api_key = "key"
                api_secret = "secret"

                [channels.whatsapp]
                access_token = "wa-token"
                verify_token = "verify-me"
                "#,
            )?;
            let cfg = DiscussConfig::load(Some("discuss.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.gateway.port, 9000);
            let sms = cfg.channels.sms.expect("sms section");
            assert_eq!(sms.base_url, "https://rest.nexmo.com");
            let wa = cfg.channels.whatsapp.expect("whatsapp section");
            assert_eq!(wa.verify_token.as_deref(), Some("verify-me"));
            assert!(wa.app_secret.is_none());
            Ok(())
        });
    }

    #[test]
    fn env_overrides_nested_keys() {
        Jail::expect_with(|jail| {
            jail.create_file("discuss.toml", "[gateway]\nport = 9000\n")?;
            jail.set_env("DISCUSS_GATEWAY__PORT", "9100");
            jail.set_env("DISCUSS_RELAY__SUPPORT_CONTACT", "help@example.com");
            let cfg = DiscussConfig::load(Some("discuss.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.gateway.port, 9100);
            assert_eq!(cfg.relay.support_contact, "help@example.com");
            Ok(())
        });
    }

    #[test]
    fn legacy_env_fills_missing_sections() {
        Jail::expect_with(|jail| {
            jail.create_file("discuss.toml", "")?;
            jail.set_env("OPENAI_API_KEY", "sk-test");
            jail.set_env("NEXMO_API_KEY", "nk");
            jail.set_env("NEXMO_API_SECRET", "ns");
            let cfg = DiscussConfig::load(Some("discuss.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.providers.openai.expect("openai").api_key, "sk-test");
            assert_eq!(cfg.channels.sms.expect("sms").api_secret, "ns");
            Ok(())
        });
    }
}
