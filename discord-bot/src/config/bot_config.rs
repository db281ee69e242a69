//! BotConfig: BaseConfig + LLM + roleplay settings. Use load() for env-based loading.

use anyhow::Result;
use llm_client::{EnvLlmConfig, LlmConfig};
use roleplay::RoleplayConfig;

use super::BaseConfig;

/// Bot config. Use BotConfig::load() for env-based loading.
pub struct BotConfig {
    pub base: BaseConfig,
    pub llm: EnvLlmConfig,
    pub roleplay: RoleplayConfig,
}

impl BotConfig {
    /// Load full config from environment variables. If `token` is provided it overrides DISCORD_TOKEN.
    /// Call validate() after load to check config before init.
    pub fn load(token: Option<String>) -> Result<Self> {
        let base = BaseConfig::load(token)?;
        let llm = EnvLlmConfig::from_env()?;
        let mut roleplay = RoleplayConfig::from_env();
        roleplay.command_prefix =
            Some(base.command_prefix.clone()).filter(|p| !p.trim().is_empty());
        Ok(Self {
            base,
            llm,
            roleplay,
        })
    }

    /// Validate config. Call after load() to fail fast before init.
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        if reqwest::Url::parse(self.llm.base_url()).is_err() {
            anyhow::bail!(
                "OPENAI_API_URL (or OPENAI_BASE_URL) is not a valid URL: {}",
                self.llm.base_url()
            );
        }
        if self.llm.api_key().trim().is_empty() {
            anyhow::bail!("OPENAI_API_KEY is empty");
        }
        Ok(())
    }

    pub fn base(&self) -> &BaseConfig {
        &self.base
    }

    pub fn bot_token(&self) -> &str {
        &self.base.bot_token
    }
    pub fn database_url(&self) -> &str {
        &self.base.database_url
    }
    pub fn log_file(&self) -> &str {
        &self.base.log_file
    }
    pub fn discord_api_url(&self) -> &str {
        &self.base.discord_api_url
    }
    /// `None` when text commands are disabled.
    pub fn command_prefix(&self) -> Option<&str> {
        self.roleplay.command_prefix.as_deref()
    }
}
