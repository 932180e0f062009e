use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_USER_AGENT: &str = "gorgonwiki/0.2";
pub const DEFAULT_VERSION_URL: &str = "http://client.projectgorgon.com/fileversion.txt";
pub const DEFAULT_DATA_URL: &str = "http://cdn.projectgorgon.com/v{version}/data/{file}.json";
pub const DEFAULT_PET_PROFILE_PREFIX: &str = "Pet Profile:";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct BotConfig {
    #[serde(default)]
    pub wiki: WikiSection,
    #[serde(default)]
    pub cdn: CdnSection,
    #[serde(default)]
    pub pages: PagesSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct CdnSection {
    pub version_url: Option<String>,
    /// URL template; `{version}` and `{file}` are substituted.
    pub data_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct PagesSection {
    pub pet_profile_prefix: Option<String>,
    pub ability_summary: Option<String>,
    pub ai_profile_summary: Option<String>,
    pub pet_profile_summary: Option<String>,
    pub quest_summary: Option<String>,
}

impl BotConfig {
    /// Resolve the wiki API URL: env WIKI_API_URL > config > None.
    pub fn api_url(&self) -> Option<String> {
        env_override("WIKI_API_URL").or_else(|| self.wiki.api_url.clone())
    }

    /// Resolve user agent: env WIKI_USER_AGENT > config > DEFAULT_USER_AGENT.
    pub fn user_agent(&self) -> String {
        env_override("WIKI_USER_AGENT")
            .or_else(|| self.wiki.user_agent.clone())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string())
    }

    pub fn version_url(&self) -> String {
        env_override("GORGON_VERSION_URL")
            .or_else(|| self.cdn.version_url.clone())
            .unwrap_or_else(|| DEFAULT_VERSION_URL.to_string())
    }

    pub fn data_url(&self) -> String {
        env_override("GORGON_DATA_URL")
            .or_else(|| self.cdn.data_url.clone())
            .unwrap_or_else(|| DEFAULT_DATA_URL.to_string())
    }

    pub fn pet_profile_prefix(&self) -> &str {
        self.pages
            .pet_profile_prefix
            .as_deref()
            .unwrap_or(DEFAULT_PET_PROFILE_PREFIX)
    }

    pub fn summary_for(&self, kind: PageKind) -> &str {
        let configured = match kind {
            PageKind::Ability => self.pages.ability_summary.as_deref(),
            PageKind::AiProfile => self.pages.ai_profile_summary.as_deref(),
            PageKind::PetProfile => self.pages.pet_profile_summary.as_deref(),
            PageKind::Quest => self.pages.quest_summary.as_deref(),
        };
        configured.unwrap_or_else(|| kind.default_summary())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Ability,
    AiProfile,
    PetProfile,
    Quest,
}

impl PageKind {
    pub fn default_summary(self) -> &'static str {
        match self {
            Self::Ability => "Create ability page",
            Self::AiProfile => "Create AI Profile page",
            Self::PetProfile => "Create Pet Profile page",
            Self::Quest => "Create quest page",
        }
    }
}

/// Load and parse a BotConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<BotConfig> {
    if !config_path.exists() {
        return Ok(BotConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: BotConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Expand the data URL template for one data file.
pub fn render_data_url(template: &str, version: &str, file: &str) -> String {
    template
        .replace("{version}", version)
        .replace("{file}", file)
}

fn env_override(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_has_no_api_url() {
        let config = BotConfig::default();
        assert!(config.wiki.api_url.is_none());
        assert!(config.cdn.data_url.is_none());
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/config.toml")).expect("load config");
        assert_eq!(config, BotConfig::default());
    }

    #[test]
    fn load_config_parses_all_sections() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[wiki]
api_url = "https://wiki.example.org/api.php"
user_agent = "test-agent/1.0"

[cdn]
version_url = "http://localhost/fileversion.txt"
data_url = "http://localhost/{version}/{file}.json"

[pages]
pet_profile_prefix = "PetP:"
quest_summary = "Add quest"
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(
            config.wiki.api_url.as_deref(),
            Some("https://wiki.example.org/api.php")
        );
        assert_eq!(config.wiki.user_agent.as_deref(), Some("test-agent/1.0"));
        assert_eq!(
            config.cdn.version_url.as_deref(),
            Some("http://localhost/fileversion.txt")
        );
        assert_eq!(config.pet_profile_prefix(), "PetP:");
        assert_eq!(config.summary_for(PageKind::Quest), "Add quest");
        assert_eq!(
            config.summary_for(PageKind::Ability),
            "Create ability page"
        );
    }

    #[test]
    fn load_config_tolerates_partial_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[cdn]\nversion_url = \"http://x\"\n").expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert!(config.wiki.api_url.is_none());
        assert_eq!(config.pet_profile_prefix(), DEFAULT_PET_PROFILE_PREFIX);
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[wiki\napi_url = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn render_data_url_substitutes_placeholders() {
        assert_eq!(
            render_data_url(DEFAULT_DATA_URL, "452", "abilities"),
            "http://cdn.projectgorgon.com/v452/data/abilities.json"
        );
    }
}
