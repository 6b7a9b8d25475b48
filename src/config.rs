use serde::Deserialize;

use crate::sanitize::SanitizePolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub fs: FsConfig,
    #[serde(default)]
    pub sanitizer: SanitizerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HostSection {
    #[serde(default = "default_host_name")]
    pub name: String,
    /// Turns on debug-level logging when RUST_LOG is not set
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FsConfig {
    /// Seeded at startup, in order. Parents must come before children.
    #[serde(default = "default_directories")]
    pub directories: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SanitizerConfig {
    #[serde(default = "SanitizePolicy::default_elements")]
    pub allowed_elements: Vec<String>,
    #[serde(default = "SanitizePolicy::default_attributes")]
    pub allowed_attributes: Vec<String>,
}

fn default_host_name() -> String {
    "cellhost".to_string()
}

fn default_directories() -> Vec<String> {
    [
        "/system",
        "/system/apps",
        "/system/config",
        "/user",
        "/user/documents",
        "/user/downloads",
        "/user/desktop",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            name: default_host_name(),
            debug: false,
        }
    }
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            directories: default_directories(),
        }
    }
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            allowed_elements: SanitizePolicy::default_elements(),
            allowed_attributes: SanitizePolicy::default_attributes(),
        }
    }
}

impl HostConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn sanitize_policy(&self) -> SanitizePolicy {
        SanitizePolicy::new(
            self.sanitizer.allowed_elements.iter().cloned(),
            self.sanitizer.allowed_attributes.iter().cloned(),
        )
    }
}
