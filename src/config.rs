use crate::error::{Result, VintageError};
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "vintage.toml";

const DEFAULT_CLI_METADATA_URL: &str =
    "https://raw.githubusercontent.com/vintage-web-production/vintage-cli/master/package.json";
const DEFAULT_TEMPLATE_METADATA_URL: &str = "https://raw.githubusercontent.com/vintage-web-production/generator-vintage-frontend/master/package.json";
const DEFAULT_BUNDLE_URL: &str = "https://codeload.github.com/vintage-web-production/generator-vintage-frontend/tar.gz/refs/tags/v{version}";

/// Runtime settings, loaded from `vintage.toml` or built-in defaults.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    pub cli_metadata_url: String,
    pub template_metadata_url: String,
    /// Archive URL; `{version}` is replaced with the latest template version.
    pub bundle_url: String,
    pub request_timeout_secs: u64,
    /// Extra pause between staging and merging. Staging already fsyncs every file.
    pub settle_delay_secs: u64,
    pub scratch_dir: String,
    pub marker_file: String,
    /// Directory of an npm-installed CLI whose `package.json` names the installed version.
    pub cli_root: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cli_metadata_url: DEFAULT_CLI_METADATA_URL.to_string(),
            template_metadata_url: DEFAULT_TEMPLATE_METADATA_URL.to_string(),
            bundle_url: DEFAULT_BUNDLE_URL.to_string(),
            request_timeout_secs: 60,
            settle_delay_secs: 0,
            scratch_dir: ".vintage-update".to_string(),
            marker_file: "vintage-frontend.json".to_string(),
            cli_root: None,
        }
    }
}

impl Settings {
    /// Resolve settings for a project: explicit file, then `vintage.toml`, then defaults.
    pub fn load(project_path: &Path, explicit: Option<&Path>) -> Result<Self> {
        let settings = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let candidate = project_path.join(DEFAULT_CONFIG_FILE);
                if candidate.is_file() {
                    Self::from_file(&candidate)?
                } else {
                    Self::default()
                }
            }
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            VintageError::Config(format!("Failed to read '{}': {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            VintageError::Config(format!("Failed to parse '{}': {e}", path.display()))
        })
    }

    fn validate(&self) -> Result<()> {
        Self::validate_url("cli-metadata-url", &self.cli_metadata_url)?;
        Self::validate_url("template-metadata-url", &self.template_metadata_url)?;
        Self::validate_url("bundle-url", &self.bundle_url_for("0.0.0"))?;

        if !self.bundle_url.contains("{version}") {
            tracing::warn!(
                "bundle-url has no {{version}} placeholder; every update downloads the same archive"
            );
        }

        let scratch = Path::new(&self.scratch_dir);
        let mut components = scratch.components();
        let single_name = matches!(components.next(), Some(Component::Normal(_)))
            && components.next().is_none();
        if !single_name {
            return Err(VintageError::Config(format!(
                "scratch-dir must be a single relative directory name, got '{}'",
                self.scratch_dir
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(VintageError::Config(
                "request-timeout-secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_url(key: &str, value: &str) -> Result<()> {
        let url = Url::parse(value)
            .map_err(|e| VintageError::Config(format!("{key} '{value}' is not a valid URL: {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(VintageError::Config(format!(
                "{key} must use http or https, got '{other}'"
            ))),
        }
    }

    pub fn bundle_url_for(&self, version: &str) -> String {
        self.bundle_url.replace("{version}", version)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}
