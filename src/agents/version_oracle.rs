use crate::agents::project_scanner::{PACKAGE_JSON, ProjectState};
use crate::config::Settings;
use crate::error::{Result, VintageError};
use crate::remote::RemoteSource;
use crate::version::{VersionComparator, parse_version};
use semver::Version;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Version of the running CLI, passed explicitly to everything that compares against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledCli {
    pub version: Version,
}

impl InstalledCli {
    /// Uses `<cli_root>/package.json` when a root is configured, otherwise the version
    /// this binary was built with.
    pub fn resolve(cli_root: Option<&Path>) -> Result<Self> {
        match cli_root {
            Some(root) => Self::from_root(root),
            None => Self::from_version(env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn from_root(root: &Path) -> Result<Self> {
        #[derive(Deserialize)]
        struct Manifest {
            version: String,
        }

        let path = root.join(PACKAGE_JSON);
        let bytes = fs::read(&path).map_err(|e| {
            VintageError::Prerequisite(format!(
                "Cannot read installed CLI metadata '{}': {e}",
                path.display()
            ))
        })?;
        let manifest: Manifest = serde_json::from_slice(&bytes).map_err(|e| {
            VintageError::Prerequisite(format!(
                "Installed CLI metadata '{}' has no usable version: {e}",
                path.display()
            ))
        })?;

        Self::from_version(&manifest.version)
    }

    pub fn from_version(raw: &str) -> Result<Self> {
        Ok(Self {
            version: parse_version(raw)?,
        })
    }
}

/// Caller-supplied switches for `update-project`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    pub force: bool,
}

/// What `update-project` should do after comparing installed and published versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    UpToDate {
        installed: Version,
    },
    CliOutdated {
        installed: Version,
        latest: Version,
    },
    UpdateConfirmed {
        installed: Option<Version>,
        latest: Version,
        forced: bool,
    },
}

/// Template status for `vintage version`; never drives the update pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    UpToDate,
    TemplateUpdateAvailable { latest: Version },
}

/// Versions shown by `vintage version`. Remote lookups that failed are kept as errors.
#[derive(Debug)]
pub struct VersionReport {
    pub cli: Result<Decision>,
    pub template: Option<Result<Advisory>>,
}

/// VersionOracle resolves installed and published versions and decides whether to update
pub struct VersionOracle<'a> {
    remote: &'a dyn RemoteSource,
    settings: &'a Settings,
    cli: &'a InstalledCli,
}

impl<'a> VersionOracle<'a> {
    pub fn new(remote: &'a dyn RemoteSource, settings: &'a Settings, cli: &'a InstalledCli) -> Self {
        Self {
            remote,
            settings,
            cli,
        }
    }

    /// Decide whether `update-project` should proceed.
    ///
    /// The CLI check runs first and gates everything else: a stale CLI is never allowed
    /// to update a project, even with `force`.
    pub fn check_for_update(&self, project: &ProjectState, options: UpdateOptions) -> Result<Decision> {
        let cli_decision = self.check_cli()?;
        if matches!(cli_decision, Decision::CliOutdated { .. }) {
            return Ok(cli_decision);
        }

        let installed = installed_template_version(project)?;
        let latest = self.latest_template()?;

        Ok(decide_template(installed, latest, options.force))
    }

    /// Collect everything `vintage version` prints, tolerating network failures.
    pub fn report(&self, project: &ProjectState) -> VersionReport {
        let cli = self.check_cli();

        let template = project.initialized.then(|| {
            let installed = installed_template_version(project)?;
            let latest = self.latest_template()?;
            Ok(advise_template(installed.as_ref(), latest))
        });

        VersionReport { cli, template }
    }

    pub fn installed_cli(&self) -> &Version {
        &self.cli.version
    }

    fn check_cli(&self) -> Result<Decision> {
        let latest = self.latest_cli()?;
        let installed = self.cli.version.clone();

        debug!(%installed, %latest, "cli versions");
        if VersionComparator::is_newer(&latest, &installed) {
            Ok(Decision::CliOutdated { installed, latest })
        } else {
            Ok(Decision::UpToDate { installed })
        }
    }

    fn latest_cli(&self) -> Result<Version> {
        let meta = self.remote.fetch_metadata(&self.settings.cli_metadata_url)?;
        parse_version(&meta.version)
    }

    pub fn latest_template(&self) -> Result<Version> {
        let meta = self
            .remote
            .fetch_metadata(&self.settings.template_metadata_url)?;
        parse_version(&meta.version)
    }
}

fn installed_template_version(project: &ProjectState) -> Result<Option<Version>> {
    project
        .installed_template_version
        .as_deref()
        .map(parse_version)
        .transpose()
}

/// Installed at or ahead of latest is up to date unless forced; an unknown installed
/// version always updates.
pub fn decide_template(installed: Option<Version>, latest: Version, force: bool) -> Decision {
    debug!(?installed, %latest, force, "template versions");

    match installed {
        Some(current) if !force && !VersionComparator::is_newer(&latest, &current) => {
            Decision::UpToDate { installed: current }
        }
        installed => Decision::UpdateConfirmed {
            installed,
            latest,
            forced: force,
        },
    }
}

/// Same ordering as [`decide_template`] without `force`: only a strictly newer
/// published template, or an unknown installed one, is worth mentioning.
pub fn advise_template(installed: Option<&Version>, latest: Version) -> Advisory {
    match installed {
        Some(current) if !VersionComparator::is_newer(&latest, current) => Advisory::UpToDate,
        _ => Advisory::TemplateUpdateAvailable { latest },
    }
}
