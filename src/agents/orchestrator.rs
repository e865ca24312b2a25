use crate::agents::backup::{BackupArtifact, BackupManager};
use crate::agents::merge::{MergeEngine, MergeManifest, MergeReport};
use crate::agents::project_scanner::ProjectState;
use crate::agents::stage::{FetchAndStageManager, ScratchGuard, StagedBundle};
use crate::agents::version_oracle::{Decision, InstalledCli, UpdateOptions, VersionOracle};
use crate::config::Settings;
use crate::error::{Result, VintageError};
use crate::remote::RemoteSource;
use crate::utils::ui::{self, highlight};
use semver::Version;
use std::fmt;
use std::io;
use std::thread;
use tracing::{debug, warn};

/// States of one `update-project` run.
///
/// `Idle -> CheckingVersion -> {UpToDate | CliOutdated | BackingUp -> Downloading ->
/// Settling -> Merging -> CleaningUp -> Done}`; any working state may move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    Idle,
    CheckingVersion,
    UpToDate,
    CliOutdated,
    BackingUp,
    Downloading,
    Settling,
    Merging,
    CleaningUp,
    Done,
    Failed,
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UpdateStage::Idle => "idle",
            UpdateStage::CheckingVersion => "checking versions",
            UpdateStage::UpToDate => "up to date",
            UpdateStage::CliOutdated => "cli outdated",
            UpdateStage::BackingUp => "backing up the project",
            UpdateStage::Downloading => "downloading the template bundle",
            UpdateStage::Settling => "settling the staged bundle",
            UpdateStage::Merging => "merging template files",
            UpdateStage::CleaningUp => "cleaning up",
            UpdateStage::Done => "done",
            UpdateStage::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub enum UpdateOutcome {
    UpToDate {
        installed: Version,
    },
    CliOutdated {
        installed: Version,
        latest: Version,
    },
    Updated {
        from: Option<Version>,
        to: Version,
        backup: BackupArtifact,
        merge: MergeReport,
    },
}

/// UpdateOrchestrator sequences version check, backup, staging, merge and cleanup
pub struct UpdateOrchestrator<'a> {
    settings: &'a Settings,
    remote: &'a dyn RemoteSource,
    cli: &'a InstalledCli,
    manifest: MergeManifest,
    history: Vec<UpdateStage>,
}

impl<'a> UpdateOrchestrator<'a> {
    pub fn new(settings: &'a Settings, remote: &'a dyn RemoteSource, cli: &'a InstalledCli) -> Self {
        Self {
            settings,
            remote,
            cli,
            manifest: MergeManifest::default(),
            history: vec![UpdateStage::Idle],
        }
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[UpdateStage] {
        &self.history
    }

    pub fn stage(&self) -> UpdateStage {
        self.history.last().copied().unwrap_or(UpdateStage::Idle)
    }

    fn enter(&mut self, stage: UpdateStage) {
        debug!(from = %self.stage(), to = %stage, "update stage");
        self.history.push(stage);
    }

    /// Record the failure and tag the error with the stage that produced it.
    fn halt(&mut self, stage: UpdateStage, err: VintageError) -> VintageError {
        self.enter(UpdateStage::Failed);
        ui::warn(format!("Update failed while {stage}: {err}"));
        VintageError::Pipeline {
            stage,
            source: Box::new(err),
        }
    }

    pub fn run(&mut self, project: &ProjectState, options: UpdateOptions) -> Result<UpdateOutcome> {
        let settings = self.settings;
        let working_dir = project.working_directory.as_path();

        self.enter(UpdateStage::CheckingVersion);
        ui::say("Checking, if update is available for you...");
        let oracle = VersionOracle::new(self.remote, settings, self.cli);
        let decision = oracle
            .check_for_update(project, options)
            .map_err(|e| self.halt(UpdateStage::CheckingVersion, e))?;

        let (from, to) = match decision {
            Decision::UpToDate { installed } => {
                self.enter(UpdateStage::UpToDate);
                ui::say("You have the latest version of vintage-frontend already!");
                return Ok(UpdateOutcome::UpToDate { installed });
            }
            Decision::CliOutdated { installed, latest } => {
                self.enter(UpdateStage::CliOutdated);
                ui::say("Version of installed vintage-cli is not the latest!");
                ui::say(format!(
                    "Please, update vintage-cli first: {}",
                    highlight("vintage update")
                ));
                ui::say(format!("The latest version is: {}", highlight(latest.to_string())));
                ui::say(format!("Installed version is: {}", highlight(installed.to_string())));
                return Ok(UpdateOutcome::CliOutdated { installed, latest });
            }
            Decision::UpdateConfirmed {
                installed,
                latest,
                forced,
            } => {
                if forced {
                    ui::say("Force update!");
                } else {
                    ui::say(format!(
                        "Ok, new version {} is available. Let's do it!",
                        highlight(latest.to_string())
                    ));
                }
                (installed, latest)
            }
        };

        self.enter(UpdateStage::BackingUp);
        ui::say("Please, wait for a minute, while I'm creating backup of your current project...");
        let pb = ui::spinner("copying project files");
        let backup = BackupManager::new(&settings.scratch_dir).create_backup(working_dir);
        pb.finish_and_clear();
        let backup = backup.map_err(|e| self.halt(UpdateStage::BackingUp, e))?;
        ui::say(format!(
            "Backup has been created ({} files). Folder name is: \"{}\"",
            backup.files,
            highlight(backup.path.display().to_string())
        ));

        self.enter(UpdateStage::Downloading);
        let stager = FetchAndStageManager::new(self.remote, working_dir, &settings.scratch_dir);
        let bundle_url = settings.bundle_url_for(&to.to_string());
        ui::say(format!("Downloading vintage-frontend {}...", highlight(to.to_string())));
        // scratch is left in place on this path so the failure can be inspected
        let staged = stager
            .fetch_and_stage(&bundle_url)
            .map_err(|e| self.halt(UpdateStage::Downloading, e))?;
        let guard = ScratchGuard::new(stager.scratch_path());
        debug!(files = staged.files, root = %staged.root.display(), "bundle ready");
        ui::say("New version has been downloaded successfully.");

        let merged = self.settle(&staged).and_then(|()| {
            self.enter(UpdateStage::Merging);
            ui::say("Updating gulp tasks, webpack config and package.json...");
            MergeEngine::new(self.manifest.clone()).apply_merge(&staged.root, working_dir)
        });

        let merge = match merged {
            Ok(report) => report,
            Err(err) => {
                let failed_at = self.stage();
                self.enter(UpdateStage::CleaningUp);
                if let Err(cleanup_err) = guard.cleanup() {
                    warn!(error = %cleanup_err, "scratch cleanup after failed merge");
                }
                ui::warn(format!(
                    "Files may be partially updated. Your backup is in \"{}\"",
                    backup.path.display()
                ));
                return Err(self.halt(failed_at, err));
            }
        };

        for entry in &merge.missing {
            ui::warn(format!("\"{entry}\" was not found in the new template, skipped"));
        }

        self.enter(UpdateStage::CleaningUp);
        guard
            .cleanup()
            .map_err(|e| self.halt(UpdateStage::CleaningUp, e))?;

        self.enter(UpdateStage::Done);
        ui::say(format!(
            "vintage-frontend has been updated to {}!",
            highlight(to.to_string())
        ));

        Ok(UpdateOutcome::Updated {
            from,
            to,
            backup,
            merge,
        })
    }

    /// Staging already synced every extracted file; this only confirms the bundle is
    /// where it should be and applies the optional configured pause.
    fn settle(&mut self, staged: &StagedBundle) -> Result<()> {
        self.enter(UpdateStage::Settling);

        if !staged.root.is_dir() {
            return Err(VintageError::fs(
                &staged.root,
                io::Error::new(io::ErrorKind::NotFound, "staged bundle disappeared"),
            ));
        }

        let delay = self.settings.settle_delay();
        if !delay.is_zero() {
            ui::say(format!(
                "I'll wait for {} seconds to be sure, that all new files are on your disk already.",
                delay.as_secs()
            ));
            thread::sleep(delay);
        }

        Ok(())
    }
}
