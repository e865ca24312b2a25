use crate::agents::orchestrator::UpdateStage;
use crate::agents::version_oracle::Advisory;
use crate::agents::{
    Decision, InstalledCli, ProjectScannerAgent, TaskRunnerAgent, UpdateOptions,
    UpdateOrchestrator, UpdateOutcome, VersionOracle,
};
use crate::config::Settings;
use crate::error::{Result, VintageError};
use crate::remote::HttpRemote;
use crate::utils::path_validator::PathValidator;
use crate::utils::ui::{self, highlight};
use colored::Colorize;
use std::path::Path;
use tracing::debug;

fn load_settings(project_path: &Path, config: Option<&Path>) -> Result<Settings> {
    let project_path = PathValidator::validate_project_path(project_path)?;
    Settings::load(&project_path, config)
}

/// Execute the update-project workflow
pub fn execute_update_project(project_path: &Path, config: Option<&Path>, force: bool) -> Result<()> {
    let settings = load_settings(project_path, config)?;
    let project = ProjectScannerAgent::new(project_path, &settings.marker_file).require_initialized()?;
    let cli = InstalledCli::resolve(settings.cli_root.as_deref())?;
    let remote = HttpRemote::new(settings.request_timeout())?;

    let mut orchestrator = UpdateOrchestrator::new(&settings, &remote, &cli);
    let outcome = orchestrator.run(&project, UpdateOptions { force });
    debug!(stages = ?orchestrator.history(), "update-project finished");

    match outcome {
        Ok(UpdateOutcome::Updated {
            from,
            to,
            backup,
            merge,
        }) => {
            let from = from.map_or_else(|| "unknown".to_string(), |v| v.to_string());
            println!(
                "\n{}",
                format!("✓ vintage-frontend {} → {}", from.red(), to.to_string().green()).bold()
            );
            for entry in &merge.applied {
                println!("  • {}", entry.cyan());
            }
            if merge.is_partial() {
                ui::warn("Some template files were missing and have not been updated.");
            }
            println!("  backup: {}", backup.path.display().to_string().dimmed());
            Ok(())
        }
        Ok(UpdateOutcome::UpToDate { installed }) => {
            debug!(%installed, "template already current");
            Ok(())
        }
        Ok(UpdateOutcome::CliOutdated { installed, latest }) => {
            debug!(%installed, %latest, "cli must be updated before the project");
            Ok(())
        }
        Err(err) => {
            if matches!(
                err.stage(),
                Some(UpdateStage::Merging | UpdateStage::CleaningUp)
            ) {
                ui::warn("Restore files from the backup folder if the project no longer builds.");
            }
            Err(err)
        }
    }
}

/// Execute the version workflow: report installed and published versions
pub fn execute_version(project_path: &Path, config: Option<&Path>) -> Result<()> {
    let settings = load_settings(project_path, config)?;
    let cli = InstalledCli::resolve(settings.cli_root.as_deref())?;
    let project = ProjectScannerAgent::new(project_path, &settings.marker_file).scan()?;
    let remote = HttpRemote::new(settings.request_timeout())?;
    let oracle = VersionOracle::new(&remote, &settings, &cli);

    ui::say(format!(
        "vintage-cli version: \"{}\"",
        highlight(oracle.installed_cli().to_string())
    ));

    let report = oracle.report(&project);
    match report.cli {
        Ok(Decision::CliOutdated { latest, .. }) => {
            ui::say(format!(
                "Update available for vintage-cli. New version is: \"{}\"",
                highlight(latest.to_string())
            ));
            ui::say(format!(
                "Run the command \"{}\" to update vintage-cli.",
                highlight("vintage update")
            ));
        }
        Ok(_) => {}
        Err(e) => ui::warn(format!("Error while fetching vintage-cli version: {e}")),
    }

    if let Some(installed) = &project.installed_template_version {
        ui::say(format!(
            "vintage-frontend version in current project: \"{}\"",
            highlight(installed)
        ));
    }

    match report.template {
        Some(Ok(Advisory::TemplateUpdateAvailable { latest })) => {
            ui::say(format!(
                "Update available for vintage-frontend. New version is: \"{}\"",
                highlight(latest.to_string())
            ));
            ui::say(format!(
                "Run the command \"{}\" to update vintage-frontend in current project.",
                highlight("vintage update-project")
            ));
        }
        Some(Ok(_)) | None => {}
        Some(Err(e)) => ui::warn(format!("Error while fetching vintage-frontend version: {e}")),
    }

    Ok(())
}

/// Execute the run workflow: `npm run <task>` in an initialized project
pub fn execute_run(project_path: &Path, config: Option<&Path>, task: &str) -> Result<()> {
    let settings = load_settings(project_path, config)?;
    let project = ProjectScannerAgent::new(project_path, &settings.marker_file).require_initialized()?;

    ui::say(format!("{} task has been started!", task.underline()));
    TaskRunnerAgent::new(&project.working_directory).run_task(task)
}

/// Execute the init workflow: hand over to the project generator
pub fn execute_init(project_path: &Path, config: Option<&Path>) -> Result<()> {
    let settings = load_settings(project_path, config)?;
    let project = ProjectScannerAgent::new(project_path, &settings.marker_file).scan()?;

    if project.initialized {
        return Err(VintageError::Prerequisite(
            "The project has already been initialized".to_string(),
        ));
    }

    TaskRunnerAgent::new(&project.working_directory).run_generator()
}

/// Execute the self-update workflow through npm
pub fn execute_self_update(project_path: &Path) -> Result<()> {
    ui::say("vintage-cli update has been started!".underline().to_string());
    TaskRunnerAgent::new(project_path).update_cli()
}
