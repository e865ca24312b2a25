use crate::error::{Result, VintageError};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

/// TaskRunnerAgent hands work to external tools: npm scripts, the npm self-update and
/// the project generator
pub struct TaskRunnerAgent {
    project_path: PathBuf,
}

impl TaskRunnerAgent {
    pub fn new<P: AsRef<Path>>(project_path: P) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
        }
    }

    /// `npm run <task>` inside the project
    pub fn run_task(&self, task: &str) -> Result<()> {
        if task.is_empty() || task.starts_with('-') {
            return Err(VintageError::TaskExecution(format!(
                "'{task}' is not a valid task name"
            )));
        }
        self.execute(npm(), &["run", task])
    }

    /// `npm update -g vintage-cli`
    pub fn update_cli(&self) -> Result<()> {
        self.execute(npm(), &["update", "-g", "vintage-cli"])
    }

    /// `yo vintage-frontend`
    pub fn run_generator(&self) -> Result<()> {
        self.execute(yo(), &["vintage-frontend"])
    }

    /// Run a command with inherited stdio so the tool can talk to the user directly
    fn execute(&self, program: &str, args: &[&str]) -> Result<()> {
        debug!(program, ?args, cwd = %self.project_path.display(), "spawning");

        let status = Command::new(program)
            .current_dir(&self.project_path)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| {
                VintageError::TaskExecution(format!("Failed to spawn '{program}': {e}"))
            })?;

        ensure_success(program, args, status)
    }
}

fn ensure_success(program: &str, args: &[&str], status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }

    Err(VintageError::TaskExecution(format!(
        "'{} {}' failed with exit code: {}",
        program,
        args.join(" "),
        status
            .code()
            .map_or_else(|| "terminated by signal".to_string(), |c| c.to_string())
    )))
}

fn npm() -> &'static str {
    if cfg!(target_os = "windows") {
        "npm.cmd"
    } else {
        "npm"
    }
}

fn yo() -> &'static str {
    if cfg!(target_os = "windows") {
        "yo.cmd"
    } else {
        "yo"
    }
}
