pub mod backup;
pub mod merge;
pub mod orchestrator;
pub mod project_scanner;
pub mod stage;
pub mod task_runner;
pub mod version_oracle;

pub use orchestrator::{UpdateOrchestrator, UpdateOutcome};
pub use project_scanner::ProjectScannerAgent;
pub use task_runner::TaskRunnerAgent;
pub use version_oracle::{Decision, InstalledCli, UpdateOptions, VersionOracle};
