use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

const PREFIX: &str = "[vintage]:";

/// Print a status line with the CLI prefix.
pub fn say(message: impl AsRef<str>) {
    println!("{} {}", PREFIX.black().on_white(), message.as_ref().bold());
}

/// Print a failure line with the CLI prefix.
pub fn warn(message: impl AsRef<str>) {
    println!("{} {}", PREFIX.black().on_white(), message.as_ref().red().bold());
}

/// Inverse-video highlight for versions, paths and commands inside a status line.
pub fn highlight(value: impl AsRef<str>) -> String {
    value.as_ref().black().on_white().bold().to_string()
}

/// Ticking spinner for long silent steps. Drawn only when stderr is a terminal.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    spinner_with(message, std::io::stderr().is_terminal())
}

fn spinner_with(message: impl Into<String>, visible: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if !visible {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner} {msg} ({elapsed})") {
        pb.set_style(style);
    }
    pb.set_message(message.into());
    if visible {
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb
}
