use crate::utils::error::SlackcatError;
use colored::Colorize;

pub const PROGRAM_TAG: &str = "slackcat";

pub fn output(msg: &str) {
    println!("{} {}", PROGRAM_TAG.cyan().bold(), msg);
}

/// Fatal errors: one red line on stderr, exit 1.
pub fn exit_err(err: &SlackcatError) -> ! {
    tracing::error!(
        "❌ {} (category: {:?}), 💡 {}",
        err,
        err.category(),
        err.recovery_suggestion()
    );
    eprintln!(
        "{} {}",
        PROGRAM_TAG.cyan().bold(),
        err.user_friendly_message().red()
    );
    std::process::exit(1);
}
