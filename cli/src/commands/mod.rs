//! Subcommand implementations, one module per command.

pub mod check;
pub mod completions;
pub mod login;
pub mod upload;

pub use check::run_check;
pub use completions::generate_completions;
pub use login::{run_login, run_logout};
pub use upload::run_upload;
