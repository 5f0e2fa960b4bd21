//! Login and logout: save or forget the API token.

use anyhow::{Context as _, Result, bail};
use inquire::Password;
use tracing::{info, instrument};

use crate::config::Config;
use crate::output::Output;

/// Store `token` in `config`; `server` becomes the default base URL when given.
pub fn apply_login(config: &mut Config, token: &str, server: Option<&str>) -> Result<()> {
    if token.trim().is_empty() {
        bail!("Token cannot be empty");
    }
    config.set_token(token);
    if let Some(server) = server {
        config.server.api_url = Some(server.to_owned());
    }
    Ok(())
}

#[instrument(skip_all, name = "login")]
pub fn run_login(token: Option<String>, server: Option<&str>, out: &Output) -> Result<()> {
    let token = match token {
        Some(token) => token,
        None => Password::new("API token:")
            .without_confirmation()
            .with_help_message("Create a token in the knowledge base console")
            .prompt()
            .context("Failed to read token")?,
    };

    let mut config = Config::load()?;
    apply_login(&mut config, &token, server)?;
    let path = config.save()?;

    info!(path = %path.display(), "Token saved");
    out.success(format!("Token saved to {}", path.display()));
    Ok(())
}

#[instrument(skip_all, name = "logout")]
pub fn run_logout(out: &Output) -> Result<()> {
    let mut config = Config::load()?;
    if config.token().is_none() {
        out.dim("Not logged in.");
        return Ok(());
    }
    config.clear_token();
    config.save()?;
    out.success("Logged out");
    Ok(())
}
