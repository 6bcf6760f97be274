use crate::config::file::SlackcatConfig;
use crate::utils::error::{Result, SlackcatError};
use crate::utils::validation::validate_non_empty_string;
use std::io::{BufRead, Write};
use std::path::Path;

pub const AUTHORIZE_URL: &str = "https://slackcat.chat/configure";

/// Interactive `--configure`: asks for a team nickname and token, then merges
/// them into the config file at `path`.
pub fn configure<R: BufRead, W: Write>(path: &Path, input: &mut R, out: &mut W) -> Result<()> {
    writeln!(
        out,
        "Creating a token for slackcat. Authorize the app in your browser:\n\n  {}\n",
        AUTHORIZE_URL
    )?;

    let team = prompt(input, out, "nickname for this team (e.g. work): ")?;
    validate_non_empty_string("team", &team)?;
    if team.contains(':') {
        return Err(SlackcatError::InvalidConfigValue {
            field: "team".to_string(),
            value: team,
            reason: "team nicknames cannot contain ':'".to_string(),
        });
    }
    let token = prompt(input, out, "token: ")?;
    validate_non_empty_string("token", &token)?;

    let mut config = if path.exists() {
        SlackcatConfig::from_file(path)?
    } else {
        SlackcatConfig::default()
    };
    config.add_team(&team, &token);
    config.save(path)?;

    tracing::info!("saved team {} to {}", team, path.display());
    writeln!(out, "added team {} to {}", team, path.display())?;
    Ok(())
}

fn prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, label: &str) -> Result<String> {
    write!(out, "{}", label)?;
    out.flush()?;
    let mut answer = String::new();
    if input.read_line(&mut answer).map_err(SlackcatError::Input)? == 0 {
        return Err(SlackcatError::config("configuration aborted"));
    }
    Ok(answer.trim().to_string())
}
