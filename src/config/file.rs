use crate::utils::error::{Result, SlackcatError};
use crate::utils::validation::{validate_non_empty_string, Validate};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Team name used when the config file is a bare legacy token.
pub const LEGACY_TEAM: &str = "default";

/// On-disk settings: named team tokens plus the defaults used when
/// `--channel` leaves the team or the channel out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackcatConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_channel: Option<String>,
    #[serde(default)]
    pub teams: BTreeMap<String, String>,
}

/// `<config dir>/slackcat/config.toml`.
pub fn default_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("slackcat").join("config.toml"))
        .ok_or_else(|| SlackcatError::config("could not determine config directory"))
}

/// `~/.slackcat`, the single-token file older installs used.
pub fn legacy_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".slackcat"))
}

/// Picks the config file to read. The flag wins, then the default location,
/// then the legacy file. The bool says whether the chosen file exists.
pub fn locate(explicit: Option<&Path>) -> Result<(PathBuf, bool)> {
    if let Some(path) = explicit {
        return Ok((path.to_path_buf(), path.exists()));
    }
    let default = default_path()?;
    if default.exists() {
        return Ok((default, true));
    }
    if let Some(legacy) = legacy_path().filter(|p| p.is_file()) {
        return Ok((legacy, true));
    }
    Ok((default, false))
}

impl SlackcatConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            SlackcatError::ConfigParse { message, .. } => SlackcatError::ConfigParse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content);

        match toml::from_str::<Self>(&processed) {
            Ok(config) => Ok(config),
            Err(e) => match legacy_token(&processed) {
                Some(token) => {
                    tracing::debug!("treating config as a legacy single-token file");
                    let mut config = Self::default();
                    config.add_team(LEGACY_TEAM, token);
                    Ok(config)
                }
                None => Err(SlackcatError::ConfigParse {
                    path: "<inline>".to_string(),
                    message: e.to_string().trim().replace('\n', " "),
                }),
            },
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = toml::to_string_pretty(self).map_err(|e| SlackcatError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, body)?;
        Ok(())
    }

    /// Adds or replaces a team. The first team added becomes the default.
    pub fn add_team(&mut self, name: &str, token: &str) {
        self.teams.insert(name.to_string(), token.trim().to_string());
        if self.default_team.is_none() {
            self.default_team = Some(name.to_string());
        }
    }

    /// Splits a `--channel` value into `(team, channel)`.
    ///
    /// `team:channel` names both; a bare channel uses the default team; an
    /// empty value falls back to `default_channel`, which may itself carry a
    /// team prefix.
    pub fn parse_channel_opt(&self, opt: &str) -> Result<(String, String)> {
        let opt = opt.trim();
        let channel = if opt.is_empty() {
            match self.default_channel.as_deref() {
                Some(c) if !c.trim().is_empty() => c.trim(),
                _ => return Err(SlackcatError::config("no channel provided")),
            }
        } else {
            opt
        };

        match channel.split_once(':') {
            Some((team, name)) if !team.is_empty() && !name.is_empty() => {
                Ok((team.to_string(), name.to_string()))
            }
            Some(_) => Err(SlackcatError::InvalidConfigValue {
                field: "channel".to_string(),
                value: channel.to_string(),
                reason: "expected team:channel".to_string(),
            }),
            None => Ok((self.default_team()?.to_string(), channel.to_string())),
        }
    }

    fn default_team(&self) -> Result<&str> {
        if let Some(team) = self.default_team.as_deref() {
            return Ok(team);
        }
        // A lone team is the default even without `default_team`.
        match self.teams.keys().next() {
            Some(team) if self.teams.len() == 1 => Ok(team.as_str()),
            _ => Err(SlackcatError::config(
                "no team given and no default_team configured",
            )),
        }
    }

    pub fn token_for(&self, team: &str) -> Result<&str> {
        match self.teams.get(team) {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(SlackcatError::config(format!("no such team: {}", team))),
        }
    }
}

impl Validate for SlackcatConfig {
    fn validate(&self) -> Result<()> {
        for (team, token) in &self.teams {
            validate_non_empty_string(&format!("teams.{}", team), token)?;
        }
        if let Some(team) = &self.default_team {
            if !self.teams.contains_key(team) {
                return Err(SlackcatError::InvalidConfigValue {
                    field: "default_team".to_string(),
                    value: team.clone(),
                    reason: "no token configured for this team".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Replaces `${VAR}` with the environment value; unknown variables stay as-is.
fn substitute_env_vars(content: &str) -> String {
    let re = match Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return content.to_string(),
    };
    re.replace_all(content, |caps: &Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .into_owned()
}

fn legacy_token(content: &str) -> Option<&str> {
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
    let token = lines.next()?;
    if lines.next().is_some() || token.contains('=') || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}
