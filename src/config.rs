//! Configuration for the `todo` CLI.
//!
//! Settings come from an optional `config.json` in the config directory,
//! overridden by environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TODO_CONFIG_DIR` | `<config dir>/tod0` | Directory for `config.json`, `token.json`, `update.json` |
//! | `TODO_GRAPH_URL` | `https://graph.microsoft.com/v1.0` | Microsoft Graph root |
//! | `TODO_CLIENT_ID` | - | OAuth application (client) id |
//! | `TODO_CLIENT_SECRET` | - | OAuth client secret, for confidential apps |
//! | `TODO_ACCESS_TOKEN` | - | Bearer token to use instead of the token file |
//! | `TODO_NO_UPDATE_CHECK` | unset | Any value disables the daily update check |

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::api::{lists_base_url, GRAPH_URL};
use crate::error::{Result, TodoError};

const CONFIG_DIR_NAME: &str = "tod0";
const CONFIG_FILE: &str = "config.json";
const TOKEN_FILE: &str = "token.json";
const UPDATE_STATE_FILE: &str = "update.json";

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/common";
pub const DEFAULT_REDIRECT_URI: &str = "https://localhost/login/authorized";

/// Shape of `config.json`; every field is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct FileConfig {
    client_id: Option<String>,
    client_secret: Option<String>,
    authority: Option<String>,
    redirect_uri: Option<String>,
    graph_url: Option<String>,
    update_check: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub config_dir: PathBuf,
    pub graph_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub authority: String,
    pub redirect_uri: String,
    /// Token from the environment; bypasses the token file when set.
    pub access_token: Option<String>,
    pub update_check: bool,
}

impl Config {
    /// Loads `config.json` (if any) and applies environment overrides.
    pub fn load() -> Result<Self> {
        let config_dir = match env::var_os("TODO_CONFIG_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| TodoError::Config("could not determine the config directory".into()))?
                .join(CONFIG_DIR_NAME),
        };
        Self::load_from(&config_dir, |key| env::var(key).ok())
    }

    /// Same as `load`, reading variables through `var` instead of the
    /// process environment.
    pub fn load_from(config_dir: &Path, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file = read_file_config(&config_dir.join(CONFIG_FILE))?;
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let config = Config {
            config_dir: config_dir.to_path_buf(),
            graph_url: non_empty("TODO_GRAPH_URL")
                .or(file.graph_url)
                .unwrap_or_else(|| GRAPH_URL.to_string()),
            client_id: non_empty("TODO_CLIENT_ID").or(file.client_id),
            client_secret: non_empty("TODO_CLIENT_SECRET").or(file.client_secret),
            authority: file.authority.unwrap_or_else(|| DEFAULT_AUTHORITY.to_string()),
            redirect_uri: file
                .redirect_uri
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            access_token: non_empty("TODO_ACCESS_TOKEN"),
            update_check: var("TODO_NO_UPDATE_CHECK").is_none() && file.update_check.unwrap_or(true),
        };
        debug!(config_dir = %config.config_dir.display(), graph_url = %config.graph_url, "configuration loaded");
        Ok(config)
    }

    /// The To Do lists collection every endpoint hangs off.
    pub fn lists_url(&self) -> String {
        lists_base_url(&self.graph_url)
    }

    pub fn token_path(&self) -> PathBuf {
        self.config_dir.join(TOKEN_FILE)
    }

    pub fn update_state_path(&self) -> PathBuf {
        self.config_dir.join(UPDATE_STATE_FILE)
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map_err(|e| TodoError::Config(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(e.into()),
    }
}
