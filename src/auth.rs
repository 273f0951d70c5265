// Session provider: obtains a bearer token and wraps it in a `GraphSession`.
//
// Tokens come from `TODO_ACCESS_TOKEN` when set, otherwise from the token
// file written by `todo login`. An expiring token is refreshed with its
// refresh token and written back.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, TodoError};
use crate::session::GraphSession;

pub const SCOPES: &str = "openid offline_access Tasks.ReadWrite";

/// Tokens expiring within this window are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn expires_soon(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) <= now
    }
}

/// Token endpoint response.
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Deserialize, Debug)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// The token file inside the config directory.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<StoredToken>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(serde_json::to_string_pretty(token)?.as_bytes())?;
        debug!(path = %self.path.display(), "token saved");
        Ok(())
    }

    /// Removes the token file; returns whether one existed.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// OAuth 2.0 authorization-code client for the Microsoft identity platform.
pub struct OAuthClient {
    http: Client,
    client_id: String,
    client_secret: Option<String>,
    authority: String,
    redirect_uri: String,
}

impl OAuthClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client_id = config.client_id.clone().ok_or_else(|| {
            TodoError::Config(format!(
                "no OAuth client id; set TODO_CLIENT_ID or add \"client_id\" to {}",
                config.config_dir.join("config.json").display()
            ))
        })?;
        Ok(Self {
            http: Client::builder().build()?,
            client_id,
            client_secret: config.client_secret.clone(),
            authority: config.authority.trim_end_matches('/').to_string(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    pub fn authorization_url(&self) -> Result<String> {
        let url = Url::parse_with_params(
            &format!("{}/oauth2/v2.0/authorize", self.authority),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_mode", "query"),
                ("scope", SCOPES),
            ],
        )
        .map_err(|e| TodoError::Config(format!("invalid authority URL: {e}")))?;
        Ok(url.into())
    }

    pub fn exchange_code(&self, code: &str) -> Result<StoredToken> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<StoredToken> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
    }

    fn token_request(&self, grant: &[(&str, &str)]) -> Result<StoredToken> {
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("scope", SCOPES),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        form.extend_from_slice(grant);

        let url = format!("{}/oauth2/v2.0/token", self.authority);
        let res = self.http.post(&url).form(&form).send()?;
        let status = res.status();
        let body = res.bytes()?;
        if !status.is_success() {
            let message = match serde_json::from_slice::<TokenErrorResponse>(&body) {
                Ok(err) => err.error_description.unwrap_or(err.error),
                Err(_) => format!("token endpoint returned {status}"),
            };
            return Err(TodoError::Auth(message));
        }
        let token: TokenResponse = serde_json::from_slice(&body)?;
        Ok(StoredToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }
}

/// Pulls the authorization code out of the URL the browser was redirected to.
pub fn code_from_redirect(redirect: &str) -> Result<String> {
    let url = Url::parse(redirect.trim())
        .map_err(|e| TodoError::Auth(format!("not a valid URL: {e}")))?;
    let mut code = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }
    if let Some(error) = error {
        return Err(TodoError::Auth(description.unwrap_or(error)));
    }
    code.filter(|c| !c.is_empty())
        .ok_or_else(|| TodoError::Auth("redirect URL carries no authorization code".into()))
}

/// Returns a ready-to-use session, refreshing the stored token if needed.
pub fn get_oauth_session(config: &Config) -> Result<GraphSession> {
    if let Some(token) = &config.access_token {
        debug!("using access token from environment");
        return GraphSession::new(token.clone());
    }

    let store = TokenStore::new(config.token_path());
    let token = store.load()?.ok_or(TodoError::NotAuthenticated)?;
    if !token.expires_soon(Utc::now()) {
        return GraphSession::new(token.access_token);
    }

    let refresh_token = token.refresh_token.as_deref().ok_or(TodoError::NotAuthenticated)?;
    let oauth = OAuthClient::from_config(config)?;
    let mut refreshed = oauth.refresh(refresh_token)?;
    if refreshed.refresh_token.is_none() {
        refreshed.refresh_token = token.refresh_token.clone();
    }
    store.save(&refreshed)?;
    info!("access token refreshed");
    GraphSession::new(refreshed.access_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> Config {
        Config::load_from(dir, |key| match key {
            "TODO_CLIENT_ID" => Some("client-123".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn authorization_url_carries_client_and_scopes() {
        let dir = TempDir::new().unwrap();
        let oauth = OAuthClient::from_config(&config_in(dir.path())).unwrap();
        let url = Url::parse(&oauth.authorization_url().unwrap()).unwrap();
        assert_eq!(url.path(), "/common/oauth2/v2.0/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".into(), "client-123".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("scope".into(), SCOPES.into())));
    }

    #[test]
    fn missing_client_id_is_config_error() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(dir.path(), |_| None).unwrap();
        assert!(matches!(
            OAuthClient::from_config(&config),
            Err(TodoError::Config(_))
        ));
    }

    #[test]
    fn code_is_read_from_redirect() {
        let code = code_from_redirect("https://localhost/login/authorized?code=M.abc-123&state=x").unwrap();
        assert_eq!(code, "M.abc-123");
    }

    #[test]
    fn redirect_error_is_reported() {
        let err = code_from_redirect(
            "https://localhost/login/authorized?error=access_denied&error_description=User+declined",
        )
        .unwrap_err();
        assert!(err.to_string().contains("User declined"));
    }

    #[test]
    fn token_store_round_trip_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::new(dir.path().join("nested").join("token.json"));
        assert_eq!(store.load().unwrap(), None);

        let token = StoredToken {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            expires_at: Utc::now() + Duration::hours(1),
        };
        store.save(&token).unwrap();
        assert_eq!(store.load().unwrap(), Some(token));
        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
    }

    #[test]
    fn expiry_margin_applies() {
        let now = Utc::now();
        let token = StoredToken {
            access_token: "at".into(),
            refresh_token: None,
            expires_at: now + Duration::seconds(30),
        };
        assert!(token.expires_soon(now));
        assert!(!StoredToken {
            expires_at: now + Duration::minutes(10),
            ..token
        }
        .expires_soon(now));
    }

    #[test]
    fn environment_token_wins() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(dir.path(), |key| {
            (key == "TODO_ACCESS_TOKEN").then(|| "env-token".to_string())
        })
        .unwrap();
        assert!(get_oauth_session(&config).is_ok());
    }

    #[test]
    fn no_token_means_not_authenticated() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(dir.path(), |_| None).unwrap();
        assert!(matches!(
            get_oauth_session(&config),
            Err(TodoError::NotAuthenticated)
        ));
    }
}
