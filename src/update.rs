// Daily update check. Best effort: every failure here is swallowed and the
// command carries on.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

const DATE_FORMAT: &str = "%Y%m%d";
const CHECK_TIMEOUT: Duration = Duration::from_secs(5);
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now: DateTime<Local> = Local::now();
        now.naive_local()
    }
}

/// Where the newest published version is looked up.
///
/// `Ok(None)` means the registry answered without a usable release (a
/// non-success status or no published version). `Err` means no answer.
pub trait ReleaseSource {
    fn latest_version(&self) -> Result<Option<String>>;
}

pub struct CratesIo {
    client: Client,
    url: String,
}

impl CratesIo {
    pub fn new() -> Result<Self> {
        Self::with_url(format!("https://crates.io/api/v1/crates/{CRATE_NAME}"))
    }

    /// Queries `url` instead of crates.io, e.g. a registry mirror.
    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(CHECK_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[derive(Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateInfo,
}

#[derive(Deserialize)]
struct CrateInfo {
    #[serde(default)]
    max_stable_version: Option<String>,
    #[serde(default)]
    max_version: Option<String>,
}

impl ReleaseSource for CratesIo {
    fn latest_version(&self) -> Result<Option<String>> {
        let res = self.client.get(&self.url).send()?;
        if !res.status().is_success() {
            debug!(status = %res.status(), "registry has no release for us");
            return Ok(None);
        }
        let body: CrateResponse = res.json()?;
        Ok(body.krate.max_stable_version.or(body.krate.max_version))
    }
}

#[derive(Serialize, Deserialize, Default)]
struct CheckState {
    #[serde(default)]
    last_update_check: Option<String>,
}

/// Leading `major.minor.patch` numbers; missing parts count as zero.
fn version_tuple(version: &str) -> Option<(u64, u64, u64)> {
    let mut parts = version
        .split(['.', '-', '+'])
        .take(3)
        .map(|p| p.parse::<u64>());
    let major = parts.next()?.ok()?;
    let minor = parts.next().unwrap_or(Ok(0)).ok()?;
    let patch = parts.next().unwrap_or(Ok(0)).ok()?;
    Some((major, minor, patch))
}

pub struct UpdateChecker<C, R> {
    clock: C,
    source: R,
    state_path: PathBuf,
    current_version: String,
}

impl<C: Clock, R: ReleaseSource> UpdateChecker<C, R> {
    pub fn new(clock: C, source: R, state_path: PathBuf, current_version: &str) -> Self {
        Self {
            clock,
            source,
            state_path,
            current_version: current_version.to_string(),
        }
    }

    fn last_check(&self) -> NaiveDateTime {
        let never = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default();
        let date = fs::read_to_string(&self.state_path)
            .ok()
            .and_then(|s| serde_json::from_str::<CheckState>(&s).ok())
            .and_then(|state| state.last_update_check)
            .and_then(|d| NaiveDate::parse_from_str(&d, DATE_FORMAT).ok())
            .unwrap_or(never);
        date.and_time(NaiveTime::MIN)
    }

    /// Whether a day has passed since the last recorded check.
    pub fn is_due(&self) -> bool {
        self.last_check() + chrono::Duration::days(1) < self.clock.now()
    }

    /// Returns a notice when a newer release exists. Never fails.
    pub fn check(&self) -> Option<String> {
        if !self.is_due() {
            return None;
        }
        let latest = match self.source.latest_version() {
            Ok(Some(v)) => v,
            Ok(None) => {
                self.record_check();
                return None;
            }
            Err(e) => {
                debug!(error = %e, "update check failed");
                return None;
            }
        };
        let Some(latest_tuple) = version_tuple(&latest) else {
            debug!(%latest, "unparseable release version");
            return None;
        };
        self.record_check();
        let newer = version_tuple(&self.current_version).is_some_and(|current| latest_tuple > current);
        newer.then(|| {
            format!(
                "Update available: {} -> {latest}. Run \"cargo install {CRATE_NAME}\"",
                self.current_version
            )
        })
    }

    fn record_check(&self) {
        if let Err(e) = self.write_state() {
            debug!(error = %e, "could not record update check");
        }
    }

    fn write_state(&self) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let state = CheckState {
            last_update_check: Some(self.clock.now().format(DATE_FORMAT).to_string()),
        };
        fs::write(&self.state_path, serde_json::to_string(&state)?)?;
        Ok(())
    }
}
