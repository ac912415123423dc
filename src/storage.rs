use crate::provider::UserData;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::{
    fs,
    io::ErrorKind,
    path::{
        Path,
        PathBuf,
    },
};

const STACKS_HOME: &str = ".stacks";
const SESSION_FILE: &str = "arcade-session.json";
const WALLETS_DIR: &str = "wallets";
const LOGS_DIR: &str = "logs";

fn stacks_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(STACKS_HOME))
}

pub fn default_session_path() -> Result<PathBuf> {
    Ok(stacks_home()?.join(SESSION_FILE))
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    Ok(stacks_home()?.join(WALLETS_DIR))
}

pub fn default_log_dir() -> Result<PathBuf> {
    Ok(stacks_home()?.join(LOGS_DIR))
}

/// Expands `~` in a user-supplied path, or falls back to `default`.
pub fn resolve_path(
    raw: Option<&str>,
    default: impl FnOnce() -> Result<PathBuf>,
) -> Result<PathBuf> {
    match raw {
        Some(raw) => Ok(PathBuf::from(shellexpand::tilde(raw).into_owned())),
        None => default(),
    }
}

/// The wallet's persisted account data, one JSON document on disk.
#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `None` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<UserData>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).wrap_err_with(|| {
                    format!("Failed to read session file {}", self.path.display())
                });
            }
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let user_data = serde_json::from_slice::<UserData>(&data)
            .wrap_err("Failed to parse session file JSON")?;
        Ok(Some(user_data))
    }

    pub fn save(&self, user_data: &UserData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).wrap_err_with(|| {
                    format!("Failed to create session directory {}", parent.display())
                })?;
            }
        }
        let json =
            serde_json::to_vec_pretty(user_data).wrap_err("Failed to serialize session")?;
        fs::write(&self.path, json).wrap_err("Failed to write session file")?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).wrap_err_with(|| {
                format!("Failed to remove session file {}", self.path.display())
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
