//! User account storage, one JSON document per account

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

type HmacSha256 = Hmac<Sha256>;

/// Prefix identifying the current password hash scheme
const HASH_SCHEME: &str = "h1";
const SALT_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse user record: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("user exists")]
    UserExists,

    #[error("invalid username")]
    InvalidUsername,

    #[error("no such user")]
    UnknownUser,

    #[error("failed to derive password hash")]
    Hash,
}

/// On-disk user record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default = "chrono::Utc::now")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// File-backed user store. Usernames are unique case-insensitively;
/// the record keeps the casing used at signup.
#[derive(Clone)]
pub struct UserStore {
    dir: PathBuf,
}

impl UserStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// 3-20 characters drawn from [A-Za-z0-9_-]
    pub fn valid_username(username: &str) -> bool {
        (3..=20).contains(&username.len())
            && username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    pub async fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    fn user_path(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{}.json", username.to_lowercase()))
    }

    pub async fn exists(&self, username: &str) -> bool {
        if !Self::valid_username(username) {
            return false;
        }
        fs::try_exists(self.user_path(username)).await.unwrap_or(false)
    }

    pub async fn load(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        if !Self::valid_username(username) {
            return Ok(None);
        }
        match fs::read_to_string(self.user_path(username)).await {
            Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    /// Create a new account. `create_new` makes the uniqueness check
    /// atomic even for concurrent signups of the same name. The
    /// username check here also keeps arbitrary input out of file
    /// names.
    pub async fn create(&self, username: &str, password: &str) -> Result<UserRecord, StoreError> {
        if !Self::valid_username(username) {
            return Err(StoreError::InvalidUsername);
        }

        let record = UserRecord {
            username: username.to_string(),
            password: hash_password(password)?,
            wins: 0,
            losses: 0,
            created_at: chrono::Utc::now(),
        };
        let body = serde_json::to_string_pretty(&record)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.user_path(username))
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::AlreadyExists => StoreError::UserExists,
                _ => StoreError::Io(err),
            })?;
        file.write_all(body.as_bytes()).await?;
        Ok(record)
    }

    /// Check a username/password pair. Unknown users and wrong
    /// passwords both come back as `None` so callers cannot tell
    /// them apart.
    pub async fn verify(&self, username: &str, password: &str) -> Result<Option<UserRecord>, StoreError> {
        let Some(record) = self.load(username).await? else {
            return Ok(None);
        };
        if verify_password(&record.password, password) {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    pub async fn set_password(&self, username: &str, new_password: &str) -> Result<(), StoreError> {
        let mut record = self.load(username).await?.ok_or(StoreError::UnknownUser)?;
        record.password = hash_password(new_password)?;
        self.save(&record).await
    }

    /// Bump win/loss counters after a decided match.
    pub async fn record_result(&self, username: &str, won: bool) -> Result<(), StoreError> {
        let mut record = self.load(username).await?.ok_or(StoreError::UnknownUser)?;
        if won {
            record.wins += 1;
        } else {
            record.losses += 1;
        }
        self.save(&record).await
    }

    async fn save(&self, record: &UserRecord) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(record)?;
        fs::write(self.user_path(&record.username), body).await?;
        Ok(())
    }
}

/// Produce a `h1$<salt>$<mac>` hash with a fresh random salt.
fn hash_password(password: &str) -> Result<String, StoreError> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let mac = sign(&salt, password)?;
    Ok(format!(
        "{}${}${}",
        HASH_SCHEME,
        STANDARD.encode(salt),
        STANDARD.encode(mac)
    ))
}

fn sign(salt: &[u8], password: &str) -> Result<Vec<u8>, StoreError> {
    let mut mac = HmacSha256::new_from_slice(salt).map_err(|_| StoreError::Hash)?;
    mac.update(password.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn verify_password(stored: &str, password: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(salt_b64), Some(mac_b64)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != HASH_SCHEME || parts.next().is_some() {
        return false;
    }
    let (Ok(salt), Ok(expected)) = (STANDARD.decode(salt_b64), STANDARD.decode(mac_b64)) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(&salt) else {
        return false;
    };
    mac.update(password.as_bytes());
    mac.verify_slice(&expected).is_ok()
}
