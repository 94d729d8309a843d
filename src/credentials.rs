use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::Serialize;

use crate::config::Environment;
use crate::error::NaipError;

pub const S3CMD_CONFIG_FILE: &str = ".s3cfg";
pub const ACCESS_KEY_PLACEHOLDER: &str = "AWS_ACCESS_KEY";
pub const SECRET_KEY_PLACEHOLDER: &str = "AWS_SECRET_KEY";

#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigureOutcome {
    Configured { replaced: usize },
    AlreadyConfigured,
}

/// The s3cmd config file that ships with literal key placeholders.
#[derive(Debug, Clone)]
pub struct S3cmdConfig {
    path: PathBuf,
}

impl S3cmdConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<HOME>/.s3cfg`, falling back to the platform home directory.
    pub fn locate(env: &Environment) -> Result<Self, NaipError> {
        let home = env
            .home
            .clone()
            .or_else(|| BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()))
            .ok_or_else(|| NaipError::MissingEnv(crate::config::HOME_VAR.to_string()))?;
        Ok(Self::new(home.join(S3CMD_CONFIG_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the key placeholders with real credentials. Only rewrites the
    /// file when a placeholder was present, so repeated runs leave it untouched.
    pub fn ensure_configured(
        &self,
        credentials: &AwsCredentials,
    ) -> Result<ConfigureOutcome, NaipError> {
        let content = fs::read_to_string(&self.path).map_err(|err| self.file_error(err))?;
        let replaced = content.matches(ACCESS_KEY_PLACEHOLDER).count()
            + content.matches(SECRET_KEY_PLACEHOLDER).count();
        if replaced == 0 {
            return Ok(ConfigureOutcome::AlreadyConfigured);
        }

        let updated = substitute_placeholders(
            &content,
            &credentials.access_key_id,
            &credentials.secret_access_key,
        );
        self.write_atomic(updated.as_bytes())?;
        tracing::debug!(path = %self.path.display(), replaced, "patched s3cmd config");
        Ok(ConfigureOutcome::Configured { replaced })
    }

    fn write_atomic(&self, content: &[u8]) -> Result<(), NaipError> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::Builder::new()
            .prefix(".s3cfg")
            .tempfile_in(parent)
            .map_err(|err| self.file_error(err))?;
        temp.write_all(content).map_err(|err| self.file_error(err))?;
        if let Ok(metadata) = fs::metadata(&self.path) {
            fs::set_permissions(temp.path(), metadata.permissions())
                .map_err(|err| self.file_error(err))?;
        }
        temp.persist(&self.path)
            .map_err(|err| self.file_error(err.error))?;
        Ok(())
    }

    fn file_error(&self, err: std::io::Error) -> NaipError {
        NaipError::CredentialFile {
            path: self.path.clone(),
            message: err.to_string(),
        }
    }
}

/// Pure text replacement of both placeholders; everything else is passed through.
pub fn substitute_placeholders(content: &str, access_key: &str, secret_key: &str) -> String {
    content
        .replace(ACCESS_KEY_PLACEHOLDER, access_key)
        .replace(SECRET_KEY_PLACEHOLDER, secret_key)
}
