use std::path::{Path, PathBuf};
use std::process::Command;

use crate::domain::BucketPrefix;
use crate::error::NaipError;
use crate::listing::{KeyLister, parse_listing};

#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub s3cmd: Option<String>,
}

/// Lists keys by shelling out to `s3cmd ls`.
#[derive(Clone)]
pub struct S3cmdLister {
    s3cmd: Option<PathBuf>,
}

impl S3cmdLister {
    pub fn new() -> Self {
        Self {
            s3cmd: find_in_path("s3cmd"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            s3cmd: Some(program.into()),
        }
    }

    pub fn tool_info(&self) -> ToolInfo {
        ToolInfo {
            s3cmd: self
                .s3cmd
                .as_ref()
                .and_then(|path| tool_version(path, &["--version"])),
        }
    }

    fn require_s3cmd(&self) -> Result<&PathBuf, NaipError> {
        self.s3cmd
            .as_ref()
            .ok_or_else(|| NaipError::MissingTool("s3cmd".to_string()))
    }

    pub fn list_args(prefix: &BucketPrefix) -> Vec<String> {
        vec![
            "ls".to_string(),
            "--recursive".to_string(),
            "--skip-existing".to_string(),
            prefix.url(),
            "--requester-pays".to_string(),
        ]
    }

    fn run_cmd(&self, program: &Path, args: &[String]) -> Result<String, NaipError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| NaipError::Listing(format!("{}: {err}", program.display())))?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed: {} ({})", program.display(), output.status)
        } else {
            stderr
        };
        Err(NaipError::Listing(message))
    }
}

impl Default for S3cmdLister {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyLister for S3cmdLister {
    fn list_keys(&self, prefix: &BucketPrefix) -> Result<Vec<String>, NaipError> {
        let s3cmd = self.require_s3cmd()?;
        let stdout = self.run_cmd(s3cmd, &Self::list_args(prefix))?;
        let keys = parse_listing(&stdout, prefix);
        tracing::debug!(prefix = %prefix, keys = keys.len(), "s3cmd listing parsed");
        Ok(keys)
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

fn tool_version(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(path).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() { None } else { Some(stdout) }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::{DEFAULT_BUCKET, Selection};

    #[test]
    fn list_args_request_recursive_requester_pays() {
        let prefix = BucketPrefix::new(DEFAULT_BUCKET, &Selection::default());
        assert_eq!(
            S3cmdLister::list_args(&prefix),
            vec![
                "ls",
                "--recursive",
                "--skip-existing",
                "s3://aws-naip/md/2013/1m/rgbir/38077/",
                "--requester-pays",
            ]
        );
    }

    #[test]
    fn missing_tool_is_reported() {
        let lister = S3cmdLister { s3cmd: None };
        let prefix = BucketPrefix::new(DEFAULT_BUCKET, &Selection::default());
        let err = lister.list_keys(&prefix).unwrap_err();
        assert_matches!(err, NaipError::MissingTool(_));
    }
}
