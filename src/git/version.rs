use crate::error::{GitError, GitResult};
use std::fmt;
use std::process::Command;

/// Oldest git we rely on (`status -sb` output format, `--date=short`)
const MIN_GIT_VERSION: GitVersion = GitVersion { major: 2, minor: 20, patch: 0 };

/// Installed git version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GitVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl GitVersion {
    /// Ask the git on PATH for its version
    pub fn detect() -> GitResult<Self> {
        let output = Command::new("git")
            .arg("--version")
            .output()
            .map_err(|e| GitError::GitVersionDetectionFailed(format!("git is not runnable: {}", e)))?;

        if !output.status.success() {
            return Err(GitError::GitVersionDetectionFailed(
                "`git --version` exited with an error".to_string(),
            ));
        }

        Self::parse(&String::from_utf8_lossy(&output.stdout))
    }

    /// Parse `git version X.Y[.Z][.vendor suffix]`, e.g. "git version 2.39.2.windows.1"
    pub fn parse(text: &str) -> GitResult<Self> {
        let number = text
            .trim()
            .strip_prefix("git version ")
            .and_then(|rest| rest.split_whitespace().next())
            .ok_or_else(|| GitError::ParseError(format!("Unexpected git version format: {}", text.trim())))?;

        let mut parts = number.split('.');
        let mut component = |name: &str, required: bool| -> GitResult<u32> {
            match parts.next() {
                Some(raw) => match raw.parse::<u32>() {
                    Ok(value) => Ok(value),
                    // Vendor builds put letters in the patch slot ("2.39.rc0")
                    Err(_) if !required => Ok(0),
                    Err(_) => Err(GitError::ParseError(format!("Invalid {} version: {}", name, raw))),
                },
                None if required => Err(GitError::ParseError(format!(
                    "Version number has no {} component: {}",
                    name, number
                ))),
                None => Ok(0),
            }
        };

        let major = component("major", true)?;
        let minor = component("minor", true)?;
        let patch = component("patch", false)?;

        Ok(GitVersion { major, minor, patch })
    }

    pub fn is_supported(&self) -> bool {
        (self.major, self.minor) >= (MIN_GIT_VERSION.major, MIN_GIT_VERSION.minor)
    }

    /// Detect the installed git and refuse versions older than 2.20
    pub fn validate() -> GitResult<Self> {
        let version = Self::detect()?;

        if !version.is_supported() {
            return Err(GitError::GitVersionTooOld(format!(
                "{}\n\nPlease upgrade git to version {}.{} or higher.",
                version, MIN_GIT_VERSION.major, MIN_GIT_VERSION.minor
            )));
        }

        Ok(version)
    }
}

impl fmt::Display for GitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
