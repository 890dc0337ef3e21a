//! Runtime configuration sourced from the Lambda environment.

use crate::error::{BackupError, Result};

/// Environment variable naming the destination bucket.
pub const BACKUP_BUCKET_ENV: &str = "BACKUP_BUCKET_NAME";

/// Settings the backup pipeline needs at runtime.
#[derive(Debug, Clone)]
pub struct Settings {
    bucket: String,
}

impl Settings {
    /// Build settings from an explicit bucket name.
    pub fn new(bucket: impl Into<String>) -> Result<Self> {
        let bucket = normalize_bucket(&bucket.into())?;
        Ok(Self { bucket })
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var(BACKUP_BUCKET_ENV)
            .map_err(|_| BackupError::config(format!("{} is not set", BACKUP_BUCKET_ENV)))?;
        Self::new(raw)
    }

    /// Destination bucket for backup objects.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Accept either a bare bucket name or a full bucket ARN.
fn normalize_bucket(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let name = match raw.rsplit_once(':') {
        Some((_, tail)) => tail,
        None => raw,
    };
    if name.is_empty() {
        return Err(BackupError::config(format!(
            "{} does not name a bucket: {:?}",
            BACKUP_BUCKET_ENV, raw
        )));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_bucket_name_passes_through() {
        let settings = Settings::new("route53-backups-111122223333").unwrap();
        assert_eq!(settings.bucket(), "route53-backups-111122223333");
    }

    #[test]
    fn test_bucket_arn_is_reduced_to_name() {
        let settings = Settings::new("arn:aws:s3:::route53-backups").unwrap();
        assert_eq!(settings.bucket(), "route53-backups");
    }

    #[test]
    fn test_empty_value_is_rejected() {
        assert!(Settings::new("").is_err());
        assert!(Settings::new("arn:aws:s3:::").is_err());
    }
}
