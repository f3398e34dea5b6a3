use std::path::PathBuf;

use crate::StoreError;

const DEFAULT_REGION: &str = "us-east-1";

/// Which backend holds mirrored attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// Files on disk; `None` means the XDG data directory.
    Local { dir: Option<PathBuf> },
    S3(S3Config),
}

/// An S3-compatible bucket (AWS, Garage, MinIO), addressed path-style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl StoreConfig {
    pub fn local(dir: impl Into<PathBuf>) -> Self {
        StoreConfig::Local {
            dir: Some(dir.into()),
        }
    }

    /// Read the process environment. See [`StoreConfig::from_lookup`].
    pub fn from_env() -> Result<Self, StoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Setting `FILECLIP_S3_BUCKET` selects S3, and then the endpoint and both
    /// keys must be present (`FILECLIP_S3_*`, falling back to `AWS_*`).
    /// Without a bucket, files go under `FILECLIP_DATA_DIR`.
    pub fn from_lookup<F>(var: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |primary: &str, fallback: Option<&str>| {
            var(primary)
                .or_else(|| fallback.and_then(&var))
                .filter(|v| !v.trim().is_empty())
        };

        let Some(bucket) = var("FILECLIP_S3_BUCKET", None) else {
            return Ok(StoreConfig::Local {
                dir: var("FILECLIP_DATA_DIR", None).map(PathBuf::from),
            });
        };
        let require = |primary: &str, fallback: &str| {
            var(primary, Some(fallback)).ok_or_else(|| {
                StoreError::Config(format!(
                    "FILECLIP_S3_BUCKET is set but neither {primary} nor {fallback} is"
                ))
            })
        };

        Ok(StoreConfig::S3(S3Config {
            endpoint: require("FILECLIP_S3_ENDPOINT", "AWS_ENDPOINT_URL")?,
            region: var("FILECLIP_S3_REGION", Some("AWS_REGION"))
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bucket,
            access_key_id: require("FILECLIP_S3_ACCESS_KEY_ID", "AWS_ACCESS_KEY_ID")?,
            secret_access_key: require("FILECLIP_S3_SECRET_ACCESS_KEY", "AWS_SECRET_ACCESS_KEY")?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn no_bucket_means_local() {
        let config = StoreConfig::from_lookup(lookup(&[("AWS_REGION", "eu-west-1")])).unwrap();
        assert_eq!(config, StoreConfig::Local { dir: None });

        let config =
            StoreConfig::from_lookup(lookup(&[("FILECLIP_DATA_DIR", "/var/lib/fileclip")])).unwrap();
        assert_eq!(config, StoreConfig::local("/var/lib/fileclip"));
    }

    #[test]
    fn bucket_selects_s3_with_aws_fallbacks() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("FILECLIP_S3_BUCKET", "clips"),
            ("AWS_ENDPOINT_URL", "http://aws:443"),
            ("FILECLIP_S3_ENDPOINT", "http://garage:3900"),
            ("AWS_ACCESS_KEY_ID", "key"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]))
        .unwrap();
        assert_eq!(
            config,
            StoreConfig::S3(S3Config {
                endpoint: "http://garage:3900".into(),
                region: "us-east-1".into(),
                bucket: "clips".into(),
                access_key_id: "key".into(),
                secret_access_key: "secret".into(),
            })
        );
    }

    #[test]
    fn incomplete_s3_settings_are_rejected() {
        let err = StoreConfig::from_lookup(lookup(&[
            ("FILECLIP_S3_BUCKET", "clips"),
            ("FILECLIP_S3_ENDPOINT", "http://garage:3900"),
            ("FILECLIP_S3_ACCESS_KEY_ID", "key"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
        assert!(err.to_string().contains("FILECLIP_S3_SECRET_ACCESS_KEY"));
    }
}
