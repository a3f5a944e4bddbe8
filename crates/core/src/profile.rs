//! Storage profiles
//!
//! A profile names one bucket on an S3-compatible endpoint together with the
//! connection details and credentials a storage client needs to reach it.

use serde::{Deserialize, Serialize};

use crate::config::ConfigManager;
use crate::error::{Error, Result};

/// Retry configuration applied by the storage client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    10000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Timeout configuration applied by the storage client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    30000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
        }
    }
}

/// A named bucket on an S3-compatible endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Unique name for this profile
    pub name: String,

    /// Endpoint URL
    pub endpoint: String,

    /// Bucket every key is resolved against
    pub bucket: String,

    /// Access key ID
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// Region
    #[serde(default = "default_region")]
    pub region: String,

    /// Bucket lookup style: "auto", "path", or "dns"
    #[serde(default = "default_bucket_lookup")]
    pub bucket_lookup: String,

    /// Retry configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,

    /// Timeout configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket_lookup() -> String {
    "auto".to_string()
}

impl Profile {
    /// Create a new profile with required fields
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: default_region(),
            bucket_lookup: default_bucket_lookup(),
            retry: None,
            timeout: None,
        }
    }

    /// Whether requests should use path-style addressing
    pub fn path_style(&self) -> bool {
        self.bucket_lookup == "path" || self.bucket_lookup == "auto"
    }

    /// Get the effective retry configuration
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Get the effective timeout configuration
    pub fn timeout_config(&self) -> TimeoutConfig {
        self.timeout.clone().unwrap_or_default()
    }
}

/// Manager for profile operations
pub struct ProfileManager {
    config_manager: ConfigManager,
}

impl ProfileManager {
    /// Create a new ProfileManager with a specific ConfigManager
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Create a new ProfileManager using the default config location
    pub fn new() -> Result<Self> {
        let config_manager = ConfigManager::new()?;
        Ok(Self { config_manager })
    }

    /// List all configured profiles
    pub fn list(&self) -> Result<Vec<Profile>> {
        let config = self.config_manager.load()?;
        Ok(config.profiles)
    }

    /// Get a profile by name
    pub fn get(&self, name: &str) -> Result<Profile> {
        let config = self.config_manager.load()?;
        config
            .profiles
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
    }

    /// Add or replace a profile
    pub fn set(&self, profile: Profile) -> Result<()> {
        let mut config = self.config_manager.load()?;

        config.profiles.retain(|p| p.name != profile.name);
        config.profiles.push(profile);

        self.config_manager.save(&config)
    }

    /// Remove a profile
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let original_len = config.profiles.len();

        config.profiles.retain(|p| p.name != name);

        if config.profiles.len() == original_len {
            return Err(Error::ProfileNotFound(name.to_string()));
        }

        self.config_manager.save(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_profile_manager() -> (ProfileManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let config_manager = ConfigManager::with_path(config_path);
        (ProfileManager::with_config_manager(config_manager), temp_dir)
    }

    #[test]
    fn test_profile_new() {
        let profile = Profile::new("local", "http://localhost:9000", "media", "ak", "sk");
        assert_eq!(profile.name, "local");
        assert_eq!(profile.bucket, "media");
        assert_eq!(profile.region, "us-east-1");
        assert_eq!(profile.bucket_lookup, "auto");
        assert!(profile.path_style());
        assert_eq!(profile.retry_config(), RetryConfig::default());
        assert_eq!(profile.timeout_config(), TimeoutConfig::default());
    }

    #[test]
    fn test_dns_lookup_disables_path_style() {
        let mut profile = Profile::new("aws", "https://s3.amazonaws.com", "media", "ak", "sk");
        profile.bucket_lookup = "dns".to_string();
        assert!(!profile.path_style());
    }

    #[test]
    fn test_profile_manager_set_and_get() {
        let (manager, _temp_dir) = temp_profile_manager();

        manager
            .set(Profile::new("minio", "http://localhost:9000", "media", "ak", "sk"))
            .unwrap();

        let profile = manager.get("minio").unwrap();
        assert_eq!(profile.endpoint, "http://localhost:9000");
        assert_eq!(profile.bucket, "media");
    }

    #[test]
    fn test_profile_manager_list_and_replace() {
        let (manager, _temp_dir) = temp_profile_manager();

        manager
            .set(Profile::new("a", "http://a:9000", "one", "a", "a"))
            .unwrap();
        manager
            .set(Profile::new("b", "http://b:9000", "two", "b", "b"))
            .unwrap();
        manager
            .set(Profile::new("a", "http://a2:9000", "three", "a", "a"))
            .unwrap();

        let profiles = manager.list().unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(manager.get("a").unwrap().bucket, "three");
    }

    #[test]
    fn test_profile_manager_remove() {
        let (manager, _temp_dir) = temp_profile_manager();

        manager
            .set(Profile::new("tmp", "http://localhost:9000", "b", "a", "s"))
            .unwrap();
        manager.remove("tmp").unwrap();

        assert!(matches!(
            manager.get("tmp").unwrap_err(),
            Error::ProfileNotFound(_)
        ));
        assert!(matches!(
            manager.remove("tmp").unwrap_err(),
            Error::ProfileNotFound(_)
        ));
    }

    #[test]
    fn test_retry_and_timeout_parse_with_defaults() {
        let profile: Profile = toml::from_str(
            r#"
            name = "slow"
            endpoint = "http://localhost:9000"
            bucket = "media"
            access_key = "ak"
            secret_key = "sk"

            [retry]
            max_attempts = 5

            [timeout]
            read_ms = 120000
            "#,
        )
        .unwrap();

        let retry = profile.retry_config();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.initial_backoff_ms, 100);

        let timeout = profile.timeout_config();
        assert_eq!(timeout.connect_ms, 5000);
        assert_eq!(timeout.read_ms, 120000);
    }
}
