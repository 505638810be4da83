// Configuration module entry point
// Loads the immutable process configuration and builds the shared application state

mod state;
mod types;

use config::builder::DefaultState;
use config::ConfigBuilder;
use std::net::SocketAddr;

use crate::error::ConfigError;

// Re-export public types
pub use state::AppState;
pub use types::{
    B2Config, BackendKind, Config, DriveConfig, FileIoConfig, RetryConfig, Secret,
    ValidationProfile,
};

/// 50 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

pub const DEFAULT_ALLOWED_TYPES: [&str; 4] =
    ["image/jpeg", "image/png", "application/pdf", "video/mp4"];

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Environment variables use the `GATEWAY` prefix and `__` as separator,
    /// e.g. `GATEWAY__AUTH__BOT_TOKEN` or `GATEWAY__DRIVE__FOLDER_ID`.
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let settings = with_defaults(config::Config::builder())?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("GATEWAY")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("upload.allowed_types"),
            )
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Built-in defaults only, no file or environment
    #[cfg(test)]
    pub fn defaults() -> Self {
        with_defaults(config::Config::builder())
            .and_then(ConfigBuilder::<DefaultState>::build)
            .and_then(config::Config::try_deserialize)
            .expect("built-in defaults must deserialize")
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Validation steps for the configured backend
    pub fn validation_profile(&self) -> ValidationProfile {
        self.upload.profile_for(self.storage.backend)
    }

    /// Check that the selected backend has the credentials it needs
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = |backend, setting| ConfigError::MissingSetting { backend, setting };

        match self.storage.backend {
            BackendKind::Drive => {
                if self.drive.folder_id.is_empty() {
                    return Err(missing("drive", "drive.folder_id"));
                }
                if !self.drive.api_key.is_set() && !self.drive.access_token.is_set() {
                    return Err(missing("drive", "drive.api_key or drive.access_token"));
                }
            }
            BackendKind::B2 => {
                if self.b2.key_id.is_empty() {
                    return Err(missing("b2", "b2.key_id"));
                }
                if !self.b2.application_key.is_set() {
                    return Err(missing("b2", "b2.application_key"));
                }
                if self.b2.bucket_name.is_empty() && self.b2.bucket_id.is_none() {
                    return Err(missing("b2", "b2.bucket_name"));
                }
            }
            BackendKind::FileIo | BackendKind::Kv => {}
        }

        if self.http.max_body_size == 0 {
            return Err(ConfigError::Invalid(
                "http.max_body_size must be greater than zero".to_string(),
            ));
        }
        if self.assets.default_document.is_empty() {
            return Err(ConfigError::Invalid(
                "assets.default_document must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    builder
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080)?
        .set_default("logging.level", "info")?
        .set_default("logging.access_log", true)?
        .set_default("logging.access_log_format", "combined")?
        .set_default("performance.keep_alive_timeout", 75)?
        .set_default("performance.read_timeout", 120)?
        .set_default("performance.write_timeout", 120)?
        .set_default("http.server_name", "file-gateway/0.1")?
        .set_default("http.max_body_size", 67_108_864)? // 64MB
        .set_default("http.enable_debug", true)?
        .set_default("assets.default_document", "index.html")?
        .set_default("assets.static_only", false)?
        .set_default("auth.bot_token", "")?
        .set_default("storage.backend", "drive")?
        .set_default("storage.retry.timeout_secs", 60)?
        .set_default("storage.retry.max_retries", 0)?
        .set_default("storage.retry.backoff_ms", 500)?
        .set_default("upload.max_file_size", DEFAULT_MAX_FILE_SIZE)?
        .set_default("upload.allowed_types", DEFAULT_ALLOWED_TYPES.to_vec())?
        .set_default("drive.folder_id", "")?
        .set_default("drive.api_key", "")?
        .set_default("drive.access_token", "")?
        .set_default("drive.api_base", "https://www.googleapis.com")?
        .set_default("drive.upload_base", "https://www.googleapis.com")?
        .set_default("b2.key_id", "")?
        .set_default("b2.application_key", "")?
        .set_default("b2.bucket_name", "")?
        .set_default("b2.api_base", "https://api.backblazeb2.com")?
        .set_default("b2.skip_content_sha1", true)?
        .set_default("fileio.endpoint", "https://file.io")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deserialize() {
        let cfg = Config::defaults();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.storage.backend, BackendKind::Drive);
        assert_eq!(cfg.upload.max_file_size, 52_428_800);
        assert_eq!(cfg.upload.allowed_types.len(), 4);
        assert!(!cfg.auth.bot_token.is_set());
        assert!(cfg.b2.skip_content_sha1);
    }

    #[test]
    fn test_profiles_per_backend() {
        let cfg = Config::defaults();
        let drive = cfg.upload.profile_for(BackendKind::Drive);
        assert_eq!(drive.max_file_size, Some(DEFAULT_MAX_FILE_SIZE));
        assert!(drive.allowed_types.is_some());
        assert!(drive.unique_names);

        let b2 = cfg.upload.profile_for(BackendKind::B2);
        assert!(b2.max_file_size.is_some());
        assert!(!b2.unique_names);

        let fileio = cfg.upload.profile_for(BackendKind::FileIo);
        assert_eq!(fileio.max_file_size, None);
        assert_eq!(fileio.allowed_types, None);
        assert!(!fileio.unique_names);
    }

    #[test]
    fn test_profile_overrides() {
        let mut cfg = Config::defaults();
        cfg.upload.enforce_size_limit = Some(true);
        cfg.upload.enforce_unique_names = Some(true);
        let kv = cfg.upload.profile_for(BackendKind::Kv);
        assert_eq!(kv.max_file_size, Some(DEFAULT_MAX_FILE_SIZE));
        assert_eq!(kv.allowed_types, None);
        assert!(kv.unique_names);
    }

    #[test]
    fn test_validate_requires_backend_credentials() {
        let mut cfg = Config::defaults();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingSetting { backend: "drive", .. })
        ));

        cfg.drive.folder_id = "folder".to_string();
        cfg.drive.api_key = Secret::new("key");
        assert!(cfg.validate().is_ok());

        cfg.storage.backend = BackendKind::B2;
        assert!(cfg.validate().is_err());

        cfg.storage.backend = BackendKind::Kv;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_without_kv_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "[storage]\nbackend = \"fileio\"\n").unwrap();

        let cfg = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.storage.backend, BackendKind::FileIo);
        assert!(cfg.kv.dir.is_none());
        assert_eq!(cfg.fileio.endpoint, "https://file.io");
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2");
    }
}
