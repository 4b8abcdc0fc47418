use std::env;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Settings {
    api: ApiSettings,
    uploads: UploadSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_upload_size_mb: u64,
    pub allowed_image_extensions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub log_level: String,
    pub json: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("missing required value for {0}")]
    MissingValue(&'static str),
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let base_url = env_or_default("EXAMFLOW_API_BASE_URL", "http://localhost:8000/api/v1");
        let bearer_token = env_optional("EXAMFLOW_API_TOKEN");

        let timeout_seconds = parse_u64(
            "EXAMFLOW_HTTP_TIMEOUT_SECONDS",
            env_or_default("EXAMFLOW_HTTP_TIMEOUT_SECONDS", "30"),
        )?;
        let connect_timeout_seconds = parse_u64(
            "EXAMFLOW_CONNECT_TIMEOUT_SECONDS",
            env_or_default("EXAMFLOW_CONNECT_TIMEOUT_SECONDS", "10"),
        )?;

        let max_upload_size_mb = parse_u64(
            "EXAMFLOW_MAX_UPLOAD_SIZE_MB",
            env_or_default("EXAMFLOW_MAX_UPLOAD_SIZE_MB", "10"),
        )?;
        let allowed_image_extensions = parse_string_list(
            env_optional("EXAMFLOW_ALLOWED_IMAGE_EXTENSIONS"),
            &["jpg", "jpeg", "png"],
        );

        let log_level = env_or_default("EXAMFLOW_LOG_LEVEL", "info");
        let json =
            env_optional("EXAMFLOW_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            api: ApiSettings {
                base_url: base_url.trim_end_matches('/').to_string(),
                bearer_token,
                timeout_seconds,
                connect_timeout_seconds,
            },
            uploads: UploadSettings { max_upload_size_mb, allowed_image_extensions },
            telemetry: TelemetrySettings { log_level, json },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub fn uploads(&self) -> &UploadSettings {
        &self.uploads
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.is_empty() {
            return Err(ConfigError::MissingValue("EXAMFLOW_API_BASE_URL"));
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "EXAMFLOW_API_BASE_URL",
                value: self.api.base_url.clone(),
            });
        }

        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAMFLOW_HTTP_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.api.connect_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAMFLOW_CONNECT_TIMEOUT_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.uploads.max_upload_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAMFLOW_MAX_UPLOAD_SIZE_MB",
                value: "0".to_string(),
            });
        }

        if self.uploads.allowed_image_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "EXAMFLOW_ALLOWED_IMAGE_EXTENSIONS",
                value: String::from("<empty>"),
            });
        }

        for extension in &self.uploads.allowed_image_extensions {
            if !is_supported_image_extension(extension) {
                return Err(ConfigError::InvalidValue {
                    field: "EXAMFLOW_ALLOWED_IMAGE_EXTENSIONS",
                    value: extension.clone(),
                });
            }
        }

        Ok(())
    }
}

impl UploadSettings {
    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }

    pub fn allows_filename(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => {
                let extension = extension.to_ascii_lowercase();
                self.allowed_image_extensions.iter().any(|item| *item == extension)
            }
            _ => false,
        }
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_string_list(value: Option<String>, defaults: &[&str]) -> Vec<String> {
    match value {
        Some(raw) => raw
            .split(',')
            .map(|item| item.trim().to_ascii_lowercase())
            .filter(|item| !item.is_empty())
            .collect(),
        None => defaults.iter().map(|item| item.to_string()).collect(),
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

fn is_supported_image_extension(extension: &str) -> bool {
    matches!(extension, "jpg" | "jpeg" | "png" | "webp" | "gif")
}
