use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api: Option<ApiConfig>,
    pub paging: Option<PagingConfig>,
    pub upload: Option<UploadConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PagingConfig {
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_staged_files: Option<usize>,
    pub poll_interval_secs: Option<u64>,
}

/// Platform config directory path: `<config_dir>/stitch/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("stitch").join("config.toml"))
}

/// Load config by cascading CWD `.stitch.toml` over platform config.
/// CWD values override platform values; unreadable files are treated as
/// absent here, callers wanting the reason use [`load_from_path`].
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p).ok());
    let cwd = load_from_path(Path::new(".stitch.toml")).ok();

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path.
pub fn load_from_path(path: &Path) -> Result<ConfigFile, CoreError> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| CoreError::Config(e.to_string()))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        api: Some(ApiConfig {
            base_url: overlay
                .api
                .as_ref()
                .and_then(|a| a.base_url.clone())
                .or_else(|| base.api.as_ref().and_then(|a| a.base_url.clone())),
            access_token: overlay
                .api
                .as_ref()
                .and_then(|a| a.access_token.clone())
                .or_else(|| base.api.as_ref().and_then(|a| a.access_token.clone())),
            request_timeout_secs: overlay
                .api
                .as_ref()
                .and_then(|a| a.request_timeout_secs)
                .or_else(|| base.api.as_ref().and_then(|a| a.request_timeout_secs)),
        }),
        paging: Some(PagingConfig {
            page_size: overlay
                .paging
                .as_ref()
                .and_then(|p| p.page_size)
                .or_else(|| base.paging.as_ref().and_then(|p| p.page_size)),
        }),
        upload: Some(UploadConfig {
            max_staged_files: overlay
                .upload
                .as_ref()
                .and_then(|u| u.max_staged_files)
                .or_else(|| base.upload.as_ref().and_then(|u| u.max_staged_files)),
            poll_interval_secs: overlay
                .upload
                .as_ref()
                .and_then(|u| u.poll_interval_secs)
                .or_else(|| base.upload.as_ref().and_then(|u| u.poll_interval_secs)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_config() {
        let cfg: ConfigFile = toml::from_str(
            r#"
            [api]
            base_url = "https://api.example.com/api/v1"
            "#,
        )
        .unwrap();
        assert_eq!(
            cfg.api.as_ref().unwrap().base_url.as_deref(),
            Some("https://api.example.com/api/v1")
        );
        assert!(cfg.paging.is_none());
    }

    #[test]
    fn merge_prefers_overlay() {
        let base: ConfigFile = toml::from_str(
            r#"
            [api]
            base_url = "https://base"
            request_timeout_secs = 30

            [paging]
            page_size = 12
            "#,
        )
        .unwrap();
        let overlay: ConfigFile = toml::from_str(
            r#"
            [api]
            base_url = "https://overlay"
            "#,
        )
        .unwrap();

        let merged = merge(base, overlay);
        let api = merged.api.unwrap();
        assert_eq!(api.base_url.as_deref(), Some("https://overlay"));
        assert_eq!(api.request_timeout_secs, Some(30));
        assert_eq!(merged.paging.unwrap().page_size, Some(12));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(matches!(load_from_path(&path), Err(CoreError::Io(_))));
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\nbase_url = ").unwrap();
        let err = load_from_path(&path).expect_err("must not parse");
        assert!(matches!(err, CoreError::Config(_)));
        assert!(err.to_string().starts_with("config error:"));
    }
}
