use crate::provider::{GetListParams, Pagination, Sort, SortOrder};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub source: Option<String>,
    pub settings: KubedeckConfig,
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct KubedeckConfig {
    pub page_size: usize,
    pub sort_field: String,
    pub sort_order: SortOrder,
    pub state_dir: Option<PathBuf>,
    pub session_entry: String,
    #[serde(alias = "timeout_secs")]
    pub request_timeout_secs: Option<u64>,
    pub verify_on_connect: bool,
    pub enforce_resource_version: bool,
}

impl Default for KubedeckConfig {
    fn default() -> Self {
        Self {
            page_size: Pagination::default().per_page,
            sort_field: Sort::default().field,
            sort_order: SortOrder::Asc,
            state_dir: None,
            session_entry: "kubeconfig".to_string(),
            request_timeout_secs: None,
            verify_on_connect: false,
            enforce_resource_version: false,
        }
    }
}

impl KubedeckConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// List parameters used when the command line leaves them unset.
    pub fn list_defaults(&self) -> GetListParams {
        GetListParams {
            pagination: Pagination {
                page: 1,
                per_page: self.page_size.max(1),
            },
            sort: Sort {
                field: self.sort_field.clone(),
                order: self.sort_order,
            },
            ..GetListParams::default()
        }
    }

    pub fn resolve_state_dir(&self) -> Result<PathBuf> {
        let env_dir = std::env::var("KUBEDECK_STATE_DIR").ok();
        let home = std::env::var("HOME").ok();
        state_dir_from(self.state_dir.as_deref(), env_dir.as_deref(), home.as_deref())
    }
}

pub fn load() -> Result<ConfigSnapshot> {
    match discover_config_path() {
        Some(path) => load_from(&path),
        None => Ok(ConfigSnapshot {
            source: None,
            settings: KubedeckConfig::default(),
        }),
    }
}

pub fn load_from(path: &Path) -> Result<ConfigSnapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let settings = if raw.trim().is_empty() {
        KubedeckConfig::default()
    } else {
        serde_yaml::from_str::<KubedeckConfig>(&raw)
            .with_context(|| format!("invalid YAML in {}", path.display()))?
    };

    Ok(ConfigSnapshot {
        source: Some(path.display().to_string()),
        settings,
    })
}

fn discover_config_path() -> Option<PathBuf> {
    let explicit = std::env::var("KUBEDECK_CONFIG").ok();
    let home = std::env::var("HOME").ok();
    discover_from(explicit.as_deref(), Path::new("."), home.as_deref().map(Path::new))
}

fn discover_from(explicit: Option<&str>, cwd: &Path, home: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        cwd.join("kubedeck.yaml"),
        cwd.join("kubedeck.yml"),
        cwd.join(".kubedeck.yaml"),
    ];
    let found = cwd_candidates.into_iter().find(|path| path.exists());
    if found.is_some() {
        return found;
    }

    let home = home?;
    let user_candidates = [
        home.join(".config/kubedeck/config.yaml"),
        home.join(".config/kubedeck/config.yml"),
    ];
    user_candidates.into_iter().find(|path| path.exists())
}

fn state_dir_from(
    configured: Option<&Path>,
    env_dir: Option<&str>,
    home: Option<&str>,
) -> Result<PathBuf> {
    if let Some(dir) = configured {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = env_dir
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    match home {
        Some(home) if !home.trim().is_empty() => Ok(Path::new(home).join(".local/share/kubedeck")),
        _ => bail!("cannot locate a state directory: set state_dir, KUBEDECK_STATE_DIR or HOME"),
    }
}
