mod auth;
mod cli;
mod config;
mod error;
mod identity;
mod model;
mod pods;
mod provider;
mod render;
mod session;
#[cfg(test)]
mod testing;
mod transform;

use anyhow::{Context, Result};
use auth::{AuthProvider, FileTokenStore};
use chrono::Utc;
use clap::Parser;
use cli::{CliArgs, Command, ListArgs, OutputFormat};
use config::KubedeckConfig;
use model::{ALL_NAMESPACES, POD_RESOURCE, PodPatch, PodRecord};
use pods::PodOperations;
use provider::{DataProvider, GetListParams, GetManyReferenceParams, ProviderError, SortOrder};
use serde::Serialize;
use serde_json::json;
use session::{ClusterSession, KubeConnector};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

struct Console {
    auth: AuthProvider<KubeConnector, FileTokenStore>,
    provider: DataProvider<KubeConnector>,
    settings: KubedeckConfig,
    output: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter)?;

    let snapshot = config::load()?;
    debug!(
        source = snapshot.source.as_deref().unwrap_or("defaults"),
        "loaded config"
    );
    let settings = snapshot.settings;
    let state_dir = settings.resolve_state_dir()?;

    let session = Arc::new(ClusterSession::new(KubeConnector::new(
        settings.request_timeout(),
        settings.verify_on_connect,
    )));
    let store = FileTokenStore::new(&state_dir, &settings.session_entry);
    let operations = PodOperations::new(Arc::clone(&session))
        .enforce_resource_version(settings.enforce_resource_version);

    let console = Console {
        auth: AuthProvider::new(session, store),
        provider: DataProvider::new(operations),
        settings,
        output: args.output,
    };
    console.run(args.command).await
}

fn init_tracing(level_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .try_init();

    Ok(())
}

impl Console {
    async fn run(&self, command: Command) -> Result<()> {
        if !matches!(command, Command::Login { .. } | Command::Logout) {
            self.auth
                .check_auth()
                .await
                .context("no usable session, run `kubedeck login` first")?;
        }

        let result = self.dispatch(command).await;
        if let Err(error) = &result {
            let status = error
                .downcast_ref::<ProviderError>()
                .and_then(ProviderError::status);
            if let Err(rejected) = self.auth.check_error(status).await {
                warn!(%rejected, "session ended");
            }
        }
        result
    }

    async fn dispatch(&self, command: Command) -> Result<()> {
        match command {
            Command::Login { kubeconfig } => {
                let credential = read_credential(&kubeconfig).await?;
                self.auth.login(&credential).await?;
                let identity = self.auth.get_identity().await?;
                self.emit(&identity, |identity| {
                    format!("logged in as {} ({})", identity.full_name, identity.id)
                })
            }
            Command::Logout => {
                self.auth.logout().await?;
                self.emit(&json!({ "state": self.auth.state().await }), |_| {
                    "logged out".to_string()
                })
            }
            Command::Check => {
                let state = self.auth.state().await;
                self.emit(&json!({ "state": state }), |_| format!("{state:?}"))
            }
            Command::Whoami => {
                let identity = self.auth.get_identity().await?;
                let permissions = self.auth.get_permissions();
                let summary = format!(
                    "{} ({}) {}",
                    identity.full_name,
                    identity.id,
                    permissions.join(",")
                );
                self.emit(
                    &json!({ "identity": identity, "permissions": permissions }),
                    |_| summary,
                )
            }
            Command::List(list) => {
                let params = list_params(&self.settings, &list);
                let result = self.provider.get_list(POD_RESOURCE, &params).await?;
                self.emit(&result, |result| self.pods(&result.data))
            }
            Command::Related {
                target,
                value,
                list,
            } => {
                let params = GetManyReferenceParams {
                    target,
                    id: value,
                    list: list_params(&self.settings, &list),
                };
                let result = self
                    .provider
                    .get_many_reference(POD_RESOURCE, &params)
                    .await?;
                self.emit(&result, |result| self.pods(&result.data))
            }
            Command::Get { ids } => {
                if let [id] = ids.as_slice() {
                    let result = self.provider.get_one(POD_RESOURCE, id).await?;
                    self.emit(&result, |result| {
                        self.pods(std::slice::from_ref(&result.data))
                    })
                } else {
                    let result = self.provider.get_many(POD_RESOURCE, &ids).await?;
                    self.emit(&result, |result| self.pods(&result.data))
                }
            }
            Command::Create { file } => {
                let patch = read_patch(&file).await?;
                let result = self.provider.create(POD_RESOURCE, &patch).await?;
                self.emit(&result, |result| {
                    self.pods(std::slice::from_ref(&result.data))
                })
            }
            Command::Update { ids, file } => {
                let patch = read_patch(&file).await?;
                if let [id] = ids.as_slice() {
                    let result = self.provider.update(POD_RESOURCE, id, &patch).await?;
                    self.emit(&result, |result| {
                        self.pods(std::slice::from_ref(&result.data))
                    })
                } else {
                    let result = self.provider.update_many(POD_RESOURCE, &ids, &patch).await?;
                    self.emit(&result, |result| result.data.join("\n"))
                }
            }
            Command::Delete { ids, itemized } => {
                if itemized {
                    let result = self
                        .provider
                        .delete_many_itemized(POD_RESOURCE, &ids)
                        .await?;
                    self.emit(&result, |result| {
                        render::outcomes_table(&result.data)
                    })
                } else if let [id] = ids.as_slice() {
                    let result = self.provider.delete(POD_RESOURCE, id).await?;
                    self.emit(&result, |result| result.data.clone())
                } else {
                    let result = self.provider.delete_many(POD_RESOURCE, &ids).await?;
                    self.emit(&result, |result| result.data.join("\n"))
                }
            }
        }
    }

    fn pods(&self, records: &[PodRecord]) -> String {
        render::pods_table(records, Utc::now())
    }

    fn emit<T: Serialize>(&self, value: &T, table: impl FnOnce(&T) -> String) -> Result<()> {
        let text = match self.output {
            OutputFormat::Json => render::json(value)?,
            OutputFormat::Table => table(value),
        };
        println!("{}", text.trim_end());
        Ok(())
    }
}

fn list_params(settings: &KubedeckConfig, list: &ListArgs) -> GetListParams {
    let mut params = settings.list_defaults();
    if list.all_namespaces {
        params.filter.namespace = Some(ALL_NAMESPACES.to_string());
    } else if let Some(namespace) = &list.namespace {
        params.filter.namespace = Some(namespace.clone());
    }
    params.filter.q = list.q.clone();
    params.filter.status = list.status.clone();

    if let Some(page) = list.page {
        params.pagination.page = page;
    }
    if let Some(per_page) = list.per_page {
        params.pagination.per_page = per_page;
    }
    if let Some(field) = &list.sort {
        params.sort.field = field.clone();
    }
    if let Some(order) = list.order.as_deref().and_then(SortOrder::from_token) {
        params.sort.order = order;
    }
    params
}

async fn read_credential(source: &str) -> Result<String> {
    if source == "-" {
        let mut credential = String::new();
        tokio::io::stdin()
            .read_to_string(&mut credential)
            .await
            .context("failed to read kubeconfig from stdin")?;
        return Ok(credential);
    }
    tokio::fs::read_to_string(source)
        .await
        .with_context(|| format!("failed to read kubeconfig {source}"))
}

async fn read_patch(path: &Path) -> Result<PodPatch> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read patch file {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("invalid pod patch in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::{list_params, read_patch};
    use crate::cli::ListArgs;
    use crate::config::KubedeckConfig;
    use crate::model::ALL_NAMESPACES;
    use crate::provider::SortOrder;

    #[test]
    fn list_flags_override_config_defaults() {
        let settings = KubedeckConfig {
            page_size: 10,
            sort_field: "age".to_string(),
            ..KubedeckConfig::default()
        };

        let defaults = list_params(&settings, &ListArgs::default());
        assert_eq!(defaults.pagination.per_page, 10);
        assert_eq!(defaults.sort.field, "age");
        assert_eq!(defaults.filter.namespace, None);

        let list = ListArgs {
            all_namespaces: true,
            status: Some("Running".to_string()),
            page: Some(3),
            sort: Some("restarts".to_string()),
            order: Some("desc".to_string()),
            ..ListArgs::default()
        };
        let params = list_params(&settings, &list);
        assert_eq!(params.filter.namespace.as_deref(), Some(ALL_NAMESPACES));
        assert_eq!(params.filter.status.as_deref(), Some("Running"));
        assert_eq!(params.pagination.page, 3);
        assert_eq!(params.sort.field, "restarts");
        assert_eq!(params.sort.order, SortOrder::Desc);
    }

    #[tokio::test]
    async fn patch_files_accept_yaml_and_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let yaml = dir.path().join("patch.yaml");
        std::fs::write(&yaml, "name: web\nnamespace: apps\nlabels:\n  app: web\n")
            .expect("write");
        let patch = read_patch(&yaml).await.expect("yaml patch");
        assert_eq!(patch.name.as_deref(), Some("web"));
        assert_eq!(
            patch
                .labels
                .as_ref()
                .and_then(|labels| labels.get("app"))
                .map(String::as_str),
            Some("web")
        );

        let json = dir.path().join("patch.json");
        std::fs::write(&json, r#"{"name":"web","resourceVersion":"7"}"#)
            .expect("write");
        let patch = read_patch(&json).await.expect("json patch");
        assert_eq!(patch.resource_version.as_deref(), Some("7"));
    }
}
