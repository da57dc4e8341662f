//! ClientPool - project to client registry

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use contracts::{ClientResolver, ClientType, LogClient, ProducerBlueprint, ProjectConfig};
use tracing::{debug, info, instrument};

use crate::clients::{BuiltinClient, ConsoleClient, FileClient};
use crate::error::DispatcherError;

/// Thread-safe registry of clients keyed by project
pub struct ClientPool<C> {
    clients: RwLock<HashMap<String, Arc<C>>>,
}

impl<C> Default for ClientPool<C> {
    fn default() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }
}

impl<C> ClientPool<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the client for `project`
    pub fn update_client(&self, project: impl Into<String>, client: Arc<C>) {
        let project = project.into();
        debug!(%project, "Client registered");
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(project, client);
    }

    /// Unregister `project`; later batches for it fail with a config error
    pub fn remove_client(&self, project: &str) -> Option<Arc<C>> {
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(project)
    }

    pub fn len(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: LogClient + Sync + 'static> ClientResolver for ClientPool<C> {
    type Client = C;

    fn get_client(&self, project: &str) -> Option<Arc<C>> {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(project)
            .cloned()
    }
}

impl ClientPool<BuiltinClient> {
    /// Build one client per configured project
    #[instrument(
        name = "client_pool_from_blueprint",
        skip(blueprint),
        fields(projects = blueprint.projects.len())
    )]
    pub fn from_blueprint(blueprint: &ProducerBlueprint) -> Result<Self, DispatcherError> {
        let pool = Self::new();
        for project in &blueprint.projects {
            pool.update_client(&project.project, Arc::new(create_client(project)?));
        }
        info!(clients = pool.len(), "Client pool ready");
        Ok(pool)
    }
}

/// Create a built-in client from project configuration
fn create_client(config: &ProjectConfig) -> Result<BuiltinClient, DispatcherError> {
    match config.client_type {
        ClientType::Console => Ok(BuiltinClient::Console(ConsoleClient::new(&config.project))),
        ClientType::File => FileClient::from_params(&config.project, &config.params)
            .map(BuiltinClient::File)
            .map_err(|e| DispatcherError::client_creation(&config.project, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConfigVersion, ProducerConfig};
    use tempfile::tempdir;

    fn project(name: &str, client_type: ClientType, params: &[(&str, String)]) -> ProjectConfig {
        ProjectConfig {
            project: name.to_string(),
            client_type,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_update_and_remove() {
        let pool = ClientPool::new();
        pool.update_client("a", Arc::new(ConsoleClient::new("a")));
        assert!(pool.get_client("a").is_some());
        assert!(pool.get_client("b").is_none());

        assert!(pool.remove_client("a").is_some());
        assert!(pool.get_client("a").is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_from_blueprint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl").display().to_string();
        let blueprint = ProducerBlueprint {
            version: ConfigVersion::V1,
            producer: ProducerConfig::default(),
            projects: vec![
                project("console-proj", ClientType::Console, &[]),
                project("file-proj", ClientType::File, &[("path", path)]),
            ],
        };

        let pool = ClientPool::from_blueprint(&blueprint).unwrap();
        assert_eq!(pool.len(), 2);
        assert!(matches!(
            pool.get_client("file-proj").as_deref(),
            Some(BuiltinClient::File(_))
        ));
        assert_eq!(pool.get_client("console-proj").unwrap().name(), "console-proj");
    }

    #[test]
    fn test_from_blueprint_file_without_path_fails() {
        let blueprint = ProducerBlueprint {
            version: ConfigVersion::V1,
            producer: ProducerConfig::default(),
            projects: vec![project("broken", ClientType::File, &[])],
        };

        let err = ClientPool::from_blueprint(&blueprint).err().unwrap();
        assert!(matches!(err, DispatcherError::ClientCreation { ref project, .. } if project == "broken"));
    }
}
