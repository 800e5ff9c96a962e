//! Shared application state. The routing table is rebuilt on refresh and swapped in whole.

use crate::catalog::load_routines;
use crate::config::{validate, RoutineOptions};
use crate::connection::ConnectionSource;
use crate::error::ConfigError;
use crate::hooks::{ParameterHook, SynthesisHooks};
use crate::routing::RoutingTable;
use std::sync::{Arc, RwLock};

#[derive(Clone)]
pub struct AppState {
    pub connections: ConnectionSource,
    pub options: Arc<RoutineOptions>,
    pub hooks: SynthesisHooks,
    pub parameter_hook: Option<Arc<dyn ParameterHook>>,
    routes: Arc<RwLock<Arc<RoutingTable>>>,
}

impl AppState {
    /// Validate options, read the catalog and build the routing table. Any failure is fatal.
    pub async fn build(
        connections: impl Into<ConnectionSource>,
        options: RoutineOptions,
        hooks: SynthesisHooks,
    ) -> Result<Self, ConfigError> {
        validate(&options)?;
        let connections = connections.into();
        let table = load_table(&connections, &options, &hooks).await?;
        tracing::info!(endpoints = table.len(), "routing table built");
        Ok(AppState {
            connections,
            options: Arc::new(options),
            hooks,
            parameter_hook: None,
            routes: Arc::new(RwLock::new(Arc::new(table))),
        })
    }

    /// State over an already-built table.
    pub fn with_table(connections: impl Into<ConnectionSource>, options: RoutineOptions, table: RoutingTable) -> Self {
        AppState {
            connections: connections.into(),
            options: Arc::new(options),
            hooks: SynthesisHooks::default(),
            parameter_hook: None,
            routes: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    pub fn with_parameter_hook(mut self, hook: Arc<dyn ParameterHook>) -> Self {
        self.parameter_hook = Some(hook);
        self
    }

    /// Current table; in-flight requests keep the table they started with.
    pub fn routing_table(&self) -> Arc<RoutingTable> {
        match self.routes.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Re-read the catalog and publish a new table. On error the current table stays.
    pub async fn refresh(&self) -> Result<usize, ConfigError> {
        let table = load_table(&self.connections, &self.options, &self.hooks).await?;
        let count = table.len();
        let mut guard = self
            .routes
            .write()
            .map_err(|_| ConfigError::Load("routing table lock poisoned".into()))?;
        *guard = Arc::new(table);
        tracing::info!(endpoints = count, "routing table refreshed");
        Ok(count)
    }
}

async fn load_table(
    connections: &ConnectionSource,
    options: &RoutineOptions,
    hooks: &SynthesisHooks,
) -> Result<RoutingTable, ConfigError> {
    let mut conn = connections
        .acquire()
        .await
        .map_err(|e| ConfigError::Catalog(e.to_string()))?;
    let routines = load_routines(&mut conn, options).await;
    conn.finish();
    Ok(RoutingTable::build(routines?, options, hooks))
}
