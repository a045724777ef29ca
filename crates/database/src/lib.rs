//! Embedded database entry point.
//!
//! A [`Database`] owns the shared catalog and its persistence. Each connection
//! works through its own [`Session`], which keeps the per-connection state
//! sequence functions rely on: the current schema, the compatibility mode and
//! the last value every sequence produced in that session.

mod session;

pub use session::Session;

use anyhow::{Context, Result};
use catalog::{Catalog, SharedCatalog};
use common::{Config, Row};
use std::{
    fs,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::info;

/// Result of executing one statement.
#[derive(Debug, PartialEq)]
pub enum QueryResult {
    /// Query returned rows
    Rows { schema: Vec<String>, rows: Vec<Row> },
    /// DDL or other operation with no result
    Empty,
}

/// Shared database state. Sessions hold an `Arc` to it.
pub struct Database {
    config: Config,
    catalog: SharedCatalog,
    persistent: bool,
    next_session_id: AtomicU64,
}

impl Database {
    /// Open the database stored under `config.data_dir`.
    ///
    /// Creates the data directory if it doesn't exist and loads the catalog,
    /// starting from an empty catalog when there is none yet.
    pub fn open(config: Config) -> Result<Arc<Self>> {
        fs::create_dir_all(&config.data_dir).with_context(|| {
            format!(
                "failed to create data directory {}",
                config.data_dir.display()
            )
        })?;
        let catalog_path = config.catalog_path();
        let catalog = Catalog::load(&catalog_path)
            .with_context(|| format!("failed to load catalog {}", catalog_path.display()))?;
        info!(path = %catalog_path.display(), "database opened");
        Self::with_catalog(config, catalog, true)
    }

    /// Database whose catalog lives only in memory; `checkpoint` does nothing.
    pub fn in_memory(config: Config) -> Result<Arc<Self>> {
        Self::with_catalog(config, Catalog::new(), false)
    }

    fn with_catalog(config: Config, mut catalog: Catalog, persistent: bool) -> Result<Arc<Self>> {
        if catalog.find_schema(&config.default_schema).is_none() {
            catalog
                .create_schema(&config.default_schema)
                .context("failed to create default schema")?;
        }
        Ok(Arc::new(Self {
            config,
            catalog: catalog.into_shared(),
            persistent,
            next_session_id: AtomicU64::new(1),
        }))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    /// Write the catalog, including sequence counters, to disk.
    pub fn checkpoint(&self) -> Result<()> {
        if !self.persistent {
            return Ok(());
        }
        let path = self.config.catalog_path();
        self.catalog
            .read()
            .save(&path)
            .with_context(|| format!("failed to save catalog {}", path.display()))?;
        info!(path = %path.display(), "checkpoint complete");
        Ok(())
    }

    /// Open a new session.
    pub fn session(self: &Arc<Self>) -> Session {
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        Session::new(id, Arc::clone(self))
    }
}
