//! Operator session: configuration, query backend and the current result set.
//!
//! Every operator action goes through this one context object. There is no
//! process-wide state; a run replaces the table wholesale.
use crate::batch::{BatchRunner, RunnerConfig};
use crate::client::{HttpQueryClient, QueryBackend, QueryField};
use crate::config::{Endpoints, Environment, KeyValueStore, SessionConfig};
use crate::error::{QueryError, QueryResult};
use crate::export::{self, ExportFormat};
use crate::table::{ResultTable, SortSpec};
use crate::util::{split_items, Pacer};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

pub struct Session<B, P> {
    config: SessionConfig,
    backend: B,
    pacer: P,
    runner: RunnerConfig,
    table: ResultTable,
}

impl<P: Pacer> Session<HttpQueryClient, P> {
    /// Load configuration and bind an HTTP client to it.
    ///
    /// Fails with `MissingCredential` before anything else is built.
    pub fn open(
        store: &dyn KeyValueStore,
        endpoints: Endpoints,
        pacer: P,
        runner: RunnerConfig,
    ) -> QueryResult<Self> {
        let config = SessionConfig::load(store)?;
        let client = HttpQueryClient::new(endpoints, config.environment, config.credential());
        tracing::info!(environment = config.environment.as_str(), "session opened");
        Ok(Self::new(config, client, pacer, runner))
    }
}

impl<B, P> Session<B, P>
where
    B: QueryBackend,
    P: Pacer,
{
    pub fn new(config: SessionConfig, mut backend: B, pacer: P, runner: RunnerConfig) -> Self {
        backend.set_environment(config.environment);
        Self {
            config,
            backend,
            pacer,
            runner,
            table: ResultTable::default(),
        }
    }

    pub fn environment(&self) -> Environment {
        self.config.environment
    }

    pub fn table(&self) -> &ResultTable {
        &self.table
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Split raw operator input and run the batch over it, reporting
    /// `progress(done, total)` after each item.
    pub fn run_batch<F>(
        &mut self,
        field: QueryField,
        raw_input: &str,
        mut progress: F,
    ) -> QueryResult<&ResultTable>
    where
        F: FnMut(usize, usize),
    {
        let items = split_items(raw_input);
        if items.is_empty() {
            return Err(QueryError::EmptyInput);
        }
        let records = BatchRunner::new(&mut self.backend, &mut self.pacer, self.runner)
            .with_progress(&mut progress)
            .run(&items, field);
        self.table.replace(records);
        Ok(&self.table)
    }

    pub fn resort(&mut self, key: &str) -> QueryResult<SortSpec> {
        self.table.toggle_sort(key)
    }

    /// Tab-separated snapshot of the table for the clipboard.
    pub fn copy_text(&self) -> QueryResult<String> {
        if self.table.is_empty() {
            return Err(QueryError::NoResults { action: "copy" });
        }
        Ok(self.table.to_tabular_text())
    }

    pub fn export(
        &self,
        format: ExportFormat,
        dir: &Path,
        date: NaiveDate,
    ) -> QueryResult<PathBuf> {
        if self.table.is_empty() {
            return Err(QueryError::NoResults { action: "export" });
        }
        export::write_export(format, &self.table.to_export_rows(), dir, date)
    }

    /// Switch environments and persist the choice.
    pub fn set_environment(
        &mut self,
        store: &mut dyn KeyValueStore,
        environment: Environment,
    ) -> QueryResult<()> {
        self.config.save(store, environment)?;
        self.backend.set_environment(environment);
        Ok(())
    }

    /// Status bar text, e.g. `3 results | env: UAT`.
    pub fn status_line(&self, text: &str) -> String {
        format!("{text} | env: {}", self.config.environment)
    }
}
