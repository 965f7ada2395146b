//! Shared engine state and per-cursor-tree connections.

use crate::config::Config;
use crate::cursor::ScopeStack;
use crate::error::{CoreError, CoreResult};
use crate::store::CommittedStore;
use crate::transaction::TransactionManager;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// State shared by a database handle and every connection it opened.
pub(crate) struct Engine {
    config: Config,
    manager: Arc<TransactionManager>,
    open: AtomicBool,
    connections: AtomicUsize,
}

impl Engine {
    pub(crate) fn new(config: Config, manager: Arc<TransactionManager>) -> Self {
        Self {
            config,
            manager,
            open: AtomicBool::new(true),
            connections: AtomicUsize::new(0),
        }
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    pub(crate) fn store(&self) -> &Arc<CommittedStore> {
        self.manager.store()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Marks the engine closed. Returns `false` if it already was.
    pub(crate) fn shut_down(&self) -> bool {
        self.open.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Opens a connection with an empty scope stack.
    pub(crate) fn connect(self: &Arc<Self>) -> CoreResult<Arc<Connection>> {
        if !self.is_open() {
            return Err(CoreError::resource("database is closed"));
        }
        let limit = self.config.max_connections;
        let previous = self.connections.fetch_add(1, Ordering::SeqCst);
        if previous >= limit {
            self.connections.fetch_sub(1, Ordering::SeqCst);
            return Err(CoreError::resource(format!(
                "connection limit reached ({limit} connections)"
            )));
        }
        tracing::trace!(connections = previous + 1, "connection opened");
        Ok(Arc::new(Connection {
            engine: Arc::clone(self),
            stack: Mutex::new(ScopeStack::new(self.config.max_savepoints)),
        }))
    }
}

/// One root cursor's transactional resource, shared with its nested
/// cursors.
pub(crate) struct Connection {
    pub(crate) engine: Arc<Engine>,
    pub(crate) stack: Mutex<ScopeStack>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        let previous = self.engine.connections.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connections = previous.saturating_sub(1), "connection released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::JournalManager;
    use scopedb_storage::InMemoryBackend;

    fn engine(config: Config) -> Arc<Engine> {
        let journal = Arc::new(JournalManager::new(Box::new(InMemoryBackend::new()), false));
        let manager = Arc::new(TransactionManager::new(journal, Arc::new(CommittedStore::new())));
        Arc::new(Engine::new(config, manager))
    }

    #[test]
    fn connections_are_counted() {
        let engine = engine(Config::default());
        let a = engine.connect().unwrap();
        let b = engine.connect().unwrap();
        assert_eq!(engine.connection_count(), 2);
        drop(a);
        assert_eq!(engine.connection_count(), 1);
        drop(b);
        assert_eq!(engine.connection_count(), 0);
    }

    #[test]
    fn connection_limit_is_resource_error() {
        let engine = engine(Config::default().max_connections(1));
        let _held = engine.connect().unwrap();
        assert!(matches!(engine.connect(), Err(e) if e.is_resource()));
        assert_eq!(engine.connection_count(), 1);
    }

    #[test]
    fn closed_engine_refuses_connections() {
        let engine = engine(Config::default());
        assert!(engine.shut_down());
        assert!(!engine.shut_down());
        assert!(matches!(engine.connect(), Err(e) if e.is_resource()));
        assert!(matches!(engine.ensure_open(), Err(CoreError::DatabaseClosed)));
    }
}
