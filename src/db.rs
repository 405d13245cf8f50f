//! # Database Module (Connect-Store)
//!
//! Owns the SQLite connections behind every operation. Writes go through a
//! single writer connection inside `BEGIN IMMEDIATE`; reads run inside a
//! deferred transaction so a multi-statement query sees one snapshot.
//!
//! File-backed stores open a second, read-only connection in WAL mode so
//! queries are not queued behind writes. In-memory stores cannot share their
//! data across connections, so they read through the writer.

use crate::error::{ConnectError, ConnectResult};
use rusqlite::TransactionBehavior;
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

/// Which registrations count against an event's capacity.
///
/// `CountAll` matches the historical capacity query, which counts a
/// registration whatever its attendance status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapacityPolicy {
    #[default]
    CountAll,
    ExcludeCancelled,
}

/// The Connect-Store: manages database connections and scoped transactions
pub struct ConnectStore {
    writer: Connection,
    reader: Option<Connection>,
    path: String,
    capacity_policy: CapacityPolicy,
}

impl ConnectStore {
    /// Opens (or creates) the database file at `path`
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    /// A store with WAL mode and foreign keys enabled, plus a read-only
    /// reader connection
    pub async fn new<P: AsRef<Path>>(path: P) -> ConnectResult<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        info!("Opening Community Connect store at: {}", path_str);

        let writer = Connection::open(&path_str)
            .await
            .map_err(|e| ConnectError::StoreUnavailable(format!("Failed to open database: {}", e)))?;
        Self::initialize_pragmas(&writer).await?;

        let reader = Connection::open(&path_str)
            .await
            .map_err(|e| ConnectError::StoreUnavailable(format!("Failed to open reader: {}", e)))?;
        Self::initialize_reader(&reader).await?;

        info!("Store ready with WAL mode");

        Ok(Self {
            writer,
            reader: Some(reader),
            path: path_str,
            capacity_policy: CapacityPolicy::default(),
        })
    }

    /// Creates an in-memory database (useful for testing)
    pub async fn in_memory() -> ConnectResult<Self> {
        info!("Opening in-memory Community Connect store");

        let writer = Connection::open_in_memory()
            .await
            .map_err(|e| ConnectError::StoreUnavailable(format!("Failed to create database: {}", e)))?;

        Self::initialize_pragmas(&writer).await?;

        Ok(Self {
            writer,
            reader: None,
            path: ":memory:".to_string(),
            capacity_policy: CapacityPolicy::default(),
        })
    }

    /// Replaces the capacity counting policy
    pub fn with_capacity_policy(mut self, policy: CapacityPolicy) -> Self {
        self.capacity_policy = policy;
        self
    }

    pub fn capacity_policy(&self) -> CapacityPolicy {
        self.capacity_policy
    }

    /// Writer pragmas:
    /// - PRAGMA journal_mode=WAL; (readers do not block the writer)
    /// - PRAGMA foreign_keys=ON; (cascade deletes and FK checks)
    async fn initialize_pragmas(conn: &Connection) -> ConnectResult<()> {
        debug!("Setting up writer pragmas...");

        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA foreign_keys=ON;
                 PRAGMA busy_timeout=5000;",
            )?;
            Ok(())
        })
        .await
        .map_err(|e| ConnectError::StoreUnavailable(format!("Failed to set pragmas: {}", e)))?;

        debug!("Writer pragmas configured");
        Ok(())
    }

    async fn initialize_reader(conn: &Connection) -> ConnectResult<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA query_only=ON;
                 PRAGMA busy_timeout=5000;",
            )?;
            Ok(())
        })
        .await
        .map_err(|e| ConnectError::StoreUnavailable(format!("Failed to set reader pragmas: {}", e)))
    }

    /// Runs `f` inside an IMMEDIATE transaction on the writer connection.
    ///
    /// The transaction commits only if `f` returns `Ok`; on any error it is
    /// dropped, which rolls back every statement `f` executed.
    pub async fn write<F, T>(&self, f: F) -> ConnectResult<T>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> ConnectResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.writer
            .call(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                match f(&tx) {
                    Ok(value) => {
                        tx.commit()?;
                        Ok(Ok(value))
                    }
                    Err(err) => Ok(Err(err)),
                }
            })
            .await?
    }

    /// Runs `f` inside a deferred read transaction, which is never committed
    pub async fn read<F, T>(&self, f: F) -> ConnectResult<T>
    where
        F: FnOnce(&rusqlite::Connection) -> ConnectResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.reader.as_ref().unwrap_or(&self.writer);
        conn.call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
            Ok(f(&tx))
        })
        .await?
    }

    /// Get the database file path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check if database is in-memory
    pub fn is_in_memory(&self) -> bool {
        self.path == ":memory:"
    }

    /// Liveness check for the health endpoint
    pub async fn ping(&self) -> ConnectResult<()> {
        self.read(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }
}
