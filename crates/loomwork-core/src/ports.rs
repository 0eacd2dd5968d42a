//! External collaborator surfaces referenced but out of scope.
//!
//! The core dispatch/graph loop is synchronous, so these port traits are
//! plain, not `async_trait`-annotated. A factory whose `read`/`write` need
//! to block on I/O does so inside its own synchronous method body, or
//! implements [`crate::factory::AsyncFactory`] instead.
//!
//! No implementations live here; concrete connectors (CSV/JDBC/Cassandra
//! wrappers and similar) are external collaborators and are never part of
//! this crate.

use crate::error::Result;

/// Capability to delete rows/records matching a query.
pub trait CanDelete {
    fn delete(&mut self, query: &str) -> Result<u64>;
}

/// Capability to upsert a batch of rows keyed by one or more columns.
pub trait CanUpdate<Row> {
    fn update(&mut self, rows: &[Row], key_columns: &[&str]) -> Result<u64>;
}

/// A data-store connector: the union of whatever read/write/delete/update
/// capabilities a concrete backend supports. The core only ever holds this
/// opaquely through a factory's `read`/`write`.
pub trait Connector: Send {
    fn name(&self) -> &str;
}

/// Storage mode for [`Repository::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Append,
    Overwrite,
    ErrorIfExists,
    Ignore,
}

/// Repository abstraction over a backing store of `T`.
pub trait Repository<T>: Send {
    type Filter;

    fn find_all(&self) -> Result<Vec<T>>;
    fn find_by(&self, filter: &Self::Filter) -> Result<Vec<T>>;
    fn save(&mut self, data: &[T], mode: SaveMode) -> Result<()>;
}

/// A builder that can be finalized (`build`) and produces/retrieves a value
/// of `A`, possibly lazily (`get_or_create`).
pub trait Builder<A> {
    fn build(self) -> Self
    where
        Self: Sized;

    fn get(&self) -> Result<A>;

    fn get_or_create(&mut self) -> Result<A>;
}
