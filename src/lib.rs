//! Column-oriented analytical database engine: mmap-backed column storage, sorted and
//! B+-tree indexes, a histogram-driven access-path planner, a batched-select scheduler,
//! nested-loop/hash/grace-hash joins, and a small DSL front end over a stream socket.
//!
//! The [`executor::Executor`] is the crate's main entry point for embedding: open a
//! [`catalog::Catalog`], parse statements with [`dsl::parse`], and drive them through
//! `Executor::execute`. The [`server`] module (behind the `server` feature) wraps that
//! in a `UnixListener` front end.

pub mod aggregate;
pub mod batch;
pub mod btree;
pub mod catalog;
pub mod column;
pub mod config;
pub mod context;
pub mod dsl;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod histogram;
pub mod join;
pub mod load;
pub mod planner;
#[cfg(feature = "server")]
pub mod server;
pub mod select;
pub mod sorted_index;
pub mod storage;
pub mod table;
mod util;
pub mod value;

pub use catalog::{Catalog, Database};
pub use config::Config;
pub use error::{ExecError, ExecResult, StatusCode};
pub use executor::Executor;
pub use value::{ElementType, TypedVec};

#[cfg(test)]
mod test_support {
    /// Route `tracing` output to the test harness, controlled by `RUST_LOG`.
    /// Safe to call repeatedly — only the first call takes effect.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}
