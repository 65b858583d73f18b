#![deny(unsafe_code, clippy::panic)]

//! TaskChain assembles small, composable *configs* into a directed acyclic
//! graph of content-addressed *tasks*, computes each task at most once per
//! distinct input fingerprint, and transparently persists and reloads
//! results across runs and processes.
//!
//! The entry points are [`Config`](config::Config) (parse one or more config
//! documents) and [`Chain`](chain::Chain) (resolve a config into a runnable
//! DAG). See the module docs on [`chain`] for the end-to-end flow.

pub mod binder;
pub mod chain;
pub mod config;
pub mod core;
pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod handler;
pub mod instance;
pub mod linker;
pub mod lock;
pub mod multichain;
pub mod registry;
pub mod run_info;
pub mod task;

pub use chain::Chain;
pub use config::Config;
pub use core::Mode;
pub use error::TaskChainError;
pub use instance::TaskInstance;
pub use multichain::MultiChain;
pub use task::{ParamSpec, TaskClass};
