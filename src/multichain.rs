//! MultiChain Coordinator (spec §4.8): groups several independently-built
//! [`Chain`]s under one name-indexed handle, and shares a task's computed
//! value across chains when two chains happen to resolve the same task
//! class and parameters to an identical [`Fingerprint`] — the typical case
//! being a `train`/`test` split whose shared preprocessing steps produce the
//! same fingerprint in both chains.
//!
//! Each member [`Chain`] keeps its own on-disk artifacts and in-memory
//! cache; [`MultiChain`] only adds a second, fingerprint-keyed cache layer
//! on top so a value computed through one chain is reused by another
//! without going through that chain's own execution path a second time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::chain::Chain;
use crate::core::Dynamic;
use crate::error::TaskChainError;
use crate::fingerprint::Fingerprint;

/// A named collection of chains built against the same task registry but
/// potentially different configs (spec §4.8 "multi-chain merge").
pub struct MultiChain {
    chains: IndexMap<String, Chain>,
    shared_values: Mutex<HashMap<Fingerprint, Dynamic>>,
}

impl MultiChain {
    /// Groups `members` (name, already-built chain) under one coordinator.
    /// Every member must share the same [`crate::core::Mode`] (Open
    /// Question (b): rejected as [`TaskChainError::ParameterModeMismatch`]
    /// rather than silently picking one), and names must be unique
    /// ([`TaskChainError::DuplicateChainName`]).
    pub fn build(members: Vec<(String, Chain)>) -> Result<MultiChain, TaskChainError> {
        let mut chains = IndexMap::new();
        let mut mode = None;

        for (name, chain) in members {
            if chains.contains_key(&name) {
                return Err(TaskChainError::DuplicateChainName(name));
            }

            match mode {
                None => mode = Some(chain.mode()),
                Some(m) if m == chain.mode() => {}
                Some(_) => return Err(TaskChainError::ParameterModeMismatch),
            }

            chains.insert(name, chain);
        }

        Ok(MultiChain {
            chains,
            shared_values: Mutex::new(HashMap::new()),
        })
    }

    pub fn chain(&self, name: &str) -> Option<&Chain> {
        self.chains.get(name)
    }

    pub fn chain_names(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    /// Computes `task_name` within `chain_name`, reusing a value already
    /// computed for an equal fingerprint through a different member chain
    /// instead of recomputing it.
    pub fn value(&self, chain_name: &str, task_name: &str) -> Result<Dynamic, TaskChainError> {
        let chain = self
            .chains
            .get(chain_name)
            .ok_or_else(|| TaskChainError::UnknownChain(chain_name.to_string()))?;
        let task = chain.task(task_name)?;
        let fingerprint = task.fingerprint();

        if let Some(cached) = self.shared_values.lock().expect("multichain cache mutex poisoned").get(&fingerprint).cloned() {
            return Ok(cached);
        }

        let value = task.value()?;
        self.shared_values
            .lock()
            .expect("multichain cache mutex poisoned")
            .insert(fingerprint, Arc::clone(&value));
        Ok(value)
    }
}
