//! Execution scope resolution and ordering
//!
//! A pass runs over a *scope*: a subset of the network's modules. The
//! scheduler resolves the scope to a module set and orders it with Kahn's
//! algorithm over the induced subgraph. Ties are broken by module id so the
//! same network always yields the same order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, Result};
use crate::network::Network;
use crate::types::ModuleId;

/// Which modules a pass covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "modules", rename_all = "snake_case")]
pub enum ExecutionScope {
    /// Every module in the network
    All,
    /// The given modules plus everything they depend on
    Upstream(Vec<ModuleId>),
    /// The given module plus everything depending on it
    Downstream(ModuleId),
    /// Exactly one module
    Single(ModuleId),
}

/// Resolve a scope to the set of modules it covers
pub fn resolve_scope(network: &Network, scope: &ExecutionScope) -> Result<BTreeSet<ModuleId>> {
    let require = |id: &ModuleId| -> Result<()> {
        if network.contains_module(id) {
            Ok(())
        } else {
            Err(NetworkError::ModuleNotFound(id.clone()))
        }
    };

    match scope {
        ExecutionScope::All => Ok(network.module_ids().cloned().collect()),
        ExecutionScope::Upstream(targets) => {
            targets.iter().try_for_each(require)?;
            Ok(network.upstream_closure(targets))
        }
        ExecutionScope::Downstream(source) => {
            require(source)?;
            Ok(network.downstream_closure(source))
        }
        ExecutionScope::Single(id) => {
            require(id)?;
            Ok(BTreeSet::from([id.clone()]))
        }
    }
}

/// Order `members` so every module comes after the members it depends on
///
/// Dependencies on modules outside `members` are ignored. Fails with
/// `CyclicDependency` listing the modules that could not be ordered.
pub fn topological_order(network: &Network, members: &BTreeSet<ModuleId>) -> Result<Vec<ModuleId>> {
    let mut in_degree: BTreeMap<&ModuleId, usize> = members.iter().map(|id| (id, 0)).collect();
    let mut consumers: BTreeMap<&ModuleId, BTreeSet<ModuleId>> = BTreeMap::new();

    for id in members {
        let upstream: BTreeSet<ModuleId> = network
            .upstream_of(id)
            .into_iter()
            .filter(|up| members.contains(up))
            .collect();
        if let Some(degree) = in_degree.get_mut(id) {
            *degree = upstream.len();
        }
        for up in upstream {
            if let Some(member) = members.get(&up) {
                consumers.entry(member).or_default().insert(id.clone());
            }
        }
    }

    let mut ready: BTreeSet<ModuleId> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(&id, _)| id.clone())
        .collect();

    let mut order = Vec::with_capacity(members.len());
    while let Some(id) = ready.pop_first() {
        if let Some(next) = consumers.get(&id) {
            for consumer in next {
                if let Some(degree) = in_degree.get_mut(consumer) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(consumer.clone());
                    }
                }
            }
        }
        order.push(id);
    }

    if order.len() < members.len() {
        let modules: Vec<ModuleId> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(id, _)| id.clone())
            .collect();
        return Err(NetworkError::CyclicDependency { modules });
    }

    Ok(order)
}
