//! Dependency graph resolution.
//!
//! Turns a declarative unit list into a deployment order in which every unit comes
//! strictly after the units it depends on. When several orders are valid, the unit that
//! appears first in the input is always picked first, so the same input yields the same
//! order on every run.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::{DeploymentUnit, recorder::ERROR_ENTRY_KEY};

/// Resolution failures. Nothing is deployed when any of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("dependency cycle between units: {}", members.join(" -> "))]
    Cycle { members: Vec<String> },

    #[error("unit '{unit}' depends on unknown unit '{dependency}'")]
    UnknownDependency { unit: String, dependency: String },

    #[error("unit '{name}' is declared more than once")]
    DuplicateUnit { name: String },

    #[error("unit '{unit}' would be published as '{key}', which another unit already uses")]
    DuplicateOutputKey { unit: String, key: String },

    #[error("unit '{unit}' would be published as '{key}', which is reserved")]
    ReservedOutputKey { unit: String, key: String },
}

/// Resolve the deployment order of `units`.
pub fn resolve(units: Vec<DeploymentUnit>) -> Result<Vec<DeploymentUnit>, ResolveError> {
    let mut index = HashMap::with_capacity(units.len());
    let mut keys = HashSet::with_capacity(units.len());
    for (i, unit) in units.iter().enumerate() {
        if index.insert(unit.name.as_str(), i).is_some() {
            return Err(ResolveError::DuplicateUnit {
                name: unit.name.clone(),
            });
        }

        // Every unit needs its own entry in the address file.
        let key = unit.output_key();
        if key == ERROR_ENTRY_KEY {
            return Err(ResolveError::ReservedOutputKey {
                unit: unit.name.clone(),
                key,
            });
        }
        if keys.contains(&key) {
            return Err(ResolveError::DuplicateOutputKey {
                unit: unit.name.clone(),
                key,
            });
        }
        keys.insert(key);
    }

    // deps[i] holds the input indices unit i waits for.
    let mut deps: Vec<Vec<usize>> = Vec::with_capacity(units.len());
    for unit in &units {
        let mut resolved = Vec::with_capacity(unit.dependencies.len());
        for dep in &unit.dependencies {
            let Some(&j) = index.get(dep.as_str()) else {
                return Err(ResolveError::UnknownDependency {
                    unit: unit.name.clone(),
                    dependency: dep.clone(),
                });
            };
            resolved.push(j);
        }
        deps.push(resolved);
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); units.len()];
    let mut remaining: Vec<usize> = deps.iter().map(Vec::len).collect();
    for (i, unit_deps) in deps.iter().enumerate() {
        for &j in unit_deps {
            dependents[j].push(i);
        }
    }

    // Kahn's algorithm; the ready set is ordered by input index.
    let mut ready: BTreeSet<usize> = (0..units.len()).filter(|&i| remaining[i] == 0).collect();
    let mut order = Vec::with_capacity(units.len());

    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &k in &dependents[i] {
            remaining[k] -= 1;
            if remaining[k] == 0 {
                ready.insert(k);
            }
        }
    }

    if order.len() < units.len() {
        let members = find_cycle(&deps, &remaining)
            .into_iter()
            .map(|i| units[i].name.clone())
            .collect();
        return Err(ResolveError::Cycle { members });
    }

    let mut slots: Vec<Option<DeploymentUnit>> = units.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}

/// Walk unresolved dependencies from the first blocked unit until a unit repeats.
///
/// Every blocked unit has at least one blocked dependency, so the walk always closes a
/// loop. The members are returned in input order.
fn find_cycle(deps: &[Vec<usize>], remaining: &[usize]) -> Vec<usize> {
    let blocked = |i: usize| remaining[i] > 0;

    let Some(start) = (0..deps.len()).find(|&i| blocked(i)) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut current = start;
    loop {
        let Some(&next) = deps[current].iter().find(|&&j| blocked(j)) else {
            return path;
        };
        if let Some(pos) = path.iter().position(|&i| i == next) {
            let mut cycle = path.split_off(pos);
            cycle.sort_unstable();
            return cycle;
        }
        path.push(next);
        current = next;
    }
}
