//! Start-order resolution.
//!
//! Three relation kinds feed one graph: `depends_on` (target used as is),
//! `links` (target before `:alias`) and `volumes_from` (target before
//! `:ro|rw`). Each kind keeps its own self-reference and syntax errors.
//! Ordering is Kahn's algorithm; when several services are ready at once the
//! one declared first wins.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use wsrt_core::error::check_argument;
use wsrt_core::validation::{link_target, volumes_from_target};
use wsrt_core::ValidationError;

use crate::model::ContainerConfig;

/// Services in the order they must be created.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StartOrder(Vec<String>);

impl StartOrder {
    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }
}

impl From<StartOrder> for Vec<String> {
    fn from(order: StartOrder) -> Self {
        order.0
    }
}

/// Computes the start order of `services`.
///
/// Pure and deterministic: the same map always yields the same order.
pub fn resolve(services: &IndexMap<String, ContainerConfig>) -> Result<StartOrder, ValidationError> {
    let positions: HashMap<&str, usize> = services
        .keys()
        .enumerate()
        .map(|(position, name)| (name.as_str(), position))
        .collect();

    let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); services.len()];
    let mut in_degree = vec![0usize; services.len()];

    for (position, (name, service)) in services.iter().enumerate() {
        let requires = requirements(name, service, &positions)?;
        in_degree[position] = requires.len();
        for required in requires {
            dependents[required].insert(position);
        }
    }

    let mut ready: BTreeSet<usize> = (0..services.len())
        .filter(|&position| in_degree[position] == 0)
        .collect();
    let mut order = Vec::with_capacity(services.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < services.len() {
        let unresolved: Vec<&str> = services
            .keys()
            .enumerate()
            .filter(|&(position, _)| in_degree[position] > 0)
            .map(|(_, name)| name.as_str())
            .collect();
        return Err(ValidationError::new(format!(
            "Launch order of services '{}' can't be evaluated. Circular dependency.",
            unresolved.join(", ")
        )));
    }

    let names: Vec<&String> = services.keys().collect();
    Ok(StartOrder(
        order.into_iter().map(|position| names[position].clone()).collect(),
    ))
}

/// Collects the distinct positions `name` must start after.
fn requirements(
    name: &str,
    service: &ContainerConfig,
    positions: &HashMap<&str, usize>,
) -> Result<BTreeSet<usize>, ValidationError> {
    let mut requires = BTreeSet::new();

    for dependency in &service.depends_on {
        check_argument(dependency != name, || {
            format!("A service can not depend on itself: {name}")
        })?;
        requires.insert(known(name, dependency, positions)?);
    }

    for link in &service.links {
        let target = link_target(link)
            .ok_or_else(|| ValidationError::new(format!("Service link '{link}' is invalid")))?;
        check_argument(target != name, || {
            format!("A service can not link to itself: {name}")
        })?;
        requires.insert(known(name, target, positions)?);
    }

    for volumes_from in &service.volumes_from {
        let target = volumes_from_target(volumes_from).ok_or_else(|| {
            ValidationError::new(format!("Service volumes_from '{volumes_from}' is invalid"))
        })?;
        check_argument(target != name, || {
            format!("A service can not contain 'volumes_from' to itself: {name}")
        })?;
        requires.insert(known(name, target, positions)?);
    }

    Ok(requires)
}

fn known(
    service: &str,
    target: &str,
    positions: &HashMap<&str, usize>,
) -> Result<usize, ValidationError> {
    positions.get(target).copied().ok_or_else(|| {
        ValidationError::new(format!(
            "Dependency '{target}' in service '{service}' points to unknown service."
        ))
    })
}
