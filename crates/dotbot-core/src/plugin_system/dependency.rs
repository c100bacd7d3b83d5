use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::plugin_system::manifest::PluginDescriptor;

/// Reasons a set of descriptors cannot be ordered. All of them abort loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("Plugin '{plugin}' has a missing dependency: {dependency}")]
    MissingDependency { plugin: String, dependency: String },

    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Duplicate plugin id: {0}")]
    DuplicatePluginId(String),
}

/// Orders plugin descriptors so every dependency precedes its dependents.
///
/// Extensions seed the traversal first, then the remaining plugins; both groups are
/// visited in lexical id order, which makes the result deterministic.
#[derive(Debug)]
pub struct DependencyResolver<'a> {
    descriptors: BTreeMap<&'a str, &'a PluginDescriptor>,
}

impl<'a> DependencyResolver<'a> {
    /// Index `descriptors` by id, rejecting duplicates.
    pub fn new(descriptors: impl IntoIterator<Item = &'a PluginDescriptor>) -> Result<Self, DependencyError> {
        let mut map = BTreeMap::new();
        for descriptor in descriptors {
            if map.insert(descriptor.id.as_str(), descriptor).is_some() {
                return Err(DependencyError::DuplicatePluginId(descriptor.id.clone()));
            }
        }
        Ok(Self { descriptors: map })
    }

    /// Compute the load order.
    pub fn resolve(&self) -> Result<Vec<String>, DependencyError> {
        let seeds = self
            .descriptors
            .values()
            .filter(|d| d.is_extension)
            .chain(self.descriptors.values().filter(|d| !d.is_extension));

        let mut order = Vec::with_capacity(self.descriptors.len());
        let mut done = HashSet::new();
        let mut in_progress = Vec::new();
        for descriptor in seeds {
            self.visit(&descriptor.id, &mut in_progress, &mut done, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        id: &'a str,
        in_progress: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<(), DependencyError> {
        if done.contains(id) {
            return Ok(());
        }
        if let Some(start) = in_progress.iter().position(|&p| p == id) {
            let mut cycle: Vec<String> = in_progress[start..].iter().map(|s| s.to_string()).collect();
            cycle.push(id.to_string());
            return Err(DependencyError::DependencyCycle(cycle));
        }

        in_progress.push(id);
        if let Some(descriptor) = self.descriptors.get(id) {
            for dependency in &descriptor.dependencies {
                let Some((&dep_id, _)) = self.descriptors.get_key_value(dependency.as_str()) else {
                    return Err(DependencyError::MissingDependency {
                        plugin: id.to_string(),
                        dependency: dependency.clone(),
                    });
                };
                self.visit(dep_id, in_progress, done, order)?;
            }
        }
        in_progress.pop();

        done.insert(id);
        order.push(id.to_string());
        Ok(())
    }
}

/// Resolve `descriptors` into load order, returning them sorted.
pub fn resolve_load_order(descriptors: Vec<PluginDescriptor>) -> Result<Vec<PluginDescriptor>, DependencyError> {
    let order = DependencyResolver::new(&descriptors)?.resolve()?;
    let mut by_id: BTreeMap<String, PluginDescriptor> =
        descriptors.into_iter().map(|d| (d.id.clone(), d)).collect();
    Ok(order.iter().filter_map(|id| by_id.remove(id)).collect())
}
