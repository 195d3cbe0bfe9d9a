//! Routing of canonical variable names to the sources that provide them.
//!
//! Build happens in two phases. During registration every module publishes
//! its outputs and requires its inputs; a required name nobody provides yet
//! becomes a deferred binding instead of an immediate error. After all
//! modules are registered, `resolve_all` points every deferred binding at a
//! later-registered source (look-back resolution) or accepts a configured
//! default, and only then does an unmet requirement fail the build.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{CoupleError, CoupleResult};
use crate::module::Module;
use crate::provider::TimeIndexedDataProvider;

/// Where a variable's values come from.
#[derive(Clone)]
pub enum ProviderRef {
    /// Output of the pipeline module at this position.
    Module(usize),
    /// An external data source.
    External(Arc<dyn TimeIndexedDataProvider>),
}

impl fmt::Debug for ProviderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderRef::Module(index) => write!(f, "Module({index})"),
            ProviderRef::External(_) => write!(f, "External"),
        }
    }
}

/// What a module should use to fill one input right now.
#[derive(Debug, Clone)]
pub enum InputSource {
    Provider(ProviderRef),
    Default(f64),
}

/// A required input that could not be bound at registration time, or that
/// carries a configured default.
#[derive(Debug)]
struct DeferredBinding {
    name: String,
    module_index: usize,
    default: Option<f64>,
    /// How many queries the default is served for. `None` with no resolved
    /// provider means the default serves indefinitely.
    wait_count: Option<u32>,
    used_defaults: u32,
    resolved: Option<ProviderRef>,
}

#[derive(Debug, Clone)]
pub(crate) struct DefaultSpec {
    pub value: f64,
    pub wait_count: Option<u32>,
}

#[derive(Default)]
pub struct VariableRouter {
    // canonical name -> (source, owner description)
    bindings: HashMap<String, (ProviderRef, String)>,
    deferred: Vec<DeferredBinding>,
}

impl VariableRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `owner` provides `name`. Two providers for one canonical
    /// name is a build error.
    pub fn publish(&mut self, name: &str, provider: ProviderRef, owner: &str) -> CoupleResult<()> {
        if let Some((_, existing)) = self.bindings.get(name) {
            return Err(CoupleError::DuplicateOutput {
                variable: name.to_string(),
                module: owner.to_string(),
                existing: existing.clone(),
            });
        }
        debug!(variable = name, owner = owner, "published output variable");
        self.bindings
            .insert(name.to_string(), (provider, owner.to_string()));
        Ok(())
    }

    /// Record that the module at `module_index` needs `name`.
    ///
    /// A configured default always creates a deferred binding so wait counts
    /// apply even when a provider already exists; otherwise an already-bound
    /// name needs no bookkeeping and an unbound one is deferred for
    /// look-back resolution.
    pub(crate) fn require(
        &mut self,
        name: &str,
        module_index: usize,
        defaults: &HashMap<String, DefaultSpec>,
    ) {
        let default = defaults.get(name);
        if default.is_none() && self.bindings.contains_key(name) {
            return;
        }
        debug!(
            variable = name,
            module_index,
            has_default = default.is_some(),
            "deferring input binding"
        );
        self.deferred.push(DeferredBinding {
            name: name.to_string(),
            module_index,
            default: default.map(|spec| spec.value),
            wait_count: default.and_then(|spec| spec.wait_count),
            used_defaults: 0,
            resolved: None,
        });
    }

    /// Point every deferred binding at a source, now that all modules are
    /// registered. Bindings with neither a source nor a default fail the
    /// build, all reported at once.
    pub fn resolve_all(&mut self, modules: &[Module]) -> CoupleResult<()> {
        let mut unmet: Vec<String> = Vec::new();
        for binding in &mut self.deferred {
            if let Some((provider, owner)) = self.bindings.get(&binding.name) {
                debug!(
                    variable = binding.name.as_str(),
                    owner = owner.as_str(),
                    "resolved deferred binding"
                );
                binding.resolved = Some(provider.clone());
                continue;
            }
            // The published table is keyed on canonical names; fall back to
            // matching a module's native output spelling.
            if let Some(module) = modules.iter().find(|module| module.provides(&binding.name)) {
                debug!(
                    variable = binding.name.as_str(),
                    module = module.name(),
                    "resolved deferred binding against native output name"
                );
                binding.resolved = Some(ProviderRef::Module(module.index()));
                continue;
            }
            if binding.default.is_some() {
                debug!(
                    variable = binding.name.as_str(),
                    "no source found, configured default will be served"
                );
                continue;
            }
            if !unmet.contains(&binding.name) {
                unmet.push(binding.name.clone());
            }
        }
        if !unmet.is_empty() {
            unmet.sort();
            return Err(CoupleError::UnresolvedBindings(unmet.join(", ")));
        }
        Ok(())
    }

    /// The source module `module_index` should use for `name` on this query.
    ///
    /// Serving a default decrements that binding's remaining wait count, so
    /// queries are counted: a resolved binding with waits serves the default
    /// for the first `wait_count` queries then hands over to the provider.
    pub fn input_source(&mut self, module_index: usize, name: &str) -> CoupleResult<InputSource> {
        let binding = self
            .deferred
            .iter_mut()
            .find(|binding| binding.module_index == module_index && binding.name == name);
        let Some(binding) = binding else {
            return match self.bindings.get(name) {
                Some((provider, _)) => Ok(InputSource::Provider(provider.clone())),
                None => Err(CoupleError::UnknownVariable(name.to_string())),
            };
        };

        match (&binding.resolved, binding.default, binding.wait_count) {
            (Some(_), Some(default), Some(waits)) if binding.used_defaults < waits => {
                binding.used_defaults += 1;
                debug!(
                    variable = name,
                    used = binding.used_defaults,
                    waits,
                    "serving default while provider waits"
                );
                Ok(InputSource::Default(default))
            }
            (Some(provider), _, _) => Ok(InputSource::Provider(provider.clone())),
            (None, Some(default), None) => Ok(InputSource::Default(default)),
            (None, Some(default), Some(waits)) => {
                if binding.used_defaults < waits {
                    binding.used_defaults += 1;
                    Ok(InputSource::Default(default))
                } else {
                    warn!(
                        variable = name,
                        uses = waits,
                        "default exhausted with no provider available"
                    );
                    Err(CoupleError::DefaultExhausted {
                        variable: name.to_string(),
                        uses: waits,
                    })
                }
            }
            (None, None, _) => Err(CoupleError::UnresolvedBindings(name.to_string())),
        }
    }

    /// Read-only lookup of the published source for a name.
    pub fn provider_for(&self, name: &str) -> Option<ProviderRef> {
        self.bindings.get(name).map(|(provider, _)| provider.clone())
    }

    /// Every published canonical name.
    pub fn published_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.bindings.keys().cloned().collect();
        names.sort();
        names
    }

    #[cfg(test)]
    pub(crate) fn deferred_count(&self) -> usize {
        self.deferred.len()
    }
}
