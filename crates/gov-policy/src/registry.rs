// registry.rs — Capability registry seam.
//
// The live capability registry is an external collaborator. The policy
// engine only needs one question answered: "does this capability have a
// registered provider?" — so that is the whole trait. Tests and the CLI
// use the in-memory implementation.

use std::collections::BTreeMap;

use gov_plan::Plan;

/// Resolves capability names to provider identifiers.
pub trait CapabilityRegistry: Send + Sync {
    /// The provider registered for `capability`, or None if unresolved.
    fn resolve(&self, capability: &str) -> Option<String>;
}

/// A capability registry backed by a plain map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    providers: BTreeMap<String, String>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for a capability, replacing any existing one.
    pub fn register(&mut self, capability: impl Into<String>, provider: impl Into<String>) {
        self.providers.insert(capability.into(), provider.into());
    }

    /// Build a registry where each capability is served by a provider named
    /// `<capability>-provider`. Convenient for tests and simulation.
    pub fn with_default_providers(capabilities: &[&str]) -> Self {
        let mut registry = Self::new();
        for cap in capabilities {
            registry.register(*cap, format!("{}-provider", cap));
        }
        registry
    }
}

impl CapabilityRegistry for InMemoryRegistry {
    fn resolve(&self, capability: &str) -> Option<String> {
        self.providers.get(capability).cloned()
    }
}

/// The plan's required capabilities that have no registered provider,
/// in plan order, de-duplicated.
pub fn unresolved_capabilities(plan: &Plan, registry: &dyn CapabilityRegistry) -> Vec<String> {
    let mut missing = Vec::new();
    for cap in &plan.required_capabilities {
        if registry.resolve(cap).is_none() && !missing.contains(cap) {
            missing.push(cap.clone());
        }
    }
    missing
}
