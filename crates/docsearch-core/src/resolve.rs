//! Library name resolution.
//!
//! `normalize` never rejects a non-empty name: unknown input passes through
//! lower-cased so callers can echo it back. Use `validate` as the gate.

use crate::registry::Registry;

#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    registry: &'a Registry,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    pub fn normalize(&self, raw: Option<&str>) -> Option<String> {
        let name = raw?.trim().to_lowercase();
        if name.is_empty() {
            return None;
        }
        if let Some(target) = self.registry.alias_target(&name) {
            return Some(target.to_string());
        }
        if self.registry.contains(&name) {
            return Some(name);
        }
        Some(
            self.fuzzy_match(&name)
                .map(str::to_string)
                .unwrap_or(name),
        )
    }

    /// Longest id that contains, or is contained in, `name`. Ties keep declaration order.
    fn fuzzy_match(&self, name: &str) -> Option<&'a str> {
        let registry: &'a Registry = self.registry;
        let mut best: Option<&'a str> = None;
        for id in registry.ids() {
            if !(name.contains(id) || id.contains(name)) {
                continue;
            }
            if best.map_or(true, |b| id.len() > b.len()) {
                best = Some(id);
            }
        }
        best
    }

    pub fn validate(&self, raw: Option<&str>) -> Option<String> {
        self.normalize(raw).filter(|id| self.registry.contains(id))
    }

    pub fn get_url(&self, raw: Option<&str>) -> Option<String> {
        let id = self.normalize(raw)?;
        self.registry.lookup(&id).map(str::to_string)
    }
}
