/*
 * Registry Module
 *
 * Maps behavior keys to constructors. A container owns one registry, fills it
 * before spawning bubbles, and resolves each bubble's key exactly once when
 * the bubble is built. Every resolution produces a fresh behavior instance so
 * per-bubble state (meal counts, toggles) is never shared.
 */

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::behavior::{Behavior, DebugBehavior, ImmortalBehavior, ModalBehavior, NormalBehavior};
use crate::config::BubbleConfig;
use crate::error::BubbleError;

pub const DEFAULT_KEY: &str = "default";
pub const IMMORTAL_KEY: &str = "immortal";

type Constructor = Rc<dyn Fn(&BubbleConfig) -> Behavior>;

#[derive(Clone)]
pub struct BehaviorRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl BehaviorRegistry {
    // A registry without the built-in behaviors
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(DEFAULT_KEY, |config| Behavior::Normal(NormalBehavior::new(config.growth_policy)));
        registry.register("normal", |config| Behavior::Normal(NormalBehavior::new(config.growth_policy)));
        registry.register(IMMORTAL_KEY, |_| Behavior::Immortal(ImmortalBehavior::new()));
        registry.register("modal", |_| Behavior::Modal(ModalBehavior::new()));
        registry.register("debug", |_| Behavior::Debug(DebugBehavior::default()));
        registry
    }

    /// Register `constructor` under `key`, replacing any previous entry.
    pub fn register<F>(&mut self, key: impl Into<String>, constructor: F)
    where
        F: Fn(&BubbleConfig) -> Behavior + 'static,
    {
        self.constructors.insert(key.into(), Rc::new(constructor));
    }

    pub fn resolve(&self, key: &str, config: &BubbleConfig) -> Result<Behavior, BubbleError> {
        self.constructors
            .get(key)
            .map(|constructor| constructor(config))
            .ok_or_else(|| BubbleError::UnknownBehavior(key.to_owned()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.constructors.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = BehaviorRegistry::default();
        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(keys, vec!["debug", "default", "immortal", "modal", "normal"]);
    }

    #[test]
    fn resolve_builds_a_fresh_instance() {
        let registry = BehaviorRegistry::default();
        let config = BubbleConfig::default();

        let first = registry.resolve(DEFAULT_KEY, &config).unwrap();
        first.record_meal();
        let second = registry.resolve(DEFAULT_KEY, &config).unwrap();

        match (first, second) {
            (Behavior::Normal(a), Behavior::Normal(b)) => {
                assert_eq!(a.meals(), 1);
                assert_eq!(b.meals(), 0);
            }
            other => panic!("expected two normal behaviors, got {:?}", other),
        }
    }

    #[test]
    fn unknown_key_is_an_error() {
        let registry = BehaviorRegistry::empty();
        let result = registry.resolve("wobbly", &BubbleConfig::default());
        assert!(matches!(result, Err(BubbleError::UnknownBehavior(key)) if key == "wobbly"));
    }

    #[test]
    fn custom_entries_can_replace_builtins() {
        let mut registry = BehaviorRegistry::default();
        registry.register(DEFAULT_KEY, |_| Behavior::Modal(ModalBehavior::new()));
        let behavior = registry.resolve(DEFAULT_KEY, &BubbleConfig::default()).unwrap();
        assert_eq!(behavior.name(), "modal");
    }
}
