//! Sticky A/B variant selection.

use crate::analytics::KeyValueStore;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// One arm of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    A,
    B,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::A => "A",
            Variant::B => "B",
        }
    }

    /// Call-to-action label shown for this variant.
    pub fn cta_text(&self) -> &'static str {
        match self {
            Variant::A => "Try it free for 7 days",
            Variant::B => "Start now, free for 7 days",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "A" => Some(Variant::A),
            "B" => Some(Variant::B),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Experiment settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AbConfig {
    /// Storage key holding the chosen variant.
    pub key: String,
    /// Probability of drawing [`Variant::A`], between 0 and 1.
    pub weight_a: f64,
}

impl Default for AbConfig {
    fn default() -> Self {
        Self {
            key: "landing_final_cta".to_string(),
            weight_a: 0.5,
        }
    }
}

/// Draws a variant once and remembers it in the key-value store.
#[derive(Debug, Clone)]
pub struct AbTestManager {
    config: AbConfig,
    store: Arc<dyn KeyValueStore>,
}

impl AbTestManager {
    pub fn new(config: AbConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self { config, store }
    }

    /// Returns the stored variant, drawing and storing one on first use.
    pub fn choose_variant(&self) -> Variant {
        self.choose_variant_with(&mut rand::thread_rng())
    }

    /// Same as [`choose_variant`](Self::choose_variant) with a caller-supplied RNG.
    pub fn choose_variant_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Variant {
        match self.store.get(&self.config.key) {
            Ok(Some(raw)) => {
                if let Some(variant) = Variant::parse(&raw) {
                    return variant;
                }
            }
            Ok(None) => {}
            Err(e) => warn!(key = %self.config.key, error = %e, "Failed to read stored variant"),
        }

        let variant = if rng.gen::<f64>() < self.config.weight_a {
            Variant::A
        } else {
            Variant::B
        };
        if let Err(e) = self.store.set(&self.config.key, variant.as_str().to_string()) {
            warn!(key = %self.config.key, error = %e, "Failed to store variant");
        }
        info!(key = %self.config.key, %variant, "AB variant chosen");
        variant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_weights_decide_first_draw() {
        let store = Arc::new(MemoryStore::new());
        let config = AbConfig {
            weight_a: 1.0,
            ..AbConfig::default()
        };
        let manager = AbTestManager::new(config, store.clone());
        assert_eq!(manager.choose_variant(), Variant::A);
        assert_eq!(store.get("landing_final_cta").unwrap().as_deref(), Some("A"));
    }

    #[test]
    fn test_choice_is_sticky() {
        let store = Arc::new(MemoryStore::new());
        let manager = AbTestManager::new(AbConfig::default(), store);
        let mut rng = StdRng::seed_from_u64(7);
        let first = manager.choose_variant_with(&mut rng);
        for _ in 0..20 {
            assert_eq!(manager.choose_variant_with(&mut rng), first);
        }
    }

    #[test]
    fn test_garbage_is_redrawn() {
        let store = Arc::new(MemoryStore::new());
        store.set("landing_final_cta", "C".to_string()).unwrap();
        let config = AbConfig {
            weight_a: 0.0,
            ..AbConfig::default()
        };
        let manager = AbTestManager::new(config, store.clone());
        assert_eq!(manager.choose_variant(), Variant::B);
        assert_eq!(store.get("landing_final_cta").unwrap().as_deref(), Some("B"));
    }

    #[test]
    fn test_cta_text_differs_per_variant() {
        assert_eq!(Variant::A.cta_text(), "Try it free for 7 days");
        assert_eq!(Variant::B.cta_text(), "Start now, free for 7 days");
    }
}
