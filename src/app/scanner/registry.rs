use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::traits::Ecosystem;

/// enumerates versioned scanners grouped by ecosystem.
///
/// Registration is idempotent: registering the same ecosystem name twice
/// logs a warning and keeps the first registration (§9, "initialization
/// order is not guaranteed, so registration must be idempotent"). Built with
/// the `strict-dev` feature, a duplicate registration panics instead, so
/// that development builds catch registration-order bugs that would
/// otherwise only show up as silently-dropped scanners in production.
#[derive(Default)]
pub struct ScannerRegistry {
    ecosystems: HashMap<String, Arc<Ecosystem>>,
}

impl ScannerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, ecosystem: Arc<Ecosystem>) {
        if self.ecosystems.contains_key(&ecosystem.name) {
            #[cfg(feature = "strict-dev")]
            panic!("duplicate ecosystem registration: {}", ecosystem.name);

            #[cfg(not(feature = "strict-dev"))]
            {
                warn!(ecosystem = %ecosystem.name, "ignoring duplicate ecosystem registration");
                return;
            }
        }
        self.ecosystems.insert(ecosystem.name.clone(), ecosystem);
    }

    pub fn ecosystems(&self) -> Vec<Arc<Ecosystem>> {
        self.ecosystems.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::coalesce::Coalescer;

    struct NoopCoalescer;

    #[async_trait::async_trait]
    impl Coalescer for NoopCoalescer {
        async fn coalesce(
            &self,
            _layers: &[crate::domain::Layer],
            _store: &dyn crate::app::store::Store,
        ) -> Result<crate::app::coalesce::PartialIndexReport, crate::app::coalesce::CoalesceError>
        {
            Ok(crate::app::coalesce::PartialIndexReport::default())
        }
    }

    fn ecosystem(name: &str) -> Arc<Ecosystem> {
        Arc::new(Ecosystem {
            name: name.to_string(),
            package_scanners: vec![],
            distribution_scanners: vec![],
            repository_scanners: vec![],
            coalescer: Arc::new(NoopCoalescer),
        })
    }

    #[test]
    fn registering_twice_keeps_first_without_panicking() {
        let mut registry = ScannerRegistry::new();
        registry.register(ecosystem("dpkg"));
        registry.register(ecosystem("dpkg"));

        assert_eq!(registry.ecosystems().len(), 1);
    }

    #[test]
    fn registering_distinct_names_keeps_both() {
        let mut registry = ScannerRegistry::new();
        registry.register(ecosystem("dpkg"));
        registry.register(ecosystem("rpm"));

        assert_eq!(registry.ecosystems().len(), 2);
    }
}
