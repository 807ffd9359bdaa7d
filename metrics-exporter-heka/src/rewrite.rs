use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::mappings::Mappings;

/// Resolves metric names through the configured rewrite rules, caching the result per original name.
///
/// Rewriting runs every namespace rule, then every metric rule, each in declaration order. A rule whose pattern appears
/// in the current name replaces the first occurrence only, and the next rule sees the updated name. The outcome is
/// cached under the original name, so the rules are evaluated at most once per distinct name even when several threads
/// resolve the same name concurrently.
pub struct NameResolver {
    mappings: Arc<Mappings>,
    cache: Mutex<HashMap<String, String>>,
    evaluations: AtomicUsize,
}

impl NameResolver {
    /// Creates a resolver for the given mappings, with an empty cache.
    pub fn new(mappings: Arc<Mappings>) -> Self {
        NameResolver { mappings, cache: Mutex::new(HashMap::new()), evaluations: AtomicUsize::new(0) }
    }

    /// Resolves `original` to its rewritten name.
    pub fn resolve(&self, original: &str) -> String {
        // The lock is held while rewriting so that concurrent callers never evaluate the same name twice.
        let mut cache = self.cache.lock();
        if let Some(resolved) = cache.get(original) {
            trace!(original, resolved = resolved.as_str(), "Metric name found in cache.");
            return resolved.clone();
        }

        let resolved = self.rewrite(original);
        cache.insert(original.to_owned(), resolved.clone());
        resolved
    }

    fn rewrite(&self, original: &str) -> String {
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        let mut name = original.to_owned();
        let rules = self.mappings.namespace_rules().chain(self.mappings.metric_rules());
        for (pattern, replacement) in rules {
            if pattern.is_empty() || !name.contains(pattern) {
                continue;
            }

            let rewritten = name.replacen(pattern, replacement, 1);
            debug!(from = name.as_str(), to = rewritten.as_str(), pattern, "Rewriting metric name.");
            name = rewritten;
        }

        name
    }

    /// Returns the number of times the rewrite rules were evaluated, which is the number of cache misses.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Returns the number of cached names.
    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use proptest::prelude::*;

    use super::*;

    fn resolver(mappings: Mappings) -> NameResolver {
        NameResolver::new(Arc::new(mappings))
    }

    #[test]
    fn no_rules_is_identity() {
        let resolver = resolver(Mappings::default());
        assert_eq!(resolver.resolve("intel.psutil.load.load1"), "intel.psutil.load.load1");
        assert_eq!(resolver.resolve(""), "");
    }

    #[test]
    fn namespace_rules_run_before_metric_rules() {
        // The metric rule is declared against the output of the namespace rule.
        let mappings = Mappings::default()
            .with_metric_rule("psutil.load", "load")
            .with_namespace_rule("intel.psutil", "psutil");

        let resolver = resolver(mappings);
        assert_eq!(resolver.resolve("intel.psutil.load.load1"), "load.load1");
    }

    #[test]
    fn rules_apply_in_declaration_order() {
        let mappings = Mappings::default().with_namespace_rule("a", "b").with_namespace_rule("b", "c");
        assert_eq!(resolver(mappings).resolve("a"), "c");

        let mappings = Mappings::default().with_namespace_rule("b", "c").with_namespace_rule("a", "b");
        assert_eq!(resolver(mappings).resolve("a"), "b");
    }

    #[test]
    fn replaces_first_occurrence_only() {
        let mappings = Mappings::default().with_metric_rule("cpu", "processor");
        assert_eq!(resolver(mappings).resolve("cpu.cpu.total"), "processor.cpu.total");
    }

    #[test]
    fn empty_pattern_never_applies() {
        let mappings = Mappings::default().with_namespace_rule("", "prefix.");
        assert_eq!(resolver(mappings).resolve("foo.bar"), "foo.bar");
    }

    #[test]
    fn evaluates_each_name_once() {
        let mappings = Mappings::default().with_namespace_rule("intel.", "");
        let resolver = resolver(mappings);

        assert_eq!(resolver.resolve("intel.psutil.vm.free"), "psutil.vm.free");
        assert_eq!(resolver.resolve("intel.psutil.vm.free"), "psutil.vm.free");
        assert_eq!(resolver.evaluations(), 1);

        // Names untouched by any rule are cached as well.
        assert_eq!(resolver.resolve("other.metric"), "other.metric");
        assert_eq!(resolver.resolve("other.metric"), "other.metric");
        assert_eq!(resolver.evaluations(), 2);
        assert_eq!(resolver.cached(), 2);
    }

    #[test]
    fn concurrent_callers_share_results() {
        let mappings = Mappings::default().with_namespace_rule("intel.", "").with_metric_rule("load", "ld");
        let resolver = resolver(mappings);
        let names = (0..16).map(|i| format!("intel.psutil.load.load{}", i % 8)).collect::<Vec<_>>();

        let results = thread::scope(|s| {
            let handles = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        let mut seen = Vec::new();
                        for _ in 0..50 {
                            for name in &names {
                                seen.push((name.clone(), resolver.resolve(name)));
                            }
                        }
                        seen
                    })
                })
                .collect::<Vec<_>>();

            handles.into_iter().flat_map(|h| h.join().unwrap()).collect::<Vec<_>>()
        });

        for (original, resolved) in results {
            let leaf = original.rsplit('.').next().unwrap();
            assert_eq!(resolved, format!("psutil.ld.{leaf}"));
        }
        assert_eq!(resolver.cached(), 8);
        assert_eq!(resolver.evaluations(), 8);
    }

    proptest! {
        #[test]
        fn cached_result_is_stable(name in "[a-z]{1,6}(\\.[a-z]{1,6}){0,4}") {
            let mappings = Mappings::default()
                .with_namespace_rule("a", "b")
                .with_metric_rule("b.", "");
            let resolver = resolver(mappings);

            let first = resolver.resolve(&name);
            let second = resolver.resolve(&name);
            prop_assert_eq!(first, second);
            prop_assert_eq!(resolver.evaluations(), 1);
        }
    }
}
