use dashmap::DashMap;

/// Source of candidate addresses for a logical service path.
///
/// Registry backends (ZooKeeper, etcd, ...) live behind this trait; the
/// transport only needs the current list. An empty list means the service
/// has no reachable providers right now.
pub trait ServiceDiscovery: Send + Sync {
    fn services(&self, service_path: &str) -> Vec<String>;
}

/// Fixed service → address table.
///
/// Useful for tests and deployments with a static topology. Entries can be
/// replaced at runtime; readers always see a consistent snapshot.
pub struct StaticDiscovery {
    table: DashMap<String, Vec<String>>,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    /// Replaces the address list for `service_path`.
    pub fn register(&self, service_path: impl Into<String>, addrs: Vec<String>) {
        self.table.insert(service_path.into(), addrs);
    }

    pub fn deregister(&self, service_path: &str) {
        self.table.remove(service_path);
    }
}

impl Default for StaticDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceDiscovery for StaticDiscovery {
    fn services(&self, service_path: &str) -> Vec<String> {
        self.table
            .get(service_path)
            .map(|addrs| addrs.value().clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_service_is_empty() {
        let discovery = StaticDiscovery::new();
        assert!(discovery.services("Nope").is_empty());
    }

    #[test]
    fn test_register_and_replace() {
        let discovery = StaticDiscovery::new();
        discovery.register("Arith", vec!["a:1".to_string()]);
        assert_eq!(discovery.services("Arith"), vec!["a:1".to_string()]);

        discovery.register("Arith", vec!["b:2".to_string(), "c:3".to_string()]);
        assert_eq!(discovery.services("Arith").len(), 2);

        discovery.deregister("Arith");
        assert!(discovery.services("Arith").is_empty());
    }
}
