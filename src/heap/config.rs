//! Reference heap configuration

/// What happens to undelivered finalizers when the heap is torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownPolicy {
    /// Run every pending finalizer during teardown
    Fire,
    /// Discard pending finalizers un-fired
    Drop,
}

/// Heap configuration
#[derive(Debug, Clone)]
pub struct HeapConfig {
    pub teardown: TeardownPolicy,
    /// Object slots reserved up front
    pub initial_capacity: usize,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            teardown: TeardownPolicy::Fire,
            initial_capacity: 64,
        }
    }
}

impl HeapConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // GCREF_TEARDOWN: fire, drop
        if let Ok(policy) = std::env::var("GCREF_TEARDOWN") {
            config.teardown = match policy.to_lowercase().as_str() {
                "drop" => TeardownPolicy::Drop,
                _ => TeardownPolicy::Fire,
            };
        }

        config
    }

    pub fn with_teardown(mut self, teardown: TeardownPolicy) -> Self {
        self.teardown = teardown;
        self
    }
}
