//! Registry configuration.

/// Defaults applied to every entity type registered with a
/// [`crate::Registry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Whether new entity types keep an identity cache.
    pub cache_enabled: bool,

    /// Whether `to_plain` nests referenced documents instead of ids.
    pub follow_references: bool,

    /// Whether registration issues `ensure_index` for every declaration.
    pub ensure_indexes: bool,

    /// Prefix prepended to every route template (for example `/api/v0`).
    pub path_prefix: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            follow_references: false,
            ensure_indexes: true,
            path_prefix: String::new(),
        }
    }
}

impl RegistryConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether entity types cache by default.
    #[must_use]
    pub const fn cache_enabled(mut self, value: bool) -> Self {
        self.cache_enabled = value;
        self
    }

    /// Sets whether serialization follows references by default.
    #[must_use]
    pub const fn follow_references(mut self, value: bool) -> Self {
        self.follow_references = value;
        self
    }

    /// Sets whether indexes are ensured at registration.
    #[must_use]
    pub const fn ensure_indexes(mut self, value: bool) -> Self {
        self.ensure_indexes = value;
        self
    }

    /// Sets the route prefix. A trailing `/` is dropped.
    #[must_use]
    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.path_prefix = prefix.trim_end_matches('/').to_string();
        self
    }
}
