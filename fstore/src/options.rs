/// Namespace under which feature tables and their annotations live.
pub const DEFAULT_NAMESPACE: &str = "fstore.features/0.1";

/// Number of open tables a manager keeps before closing the least recent.
pub const DEFAULT_CACHE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    pub namespace: String,
    /// Path that table files are stored under. Defaults to
    /// `<namespace>/features`.
    pub feature_space: Option<String>,
    /// Namespace of file annotations linking tables to objects. Defaults to
    /// `<namespace>/source`.
    pub annotation_space: Option<String>,
    pub cache_size: usize,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            feature_space: None,
            annotation_space: None,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl ManagerOptions {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_feature_space(mut self, feature_space: impl Into<String>) -> Self {
        self.feature_space = Some(feature_space.into());
        self
    }

    pub fn with_annotation_space(mut self, annotation_space: impl Into<String>) -> Self {
        self.annotation_space = Some(annotation_space.into());
        self
    }

    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn feature_space(&self) -> String {
        self.feature_space
            .clone()
            .unwrap_or_else(|| format!("{}/features", self.namespace))
    }

    pub fn annotation_space(&self) -> String {
        self.annotation_space
            .clone()
            .unwrap_or_else(|| format!("{}/source", self.namespace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spaces_derive_from_namespace() {
        let options = ManagerOptions::default();
        assert_eq!(options.feature_space(), "fstore.features/0.1/features");
        assert_eq!(options.annotation_space(), "fstore.features/0.1/source");

        let options = ManagerOptions::default()
            .with_namespace("lab/2")
            .with_annotation_space("lab/links");
        assert_eq!(options.feature_space(), "lab/2/features");
        assert_eq!(options.annotation_space(), "lab/links");
    }
}
