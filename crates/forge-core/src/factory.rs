use crate::error::{ForgeError, Result};
use crate::forge::Forge;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Builds a forge from the parameters of one configuration entry.
pub type ForgeConstructor =
    Box<dyn Fn(&serde_json::Value) -> Result<Arc<dyn Forge>> + Send + Sync>;

/// Registry of forge constructors keyed by configuration tag.
///
/// Backend selection is an explicit table lookup: each forge crate
/// registers a constructor under its tag, and startup resolves every
/// configured entry through [`build`](Self::build). Unknown tags and
/// invalid parameters surface as `ForgeError::Configuration`.
///
/// # Examples
///
/// ```
/// use forge_core::{Federation, ForgeFactory};
/// use std::sync::Arc;
///
/// let factory = ForgeFactory::new();
/// factory.register("empty", |_params| Ok(Arc::new(Federation::default())));
///
/// let forge = factory.build("empty", &serde_json::json!({})).unwrap();
/// assert_eq!(forge.describe(), "federation[]");
/// assert!(factory.build("missing", &serde_json::json!({})).is_err());
/// ```
pub struct ForgeFactory {
    constructors: DashMap<String, ForgeConstructor>,
}

impl ForgeFactory {
    pub fn new() -> Self {
        Self {
            constructors: DashMap::new(),
        }
    }

    /// Registers a constructor, replacing any previous one for `tag`.
    pub fn register<F>(&self, tag: impl Into<String>, constructor: F)
    where
        F: Fn(&serde_json::Value) -> Result<Arc<dyn Forge>> + Send + Sync + 'static,
    {
        self.constructors.insert(tag.into(), Box::new(constructor));
    }

    pub fn build(&self, tag: &str, params: &serde_json::Value) -> Result<Arc<dyn Forge>> {
        let constructor = self.constructors.get(tag).ok_or_else(|| {
            ForgeError::Configuration(format!(
                "unknown forge type '{tag}' (known: {})",
                self.tags().join(", ")
            ))
        })?;
        let forge = constructor(params)?;
        tracing::info!(forge_type = %tag, forge = %forge.describe(), "configured forge");
        Ok(forge)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.constructors.iter().map(|e| e.key().clone()).collect();
        tags.sort();
        tags
    }
}

impl Default for ForgeFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Deserializes constructor parameters, mapping failures to a configuration error.
pub fn parse_params<T: DeserializeOwned>(tag: &str, params: &serde_json::Value) -> Result<T> {
    serde_json::from_value(params.clone())
        .map_err(|e| ForgeError::Configuration(format!("invalid '{tag}' forge parameters: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::Federation;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct PathParams {
        path: String,
    }

    fn factory() -> ForgeFactory {
        let factory = ForgeFactory::new();
        factory.register("needs-path", |params| {
            let params: PathParams = parse_params("needs-path", params)?;
            if params.path.is_empty() {
                return Err(ForgeError::Configuration("path is empty".into()));
            }
            Ok(Arc::new(Federation::default()))
        });
        factory
    }

    #[test]
    fn test_build_registered() {
        let forge = factory()
            .build("needs-path", &serde_json::json!({"path": "/srv"}))
            .unwrap();
        assert_eq!(forge.describe(), "federation[]");
    }

    #[test]
    fn test_unknown_tag_lists_known() {
        let err = factory()
            .build("nope", &serde_json::json!({}))
            .err()
            .unwrap();
        assert!(matches!(err, ForgeError::Configuration(_)));
        assert!(err.to_string().contains("needs-path"));
    }

    #[test]
    fn test_missing_parameter_is_configuration_error() {
        let err = factory()
            .build("needs-path", &serde_json::json!({}))
            .err()
            .unwrap();
        assert!(matches!(err, ForgeError::Configuration(_)));
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn test_constructor_validation() {
        let err = factory()
            .build("needs-path", &serde_json::json!({"path": ""}))
            .err()
            .unwrap();
        assert!(matches!(err, ForgeError::Configuration(_)));
    }

    #[test]
    fn test_tags_sorted() {
        let factory = factory();
        factory.register("alpha", |_| Ok(Arc::new(Federation::default())));
        assert_eq!(factory.tags(), vec!["alpha", "needs-path"]);
        assert!(factory.contains("alpha"));
    }
}
