use chrono::{DateTime, Utc};

/// An installed or installable model.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub size: Option<u64>,
    pub modified_at: Option<DateTime<Utc>>,
    pub installed: bool,
    pub family: Option<String>,
    pub format: Option<String>,
    pub parameter_size: Option<String>,
}

impl Model {
    pub fn installed(name: impl Into<String>) -> Self {
        Self {
            installed: true,
            ..Self::available(name)
        }
    }

    pub fn available(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            modified_at: None,
            installed: false,
            family: None,
            format: None,
            parameter_size: None,
        }
    }

    /// Size in gigabytes with two decimals, as shown in the listing.
    pub fn size_label(&self) -> String {
        match self.size {
            Some(bytes) => format!("{:.2}", bytes as f64 / 1e9),
            None => "-".to_string(),
        }
    }

    /// Whether `name` refers to this model. The daemon reports implicit
    /// `:latest` tags, so `llama3` and `llama3:latest` are the same model.
    pub fn matches(&self, name: &str) -> bool {
        canonical_name(&self.name) == canonical_name(name)
    }
}

pub fn canonical_name(name: &str) -> String {
    let name = name.trim();
    if name.contains(':') {
        name.to_string()
    } else {
        format!("{name}:latest")
    }
}

/// Well-known models offered for install when they are not present locally.
pub const MODEL_CATALOG: &[&str] = &[
    "llama3",
    "llama3.2",
    "phi3",
    "mistral",
    "gemma2",
    "qwen2.5-coder",
    "deepseek-r1",
    "nomic-embed-text",
];

/// Installed models first (as reported), then catalog entries that are not
/// installed yet.
pub fn with_catalog(installed: Vec<Model>) -> Vec<Model> {
    let mut models = installed;
    for name in MODEL_CATALOG {
        if !models.iter().any(|model| model.matches(name)) {
            models.push(Model::available(*name));
        }
    }
    models
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_tag_is_implicit() {
        let model = Model::installed("llama3:latest");
        assert!(model.matches("llama3"));
        assert!(model.matches("llama3:latest"));
        assert!(!model.matches("llama3:8b"));
    }

    #[test]
    fn catalog_skips_installed_entries() {
        let models = with_catalog(vec![Model::installed("phi3:latest")]);
        assert_eq!(models[0].name, "phi3:latest");
        assert_eq!(models.iter().filter(|m| m.matches("phi3")).count(), 1);
        assert!(models
            .iter()
            .any(|m| m.name == "mistral" && !m.installed));
    }

    #[test]
    fn size_label_uses_gigabytes() {
        let mut model = Model::installed("llama3");
        model.size = Some(4_661_224_676);
        assert_eq!(model.size_label(), "4.66");
        assert_eq!(Model::available("x").size_label(), "-");
    }
}
