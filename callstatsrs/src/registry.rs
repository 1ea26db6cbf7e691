use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use glob::glob;
use serde::{Deserialize, Serialize};

use crate::error::{CallstatsError, Result};
use crate::models::SectionQuery;

/// A stored dashboard section: a name plus the query the UI saved for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionDefinition {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub query: SectionQuery,
}

#[derive(Debug, Default, Clone)]
pub struct SectionRegistry {
    sections: BTreeMap<String, SectionDefinition>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(sections: Vec<SectionDefinition>) -> Result<Self> {
        let mut registry = SectionRegistry::new();
        for section in sections {
            registry.insert(section)?;
        }
        Ok(registry)
    }

    /// Load every `*.yml`, `*.yaml` and `*.json` file in `dir`, one section per file.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CallstatsError::Validation(format!(
                "sections directory not found: {}",
                dir.display()
            )));
        }

        let mut registry = SectionRegistry::new();
        for pattern in ["*.yml", "*.yaml", "*.json"] {
            for entry in glob(&format!("{}/{pattern}", dir.display()))
                .map_err(|e| CallstatsError::Other(e.into()))?
                .flatten()
            {
                registry.load_file(&entry)?;
            }
        }
        tracing::debug!(
            dir = %dir.display(),
            sections = registry.len(),
            "loaded section definitions"
        );
        Ok(registry)
    }

    fn load_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)?;
        let section: SectionDefinition = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            _ => serde_yaml::from_str(&contents)?,
        };
        self.insert(section).map_err(|e| match e {
            CallstatsError::Validation(msg) => {
                CallstatsError::Validation(format!("{msg} (in {})", path.display()))
            }
            other => other,
        })
    }

    fn insert(&mut self, section: SectionDefinition) -> Result<()> {
        if section.name.trim().is_empty() {
            return Err(CallstatsError::Validation(
                "section name must not be empty".to_string(),
            ));
        }
        if self.sections.contains_key(&section.name) {
            return Err(CallstatsError::Validation(format!(
                "duplicate section {}",
                section.name
            )));
        }
        self.sections.insert(section.name.clone(), section);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SectionDefinition> {
        self.sections.get(name)
    }

    /// Section names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeGranularity;

    fn section(name: &str) -> SectionDefinition {
        SectionDefinition {
            name: name.to_string(),
            title: None,
            description: None,
            query: SectionQuery::new(TimeGranularity::Daily),
        }
    }

    #[test]
    fn from_parts_rejects_duplicates() {
        let err =
            SectionRegistry::from_parts(vec![section("volume"), section("volume")]).unwrap_err();
        assert!(err.to_string().contains("duplicate section volume"));
    }

    #[test]
    fn names_are_sorted() {
        let registry =
            SectionRegistry::from_parts(vec![section("sla"), section("abandon"), section("volume")])
                .unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["abandon", "sla", "volume"]);
        assert!(registry.get("sla").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = serde_yaml::from_str::<SectionDefinition>(
            "name: x\nquery: {}\nowner: ops\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("owner"));
    }
}
