//! Read-through cache over the static plant care document.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tokio::sync::OnceCell;

use crate::models::PlantInfo;

// ---

/// Plant catalog keyed by lower-case plant type. Loaded on first lookup and
/// kept for the process lifetime; a failed load is retried next time.
pub struct PlantCatalog {
    path: PathBuf,
    entries: OnceCell<BTreeMap<String, PlantInfo>>,
}

impl PlantCatalog {
    // ---
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PlantCatalog {
            path: path.into(),
            entries: OnceCell::new(),
        }
    }

    pub async fn all(&self) -> Result<&BTreeMap<String, PlantInfo>> {
        // ---
        self.entries
            .get_or_try_init(|| load_document(self.path.clone()))
            .await
    }

    /// Case-insensitive lookup of a single plant type.
    pub async fn get(&self, plant_type: &str) -> Result<Option<&PlantInfo>> {
        // ---
        Ok(self.all().await?.get(&plant_type.to_lowercase()))
    }
}

async fn load_document(path: PathBuf) -> Result<BTreeMap<String, PlantInfo>> {
    // ---
    let raw = tokio::task::spawn_blocking({
        let path = path.clone();
        move || std::fs::read_to_string(path)
    })
    .await?
    .with_context(|| format!("reading {}", path.display()))?;

    let entries = parse_document(&raw, &path)?;
    tracing::info!("Loaded {} plant catalog entries", entries.len());
    Ok(entries)
}

fn parse_document(raw: &str, path: &Path) -> Result<BTreeMap<String, PlantInfo>> {
    // ---
    let doc: BTreeMap<String, PlantInfo> =
        serde_json::from_str(raw).with_context(|| format!("parsing {}", path.display()))?;

    Ok(doc
        .into_iter()
        .map(|(key, mut info)| {
            if info.plant_type.is_empty() {
                info.plant_type = key.clone();
            }
            (key.to_lowercase(), info)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    const DOC: &str = r#"{
        "Tomato": {"description": "Warm season crop", "tratament": "Water at the base"},
        "basil": {"plant_type": "basil", "description": "Herb", "treatment": null}
    }"#;

    #[test]
    fn test_parse_normalizes_keys() {
        // ---
        let entries = parse_document(DOC, Path::new("plant_info.json")).unwrap();
        let tomato = &entries["tomato"];
        assert_eq!(tomato.plant_type, "Tomato");
        assert_eq!(tomato.treatment.as_deref(), Some("Water at the base"));
        assert_eq!(entries["basil"].treatment, None);
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        // ---
        let path = std::env::temp_dir().join(format!("plant_info_{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, DOC).unwrap();

        let catalog = PlantCatalog::new(&path);
        assert!(catalog.get("TOMATO").await.unwrap().is_some());
        assert!(catalog.get("cactus").await.unwrap().is_none());
        assert_eq!(catalog.all().await.unwrap().len(), 2);

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_missing_document_is_an_error() {
        // ---
        let catalog = PlantCatalog::new("/nonexistent/plant_info.json");
        assert!(catalog.get("tomato").await.is_err());
    }
}
