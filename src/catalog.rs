//! Catalog entries and the sources that supply them.
//!
//! The catalog is owned by another service; this crate only reads it.
//! Every source normalizes into [`CatalogEntry`] and drops entries that
//! have no English name, since that name is the canonical key.

use crate::error::{EngineError, Result};
use crate::units::{normalize_unit, MeasurementUnit};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// One recyclable item definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name_en: String,
    #[serde(default)]
    pub name_ar: String,
    pub unit: MeasurementUnit,
}

impl CatalogEntry {
    pub fn new(name_en: &str, name_ar: &str, unit: MeasurementUnit) -> Self {
        Self {
            name_en: name_en.trim().to_string(),
            name_ar: name_ar.trim().to_string(),
            unit,
        }
    }
}

/// Optional narrowing applied by every source after fetching.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub unit: Option<MeasurementUnit>,
    /// Case-insensitive English names to keep.
    pub names: Option<Vec<String>>,
}

impl CatalogFilter {
    pub fn matches(&self, entry: &CatalogEntry) -> bool {
        if let Some(unit) = self.unit {
            if entry.unit != unit {
                return false;
            }
        }
        if let Some(names) = &self.names {
            let key = entry.name_en.to_lowercase();
            if !names.iter().any(|n| n.trim().to_lowercase() == key) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_catalog(&self, filter: &CatalogFilter) -> Result<Vec<CatalogEntry>>;
}

/// Item names arrive either flat or as an `{en, ar}` object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawName {
    Plain(String),
    Localized {
        #[serde(default)]
        en: Option<String>,
        #[serde(default)]
        ar: Option<String>,
    },
}

/// Wire shape of a catalog item. Field names differ between catalog
/// deployments, hence the aliases.
#[derive(Debug, Deserialize)]
struct RawCatalogEntry {
    #[serde(default, alias = "englishName", alias = "name_en", alias = "nameEn")]
    name: Option<RawName>,
    #[serde(default, alias = "arabicName", alias = "nameAr")]
    name_ar: Option<String>,
    #[serde(default, alias = "measurement_unit", alias = "measurementUnit")]
    unit: Option<String>,
}

impl RawCatalogEntry {
    fn into_entry(self) -> Option<CatalogEntry> {
        let (en, nested_ar) = match self.name {
            Some(RawName::Plain(en)) => (Some(en), None),
            Some(RawName::Localized { en, ar }) => (en, ar),
            None => (None, None),
        };
        let en = en.filter(|s| !s.trim().is_empty())?;
        let ar = self.name_ar.or(nested_ar).unwrap_or_default();
        let unit = normalize_unit(self.unit.as_deref().unwrap_or_default());
        Some(CatalogEntry::new(&en, &ar, unit))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCatalogDocument {
    Bare(Vec<RawCatalogEntry>),
    Items { items: Vec<RawCatalogEntry> },
    Data { data: Vec<RawCatalogEntry> },
}

impl RawCatalogDocument {
    fn into_entries(self) -> Vec<RawCatalogEntry> {
        match self {
            RawCatalogDocument::Bare(items)
            | RawCatalogDocument::Items { items }
            | RawCatalogDocument::Data { data: items } => items,
        }
    }
}

/// Decode a catalog JSON document, dropping unnamed entries and applying the filter.
pub fn parse_catalog_json(body: &str, filter: &CatalogFilter) -> Result<Vec<CatalogEntry>> {
    let doc: RawCatalogDocument = serde_json::from_str(body)?;
    Ok(finish(doc.into_entries(), filter))
}

fn finish(raw: Vec<RawCatalogEntry>, filter: &CatalogFilter) -> Vec<CatalogEntry> {
    let total = raw.len();
    let entries: Vec<CatalogEntry> = raw
        .into_iter()
        .filter_map(RawCatalogEntry::into_entry)
        .filter(|e| filter.matches(e))
        .collect();
    if entries.len() < total {
        debug!("Dropped {} catalog entries (unnamed or filtered)", total - entries.len());
    }
    entries
}

/// Catalog served over HTTP as JSON.
pub struct HttpCatalogSource {
    client: reqwest::Client,
    url: String,
}

impl HttpCatalogSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_catalog(&self, filter: &CatalogFilter) -> Result<Vec<CatalogEntry>> {
        info!("Fetching catalog from {}", self.url);
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::Catalog(format!(
                "Catalog request to {} failed: {}",
                self.url,
                response.status()
            )));
        }
        let body = response.text().await?;
        parse_catalog_json(&body, filter)
    }
}

/// Catalog exported to a JSON file.
pub struct JsonFileCatalogSource {
    path: PathBuf,
}

impl JsonFileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for JsonFileCatalogSource {
    fn name(&self) -> &'static str {
        "json-file"
    }

    async fn fetch_catalog(&self, filter: &CatalogFilter) -> Result<Vec<CatalogEntry>> {
        let body = tokio::fs::read_to_string(&self.path).await?;
        parse_catalog_json(&body, filter)
    }
}

/// Catalog exported as CSV with a `name_en,name_ar,unit` header.
pub struct CsvFileCatalogSource {
    path: PathBuf,
}

impl CsvFileCatalogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    name_en: String,
    #[serde(default)]
    name_ar: String,
    #[serde(default)]
    unit: String,
}

#[async_trait]
impl CatalogSource for CsvFileCatalogSource {
    fn name(&self) -> &'static str {
        "csv-file"
    }

    async fn fetch_catalog(&self, filter: &CatalogFilter) -> Result<Vec<CatalogEntry>> {
        let body = tokio::fs::read_to_string(&self.path).await?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(body.as_bytes());

        let mut raw = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row?;
            raw.push(RawCatalogEntry {
                name: Some(RawName::Plain(row.name_en)),
                name_ar: Some(row.name_ar),
                unit: Some(row.unit),
            });
        }
        Ok(finish(raw, filter))
    }
}

/// Fixed in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogSource {
    entries: Vec<CatalogEntry>,
}

impl StaticCatalogSource {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_catalog(&self, filter: &CatalogFilter) -> Result<Vec<CatalogEntry>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| !e.name_en.trim().is_empty() && filter.matches(e))
            .cloned()
            .collect())
    }
}
