//! Material Engine - the public entry points
//!
//! Holds the catalog snapshot and wires catalog -> extractor -> resolver
//! -> fallback scanner for each request. The snapshot is an immutable
//! `Arc<CatalogIndex>`; a reload builds a new one and swaps the pointer,
//! so concurrent requests see either the old or the new catalog in full.
//!
//! Every stage except the extractor call is synchronous. Dropping the
//! future returned by [`MaterialEngine::extract_materials`] abandons the
//! request with no partial output.

use crate::catalog::{CatalogFilter, CatalogSource};
use crate::catalog_index::CatalogIndex;
use crate::config::MatchSettings;
use crate::error::{EngineError, Result};
use crate::extraction::{ExtractedMaterial, ExtractionPipeline};
use crate::fallback::{negation_regex, FallbackScanner};
use crate::llm::{sniff_image_mime, ImageCaptioner, MaterialExtractor};
use crate::resolver::{CanonicalResolver, Resolution};
use regex::Regex;
use std::sync::{Arc, RwLock};
use tracing::{info, warn, Instrument};

pub struct MaterialEngine {
    catalog_source: Arc<dyn CatalogSource>,
    extractor: Arc<dyn MaterialExtractor>,
    captioner: Option<Arc<dyn ImageCaptioner>>,
    filter: CatalogFilter,
    settings: MatchSettings,
    negation: std::result::Result<Regex, String>,
    snapshot: RwLock<Option<Arc<CatalogIndex>>>,
}

impl MaterialEngine {
    pub fn new(
        catalog_source: Arc<dyn CatalogSource>,
        extractor: Arc<dyn MaterialExtractor>,
        settings: MatchSettings,
    ) -> Self {
        let negation = negation_regex(settings.negation_window).map_err(|e| match e {
            EngineError::Config(msg) => msg,
            other => other.to_string(),
        });
        Self {
            catalog_source,
            extractor,
            captioner: None,
            filter: CatalogFilter::default(),
            negation,
            settings,
            snapshot: RwLock::new(None),
        }
    }

    pub fn with_captioner(mut self, captioner: Arc<dyn ImageCaptioner>) -> Self {
        self.captioner = Some(captioner);
        self
    }

    pub fn with_filter(mut self, filter: CatalogFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    fn current(&self) -> Option<Arc<CatalogIndex>> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn publish(&self, index: Option<Arc<CatalogIndex>>) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = index,
            Err(poisoned) => *poisoned.into_inner() = index,
        }
    }

    /// Fetch the catalog, build a new index and publish it.
    pub async fn reload(&self) -> Result<Arc<CatalogIndex>> {
        let entries = self.catalog_source.fetch_catalog(&self.filter).await?;
        let index = Arc::new(CatalogIndex::build(&entries));
        info!(
            "📦 Loaded catalog from {} source: {} materials, {} active synonyms",
            self.catalog_source.name(),
            index.len(),
            index.synonym_count()
        );
        self.publish(Some(index.clone()));
        Ok(index)
    }

    /// Drop the cached snapshot; the next request reloads.
    pub fn invalidate(&self) {
        self.publish(None);
    }

    /// Current snapshot, loading it on first use. A failed load yields an
    /// empty index that is not cached, so the next call retries.
    pub async fn catalog(&self) -> Arc<CatalogIndex> {
        if let Some(index) = self.current() {
            return index;
        }
        match self.reload().await {
            Ok(index) => index,
            Err(e) => {
                warn!("Catalog unavailable, continuing with an empty catalog: {}", e);
                Arc::new(CatalogIndex::empty())
            }
        }
    }

    /// Resolve a single term against the current catalog.
    pub async fn resolve(&self, term: &str) -> Option<Resolution> {
        let index = self.catalog().await;
        CanonicalResolver::new(&index, self.settings.fuzzy_threshold).resolve(term)
    }

    /// Materials mentioned in a transcript or caption. An empty list is
    /// a normal outcome; only configuration errors are returned.
    pub async fn extract_materials(&self, raw_text: &str) -> Result<Vec<ExtractedMaterial>> {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("extract_materials", %request_id);
        self.run_extraction(raw_text).instrument(span).await
    }

    async fn run_extraction(&self, raw_text: &str) -> Result<Vec<ExtractedMaterial>> {
        if raw_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let index = self.catalog().await;
        let pipeline = ExtractionPipeline::new(self.extractor.as_ref(), self.settings.fuzzy_threshold);
        let extracted = pipeline.run(raw_text, &index).await?;

        let negation = self
            .negation
            .as_ref()
            .map_err(|msg| EngineError::Config(msg.clone()))?;
        let scanner = FallbackScanner::with_negation(&index, self.settings.negation_window, negation);
        let materials = scanner.recover(raw_text, extracted);

        info!("Recognized {} materials", materials.len());
        Ok(materials)
    }

    /// Caption the image, then extract from the caption. A captioner
    /// failure other than misconfiguration yields an empty list.
    pub async fn extract_materials_from_image(&self, image: &[u8]) -> Result<Vec<ExtractedMaterial>> {
        let Some(captioner) = &self.captioner else {
            return Err(EngineError::Config(
                "No image captioner configured".to_string(),
            ));
        };

        let caption = match captioner.describe_image(image, sniff_image_mime(image)).await {
            Ok(caption) => caption,
            Err(e) if e.is_config() => return Err(e),
            Err(e) => {
                warn!("Image captioning failed: {}", e);
                return Ok(Vec::new());
            }
        };
        info!("Image caption: {}", caption);
        self.extract_materials(&caption).await
    }
}
