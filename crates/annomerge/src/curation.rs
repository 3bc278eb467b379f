//! Curation session façade tying the collaborators to the engine.

use tracing::{info, warn};

use crate::config::{CurationConfig, DiffConfig};
use crate::diff::{CasDiff, DiffResult, UnavailableAnnotator};
use crate::error::Result;
use crate::interfaces::{AnnotatorDocumentProvider, CuratorDocumentStore};
use crate::merge::{MergeEngine, MergeReport, MergedAnnotationSet};
use crate::model::{AnnotationSet, Schema, TextWindow};

/// Entry point for a curation UI or service layer.
///
/// Reads annotator snapshots through an [`AnnotatorDocumentProvider`] and
/// persists the curator set through a [`CuratorDocumentStore`]. The engine
/// itself performs no I/O.
pub struct Curation {
    config: CurationConfig,
    schema: Schema,
    provider: Box<dyn AnnotatorDocumentProvider>,
    store: Box<dyn CuratorDocumentStore>,
    engine: MergeEngine,
}

impl Curation {
    /// Create a session with the default configuration.
    ///
    /// `schema` is the current type system; new curator sets are created
    /// with it.
    pub fn new(
        schema: Schema,
        provider: impl AnnotatorDocumentProvider + 'static,
        store: impl CuratorDocumentStore + 'static,
    ) -> Self {
        let config = CurationConfig::default();
        Self {
            engine: MergeEngine::new(config.merge.clone()),
            config,
            schema,
            provider: Box::new(provider),
            store: Box::new(store),
        }
    }

    /// Use a custom configuration.
    pub fn with_config(mut self, config: CurationConfig) -> Self {
        self.engine = MergeEngine::new(config.merge.clone());
        self.config = config;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &CurationConfig {
        &self.config
    }

    /// The current type system.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Diff every annotator of a document over `window` and `layers`.
    ///
    /// Annotators whose snapshot cannot be read are listed in
    /// [`DiffResult::unavailable`] and the diff runs over the others.
    pub fn diff(&self, document: &str, window: TextWindow, layers: &[String]) -> DiffResult {
        let (sets, unavailable) = self.read_sets(document, layers, window);
        Self::run_diff(&sets, unavailable, window, layers)
    }

    /// Diff a document with the configured window and layers.
    pub fn diff_document(&self, document: &str) -> DiffResult {
        self.diff(document, self.config.diff.window, &self.config.diff.layers)
    }

    /// Load the curator set of a document, building it if none was saved.
    ///
    /// A new curator set is seeded from the first available annotator and
    /// its diffed scope rebuilt from the agreeing positions, then saved.
    pub fn open(&mut self, document: &str) -> Result<(MergedAnnotationSet, DiffResult)> {
        let window = self.config.diff.window;
        let layers = self.config.diff.layers.clone();
        let (sets, unavailable) = self.read_sets(document, &layers, window);
        let diff = Self::run_diff(&sets, unavailable, window, &layers);

        if let Some(curator) = self.store.load(document)? {
            return Ok((curator, diff));
        }

        let curator_id = self.config.curator.clone();
        let seed = sets.iter().min_by(|a, b| a.annotator.cmp(&b.annotator));
        let mut curator = match seed {
            Some(seed) => {
                let mut curator = MergedAnnotationSet::from_seed(seed, curator_id);
                curator.set_mut().set_schema(self.schema.clone());
                curator
            }
            None => MergedAnnotationSet::new(curator_id, document, self.schema.clone()),
        };

        let report = self.engine.build(&diff, &mut curator);
        self.store.save(document, &curator)?;

        info!(
            document,
            seed = ?seed.map(|s| s.annotator.as_str()),
            created = report.created,
            "Curator set created"
        );

        Ok((curator, diff))
    }

    /// Re-derive a curator set from a diff.
    pub fn remerge(&self, diff: &DiffResult, curator: &mut MergedAnnotationSet) -> MergeReport {
        self.engine.remerge(diff, curator)
    }

    /// Re-diff the curator set's document, remerge and save.
    pub fn remerge_and_save(&mut self, curator: &mut MergedAnnotationSet) -> Result<(DiffResult, MergeReport)> {
        let diff = self.diff_document(curator.document());
        let report = self.engine.remerge(&diff, curator);
        self.store.save(curator.document(), curator)?;
        Ok((diff, report))
    }

    /// Load a saved curator set.
    pub fn load(&self, document: &str) -> Result<Option<MergedAnnotationSet>> {
        self.store.load(document)
    }

    /// Save a curator set, e.g. after accept/copy operations.
    pub fn save(&mut self, curator: &MergedAnnotationSet) -> Result<()> {
        self.store.save(curator.document(), curator)
    }

    fn read_sets(
        &self,
        document: &str,
        layers: &[String],
        window: TextWindow,
    ) -> (Vec<AnnotationSet>, Vec<UnavailableAnnotator>) {
        let mut sets = Vec::new();
        let mut unavailable = Vec::new();

        for annotator in self.provider.annotators(document) {
            if annotator == self.config.curator {
                continue;
            }
            match self.provider.read_annotations(&annotator, document, layers, window) {
                Ok(set) => sets.push(set),
                Err(err) => {
                    warn!(%annotator, document, error = %err, "Annotator unavailable");
                    unavailable.push(UnavailableAnnotator {
                        annotator,
                        reason: err.to_string(),
                    });
                }
            }
        }

        (sets, unavailable)
    }

    fn run_diff(
        sets: &[AnnotationSet],
        unavailable: Vec<UnavailableAnnotator>,
        window: TextWindow,
        layers: &[String],
    ) -> DiffResult {
        let refs: Vec<&AnnotationSet> = sets.iter().collect();
        let config = DiffConfig::new()
            .with_layers(layers.iter().cloned())
            .with_window(window);
        CasDiff::new(config).diff(&refs).with_unavailable(unavailable)
    }
}
