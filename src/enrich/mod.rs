//! Enrichment pipeline: per-item and batched stages that annotate or drop records.
//!
//! Stages come in two kinds, unified by [`Enricher`]:
//! - [`ItemEnricher`] sees one [`FileItem`] at a time and returns it (possibly with new
//!   metadata) or `None` to drop it.
//! - [`BatchEnricher`] sees a buffer of items and returns exactly one slot per input,
//!   positionally aligned. Batching amortizes fixed per-call cost such as model
//!   invocation.
//!
//! [`EnrichmentPipeline`] runs all item stages first, in configured order, stopping at
//! the first drop. Survivors are buffered by the caller up to
//! [`EnrichmentPipeline::batch_size`] and flushed through the batched stages, again in
//! configured order. A dropped item never comes back.
//!
//! Built-in stages are registered by name, see [`enricher_by_name`].

pub mod builtin;

pub use builtin::{DEFAULT_TEXT_KEY, NonEmptyText, TextLength, WordCount};

use crate::error::IndexError;
use crate::types::FileItem;
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

/// Stage that processes one item at a time.
pub trait ItemEnricher: Send + Sync {
    fn name(&self) -> &str;

    /// Return the (annotated) item, or `None` to drop it.
    fn enrich_item(&self, item: FileItem) -> Result<Option<FileItem>>;
}

/// Stage that processes a buffer of items in one call.
pub trait BatchEnricher: Send + Sync {
    fn name(&self) -> &str;

    /// Return one slot per input item, in input order; `None` drops that item.
    fn enrich_batch(&self, items: Vec<FileItem>) -> Result<Vec<Option<FileItem>>>;
}

/// A pipeline stage of either kind.
#[derive(Clone)]
pub enum Enricher {
    Item(Arc<dyn ItemEnricher>),
    Batch(Arc<dyn BatchEnricher>),
}

impl Enricher {
    pub fn item(stage: impl ItemEnricher + 'static) -> Self {
        Self::Item(Arc::new(stage))
    }

    pub fn batch(stage: impl BatchEnricher + 'static) -> Self {
        Self::Batch(Arc::new(stage))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Item(e) => e.name(),
            Self::Batch(e) => e.name(),
        }
    }
}

impl fmt::Debug for Enricher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item(e) => write!(f, "Item({:?})", e.name()),
            Self::Batch(e) => write!(f, "Batch({:?})", e.name()),
        }
    }
}

/// Builds a stage reading the given text field.
type EnricherFactory = fn(&str) -> Enricher;

const ENRICHERS: &[(&str, EnricherFactory)] = &[
    ("text_length", |key| Enricher::item(TextLength::new(key))),
    ("word_count", |key| Enricher::batch(WordCount::new(key))),
    ("non_empty_text", |key| Enricher::item(NonEmptyText::new(key))),
];

/// Build a registered enricher by name, reading [`DEFAULT_TEXT_KEY`].
///
/// # Errors
/// [`IndexError::UnknownEnricher`] if `name` is not registered.
pub fn enricher_by_name(name: &str) -> Result<Enricher> {
    enricher_for_key(name, DEFAULT_TEXT_KEY)
}

/// Build a registered enricher by name, reading the record field `text_key`.
///
/// # Errors
/// [`IndexError::UnknownEnricher`] if `name` is not registered.
pub fn enricher_for_key(name: &str, text_key: &str) -> Result<Enricher> {
    ENRICHERS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, make)| make(text_key))
        .ok_or_else(|| {
            IndexError::UnknownEnricher {
                name: name.to_string(),
                available: enricher_names().collect::<Vec<_>>().join(", "),
            }
            .into()
        })
}

/// Names accepted by [`enricher_by_name`].
pub fn enricher_names() -> impl Iterator<Item = &'static str> {
    ENRICHERS.iter().map(|(n, _)| *n)
}

/// Ordered enrichment stages plus the batch size used to buffer survivors.
#[derive(Clone, Debug)]
pub struct EnrichmentPipeline {
    item_stages: Vec<Arc<dyn ItemEnricher>>,
    batch_stages: Vec<Arc<dyn BatchEnricher>>,
    batch_size: usize,
}

impl fmt::Debug for dyn ItemEnricher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for dyn BatchEnricher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for EnrichmentPipeline {
    fn default() -> Self {
        Self::new(Vec::new(), 1)
    }
}

impl EnrichmentPipeline {
    /// Split `enrichers` by kind, keeping configured order within each kind.
    /// A `batch_size` of 0 is treated as 1.
    #[must_use]
    pub fn new(enrichers: impl IntoIterator<Item = Enricher>, batch_size: usize) -> Self {
        let mut item_stages = Vec::new();
        let mut batch_stages = Vec::new();
        for e in enrichers {
            match e {
                Enricher::Item(s) => item_stages.push(s),
                Enricher::Batch(s) => batch_stages.push(s),
            }
        }
        let batch_size = batch_size.max(1);
        if !batch_stages.is_empty() && batch_size == 1 {
            log::warn!(
                "batched enrichers configured with batch size 1; each call processes a single item"
            );
        }
        Self {
            item_stages,
            batch_stages,
            batch_size,
        }
    }

    /// Resolve registry names, in order.
    ///
    /// # Errors
    /// Fails on the first unknown name.
    pub fn from_names<S: AsRef<str>>(names: &[S], batch_size: usize) -> Result<Self> {
        Self::from_names_with_key(names, DEFAULT_TEXT_KEY, batch_size)
    }

    /// Like [`EnrichmentPipeline::from_names`], with every stage reading `text_key`.
    ///
    /// # Errors
    /// Fails on the first unknown name.
    pub fn from_names_with_key<S: AsRef<str>>(
        names: &[S],
        text_key: &str,
        batch_size: usize,
    ) -> Result<Self> {
        let enrichers = names
            .iter()
            .map(|n| enricher_for_key(n.as_ref(), text_key))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(enrichers, batch_size))
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn has_batch_stages(&self) -> bool {
        !self.batch_stages.is_empty()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.item_stages.is_empty() && self.batch_stages.is_empty()
    }

    /// Run the item stages. `Ok(None)` means some stage dropped the item.
    ///
    /// # Errors
    /// [`IndexError::Enricher`] naming the failing stage and the item's location.
    pub fn enrich_item(&self, mut item: FileItem) -> Result<Option<FileItem>> {
        for stage in &self.item_stages {
            let loc = item.location().clone();
            match stage.enrich_item(item) {
                Ok(Some(next)) => item = next,
                Ok(None) => return Ok(None),
                Err(e) => {
                    return Err(IndexError::Enricher {
                        stage: stage.name().to_string(),
                        filename: loc.filename,
                        start: loc.start,
                        end: loc.end,
                        reason: format!("{e:#}"),
                    }
                    .into());
                }
            }
        }
        Ok(Some(item))
    }

    /// Run the batched stages over a buffer of item-stage survivors.
    ///
    /// Returns the survivors in input order.
    ///
    /// # Errors
    /// [`IndexError::Enricher`] if a stage fails, [`IndexError::BatchMisaligned`] if a
    /// stage returns a different number of slots than it was given.
    pub fn enrich_batch(&self, mut batch: Vec<FileItem>) -> Result<Vec<FileItem>> {
        for stage in &self.batch_stages {
            if batch.is_empty() {
                break;
            }
            let expected = batch.len();
            let (filename, start, end) = batch_span(&batch);
            let slots = stage.enrich_batch(batch).map_err(|e| IndexError::Enricher {
                stage: stage.name().to_string(),
                filename,
                start,
                end,
                reason: format!("{e:#}"),
            })?;
            if slots.len() != expected {
                return Err(IndexError::BatchMisaligned {
                    stage: stage.name().to_string(),
                    expected,
                    got: slots.len(),
                }
                .into());
            }
            batch = slots.into_iter().flatten().collect();
        }
        Ok(batch)
    }
}

/// File and byte range covered by a non-empty batch.
fn batch_span(batch: &[FileItem]) -> (String, u64, u64) {
    match (batch.first(), batch.last()) {
        (Some(first), Some(last)) => (
            first.location().filename.clone(),
            first.location().start,
            last.location().end,
        ),
        _ => (String::new(), 0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordLocation;
    use serde_json::json;

    struct Halve;

    impl BatchEnricher for Halve {
        fn name(&self) -> &str {
            "halve"
        }
        fn enrich_batch(&self, items: Vec<FileItem>) -> Result<Vec<Option<FileItem>>> {
            Ok(items.into_iter().take(1).map(Some).collect())
        }
    }

    fn item(start: u64) -> FileItem {
        FileItem::new(RecordLocation::new("f", start, start + 1), json!({"text": "x"}))
    }

    #[test]
    fn misaligned_batch_output_is_rejected() {
        let p = EnrichmentPipeline::new([Enricher::batch(Halve)], 4);
        let err = p.enrich_batch(vec![item(0), item(2)]).err();
        let err = err.as_ref().and_then(|e| e.downcast_ref::<IndexError>());
        assert!(matches!(
            err,
            Some(IndexError::BatchMisaligned { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn empty_batch_short_circuits() -> Result<()> {
        let p = EnrichmentPipeline::new([Enricher::batch(Halve)], 4);
        assert!(p.enrich_batch(Vec::new())?.is_empty());
        Ok(())
    }

    #[test]
    fn registry_rejects_unknown_names() {
        let err = EnrichmentPipeline::from_names(&["text_length", "detect_language"], 1).err();
        let err = err.as_ref().and_then(|e| e.downcast_ref::<IndexError>());
        assert!(matches!(err, Some(IndexError::UnknownEnricher { name, .. }) if name == "detect_language"));
    }
}
