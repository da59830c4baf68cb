use anyhow::Result;
use linedex::enrich::{enricher_by_name, enricher_names};
use linedex::testing::*;
use linedex::*;
use serde_json::json;
use std::sync::Arc;

/// Would add a `never` key, but drops everything first.
struct DropAll;

impl ItemEnricher for DropAll {
    fn name(&self) -> &str {
        "drop_all"
    }

    fn enrich_item(&self, _item: FileItem) -> Result<Option<FileItem>> {
        Ok(None)
    }
}

/// Returns no slots at all.
struct Forgetful;

impl BatchEnricher for Forgetful {
    fn name(&self) -> &str {
        "forgetful"
    }

    fn enrich_batch(&self, _items: Vec<FileItem>) -> Result<Vec<Option<FileItem>>> {
        Ok(Vec::new())
    }
}

fn index_with(root: &std::path::Path, enrichers: Vec<Enricher>, batch_size: usize) -> Result<IndexTable> {
    let indexer = DirectoryIndexer::new(FileIndexer::new(
        Arc::new(JsonLinesLoader),
        EnrichmentPipeline::new(enrichers, batch_size),
    ));
    materialize(indexer.index(root)?, None)
}

#[test]
fn text_length_of_hi_is_two() -> Result<()> {
    let data = DatasetFixture::new()?;
    data.write_jsonl("a.jsonl", &[json!({"text": "hi"})])?;
    let options = IndexOptions {
        enrichers: vec!["text_length".into()],
        ..IndexOptions::default()
    };

    let run = index_dataset(data.root(), &options)?;
    assert_eq!(run.table.len(), 1);
    assert_eq!(run.table.rows()[0].column("meta_text_length"), Some(json!(2)));
    assert_eq!(
        run.table.columns(),
        vec!["filename", "start", "end", "meta_text_length"]
    );
    Ok(())
}

#[test]
fn drop_everything_yields_an_empty_table() -> Result<()> {
    let data = DatasetFixture::jsonl(2, 4)?;
    let table = index_with(data.root(), vec![Enricher::item(DropAll)], 1)?;
    assert!(table.is_empty());
    assert_eq!(table.columns(), vec!["filename", "start", "end"]);
    Ok(())
}

#[test]
fn batch_size_does_not_change_the_table() -> Result<()> {
    let data = DatasetFixture::jsonl(3, 11)?;
    let run = |batch_size: usize| {
        index_dataset(
            data.root(),
            &IndexOptions {
                enrichers: vec!["non_empty_text".into(), "word_count".into(), "text_length".into()],
                batch_size,
                ..IndexOptions::default()
            },
        )
        .map(|run| run.table)
    };

    let reference = run(1)?;
    assert_eq!(reference.len(), 33);
    for batch_size in [2, 3, 7, 64] {
        assert_eq!(run(batch_size)?, reference, "batch size {batch_size}");
    }
    let first = &reference.rows()[0];
    assert_eq!(first.meta("word_count"), Some(&json!(5)));
    assert_eq!(first.meta("text_length"), Some(&json!(sample_text(0).chars().count())));
    Ok(())
}

#[test]
fn non_empty_text_drops_blank_and_missing_texts() -> Result<()> {
    let data = DatasetFixture::new()?;
    data.write_jsonl(
        "a.jsonl",
        &[
            json!({"text": "kept"}),
            json!({"text": "   "}),
            json!({"text": ""}),
            json!({"body": "no text field"}),
            json!({"text": 42}),
        ],
    )?;
    let run = index_dataset(
        data.root(),
        &IndexOptions {
            enrichers: vec!["non_empty_text".into()],
            ..IndexOptions::default()
        },
    )?;
    assert_eq!(run.table.len(), 1);
    assert_eq!(run.stats.records_dropped, 4);
    Ok(())
}

#[test]
fn enrichers_read_the_configured_text_key() -> Result<()> {
    let data = DatasetFixture::new()?;
    data.write_jsonl("a.jsonl", &[json!({"body": "three word body"})])?;
    let run = index_dataset(
        data.root(),
        &IndexOptions {
            enrichers: vec!["text_length".into(), "word_count".into()],
            text_key: "body".into(),
            ..IndexOptions::default()
        },
    )?;
    let row = &run.table.rows()[0];
    assert_eq!(row.meta("text_length"), Some(&json!(15)));
    assert_eq!(row.meta("word_count"), Some(&json!(3)));
    Ok(())
}

#[test]
fn misaligned_batch_output_is_an_error() -> Result<()> {
    let data = DatasetFixture::jsonl(1, 3)?;
    let err = index_with(data.root(), vec![Enricher::batch(Forgetful)], 2)
        .err()
        .ok_or_else(|| anyhow::anyhow!("expected a misaligned batch"))?;
    match err.downcast_ref::<IndexError>() {
        Some(IndexError::BatchMisaligned {
            stage,
            expected,
            got,
        }) => {
            assert_eq!(stage, "forgetful");
            assert_eq!((*expected, *got), (2, 0));
        }
        other => panic!("expected BatchMisaligned, got {other:?}"),
    }
    Ok(())
}

#[test]
fn unknown_enricher_fails_before_indexing() -> Result<()> {
    let data = DatasetFixture::jsonl(1, 1)?;
    let err = index_dataset(
        data.root(),
        &IndexOptions {
            enrichers: vec!["language".into()],
            ..IndexOptions::default()
        },
    )
    .err()
    .ok_or_else(|| anyhow::anyhow!("expected an unknown enricher"))?;
    assert!(matches!(
        err.downcast_ref::<IndexError>(),
        Some(IndexError::UnknownEnricher { name, .. }) if name == "language"
    ));
    Ok(())
}

#[test]
fn registry_kinds() -> Result<()> {
    assert_eq!(
        enricher_names().collect::<Vec<_>>(),
        vec!["text_length", "word_count", "non_empty_text"]
    );
    assert!(matches!(enricher_by_name("word_count")?, Enricher::Batch(_)));
    assert!(matches!(enricher_by_name("text_length")?, Enricher::Item(_)));
    Ok(())
}
