use anyhow::Result;
use linedex::testing::*;
use linedex::*;
use serde_json::json;
use std::sync::Arc;

fn jsonl_options() -> IndexOptions {
    IndexOptions {
        output_filename: "index.jsonl".into(),
        ..IndexOptions::default()
    }
}

#[test]
fn every_ordinal_decodes_to_its_original_record() -> Result<()> {
    let data = DatasetFixture::jsonl(3, 5)?;
    let options = jsonl_options();
    build_index(data.root(), &options)?;

    let reader = IndexedReader::open(data.root(), &options.reader_options())?;
    assert_eq!(reader.len(), 15);
    assert_eq!(reader.mapped_files().count(), 3);
    for i in 0..reader.len() {
        assert_eq!(reader.get(i)?, sample_record(i / 5, i % 5, 5));
        assert_eq!(reader.get_field(i, "text")?, json!(sample_text(i)));
    }
    Ok(())
}

#[test]
fn projection_returns_the_text_field_as_is() -> Result<()> {
    let data = DatasetFixture::jsonl(2, 4)?;
    let options = jsonl_options();
    build_index(data.root(), &options)?;

    let reader = IndexedReader::open(data.root(), &options.reader_options().with_field("text"))?;
    let texts = reader.iter().collect::<Result<Vec<_>>>()?;
    let expected: Vec<_> = (0..8).map(|i| json!(sample_text(i))).collect();
    assert_eq!(texts, expected);

    // The raw record is still reachable.
    assert_eq!(reader.get_record(3)?["id"], json!(3));
    assert!(reader.get_field(3, "missing").is_err());
    Ok(())
}

#[test]
fn string_records_pass_through_projection() -> Result<()> {
    let data = DatasetFixture::new()?;
    data.write_file("a.jsonl", "\"just a string\"\n{\"text\":\"obj\"}\n")?;
    let options = jsonl_options();
    build_index(data.root(), &options)?;

    let reader = IndexedReader::open(data.root(), &options.reader_options().with_field("text"))?;
    assert_eq!(reader.len(), 2);
    assert_eq!(reader.get(0)?, json!("just a string"));
    assert_eq!(reader.get(1)?, json!("obj"));
    // Explicit field lookups still require an object.
    assert!(reader.get_field(0, "text").is_err());
    Ok(())
}

#[test]
fn filtered_reader_maps_only_referenced_files() -> Result<()> {
    let data = DatasetFixture::jsonl(3, 5)?;
    let options = jsonl_options();
    build_index(data.root(), &options)?;

    let reader = IndexedReader::open_filtered(data.root(), &options.reader_options(), |row| {
        row.filename == partition_file_name(1)
    })?;
    assert_eq!(reader.len(), 5);
    assert_eq!(reader.mapped_files().collect::<Vec<_>>(), vec!["part-001.jsonl"]);
    assert_eq!(reader.get(0)?["id"], json!(5));
    assert_eq!(reader.location(4)?.filename, "part-001.jsonl");
    reader.close();
    Ok(())
}

#[test]
fn enrichment_drops_shift_ordinals_but_not_contents() -> Result<()> {
    let data = DatasetFixture::new()?;
    data.write_jsonl(
        "a.jsonl",
        &[json!({"text": "one"}), json!({"text": " "}), json!({"text": "three"})],
    )?;
    let options = IndexOptions {
        enrichers: vec!["non_empty_text".into()],
        ..jsonl_options()
    };
    build_index(data.root(), &options)?;

    let reader = IndexedReader::open(data.root(), &options.reader_options().with_field("text"))?;
    assert_eq!(reader.len(), 2);
    assert_eq!(reader.get(1)?, json!("three"));
    Ok(())
}

#[test]
fn spans_beyond_the_file_are_rejected() -> Result<()> {
    let data = DatasetFixture::new()?;
    data.write_file("a.jsonl", "{\"text\":\"x\"}\n")?;
    let table = IndexTable::new(vec![
        IndexRow {
            filename: "a.jsonl".into(),
            start: 0,
            end: 12,
            text_length: None,
            meta: Default::default(),
        },
        IndexRow {
            filename: "a.jsonl".into(),
            start: 5,
            end: 500,
            text_length: None,
            meta: Default::default(),
        },
    ]);

    let reader = IndexedReader::from_table(data.root(), table, Arc::new(JsonLinesLoader))?;
    assert_eq!(reader.get(0)?, json!({"text": "x"}));

    let err = reader
        .get(1)
        .err()
        .ok_or_else(|| anyhow::anyhow!("expected an out-of-bounds span"))?;
    assert!(matches!(
        err.downcast_ref::<IndexError>(),
        Some(IndexError::SpanOutOfBounds { end: 500, len: 13, .. })
    ));

    let err = reader
        .bytes(2)
        .err()
        .ok_or_else(|| anyhow::anyhow!("expected an out-of-range ordinal"))?;
    assert!(matches!(
        err.downcast_ref::<IndexError>(),
        Some(IndexError::OrdinalOutOfRange { ordinal: 2, len: 2 })
    ));
    Ok(())
}

#[test]
fn missing_partition_fails_construction() -> Result<()> {
    let data = DatasetFixture::new()?;
    let table = IndexTable::new(vec![IndexRow {
        filename: "gone.jsonl".into(),
        start: 0,
        end: 1,
        text_length: None,
        meta: Default::default(),
    }]);
    let err = IndexedReader::from_table(data.root(), table, Arc::new(JsonLinesLoader))
        .err()
        .ok_or_else(|| anyhow::anyhow!("expected an open failure"))?;
    assert!(format!("{err:#}").contains("gone.jsonl"));
    Ok(())
}

#[test]
fn lookups_can_run_concurrently() -> Result<()> {
    let data = DatasetFixture::jsonl(4, 10)?;
    let options = jsonl_options();
    build_index(data.root(), &options)?;
    let reader = IndexedReader::open(data.root(), &options.reader_options().with_field("text"))?;

    std::thread::scope(|s| -> Result<()> {
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let reader = &reader;
                s.spawn(move || -> Result<()> {
                    for i in (t..reader.len()).step_by(4) {
                        assert_eq!(reader.get(i)?, json!(sample_text(i)));
                    }
                    Ok(())
                })
            })
            .collect();
        for h in handles {
            h.join().map_err(|_| anyhow::anyhow!("reader thread panicked"))??;
        }
        Ok(())
    })
}

#[cfg(feature = "io-parquet")]
#[test]
fn parquet_index_with_text_length_column() -> Result<()> {
    let data = DatasetFixture::jsonl(2, 3)?;
    let options = IndexOptions {
        text_length_key: Some("text".into()),
        enrichers: vec!["word_count".into()],
        parallel: true,
        ..IndexOptions::default()
    };
    let run = build_index(data.root(), &options)?;
    assert_eq!(run.output, Some(data.path(DEFAULT_INDEX_FILENAME)));

    let reader = IndexedReader::open(data.root(), &options.reader_options())?;
    assert_eq!(reader.table(), &run.table);
    assert_eq!(
        reader.table().columns(),
        vec!["filename", "start", "end", "text_length", "meta_word_count"]
    );
    for i in 0..reader.len() {
        let row = reader.row(i)?;
        let record = reader.get(i)?;
        let text = record["text"].as_str().unwrap_or_default();
        assert_eq!(row.text_length, Some(text.chars().count() as u64));
    }
    Ok(())
}

#[cfg(feature = "io-csv")]
#[test]
fn csv_records_round_trip_through_the_header() -> Result<()> {
    let data = DatasetFixture::new()?;
    data.write_file("a.csv", "id,text\n1,hello\n2,\"a, b\"\n")?;
    data.write_file("b.csv", "\nid,text\r\n3,naïve\r\n")?;
    let options = IndexOptions {
        loader: "csv".into(),
        patterns: vec!["*.csv".into()],
        enrichers: vec!["text_length".into()],
        ..jsonl_options()
    };
    let run = build_index(data.root(), &options)?;
    assert_eq!(run.table.len(), 3);
    assert_eq!(run.table.rows()[2].meta("text_length"), Some(&json!(5)));

    let reader = IndexedReader::open(data.root(), &options.reader_options())?;
    let records = reader.iter().collect::<Result<Vec<_>>>()?;
    assert_eq!(
        records,
        vec![
            json!({"id": "1", "text": "hello"}),
            json!({"id": "2", "text": "a, b"}),
            json!({"id": "3", "text": "naïve"}),
        ]
    );
    Ok(())
}
