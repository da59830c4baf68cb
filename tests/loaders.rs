//! Scanning and decoding of partition files.

use anyhow::Result;
use linedex::loader::{Loader, ScannedRecord, loader_by_name, loader_names};
use linedex::testing::DatasetFixture;
use linedex::{IndexError, JsonLinesLoader};
use serde_json::json;
use std::fs;
use std::path::Path;

fn scan_all(loader: &dyn Loader, path: &Path) -> Result<Vec<ScannedRecord>> {
    loader.scan(path)?.collect()
}

fn spans(scanned: &[ScannedRecord]) -> Vec<(u64, u64)> {
    scanned
        .iter()
        .map(|s| (s.location.start, s.location.end))
        .collect()
}

#[test]
fn jsonl_spans_exclude_delimiters_and_skip_blank_lines() -> Result<()> {
    let data = DatasetFixture::new()?;
    let path = data.write_file(
        "a.jsonl",
        "{\"text\":\"héllo\"}\r\n\n   \n{\"text\":\"b\"}\n{\"text\":\"c\"}",
    )?;

    let scanned = scan_all(&JsonLinesLoader, &path)?;
    assert_eq!(spans(&scanned), vec![(0, 17), (24, 36), (37, 49)]);

    let bytes = fs::read(&path)?;
    for s in &scanned {
        assert_eq!(s.location.filename, "a.jsonl");
        let slice = &bytes[s.location.start as usize..s.location.end as usize];
        let decoded = JsonLinesLoader.decode(slice)?;
        assert_eq!(Some(&decoded), s.record.as_ref().ok());
    }
    assert_eq!(scanned[0].record.as_ref().ok(), Some(&json!({"text": "héllo"})));
    Ok(())
}

#[test]
fn jsonl_empty_file_yields_nothing() -> Result<()> {
    let data = DatasetFixture::new()?;
    let path = data.write_file("empty.jsonl", "")?;
    assert!(scan_all(&JsonLinesLoader, &path)?.is_empty());
    Ok(())
}

#[test]
fn jsonl_malformed_line_keeps_its_location() -> Result<()> {
    let data = DatasetFixture::new()?;
    let path = data.write_file("bad.jsonl", "{\"text\": 1}\nnot json\n{\"text\": 2}\n")?;

    let scanned = scan_all(&JsonLinesLoader, &path)?;
    assert_eq!(spans(&scanned), vec![(0, 11), (12, 20), (21, 32)]);
    assert!(scanned[0].record.is_ok());
    assert!(scanned[2].record.is_ok());
    match &scanned[1].record {
        Err(IndexError::Decode {
            filename,
            start,
            end,
            ..
        }) => {
            assert_eq!(filename, "bad.jsonl");
            assert_eq!((*start, *end), (12, 20));
        }
        other => panic!("expected a decode error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn scan_of_missing_file_fails_with_path() {
    let err = JsonLinesLoader
        .scan(Path::new("/definitely/not/here.jsonl"))
        .err()
        .map(|e| format!("{e:#}"))
        .unwrap_or_default();
    assert!(err.contains("/definitely/not/here.jsonl"), "{err}");
}

#[test]
fn registry_resolves_all_names() -> Result<()> {
    for name in loader_names() {
        loader_by_name(name)?;
    }
    assert_eq!(loader_by_name("json_lines")?.name(), "jsonl");

    let err = loader_by_name("avro").err().ok_or_else(|| anyhow::anyhow!("expected error"))?;
    match err.downcast_ref::<IndexError>() {
        Some(e @ IndexError::UnknownLoader { name, .. }) => {
            assert_eq!(name, "avro");
            assert!(e.is_configuration());
        }
        other => panic!("expected UnknownLoader, got {other:?}"),
    }
    Ok(())
}

#[cfg(feature = "io-csv")]
#[test]
fn csv_scan_consumes_header_and_keeps_quoted_delimiters() -> Result<()> {
    let data = DatasetFixture::new()?;
    let path = data.write_file("a.csv", "id,text\n1,hello\n\n2,\"a, b\"\r\n3,last")?;
    let loader = loader_by_name("csv")?;

    let scanned = scan_all(loader.as_ref(), &path)?;
    assert_eq!(spans(&scanned), vec![(8, 15), (17, 25), (27, 33)]);
    let records: Vec<_> = scanned.iter().filter_map(|s| s.record.as_ref().ok()).collect();
    assert_eq!(
        records,
        vec![
            &json!({"id": "1", "text": "hello"}),
            &json!({"id": "2", "text": "a, b"}),
            &json!({"id": "3", "text": "last"}),
        ]
    );

    // Spans decode back to the same records once the loader knows the header.
    let bytes = fs::read(&path)?;
    let bound = loader
        .specialize(&bytes)?
        .ok_or_else(|| anyhow::anyhow!("csv loader should bind to the header"))?;
    for s in &scanned {
        let slice = &bytes[s.location.start as usize..s.location.end as usize];
        assert_eq!(Some(&bound.decode(slice)?), s.record.as_ref().ok());
    }
    Ok(())
}

#[cfg(feature = "io-csv")]
#[test]
fn headerless_tsv_uses_positional_names() -> Result<()> {
    use linedex::DelimitedLoader;

    let data = DatasetFixture::new()?;
    let path = data.write_file("a.tsv", "1\tone\n2\ttwo\n")?;
    let loader = DelimitedLoader::new(b'\t').with_header(None);

    let scanned = scan_all(&loader, &path)?;
    assert_eq!(spans(&scanned), vec![(0, 5), (6, 11)]);
    assert_eq!(
        scanned[1].record.as_ref().ok(),
        Some(&json!({"col_0": "2", "col_1": "two"}))
    );
    assert!(loader.specialize(b"1\tone\n")?.is_none());
    Ok(())
}

#[cfg(feature = "io-csv")]
#[test]
fn space_separated_row_with_wrong_width_is_a_decode_error() -> Result<()> {
    let data = DatasetFixture::new()?;
    let path = data.write_file("a.txt", "id text\n1 hi\n2 too many\n")?;
    let loader = loader_by_name("csv_space_separated")?;

    let scanned = scan_all(loader.as_ref(), &path)?;
    assert_eq!(scanned.len(), 2);
    assert_eq!(scanned[0].record.as_ref().ok(), Some(&json!({"id": "1", "text": "hi"})));
    assert!(matches!(scanned[1].record, Err(IndexError::Decode { .. })));
    Ok(())
}
