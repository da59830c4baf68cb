//! Built-in enrichers.

use super::{BatchEnricher, ItemEnricher};
use crate::types::FileItem;
use anyhow::{Result, anyhow};
use regex::Regex;
use std::sync::LazyLock;

/// Record field read by the built-in stages unless configured otherwise.
pub const DEFAULT_TEXT_KEY: &str = "text";

fn required_text<'a>(item: &'a FileItem, key: &str) -> Result<&'a str> {
    item.text(key)
        .ok_or_else(|| anyhow!("record has no string field {key:?}"))
}

/// Adds `text_length`: the number of characters in the text field.
#[derive(Clone, Debug)]
pub struct TextLength {
    text_key: String,
}

impl Default for TextLength {
    fn default() -> Self {
        Self::new(DEFAULT_TEXT_KEY)
    }
}

impl TextLength {
    pub fn new(text_key: impl Into<String>) -> Self {
        Self {
            text_key: text_key.into(),
        }
    }
}

impl ItemEnricher for TextLength {
    fn name(&self) -> &str {
        "text_length"
    }

    fn enrich_item(&self, mut item: FileItem) -> Result<Option<FileItem>> {
        let len = required_text(&item, &self.text_key)?.chars().count();
        item.add_info("text_length", len as u64);
        Ok(Some(item))
    }
}

/// Drops records whose text field is missing, not a string, or blank.
#[derive(Clone, Debug)]
pub struct NonEmptyText {
    text_key: String,
}

impl Default for NonEmptyText {
    fn default() -> Self {
        Self::new(DEFAULT_TEXT_KEY)
    }
}

impl NonEmptyText {
    pub fn new(text_key: impl Into<String>) -> Self {
        Self {
            text_key: text_key.into(),
        }
    }
}

impl ItemEnricher for NonEmptyText {
    fn name(&self) -> &str {
        "non_empty_text"
    }

    fn enrich_item(&self, item: FileItem) -> Result<Option<FileItem>> {
        let keep = item
            .text(&self.text_key)
            .is_some_and(|t| !t.trim().is_empty());
        Ok(keep.then_some(item))
    }
}

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid word pattern"));

/// Adds `word_count`: the number of `\w+` runs in the text field.
///
/// Batched so the pattern and its match cache are reused across a whole buffer.
#[derive(Clone, Debug)]
pub struct WordCount {
    text_key: String,
}

impl Default for WordCount {
    fn default() -> Self {
        Self::new(DEFAULT_TEXT_KEY)
    }
}

impl WordCount {
    pub fn new(text_key: impl Into<String>) -> Self {
        Self {
            text_key: text_key.into(),
        }
    }
}

impl BatchEnricher for WordCount {
    fn name(&self) -> &str {
        "word_count"
    }

    fn enrich_batch(&self, items: Vec<FileItem>) -> Result<Vec<Option<FileItem>>> {
        let re: &Regex = &WORD;
        items
            .into_iter()
            .map(|mut item| {
                let words = re.find_iter(required_text(&item, &self.text_key)?).count();
                item.add_info("word_count", words as u64);
                Ok(Some(item))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordLocation;
    use serde_json::json;

    fn item(record: serde_json::Value) -> FileItem {
        FileItem::new(RecordLocation::new("part.jsonl", 0, 1), record)
    }

    #[test]
    fn text_length_counts_characters() -> Result<()> {
        let out = TextLength::default().enrich_item(item(json!({"text": "hi"})))?;
        assert_eq!(out.and_then(|i| i.info("text_length").cloned()), Some(json!(2)));

        let out = TextLength::default().enrich_item(item(json!({"text": "héllo"})))?;
        assert_eq!(out.and_then(|i| i.info("text_length").cloned()), Some(json!(5)));
        Ok(())
    }

    #[test]
    fn text_length_requires_text_field() {
        assert!(TextLength::default().enrich_item(item(json!({"body": "hi"}))).is_err());
    }

    #[test]
    fn non_empty_text_drops_blank_records() -> Result<()> {
        let stage = NonEmptyText::default();
        assert!(stage.enrich_item(item(json!({"text": "  "})))?.is_none());
        assert!(stage.enrich_item(item(json!({"other": 1})))?.is_none());
        assert!(stage.enrich_item(item(json!({"text": "ok"})))?.is_some());
        Ok(())
    }

    #[test]
    fn word_count_is_positionally_aligned() -> Result<()> {
        let out = WordCount::default().enrich_batch(vec![
            item(json!({"text": "one two three"})),
            item(json!({"text": ""})),
        ])?;
        let counts: Vec<_> = out
            .into_iter()
            .map(|slot| slot.and_then(|i| i.info("word_count").cloned()))
            .collect();
        assert_eq!(counts, vec![Some(json!(3)), Some(json!(0))]);
        Ok(())
    }
}
