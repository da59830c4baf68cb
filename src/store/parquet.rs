//! Parquet table store.
//!
//! Column layout:
//! - `filename`: Utf8 (dictionary-encoded when categorical, the default)
//! - `start`, `end`: UInt64
//! - `text_length`: nullable UInt64, only when some row has it
//! - `meta_<key>`: nullable, typed from the values present in the column: Boolean,
//!   Int64, Float64, or Utf8. Columns mixing kinds, or holding arrays/objects, are
//!   stored as Utf8 JSON text and read back as strings.
//!
//! On read, any integer type is accepted for offsets and any string or dictionary type
//! for text columns, so tables produced by other tools load as long as they carry the
//! three base columns.

use super::TableStore;
use crate::table::{IndexTable, TEXT_LENGTH_COLUMN};
use crate::types::{IndexRow, META_PREFIX};
use anyhow::{Context, Result, anyhow, bail};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray, UInt64Array,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, UInt64Type};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, create_dir_all};
use std::path::Path;
use std::sync::Arc;

const READ_BATCH_SIZE: usize = 64 * 1024;

/// Columnar store backed by a single Parquet file.
#[derive(Clone, Debug)]
pub struct ParquetStore {
    categorical: BTreeSet<String>,
}

impl Default for ParquetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParquetStore {
    /// Store with `filename` as the only categorical column.
    #[must_use]
    pub fn new() -> Self {
        Self {
            categorical: BTreeSet::from(["filename".to_string()]),
        }
    }

    /// Replace the set of dictionary-encoded columns. Only text columns are affected.
    #[must_use]
    pub fn with_categorical<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.categorical = columns.into_iter().map(Into::into).collect();
        self
    }

    fn column(
        &self,
        fields: &mut Vec<Field>,
        columns: &mut Vec<ArrayRef>,
        name: &str,
        array: ArrayRef,
        nullable: bool,
    ) -> Result<()> {
        let array = if self.categorical.contains(name) && array.data_type() == &DataType::Utf8 {
            let dict = DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8));
            cast(&array, &dict).with_context(|| format!("dictionary-encode column {name}"))?
        } else {
            array
        };
        fields.push(Field::new(name, array.data_type().clone(), nullable));
        columns.push(array);
        Ok(())
    }

    fn to_record_batch(&self, table: &IndexTable) -> Result<RecordBatch> {
        let rows = table.rows();
        let mut fields = Vec::new();
        let mut columns = Vec::new();

        let filename = StringArray::from_iter_values(rows.iter().map(|r| r.filename.as_str()));
        self.column(&mut fields, &mut columns, "filename", Arc::new(filename), false)?;
        let start = UInt64Array::from_iter_values(rows.iter().map(|r| r.start));
        self.column(&mut fields, &mut columns, "start", Arc::new(start), false)?;
        let end = UInt64Array::from_iter_values(rows.iter().map(|r| r.end));
        self.column(&mut fields, &mut columns, "end", Arc::new(end), false)?;

        if table.has_text_length() {
            let lens: UInt64Array = rows.iter().map(|r| r.text_length).collect();
            self.column(&mut fields, &mut columns, TEXT_LENGTH_COLUMN, Arc::new(lens), true)?;
        }

        for key in table.meta_keys() {
            let values: Vec<Option<&Value>> = rows
                .iter()
                .map(|r| r.meta.get(key).filter(|v| !v.is_null()))
                .collect();
            let name = format!("{META_PREFIX}{key}");
            self.column(&mut fields, &mut columns, &name, meta_array(&values), true)?;
        }

        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
            .context("assemble index RecordBatch")
    }
}

/// Build the narrowest array type that holds every present value.
fn meta_array(values: &[Option<&Value>]) -> ArrayRef {
    let mut present = values.iter().flatten();
    if present.clone().all(|v| v.is_boolean()) {
        let arr: BooleanArray = values.iter().map(|v| v.and_then(Value::as_bool)).collect();
        return Arc::new(arr);
    }
    if present.clone().all(|v| v.is_i64()) {
        let arr: Int64Array = values.iter().map(|v| v.and_then(Value::as_i64)).collect();
        return Arc::new(arr);
    }
    if present.clone().all(|v| v.is_u64()) {
        let arr: UInt64Array = values.iter().map(|v| v.and_then(Value::as_u64)).collect();
        return Arc::new(arr);
    }
    if present.clone().all(|v| v.is_number()) {
        let arr: Float64Array = values.iter().map(|v| v.and_then(Value::as_f64)).collect();
        return Arc::new(arr);
    }
    if present.all(|v| v.is_string()) {
        let arr: StringArray = values.iter().map(|v| v.and_then(Value::as_str)).collect();
        return Arc::new(arr);
    }
    let arr: StringArray = values.iter().map(|v| v.map(Value::to_string)).collect();
    Arc::new(arr)
}

impl TableStore for ParquetStore {
    fn write(&self, table: &IndexTable, path: &Path) -> Result<usize> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let batch = self.to_record_batch(table)?;

        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let props = WriterProperties::builder().build();
        let mut writer =
            ArrowWriter::try_new(file, batch.schema(), Some(props)).context("create ArrowWriter")?;
        writer.write(&batch).context("write batch to parquet")?;
        writer.close().context("close ArrowWriter")?;

        Ok(table.len())
    }

    fn read(&self, path: &Path) -> Result<IndexTable> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .context("open ParquetRecordBatchReader")?;
        let mut reader = builder
            .with_batch_size(READ_BATCH_SIZE)
            .build()
            .context("build ParquetRecordBatchReader")?;

        let mut rows = Vec::new();
        while let Some(batch) = reader.next().transpose().context("read next batch")? {
            rows_from_batch(&batch, &mut rows)
                .with_context(|| format!("decode index rows from {}", path.display()))?;
        }
        Ok(IndexTable::new(rows))
    }
}

/// A `meta_*` column normalised to one of the four value kinds.
enum MetaColumn {
    Bool(BooleanArray),
    Int(Int64Array),
    UInt(UInt64Array),
    Float(Float64Array),
    Text(StringArray),
}

impl MetaColumn {
    fn from_array(name: &str, array: &ArrayRef) -> Result<Self> {
        let column = match array.data_type() {
            DataType::Boolean => Self::Bool(array.as_boolean().clone()),
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                Self::Int(cast(array, &DataType::Int64)?.as_primitive::<Int64Type>().clone())
            }
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
                Self::UInt(cast(array, &DataType::UInt64)?.as_primitive::<UInt64Type>().clone())
            }
            DataType::Float16 | DataType::Float32 | DataType::Float64 => {
                Self::Float(cast(array, &DataType::Float64)?.as_primitive::<Float64Type>().clone())
            }
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View | DataType::Dictionary(..) => {
                Self::Text(cast(array, &DataType::Utf8)?.as_string::<i32>().clone())
            }
            other => bail!("unsupported type {other} for enrichment column {name}"),
        };
        Ok(column)
    }

    fn value(&self, i: usize) -> Option<Value> {
        match self {
            Self::Bool(a) => a.is_valid(i).then(|| Value::from(a.value(i))),
            Self::Int(a) => a.is_valid(i).then(|| Value::from(a.value(i))),
            Self::UInt(a) => a.is_valid(i).then(|| Value::from(a.value(i))),
            Self::Float(a) => a.is_valid(i).then(|| Value::from(a.value(i))),
            Self::Text(a) => a.is_valid(i).then(|| Value::from(a.value(i))),
        }
    }
}

fn required(batch: &RecordBatch, name: &str) -> Result<ArrayRef> {
    batch
        .column_by_name(name)
        .cloned()
        .ok_or_else(|| anyhow!("index has no `{name}` column"))
}

fn u64_column(array: &ArrayRef, name: &str) -> Result<UInt64Array> {
    let casted = cast(array, &DataType::UInt64)
        .with_context(|| format!("column `{name}` is not an integer column"))?;
    Ok(casted.as_primitive::<UInt64Type>().clone())
}

fn rows_from_batch(batch: &RecordBatch, out: &mut Vec<IndexRow>) -> Result<()> {
    let filenames = cast(&required(batch, "filename")?, &DataType::Utf8)
        .context("column `filename` is not a string column")?;
    let filenames = filenames.as_string::<i32>();
    let starts = u64_column(&required(batch, "start")?, "start")?;
    let ends = u64_column(&required(batch, "end")?, "end")?;
    let text_lengths = batch
        .column_by_name(TEXT_LENGTH_COLUMN)
        .map(|c| u64_column(c, TEXT_LENGTH_COLUMN))
        .transpose()?;

    let schema = batch.schema();
    let mut meta_columns = Vec::new();
    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        if let Some(key) = field.name().strip_prefix(META_PREFIX) {
            meta_columns.push((key.to_string(), MetaColumn::from_array(field.name(), array)?));
        }
    }

    out.reserve(batch.num_rows());
    for i in 0..batch.num_rows() {
        if filenames.is_null(i) || starts.is_null(i) || ends.is_null(i) {
            bail!("row {i} has a null or negative location value");
        }
        let mut meta = BTreeMap::new();
        for (key, column) in &meta_columns {
            if let Some(v) = column.value(i) {
                meta.insert(key.clone(), v);
            }
        }
        out.push(IndexRow {
            filename: filenames.value(i).to_string(),
            start: starts.value(i),
            end: ends.value(i),
            text_length: text_lengths
                .as_ref()
                .and_then(|c| c.is_valid(i).then(|| c.value(i))),
            meta,
        });
    }
    Ok(())
}
