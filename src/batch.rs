//! Batch input files.
//!
//! A batch file is JSON in one of three shapes:
//!
//! ```json
//! ["coffee", "tea"]
//! [{"input": "coffee", "options": {"geo": "US"}}, {"input": "tea"}]
//! {"inputs": ["coffee", {"input": "tea", "options": {"geo": "PK"}}], "options": {"geo": "US"}}
//! ```
//!
//! In the last shape `options` is broadcast to every entry, and the options
//! of an individual entry override it field by field.
//!
//! A list may mix strings and objects; entries of any other type are skipped.
//! An object without an `inputs` list has no entries.

use crate::errors::{self, Result};
use crate::options::OptionsPatch;
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// One input together with the option overrides that apply to it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputSpec {
    pub input: String,
    pub overrides: OptionsPatch,
}

impl InputSpec {
    pub fn new(input: &str, overrides: OptionsPatch) -> InputSpec {
        InputSpec {
            input: input.to_owned(),
            overrides,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Item {
    input: String,
    options: OptionsPatch,
}

#[derive(Debug)]
enum Entry {
    Plain(String),
    Item(Item),
}

fn entry_error(e: serde_json::Error) -> Box<dyn std::error::Error + Send + Sync> {
    errors::invalid_input(format!("batch entry: {e}"))
}

impl Entry {
    /// Strings and objects are entries; anything else is skipped.
    fn classify(value: Value) -> Result<Option<Entry>> {
        match value {
            Value::String(s) => Ok(Some(Entry::Plain(s))),
            Value::Object(map) => {
                let item = serde_json::from_value(Value::Object(map)).map_err(entry_error)?;
                Ok(Some(Entry::Item(item)))
            }
            other => {
                warn!("skipping batch entry that is neither a string nor an object: {other}");
                Ok(None)
            }
        }
    }
}

fn entries(items: Vec<Value>) -> Result<Vec<Entry>> {
    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        entries.extend(Entry::classify(item)?);
    }
    Ok(entries)
}

/// The recognized shapes of a batch file.
#[derive(Debug)]
enum BatchFile {
    /// Entries with their own options only.
    List(Vec<Entry>),
    /// Entries sharing `options`, which their own options override.
    Broadcast {
        inputs: Vec<Entry>,
        options: OptionsPatch,
    },
}

impl BatchFile {
    fn classify(value: Value) -> Result<BatchFile> {
        match value {
            Value::Array(items) => Ok(BatchFile::List(entries(items)?)),
            Value::Object(mut map) => {
                let options = match map.remove("options") {
                    None | Some(Value::Null) => OptionsPatch::default(),
                    Some(v) => serde_json::from_value(v).map_err(entry_error)?,
                };
                let inputs = match map.remove("inputs") {
                    Some(Value::Array(items)) => entries(items)?,
                    _ => {
                        warn!("batch file has no 'inputs' list");
                        vec![]
                    }
                };
                Ok(BatchFile::Broadcast { inputs, options })
            }
            other => Err(errors::unsupported_shape(format!(
                "expected a list or an object, got {other}"
            ))),
        }
    }

    fn into_specs(self) -> Vec<InputSpec> {
        let (inputs, shared) = match self {
            BatchFile::List(inputs) => (inputs, OptionsPatch::default()),
            BatchFile::Broadcast { inputs, options } => (inputs, options),
        };
        inputs
            .into_iter()
            .map(|e| match e {
                Entry::Plain(input) => InputSpec {
                    input,
                    overrides: shared.clone(),
                },
                Entry::Item(it) => InputSpec {
                    input: it.input,
                    overrides: shared.overlay(&it.options),
                },
            })
            .collect()
    }
}

/// Parse the contents of a batch file.
pub fn parse_batch(data: &str) -> Result<Vec<InputSpec>> {
    let value: Value = serde_json::from_str(data)?;
    Ok(BatchFile::classify(value)?.into_specs())
}

/// Read and parse a batch file.
pub fn read_batch(path: &Path) -> Result<Vec<InputSpec>> {
    info!("read: {}", path.display());
    let data = fs::read_to_string(path)?;
    let specs = parse_batch(&data)?;
    info!("inputs in batch file: {}", specs.len());
    Ok(specs)
}
