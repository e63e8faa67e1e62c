//! Core of the `ds-get` command: mount a document as `$doc` and evaluate
//! paths against it.

use serde_json::Value;
use thiserror::Error;

use crate::error::StoreError;
use crate::store::Store;

/// Name the input document is mounted under.
pub const DOC_SOURCE: &str = "doc";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Usage: ds-get [--xml] <path>...")]
    Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Xml,
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub format: InputFormat,
    pub paths: Vec<String>,
}

impl Args {
    pub fn parse<I>(args: I) -> Result<Args, CliError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut format = InputFormat::Json;
        let mut paths = Vec::new();
        for arg in args {
            match arg.as_str() {
                "--xml" => format = InputFormat::Xml,
                "--json" => format = InputFormat::Json,
                flag if flag.starts_with("--") => return Err(CliError::Usage),
                _ => paths.push(arg),
            }
        }
        if paths.is_empty() {
            return Err(CliError::Usage);
        }
        Ok(Args { format, paths })
    }
}

/// Relative paths are taken against `$doc`.
fn absolute(path: &str) -> String {
    if path.starts_with('$') {
        path.to_string()
    } else if path == "." {
        format!("${DOC_SOURCE}")
    } else {
        format!("${DOC_SOURCE}/{path}")
    }
}

/// Evaluate each path against `input`. Misses come back as `null`.
pub fn evaluate(input: &str, format: InputFormat, paths: &[String]) -> Result<Vec<Value>, CliError> {
    let store = Store::new();
    match format {
        InputFormat::Json => {
            let value: Value = serde_json::from_str(input)?;
            store.add_json(DOC_SOURCE, value)?;
        }
        InputFormat::Xml => {
            store.add_xml(DOC_SOURCE, input)?;
        }
    }
    paths
        .iter()
        .map(|path| Ok(store.value(&absolute(path))?.unwrap_or(Value::Null)))
        .collect()
}
