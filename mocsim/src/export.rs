//! Platform export.
//!
//! A network described by its [`NetworkInfo`] can be exported for deployment
//! on a platform through [`export`], which:
//!
//! 1. [folds](fold::fold) structural processes (delays, zips and unzips) into
//!    the surrounding channels,
//! 2. writes a platform-mapping document listing the surviving actors and
//!    channels,
//! 3. extracts the actor functions delimited in the configured source
//!    fragments into one C file per function.
//!
//! # Examples
//!
//! ```
//! use mocsim::export::{self, ExportConfig};
//! use mocsim::moc::sdf;
//! use mocsim::network::Network;
//!
//! let mut net = Network::new("pipeline");
//! let a = net.signal("a");
//! let b = net.signal("b");
//! sdf::vsource(&mut net, "src", vec![1u32, 2, 3], &a).unwrap();
//! sdf::comb(&mut net, "inc", 1, 1, |x: &[u32]| vec![x[0] + 1], &a, &b).unwrap();
//! sdf::sink(&mut net, "snk", |_: &u32| {}, &b).unwrap();
//!
//! let dir = std::env::temp_dir().join("mocsim-doc-export");
//! let report = export::export(&net.introspect(), &ExportConfig::new(&dir)).unwrap();
//!
//! assert!(report.document.ends_with("platform.xml"));
//! assert!(report.functions.is_empty());
//! ```
pub mod fold;

mod document;
mod extract;

use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::network::info::NetworkInfo;

use extract::Extractor;

/// Export settings.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExportConfig {
    /// Directory receiving the document and the function files.
    pub output_dir: PathBuf,
    /// File name of the platform-mapping document.
    pub document_name: String,
    /// Source fragments scanned for actor functions.
    pub sources: Vec<PathBuf>,
    /// Processor type bound to every actor.
    pub processor: String,
    /// Global throughput constraint.
    pub throughput: f64,
}

impl ExportConfig {
    /// Creates a configuration with default settings writing to the specified
    /// directory.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Sets the file name of the document.
    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = name.into();
        self
    }

    /// Adds a source fragment.
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    /// Sets the processor type.
    pub fn with_processor(mut self, processor: impl Into<String>) -> Self {
        self.processor = processor.into();
        self
    }

    /// Sets the throughput constraint.
    pub fn with_throughput(mut self, throughput: f64) -> Self {
        self.throughput = throughput;
        self
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            document_name: "platform.xml".to_string(),
            sources: Vec::new(),
            processor: "generic".to_string(),
            throughput: 0.0,
        }
    }
}

/// Summary of the files written by an export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportReport {
    /// Path of the platform-mapping document.
    pub document: PathBuf,
    /// Paths of the extracted function files.
    pub functions: Vec<PathBuf>,
    /// Source fragments that could not be read.
    pub skipped: Vec<PathBuf>,
}

/// Exports a network.
///
/// The network is folded first, so that nothing is written if a structural
/// process cannot be folded. Unreadable source fragments are reported and
/// skipped, while a failure to write an output file aborts the export.
pub fn export(info: &NetworkInfo, config: &ExportConfig) -> Result<ExportReport, ExportError> {
    let folded = fold::fold(info)?;
    let extractor = Extractor::new(&folded)?;

    fs::create_dir_all(&config.output_dir).map_err(|e| io_error(&config.output_dir, e))?;

    let document = config.output_dir.join(&config.document_name);
    fs::write(&document, document::render(&folded, config)).map_err(|e| io_error(&document, e))?;

    let mut functions = Vec::new();
    let mut skipped = Vec::new();
    for source in &config.sources {
        let text = match fs::read_to_string(source) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %source.display(), error = %e, "skipping unreadable source file");
                skipped.push(source.clone());
                continue;
            }
        };
        for function in extractor.extract(&text, source) {
            let path = config.output_dir.join(format!("{}.c", function.name));
            fs::write(&path, &function.code).map_err(|e| io_error(&path, e))?;
            functions.push(path);
        }
    }

    info!(
        target: "mocsim",
        document = %document.display(),
        actors = folded.processes.len(),
        channels = folded.channels.len(),
        functions = functions.len(),
        "network exported"
    );

    Ok(ExportReport {
        document,
        functions,
        skipped,
    })
}

fn io_error(path: &Path, source: io::Error) -> ExportError {
    ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Error returned by an export.
#[derive(Debug)]
pub enum ExportError {
    /// An output file could not be written.
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Cause of the failure.
        source: io::Error,
    },
    /// A structural process is not connected as expected.
    Malformed {
        /// Hierarchical name of the process.
        process: String,
        /// Kind tag of the process.
        kind: String,
        /// Description of the problem.
        reason: String,
    },
    /// A marker pattern could not be compiled.
    Pattern(regex::Error),
}

impl fmt::Display for ExportError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, .. } => write!(fmt, "could not write '{}'", path.display()),
            Self::Malformed {
                process,
                kind,
                reason,
            } => write!(fmt, "cannot fold {kind} process '{process}': {reason}"),
            Self::Pattern(_) => fmt.write_str("invalid marker pattern"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Malformed { .. } => None,
            Self::Pattern(e) => Some(e),
        }
    }
}

impl From<regex::Error> for ExportError {
    fn from(e: regex::Error) -> Self {
        Self::Pattern(e)
    }
}
