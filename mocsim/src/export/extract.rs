//! Extraction of actor functions from source fragments.
//!
//! The body of an actor function is delimited in a source fragment by a pair
//! of line comments naming the function:
//!
//! ```text
//! // BEGIN inc_func
//! out1 = inp1 + 1;
//! // END inc_func
//! ```
//!
//! The extracted body is wrapped in a function with the standard task
//! signature, where the `inpN` and `outN` identifiers refer to the `N`-th input
//! and output of the actor and are rewritten to dereferences of local
//! pointers bound to the task's data arrays.
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::path::Path;

use regex::Regex;
use tracing::warn;

use crate::network::info::{NetworkInfo, PortInfo, ProcessInfo};

use super::document::function_name;
use super::ExportError;

/// A generated actor function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ExtractedFunction {
    /// Function name, `<actor base name>_func`.
    pub(crate) name: String,
    /// Source code of the function.
    pub(crate) code: String,
}

/// Function extractor bound to the actors of a folded network.
#[derive(Debug)]
pub(crate) struct Extractor<'a> {
    actors: HashMap<String, &'a ProcessInfo>,
    /// Function names shared by several actors.
    ambiguous: HashSet<String>,
    marker: Regex,
    identifier: Regex,
}

impl<'a> Extractor<'a> {
    pub(crate) fn new(network: &'a NetworkInfo) -> Result<Self, ExportError> {
        let mut actors = HashMap::new();
        let mut ambiguous = HashSet::new();
        for process in &network.processes {
            let name = function_name(process);
            if let Some(previous) = actors.insert(name.clone(), process) {
                warn!(
                    function = %name,
                    first = %previous.name,
                    second = %process.name,
                    "actors share a function name"
                );
                ambiguous.insert(name);
            }
        }
        for name in &ambiguous {
            actors.remove(name);
        }

        Ok(Self {
            actors,
            ambiguous,
            marker: Regex::new(r"(?m)^[ \t]*//[ \t]*(BEGIN|END)[ \t]+(\w+)[ \t]*\r?$")?,
            identifier: Regex::new(r"\b(inp|out)(\d+)\b")?,
        })
    }

    /// Returns the functions delimited in a source fragment.
    ///
    /// Unmatched markers and functions that name no actor are reported and
    /// skipped.
    pub(crate) fn extract(&self, text: &str, path: &Path) -> Vec<ExtractedFunction> {
        let mut functions = Vec::new();
        let mut pending: Option<(&str, usize)> = None;

        for caps in self.marker.captures_iter(text) {
            let (Some(marker), Some(kind), Some(name)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let name = name.as_str();

            match (kind.as_str(), pending.take()) {
                ("BEGIN", previous) => {
                    if let Some((previous, _)) = previous {
                        warn!(path = %path.display(), function = previous, "missing end marker");
                    }
                    pending = Some((name, marker.end()));
                }
                ("END", Some((begin, start))) if begin == name => {
                    let body = &text[start..marker.start()];
                    let body = body
                        .strip_prefix("\r\n")
                        .or_else(|| body.strip_prefix('\n'))
                        .unwrap_or(body);
                    if let Some(function) = self.generate(name, body, path) {
                        functions.push(function);
                    }
                }
                (_, previous) => {
                    warn!(path = %path.display(), function = name, "unmatched end marker");
                    pending = previous;
                }
            }
        }
        if let Some((name, _)) = pending {
            warn!(path = %path.display(), function = name, "missing end marker");
        }

        functions
    }

    fn generate(&self, name: &str, body: &str, path: &Path) -> Option<ExtractedFunction> {
        if self.ambiguous.contains(name) {
            warn!(path = %path.display(), function = name, "function matches several actors");
            return None;
        }
        let Some(process) = self.actors.get(name) else {
            warn!(path = %path.display(), function = name, "no actor matches function");
            return None;
        };

        let mut code = String::new();
        let _ = writeln!(
            code,
            "void {name}(int task_id, void **data_in, void **data_out, int activation)"
        );
        code.push_str("{\n");
        declare(&mut code, &process.inputs, "inp", "data_in");
        declare(&mut code, &process.outputs, "out", "data_out");
        code.push_str(&self.identifier.replace_all(body, "(*${1}${2})"));
        if !code.ends_with('\n') {
            code.push('\n');
        }
        code.push_str("}\n");

        Some(ExtractedFunction {
            name: name.to_string(),
            code,
        })
    }
}

/// Declares the local pointers bound to the ports of one direction.
fn declare(code: &mut String, ports: &[PortInfo], prefix: &str, array: &str) {
    for (index, port) in ports.iter().enumerate() {
        let ty = c_type(port.type_tag.name());
        let _ = writeln!(
            code,
            "    {ty} *{prefix}{} = ({ty} *){array}[{index}];",
            index + 1
        );
    }
}

/// Returns the C type matching a Rust type name.
fn c_type(rust_type: &str) -> &'static str {
    match rust_type {
        "bool" => "_Bool",
        "i8" => "signed char",
        "u8" => "unsigned char",
        "i16" => "short",
        "u16" => "unsigned short",
        "i32" => "int",
        "u32" => "unsigned int",
        "i64" => "long long",
        "u64" => "unsigned long long",
        "isize" => "ptrdiff_t",
        "usize" => "size_t",
        "f32" => "float",
        "f64" => "double",
        _ => "unsigned char",
    }
}
