//! Platform-mapping document.
//!
//! The document follows the layout of SDF3 application graphs: a structural
//! `sdf` section listing actors with their ports and the channels between
//! them, followed by an `sdfProperties` section binding each actor to a
//! processor and its source file and giving the token size of each channel.
use std::fmt::Write;

use crate::network::info::{NetworkInfo, PortInfo, ProcessInfo};

use super::ExportConfig;

/// Minimal indenting XML element writer.
#[derive(Debug, Default)]
pub(crate) struct XmlWriter {
    out: String,
    open: Vec<&'static str>,
}

impl XmlWriter {
    pub(crate) fn new() -> Self {
        let mut writer = Self::default();
        writer
            .out
            .push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

        writer
    }

    /// Opens an element that will contain children.
    pub(crate) fn open(&mut self, name: &'static str, attrs: &[(&str, &str)]) {
        self.start_tag(name, attrs);
        self.out.push_str(">\n");
        self.open.push(name);
    }

    /// Writes an element without content.
    pub(crate) fn empty(&mut self, name: &'static str, attrs: &[(&str, &str)]) {
        self.start_tag(name, attrs);
        self.out.push_str("/>\n");
    }

    /// Writes an element containing only text.
    pub(crate) fn text(&mut self, name: &'static str, text: &str) {
        self.start_tag(name, &[]);
        let _ = writeln!(self.out, ">{}</{name}>", escape(text));
    }

    /// Closes the innermost open element.
    pub(crate) fn close(&mut self) {
        if let Some(name) = self.open.pop() {
            self.indent();
            let _ = writeln!(self.out, "</{name}>");
        }
    }

    /// Closes all open elements and returns the document.
    pub(crate) fn finish(mut self) -> String {
        while !self.open.is_empty() {
            self.close();
        }

        self.out
    }

    fn start_tag(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.indent();
        self.out.push('<');
        self.out.push_str(name);
        for (key, value) in attrs {
            let _ = write!(self.out, " {}=\"{}\"", key, escape(value));
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.open.len() {
            self.out.push_str("  ");
        }
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }

    escaped
}

/// Returns the name of the function implementing an actor.
pub(crate) fn function_name(process: &ProcessInfo) -> String {
    format!("{}_func", process.basename)
}

/// Renders the document of a folded network.
pub(crate) fn render(network: &NetworkInfo, config: &ExportConfig) -> String {
    let mut xml = XmlWriter::new();

    xml.open(
        "sdf3",
        &[
            ("type", "sdf"),
            ("version", "1.0"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            (
                "xsi:noNamespaceSchemaLocation",
                "http://www.es.ele.tue.nl/sdf3/xsd/sdf3-sdf.xsd",
            ),
        ],
    );
    xml.open("applicationGraph", &[("name", network.name.as_str())]);

    xml.open("sdf", &[("name", network.name.as_str()), ("type", network.name.as_str())]);
    for process in &network.processes {
        xml.open(
            "actor",
            &[
                ("name", process.name.as_str()),
                ("type", process.kind.as_str()),
                ("size", "1"),
            ],
        );
        write_ports(&mut xml, &process.inputs, "in");
        write_ports(&mut xml, &process.outputs, "out");
        xml.close();
    }
    for channel in &network.channels {
        let initial_tokens = channel.initial_tokens.to_string();
        let mut attrs = vec![
            ("name", channel.name.as_str()),
            ("srcActor", channel.src.process.as_str()),
            ("srcPort", channel.src.port.as_str()),
            ("dstActor", channel.dst.process.as_str()),
            ("dstPort", channel.dst.port.as_str()),
        ];
        if channel.initial_tokens != 0 {
            attrs.push(("initialTokens", initial_tokens.as_str()));
        }
        xml.empty("channel", &attrs);
    }
    xml.close();

    xml.open("sdfProperties", &[]);
    for process in &network.processes {
        xml.open("actorProperties", &[("actor", process.name.as_str())]);
        xml.open(
            "processor",
            &[("type", config.processor.as_str()), ("default", "true")],
        );
        xml.empty("executionTime", &[("time", "1")]);
        xml.open("argumentMapping", &[]);
        let ports = process
            .inputs
            .iter()
            .map(|port| (port, "in"))
            .chain(process.outputs.iter().map(|port| (port, "out")));
        for (index, (port, direction)) in ports.enumerate() {
            let index = index.to_string();
            xml.empty(
                "argument",
                &[
                    ("index", index.as_str()),
                    ("port", port.name.as_str()),
                    ("type", direction),
                ],
            );
        }
        xml.close();
        let source = format!("{}.cpp", function_name(process));
        xml.empty("sourceFiles", &[("file", source.as_str())]);
        xml.close();
        xml.close();
    }
    for channel in &network.channels {
        let size = channel.token_size.to_string();
        xml.open("channelProperties", &[("channel", channel.name.as_str())]);
        xml.empty("tokenSize", &[("sz", size.as_str())]);
        xml.close();
    }
    xml.open("graphProperties", &[]);
    xml.open("timeConstraints", &[]);
    xml.text("throughput", &config.throughput.to_string());

    xml.finish()
}

fn write_ports(xml: &mut XmlWriter, ports: &[PortInfo], direction: &str) {
    for port in ports {
        let rate = port.rate.to_string();
        xml.empty(
            "port",
            &[("name", port.name.as_str()), ("type", direction), ("rate", rate.as_str())],
        );
    }
}
