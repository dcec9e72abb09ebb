//! Data-contract style XML for metadata property bags
//!
//! `to_contract_xml` renders a JSON property bag as compact XML, members in
//! ordinal key order so the output does not depend on the order the service
//! returned them. `strip_elements` re-reads that document, drops every
//! element whose local name is in the strip set together with its subtree,
//! and re-indents the rest with tabs.

use std::collections::BTreeSet;

use quick_xml::escape::escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};

use crate::error::{ExtractError, Result};

/// Namespace bound to the `i:` prefix for `i:type` and `i:nil`
pub const XML_SCHEMA_INSTANCE_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Annotation naming the concrete metadata type of an object
const ODATA_TYPE: &str = "@odata.type";

fn serialization_error(e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Serialization(e.to_string())
}

/// `#Microsoft.Dynamics.CRM.LookupAttributeMetadata` -> `LookupAttributeMetadata`
fn odata_type_name(object: &Map<String, Value>) -> Option<&str> {
    object
        .get(ODATA_TYPE)
        .and_then(Value::as_str)
        .and_then(|t| t.rsplit('.').next())
        .map(|t| t.trim_start_matches('#'))
        .filter(|t| !t.is_empty())
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let valid_start = |c: char| c.is_alphabetic() || c == '_';
    match chars.next() {
        Some(first) if valid_start(first) => {
            chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    }
}

/// The XML 1.0 `Char` production; `char` already excludes surrogates
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Escape element text; `\r` becomes a character reference so parsers do not
/// normalize it away
fn escape_text(name: &str, text: &str) -> Result<String> {
    if let Some(c) = text.chars().find(|c| !is_xml_char(*c)) {
        return Err(ExtractError::Serialization(format!(
            "'{}' contains U+{:04X}, which XML cannot represent",
            name, c as u32
        )));
    }
    Ok(escape(text).replace('\r', "&#xD;"))
}

/// Element name for an item of the array member `member`
fn item_name<'a>(member: &'a str, item: &'a Value) -> &'a str {
    if let Some(name) = item.as_object().and_then(odata_type_name) {
        return name;
    }
    match member.strip_suffix('s') {
        Some(singular) if !singular.is_empty() => singular,
        _ => "Item",
    }
}

struct ContractWriter {
    writer: Writer<Vec<u8>>,
}

impl ContractWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn write(&mut self, event: Event<'_>) -> Result<()> {
        self.writer.write_event(event).map_err(serialization_error)
    }

    fn write_element(&mut self, name: &str, value: &Value, root: bool) -> Result<()> {
        if !is_xml_name(name) {
            return Err(ExtractError::Serialization(format!(
                "'{}' is not a valid element name",
                name
            )));
        }

        let mut start = BytesStart::new(name);
        if root {
            start.push_attribute(("xmlns:i", XML_SCHEMA_INSTANCE_NS));
        }

        match value {
            Value::Null => {
                start.push_attribute(("i:nil", "true"));
                self.write(Event::Empty(start))
            }
            Value::Object(object) => {
                if let Some(type_name) = odata_type_name(object) {
                    start.push_attribute(("i:type", type_name));
                }
                self.write(Event::Start(start))?;
                self.write_members(object)?;
                self.write(Event::End(BytesEnd::new(name)))
            }
            Value::Array(items) => {
                self.write(Event::Start(start))?;
                for item in items {
                    self.write_element(item_name(name, item), item, false)?;
                }
                self.write(Event::End(BytesEnd::new(name)))
            }
            Value::Bool(b) => self.write_text(start, name, if *b { "true" } else { "false" }),
            Value::Number(n) => self.write_text(start, name, &n.to_string()),
            Value::String(s) => self.write_text(start, name, s),
        }
    }

    fn write_text(&mut self, start: BytesStart<'_>, name: &str, text: &str) -> Result<()> {
        if text.is_empty() {
            return self.write(Event::Empty(start));
        }
        let escaped = escape_text(name, text)?;
        self.write(Event::Start(start))?;
        self.write(Event::Text(BytesText::from_escaped(escaped)))?;
        self.write(Event::End(BytesEnd::new(name)))
    }

    fn write_members(&mut self, object: &Map<String, Value>) -> Result<()> {
        let mut keys: Vec<&String> = object.keys().filter(|key| !key.contains('@')).collect();
        keys.sort();
        for key in keys {
            self.write_element(key, &object[key.as_str()], false)?;
        }
        Ok(())
    }

    fn finish(self) -> Result<String> {
        String::from_utf8(self.writer.into_inner()).map_err(serialization_error)
    }
}

/// Render `members` as the children of a `root` contract element
pub fn to_contract_xml(root: &str, members: &Map<String, Value>) -> Result<String> {
    let mut writer = ContractWriter::new();
    writer.write_element(root, &Value::Object(members.clone()), true)?;
    writer.finish()
}

/// Remove every element named in `names` (matched on local name) and re-indent with tabs
pub fn strip_elements(xml: &str, names: &BTreeSet<String>) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
    let mut skip_depth = 0usize;
    // Text arrives split around entity references; it is written back as one
    // event so the indenter never breaks a line inside element content.
    let mut text = String::new();

    let is_stripped = |local: &[u8]| {
        std::str::from_utf8(local)
            .map(|name| names.contains(name))
            .unwrap_or(false)
    };

    loop {
        let event = reader.read_event().map_err(serialization_error)?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Text(ref e) => text.push_str(std::str::from_utf8(e).map_err(serialization_error)?),
            Event::GeneralRef(ref e) => {
                text.push('&');
                text.push_str(std::str::from_utf8(e).map_err(serialization_error)?);
                text.push(';');
            }
            event => {
                if !text.is_empty() {
                    let pending = std::mem::take(&mut text);
                    writer
                        .write_event(Event::Text(BytesText::from_escaped(pending)))
                        .map_err(serialization_error)?;
                }
                match event {
                    Event::Eof => break,
                    Event::Decl(_) => {}
                    Event::Start(ref e) if is_stripped(e.local_name().as_ref()) => skip_depth = 1,
                    Event::Empty(ref e) if is_stripped(e.local_name().as_ref()) => {}
                    event => writer.write_event(event).map_err(serialization_error)?,
                }
            }
        }
    }

    String::from_utf8(writer.into_inner()).map_err(serialization_error)
}
