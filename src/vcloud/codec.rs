//! XML request encoding and response decoding for the vCloud disk API.
//!
//! Documents are read into a small element tree with `quick-xml`. Elements
//! are matched on their local name only, so `Disk`, `vcloud:Disk` and
//! `ns0:Disk` are the same element; namespace declarations are not part of
//! an element's attributes.

use std::collections::BTreeMap;
use std::str;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use thiserror::Error;

use crate::volume::Tags;

use super::types::{DISK_MEDIA_TYPE, Href, TaskHandle, TaskStatus, VCLOUD_NAMESPACE};

/// Errors raised while reading or writing vCloud documents.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CodecError {
    /// The document is not well-formed XML.
    #[error("malformed XML document: {0}")]
    Malformed(String),
    /// The document holds no element at all.
    #[error("XML document is empty")]
    Empty,
    /// A request body could not be written.
    #[error("failed to encode XML request: {0}")]
    Encode(String),
}

/// Direct child element of a decoded resource.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChildElement {
    /// Local name of the child.
    pub name: String,
    /// Attributes keyed by local name.
    pub attributes: BTreeMap<String, String>,
    /// Concatenated, trimmed text content.
    pub text: String,
}

/// Attributes and direct children of one decoded resource element.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResourceAttributes {
    /// Attributes keyed by local name.
    pub attributes: BTreeMap<String, String>,
    /// Direct child elements in document order.
    pub children: Vec<ChildElement>,
}

impl ResourceAttributes {
    /// Returns the trimmed value of an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|value| value.trim())
    }

    /// Returns the first direct child with the given local name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&ChildElement> {
        self.children
            .iter()
            .find(|child| has_local_name(&child.name, name))
    }

    /// Returns the text of the first direct child with the given local name.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|child| child.text.as_str())
    }

    /// Returns an attribute of the first direct child with the given name.
    #[must_use]
    pub fn child_attribute(&self, child: &str, attribute: &str) -> Option<&str> {
        self.child(child)
            .and_then(|element| element.attributes.get(attribute))
            .map(|value| value.trim())
    }
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: BTreeMap<String, String>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, CodecError> {
        let name = utf8(start.name().as_ref())?.to_owned();
        let mut attributes = BTreeMap::new();
        for attribute in start.attributes() {
            let attr = attribute.map_err(|err| CodecError::Malformed(err.to_string()))?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let key = utf8(attr.key.local_name().as_ref())?.to_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| CodecError::Malformed(err.to_string()))?;
            attributes.insert(key, value.into_owned());
        }
        Ok(Self {
            name,
            attributes,
            ..Self::default()
        })
    }

    fn is(&self, wanted: &str) -> bool {
        has_local_name(&self.name, wanted)
    }

    fn child(&self, wanted: &str) -> Option<&Self> {
        self.children.iter().find(|child| child.is(wanted))
    }

    fn collect<'a>(&'a self, wanted: &str, found: &mut Vec<&'a Self>) {
        if self.is(wanted) {
            found.push(self);
        }
        for child in &self.children {
            child.collect(wanted, found);
        }
    }

    fn to_resource(&self) -> ResourceAttributes {
        ResourceAttributes {
            attributes: self.attributes.clone(),
            children: self
                .children
                .iter()
                .map(|child| ChildElement {
                    name: local_name(&child.name).to_owned(),
                    attributes: child.attributes.clone(),
                    text: child.text.trim().to_owned(),
                })
                .collect(),
        }
    }
}

/// Strips any namespace prefix from a qualified element name.
fn local_name(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

/// The single matcher used for every element lookup.
fn has_local_name(qualified: &str, wanted: &str) -> bool {
    local_name(qualified) == wanted
}

fn utf8(bytes: &[u8]) -> Result<&str, CodecError> {
    str::from_utf8(bytes).map_err(|err| CodecError::Malformed(err.to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    }
}

fn parse(document: &str) -> Result<Element, CodecError> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    loop {
        match reader
            .read_event()
            .map_err(|err| CodecError::Malformed(err.to_string()))?
        {
            Event::Start(start) => stack.push(Element::from_start(&start)?),
            Event::Empty(start) => {
                let element = Element::from_start(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    CodecError::Malformed(String::from("closing tag without opening tag"))
                })?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                let content = text
                    .unescape()
                    .map_err(|err| CodecError::Malformed(err.to_string()))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&content);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(utf8(&data)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(CodecError::Malformed(format!(
            "element '{}' is never closed",
            open.name
        )));
    }
    root.ok_or(CodecError::Empty)
}

/// Decodes every element named `local_name` in document order.
///
/// # Errors
///
/// Returns [`CodecError`] when the document cannot be parsed.
pub fn decode_resource_list(
    document: &str,
    local_name: &str,
) -> Result<Vec<ResourceAttributes>, CodecError> {
    let root = parse(document)?;
    let mut found = Vec::new();
    root.collect(local_name, &mut found);
    Ok(found.into_iter().map(Element::to_resource).collect())
}

/// Decodes the first element named `local_name`, if any.
///
/// # Errors
///
/// Returns [`CodecError`] when the document cannot be parsed.
pub fn decode_single_resource(
    document: &str,
    local_name: &str,
) -> Result<Option<ResourceAttributes>, CodecError> {
    Ok(decode_resource_list(document, local_name)?.into_iter().next())
}

/// Decodes a `Metadata` document into a flat key/value map. Both the 1.5
/// `MetadataEntry/Value` layout and the 5.1 `MetadataEntry/TypedValue/Value`
/// layout are accepted; entries without a key are skipped.
///
/// # Errors
///
/// Returns [`CodecError`] when the document cannot be parsed.
pub fn decode_metadata(document: &str) -> Result<Tags, CodecError> {
    let root = parse(document)?;
    let mut entries = Vec::new();
    root.collect("MetadataEntry", &mut entries);

    let mut tags = Tags::new();
    for entry in entries {
        let Some(key) = entry.child("Key").map(|key| key.text.trim()) else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        let value = entry
            .child("Value")
            .or_else(|| entry.child("TypedValue").and_then(|typed| typed.child("Value")))
            .map(|value| value.text.trim().to_owned())
            .unwrap_or_default();
        tags.insert(key.to_owned(), value);
    }
    Ok(tags)
}

/// Decodes the first `Task` element, if any, into a [`TaskHandle`]. Tasks
/// without an `href` are ignored.
///
/// # Errors
///
/// Returns [`CodecError`] when the document cannot be parsed.
pub fn decode_task(document: &str) -> Result<Option<TaskHandle>, CodecError> {
    if document.trim().is_empty() {
        return Ok(None);
    }
    let Some(task) = decode_single_resource(document, "Task")? else {
        return Ok(None);
    };
    let Some(href) = task.attribute("href").filter(|href| !href.is_empty()) else {
        return Ok(None);
    };
    let status = task
        .attribute("status")
        .map_or(TaskStatus::Pending, TaskStatus::from_vendor);
    let error_message = task
        .child_attribute("Error", "message")
        .map(str::to_owned);

    Ok(Some(TaskHandle {
        href: Href::from(href),
        status,
        error_message,
    }))
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), CodecError> {
    writer
        .write_event(event)
        .map_err(|err| CodecError::Encode(err.to_string()))
}

fn open_document(root: &str) -> Result<Writer<Vec<u8>>, CodecError> {
    let mut writer = Writer::new(Vec::new());
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    emit(
        &mut writer,
        Event::Start(BytesStart::new(root).with_attributes([("xmlns", VCLOUD_NAMESPACE)])),
    )?;
    Ok(writer)
}

fn close_document(mut writer: Writer<Vec<u8>>, root: &str) -> Result<String, CodecError> {
    emit(&mut writer, Event::End(BytesEnd::new(root)))?;
    String::from_utf8(writer.into_inner()).map_err(|err| CodecError::Encode(err.to_string()))
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), CodecError> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

/// Encodes a `DiskCreateParams` request. Free text is escaped.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] when the document cannot be written.
pub fn encode_create(
    name: &str,
    description: &str,
    size_bytes: u64,
) -> Result<String, CodecError> {
    let mut writer = open_document("DiskCreateParams")?;
    let size = size_bytes.to_string();
    emit(
        &mut writer,
        Event::Start(
            BytesStart::new("Disk").with_attributes([("name", name), ("size", size.as_str())]),
        ),
    )?;
    text_element(&mut writer, "Description", description)?;
    emit(&mut writer, Event::End(BytesEnd::new("Disk")))?;
    close_document(writer, "DiskCreateParams")
}

/// Encodes a `DiskAttachOrDetachParams` request referencing one disk.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] when the document cannot be written.
pub fn encode_attach_or_detach(disk_url: &str) -> Result<String, CodecError> {
    let mut writer = open_document("DiskAttachOrDetachParams")?;
    emit(
        &mut writer,
        Event::Empty(
            BytesStart::new("Disk")
                .with_attributes([("type", DISK_MEDIA_TYPE), ("href", disk_url)]),
        ),
    )?;
    close_document(writer, "DiskAttachOrDetachParams")
}

/// Encodes a `Metadata` document with one `MetadataEntry` per tag.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] when the document cannot be written.
pub fn encode_metadata(tags: &Tags) -> Result<String, CodecError> {
    let mut writer = open_document("Metadata")?;
    for (key, value) in tags {
        emit(&mut writer, Event::Start(BytesStart::new("MetadataEntry")))?;
        text_element(&mut writer, "Key", key)?;
        text_element(&mut writer, "Value", value)?;
        emit(&mut writer, Event::End(BytesEnd::new("MetadataEntry")))?;
    }
    close_document(writer, "Metadata")
}
