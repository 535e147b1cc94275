//! # Libvirt Domain Model
//!
//! Typed view of the parts of a libvirt domain XML document the sidecar
//! cares about: the disk list under `<devices>`, the QEMU command-line
//! extension (`<qemu:commandline>`) and the `xmlns:qemu` declaration on the
//! root element.
//!
//! ## Round-Tripping
//!
//! The document keeps its source bytes. [`DomainDocument::to_xml`] re-streams
//! the source event by event, so every element, attribute, comment and
//! whitespace run the model does not own comes out exactly as it went in.
//! Only two places are rewritten from the model:
//!
//! ```text
//! <domain type="kvm" xmlns:qemu="...">     ← root attributes (namespace)
//!   <devices>
//!     <disk> <target bus="sata"/> <alias name="ua-disk0"/> </disk>   ← read only
//!   </devices>
//!   <qemu:commandline>                     ← written from the model,
//!     <qemu:arg value="-set"/>               in place of the source one or
//!   </qemu:commandline>                      before </domain> if absent
//! </domain>
//! ```
//!
//! An extension element that is absent in the source and still empty in the
//! model is never emitted.

use std::borrow::Cow;
use std::fmt;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::constants::{DISK_BUS_SATA, QEMU_NAMESPACE_PREFIX, USER_ALIAS_PREFIX};
use crate::error::{Error, Result};

// =============================================================================
// Element Names
// =============================================================================

const DOMAIN_ELEMENT: &[u8] = b"domain";
const DEVICES_ELEMENT: &[u8] = b"devices";
const DISK_ELEMENT: &[u8] = b"disk";
const TARGET_ELEMENT: &[u8] = b"target";
const ALIAS_ELEMENT: &[u8] = b"alias";
const COMMANDLINE_ELEMENT: &str = "qemu:commandline";
const ARG_ELEMENT: &str = "qemu:arg";
const ENV_ELEMENT: &str = "qemu:env";

// =============================================================================
// Disk
// =============================================================================

/// Emulated bus a disk is attached through (`<target bus="..."/>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DiskBus {
    Sata,
    Virtio,
    Scsi,
    Ide,
    Usb,
    Sd,
    Fdc,
    Xen,
    /// Any bus name libvirt accepts that is not listed above.
    Other(String),
}

impl DiskBus {
    /// Parses a libvirt bus name.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            DISK_BUS_SATA => Self::Sata,
            "virtio" => Self::Virtio,
            "scsi" => Self::Scsi,
            "ide" => Self::Ide,
            "usb" => Self::Usb,
            "sd" => Self::Sd,
            "fdc" => Self::Fdc,
            "xen" => Self::Xen,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the libvirt bus name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sata => DISK_BUS_SATA,
            Self::Virtio => "virtio",
            Self::Scsi => "scsi",
            Self::Ide => "ide",
            Self::Usb => "usb",
            Self::Sd => "sd",
            Self::Fdc => "fdc",
            Self::Xen => "xen",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for DiskBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device alias (`<alias name="..."/>`).
///
/// Aliases carrying the `ua-` prefix are user-defined; the prefix is not
/// part of [`Alias::name`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    name: String,
    user_defined: bool,
}

impl Alias {
    /// Builds an alias from the raw `name` attribute value.
    #[must_use]
    pub fn from_xml_name(raw: &str) -> Self {
        match raw.strip_prefix(USER_ALIAS_PREFIX) {
            Some(name) => Self {
                name: name.to_string(),
                user_defined: true,
            },
            None => Self {
                name: raw.to_string(),
                user_defined: false,
            },
        }
    }

    /// Alias name without the user-defined prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the alias carried the `ua-` prefix.
    #[must_use]
    pub fn is_user_defined(&self) -> bool {
        self.user_defined
    }

    /// Returns the attribute value as it appears in domain XML.
    #[must_use]
    pub fn xml_name(&self) -> String {
        if self.user_defined {
            format!("{USER_ALIAS_PREFIX}{}", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// A `<disk>` entry under `<devices>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disk {
    /// `device` attribute of `<disk>` (`disk`, `cdrom`, `lun`, ...).
    pub device: Option<String>,
    /// `dev` attribute of `<target>`.
    pub target_dev: Option<String>,
    /// `bus` attribute of `<target>`.
    pub bus: Option<DiskBus>,
    /// `<alias>` child.
    pub alias: Option<Alias>,
}

impl Disk {
    /// Returns true if the disk is attached through the SATA bus.
    #[must_use]
    pub fn is_sata(&self) -> bool {
        self.bus == Some(DiskBus::Sata)
    }
}

// =============================================================================
// QEMU Command-Line Extension
// =============================================================================

/// A `<qemu:arg value="..."/>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub value: String,
}

impl Arg {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// A `<qemu:env name="..." value="..."/>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Env {
    pub name: String,
    pub value: String,
}

/// The `<qemu:commandline>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commandline {
    pub args: Vec<Arg>,
    pub envs: Vec<Env>,
}

impl Commandline {
    /// Returns true if the element has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.envs.is_empty()
    }

    /// Returns the argument values in order.
    #[must_use]
    pub fn arg_values(&self) -> Vec<&str> {
        self.args.iter().map(|a| a.value.as_str()).collect()
    }
}

// =============================================================================
// Domain Document
// =============================================================================

/// A parsed libvirt domain description.
///
/// The disk list is read-only: the model can extend the command line and set
/// the QEMU namespace, nothing else.
#[derive(Debug, Clone)]
pub struct DomainDocument {
    disks: Vec<Disk>,
    commandline: Option<Commandline>,
    qemu_namespace: Option<String>,
    source: Vec<u8>,
    source_has_commandline: bool,
}

impl DomainDocument {
    /// Parses a domain XML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDomain`] if the payload is not well-formed XML
    /// or its root element is not `<domain>`.
    pub fn from_xml(bytes: &[u8]) -> Result<Self> {
        let mut doc = Self {
            disks: Vec::new(),
            commandline: None,
            qemu_namespace: None,
            source: bytes.to_vec(),
            source_has_commandline: false,
        };

        let mut reader = Reader::from_reader(bytes);
        let mut stack: Vec<Vec<u8>> = Vec::new();
        let mut seen_root = false;
        let mut disk: Option<Disk> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::InvalidDomain(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                ))
            })?;

            match event {
                Event::Start(e) => {
                    doc.open_element(&e, &stack, seen_root, &mut disk)?;
                    seen_root = true;
                    stack.push(e.name().as_ref().to_vec());
                }
                Event::Empty(e) => {
                    doc.open_element(&e, &stack, seen_root, &mut disk)?;
                    seen_root = true;
                    doc.close_element(e.name().as_ref(), &stack, &mut disk);
                }
                Event::End(e) => {
                    stack.pop();
                    doc.close_element(e.name().as_ref(), &stack, &mut disk);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_root {
            return Err(Error::InvalidDomain("document has no root element".into()));
        }
        if let Some(open) = stack.last() {
            return Err(Error::InvalidDomain(format!(
                "unexpected end of document inside <{}>",
                String::from_utf8_lossy(open)
            )));
        }

        Ok(doc)
    }

    fn open_element(
        &mut self,
        e: &BytesStart<'_>,
        stack: &[Vec<u8>],
        seen_root: bool,
        disk: &mut Option<Disk>,
    ) -> Result<()> {
        let name = e.name();
        let name = name.as_ref();

        match stack {
            [] => {
                if seen_root {
                    return Err(Error::InvalidDomain("multiple root elements".into()));
                }
                if name != DOMAIN_ELEMENT {
                    return Err(Error::InvalidDomain(format!(
                        "expected <domain> root element, found <{}>",
                        String::from_utf8_lossy(name)
                    )));
                }
                self.qemu_namespace = attribute(e, &qemu_xmlns_attribute())?;
            }
            [_] if name == COMMANDLINE_ELEMENT.as_bytes() => {
                if self.source_has_commandline {
                    return Err(Error::InvalidDomain(format!(
                        "duplicate <{COMMANDLINE_ELEMENT}> element"
                    )));
                }
                self.source_has_commandline = true;
                self.commandline = Some(Commandline::default());
            }
            [_, devices] if devices == DEVICES_ELEMENT && name == DISK_ELEMENT => {
                *disk = Some(Disk {
                    device: attribute(e, "device")?,
                    ..Disk::default()
                });
            }
            [_, devices, parent] if devices == DEVICES_ELEMENT && parent == DISK_ELEMENT => {
                if let Some(disk) = disk.as_mut() {
                    if name == TARGET_ELEMENT {
                        disk.target_dev = attribute(e, "dev")?;
                        disk.bus = attribute(e, "bus")?.as_deref().map(DiskBus::parse);
                    } else if name == ALIAS_ELEMENT {
                        disk.alias = attribute(e, "name")?.as_deref().map(Alias::from_xml_name);
                    }
                }
            }
            [_, parent] if parent == COMMANDLINE_ELEMENT.as_bytes() => {
                if let Some(commandline) = self.commandline.as_mut() {
                    if name == ARG_ELEMENT.as_bytes() {
                        commandline
                            .args
                            .push(Arg::new(attribute(e, "value")?.unwrap_or_default()));
                    } else if name == ENV_ELEMENT.as_bytes() {
                        commandline.envs.push(Env {
                            name: attribute(e, "name")?.unwrap_or_default(),
                            value: attribute(e, "value")?.unwrap_or_default(),
                        });
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }

    fn close_element(&mut self, name: &[u8], stack: &[Vec<u8>], disk: &mut Option<Disk>) {
        if let [_, devices] = stack {
            if devices == DEVICES_ELEMENT && name == DISK_ELEMENT {
                if let Some(disk) = disk.take() {
                    self.disks.push(disk);
                }
            }
        }
    }

    /// Disks in document order.
    #[must_use]
    pub fn disks(&self) -> &[Disk] {
        &self.disks
    }

    /// The QEMU command-line extension, if any.
    #[must_use]
    pub fn commandline(&self) -> Option<&Commandline> {
        self.commandline.as_ref()
    }

    /// Returns the command-line extension, creating an empty one if absent.
    pub fn ensure_commandline(&mut self) -> &mut Commandline {
        self.commandline.get_or_insert_with(Commandline::default)
    }

    /// Value of `xmlns:qemu` on the root element, if declared.
    #[must_use]
    pub fn qemu_namespace(&self) -> Option<&str> {
        self.qemu_namespace.as_deref()
    }

    /// Declares `xmlns:qemu` on the root element.
    pub fn set_qemu_namespace(&mut self, uri: impl Into<String>) {
        self.qemu_namespace = Some(uri.into());
    }

    /// Serializes the document back to XML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if writing the output fails.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut reader = Reader::from_reader(self.source.as_slice());
        let mut writer = Writer::new(Vec::with_capacity(self.source.len() + 256));

        let mut depth = 0usize;
        // Nesting level inside the source <qemu:commandline> being replaced.
        let mut skipping: Option<usize> = None;

        loop {
            let event = reader.read_event().map_err(serialization)?;

            if let Some(nested) = skipping.as_mut() {
                match event {
                    Event::Start(_) => *nested += 1,
                    Event::End(_) if *nested == 0 => skipping = None,
                    Event::End(_) => *nested -= 1,
                    Event::Eof => break,
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(e) if depth == 0 => {
                    write(&mut writer, Event::Start(self.root_start(&e)?))?;
                    depth = 1;
                }
                Event::Empty(e) if depth == 0 => {
                    let root = self.root_start(&e)?;
                    match self.non_empty_commandline() {
                        Some(commandline) => {
                            let end = root.to_end().into_owned();
                            write(&mut writer, Event::Start(root))?;
                            write_commandline(&mut writer, commandline)?;
                            write(&mut writer, Event::End(end))?;
                        }
                        None => write(&mut writer, Event::Empty(root))?,
                    }
                }
                Event::Start(e) if depth == 1 && is_commandline(&e) => {
                    if let Some(commandline) = &self.commandline {
                        write_commandline(&mut writer, commandline)?;
                    }
                    skipping = Some(0);
                }
                Event::Empty(e) if depth == 1 && is_commandline(&e) => {
                    if let Some(commandline) = &self.commandline {
                        write_commandline(&mut writer, commandline)?;
                    }
                }
                Event::End(e) if depth == 1 => {
                    if !self.source_has_commandline {
                        if let Some(commandline) = self.non_empty_commandline() {
                            write_commandline(&mut writer, commandline)?;
                        }
                    }
                    write(&mut writer, Event::End(e))?;
                    depth = 0;
                }
                Event::Start(e) => {
                    depth += 1;
                    write(&mut writer, Event::Start(e))?;
                }
                Event::End(e) => {
                    depth -= 1;
                    write(&mut writer, Event::End(e))?;
                }
                Event::Eof => break,
                other => write(&mut writer, other)?,
            }
        }

        Ok(writer.into_inner())
    }

    fn non_empty_commandline(&self) -> Option<&Commandline> {
        self.commandline.as_ref().filter(|c| !c.is_empty())
    }

    /// Rebuilds the root start tag with the model's namespace declaration.
    fn root_start(&self, start: &BytesStart<'_>) -> Result<BytesStart<'static>> {
        let xmlns = qemu_xmlns_attribute();
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut root = BytesStart::new(name);
        let mut declared = false;

        for attr in start.attributes() {
            let attr = attr.map_err(serialization)?;
            if attr.key.as_ref() == xmlns.as_bytes() {
                if let Some(uri) = &self.qemu_namespace {
                    root.push_attribute((xmlns.as_str(), uri.as_str()));
                    declared = true;
                }
                continue;
            }
            let value = double_quoted(attr.value.as_ref());
            root.push_attribute((attr.key.as_ref(), value.as_ref()));
        }

        if !declared {
            if let Some(uri) = &self.qemu_namespace {
                root.push_attribute((xmlns.as_str(), uri.as_str()));
            }
        }

        Ok(root)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn is_commandline(e: &BytesStart<'_>) -> bool {
    e.name().as_ref() == COMMANDLINE_ELEMENT.as_bytes()
}

/// Makes a raw attribute value safe to write between double quotes.
///
/// A single-quoted source value may contain a literal `"`; everything else
/// is kept byte for byte.
fn double_quoted(value: &[u8]) -> Cow<'_, [u8]> {
    if !value.contains(&b'"') {
        return Cow::Borrowed(value);
    }

    let mut out = Vec::with_capacity(value.len() + 8);
    for &b in value {
        if b == b'"' {
            out.extend_from_slice(b"&quot;");
        } else {
            out.push(b);
        }
    }
    Cow::Owned(out)
}

fn qemu_xmlns_attribute() -> String {
    format!("xmlns:{QEMU_NAMESPACE_PREFIX}")
}

/// Reads and unescapes an attribute value.
fn attribute(e: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::InvalidDomain(err.to_string()))?;
        if attr.key.as_ref() == key.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|err| Error::InvalidDomain(err.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn write_commandline(writer: &mut Writer<Vec<u8>>, commandline: &Commandline) -> Result<()> {
    if commandline.is_empty() {
        return write(writer, Event::Empty(BytesStart::new(COMMANDLINE_ELEMENT)));
    }

    write(writer, Event::Start(BytesStart::new(COMMANDLINE_ELEMENT)))?;
    for arg in &commandline.args {
        let element =
            BytesStart::new(ARG_ELEMENT).with_attributes([("value", arg.value.as_str())]);
        write(writer, Event::Empty(element))?;
    }
    for env in &commandline.envs {
        let element = BytesStart::new(ENV_ELEMENT)
            .with_attributes([("name", env.name.as_str()), ("value", env.value.as_str())]);
        write(writer, Event::Empty(element))?;
    }
    write(writer, Event::End(BytesEnd::new(COMMANDLINE_ELEMENT)))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(serialization)
}

fn serialization(err: impl fmt::Display) -> Error {
    Error::Serialization(err.to_string())
}
