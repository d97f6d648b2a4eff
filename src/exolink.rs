//! Exo-link extraction from the memops root document.
//!
//! The root document carries a stub for every top object in the project:
//! an `IMPL.GuidString` leaf whose parent tag `<pkg>.exo-<Type>` names the
//! linked type, plus a source element `<pkg>.<Type>` holding the object's
//! key data. Extraction walks the leaves in document order, resolves each
//! link's keys against the schema and produces the ordered set the rest of
//! the run works through.

use std::collections::HashMap;
use std::path::Path;

use roxmltree::{Document, Node};

use crate::document;
use crate::error::{CheckError, ErrorCode, Fault, Result};
use crate::formats;
use crate::report::RunReport;
use crate::schema::{KeyKind, SchemaIndex, TypeDescriptor};

/// Tag of the guid leaves that mark exo links.
pub const GUID_LEAF_TAG: &str = "IMPL.GuidString";
/// Root-element tag a qualifying memops root document carries.
pub const MEMOPS_ROOT_TAG: &str = "IMPL.MemopsRoot";

const PROGRAM_VERSION_HOLDER_TAG: &str = "IMPL.DataObject._objectVersion";
const PROGRAM_VERSION_VALUE_TAG: &str = "IMPL.String";

/// One exo link read from the root document.
#[derive(Debug, Clone)]
pub struct ExoLink {
    pub guid: String,
    pub short_package_name: Option<String>,
    pub type_name: Option<String>,
    /// Schema guid of the linked type; set once key resolution ran.
    pub type_guid: Option<String>,
    /// Key names in schema order.
    pub key_names: Vec<String>,
    /// Key values in `key_names` order; `None` marks a key the extraction
    /// could not resolve.
    pub keys: Vec<(String, Option<String>)>,
    /// False when the parent tag of the guid leaf was malformed or named a
    /// type the schema does not know.
    pub valid: bool,
}

impl ExoLink {
    fn unresolved(guid: &str) -> Self {
        ExoLink {
            guid: guid.to_string(),
            short_package_name: None,
            type_name: None,
            type_guid: None,
            key_names: Vec::new(),
            keys: Vec::new(),
            valid: false,
        }
    }

    /// `SHORT.Type` label, with placeholders for unresolved links.
    pub fn short_name(&self) -> String {
        format!(
            "{}.{}",
            self.short_package_name.as_deref().unwrap_or("*unknown-package*"),
            self.type_name.as_deref().unwrap_or("*unknown-class*"),
        )
    }

    /// Value of the named key, when resolved.
    pub fn key_value(&self, name: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// True once key resolution ran and produced a value for every key.
    pub fn is_fully_keyed(&self) -> bool {
        self.type_guid.is_some() && self.keys.iter().all(|(_, value)| value.is_some())
    }

    /// Keys rendered for listing notes, unresolved values as `-`.
    pub fn keys_display(&self) -> String {
        let entries: Vec<String> = self
            .keys
            .iter()
            .map(|(name, value)| format!("{name}: {}", value.as_deref().unwrap_or("-")))
            .collect();
        format!("{{{}}}", entries.join(", "))
    }
}

/// Exo links in the order the root document declares them, indexed by guid.
#[derive(Debug, Default)]
pub struct ExoLinkSet {
    links: Vec<ExoLink>,
    by_guid: HashMap<String, usize>,
}

impl ExoLinkSet {
    pub fn new() -> Self {
        ExoLinkSet::default()
    }

    /// Registers a guid leaf. A guid keeps its first-seen position; a
    /// repeated leaf overwrites the link's type pair.
    fn register(&mut self, guid: &str, pair: Option<(String, String)>) {
        let index = match self.by_guid.get(guid) {
            Some(&index) => index,
            None => {
                let index = self.links.len();
                self.by_guid.insert(guid.to_string(), index);
                self.links.push(ExoLink::unresolved(guid));
                index
            }
        };
        let link = &mut self.links[index];
        match pair {
            Some((short, type_name)) => {
                link.short_package_name = Some(short);
                link.type_name = Some(type_name);
                link.valid = true;
            }
            None => {
                link.short_package_name = None;
                link.type_name = None;
                link.valid = false;
            }
        }
    }

    pub fn get(&self, guid: &str) -> Option<&ExoLink> {
        self.by_guid.get(guid).map(|&index| &self.links[index])
    }

    pub fn contains_guid(&self, guid: &str) -> bool {
        self.by_guid.contains_key(guid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExoLink> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Checks the storage unit and version attributes of the root document and
/// notes what they say. Records the model version on the report; a root
/// whose version cannot be determined stops the run.
pub fn note_root_metadata(
    doc: &Document<'_>,
    root_path: &Path,
    report: &mut RunReport,
) -> Result<()> {
    let root_name = document::file_name(root_path);

    let unit = doc
        .descendants()
        .find(|node| node.is_element() && node.tag_name().name() == document::STORAGE_UNIT_TAG)
        .ok_or_else(|| {
            Fault::new(
                ErrorCode::NoStorageUnit,
                root_path.display().to_string(),
                format!(
                    "expected a storage unit but found no {} element in {}",
                    document::STORAGE_UNIT_TAG,
                    root_path.display(),
                ),
            )
        })?;
    let unit_tag = unit.tag_name().name();

    let version = unit.attribute("release").ok_or_else(|| {
        CheckError::stop(
            ErrorCode::RootModelVersionMissing,
            root_path.display().to_string(),
            format!("in the file {root_name} the attribute release is missing in the element {unit_tag}"),
        )
    })?;
    if !formats::is_valid_version(version) {
        return Err(Fault::with_messages(
            ErrorCode::RootModelVersionBad,
            root_path.display().to_string(),
            vec![
                format!("in the file {root_name} the attribute release [{version}]"),
                "is not a valid version number it should be of the form <major>.<minor>.<patch> where <major>,".to_string(),
                "<minor> can only contain digits and <patch> can contain digits with a possible appended letter".to_string(),
                "can't continue as can't determine model version".to_string(),
            ],
        )
        .into());
    }
    report.note(format!("model version that saved this file appears to be {version}"));
    report.model_version = Some(version.to_string());

    match unit.attribute("time") {
        Some(time) if formats::is_canonical_timestamp(time) => {
            report.note(format!("memops root data was stored at {time}"));
        }
        None => {
            let message = format!(
                "in the file {root_name} the attribute time is missing in the element {unit_tag}"
            );
            report.warning(
                ErrorCode::RootFileTimeAttribMissing,
                root_path.display().to_string(),
                message.clone(),
            );
            report.note(format!("{message} [warning]"));
        }
        Some(time) => {
            let message = format!(
                "in the file {root_name} the attribute time [{time}] is badly formatted in the element {unit_tag}"
            );
            report.warning(
                ErrorCode::RootFileTimeAttribBadFormat,
                root_path.display().to_string(),
                message.clone(),
            );
            report.note(format!("{message} [warning]"));
        }
    }

    let program_version = doc
        .descendants()
        .find(|node| node.is_element() && node.tag_name().name() == PROGRAM_VERSION_HOLDER_TAG)
        .and_then(|holder| {
            holder
                .descendants()
                .find(|node| node.is_element() && node.tag_name().name() == PROGRAM_VERSION_VALUE_TAG)
        })
        .and_then(|node| node.text())
        .map(str::trim)
        .filter(|text| !text.is_empty());
    match program_version {
        Some(text) => {
            report.note(format!(
                "ccpnmr program version that saved this file appears to be {text}"
            ));
        }
        None => {
            return Err(CheckError::stop(
                ErrorCode::RootHasNoModelVersion,
                root_path.display().to_string(),
                format!(
                    "no ccpnmr program version information found in the memops root file {}",
                    root_path.display(),
                ),
            ));
        }
    }

    Ok(())
}

/// Collects the exo links the root document declares and resolves their
/// keys. Individual bad links are reported and left unresolved; extraction
/// itself never stops the run.
pub fn extract(
    doc: &Document<'_>,
    root_path: &Path,
    schema: &SchemaIndex,
    report: &mut RunReport,
) -> ExoLinkSet {
    let root_name = document::file_name(root_path);
    let mut set = ExoLinkSet::new();

    for leaf in doc
        .descendants()
        .filter(|node| node.is_element() && node.tag_name().name() == GUID_LEAF_TAG)
    {
        let guid = leaf.text().unwrap_or("");
        let pair = leaf
            .parent()
            .filter(Node::is_element)
            .and_then(|parent| parse_link_pair(parent.tag_name().name()));
        if pair.is_none() {
            let message = format!(
                "the guid {guid} in the file {root_name} appears to contain a badly formatted exo link"
            );
            report.error(
                ErrorCode::BadlyFormattedRootExoLink,
                root_path.display().to_string(),
                message.clone(),
            );
            report.note(format!("Error: {message}"));
        }
        set.register(guid, pair);
    }

    report.note(format!(
        "searching for top object exo links, found {}",
        set.len()
    ));
    report.note("analysing exo links");

    // (link index, key name) pairs whose raw value is a guid that still
    // needs expanding into the target object's composite key.
    let mut role_keys: Vec<(usize, String)> = Vec::new();

    for index in 0..set.links.len() {
        let (guid, pair) = {
            let link = &set.links[index];
            let pair = link
                .short_package_name
                .clone()
                .zip(link.type_name.clone());
            (link.guid.clone(), pair)
        };
        let Some((short, type_name)) = pair else {
            continue;
        };
        let link_name = format!("{short}.{type_name}");

        let sources: Vec<Node> = doc
            .descendants()
            .filter(|node| {
                node.is_element()
                    && node.tag_name().name() == link_name
                    && node.attribute("guid") == Some(guid.as_str())
            })
            .collect();
        if sources.is_empty() {
            let message = format!(
                "in the file {}\nlink {link_name} with guid {guid} is missing its source element",
                root_path.display(),
            );
            report.error(
                ErrorCode::ExoLinkSourceMissing,
                root_path.display().to_string(),
                message.clone(),
            );
            report.note(format!("{message} [error]"));
            continue;
        }
        if sources.len() > 1 {
            let message = format!(
                "in the file {}\nlink {link_name} with guid {guid} has too many link elements [{}] there should be 1",
                root_path.display(),
                sources.len(),
            );
            report.error(
                ErrorCode::ExoLinkTooManySources,
                root_path.display().to_string(),
                message.clone(),
            );
            report.note(format!("{message} [error]"));
            continue;
        }
        let source = sources[0];

        let descriptor = schema
            .guid_for_object_name(&link_name)
            .and_then(|type_guid| schema.type_by_guid(type_guid));
        let Some(descriptor) = descriptor else {
            let message = format!(
                "the link {link_name} with guid {guid} in the file {root_name} does not name a known top object type"
            );
            report.error(
                ErrorCode::BadlyFormattedRootExoLink,
                root_path.display().to_string(),
                message.clone(),
            );
            report.note(format!("Error: {message}"));
            let link = &mut set.links[index];
            link.short_package_name = None;
            link.type_name = None;
            link.valid = false;
            continue;
        };

        let mut keys: Vec<(String, Option<String>)> = Vec::new();
        for key in &descriptor.key_names {
            let mut value = if let Some(attr) = source.attribute(key.as_str()) {
                Some(attr.to_string())
            } else if let Some(default) = descriptor.key_default(key) {
                Some(default.to_string())
            } else if descriptor.key_kind(key) == KeyKind::Role {
                role_keys.push((index, key.clone()));
                resolve_role_key(
                    source, &link_name, key, descriptor, schema, &guid, root_path, &root_name,
                    report,
                )
            } else {
                resolve_embedded_key(
                    source, &link_name, key, descriptor, schema, &guid, root_path, &root_name,
                    report,
                )
            };

            // Free-text key values are sanitized the same way the model
            // sanitizes them when it builds filenames.
            if let Some(current) = &value {
                let is_line = descriptor
                    .key_type_guid(key)
                    .and_then(|type_guid| schema.type_by_guid(type_guid))
                    .is_some_and(|key_type| key_type.name == "Line");
                if is_line {
                    value = Some(formats::sanitize_for_filename(current));
                }
            }
            keys.push((key.clone(), value));
        }

        let link = &mut set.links[index];
        link.type_guid = Some(descriptor.guid.clone());
        link.key_names = descriptor.key_names.clone();
        link.keys = keys;
    }

    finalize_role_keys(&mut set, schema, &role_keys);

    for (i, link) in set.iter().enumerate() {
        let number = i + 1;
        if link.is_fully_keyed() {
            report.note_plain(format!(
                "{number:>3}. {} {} [keys: {}]",
                link.guid,
                link.short_name(),
                link.keys_display(),
            ));
        } else {
            report.note_plain(format!(
                "{number:>3}. {} {} - exo link detected but is incorrectly defined in root [error]",
                link.guid,
                link.short_name(),
            ));
        }
    }

    set
}

/// Splits a guid-leaf parent tag `<SHORT>.<marker>-<Type>` into its short
/// package name and type name. The marker spelling is not checked.
fn parse_link_pair(tag: &str) -> Option<(String, String)> {
    let (short, marker) = tag.split_once('.')?;
    if marker.contains('.') {
        return None;
    }
    let (_marker, type_name) = marker.split_once('-')?;
    if type_name.contains('-') {
        return None;
    }
    Some((short.to_string(), type_name.to_string()))
}

/// `SHORT.TypeName` tag of a key's value elements, from the key's type guid.
fn qualified_key_type_name(
    descriptor: &TypeDescriptor,
    key: &str,
    schema: &SchemaIndex,
) -> Option<(String, String)> {
    let key_type = descriptor
        .key_type_guid(key)
        .and_then(|type_guid| schema.type_by_guid(type_guid))?;
    let short = schema.package_short_name(&key_type.parent_package_guid)?;
    Some((short.to_string(), key_type.name.clone()))
}

/// A key whose value is stored in child elements instead of an attribute:
/// `<link.key><SHORT.KeyType>value</SHORT.KeyType></link.key>`, one child at
/// each level.
#[allow(clippy::too_many_arguments)]
fn resolve_embedded_key(
    source: Node<'_, '_>,
    link_name: &str,
    key: &str,
    descriptor: &TypeDescriptor,
    schema: &SchemaIndex,
    guid: &str,
    root_path: &Path,
    root_name: &str,
    report: &mut RunReport,
) -> Option<String> {
    let (short, type_name) = qualified_key_type_name(descriptor, key, schema)?;
    let value_tag = format!("{short}.{type_name}");
    let holder_tag = format!("{link_name}.{key}");

    let holders: Vec<Node> = source
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == holder_tag)
        .collect();
    if holders.len() != 1 {
        let message = format!(
            "in the file {root_name} in the link {link_name} with guid {guid}\nthe key {key} has the wrong number of children ({}) in its main element",
            holders.len(),
        );
        report.error(
            ErrorCode::BadlyFormattedExoLinkKeyData,
            root_path.display().to_string(),
            message.clone(),
        );
        report.note(message);
        return None;
    }

    let values: Vec<Node> = holders[0]
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == value_tag)
        .collect();
    if values.len() != 1 {
        let message = format!(
            "in the file {root_name} the link {link_name} with guid {guid}\nhas the wrong number of children for key {key} [{}]",
            values.len(),
        );
        report.error(
            ErrorCode::BadlyFormattedExoLinkKeyData,
            root_path.display().to_string(),
            message.clone(),
        );
        report.note(message);
        return None;
    }
    values[0].text().map(str::to_string)
}

/// A key that is itself an exo link to another top object. The raw value is
/// the target's guid; `finalize_role_keys` expands it once all links are in.
#[allow(clippy::too_many_arguments)]
fn resolve_role_key(
    source: Node<'_, '_>,
    link_name: &str,
    key: &str,
    descriptor: &TypeDescriptor,
    schema: &SchemaIndex,
    guid: &str,
    root_path: &Path,
    root_name: &str,
    report: &mut RunReport,
) -> Option<String> {
    let (short, type_name) = qualified_key_type_name(descriptor, key, schema)?;
    let wrapper_tag = format!("{short}.exo-{type_name}");
    let holder_tag = format!("{link_name}.{key}");

    let holder = source
        .descendants()
        .find(|node| node.is_element() && node.tag_name().name() == holder_tag);
    let wrappers: Vec<Node> = holder
        .map(|holder| {
            holder
                .descendants()
                .filter(|node| node.is_element() && node.tag_name().name() == wrapper_tag)
                .collect()
        })
        .unwrap_or_default();
    if wrappers.is_empty() {
        let message = format!(
            "in the file {root_name} in the link {link_name} with guid {guid}\nthe key {key} has no children in its main element"
        );
        report.error(
            ErrorCode::BadlyFormattedRoleExoLinkKeyData,
            root_path.display().to_string(),
            message.clone(),
        );
        report.note(message);
        return None;
    }
    if wrappers.len() > 1 {
        let message = format!(
            "in the file {root_name} in the link {link_name} with guid {guid}\nthe key {key} has the wrong number of children ({}) in its main element it should be 1",
            wrappers.len(),
        );
        report.error(
            ErrorCode::BadlyFormattedRoleExoLinkKeyData,
            root_path.display().to_string(),
            message.clone(),
        );
        report.note(message);
        return None;
    }

    let leaf = wrappers[0]
        .descendants()
        .find(|node| node.is_element() && node.tag_name().name() == GUID_LEAF_TAG);
    let Some(leaf) = leaf else {
        let message = format!(
            "in the file {root_name} in the link {link_name} with guid {guid}\nthe key element {key} doesn't have children"
        );
        report.error(
            ErrorCode::BadlyFormattedRoleExoLinkKeyData,
            root_path.display().to_string(),
            message.clone(),
        );
        report.note(message);
        return None;
    };
    leaf.text().map(str::to_string)
}

/// Replaces each role key's raw target guid with the target's composite key
/// `_<containment>_<TypeName>___<key values>___`, or clears it when the
/// target link was not fully extracted.
fn finalize_role_keys(set: &mut ExoLinkSet, schema: &SchemaIndex, role_keys: &[(usize, String)]) {
    for (index, key_name) in role_keys {
        let target_guid = set.links[*index].key_value(key_name).map(str::to_string);
        let composite = target_guid.and_then(|target| role_composite(set, schema, &target));
        if let Some(entry) = set.links[*index]
            .keys
            .iter_mut()
            .find(|(name, _)| name == key_name)
        {
            entry.1 = composite;
        }
    }
}

fn role_composite(set: &ExoLinkSet, schema: &SchemaIndex, target_guid: &str) -> Option<String> {
    let target = set.get(target_guid)?;
    let descriptor = target
        .type_guid
        .as_deref()
        .and_then(|type_guid| schema.type_by_guid(type_guid))?;

    let mut values = Vec::with_capacity(descriptor.key_names.len());
    for name in &descriptor.key_names {
        values.push(target.key_value(name)?.to_string());
    }
    let mut segments = descriptor.containment.clone();
    segments.push(descriptor.name.clone());
    Some(format!("_{}___{}___", segments.join("_"), values.join("__")))
}

/// Flags resolved key values that stray outside the ccpn character set.
pub fn check_key_character_set(links: &ExoLinkSet, root_path: &Path, report: &mut RunReport) {
    struct Offender<'a> {
        guid: &'a str,
        short_name: String,
        key_name: &'a str,
        value: &'a str,
        pointers: String,
    }

    let mut offenders: Vec<Offender> = Vec::new();
    for link in links.iter() {
        for (name, value) in &link.keys {
            let Some(value) = value.as_deref() else {
                continue;
            };
            if let Some(pointers) = formats::value_outside_letter_set(value, "") {
                offenders.push(Offender {
                    guid: &link.guid,
                    short_name: link.short_name(),
                    key_name: name,
                    value,
                    pointers,
                });
            }
        }
    }
    if offenders.is_empty() {
        return;
    }

    let detail = format!(
        "in the file {}\nthere are exo link keys [{}] which contain characters outside the ccpn character set",
        root_path.display(),
        offenders.len(),
    );
    let guids: Vec<&str> = offenders.iter().map(|offender| offender.guid).collect();
    report.error(
        ErrorCode::NonCcpnAsciiCharacter,
        guids.join(", "),
        detail.clone(),
    );
    report.note(format!("{detail} which are listed below [error]"));
    for (i, offender) in offenders.iter().enumerate() {
        let number = i + 1;
        report.note(format!(
            "{number:>3}. [{key}]. {guid} {short}  {key}: {value} [error]\nkey: {value}\n_____{pointers}",
            key = offender.key_name,
            guid = offender.guid,
            short = offender.short_name,
            value = offender.value,
            pointers = offender.pointers,
        ));
    }
}
