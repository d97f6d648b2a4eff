//! Loads the versioned schema lookup tables an offline model walk produced
//! and serves the merged, query-ready view of them.
//!
//! Three JSON tables back a model version `X.Y.Z`:
//! `v_X_Y_Z_object_info.json` (type guid to raw type record),
//! `v_X_Y_Z_guid_to_storage_location.json` (package and type guids to path
//! segments under the model root) and `v_X_Y_Z_short_name_to_guid.json`
//! (package short name to package guid).
//!
//! Supertype inheritance is resolved here, once, at load time: a type's own
//! key declarations win over its supertypes' and nearer ancestors win over
//! farther ones. Cyclic supertype graphs are rejected outright.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::SchemaLoadError;

/// How a key gets its value out of an exo-link source element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Plain value, found as an attribute or an embedded child element.
    Attribute,
    /// Reference to another top object, resolved to a composite key.
    Role,
}

impl KeyKind {
    fn from_model_type(model_type: &str) -> Self {
        if model_type == "MetaRole" {
            KeyKind::Role
        } else {
            KeyKind::Attribute
        }
    }
}

/// On-disk record shape written by the model walk.
#[derive(Debug, Clone, Deserialize)]
struct RawTypeRecord {
    guid: String,
    name: String,
    #[serde(default)]
    supertype_guids: Vec<String>,
    parent_guid: String,
    #[serde(default)]
    containment: Vec<String>,
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    key_type_guids: HashMap<String, String>,
    #[serde(default)]
    key_model_types: HashMap<String, String>,
    #[serde(default)]
    key_defaults: HashMap<String, serde_json::Value>,
}

/// A storable type with its key tables fully merged down the supertype
/// chain.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub guid: String,
    pub name: String,
    pub supertype_guids: Vec<String>,
    pub parent_package_guid: String,
    /// Path segments under the model root where instances are stored.
    pub containment: Vec<String>,
    /// Key names in declaration order; filename key segments follow it.
    pub key_names: Vec<String>,
    key_type_guids: HashMap<String, String>,
    key_kinds: HashMap<String, KeyKind>,
    key_defaults: HashMap<String, String>,
}

impl TypeDescriptor {
    pub fn key_type_guid(&self, key: &str) -> Option<&str> {
        self.key_type_guids.get(key).map(String::as_str)
    }

    pub fn key_kind(&self, key: &str) -> KeyKind {
        self.key_kinds
            .get(key)
            .copied()
            .unwrap_or(KeyKind::Attribute)
    }

    pub fn key_default(&self, key: &str) -> Option<&str> {
        self.key_defaults.get(key).map(String::as_str)
    }
}

/// The merged schema view a run queries.
#[derive(Debug)]
pub struct SchemaIndex {
    types_by_guid: HashMap<String, TypeDescriptor>,
    short_name_to_guid: HashMap<String, String>,
    guid_to_short_name: HashMap<String, String>,
    object_name_to_guid: HashMap<String, String>,
    guid_to_storage_location: HashMap<String, Vec<String>>,
}

impl SchemaIndex {
    /// Loads and merges the three tables for `model_version` from `dir`.
    pub fn load(dir: &Path, model_version: &str) -> Result<Self, SchemaLoadError> {
        let prefix = format!("v_{}", model_version.replace('.', "_"));

        let object_info_path = dir.join(format!("{prefix}_object_info.json"));
        let storage_path = dir.join(format!("{prefix}_guid_to_storage_location.json"));
        let short_names_path = dir.join(format!("{prefix}_short_name_to_guid.json"));

        if !object_info_path.exists() || !storage_path.exists() || !short_names_path.exists() {
            return Err(SchemaLoadError::MissingTables {
                version: model_version.to_string(),
                dir: dir.to_path_buf(),
            });
        }

        let raw_types: HashMap<String, RawTypeRecord> = read_table(&object_info_path)?;
        let guid_to_storage_location: HashMap<String, Vec<String>> = read_table(&storage_path)?;
        let short_name_to_guid: HashMap<String, String> = read_table(&short_names_path)?;

        Self::build(raw_types, guid_to_storage_location, short_name_to_guid)
    }

    fn build(
        raw_types: HashMap<String, RawTypeRecord>,
        guid_to_storage_location: HashMap<String, Vec<String>>,
        short_name_to_guid: HashMap<String, String>,
    ) -> Result<Self, SchemaLoadError> {
        if let Some(guid) = find_supertype_cycle(&raw_types) {
            return Err(SchemaLoadError::CyclicHierarchy { guid });
        }

        let types_by_guid: HashMap<String, TypeDescriptor> = raw_types
            .keys()
            .map(|guid| (guid.clone(), merge_type(guid, &raw_types)))
            .collect();

        let guid_to_short_name: HashMap<String, String> = short_name_to_guid
            .iter()
            .map(|(short, guid)| (guid.clone(), short.clone()))
            .collect();

        let mut object_name_to_guid = HashMap::new();
        for (guid, descriptor) in &types_by_guid {
            if let Some(short) = guid_to_short_name.get(&descriptor.parent_package_guid) {
                object_name_to_guid.insert(format!("{short}.{}", descriptor.name), guid.clone());
            }
        }

        Ok(Self {
            types_by_guid,
            short_name_to_guid,
            guid_to_short_name,
            object_name_to_guid,
            guid_to_storage_location,
        })
    }

    pub fn type_by_guid(&self, guid: &str) -> Option<&TypeDescriptor> {
        self.types_by_guid.get(guid)
    }

    /// Resolves a root-element name like `NMR.NmrProject` to the type guid.
    pub fn guid_for_object_name(&self, object_name: &str) -> Option<&str> {
        self.object_name_to_guid.get(object_name).map(String::as_str)
    }

    pub fn package_guid(&self, short_name: &str) -> Option<&str> {
        self.short_name_to_guid.get(short_name).map(String::as_str)
    }

    pub fn package_short_name(&self, guid: &str) -> Option<&str> {
        self.guid_to_short_name.get(guid).map(String::as_str)
    }

    /// Expected path segments under the model root for a package or type.
    pub fn containment_for(&self, guid: &str) -> Option<&[String]> {
        self.guid_to_storage_location
            .get(guid)
            .map(Vec::as_slice)
    }
}

fn read_table<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SchemaLoadError> {
    let text = fs::read_to_string(path).map_err(|source| SchemaLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| SchemaLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Kahn's algorithm over the type-to-supertype edges. Returns a guid inside
/// a cycle when one exists, preferring the lexicographically smallest so the
/// error is stable.
fn find_supertype_cycle(raw_types: &HashMap<String, RawTypeRecord>) -> Option<String> {
    let mut indegree: HashMap<&str, usize> =
        raw_types.keys().map(|guid| (guid.as_str(), 0)).collect();
    for record in raw_types.values() {
        for supertype in &record.supertype_guids {
            if let Some(count) = indegree.get_mut(supertype.as_str()) {
                *count += 1;
            }
        }
    }

    let mut ready: VecDeque<&str> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(guid, _)| *guid)
        .collect();

    let mut processed = 0;
    while let Some(guid) = ready.pop_front() {
        processed += 1;
        for supertype in &raw_types[guid].supertype_guids {
            if let Some(count) = indegree.get_mut(supertype.as_str()) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(supertype);
                }
            }
        }
    }

    if processed == raw_types.len() {
        None
    } else {
        indegree
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(guid, _)| guid.to_string())
            .min()
    }
}

/// Breadth-first walk from the type through its supertypes; the first
/// declaration seen for a key wins, so own entries beat inherited ones and
/// nearer ancestors beat farther ones. Supertype guids the tables don't
/// know are skipped.
fn merge_type(guid: &str, raw_types: &HashMap<String, RawTypeRecord>) -> TypeDescriptor {
    let own = &raw_types[guid];

    let mut key_names: Vec<String> = Vec::new();
    let mut key_type_guids: HashMap<String, String> = HashMap::new();
    let mut key_kinds: HashMap<String, KeyKind> = HashMap::new();
    let mut key_defaults: HashMap<String, String> = HashMap::new();

    let mut queue: VecDeque<&str> = VecDeque::from([guid]);
    let mut seen: HashSet<&str> = HashSet::new();
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current) {
            continue;
        }
        let Some(record) = raw_types.get(current) else {
            continue;
        };

        if key_names.is_empty() && !record.keys.is_empty() {
            key_names = record.keys.clone();
        }
        for (key, type_guid) in &record.key_type_guids {
            key_type_guids
                .entry(key.clone())
                .or_insert_with(|| type_guid.clone());
        }
        for (key, model_type) in &record.key_model_types {
            key_kinds
                .entry(key.clone())
                .or_insert_with(|| KeyKind::from_model_type(model_type));
        }
        for (key, default) in &record.key_defaults {
            key_defaults
                .entry(key.clone())
                .or_insert_with(|| default_to_string(default));
        }

        queue.extend(record.supertype_guids.iter().map(String::as_str));
    }

    TypeDescriptor {
        guid: own.guid.clone(),
        name: own.name.clone(),
        supertype_guids: own.supertype_guids.clone(),
        parent_package_guid: own.parent_guid.clone(),
        containment: own.containment.clone(),
        key_names,
        key_type_guids,
        key_kinds,
        key_defaults,
    }
}

fn default_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
