// Copyright 2023-2026 The Khronos Group Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory model of the Vulkan XML registry.
//!
//! [`Registry::load`] parses vk.xml into platforms, core versions,
//! extensions and structure definitions, resolves struct aliases, and
//! applies the known `limittype` corrections. The model is immutable once
//! loaded; everything downstream (profile resolution and code generation)
//! only reads it.

use std::fmt;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use roxmltree::Node;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Known `limittype` bugs in vk.xml, patched after parsing.
/// `(struct, member, corrected limittype)`
const LIMIT_TYPE_CORRECTIONS: &[(&str, &str, &str)] = &[
    ("VkPhysicalDeviceLimits", "bufferImageGranularity", "min"),
    ("VkPhysicalDeviceLimits", "subPixelPrecisionBits", "max"),
    ("VkPhysicalDeviceLimits", "subTexelPrecisionBits", "max"),
    ("VkPhysicalDeviceLimits", "mipmapPrecisionBits", "max"),
    ("VkPhysicalDeviceLimits", "viewportSubPixelBits", "max"),
    ("VkPhysicalDeviceLimits", "minMemoryMapAlignment", "max"),
    ("VkPhysicalDeviceLimits", "minTexelBufferOffsetAlignment", "min"),
    ("VkPhysicalDeviceLimits", "minUniformBufferOffsetAlignment", "min"),
    ("VkPhysicalDeviceLimits", "minStorageBufferOffsetAlignment", "min"),
    ("VkPhysicalDeviceLimits", "subPixelInterpolationOffsetBits", "max"),
    ("VkPhysicalDeviceLimits", "timestampPeriod", "IGNORE"),
    ("VkPhysicalDeviceLimits", "nonCoherentAtomSize", "min"),
    ("VkPhysicalDeviceLimits", "maxColorAttachments", "max"),
    ("VkPhysicalDeviceLimits", "pointSizeGranularity", "min"),
    ("VkPhysicalDeviceLimits", "lineWidthGranularity", "min"),
    ("VkPhysicalDeviceVulkan11Properties", "subgroupSize", "IGNORE"),
    (
        "VkPhysicalDevicePortabilitySubsetPropertiesKHR",
        "minVertexInputBindingStrideAlignment",
        "min",
    ),
];

/// The boolean type some registry members mislabel as a bitmask.
const BOOL_TYPE: &str = "VkBool32";

/// `<platform>`
#[derive(Debug, Clone)]
pub struct Platform {
    /// ex) android
    pub name: String,
    /// Preprocessor guard, ex) VK_USE_PLATFORM_ANDROID_KHR
    pub protect: String,
}

/// A core version number in "major.minor" form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionNumber {
    pub major: u32,
    pub minor: u32,
}

impl VersionNumber {
    /// Parses a full `major.minor` string. The major part must not have a
    /// leading zero.
    pub fn parse(text: &str) -> Option<Self> {
        let (major, minor) = text.split_once('.')?;
        if !is_version_component(major) || minor.is_empty() || !minor.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(VersionNumber {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }

    /// Extracts the `major.minor` prefix of a profile API version such as
    /// "1.2.154". The minor part must be followed by a non-digit.
    pub fn from_api_version(text: &str) -> Option<Self> {
        let (major, rest) = text.split_once('.')?;
        if !is_version_component(major) {
            return None;
        }
        let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 || digits == rest.len() {
            return None;
        }
        Some(VersionNumber {
            major: major.parse().ok()?,
            minor: rest[..digits].parse().ok()?,
        })
    }
}

fn is_version_component(text: &str) -> bool {
    !text.is_empty() && !text.starts_with('0') && text.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// `<feature>` which represents a core version.
#[derive(Debug, Clone)]
pub struct Version {
    /// ex) VK_VERSION_1_2
    pub name: String,
    pub number: VersionNumber,
    /// sType enum renames introduced by promoting a type into this version.
    /// Keyed by the canonical enum, valued with the promoted name.
    pub s_type_aliases: IndexMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionKind {
    Instance,
    Device,
}

/// `<extension>`
#[derive(Debug, Clone)]
pub struct Extension {
    /// ex) VK_KHR_swapchain
    pub name: String,
    /// Enumerant prefix, ex) VK_KHR_SWAPCHAIN
    /// (the name enum without its `_EXTENSION_NAME` suffix)
    pub upper_case_name: String,
    pub kind: ExtensionKind,
    /// ex) android
    pub platform: Option<String>,
    pub s_type_aliases: IndexMap<String, String>,
}

/// `<member>` of a struct type. sType and pNext are never recorded.
#[derive(Debug, Clone)]
pub struct StructMember {
    pub name: String,
    /// Base type name, ex) uint32_t, VkSampleCountFlags
    pub type_name: String,
    /// ex) 'max', 'bitmask', 'range'
    pub limit_type: Option<String>,
    /// Fixed-size array member (the text after the name starts with '[')
    pub is_array: bool,
}

/// Handle to the member table and alias list shared by a struct and all of
/// its aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableId(usize);

/// `<type category="struct">`
#[derive(Debug, Clone)]
pub struct StructDef {
    /// ex) VkPhysicalDeviceVulkan11Features
    pub name: String,
    /// ex) VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_VULKAN_1_1_FEATURES
    pub s_type: Option<String>,
    /// Struct names this struct extends through pNext chaining.
    pub extends: Vec<String>,
    /// First core version whose `require` section lists this struct.
    pub defined_by_version: Option<VersionNumber>,
    /// Every extension whose `require` section lists this struct.
    pub defined_by_extensions: Vec<String>,
    table: TableId,
}

#[derive(Debug, Clone)]
struct StructTable {
    members: IndexMap<String, StructMember>,
    aliases: Vec<String>,
}

/// The parsed registry. Maps preserve document order, which is observable
/// in the generated output.
#[derive(Debug, Clone)]
pub struct Registry {
    pub platforms: IndexMap<String, Platform>,
    pub versions: IndexMap<VersionNumber, Version>,
    pub extensions: IndexMap<String, Extension>,
    pub structs: IndexMap<String, StructDef>,
    tables: Vec<StructTable>,
}

impl Registry {
    pub fn load(path: &Path) -> Result<Registry> {
        info!("Loading registry file: '{}'", path.display());
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Registry::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Registry> {
        let doc = roxmltree::Document::parse(text)?;
        let root = doc.root_element();

        let mut registry = Registry {
            platforms: IndexMap::new(),
            versions: IndexMap::new(),
            extensions: IndexMap::new(),
            structs: IndexMap::new(),
            tables: Vec::new(),
        };
        registry.parse_platforms(root)?;
        registry.parse_versions(root)?;
        registry.parse_extensions(root)?;
        registry.parse_structs(root);
        registry.parse_prerequisites(root);
        registry.parse_struct_aliases(root)?;
        registry.apply_workarounds();
        Ok(registry)
    }

    /// Members of `def`, shared between the struct and its aliases.
    pub fn members(&self, def: &StructDef) -> &IndexMap<String, StructMember> {
        &self.tables[def.table.0].members
    }

    /// All names of the alias group `def` belongs to, the base name first.
    pub fn aliases(&self, def: &StructDef) -> &[String] {
        &self.tables[def.table.0].aliases
    }

    fn push_table(&mut self, members: IndexMap<String, StructMember>, name: &str) -> TableId {
        self.tables.push(StructTable {
            members,
            aliases: vec![name.to_string()],
        });
        TableId(self.tables.len() - 1)
    }

    fn parse_platforms(&mut self, root: Node<'_, '_>) -> Result<()> {
        for platforms in children_named(root, "platforms") {
            for plat in children_named(platforms, "platform") {
                let name = required_attribute(plat, "name")?;
                let protect = required_attribute(plat, "protect")?;
                self.platforms.insert(
                    name.to_string(),
                    Platform {
                        name: name.to_string(),
                        protect: protect.to_string(),
                    },
                );
            }
        }
        Ok(())
    }

    fn parse_versions(&mut self, root: Node<'_, '_>) -> Result<()> {
        for feature in children_named(root, "feature") {
            let number = feature.attribute("number").unwrap_or_default();
            let Some(parsed) = VersionNumber::parse(number) else {
                return Err(Error::registry(format!(
                    "unsupported feature with number '{number}'"
                )));
            };
            let name = required_attribute(feature, "name")?;
            self.versions.insert(
                parsed,
                Version {
                    name: name.to_string(),
                    number: parsed,
                    s_type_aliases: structure_type_aliases(feature),
                },
            );
        }
        Ok(())
    }

    fn parse_extensions(&mut self, root: Node<'_, '_>) -> Result<()> {
        for extensions in children_named(root, "extensions") {
            for ext in children_named(extensions, "extension") {
                // Only care about enabled extensions.
                if ext.attribute("supported") != Some("vulkan") {
                    continue;
                }
                let name = required_attribute(ext, "name")?;

                // Find the name enum. Lower/upper case inconsistencies make
                // the quoted value the only reliable anchor.
                let quoted = format!("\"{name}\"");
                let upper_case_name = children_named(ext, "require")
                    .flat_map(|require| children_named(require, "enum"))
                    .filter(|en| en.attribute("value") == Some(quoted.as_str()))
                    .find_map(|en| en.attribute("name")?.strip_suffix("_EXTENSION_NAME"));
                let Some(upper_case_name) = upper_case_name else {
                    return Err(Error::registry(format!(
                        "cannot find name enum for extension '{name}'"
                    )));
                };

                let kind = match ext.attribute("type") {
                    Some("instance") => ExtensionKind::Instance,
                    Some("device") => ExtensionKind::Device,
                    other => {
                        return Err(Error::registry(format!(
                            "extension '{name}' has invalid type '{}'",
                            other.unwrap_or_default()
                        )));
                    }
                };

                self.extensions.insert(
                    name.to_string(),
                    Extension {
                        name: name.to_string(),
                        upper_case_name: upper_case_name.to_string(),
                        kind,
                        platform: ext.attribute("platform").map(str::to_string),
                        s_type_aliases: structure_type_aliases(ext),
                    },
                );
            }
        }
        Ok(())
    }

    fn parse_structs(&mut self, root: Node<'_, '_>) {
        for types in children_named(root, "types") {
            for ty in children_named(types, "type") {
                if ty.attribute("category") != Some("struct") {
                    continue;
                }
                let Some(name) = ty.attribute("name") else {
                    continue;
                };

                let extends = ty
                    .attribute("structextends")
                    .map(|list| list.split(',').map(str::to_string).collect())
                    .unwrap_or_default();

                let mut s_type = None;
                let mut members = IndexMap::new();
                for member in children_named(ty, "member") {
                    let Some(name_node) =
                        member.children().find(|n| n.has_tag_name("name"))
                    else {
                        continue;
                    };
                    let Some(member_name) = name_node.text() else {
                        continue;
                    };

                    if member_name == "sType" {
                        s_type = member.attribute("values").map(str::to_string);
                    }
                    // Only record real members.
                    if member_name == "sType" || member_name == "pNext" {
                        continue;
                    }

                    let type_name = member
                        .children()
                        .find(|n| n.has_tag_name("type"))
                        .and_then(|n| n.text())
                        .unwrap_or_default()
                        .to_string();
                    // Fixed-size arrays put the bracket in the text right
                    // after the member name.
                    let is_array = name_node
                        .next_sibling()
                        .and_then(|n| n.text())
                        .is_some_and(|tail| tail.starts_with('['));

                    members.insert(
                        member_name.to_string(),
                        StructMember {
                            name: member_name.to_string(),
                            type_name,
                            limit_type: member.attribute("limittype").map(str::to_string),
                            is_array,
                        },
                    );
                }

                let table = self.push_table(members, name);
                self.structs.insert(
                    name.to_string(),
                    StructDef {
                        name: name.to_string(),
                        s_type,
                        extends,
                        defined_by_version: None,
                        defined_by_extensions: Vec::new(),
                        table,
                    },
                );
            }
        }
    }

    /// Stamps each struct with the version and extensions whose `require`
    /// sections list it. The first requiring version wins; every requiring
    /// extension is collected.
    fn parse_prerequisites(&mut self, root: Node<'_, '_>) {
        for feature in children_named(root, "feature") {
            let number = feature
                .attribute("number")
                .and_then(VersionNumber::parse);
            for name in required_type_names(feature) {
                if let Some(def) = self.structs.get_mut(name) {
                    if def.defined_by_version.is_none() {
                        def.defined_by_version = number;
                    }
                }
            }
        }

        for extensions in children_named(root, "extensions") {
            for ext in children_named(extensions, "extension") {
                let Some(ext_name) = ext.attribute("name") else {
                    continue;
                };
                for name in required_type_names(ext) {
                    if let Some(def) = self.structs.get_mut(name) {
                        def.defined_by_extensions.push(ext_name.to_string());
                    }
                }
            }
        }
    }

    fn parse_struct_aliases(&mut self, root: Node<'_, '_>) -> Result<()> {
        for types in children_named(root, "types") {
            for ty in children_named(types, "type") {
                if ty.attribute("category") != Some("struct") {
                    continue;
                }
                let (Some(name), Some(alias_of)) =
                    (ty.attribute("name"), ty.attribute("alias"))
                else {
                    continue;
                };
                self.alias_struct(name, alias_of)?;
            }
        }
        Ok(())
    }

    fn alias_struct(&mut self, name: &str, alias_of: &str) -> Result<()> {
        let Some(base) = self.structs.get(alias_of) else {
            return Err(Error::registry(format!(
                "failed to find alias '{alias_of}' of struct '{name}'"
            )));
        };
        let base_table = base.table;
        let base_extends = base.extends.clone();
        let base_s_type = base.s_type.clone();

        let def = self.structs.get(name).ok_or_else(|| {
            Error::registry(format!("aliasing struct '{name}' was never declared"))
        })?;
        let version_limit = def.defined_by_version;
        let extension_sources = def.defined_by_extensions.clone();

        // The alias carries its own sType enumerant, introduced either by
        // the core version that promoted it or by one of its extensions.
        let s_type = match &base_s_type {
            Some(base_s_type) => Some(self.resolve_alias_s_type(
                name,
                alias_of,
                base_s_type,
                version_limit,
                &extension_sources,
            )?),
            None => None,
        };

        self.tables[base_table.0].aliases.push(name.to_string());
        if let Some(def) = self.structs.get_mut(name) {
            def.extends = base_extends;
            def.table = base_table;
            if s_type.is_some() {
                def.s_type = s_type;
            }
        }
        Ok(())
    }

    fn resolve_alias_s_type(
        &self,
        name: &str,
        alias_of: &str,
        base_s_type: &str,
        version_limit: Option<VersionNumber>,
        extension_sources: &[String],
    ) -> Result<String> {
        if let Some(limit) = version_limit {
            for (number, version) in &self.versions {
                if *number <= limit {
                    if let Some(alias) = version.s_type_aliases.get(base_s_type) {
                        return Ok(alias.clone());
                    }
                }
            }
        }
        for ext_name in extension_sources {
            if let Some(ext) = self.extensions.get(ext_name) {
                if let Some(alias) = ext.s_type_aliases.get(base_s_type) {
                    return Ok(alias.clone());
                }
            }
        }
        Err(Error::registry(format!(
            "could not find sType enum of alias '{alias_of}' of struct '{name}'"
        )))
    }

    /// Applies [`LIMIT_TYPE_CORRECTIONS`], then rewrites every
    /// `bitmask`-annotated [`BOOL_TYPE`] member to `noauto`. Idempotent.
    fn apply_workarounds(&mut self) {
        for (struct_name, member_name, limit_type) in LIMIT_TYPE_CORRECTIONS {
            let Some(def) = self.structs.get(*struct_name) else {
                warn!("limittype correction target '{struct_name}' not in registry");
                continue;
            };
            let table = def.table;
            match self.tables[table.0].members.get_mut(*member_name) {
                Some(member) => member.limit_type = Some((*limit_type).to_string()),
                None => {
                    warn!("limittype correction target '{struct_name}::{member_name}' not in registry");
                }
            }
        }

        // A boolean cannot be compared bit-wise.
        for table in &mut self.tables {
            for member in table.members.values_mut() {
                if member.limit_type.as_deref() == Some("bitmask") && member.type_name == BOOL_TYPE
                {
                    member.limit_type = Some("noauto".to_string());
                }
            }
        }
    }
}

fn children_named<'a, 'i>(
    node: Node<'a, 'i>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children().filter(move |n| n.has_tag_name(name))
}

fn required_attribute<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name).ok_or_else(|| {
        Error::registry(format!(
            "<{}> element without '{name}' attribute",
            node.tag_name().name()
        ))
    })
}

/// Names of all `require/type` children of a feature or extension.
fn required_type_names<'a>(scope: Node<'a, '_>) -> impl Iterator<Item = &'a str> {
    children_named(scope, "require")
        .flat_map(|require| children_named(require, "type"))
        .filter_map(|ty| ty.attribute("name"))
}

/// Collects `require/enum[@alias]` entries naming structure-type enums.
fn structure_type_aliases(scope: Node<'_, '_>) -> IndexMap<String, String> {
    let mut aliases = IndexMap::new();
    for require in children_named(scope, "require") {
        for en in children_named(require, "enum") {
            if let (Some(name), Some(alias)) = (en.attribute("name"), en.attribute("alias")) {
                if name.starts_with("VK_STRUCTURE_TYPE_") {
                    aliases.insert(alias.to_string(), name.to_string());
                }
            }
        }
    }
    aliases
}
