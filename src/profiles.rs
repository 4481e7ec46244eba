// Copyright 2023-2026 The Khronos Group Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Profile definitions: file schema, loading, capability merging and
//! validation against the registry.
//!
//! A profile file carries a `profiles` map and a `capabilities` map of
//! reusable fragments. Resolving a profile merges its listed fragments into
//! one [`ProfileCapabilities`] record and checks that everything it
//! references is reachable from its declared API version and extensions.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::registry::{ExtensionKind, Registry, VersionNumber};

/// Ordered JSON object (serde_json is built with `preserve_order`).
pub type ValueMap = Map<String, Value>;

/// Top-level shape of a profile definition file.
#[derive(Debug, Deserialize)]
struct ProfilesFile {
    profiles: IndexMap<String, ProfileEntry>,
    capabilities: IndexMap<String, CapabilityFragment>,
}

/// One unmerged entry of a file's `profiles` map.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileEntry {
    pub version: u32,
    /// ex) "1.2.154"
    #[serde(rename = "api-version")]
    pub api_version: String,
    #[serde(default)]
    pub fallback: Vec<String>,
    /// Names of capability fragments, resolved against the file's pool.
    pub capabilities: Vec<String>,
}

/// A reusable capability block referenced by name from profiles.
/// Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CapabilityFragment {
    /// ex) { "VK_KHR_swapchain": 70 }
    pub extensions: IndexMap<String, u32>,
    /// Feature struct name to member value tree.
    pub features: ValueMap,
    /// Property struct name to member value tree.
    pub properties: ValueMap,
    /// Format name to { property struct name: member value tree }.
    pub formats: ValueMap,
    #[serde(rename = "queueFamiliesProperties")]
    pub queue_families_properties: Vec<Value>,
    #[serde(rename = "memoryProperties")]
    pub memory_properties: ValueMap,
}

/// A profile's full requirement set, merged from its capability fragments.
#[derive(Debug, Clone, Default)]
pub struct ProfileCapabilities {
    /// Every required extension with its spec version, in the order the
    /// fragments introduced them.
    pub extensions: IndexMap<String, u32>,
    pub instance_extensions: IndexMap<String, u32>,
    pub device_extensions: IndexMap<String, u32>,
    pub features: ValueMap,
    pub properties: ValueMap,
    pub formats: ValueMap,
    pub queue_families_properties: Vec<Value>,
    pub memory_properties: ValueMap,
}

impl ProfileCapabilities {
    fn merge_fragment(&mut self, registry: &Registry, fragment: &CapabilityFragment) -> Result<()> {
        self.merge_extensions(registry, fragment)?;
        merge_value_maps(&mut self.features, &fragment.features)?;
        merge_value_maps(&mut self.properties, &fragment.properties)?;
        merge_value_maps(&mut self.formats, &fragment.formats)?;
        self.queue_families_properties
            .extend(fragment.queue_families_properties.iter().cloned());
        merge_value_maps(&mut self.memory_properties, &fragment.memory_properties)?;
        Ok(())
    }

    fn merge_extensions(&mut self, registry: &Registry, fragment: &CapabilityFragment) -> Result<()> {
        for (ext_name, spec_version) in &fragment.extensions {
            let Some(ext) = registry.extensions.get(ext_name) else {
                return Err(Error::dependency(format!(
                    "extension '{ext_name}' does not exist"
                )));
            };
            // Re-inserting an existing key updates the version in place
            // without disturbing its position.
            self.extensions.insert(ext_name.clone(), *spec_version);
            match ext.kind {
                ExtensionKind::Instance => {
                    self.instance_extensions.insert(ext_name.clone(), *spec_version);
                }
                ExtensionKind::Device => {
                    self.device_extensions.insert(ext_name.clone(), *spec_version);
                }
            }
        }
        Ok(())
    }
}

/// A named, versioned bundle of API requirements. Immutable once resolved.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub version: u32,
    /// Full "X.Y.Z" API version string from the profile file.
    pub api_version: String,
    /// The major.minor prefix of `api_version`.
    pub api_version_number: VersionNumber,
    /// Alternative profile names a caller may fall back to.
    pub fallback: Vec<String>,
    /// Preprocessor symbols guarding this profile: the API version macro
    /// first, then one entry per required extension.
    pub requirements: Vec<String>,
    pub capabilities: ProfileCapabilities,
}

impl Profile {
    fn validate_struct_dependencies(&self, registry: &Registry) -> Result<()> {
        for struct_name in self.capabilities.features.keys() {
            self.validate_struct_dependency(registry, struct_name)?;
        }
        for struct_name in self.capabilities.properties.keys() {
            self.validate_struct_dependency(registry, struct_name)?;
        }
        for queue_family in &self.capabilities.queue_families_properties {
            let Value::Object(entry) = queue_family else {
                return Err(Error::conflict(format!(
                    "queueFamiliesProperties entry in profile '{}' is not an object",
                    self.name
                )));
            };
            for struct_name in entry.keys() {
                self.validate_struct_dependency(registry, struct_name)?;
            }
        }
        for struct_name in self.capabilities.memory_properties.keys() {
            self.validate_struct_dependency(registry, struct_name)?;
        }
        Ok(())
    }

    /// The struct must be registered and be defined either by a core
    /// version covered by the profile or by one of its extensions.
    fn validate_struct_dependency(&self, registry: &Registry, struct_name: &str) -> Result<()> {
        let Some(def) = registry.structs.get(struct_name) else {
            return Err(Error::dependency(format!(
                "struct '{struct_name}' in profile '{}' does not exist in the registry",
                self.name
            )));
        };

        let by_version = def
            .defined_by_version
            .is_some_and(|version| version <= self.api_version_number);
        let by_extension = def
            .defined_by_extensions
            .iter()
            .any(|ext| self.capabilities.extensions.contains_key(ext));

        if by_version || by_extension {
            Ok(())
        } else {
            Err(Error::dependency(format!(
                "unexpected required struct '{struct_name}' in profile '{}'",
                self.name
            )))
        }
    }
}

/// Loads every profile file in `dir` and resolves the profiles it defines.
/// Files are visited in file name order so the resulting profile order (and
/// therefore the generated output) does not depend on the platform.
pub fn load_profiles(dir: &Path, registry: &Registry) -> Result<IndexMap<String, Profile>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|source| Error::Io { path: dir.to_path_buf(), source })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().is_some_and(|ext| ext == "json")
        })
        .collect();
    paths.sort();

    let mut profiles = IndexMap::new();
    for path in paths {
        info!("Loading profile file: '{}'", path.display());
        let text = fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        register_file(registry, &mut profiles, &path, &text)?;
    }
    Ok(profiles)
}

pub(crate) fn register_file(
    registry: &Registry,
    profiles: &mut IndexMap<String, Profile>,
    path: &Path,
    text: &str,
) -> Result<()> {
    let file: ProfilesFile = serde_json::from_str(text).map_err(|source| Error::ProfileJson {
        path: path.to_path_buf(),
        source,
    })?;

    for (name, entry) in &file.profiles {
        info!("Registering profile '{name}'");
        if profiles.contains_key(name) {
            return Err(Error::conflict(format!(
                "profile '{name}' is defined more than once"
            )));
        }
        let profile = resolve_profile(registry, name, entry, &file.capabilities)?;
        profiles.insert(name.clone(), profile);
    }
    Ok(())
}

/// Merges the fragments listed by `entry` and validates the result.
pub fn resolve_profile(
    registry: &Registry,
    name: &str,
    entry: &ProfileEntry,
    fragments: &IndexMap<String, CapabilityFragment>,
) -> Result<Profile> {
    let mut capabilities = ProfileCapabilities::default();
    for fragment_name in &entry.capabilities {
        let Some(fragment) = fragments.get(fragment_name) else {
            return Err(Error::dependency(format!(
                "capability '{fragment_name}' needed by profile '{name}' is missing"
            )));
        };
        capabilities.merge_fragment(registry, fragment)?;
    }

    let Some(api_version_number) = VersionNumber::from_api_version(&entry.api_version) else {
        return Err(Error::dependency(format!(
            "invalid version number '{}' in profile '{name}'",
            entry.api_version
        )));
    };
    let Some(version) = registry.versions.get(&api_version_number) else {
        return Err(Error::dependency(format!(
            "no version '{api_version_number}' found in registry required by profile '{name}'"
        )));
    };

    let mut requirements = Vec::with_capacity(1 + capabilities.extensions.len());
    requirements.push(version.name.clone());
    requirements.extend(capabilities.extensions.keys().cloned());

    let profile = Profile {
        name: name.to_string(),
        version: entry.version,
        api_version: entry.api_version.clone(),
        api_version_number,
        fallback: entry.fallback.clone(),
        requirements,
        capabilities,
    };
    profile.validate_struct_dependencies(registry)?;
    Ok(profile)
}

/// Deep-merges one capability section into another.
///
/// Objects merge recursively, arrays concatenate, scalars overwrite.
/// Anything else is a conflict.
fn merge_value_maps(dst: &mut ValueMap, src: &ValueMap) -> Result<()> {
    for (key, val) in src {
        match val {
            Value::Object(src_obj) => {
                let entry = dst
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(ValueMap::new()));
                match entry {
                    Value::Object(dst_obj) => merge_value_maps(dst_obj, src_obj)?,
                    other => return Err(merge_conflict(key, other, val)),
                }
            }
            Value::Array(src_items) => {
                let entry = dst
                    .entry(key.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                match entry {
                    Value::Array(dst_items) => dst_items.extend(src_items.iter().cloned()),
                    other => return Err(merge_conflict(key, other, val)),
                }
            }
            _ => {
                if let Some(existing) = dst.get(key) {
                    if value_kind(existing) != value_kind(val) {
                        return Err(merge_conflict(key, existing, val));
                    }
                }
                dst.insert(key.clone(), val.clone());
            }
        }
    }
    Ok(())
}

fn merge_conflict(key: &str, dst: &Value, src: &Value) -> Error {
    Error::conflict(format!(
        "data type mismatch for '{key}' (src is '{}', dst is '{}')",
        value_kind(src),
        value_kind(dst)
    ))
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY_XML: &str = r#"
<registry>
    <types>
        <type category="struct" name="VkPhysicalDeviceFeatures">
            <member><type>VkBool32</type> <name>geometryShader</name></member>
            <member><type>VkBool32</type> <name>tessellationShader</name></member>
        </type>
        <type category="struct" name="VkPhysicalDeviceVulkan12Features" structextends="VkPhysicalDeviceFeatures2,VkDeviceCreateInfo">
            <member values="VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_VULKAN_1_2_FEATURES"><type>VkStructureType</type> <name>sType</name></member>
            <member><type>void</type>* <name>pNext</name></member>
            <member><type>VkBool32</type> <name>drawIndirectCount</name></member>
        </type>
        <type category="struct" name="VkPhysicalDevicePortabilitySubsetFeaturesKHR" structextends="VkPhysicalDeviceFeatures2,VkDeviceCreateInfo">
            <member values="VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_PORTABILITY_SUBSET_FEATURES_KHR"><type>VkStructureType</type> <name>sType</name></member>
            <member><type>void</type>* <name>pNext</name></member>
            <member><type>VkBool32</type> <name>events</name></member>
        </type>
        <type category="struct" name="VkQueueFamilyProperties">
            <member limittype="bitmask"><type>VkQueueFlags</type> <name>queueFlags</name></member>
            <member limittype="max"><type>uint32_t</type> <name>queueCount</name></member>
        </type>
    </types>
    <feature api="vulkan" name="VK_VERSION_1_0" number="1.0">
        <require>
            <type name="VkPhysicalDeviceFeatures"/>
            <type name="VkQueueFamilyProperties"/>
        </require>
    </feature>
    <feature api="vulkan" name="VK_VERSION_1_2" number="1.2">
        <require>
            <type name="VkPhysicalDeviceVulkan12Features"/>
        </require>
    </feature>
    <extensions>
        <extension name="VK_KHR_swapchain" number="2" type="device" supported="vulkan">
            <require>
                <enum value="&quot;VK_KHR_swapchain&quot;" name="VK_KHR_SWAPCHAIN_EXTENSION_NAME"/>
            </require>
        </extension>
        <extension name="VK_KHR_get_surface_capabilities2" number="120" type="instance" supported="vulkan">
            <require>
                <enum value="&quot;VK_KHR_get_surface_capabilities2&quot;" name="VK_KHR_GET_SURFACE_CAPABILITIES_2_EXTENSION_NAME"/>
            </require>
        </extension>
        <extension name="VK_KHR_portability_subset" number="164" type="device" supported="vulkan">
            <require>
                <enum value="&quot;VK_KHR_portability_subset&quot;" name="VK_KHR_PORTABILITY_SUBSET_EXTENSION_NAME"/>
                <type name="VkPhysicalDevicePortabilitySubsetFeaturesKHR"/>
            </require>
        </extension>
    </extensions>
</registry>
"#;

    fn registry() -> Registry {
        Registry::parse(REGISTRY_XML).expect("registry parses")
    }

    fn load(registry: &Registry, text: &str) -> Result<IndexMap<String, Profile>> {
        let mut profiles = IndexMap::new();
        register_file(registry, &mut profiles, Path::new("test.json"), text)?;
        Ok(profiles)
    }

    #[test]
    fn merges_features_from_multiple_fragments() {
        let reg = registry();
        let profiles = load(
            &reg,
            r#"{
                "profiles": {
                    "VP_TEST_basic": {
                        "version": 1,
                        "api-version": "1.2.0",
                        "capabilities": ["geometry", "tessellation"]
                    }
                },
                "capabilities": {
                    "geometry": {
                        "features": { "VkPhysicalDeviceFeatures": { "geometryShader": true } }
                    },
                    "tessellation": {
                        "features": { "VkPhysicalDeviceFeatures": { "tessellationShader": true } }
                    }
                }
            }"#,
        )
        .expect("profile resolves");

        let features = &profiles["VP_TEST_basic"].capabilities.features;
        let members = features["VkPhysicalDeviceFeatures"]
            .as_object()
            .expect("merged into one object");
        assert_eq!(members.get("geometryShader"), Some(&Value::Bool(true)));
        assert_eq!(members.get("tessellationShader"), Some(&Value::Bool(true)));
    }

    #[test]
    fn classifies_extensions_by_registry_kind() {
        let reg = registry();
        let profiles = load(
            &reg,
            r#"{
                "profiles": {
                    "VP_TEST_ext": {
                        "version": 1,
                        "api-version": "1.0.0",
                        "capabilities": ["exts"]
                    }
                },
                "capabilities": {
                    "exts": {
                        "extensions": {
                            "VK_KHR_swapchain": 70,
                            "VK_KHR_get_surface_capabilities2": 1
                        }
                    }
                }
            }"#,
        )
        .expect("profile resolves");

        let caps = &profiles["VP_TEST_ext"].capabilities;
        assert!(caps.device_extensions.contains_key("VK_KHR_swapchain"));
        assert!(!caps.instance_extensions.contains_key("VK_KHR_swapchain"));
        assert!(caps.instance_extensions.contains_key("VK_KHR_get_surface_capabilities2"));

        // every extension lands in exactly one of the two kind maps
        assert_eq!(
            caps.extensions.len(),
            caps.instance_extensions.len() + caps.device_extensions.len()
        );

        // version macro first, then the extensions in fragment order
        assert_eq!(
            profiles["VP_TEST_ext"].requirements,
            [
                "VK_VERSION_1_0",
                "VK_KHR_swapchain",
                "VK_KHR_get_surface_capabilities2"
            ]
        );
    }

    #[test]
    fn later_fragment_wins_scalars_and_keeps_order() {
        let reg = registry();
        let profiles = load(
            &reg,
            r#"{
                "profiles": {
                    "VP_TEST_order": {
                        "version": 1,
                        "api-version": "1.0.0",
                        "capabilities": ["first", "second"]
                    }
                },
                "capabilities": {
                    "first": {
                        "extensions": { "VK_KHR_swapchain": 69, "VK_KHR_get_surface_capabilities2": 1 }
                    },
                    "second": {
                        "extensions": { "VK_KHR_swapchain": 70 }
                    }
                }
            }"#,
        )
        .expect("profile resolves");

        let caps = &profiles["VP_TEST_order"].capabilities;
        assert_eq!(caps.extensions["VK_KHR_swapchain"], 70);
        // re-merging did not move the extension behind the later one
        assert_eq!(
            caps.extensions.keys().collect::<Vec<_>>(),
            ["VK_KHR_swapchain", "VK_KHR_get_surface_capabilities2"]
        );
    }

    #[test]
    fn scalar_object_mismatch_is_a_conflict() {
        let reg = registry();
        let result = load(
            &reg,
            r#"{
                "profiles": {
                    "VP_TEST_conflict": {
                        "version": 1,
                        "api-version": "1.0.0",
                        "capabilities": ["a", "b"]
                    }
                },
                "capabilities": {
                    "a": { "features": { "VkPhysicalDeviceFeatures": { "geometryShader": true } } },
                    "b": { "features": { "VkPhysicalDeviceFeatures": { "geometryShader": { "nested": 1 } } } }
                }
            }"#,
        );
        assert!(matches!(result, Err(Error::ProfileConflict(_))));
    }

    #[test]
    fn unknown_extension_is_a_dependency_error() {
        let reg = registry();
        let result = load(
            &reg,
            r#"{
                "profiles": {
                    "VP_TEST_unknown": {
                        "version": 1,
                        "api-version": "1.0.0",
                        "capabilities": ["bad"]
                    }
                },
                "capabilities": {
                    "bad": { "extensions": { "VK_NV_does_not_exist": 1 } }
                }
            }"#,
        );
        assert!(matches!(result, Err(Error::ProfileDependency(_))));
    }

    #[test]
    fn struct_without_reachable_definition_is_rejected() {
        let reg = registry();
        // VkPhysicalDevicePortabilitySubsetFeaturesKHR is only defined by
        // VK_KHR_portability_subset, which the profile does not require.
        let result = load(
            &reg,
            r#"{
                "profiles": {
                    "VP_TEST_dep": {
                        "version": 1,
                        "api-version": "1.2.0",
                        "capabilities": ["portability"]
                    }
                },
                "capabilities": {
                    "portability": {
                        "features": {
                            "VkPhysicalDevicePortabilitySubsetFeaturesKHR": { "events": true }
                        }
                    }
                }
            }"#,
        );
        assert!(matches!(result, Err(Error::ProfileDependency(_))));

        // requiring the extension makes the same profile valid
        let profiles = load(
            &reg,
            r#"{
                "profiles": {
                    "VP_TEST_dep": {
                        "version": 1,
                        "api-version": "1.2.0",
                        "capabilities": ["portability"]
                    }
                },
                "capabilities": {
                    "portability": {
                        "extensions": { "VK_KHR_portability_subset": 1 },
                        "features": {
                            "VkPhysicalDevicePortabilitySubsetFeaturesKHR": { "events": true }
                        }
                    }
                }
            }"#,
        );
        assert!(profiles.is_ok());
    }

    #[test]
    fn version_defined_struct_needs_covering_api_version() {
        let reg = registry();
        // VkPhysicalDeviceVulkan12Features needs api-version >= 1.2
        let result = load(
            &reg,
            r#"{
                "profiles": {
                    "VP_TEST_v12": {
                        "version": 1,
                        "api-version": "1.0.0",
                        "capabilities": ["v12"]
                    }
                },
                "capabilities": {
                    "v12": {
                        "features": { "VkPhysicalDeviceVulkan12Features": { "drawIndirectCount": true } }
                    }
                }
            }"#,
        );
        assert!(matches!(result, Err(Error::ProfileDependency(_))));
    }

    #[test]
    fn missing_fragment_is_fatal() {
        let reg = registry();
        let result = load(
            &reg,
            r#"{
                "profiles": {
                    "VP_TEST_missing": {
                        "version": 1,
                        "api-version": "1.0.0",
                        "capabilities": ["nope"]
                    }
                },
                "capabilities": {}
            }"#,
        );
        assert!(matches!(result, Err(Error::ProfileDependency(_))));
    }

    #[test]
    fn duplicate_profiles_are_rejected() {
        let reg = registry();
        let mut profiles = IndexMap::new();
        let text = r#"{
            "profiles": {
                "VP_TEST_dup": { "version": 1, "api-version": "1.0.0", "capabilities": [] }
            },
            "capabilities": {}
        }"#;
        register_file(&reg, &mut profiles, Path::new("a.json"), text).expect("first file loads");
        let result = register_file(&reg, &mut profiles, Path::new("b.json"), text);
        assert!(matches!(result, Err(Error::ProfileConflict(_))));
    }

    #[test]
    fn queue_family_structs_are_validated() {
        let reg = registry();
        let profiles = load(
            &reg,
            r#"{
                "profiles": {
                    "VP_TEST_queues": {
                        "version": 1,
                        "api-version": "1.0.0",
                        "capabilities": ["queues"]
                    }
                },
                "capabilities": {
                    "queues": {
                        "queueFamiliesProperties": [
                            { "VkQueueFamilyProperties": { "queueFlags": ["VK_QUEUE_GRAPHICS_BIT"], "queueCount": 1 } }
                        ]
                    }
                }
            }"#,
        )
        .expect("profile resolves");
        assert_eq!(
            profiles["VP_TEST_queues"].capabilities.queue_families_properties.len(),
            1
        );
    }

    #[test]
    fn array_sections_concatenate() {
        let reg = registry();
        let profiles = load(
            &reg,
            r#"{
                "profiles": {
                    "VP_TEST_arrays": {
                        "version": 1,
                        "api-version": "1.0.0",
                        "capabilities": ["a", "b"]
                    }
                },
                "capabilities": {
                    "a": {
                        "formats": {
                            "VK_FORMAT_R8G8B8A8_UNORM": {
                                "VkFormatProperties": {
                                    "optimalTilingFeatures": ["VK_FORMAT_FEATURE_TRANSFER_SRC_BIT"]
                                }
                            }
                        }
                    },
                    "b": {
                        "formats": {
                            "VK_FORMAT_R8G8B8A8_UNORM": {
                                "VkFormatProperties": {
                                    "optimalTilingFeatures": ["VK_FORMAT_FEATURE_TRANSFER_DST_BIT"]
                                }
                            }
                        }
                    }
                }
            }"#,
        )
        .expect("profile resolves");

        let formats = &profiles["VP_TEST_arrays"].capabilities.formats;
        let features = formats["VK_FORMAT_R8G8B8A8_UNORM"]["VkFormatProperties"]
            ["optimalTilingFeatures"]
            .as_array()
            .expect("concatenated list");
        assert_eq!(features.len(), 2);
    }
}
