// Copyright 2023-2026 The Khronos Group Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Generation of the profiles library sources.
//!
//! [`Emitter::emit`] is a pure function of the registry and the resolved
//! profile set: it assembles the public C header, the inline C++ header and
//! the C++ implementation file from fixed text blocks plus per-profile
//! tables and function bodies. The per-member assignment and comparison
//! code is synthesized by walking registry struct definitions alongside the
//! profile's value trees.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::profiles::{value_kind, Profile, ValueMap};
use crate::registry::{ExtensionKind, Registry, StructDef};

/// Memory-type tables are modeled and merged but not part of the shipped
/// library yet. Flipping this emits `_*_MEMORY_TYPES`, the corresponding
/// device-support checks and `vpGetProfileMemoryTypes`.
const EMIT_MEMORY_TYPES: bool = false;

const COPYRIGHT_HEADER: &str = r#"/**
 * Copyright (c) 2021-2022 LunarG, Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License")
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 *
 * DO NOT EDIT: This file is generated.
 */
"#;

const H_HEADER: &str = r#"
#ifndef VULKAN_PROFILES_
#define VULKAN_PROFILES_ 1

#define VPAPI_ATTR

#ifdef __cplusplus
    extern "C" {
#endif

#include <vulkan/vulkan_core.h>
#ifdef VK_ENABLE_BETA_EXTENSIONS
#include <vulkan/vulkan_beta.h>

#endif
"#;

const H_FOOTER: &str = r#"
#ifdef __cplusplus
}
#endif

#endif //VULKAN_PROFILES_
"#;

const CPP_HEADER: &str = r#"
#include <vulkan/vulkan_profiles.h>
#include <stddef.h>
#include <string.h>
#include <assert.h>
#include <stdint.h>
#include <vector>
#include <algorithm>

#define _vpArraySize(arr) static_cast<uint32_t>(sizeof(arr) / sizeof(arr[0]))
"#;

const HPP_HEADER: &str = r#"
#ifndef VULKAN_PROFILES_
#define VULKAN_PROFILES_ 1

#define VPAPI_ATTR inline

#include <vulkan/vulkan_core.h>
#ifdef VK_ENABLE_BETA_EXTENSIONS
#include <vulkan/vulkan_beta.h>
#endif
#include <stddef.h>
#include <string.h>
#include <assert.h>
#include <stdint.h>
#include <vector>
#include <algorithm>

#define _vpArraySize(arr) static_cast<uint32_t>(sizeof(arr) / sizeof(arr[0]))
"#;

const HPP_FOOTER: &str = r#"
#endif //VULKAN_PROFILES_
"#;

const API_DEFS: &str = r#"
#define VP_MAX_PROFILE_NAME_SIZE 256U

typedef struct VpProfileProperties {
    char        profileName[VP_MAX_PROFILE_NAME_SIZE];
    uint32_t    specVersion;
} VpProfileProperties;

typedef enum VpInstanceCreateFlagBits {
    VP_INSTANCE_CREATE_MERGE_EXTENSIONS_BIT = 0x00000001,
    VP_INSTANCE_CREATE_OVERRIDE_EXTENSIONS_BIT = 0x00000002,
    VP_INSTANCE_CREATE_OVERRIDE_API_VERSION_BIT = 0x00000004,

    VP_INSTANCE_CREATE_FLAG_BITS_MAX_ENUM = 0x7FFFFFFF
} VpInstanceCreateFlagBits;
typedef VkFlags VpInstanceCreateFlags;

typedef struct VpInstanceCreateInfo {
    const VkInstanceCreateInfo* pCreateInfo;
    const VpProfileProperties*  pProfile;
    VpInstanceCreateFlags       flags;
} VpInstanceCreateInfo;

typedef enum VpDeviceCreateFlagBits {
    VP_DEVICE_CREATE_DISABLE_ROBUST_BUFFER_ACCESS_BIT = 0x00000001,
    VP_DEVICE_CREATE_DISABLE_ROBUST_IMAGE_ACCESS_BIT = 0x00000002,
    VP_DEVICE_CREATE_MERGE_EXTENSIONS_BIT = 0x00000004,
    VP_DEVICE_CREATE_OVERRIDE_EXTENSIONS_BIT = 0x00000008,

    VP_DEVICE_CREATE_DISABLE_ROBUST_ACCESS_BIT =
        VP_DEVICE_CREATE_DISABLE_ROBUST_BUFFER_ACCESS_BIT | VP_DEVICE_CREATE_DISABLE_ROBUST_IMAGE_ACCESS_BIT,
    VP_DEVICE_CREATE_FLAG_BITS_MAX_ENUM = 0x7FFFFFFF
} VpDeviceCreateFlagBits;
typedef VkFlags VpDeviceCreateFlags;

typedef struct VpDeviceCreateInfo {
    const VkDeviceCreateInfo*   pCreateInfo;
    const VpProfileProperties*  pProfile;
    VpDeviceCreateFlags         flags;
} VpDeviceCreateInfo;

// Query the list of available profiles in the library
VPAPI_ATTR VkResult vpGetProfiles(uint32_t *pPropertyCount, VpProfileProperties *pProperties);

// List the recommended fallback profiles of a profile
VPAPI_ATTR VkResult vpGetProfileFallbacks(const VpProfileProperties *pProfile, uint32_t *pPropertyCount, VpProfileProperties *pProperties);

// Check whether a profile is supported at the instance level
VPAPI_ATTR VkResult vpGetInstanceProfileSupport(const char *pLayerName, const VpProfileProperties *pProfile, VkBool32 *pSupported);

// Create a VkInstance with the profile instance extensions enabled
VPAPI_ATTR VkResult vpCreateInstance(const VpInstanceCreateInfo *pCreateInfo,
                                     const VkAllocationCallbacks *pAllocator, VkInstance *pInstance);

// Check whether a profile is supported by the physical device
VPAPI_ATTR VkResult vpGetDeviceProfileSupport(VkPhysicalDevice physicalDevice, const VpProfileProperties *pProfile, VkBool32 *pSupported);

// Create a VkDevice with the profile features and device extensions enabled
VPAPI_ATTR VkResult vpCreateDevice(VkPhysicalDevice physicalDevice, const VpDeviceCreateInfo *pCreateInfo,
                                   const VkAllocationCallbacks *pAllocator, VkDevice *pDevice);

// Query the list of instance extensions of a profile
VPAPI_ATTR VkResult vpGetProfileInstanceExtensionProperties(const VpProfileProperties *pProfile, uint32_t *pPropertyCount,
                                                            VkExtensionProperties *pProperties);

// Query the list of device extensions of a profile
VPAPI_ATTR VkResult vpGetProfileDeviceExtensionProperties(const VpProfileProperties *pProfile, uint32_t *pPropertyCount,
                                                          VkExtensionProperties *pProperties);

// Fill the pNext Vulkan structures with the requirements of a profile
VPAPI_ATTR void vpGetProfileStructures(const VpProfileProperties *pProfile, void *pNext);

typedef enum VpStructureArea {
    VP_STRUCTURE_FEATURES = 0,  // A Vulkan structure specified to expose features
    VP_STRUCTURE_PROPERTIES     // A Vulkan structure specified to expose properties
} VpStructureArea;

typedef struct VpStructureProperties {
    VkStructureType type;
    VpStructureArea area;
} VpStructureProperties;

// Query the list of structures used to specify requirements of a profile
VPAPI_ATTR VkResult vpGetProfileStructureProperties(const VpProfileProperties *pProfile, uint32_t *pPropertyCount,
                                                    VpStructureProperties *pProperties);

// Query the list of formats with specified requirements by a profile
VPAPI_ATTR VkResult vpGetProfileFormats(const VpProfileProperties *pProfile, uint32_t *pFormatCount, VkFormat *pFormats);

// Query the requirements of a format for a profile
VPAPI_ATTR void vpGetProfileFormatProperties(const VpProfileProperties *pProfile, VkFormat format, void *pNext);

// Query the requirements of queue families by a profile
VPAPI_ATTR VkResult vpGetProfileQueueFamilies(const VpProfileProperties *pProfile, uint32_t *pPropertyCount, VkQueueFamilyProperties *pProperties);
"#;

const PRIVATE_IMPL_BODY: &str = r#"
struct _vpProfileDesc {
    const char*                     name;
    uint32_t                        specVersion;
    uint32_t                        minApiVersion;
    const VkExtensionProperties*    pInstanceExtensions;
    uint32_t                        instanceExtensionCount;
    const VkExtensionProperties*    pDeviceExtensions;
    uint32_t                        deviceExtensionCount;
};

VPAPI_ATTR const _vpProfileDesc* _vpGetProfileDesc(const _vpProfileDesc* pProfiles, const char name[VP_MAX_PROFILE_NAME_SIZE]) {
    while (pProfiles->name != nullptr) {
        if (strncmp(pProfiles->name, name, VP_MAX_PROFILE_NAME_SIZE) == 0) return pProfiles;
        pProfiles++;
    }
    return nullptr;
}

VPAPI_ATTR bool _vpCheckExtension(const VkExtensionProperties *supportedProperties, size_t supportedSize,
                                  const char *requestedExtension, uint32_t expectedVersion = 0) {
    for (size_t i = 0, n = supportedSize; i < n; ++i) {
        if (strcmp(supportedProperties[i].extensionName, requestedExtension) == 0) {
            return supportedProperties[i].specVersion > expectedVersion;
        }
    }
    return false;
}

VPAPI_ATTR bool _vpCheckMemoryProperty(const VkPhysicalDeviceMemoryProperties &memoryProperties,
                                       const VkMemoryPropertyFlags &memoryPropertyFlags) {
    assert(&memoryProperties != nullptr);

    for (uint32_t i = 0, n = memoryProperties.memoryTypeCount; i < n; ++i) {
        if ((memoryProperties.memoryTypes[i].propertyFlags & memoryPropertyFlags) == memoryPropertyFlags) return true;
    }

    return false;
}

VPAPI_ATTR bool _vpCheckFormatProperty(const VkFormatProperties2 *deviceProps, const VpFormatProperties &profileProps) {
    if ((deviceProps->formatProperties.linearTilingFeatures & profileProps.linearTilingFeatures) !=
        profileProps.linearTilingFeatures) {
        return false;
    } else if ((deviceProps->formatProperties.optimalTilingFeatures & profileProps.optimalTilingFeatures) !=
               profileProps.optimalTilingFeatures) {
        return false;
    } else if ((deviceProps->formatProperties.bufferFeatures & profileProps.bufferFeatures) != profileProps.bufferFeatures) {
        return false;
    }

    return true;
}

VPAPI_ATTR bool _vpCheckQueueFamilyProperty(const VkQueueFamilyProperties *queueFamilyProperties,
                                            uint32_t queueFamilyPropertiesCount,
                                            const VkQueueFamilyProperties &profileQueueFamilyPropertie) {
    assert(queueFamilyProperties != nullptr);

    for (uint32_t i = 0, n = queueFamilyPropertiesCount; i < n; ++i) {
        if (queueFamilyProperties[i].queueCount < profileQueueFamilyPropertie.queueCount) {
            continue;
        } else if (queueFamilyProperties[i].timestampValidBits < profileQueueFamilyPropertie.timestampValidBits) {
            continue;
        } else if (queueFamilyProperties[i].minImageTransferGranularity.width >
                   profileQueueFamilyPropertie.minImageTransferGranularity.width) {
            continue;
        } else if (queueFamilyProperties[i].minImageTransferGranularity.height >
                   profileQueueFamilyPropertie.minImageTransferGranularity.height) {
            continue;
        } else if (queueFamilyProperties[i].minImageTransferGranularity.depth >
                   profileQueueFamilyPropertie.minImageTransferGranularity.depth) {
            continue;
        } else if ((queueFamilyProperties[i].queueFlags & profileQueueFamilyPropertie.queueFlags) !=
                   profileQueueFamilyPropertie.queueFlags) {
            continue;
        }

        return true;
    }

    return false;
}

VPAPI_ATTR void _vpGetInstanceExtensions(const VpInstanceCreateInfo *pCreateInfo, uint32_t propertyCount,
                                         const VkExtensionProperties *pProperties, std::vector<const char *> &extensions) {
    if (pCreateInfo->flags & VP_INSTANCE_CREATE_MERGE_EXTENSIONS_BIT) {
        for (int i = 0, n = propertyCount; i < n; ++i) {
            extensions.push_back(pProperties[i].extensionName);
        }

        for (uint32_t i = 0; i < pCreateInfo->pCreateInfo->enabledExtensionCount; ++i) {
            if (_vpCheckExtension(pProperties, propertyCount, pCreateInfo->pCreateInfo->ppEnabledExtensionNames[i])) {
                continue;
            }
            extensions.push_back(pCreateInfo->pCreateInfo->ppEnabledExtensionNames[i]);
        }
    } else {  // or VP_INSTANCE_CREATE_OVERRIDE_EXTENSIONS_BIT
        for (int i = 0, n = pCreateInfo->pCreateInfo->enabledExtensionCount; i < n; ++i) {
            extensions.push_back(pCreateInfo->pCreateInfo->ppEnabledExtensionNames[i]);
        }
    }
}

VPAPI_ATTR void _vpGetDeviceExtensions(const VpDeviceCreateInfo *pCreateInfo, uint32_t propertyCount,
                                       const VkExtensionProperties *pProperties, std::vector<const char *> &extensions) {
    if (pCreateInfo->flags & VP_DEVICE_CREATE_MERGE_EXTENSIONS_BIT) {
        for (int i = 0, n = propertyCount; i < n; ++i) {
            extensions.push_back(pProperties[i].extensionName);
        }

        for (uint32_t i = 0; i < pCreateInfo->pCreateInfo->enabledExtensionCount; ++i) {
            if (_vpCheckExtension(pProperties, propertyCount, pCreateInfo->pCreateInfo->ppEnabledExtensionNames[i])) {
                continue;
            }
            extensions.push_back(pCreateInfo->pCreateInfo->ppEnabledExtensionNames[i]);
        }
    } else {  // or VP_DEVICE_CREATE_OVERRIDE_EXTENSIONS_BIT
        for (int i = 0, n = pCreateInfo->pCreateInfo->enabledExtensionCount; i < n; ++i) {
            extensions.push_back(pCreateInfo->pCreateInfo->ppEnabledExtensionNames[i]);
        }
    }
}

VPAPI_ATTR const void* _vpGetStructure(const void* pNext, VkStructureType type) {
    const VkBaseOutStructure *p = static_cast<const VkBaseOutStructure*>(pNext);
    while (p != nullptr) {
        if (p->sType == type) return p;
        p = p->pNext;
    }
    return nullptr;
}
"#;

const PUBLIC_IMPL_BODY: &str = r#"
VPAPI_ATTR VkResult vpGetInstanceProfileSupport(const char *pLayerName, const VpProfileProperties *pProfile, VkBool32 *pSupported) {
    assert(pProfile != nullptr);
    assert(pSupported != nullptr);
    VkResult result = VK_SUCCESS;

    uint32_t apiVersion;
    vkEnumerateInstanceVersion(&apiVersion);

    uint32_t extCount;
    result = vkEnumerateInstanceExtensionProperties(pLayerName, &extCount, nullptr);
    if (result != VK_SUCCESS) return result;
    std::vector<VkExtensionProperties> ext(extCount);
    result = vkEnumerateInstanceExtensionProperties(pLayerName, &extCount, ext.data());
    if (result != VK_SUCCESS) return result;

    *pSupported = VK_FALSE;

    const _vpProfileDesc* pDesc = _vpGetProfileDesc(_vpProfiles, pProfile->profileName);
    if (pDesc == nullptr) return VK_ERROR_UNKNOWN;

    if (pDesc->specVersion < pProfile->specVersion) return result;

    if (VK_VERSION_PATCH(apiVersion) < VK_VERSION_PATCH(pDesc->minApiVersion)) return result;

    for (uint32_t i = 0; i < pDesc->instanceExtensionCount; ++i) {
        if (!_vpCheckExtension(ext.data(), ext.size(),
            pDesc->pInstanceExtensions[i].extensionName,
            pDesc->pInstanceExtensions[i].specVersion)) return result;
    }

    *pSupported = VK_TRUE;
    return result;
}

VPAPI_ATTR VkResult vpCreateInstance(const VpInstanceCreateInfo *pCreateInfo,
                                     const VkAllocationCallbacks *pAllocator, VkInstance *pInstance) {
    VkInstanceCreateInfo createInfo{ VK_STRUCTURE_TYPE_INSTANCE_CREATE_INFO };
    VkApplicationInfo appInfo{ VK_STRUCTURE_TYPE_APPLICATION_INFO };
    std::vector<const char*> extensions;
    VkInstanceCreateInfo* pInstanceCreateInfo = nullptr;
    VkExtensionProperties* pProfileExtensions = nullptr;
    uint32_t profileExtensionCount = 0;

    if (pCreateInfo != nullptr && pCreateInfo->pCreateInfo != nullptr) {
        createInfo = *pCreateInfo->pCreateInfo;
        pInstanceCreateInfo = &createInfo;

        const _vpProfileDesc* pDesc = nullptr;
        if (pCreateInfo->pProfile != nullptr) {
            pDesc = _vpGetProfileDesc(_vpProfiles, pCreateInfo->pProfile->profileName);
            if (pDesc == nullptr) return VK_ERROR_UNKNOWN;
        }

        if (pDesc != nullptr && pDesc->pInstanceExtensions != nullptr) {
            _vpGetInstanceExtensions(pCreateInfo, pDesc->instanceExtensionCount, pDesc->pInstanceExtensions, extensions);
            createInfo.enabledExtensionCount = static_cast<uint32_t>(extensions.size());
            createInfo.ppEnabledExtensionNames = extensions.data();
        }

        if (pCreateInfo->flags & VP_INSTANCE_CREATE_OVERRIDE_API_VERSION_BIT) {
            if (createInfo.pApplicationInfo != nullptr) {
                appInfo = *createInfo.pApplicationInfo;
            }
            createInfo.pApplicationInfo = &appInfo;
            appInfo.apiVersion = pDesc->minApiVersion;
        }
    }

    return vkCreateInstance(pInstanceCreateInfo, pAllocator, pInstance);
}

VPAPI_ATTR VkResult vpGetProfileInstanceExtensionProperties(const VpProfileProperties *pProfile, uint32_t *pPropertyCount,
                                                            VkExtensionProperties *pProperties) {
    VkResult result = VK_SUCCESS;

    const _vpProfileDesc* pDesc = _vpGetProfileDesc(_vpProfiles, pProfile->profileName);
    if (pDesc == nullptr) return VK_ERROR_UNKNOWN;

    if (pProperties == nullptr) {
        *pPropertyCount = pDesc->instanceExtensionCount;
    } else {
        if (*pPropertyCount < pDesc->instanceExtensionCount) {
            result = VK_INCOMPLETE;
        } else {
            *pPropertyCount = pDesc->instanceExtensionCount;
        }
        for (uint32_t i = 0; i < *pPropertyCount; ++i) {
            pProperties[i] = pDesc->pInstanceExtensions[i];
        }
    }
    return result;
}

VPAPI_ATTR VkResult vpGetProfileDeviceExtensionProperties(const VpProfileProperties *pProfile, uint32_t *pPropertyCount,
                                                          VkExtensionProperties *pProperties) {
    VkResult result = VK_SUCCESS;

    const _vpProfileDesc* pDesc = _vpGetProfileDesc(_vpProfiles, pProfile->profileName);
    if (pDesc == nullptr) return VK_ERROR_UNKNOWN;

    if (pProperties == nullptr) {
        *pPropertyCount = pDesc->deviceExtensionCount;
    } else {
        if (*pPropertyCount < pDesc->deviceExtensionCount) {
            result = VK_INCOMPLETE;
        } else {
            *pPropertyCount = pDesc->deviceExtensionCount;
        }
        for (uint32_t i = 0; i < *pPropertyCount; ++i) {
            pProperties[i] = pDesc->pDeviceExtensions[i];
        }
    }
    return result;
}
"#;

/// The three generated texts.
#[derive(Debug, Clone)]
pub struct GeneratedFiles {
    /// vulkan_profiles.h
    pub header: String,
    /// vulkan_profiles.hpp
    pub header_inline: String,
    /// vulkan_profiles.cpp
    pub source: String,
}

pub struct Emitter<'a> {
    registry: &'a Registry,
    profiles: &'a IndexMap<String, Profile>,
}

impl<'a> Emitter<'a> {
    pub fn new(registry: &'a Registry, profiles: &'a IndexMap<String, Profile>) -> Self {
        Emitter { registry, profiles }
    }

    pub fn emit(&self) -> Result<GeneratedFiles> {
        let profile_defs = self.gen_profile_defs();
        let struct_prop_lists = self.gen_struct_prop_lists()?;
        let format_lists = self.gen_format_lists()?;
        let memory_type_lists = if EMIT_MEMORY_TYPES {
            self.gen_memory_type_lists()?
        } else {
            String::new()
        };
        let queue_family_lists = self.gen_queue_family_lists()?;
        let private_impl = self.gen_private_impl()?;
        let public_impl = self.gen_public_impl()?;

        let mut header = String::new();
        header.push_str(COPYRIGHT_HEADER);
        header.push_str(H_HEADER);
        header.push_str(&profile_defs);
        header.push_str(API_DEFS);
        header.push_str(H_FOOTER);

        let mut source = String::new();
        source.push_str(COPYRIGHT_HEADER);
        source.push_str(CPP_HEADER);
        source.push_str(&struct_prop_lists);
        source.push_str(&format_lists);
        source.push_str(&memory_type_lists);
        source.push_str(&queue_family_lists);
        source.push_str(&private_impl);
        source.push_str(&public_impl);

        let mut header_inline = String::new();
        header_inline.push_str(COPYRIGHT_HEADER);
        header_inline.push_str(HPP_HEADER);
        header_inline.push_str(&profile_defs);
        header_inline.push_str(API_DEFS);
        header_inline.push_str(&struct_prop_lists);
        header_inline.push_str(&format_lists);
        header_inline.push_str(&memory_type_lists);
        header_inline.push_str(&queue_family_lists);
        header_inline.push_str(&private_impl);
        header_inline.push_str(&public_impl);
        header_inline.push_str(HPP_FOOTER);

        Ok(GeneratedFiles {
            header,
            header_inline,
            source,
        })
    }

    /// Per-profile guard block and the `<NAME>`/`_SPEC_VERSION`/
    /// `_MIN_API_VERSION` defines.
    fn gen_profile_defs(&self) -> String {
        let mut out = String::new();
        for (name, profile) in self.profiles {
            let uname = name.to_uppercase();
            out.push('\n');

            let count = profile.requirements.len();
            for (i, requirement) in profile.requirements.iter().enumerate() {
                if i == 0 {
                    out.push_str("#if ");
                } else {
                    out.push_str("    ");
                }
                out.push_str(&format!("defined({requirement})"));
                if i + 1 < count {
                    out.push_str(" && \\\n");
                } else {
                    out.push('\n');
                }
            }

            out.push_str(&format!("#define {name} 1\n"));
            out.push_str(&format!("#define {uname}_NAME \"{name}\"\n"));
            out.push_str(&format!("#define {uname}_SPEC_VERSION {}\n", profile.version));
            out.push_str(&format!(
                "#define {uname}_MIN_API_VERSION VK_MAKE_VERSION({})\n",
                profile.api_version.replace('.', ", ")
            ));

            if count > 0 {
                out.push_str("#endif\n");
            }
        }
        out
    }

    fn gen_private_impl(&self) -> Result<String> {
        let mut out = String::from("\n");
        out.push_str(PRIVATE_IMPL_BODY);
        out.push_str(&self.gen_private_data()?);
        out.push_str(&self.gen_profile_desc());
        Ok(out)
    }

    /// Per-profile namespace holding the extension property arrays.
    fn gen_private_data(&self) -> Result<String> {
        let mut out = String::new();
        for (name, profile) in self.profiles {
            let uname = name.to_uppercase();
            out.push('\n');
            out.push_str(&format!("#ifdef {name}\nnamespace {uname} {{\n"));
            out.push_str(&self.gen_extension_data(profile, ExtensionKind::Instance)?);
            out.push_str(&self.gen_extension_data(profile, ExtensionKind::Device)?);
            out.push_str(&format!("\n}} // namespace {uname}\n#endif\n"));
        }
        Ok(out)
    }

    fn gen_extension_data(&self, profile: &Profile, kind: ExtensionKind) -> Result<String> {
        let label = match kind {
            ExtensionKind::Instance => "instance",
            ExtensionKind::Device => "device",
        };
        let mut found = false;
        let mut out = String::from("\n");
        out.push_str(&format!(
            "static const VkExtensionProperties _{label}Extensions[] = {{\n"
        ));
        for (ext_name, spec_version) in &profile.capabilities.extensions {
            let Some(ext) = self.registry.extensions.get(ext_name) else {
                return Err(Error::emitter(format!("extension '{ext_name}' does not exist")));
            };
            if ext.kind == kind {
                out.push_str(&format!(
                    "    VkExtensionProperties{{ {}_EXTENSION_NAME, {spec_version} }},\n",
                    ext.upper_case_name
                ));
                found = true;
            }
        }
        out.push_str("};\n");
        Ok(if found { out } else { String::new() })
    }

    fn gen_profile_desc(&self) -> String {
        let mut out = String::from("\n");
        out.push_str("static const _vpProfileDesc _vpProfiles[] = {\n");

        for (name, profile) in self.profiles {
            let uname = name.to_uppercase();
            out.push_str(&format!(
                "#ifdef {name}\n    _vpProfileDesc{{\n        {uname}_NAME,\n        {uname}_SPEC_VERSION,\n        {uname}_MIN_API_VERSION,\n"
            ));

            if !profile.capabilities.instance_extensions.is_empty() {
                out.push_str(&format!(
                    "        &{uname}::_instanceExtensions[0], _vpArraySize({uname}::_instanceExtensions),\n"
                ));
            } else {
                out.push_str("        nullptr, 0,\n");
            }

            if !profile.capabilities.device_extensions.is_empty() {
                out.push_str(&format!(
                    "        &{uname}::_deviceExtensions[0], _vpArraySize({uname}::_deviceExtensions)\n"
                ));
            } else {
                out.push_str("        nullptr, 0\n");
            }

            out.push_str("    },\n#endif\n");
        }

        out.push_str("    _vpProfileDesc{ nullptr }\n};\n");
        out
    }

    fn gen_public_impl(&self) -> Result<String> {
        let mut out = String::from(PUBLIC_IMPL_BODY);
        out.push_str(&self.gen_vp_get_profiles());
        out.push_str(&self.gen_vp_get_profile_fallbacks());
        out.push_str(&self.gen_vp_get_device_profile_support()?);
        out.push_str(&self.gen_vp_create_device()?);
        out.push_str(&self.gen_vp_get_profile_structures()?);
        out.push_str(&self.gen_vp_get_profile_structure_properties());
        out.push_str(&self.gen_vp_get_profile_formats());
        out.push_str(&self.gen_vp_get_profile_format_properties());
        if EMIT_MEMORY_TYPES {
            out.push_str(&self.gen_vp_get_profile_memory_types());
        }
        out.push_str(&self.gen_vp_get_profile_queue_families());
        Ok(out)
    }

    /// `_<NAME>_STRUCTURE_PROPERTIES`: every feature/property structure's
    /// sType tagged with its area. `VkPhysicalDeviceFeatures` and
    /// `VkPhysicalDeviceProperties` report as their "2" wrappers.
    fn gen_struct_prop_lists(&self) -> Result<String> {
        let mut out = String::new();
        for (name, profile) in self.profiles {
            let features = &profile.capabilities.features;
            let properties = &profile.capabilities.properties;
            if features.is_empty() && properties.is_empty() {
                continue;
            }

            out.push_str(&format!(
                "\n#ifdef {name}\nstatic const VpStructureProperties _{}_STRUCTURE_PROPERTIES[] = {{\n",
                name.to_uppercase()
            ));

            for struct_name in features.keys() {
                let s_type =
                    self.chainable_s_type(struct_name, "VkPhysicalDeviceFeatures", "Feature")?;
                out.push_str(&format!("    {{ {s_type}, VP_STRUCTURE_FEATURES }},\n"));
            }
            for struct_name in properties.keys() {
                let s_type = self.chainable_s_type(
                    struct_name,
                    "VkPhysicalDeviceProperties",
                    "Properties",
                )?;
                out.push_str(&format!("    {{ {s_type}, VP_STRUCTURE_PROPERTIES }},\n"));
            }

            out.push_str("};\n#endif\n");
        }
        Ok(out)
    }

    /// Looks up the sType of a feature/property structure, wrapping the
    /// plain 1.0 structs into their "2" variants, and checks that the
    /// struct actually chains into the corresponding root.
    fn chainable_s_type(&self, struct_name: &str, root: &str, label: &str) -> Result<String> {
        let root2 = format!("{root}2");
        let struct_name = if struct_name == root { root2.as_str() } else { struct_name };

        let Some(def) = self.registry.structs.get(struct_name) else {
            return Err(Error::emitter(format!(
                "{label} structure '{struct_name}' does not exist"
            )));
        };
        let Some(s_type) = &def.s_type else {
            return Err(Error::emitter(format!(
                "{label} structure '{struct_name}' is not chainable"
            )));
        };
        if def.name != root2 && !def.extends.iter().any(|e| e == &root2) {
            return Err(Error::emitter(format!(
                "{label} structure '{struct_name}' does not extend {root2}"
            )));
        }
        Ok(s_type.clone())
    }

    fn gen_format_lists(&self) -> Result<String> {
        let mut out = String::from("\n");
        out.push_str(
            "struct VpFormatProperties {\n    VkFormat format;\n    VkFlags64 linearTilingFeatures;\n    VkFlags64 optimalTilingFeatures;\n    VkFlags64 bufferFeatures;\n};\n",
        );
        for (name, profile) in self.profiles {
            if profile.capabilities.formats.is_empty() {
                continue;
            }
            out.push_str(&format!(
                "\n#ifdef {name}\nstatic const VpFormatProperties _{}_FORMATS[] = {{\n",
                name.to_uppercase()
            ));
            for (format, props) in &profile.capabilities.formats {
                let Value::Object(props) = props else {
                    return Err(Error::emitter(format!(
                        "format '{format}' does not hold property structures"
                    )));
                };
                for prop_struct_name in props.keys() {
                    if prop_struct_name != "VkFormatProperties" {
                        return Err(Error::emitter(format!(
                            "unsupported format properties structure '{prop_struct_name}'"
                        )));
                    }
                }
                let Some(Value::Object(format_props)) = props.get("VkFormatProperties") else {
                    return Err(Error::emitter(format!(
                        "format '{format}' has no VkFormatProperties data"
                    )));
                };

                out.push_str(&format!(
                    "    {{\n        {format},\n        {},\n        {},\n        {},\n    }},\n",
                    gen_list_value(format_props.get("linearTilingFeatures"), true)?,
                    gen_list_value(format_props.get("optimalTilingFeatures"), true)?,
                    gen_list_value(format_props.get("bufferFeatures"), true)?,
                ));
            }
            out.push_str("};\n#endif\n");
        }
        Ok(out)
    }

    fn gen_memory_type_lists(&self) -> Result<String> {
        let mut out = String::new();
        for (name, profile) in self.profiles {
            if profile.capabilities.memory_properties.is_empty() {
                continue;
            }
            out.push_str(&format!(
                "\n#ifdef {name}\nstatic const VkMemoryPropertyFlags _{}_MEMORY_TYPES[] = {{\n",
                name.to_uppercase()
            ));
            for (prop_struct_name, members) in &profile.capabilities.memory_properties {
                if prop_struct_name != "VkPhysicalDeviceMemoryProperties" {
                    return Err(Error::emitter(format!(
                        "unsupported memory properties structure '{prop_struct_name}'"
                    )));
                }
                let Value::Object(members) = members else {
                    return Err(Error::emitter(format!(
                        "memory properties structure '{prop_struct_name}' holds no members"
                    )));
                };
                for member in members.keys() {
                    if member != "memoryTypes" {
                        return Err(Error::emitter(format!(
                            "unsupported memory properties struct member '{member}'"
                        )));
                    }
                }
                let Some(Value::Array(memory_types)) = members.get("memoryTypes") else {
                    return Err(Error::emitter(
                        "memory properties without a memoryTypes list".to_string(),
                    ));
                };
                for memory_type in memory_types {
                    let flags = memory_type.get("propertyFlags");
                    out.push_str(&format!("    {},\n", gen_list_value(flags, true)?));
                }
            }
            out.push_str("};\n#endif\n");
        }
        Ok(out)
    }

    fn gen_queue_family_lists(&self) -> Result<String> {
        let mut out = String::new();
        for (name, profile) in self.profiles {
            if profile.capabilities.queue_families_properties.is_empty() {
                continue;
            }
            out.push_str(&format!(
                "\n#ifdef {name}\nstatic const VkQueueFamilyProperties _{}_QUEUE_FAMILY_PROPERTIES[] = {{\n",
                name.to_uppercase()
            ));

            for queue_family_data in &profile.capabilities.queue_families_properties {
                let Value::Object(queue_family_data) = queue_family_data else {
                    return Err(Error::emitter(
                        "queueFamiliesProperties entry is not an object".to_string(),
                    ));
                };
                for (prop_struct_name, members) in queue_family_data {
                    if prop_struct_name != "VkQueueFamilyProperties" {
                        return Err(Error::emitter(format!(
                            "unsupported queue family properties structure '{prop_struct_name}'"
                        )));
                    }
                    let Value::Object(members) = members else {
                        return Err(Error::emitter(format!(
                            "queue family structure '{prop_struct_name}' holds no members"
                        )));
                    };

                    let flags = gen_list_value(members.get("queueFlags"), true)?;
                    let count = scalar_text(required_member(members, prop_struct_name, "queueCount")?);
                    let timestamp_bits =
                        scalar_text(required_member(members, prop_struct_name, "timestampValidBits")?);
                    let granularity =
                        required_member(members, prop_struct_name, "minImageTransferGranularity")?;
                    let Value::Object(granularity) = granularity else {
                        return Err(Error::emitter(
                            "minImageTransferGranularity is not an object".to_string(),
                        ));
                    };
                    let width = scalar_text(required_member(granularity, "minImageTransferGranularity", "width")?);
                    let height = scalar_text(required_member(granularity, "minImageTransferGranularity", "height")?);
                    let depth = scalar_text(required_member(granularity, "minImageTransferGranularity", "depth")?);

                    out.push_str(&format!(
                        "    {{ {flags}, {count}, {timestamp_bits}, {{ {width}, {height}, {depth} }} }},\n"
                    ));
                }
            }

            out.push_str("};\n#endif\n");
        }
        Ok(out)
    }

    fn gen_vp_get_profiles(&self) -> String {
        let mut out = String::from("\n");
        out.push_str(
            "VPAPI_ATTR VkResult vpGetProfiles(uint32_t *pPropertyCount, VpProfileProperties *pProperties) {\n    VkResult result = VK_SUCCESS;\n    static const VpProfileProperties profiles[] = {\n",
        );

        for name in self.profiles.keys() {
            let uname = name.to_uppercase();
            out.push_str(&format!(
                "#ifdef {name}\n        {{ {uname}_NAME, {uname}_SPEC_VERSION }},\n#endif\n"
            ));
        }

        out.push_str(
            "    };\n\n    if (pProperties == nullptr) {\n        *pPropertyCount = _vpArraySize(profiles);\n    } else {\n        if (*pPropertyCount < _vpArraySize(profiles)) {\n            result = VK_INCOMPLETE;\n        } else {\n            *pPropertyCount = _vpArraySize(profiles);\n        }\n        for (uint32_t i = 0; i < *pPropertyCount; ++i) {\n            pProperties[i] = profiles[i];\n        }\n    }\n    return result;\n}\n",
        );
        out
    }

    fn gen_vp_get_profile_fallbacks(&self) -> String {
        let mut out = String::from("\n");
        out.push_str(
            "VPAPI_ATTR VkResult vpGetProfileFallbacks(const VpProfileProperties *pProfile, uint32_t *pPropertyCount, VpProfileProperties *pProperties) {\n    VkResult result = VK_SUCCESS;\n",
        );

        for (name, profile) in self.profiles {
            if profile.fallback.is_empty() {
                continue;
            }
            let uname = name.to_uppercase();
            out.push_str(&format!(
                "#ifdef {name}\n    if (strcmp(pProfile->profileName, {uname}_NAME) == 0) {{\n        static const VpProfileProperties {uname}_fallbacks[] = {{\n"
            ));
            for fallback in &profile.fallback {
                let fallback_uname = fallback.to_uppercase();
                out.push_str(&format!(
                    "            {{ {fallback_uname}_NAME, {fallback_uname}_SPEC_VERSION }},\n"
                ));
            }
            out.push_str(&format!(
                "        }};\n\n        if (pProperties == nullptr) {{\n            *pPropertyCount = _vpArraySize({uname}_fallbacks);\n        }} else {{\n            if (*pPropertyCount < _vpArraySize({uname}_fallbacks)) {{\n                result = VK_INCOMPLETE;\n            }} else {{\n                *pPropertyCount = _vpArraySize({uname}_fallbacks);\n            }}\n            for (uint32_t i = 0; i < *pPropertyCount; ++i) {{\n                pProperties[i] = {uname}_fallbacks[i];\n            }}\n        }}\n    }} else\n"
            ));
            out.push_str("#endif\n");
        }

        out.push_str("    {\n        *pPropertyCount = 0;\n    }\n    return result;\n}\n");
        out
    }

    fn gen_vp_get_device_profile_support(&self) -> Result<String> {
        let mut out = String::from("\n");
        out.push_str(
            "VPAPI_ATTR VkResult vpGetDeviceProfileSupport(VkPhysicalDevice physicalDevice, const VpProfileProperties *pProfile, VkBool32 *pSupported) {\n    assert(pProfile != nullptr);\n    assert(pSupported != nullptr);\n    assert(physicalDevice != VK_NULL_HANDLE);\n\n    VkResult result = VK_SUCCESS;\n\n    uint32_t extCount;\n    result = vkEnumerateDeviceExtensionProperties(physicalDevice, nullptr, &extCount, nullptr);\n    if (result != VK_SUCCESS) return result;\n    std::vector<VkExtensionProperties> ext(extCount);\n    result = vkEnumerateDeviceExtensionProperties(physicalDevice, nullptr, &extCount, ext.data());\n    if (result != VK_SUCCESS) return result;\n\n    VkPhysicalDeviceProperties devProps;\n    vkGetPhysicalDeviceProperties(physicalDevice, &devProps);\n\n    *pSupported = VK_FALSE;\n\n",
        );

        for (name, profile) in self.profiles {
            let uname = name.to_uppercase();
            out.push_str(&format!(
                "#ifdef {name}\n    if (strcmp(pProfile->profileName, {uname}_NAME) == 0) {{\n        if ({uname}_SPEC_VERSION < pProfile->specVersion) return result;\n\n        if (VK_VERSION_PATCH(devProps.apiVersion) < VK_VERSION_PATCH({uname}_MIN_API_VERSION)) return result;\n"
            ));

            if !profile.capabilities.device_extensions.is_empty() {
                out.push_str(&format!(
                    "\n        for (uint32_t i = 0; i < _vpArraySize({uname}::_deviceExtensions); ++i) {{\n            if (!_vpCheckExtension(ext.data(), ext.size(), {uname}::_deviceExtensions[i].extensionName)) return result;\n        }}\n"
                ));
            }

            out.push_str(&self.gen_device_support_struct_checks(
                &profile.capabilities.features,
                "VkPhysicalDeviceFeatures",
                "featuresSupported",
                ".features.",
                "vkGetPhysicalDeviceFeatures2",
            )?);
            out.push_str(&self.gen_device_support_struct_checks(
                &profile.capabilities.properties,
                "VkPhysicalDeviceProperties",
                "propertiesSupported",
                ".properties.",
                "vkGetPhysicalDeviceProperties2",
            )?);

            if !profile.capabilities.queue_families_properties.is_empty() {
                out.push_str(&format!(
                    "\n        uint32_t queueFamilyCount = 0;\n        vkGetPhysicalDeviceQueueFamilyProperties(physicalDevice, &queueFamilyCount, nullptr);\n        std::vector<VkQueueFamilyProperties> queueFamilies(queueFamilyCount);\n        vkGetPhysicalDeviceQueueFamilyProperties(physicalDevice, &queueFamilyCount, queueFamilies.data());\n\n        bool queueFamiliesSupported = true;\n        for (uint32_t i = 0; i < _vpArraySize(_{uname}_QUEUE_FAMILY_PROPERTIES); ++i) {{\n            if (!_vpCheckQueueFamilyProperty(&queueFamilies[0], queueFamilyCount, _{uname}_QUEUE_FAMILY_PROPERTIES[i])) {{\n                queueFamiliesSupported = false;\n                break;\n            }}\n        }}\n        if (!queueFamiliesSupported) return result;\n"
                ));
            }

            if EMIT_MEMORY_TYPES && !profile.capabilities.memory_properties.is_empty() {
                out.push_str(&format!(
                    "\n        VkPhysicalDeviceMemoryProperties memoryProperties;\n        vkGetPhysicalDeviceMemoryProperties(physicalDevice, &memoryProperties);\n\n        bool memoryTypesSupported = true;\n        for (uint32_t i = 0; i < _vpArraySize(_{uname}_MEMORY_TYPES); ++i) {{\n            if (!_vpCheckMemoryProperty(memoryProperties, _{uname}_MEMORY_TYPES[i])) {{\n                memoryTypesSupported = false;\n                break;\n            }}\n        }}\n        if (!memoryTypesSupported) return result;\n"
                ));
            }

            out.push_str("    } else\n#endif\n");
        }

        out.push_str(
            "    {\n        return result;\n    }\n\n    *pSupported = VK_TRUE;\n    return result;\n}\n",
        );
        Ok(out)
    }

    /// Emits the declare/fetch/populate/compare block shared by the feature
    /// and property checks of `vpGetDeviceProfileSupport`.
    ///
    /// Every struct is declared twice (device-observed and profile-required)
    /// and chained so one `vkGetPhysicalDevice*2` call and one
    /// `vpGetProfileStructures` call fill them all. The root "2" struct is
    /// injected manually when the profile does not name it.
    fn gen_device_support_struct_checks(
        &self,
        sections: &ValueMap,
        wrapped_root: &str,
        support_var: &str,
        wrapped_access: &str,
        fetch_fn: &str,
    ) -> Result<String> {
        if sections.is_empty() {
            return Ok(String::new());
        }
        let root2 = format!("{wrapped_root}2");
        let root2_var_tail = &root2[2..];
        let root2_s_type = wrapped_s_type(wrapped_root);

        let mut out = String::from("\n");
        let mut gen_def = String::new();
        let mut gen_check = format!("        bool {support_var} = true;\n");
        let mut p_next_device: Option<String> = None;
        let mut p_next_profile: Option<String> = None;

        for (struct_name, values) in sections {
            let Some(struct_def) = self.registry.structs.get(struct_name) else {
                return Err(Error::emitter(format!(
                    "structure '{struct_name}' does not exist"
                )));
            };
            let Value::Object(values) = values else {
                return Err(Error::emitter(format!(
                    "structure '{struct_name}' holds no members"
                )));
            };

            let (decl_name, access_suffix, s_type) = if struct_name == wrapped_root {
                (root2.as_str(), wrapped_access, root2_s_type.clone())
            } else {
                let Some(s_type) = &struct_def.s_type else {
                    return Err(Error::emitter(format!(
                        "structure '{struct_name}' is not chainable"
                    )));
                };
                (struct_name.as_str(), ".", s_type.clone())
            };

            let device_var = format!("device{}", &decl_name[2..]);
            gen_def.push_str(&format!("        {decl_name} {device_var}{{ {s_type} }};\n"));
            if decl_name != root2 {
                if let Some(prev) = &p_next_device {
                    gen_def.push_str(&format!("        {device_var}.pNext = &{prev};\n"));
                }
                p_next_device = Some(device_var.clone());
            }

            let profile_var = format!("profile{}", &decl_name[2..]);
            gen_def.push_str(&format!("        {decl_name} {profile_var}{{ {s_type} }};\n"));
            if let Some(prev) = &p_next_profile {
                gen_def.push_str(&format!("        {profile_var}.pNext = &{prev};\n"));
            }
            p_next_profile = Some(profile_var.clone());

            let device_prefix = format!("{device_var}{access_suffix}");
            let profile_prefix = format!("{profile_var}{access_suffix}");
            gen_check.push_str(&self.gen_compare_struct_var(
                &|pred| format!("        {support_var} = {support_var} && {pred};\n"),
                struct_def,
                &device_prefix,
                &profile_prefix,
                values,
            )?);
        }

        // Terminate the accumulated check expression.
        gen_check.pop();
        gen_check.push_str(";\n");

        if !sections.contains_key(wrapped_root) && !sections.contains_key(root2.as_str()) {
            gen_def.push_str(&format!(
                "        {root2} device{root2_var_tail}{{ {root2_s_type} }};\n"
            ));
        }
        if let Some(prev) = &p_next_device {
            gen_def.push_str(&format!("        device{root2_var_tail}.pNext = &{prev};\n"));
        }

        out.push_str(&gen_def);
        out.push_str(&format!(
            "        {fetch_fn}(physicalDevice, &device{root2_var_tail});\n"
        ));
        if let Some(root) = &p_next_profile {
            out.push_str(&format!("        vpGetProfileStructures(pProfile, &{root});\n"));
        }
        out.push_str(&gen_check);
        out.push_str(&format!("        if (!{support_var}) return result;\n"));
        Ok(out)
    }

    fn gen_vp_create_device(&self) -> Result<String> {
        let mut out = String::from("\n");
        out.push_str(
            "VPAPI_ATTR VkResult vpCreateDevice(VkPhysicalDevice physicalDevice, const VpDeviceCreateInfo *pCreateInfo,\n                                   const VkAllocationCallbacks *pAllocator, VkDevice *pDevice) {\n    assert(pCreateInfo != nullptr);\n\n    if (physicalDevice == VK_NULL_HANDLE || pCreateInfo == nullptr || pDevice == nullptr) {\n        return vkCreateDevice(physicalDevice, pCreateInfo == nullptr ? nullptr : pCreateInfo->pCreateInfo, pAllocator, pDevice);\n    } else if (pCreateInfo->pProfile == nullptr || strcmp(pCreateInfo->pProfile->profileName, \"\") == 0) {\n        return vkCreateDevice(physicalDevice, pCreateInfo->pCreateInfo, pAllocator, pDevice);\n    } else\n",
        );

        for (name, profile) in self.profiles {
            let uname = name.to_uppercase();
            out.push_str(&format!(
                "#ifdef {name}\n    if (strcmp(pCreateInfo->pProfile->profileName, {uname}_NAME) == 0) {{\n        std::vector<const char*> extensions;\n        _vpGetDeviceExtensions(pCreateInfo, _vpArraySize({uname}::_deviceExtensions), &{uname}::_deviceExtensions[0], extensions);\n\n        void *pNext = const_cast<void*>(pCreateInfo->pCreateInfo->pNext);\n"
            ));

            let features = &profile.capabilities.features;
            if !features.is_empty() {
                let mut gen_def = String::new();
                let mut gen_check = String::new();
                let mut p_next: Option<String> = None;

                for struct_name in features.keys() {
                    let Some(struct_def) = self.registry.structs.get(struct_name) else {
                        return Err(Error::emitter(format!(
                            "feature structure '{struct_name}' does not exist"
                        )));
                    };

                    let (decl_name, s_type) = if struct_name == "VkPhysicalDeviceFeatures" {
                        (
                            "VkPhysicalDeviceFeatures2",
                            "VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_FEATURES_2".to_string(),
                        )
                    } else {
                        let Some(s_type) = &struct_def.s_type else {
                            return Err(Error::emitter(format!(
                                "feature structure '{struct_name}' is not chainable"
                            )));
                        };
                        (struct_name.as_str(), s_type.clone())
                    };

                    let profile_var = format!("profile{}", &decl_name[2..]);
                    gen_def.push_str(&format!("        {decl_name} {profile_var}{{ {s_type} }};\n"));
                    if let Some(prev) = &p_next {
                        gen_def.push_str(&format!("        {profile_var}.pNext = &{prev};\n"));
                    }
                    p_next = Some(profile_var.clone());

                    if decl_name == "VkPhysicalDeviceFeatures2" {
                        gen_check.push_str(&format!(
                            "        if (pCreateInfo->pCreateInfo->pEnabledFeatures != nullptr) {{\n            profilePhysicalDeviceFeatures2.features = *pCreateInfo->pCreateInfo->pEnabledFeatures;\n        }}\n        if (pCreateInfo->flags & VP_DEVICE_CREATE_DISABLE_ROBUST_BUFFER_ACCESS_BIT) {{\n            profilePhysicalDeviceFeatures2.features.robustBufferAccess = VK_FALSE;\n        }}\n        if (_vpGetStructure(pNext, {s_type}) == nullptr && pCreateInfo->pCreateInfo->pEnabledFeatures == nullptr) {{\n"
                        ));
                    } else {
                        if decl_name == "VkPhysicalDeviceVulkan13Features" {
                            gen_check.push_str(
                                "        if (pCreateInfo->flags & VP_DEVICE_CREATE_DISABLE_ROBUST_IMAGE_ACCESS_BIT) {\n            profilePhysicalDeviceVulkan13Features.robustImageAccess = VK_FALSE;\n        }\n",
                            );
                        }
                        gen_check.push_str(&format!(
                            "        if (_vpGetStructure(pNext, {s_type}) == nullptr) {{\n"
                        ));
                    }
                    gen_check.push_str(&format!(
                        "            {profile_var}.pNext = pNext;\n            pNext = &{profile_var};\n        }}\n"
                    ));
                }

                out.push_str(&gen_def);
                if let Some(root) = &p_next {
                    out.push_str(&format!(
                        "        vpGetProfileStructures(pCreateInfo->pProfile, &{root});\n"
                    ));
                }
                out.push_str(&gen_check);
            }

            out.push_str(
                "\n        VkDeviceCreateInfo deviceCreateInfo{ VK_STRUCTURE_TYPE_DEVICE_CREATE_INFO };\n        deviceCreateInfo.pNext = pNext;\n        deviceCreateInfo.flags = pCreateInfo->pCreateInfo->flags;\n        deviceCreateInfo.queueCreateInfoCount = pCreateInfo->pCreateInfo->queueCreateInfoCount;\n        deviceCreateInfo.pQueueCreateInfos = pCreateInfo->pCreateInfo->pQueueCreateInfos;\n        deviceCreateInfo.enabledExtensionCount = static_cast<uint32_t>(extensions.size());\n        deviceCreateInfo.ppEnabledExtensionNames = extensions.data();\n",
            );

            if !features.contains_key("VkPhysicalDeviceFeatures")
                && !features.contains_key("VkPhysicalDeviceFeatures2")
            {
                out.push_str(
                    "        VkPhysicalDeviceFeatures enabledFeatures;\n        if (pCreateInfo->pCreateInfo->pEnabledFeatures != nullptr) {\n            enabledFeatures = *pCreateInfo->pCreateInfo->pEnabledFeatures;\n            if (pCreateInfo->flags & VP_DEVICE_CREATE_DISABLE_ROBUST_BUFFER_ACCESS_BIT) {\n                enabledFeatures.robustBufferAccess = VK_FALSE;\n            }\n            deviceCreateInfo.pEnabledFeatures = &enabledFeatures;\n        }\n",
                );
            }

            out.push_str(
                "        return vkCreateDevice(physicalDevice, &deviceCreateInfo, pAllocator, pDevice);\n    } else\n#endif\n",
            );
        }

        out.push_str("    {\n        return VK_ERROR_UNKNOWN;\n    }\n}\n");
        Ok(out)
    }

    fn gen_vp_get_profile_structures(&self) -> Result<String> {
        let mut out = String::from("\n");
        out.push_str(
            "VPAPI_ATTR void vpGetProfileStructures(const VpProfileProperties *pProfile, void *pNext) {\n    if (pProfile == nullptr || pNext == nullptr) return;\n    VkBaseOutStructure* p = static_cast<VkBaseOutStructure*>(pNext);\n",
        );

        for (name, profile) in self.profiles {
            let uname = name.to_uppercase();
            out.push_str(&format!(
                "#ifdef {name}\n    if (strcmp(pProfile->profileName, {uname}_NAME) == 0) {{\n        while (p != nullptr) {{\n            switch (p->sType) {{\n"
            ));

            out.push_str(&self.gen_structure_cases(
                &profile.capabilities.features,
                "VkPhysicalDeviceFeatures",
                "features",
            )?);
            out.push_str(&self.gen_structure_cases(
                &profile.capabilities.properties,
                "VkPhysicalDeviceProperties",
                "props",
            )?);

            out.push_str(
                "                default: break;\n            }\n            p = p->pNext;\n        }\n    } else\n#endif\n",
            );
        }

        out.push_str("    {\n    }\n}\n");
        Ok(out)
    }

    /// One `case` per structure, assigning the profile's required values
    /// into the caller-provided chain entry.
    fn gen_structure_cases(
        &self,
        sections: &ValueMap,
        wrapped_root: &str,
        out_var: &str,
    ) -> Result<String> {
        let mut out = String::new();
        for (struct_name, values) in sections {
            let Some(struct_def) = self.registry.structs.get(struct_name) else {
                return Err(Error::emitter(format!(
                    "structure '{struct_name}' does not exist"
                )));
            };
            let Value::Object(values) = values else {
                return Err(Error::emitter(format!(
                    "structure '{struct_name}' holds no members"
                )));
            };

            if struct_name == wrapped_root {
                let root2 = format!("{wrapped_root}2");
                let wrapped_member = match wrapped_root {
                    "VkPhysicalDeviceFeatures" => "features",
                    _ => "properties",
                };
                out.push_str(&format!(
                    "                case {}: {{\n                    {root2}* wrap = reinterpret_cast<{root2}*>(p);\n                    {wrapped_root}* {out_var} = &wrap->{wrapped_member};\n",
                    wrapped_s_type(wrapped_root)
                ));
            } else if let Some(s_type) = &struct_def.s_type {
                out.push_str(&format!("                case {s_type}: {{\n"));
                out.push_str(&format!(
                    "                    {struct_name}* {out_var} = reinterpret_cast<{struct_name}*>(p);\n"
                ));
            } else {
                return Err(Error::emitter(format!(
                    "structure '{struct_name}' is not chainable"
                )));
            }

            let prefix = format!("                    {out_var}->");
            out.push_str(&self.gen_assign_struct_var(struct_def, &prefix, values)?);
            out.push_str("                } break;\n");
        }
        Ok(out)
    }

    fn gen_vp_get_profile_structure_properties(&self) -> String {
        let mut out = String::from("\n");
        out.push_str(
            "VPAPI_ATTR VkResult vpGetProfileStructureProperties(const VpProfileProperties *pProfile, uint32_t *pPropertyCount,\n                                                    VpStructureProperties *pProperties) {\n    VkResult result = VK_SUCCESS;\n",
        );

        for (name, profile) in self.profiles {
            if profile.capabilities.features.is_empty() && profile.capabilities.properties.is_empty()
            {
                continue;
            }
            let uname = name.to_uppercase();
            out.push_str(&format!(
                "#ifdef {name}\n    if (strcmp(pProfile->profileName, {uname}_NAME) == 0) {{\n        if (pProperties == nullptr) {{\n            *pPropertyCount = _vpArraySize(_{uname}_STRUCTURE_PROPERTIES);\n        }} else {{\n            if (*pPropertyCount < _vpArraySize(_{uname}_STRUCTURE_PROPERTIES)) {{\n                result = VK_INCOMPLETE;\n            }} else {{\n                *pPropertyCount = _vpArraySize(_{uname}_STRUCTURE_PROPERTIES);\n            }}\n            for (uint32_t i = 0; i < *pPropertyCount; ++i) {{\n                pProperties[i] = _{uname}_STRUCTURE_PROPERTIES[i];\n            }}\n        }}\n    }} else\n#endif\n"
            ));
        }

        out.push_str("    {\n        *pPropertyCount = 0;\n    }\n    return result;\n}\n");
        out
    }

    fn gen_vp_get_profile_formats(&self) -> String {
        let mut out = String::from("\n");
        out.push_str(
            "VPAPI_ATTR VkResult vpGetProfileFormats(const VpProfileProperties *pProfile, uint32_t *pFormatCount, VkFormat *pFormats) {\n    VkResult result = VK_SUCCESS;\n",
        );

        for (name, profile) in self.profiles {
            if profile.capabilities.formats.is_empty() {
                continue;
            }
            let uname = name.to_uppercase();
            out.push_str(&format!(
                "#ifdef {name}\n    if (strcmp(pProfile->profileName, {uname}_NAME) == 0) {{\n        if (pFormats == nullptr) {{\n            *pFormatCount = _vpArraySize(_{uname}_FORMATS);\n        }} else {{\n            if (*pFormatCount < _vpArraySize(_{uname}_FORMATS)) {{\n                result = VK_INCOMPLETE;\n            }} else {{\n                *pFormatCount = _vpArraySize(_{uname}_FORMATS);\n            }}\n            for (uint32_t i = 0; i < *pFormatCount; ++i) {{\n                pFormats[i] = _{uname}_FORMATS[i].format;\n            }}\n        }}\n    }} else\n#endif\n"
            ));
        }

        out.push_str("    {\n        *pFormatCount = 0;\n    }\n    return result;\n}\n");
        out
    }

    fn gen_vp_get_profile_format_properties(&self) -> String {
        let mut out = String::from("\n");
        out.push_str(
            "VPAPI_ATTR void vpGetProfileFormatProperties(const VpProfileProperties *pProfile, VkFormat format, void *pNext) {\n    if (pProfile == nullptr || pNext == nullptr) return;\n    VkBaseOutStructure* p = static_cast<VkBaseOutStructure*>(pNext);\n",
        );

        for (name, profile) in self.profiles {
            if profile.capabilities.formats.is_empty() {
                continue;
            }
            let uname = name.to_uppercase();
            out.push_str(&format!(
                "#ifdef {name}\n    if (strcmp(pProfile->profileName, {uname}_NAME) == 0) {{\n        for (uint32_t i = 0; i < _vpArraySize(_{uname}_FORMATS); ++i) {{\n            const VpFormatProperties& props = _{uname}_FORMATS[i];\n            if (props.format != format) continue;\n\n            while (p != nullptr) {{\n                switch (p->sType) {{\n"
            ));

            // Both supported output chain structures get the same data,
            // cast down for the 32-bit VkFormatProperties2 variant.
            let format_prop_types = [
                (
                    "VK_STRUCTURE_TYPE_FORMAT_PROPERTIES_2",
                    "VkFormatProperties2* pProps = reinterpret_cast<VkFormatProperties2*>(p);",
                    "pProps->formatProperties.",
                    "static_cast<VkFormatFeatureFlags>",
                ),
                (
                    "VK_STRUCTURE_TYPE_FORMAT_PROPERTIES_3_KHR",
                    "VkFormatProperties3KHR* pProps = reinterpret_cast<VkFormatProperties3KHR*>(p);",
                    "pProps->",
                    "",
                ),
            ];
            for (s_type, var_decl, var_ref, val_cast) in format_prop_types {
                out.push_str(&format!(
                    "                    case {s_type}: {{\n                        {var_decl};\n                        {var_ref}linearTilingFeatures = {val_cast}(props.linearTilingFeatures);\n                        {var_ref}optimalTilingFeatures = {val_cast}(props.optimalTilingFeatures);\n                        {var_ref}bufferFeatures = {val_cast}(props.bufferFeatures);\n                    }} break;\n"
                ));
            }

            out.push_str(
                "                    default: break;\n                }\n                p = p->pNext;\n            }\n        }\n    } else\n#endif\n",
            );
        }

        out.push_str("    {\n    }\n}\n");
        out
    }

    fn gen_vp_get_profile_memory_types(&self) -> String {
        let mut out = String::from("\n");
        out.push_str(
            "VPAPI_ATTR VkResult vpGetProfileMemoryTypes(const VpProfileProperties *pProfile, uint32_t *pMemoryPropertyFlagsCount,\n                                            VkMemoryPropertyFlags *pMemoryPropertyFlags) {\n    VkResult result = VK_SUCCESS;\n",
        );

        for (name, profile) in self.profiles {
            if profile.capabilities.memory_properties.is_empty() {
                continue;
            }
            let uname = name.to_uppercase();
            out.push_str(&format!(
                "#ifdef {name}\n    if (strcmp(pProfile->profileName, {uname}_NAME) == 0) {{\n        if (pMemoryPropertyFlags == nullptr) {{\n            *pMemoryPropertyFlagsCount = _vpArraySize(_{uname}_MEMORY_TYPES);\n        }} else {{\n            if (*pMemoryPropertyFlagsCount < _vpArraySize(_{uname}_MEMORY_TYPES)) {{\n                result = VK_INCOMPLETE;\n            }} else {{\n                *pMemoryPropertyFlagsCount = _vpArraySize(_{uname}_MEMORY_TYPES);\n            }}\n            for (uint32_t i = 0; i < *pMemoryPropertyFlagsCount; ++i) {{\n                pMemoryPropertyFlags[i] = _{uname}_MEMORY_TYPES[i];\n            }}\n        }}\n    }} else\n#endif\n"
            ));
        }

        out.push_str("    {\n        *pMemoryPropertyFlagsCount = 0;\n    }\n    return result;\n}\n");
        out
    }

    fn gen_vp_get_profile_queue_families(&self) -> String {
        let mut out = String::from("\n");
        out.push_str(
            "VPAPI_ATTR VkResult vpGetProfileQueueFamilies(const VpProfileProperties *pProfile, uint32_t *pQueueFamilyPropertiesCount,\n                                              VkQueueFamilyProperties *pQueueFamilyProperties) {\n    VkResult result = VK_SUCCESS;\n",
        );

        for (name, profile) in self.profiles {
            if profile.capabilities.queue_families_properties.is_empty() {
                continue;
            }
            let uname = name.to_uppercase();
            out.push_str(&format!(
                "#ifdef {name}\n    if (strcmp(pProfile->profileName, {uname}_NAME) == 0) {{\n        if (pQueueFamilyProperties == nullptr) {{\n            *pQueueFamilyPropertiesCount = _vpArraySize(_{uname}_QUEUE_FAMILY_PROPERTIES);\n        }} else {{\n            if (*pQueueFamilyPropertiesCount < _vpArraySize(_{uname}_QUEUE_FAMILY_PROPERTIES)) {{\n                result = VK_INCOMPLETE;\n            }} else {{\n                *pQueueFamilyPropertiesCount = _vpArraySize(_{uname}_QUEUE_FAMILY_PROPERTIES);\n            }}\n            for (uint32_t i = 0; i < *pQueueFamilyPropertiesCount; ++i) {{\n                pQueueFamilyProperties[i] = _{uname}_QUEUE_FAMILY_PROPERTIES[i];\n            }}\n        }}\n    }} else\n#endif\n"
            ));
        }

        out.push_str("    {\n        *pQueueFamilyPropertiesCount = 0;\n    }\n    return result;\n}\n");
        out
    }

    /// Emits one assignment statement per `(member, value)` pair,
    /// recursing into nested structures.
    fn gen_assign_struct_var(
        &self,
        struct_def: &StructDef,
        var: &str,
        values: &ValueMap,
    ) -> Result<String> {
        let mut out = String::new();
        for (member, value) in values {
            let Some(member_def) = self.registry.members(struct_def).get(member) else {
                return Err(Error::emitter(format!(
                    "no member '{member}' in structure '{}'",
                    struct_def.name
                )));
            };

            match value {
                Value::Object(nested) => {
                    let Some(nested_def) = self.registry.structs.get(&member_def.type_name) else {
                        return Err(Error::emitter(format!(
                            "member '{member}' in structure '{}' is not a struct",
                            struct_def.name
                        )));
                    };
                    let nested_var = format!("{var}{member}.");
                    out.push_str(&self.gen_assign_struct_var(nested_def, &nested_var, nested)?);
                }
                Value::Array(items) => {
                    if member_def.is_array {
                        for (i, item) in items.iter().enumerate() {
                            out.push_str(&format!("{var}{member}[{i}] = {};\n", scalar_text(item)));
                        }
                    } else {
                        // A leading string marks an enum token list, anything
                        // else is a brace initializer.
                        let is_enum = matches!(items.first(), Some(Value::String(_)));
                        out.push_str(&format!(
                            "{var}{member} = {};\n",
                            gen_list_value(Some(value), is_enum)?
                        ));
                    }
                }
                Value::Bool(value) => {
                    out.push_str(&format!(
                        "{var}{member} = {};\n",
                        if *value { "VK_TRUE" } else { "VK_FALSE" }
                    ));
                }
                _ => {
                    out.push_str(&format!("{var}{member} = {};\n", scalar_text(value)));
                }
            }
        }
        Ok(out)
    }

    /// Emits one comparison predicate per `(member, value)` pair. The
    /// predicate shape is selected by the member's limittype; `wrap` turns
    /// a predicate into a full statement line.
    fn gen_compare_struct_var(
        &self,
        wrap: &dyn Fn(&str) -> String,
        struct_def: &StructDef,
        device_var: &str,
        profile_var: &str,
        values: &ValueMap,
    ) -> Result<String> {
        let mut out = String::new();
        for (member, value) in values {
            let Some(member_def) = self.registry.members(struct_def).get(member) else {
                return Err(Error::emitter(format!(
                    "no member '{member}' in structure '{}'",
                    struct_def.name
                )));
            };

            let limit_type = member_def.limit_type.as_deref();
            let predicate = match limit_type {
                // Unspecifiable member, nothing to check.
                Some("IGNORE") => continue,
                Some("bitmask") => Predicate::Bitmask,
                Some("max") => Predicate::Max,
                Some("min") => Predicate::Min,
                Some("range") => Predicate::Range,
                None | Some("noauto") | Some("struct") => Predicate::Equal,
                Some(other) => {
                    return Err(Error::emitter(format!(
                        "unsupported limittype '{other}' in member '{member}' of structure '{}'",
                        struct_def.name
                    )));
                }
            };

            match value {
                Value::Object(nested) => {
                    let Some(nested_def) = self.registry.structs.get(&member_def.type_name) else {
                        return Err(Error::emitter(format!(
                            "member '{member}' in structure '{}' is not a struct",
                            struct_def.name
                        )));
                    };
                    let nested_device = format!("{device_var}{member}.");
                    let nested_profile = format!("{profile_var}{member}.");
                    out.push_str(&self.gen_compare_struct_var(
                        wrap,
                        nested_def,
                        &nested_device,
                        &nested_profile,
                        nested,
                    )?);
                }
                Value::Array(items) if member_def.is_array => {
                    for i in 0..items.len() {
                        let device = format!("{device_var}{member}[{i}]");
                        let profile = format!("{profile_var}{member}[{i}]");
                        let pred = match predicate {
                            // An outer range covers the required range when
                            // its low end is below and its high end above.
                            Predicate::Range => match i {
                                0 => format!("({device} <= {profile})"),
                                1 => format!("({device} >= {profile})"),
                                _ => {
                                    return Err(Error::emitter(format!(
                                        "range member '{member}' of structure '{}' has more than two elements",
                                        struct_def.name
                                    )));
                                }
                            },
                            _ => scalar_predicate(predicate, &device, &profile, member, struct_def)?,
                        };
                        out.push_str(&wrap(&pred));
                    }
                }
                _ => {
                    let device = format!("{device_var}{member}");
                    let profile = format!("{profile_var}{member}");
                    let pred = scalar_predicate(predicate, &device, &profile, member, struct_def)?;
                    out.push_str(&wrap(&pred));
                }
            }
        }
        Ok(out)
    }
}

#[derive(Clone, Copy)]
enum Predicate {
    Bitmask,
    Max,
    Min,
    Range,
    Equal,
}

fn scalar_predicate(
    predicate: Predicate,
    device: &str,
    profile: &str,
    member: &str,
    struct_def: &StructDef,
) -> Result<String> {
    match predicate {
        // The device value must contain every required bit.
        Predicate::Bitmask => Ok(format!("(({device} & {profile}) == {profile})")),
        Predicate::Max => Ok(format!("({device} >= {profile})")),
        Predicate::Min => Ok(format!("({device} <= {profile})")),
        Predicate::Equal => Ok(format!("({device} == {profile})")),
        Predicate::Range => Err(Error::emitter(format!(
            "range member '{member}' of structure '{}' requires an array value",
            struct_def.name
        ))),
    }
}

fn wrapped_s_type(wrapped_root: &str) -> String {
    match wrapped_root {
        "VkPhysicalDeviceFeatures" => "VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_FEATURES_2".to_string(),
        _ => "VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_PROPERTIES_2".to_string(),
    }
}

/// Renders a value list either as a bit-or of enum tokens (empty list is
/// `0`) or as a brace initializer.
fn gen_list_value(values: Option<&Value>, is_enum: bool) -> Result<String> {
    let empty = Vec::new();
    let items: &Vec<Value> = match values {
        None | Some(Value::Null) => &empty,
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(Error::emitter(format!(
                "expected a list value, got {}",
                value_kind(other)
            )));
        }
    };

    let mut out = String::new();
    if !is_enum {
        out.push_str("{ ");
    }
    if items.is_empty() {
        if is_enum {
            out.push('0');
        }
    } else {
        let rendered: Vec<String> = items.iter().map(scalar_text).collect();
        out.push_str(&rendered.join(if is_enum { " | " } else { ", " }));
    }
    if !is_enum {
        out.push_str(" }");
    }
    Ok(out)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Bool(true) => "VK_TRUE".to_string(),
        Value::Bool(false) => "VK_FALSE".to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn required_member<'v>(members: &'v ValueMap, struct_name: &str, member: &str) -> Result<&'v Value> {
    members.get(member).ok_or_else(|| {
        Error::emitter(format!("'{struct_name}' data is missing member '{member}'"))
    })
}
