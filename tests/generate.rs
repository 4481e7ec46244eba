// Copyright 2023-2026 The Khronos Group Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! End-to-end pipeline tests over an on-disk registry and profile directory.

use std::fs;
use std::path::Path;

use vulkan_profiles_gen::generate;

const REGISTRY_XML: &str = r#"
<registry>
    <platforms>
        <platform name="win32" protect="VK_USE_PLATFORM_WIN32_KHR"/>
    </platforms>
    <types>
        <type category="struct" name="VkPhysicalDeviceFeatures">
            <member><type>VkBool32</type> <name>robustBufferAccess</name></member>
            <member><type>VkBool32</type> <name>geometryShader</name></member>
            <member><type>VkBool32</type> <name>tessellationShader</name></member>
        </type>
        <type category="struct" name="VkPhysicalDeviceFeatures2" structextends="VkDeviceCreateInfo">
            <member values="VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_FEATURES_2"><type>VkStructureType</type> <name>sType</name></member>
            <member><type>void</type>* <name>pNext</name></member>
            <member limittype="struct"><type>VkPhysicalDeviceFeatures</type> <name>features</name></member>
        </type>
        <type category="struct" name="VkPhysicalDeviceVulkan12Features" structextends="VkPhysicalDeviceFeatures2,VkDeviceCreateInfo">
            <member values="VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_VULKAN_1_2_FEATURES"><type>VkStructureType</type> <name>sType</name></member>
            <member><type>void</type>* <name>pNext</name></member>
            <member><type>VkBool32</type> <name>drawIndirectCount</name></member>
            <member><type>VkBool32</type> <name>descriptorIndexing</name></member>
        </type>
    </types>
    <feature api="vulkan" name="VK_VERSION_1_0" number="1.0">
        <require>
            <type name="VkPhysicalDeviceFeatures"/>
        </require>
    </feature>
    <feature api="vulkan" name="VK_VERSION_1_1" number="1.1">
        <require>
            <type name="VkPhysicalDeviceFeatures2"/>
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
                <enum value="70" name="VK_KHR_SWAPCHAIN_SPEC_VERSION"/>
                <enum value="&quot;VK_KHR_swapchain&quot;" name="VK_KHR_SWAPCHAIN_EXTENSION_NAME"/>
            </require>
        </extension>
        <extension name="VK_EXT_swapchain_colorspace" number="105" type="instance" supported="vulkan">
            <require>
                <enum value="4" name="VK_EXT_SWAPCHAIN_COLOR_SPACE_SPEC_VERSION"/>
                <enum value="&quot;VK_EXT_swapchain_colorspace&quot;" name="VK_EXT_SWAPCHAIN_COLOR_SPACE_EXTENSION_NAME"/>
            </require>
        </extension>
    </extensions>
</registry>
"#;

const BASELINE_JSON: &str = r#"{
    "profiles": {
        "VP_TEST_baseline_2022": {
            "version": 1,
            "api-version": "1.2.0",
            "capabilities": ["baseline"]
        }
    },
    "capabilities": {
        "baseline": {
            "features": {
                "VkPhysicalDeviceFeatures": {
                    "geometryShader": true
                },
                "VkPhysicalDeviceVulkan12Features": {
                    "drawIndirectCount": true
                }
            }
        }
    }
}"#;

const DESKTOP_JSON: &str = r#"{
    "profiles": {
        "VP_TEST_desktop_2022": {
            "version": 2,
            "api-version": "1.1.0",
            "fallback": ["VP_TEST_baseline_2022"],
            "capabilities": ["swapchain", "shading"]
        }
    },
    "capabilities": {
        "swapchain": {
            "extensions": {
                "VK_KHR_swapchain": 70,
                "VK_EXT_swapchain_colorspace": 4
            }
        },
        "shading": {
            "features": {
                "VkPhysicalDeviceFeatures": {
                    "tessellationShader": true
                }
            }
        }
    }
}"#;

fn write_inputs(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let registry_path = dir.join("vk.xml");
    fs::write(&registry_path, REGISTRY_XML).expect("registry written");

    let profiles_dir = dir.join("profiles");
    fs::create_dir(&profiles_dir).expect("profiles dir created");
    fs::write(profiles_dir.join("VP_TEST_baseline_2022.json"), BASELINE_JSON)
        .expect("baseline profile written");
    fs::write(profiles_dir.join("VP_TEST_desktop_2022.json"), DESKTOP_JSON)
        .expect("desktop profile written");

    (registry_path, profiles_dir)
}

#[test]
fn generates_byte_identical_output_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (registry_path, profiles_dir) = write_inputs(dir.path());

    let first = generate(&registry_path, &profiles_dir).expect("first run");
    let second = generate(&registry_path, &profiles_dir).expect("second run");

    assert_eq!(first.header, second.header);
    assert_eq!(first.header_inline, second.header_inline);
    assert_eq!(first.source, second.source);
}

#[test]
fn version_only_profile_gets_a_single_guard() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (registry_path, profiles_dir) = write_inputs(dir.path());

    let files = generate(&registry_path, &profiles_dir).expect("generates");

    assert!(files.header.contains("#if defined(VK_VERSION_1_2)\n#define VP_TEST_baseline_2022 1\n"));
    assert!(files
        .header
        .contains("#define VP_TEST_BASELINE_2022_MIN_API_VERSION VK_MAKE_VERSION(1, 2, 0)\n"));
}

#[test]
fn extensions_are_classified_and_listed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (registry_path, profiles_dir) = write_inputs(dir.path());

    let files = generate(&registry_path, &profiles_dir).expect("generates");

    // swapchain lands in the device array of the desktop profile
    let namespace = files
        .source
        .split("namespace VP_TEST_DESKTOP_2022 {")
        .nth(1)
        .and_then(|rest| rest.split("} // namespace").next())
        .expect("desktop namespace present");
    let device_array = namespace
        .split("static const VkExtensionProperties _deviceExtensions[] = {")
        .nth(1)
        .and_then(|rest| rest.split("};").next())
        .expect("device extension array present");
    assert!(device_array.contains("VK_KHR_SWAPCHAIN_EXTENSION_NAME, 70"));
    assert!(!device_array.contains("SWAPCHAIN_COLOR_SPACE"));
    let instance_array = namespace
        .split("static const VkExtensionProperties _instanceExtensions[] = {")
        .nth(1)
        .and_then(|rest| rest.split("};").next())
        .expect("instance extension array present");
    assert!(instance_array.contains("VK_EXT_SWAPCHAIN_COLOR_SPACE_EXTENSION_NAME, 4"));

    // the desktop guard needs the version and both extensions
    assert!(files.header.contains(
        "#if defined(VK_VERSION_1_1) && \\\n    defined(VK_KHR_swapchain) && \\\n    defined(VK_EXT_swapchain_colorspace)\n"
    ));
}

#[test]
fn profile_order_follows_file_names() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (registry_path, profiles_dir) = write_inputs(dir.path());

    let files = generate(&registry_path, &profiles_dir).expect("generates");

    let baseline = files
        .header
        .find("#define VP_TEST_baseline_2022 1")
        .expect("baseline defined");
    let desktop = files
        .header
        .find("#define VP_TEST_desktop_2022 1")
        .expect("desktop defined");
    assert!(baseline < desktop);
}

#[test]
fn fallbacks_reference_other_profiles() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (registry_path, profiles_dir) = write_inputs(dir.path());

    let files = generate(&registry_path, &profiles_dir).expect("generates");

    assert!(files.source.contains("static const VpProfileProperties VP_TEST_DESKTOP_2022_fallbacks[] = {"));
    assert!(files
        .source
        .contains("{ VP_TEST_BASELINE_2022_NAME, VP_TEST_BASELINE_2022_SPEC_VERSION },"));
}

#[test]
fn merged_features_assign_every_member() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (registry_path, profiles_dir) = write_inputs(dir.path());

    let files = generate(&registry_path, &profiles_dir).expect("generates");

    assert!(files.source.contains("features->geometryShader = VK_TRUE;\n"));
    assert!(files.source.contains("features->drawIndirectCount = VK_TRUE;\n"));
    assert!(files.source.contains("features->tessellationShader = VK_TRUE;\n"));
}

#[test]
fn duplicate_profile_across_files_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (registry_path, profiles_dir) = write_inputs(dir.path());
    fs::write(profiles_dir.join("zz_duplicate.json"), BASELINE_JSON).expect("duplicate written");

    assert!(generate(&registry_path, &profiles_dir).is_err());
}

#[test]
fn unreachable_struct_aborts_generation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (registry_path, profiles_dir) = write_inputs(dir.path());
    fs::write(
        profiles_dir.join("broken.json"),
        r#"{
            "profiles": {
                "VP_TEST_broken": {
                    "version": 1,
                    "api-version": "1.0.0",
                    "capabilities": ["broken"]
                }
            },
            "capabilities": {
                "broken": {
                    "features": {
                        "VkPhysicalDeviceVulkan12Features": { "descriptorIndexing": true }
                    }
                }
            }
        }"#,
    )
    .expect("broken profile written");

    assert!(generate(&registry_path, &profiles_dir).is_err());
}
