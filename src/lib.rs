//! Generates the Vulkan profiles support library (`vulkan_profiles.h`,
//! `vulkan_profiles.hpp`, `vulkan_profiles.cpp`) from the vk.xml registry
//! and a directory of profile definition files.

use std::path::Path;

pub mod emitter;
pub mod error;
pub mod profiles;
pub mod registry;

pub use emitter::{Emitter, GeneratedFiles};
pub use error::{Error, Result};
pub use profiles::{load_profiles, Profile, ProfileCapabilities};
pub use registry::Registry;

/// Runs the whole pipeline: registry and profiles in, three source texts out.
pub fn generate(registry_path: &Path, profiles_dir: &Path) -> Result<GeneratedFiles> {
    let registry = Registry::load(registry_path)?;
    let profiles = load_profiles(profiles_dir, &registry)?;
    Emitter::new(&registry, &profiles).emit()
}
