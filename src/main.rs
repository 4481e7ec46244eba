// Copyright 2023-2026 The Khronos Group Inc.
//
// SPDX-License-Identifier: Apache-2.0

use std::error::Error as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vulkan_profiles_gen::{generate, Error, Result};

/// Generates the Vulkan profiles support library.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Use the specified registry file instead of vk.xml
    #[arg(long, default_value = "./library/scripts/vk.xml")]
    registry: PathBuf,

    /// Generate based on profiles in the specified directory
    #[arg(long, default_value = "./profiles")]
    profiles: PathBuf,

    /// Output include directory
    #[arg(long = "out-inc-dir", default_value = "./library/include/vulkan")]
    out_inc_dir: PathBuf,

    /// Output source directory
    #[arg(long = "out-src-dir", default_value = "./library/source")]
    out_src_dir: PathBuf,
}

fn run(args: &Args) -> Result<()> {
    let files = generate(&args.registry, &args.profiles)?;

    write_output(&args.out_inc_dir.join("vulkan_profiles.h"), &files.header)?;
    write_output(
        &args.out_inc_dir.join("vulkan_profiles.hpp"),
        &files.header_inline,
    )?;
    write_output(&args.out_src_dir.join("vulkan_profiles.cpp"), &files.source)?;
    Ok(())
}

fn write_output(path: &Path, text: &str) -> Result<()> {
    info!("Generating '{}'...", path.display());
    fs::write(path, text).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            let mut cause = err.source();
            while let Some(source) = cause {
                error!("  caused by: {source}");
                cause = source.source();
            }
            ExitCode::FAILURE
        }
    }
}
