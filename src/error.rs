// Copyright 2023-2026 The Khronos Group Inc.
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the generator can hit. All of them are fatal: the first
/// error aborts the run and the process exits non-zero.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to access '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed registry XML")]
    RegistryXml(#[from] roxmltree::Error),

    #[error("malformed profile file '{path}'")]
    ProfileJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The registry references something it never defines: a missing struct
    /// alias, an extension without a name enum, an unresolvable sType alias.
    #[error("registry inconsistency: {0}")]
    RegistryConsistency(String),

    /// Incompatible values met while merging capability fragments.
    #[error("profile capability conflict: {0}")]
    ProfileConflict(String),

    /// A profile references an extension or structure that is not reachable
    /// from its declared API version and extension set.
    #[error("unsatisfied profile dependency: {0}")]
    ProfileDependency(String),

    #[error("code generation failed: {0}")]
    Emitter(String),
}

impl Error {
    pub(crate) fn registry(msg: impl Into<String>) -> Self {
        Error::RegistryConsistency(msg.into())
    }

    pub(crate) fn conflict(msg: impl Into<String>) -> Self {
        Error::ProfileConflict(msg.into())
    }

    pub(crate) fn dependency(msg: impl Into<String>) -> Self {
        Error::ProfileDependency(msg.into())
    }

    pub(crate) fn emitter(msg: impl Into<String>) -> Self {
        Error::Emitter(msg.into())
    }
}
