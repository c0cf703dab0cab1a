// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

/// Link rejection, the only failure the wiring layer can produce.
///
/// A rejected registration leaves both halves exactly as they were;
/// retrying, picking another peer, or giving up is the caller's policy.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("sink port '{0}' is already linked to a different source")]
    SinkAlreadyLinked(String),

    #[error("source port '{0}' is already linked to a different sink")]
    SourceAlreadyLinked(String),
}

pub type Result<T> = std::result::Result<T, LinkError>;
