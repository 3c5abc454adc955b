// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {rpm_repository::RpmRepositoryError, thiserror::Error};

/// Error type for this crate.
#[derive(Debug, Error)]
pub enum PackagesError {
    #[error("at least one package name must be specified")]
    MissingSearchName,

    #[error("cannot multiplex template {0:?}: {1}")]
    TemplateSyntax(String, String),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("URL parse error: {0:?}")]
    UrlParse(#[from] url::ParseError),

    #[error("repository error: {0}")]
    Repository(#[from] RpmRepositoryError),

    #[error("discovery of {0} failed: {1}")]
    Discovery(String, Box<PackagesError>),

    #[error("distro not supported: {0}")]
    UnsupportedDistribution(String),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, PackagesError>;
