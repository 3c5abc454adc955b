// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Resolved package records. */

use std::fmt::{Display, Formatter};

/// A package located in a repository.
///
/// Instances are immutable and only produced by package search stages.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Package {
    name: String,
    epoch: u64,
    version: String,
    release: String,
    architecture: String,
    location: String,
}

impl Package {
    pub fn new(
        name: impl ToString,
        epoch: u64,
        version: impl ToString,
        release: impl ToString,
        architecture: impl ToString,
        location: impl ToString,
    ) -> Self {
        Self {
            name: name.to_string(),
            epoch,
            version: version.to_string(),
            release: release.to_string(),
            architecture: architecture.to_string(),
            location: location.to_string(),
        }
    }

    /// The package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The display version: `<ver>+<rel>`.
    ///
    /// The epoch is not part of this string; see [Self::epoch()].
    pub fn version(&self) -> String {
        format!("{}+{}", self.version, self.release)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The upstream version component.
    pub fn upstream_version(&self) -> &str {
        &self.version
    }

    pub fn release(&self) -> &str {
        &self.release
    }

    /// The machine architecture, e.g. `x86_64`.
    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    /// Absolute URL of the package artifact.
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl Display for Package {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Name: {}\tVersion: {}\tArchitecture: {}\tLocation: {}",
            self.name,
            self.version(),
            self.architecture,
            self.location
        )
    }
}
