// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Locate Linux distribution packages across mirror networks.

Searching is a streaming pipeline (see [pipeline]). Mirror roots are expanded
into release directories, release directories into repository metadata URLs,
metadata into primary package databases, and primary databases into the
[package::Package]s whose name matches. Each step runs concurrently with the
others and emits results as soon as it has them.

[distro::centos::search_packages()] wires up the pipeline for CentOS.
*/

pub mod discovery;
pub mod distro;
pub mod error;
pub mod package;
pub mod pipeline;
pub mod stages;
pub mod template;

#[cfg(test)]
mod testutil;
