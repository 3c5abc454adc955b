// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Pipeline stages for locating packages in RPM repositories.

In pipeline order:

1. [mirror::MirrorRootSearcher] turns mirror roots into release directories.
2. [repository::RepoTemplateExpander] or [repository::RepoSearcher] turns
   release directories into candidate `repomd.xml` URLs.
3. [database::DbSearcher] turns `repomd.xml` URLs into primary database URLs.
4. [packages::PackageSearcher] turns primary database URLs into [crate::package::Package]s.

Every stage is best-effort. An input item that cannot be processed is logged
and dropped.
*/

pub mod database;
pub mod mirror;
pub mod packages;
pub mod repository;

pub use {
    database::DbSearcher,
    mirror::MirrorRootSearcher,
    packages::PackageSearcher,
    repository::{RepoSearcher, RepoTemplateExpander},
};
