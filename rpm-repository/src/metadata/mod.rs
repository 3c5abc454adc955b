// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! RPM repository metadata XML definitions.

A repository's `repodata/repomd.xml` ([repomd::RepoMd]) points at the databases
describing the repository. Of those, the primary database ([primary]) lists every
package along with its version and location.
*/

pub mod primary;
pub mod repomd;
