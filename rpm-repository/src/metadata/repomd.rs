// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `repomd.xml` file format. */

use {
    crate::error::Result,
    serde::{Deserialize, Serialize},
    std::io::Read,
};

/// The `type` of the `<data>` entry pointing at the primary package database.
pub const DATA_TYPE_PRIMARY: &str = "primary";

/// A `repomd.xml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMd {
    /// Revision of the repository.
    ///
    /// Often an integer-like value.
    pub revision: Option<String>,
    /// Describes additional primary data files constituting this repository.
    #[serde(default)]
    pub data: Vec<RepoMdData>,
}

impl RepoMd {
    /// Construct an instance by parsing XML from a reader.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        Ok(serde_xml_rs::from_reader(reader)?)
    }

    /// Construct an instance by parsing XML from a string.
    pub fn from_xml(s: &str) -> Result<Self> {
        Ok(serde_xml_rs::from_str(s)?)
    }

    /// Iterate over `<data>` entries having the given type.
    pub fn data_of_type<'a>(
        &'a self,
        data_type: &'a str,
    ) -> impl Iterator<Item = &'a RepoMdData> {
        self.data
            .iter()
            .filter(move |entry| entry.data_type == data_type)
    }

    /// Iterate over `<data>` entries describing primary package databases.
    pub fn primary_entries(&self) -> impl Iterator<Item = &RepoMdData> {
        self.data_of_type(DATA_TYPE_PRIMARY)
    }
}

/// A `<data>` element in a `repomd.xml` file.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RepoMdData {
    /// The type of data.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Content checksum of this file.
    pub checksum: Option<Checksum>,
    /// Where the file is located, relative to the repository root.
    pub location: Location,
    /// Size in bytes of the file as stored in the repository.
    pub size: Option<u64>,
    /// Time file was created/modified.
    pub timestamp: Option<u64>,
    /// Content checksum of the decoded (often decompressed) file.
    #[serde(rename = "open-checksum")]
    pub open_checksum: Option<Checksum>,
    /// Size in bytes of the decoded (often decompressed) file.
    #[serde(rename = "open-size")]
    pub open_size: Option<u64>,
}

/// The content checksum of a `<data>` element.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Checksum {
    /// The name of the content digest.
    #[serde(rename = "type")]
    pub name: String,
    /// The hex encoded content digest.
    #[serde(rename = "$value")]
    pub value: String,
}

/// The location of a `<data>` or `<package>` element.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Location {
    pub href: String,
}
