// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! `primary.xml` file format.

Primary databases routinely decompress to hundreds of megabytes, so rather than
deserializing the whole document this module exposes [PackageNameFilter], a pull
parser that walks `<package>` elements one at a time and only materializes the
ones whose `<name>` matches.
*/

use {
    crate::{error::Result, metadata::repomd::Location},
    serde::{Deserialize, Serialize},
    std::io::Read,
    xml::{
        attribute::OwnedAttribute,
        reader::{Events, ParserConfig, XmlEvent},
    },
};

/// A package as advertised in a `primary.xml` file.
///
/// Only identity and location metadata is retained.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Package {
    /// The type/flavor of a package.
    ///
    /// e.g. `rpm`.
    #[serde(rename = "type")]
    pub package_type: String,

    /// The name of the package.
    pub name: String,

    /// The machine architecture the package is targeting.
    pub arch: String,

    /// The package version.
    pub version: PackageVersion,

    /// A text summary of the package.
    pub summary: Option<String>,

    /// Where the package can be obtained from, relative to the repository root.
    pub location: Location,
}

/// Describes a package version.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PackageVersion {
    /// When the version came into existence.
    pub epoch: u64,

    /// Version string.
    #[serde(rename = "ver")]
    pub version: String,

    /// Release string.
    #[serde(rename = "rel")]
    pub release: String,
}

/// Child elements of `<package>` whose text content we capture.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TextField {
    Name,
    Arch,
    Summary,
}

/// Streaming filter yielding `<package>` elements with a given `<name>`.
///
/// Non-matching elements are discarded as soon as their name is known. A
/// matching element missing its location, or carrying an unparsable epoch, is
/// dropped rather than emitted half-populated.
pub struct PackageNameFilter<R: Read> {
    events: Events<R>,
    name: String,
    finished: bool,
}

impl<R: Read> PackageNameFilter<R> {
    /// Construct an instance filtering XML read from `reader` against `name`.
    pub fn new(reader: R, name: impl ToString) -> Self {
        let events = ParserConfig::new()
            .trim_whitespace(true)
            .cdata_to_characters(true)
            .create_reader(reader)
            .into_iter();

        Self {
            events,
            name: name.to_string(),
            finished: false,
        }
    }
}

/// Per-`<package>` parse state.
#[derive(Default)]
struct PackageState {
    package: Package,
    depth: usize,
    field: Option<TextField>,
    text: String,
    rejected: bool,
    name_seen: bool,
}

impl PackageState {
    fn start_child(&mut self, local_name: &str, attributes: &[OwnedAttribute]) {
        match local_name {
            "name" => self.field = Some(TextField::Name),
            "arch" => self.field = Some(TextField::Arch),
            "summary" => self.field = Some(TextField::Summary),
            "version" => {
                for attr in attributes {
                    match attr.name.local_name.as_str() {
                        "epoch" => match attr.value.parse::<u64>() {
                            Ok(epoch) => self.package.version.epoch = epoch,
                            Err(_) => self.rejected = true,
                        },
                        "ver" => self.package.version.version = attr.value.clone(),
                        "rel" => self.package.version.release = attr.value.clone(),
                        _ => {}
                    }
                }
            }
            "location" => {
                if let Some(href) = attribute(attributes, "href") {
                    self.package.location.href = href.to_string();
                }
            }
            _ => {}
        }

        self.text.clear();
    }

    fn end_child(&mut self, wanted: &str) {
        let text = self.text.trim().to_string();

        match self.field.take() {
            Some(TextField::Name) => {
                self.name_seen = true;
                if text != wanted {
                    self.rejected = true;
                }
                self.package.name = text;
            }
            Some(TextField::Arch) => self.package.arch = text,
            Some(TextField::Summary) => self.package.summary = Some(text),
            None => {}
        }
    }

    fn finish(self) -> Option<Package> {
        if self.rejected || !self.name_seen || self.package.location.href.is_empty() {
            None
        } else {
            Some(self.package)
        }
    }
}

fn attribute<'a>(attributes: &'a [OwnedAttribute], local_name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|attr| attr.name.local_name == local_name)
        .map(|attr| attr.value.as_str())
}

impl<R: Read> Iterator for PackageNameFilter<R> {
    type Item = Result<Package>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut state: Option<PackageState> = None;

        for event in self.events.by_ref() {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
            };

            match event {
                XmlEvent::StartElement {
                    name, attributes, ..
                } => match state.as_mut() {
                    None if name.local_name == "package" => {
                        let mut st = PackageState {
                            depth: 1,
                            ..Default::default()
                        };
                        if let Some(value) = attribute(&attributes, "type") {
                            st.package.package_type = value.to_string();
                        }
                        state = Some(st);
                    }
                    None => {}
                    Some(st) => {
                        st.depth += 1;

                        if st.depth == 2 && !st.rejected {
                            st.start_child(&name.local_name, &attributes);
                        }
                    }
                },
                XmlEvent::Characters(text) => {
                    if let Some(st) = state.as_mut() {
                        if st.field.is_some() {
                            st.text.push_str(&text);
                        }
                    }
                }
                XmlEvent::EndElement { .. } => {
                    if let Some(st) = state.as_mut() {
                        if st.depth == 2 && !st.rejected {
                            st.end_child(&self.name);
                        }

                        st.depth -= 1;

                        if st.depth == 0 {
                            if let Some(package) = state.take().and_then(PackageState::finish) {
                                return Some(Ok(package));
                            }
                        }
                    }
                }
                XmlEvent::EndDocument => {
                    break;
                }
                _ => {}
            }
        }

        self.finished = true;
        None
    }
}
