// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Test doubles for resolvers and discovery.

use {
    crate::{
        discovery::{Discover, FindOptions},
        error::{PackagesError, Result},
    },
    async_trait::async_trait,
    futures::{AsyncRead, StreamExt, TryStreamExt},
    rpm_repository::{io::Compression, DataResolver, RpmRepositoryError},
    std::{
        collections::HashMap,
        io::Write,
        pin::Pin,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    },
    url::Url,
};

pub const PRIMARY_XML: &[u8] =
    include_bytes!("../../rpm-repository/src/testdata/centos-8-stream-appstream-primary.xml");

pub const REPOMD_XML: &[u8] =
    include_bytes!("../../rpm-repository/src/testdata/centos-8-stream-baseos-repomd.xml");

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn not_found(url: &Url) -> RpmRepositoryError {
    RpmRepositoryError::IoPath(
        url.to_string(),
        std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
    )
}

/// Serves content from memory, keyed by absolute URL.
#[derive(Clone, Debug, Default)]
pub struct MemoryResolver {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryResolver {
    pub fn insert(&mut self, url: &str, data: impl Into<Vec<u8>>) {
        self.files.insert(url.to_string(), data.into());
    }
}

#[async_trait]
impl DataResolver for MemoryResolver {
    async fn get_url(
        &self,
        url: &Url,
    ) -> rpm_repository::Result<Pin<Box<dyn AsyncRead + Send>>> {
        match self.files.get(url.as_str()) {
            Some(data) => Ok(Box::pin(futures::io::Cursor::new(data.clone()))),
            None => Err(not_found(url)),
        }
    }
}

/// Resets the connection for the first few requests, then defers to another resolver.
pub struct FlakyResolver {
    inner: MemoryResolver,
    failures: AtomicUsize,
}

impl FlakyResolver {
    pub fn new(inner: MemoryResolver, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl DataResolver for FlakyResolver {
    async fn get_url(
        &self,
        url: &Url,
    ) -> rpm_repository::Result<Pin<Box<dyn AsyncRead + Send>>> {
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if fail {
            Err(RpmRepositoryError::IoPath(
                url.to_string(),
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer"),
            ))
        } else {
            self.inner.get_url(url).await
        }
    }
}

/// Serves a primary database that never ends, whatever the URL.
///
/// One `vim-common` package comes first, then other packages forever. Content
/// is served as is, without decompression.
pub struct EndlessPrimaryResolver;

#[async_trait]
impl DataResolver for EndlessPrimaryResolver {
    async fn get_url(
        &self,
        _: &Url,
    ) -> rpm_repository::Result<Pin<Box<dyn AsyncRead + Send>>> {
        let head = br#"<?xml version="1.0" encoding="UTF-8"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" packages="0">
<package type="rpm"><name>vim-common</name><arch>x86_64</arch><version epoch="2" ver="8.0.1763" rel="15.el8"/><location href="Packages/vim-common-8.0.1763-15.el8.x86_64.rpm"/></package>
"#
        .to_vec();
        let filler = br#"<package type="rpm"><name>zsh</name><arch>x86_64</arch><version epoch="0" ver="5.5.1" rel="10.el8"/><location href="Packages/zsh-5.5.1-10.el8.x86_64.rpm"/></package>
"#
        .to_vec();

        let body = futures::stream::iter(vec![head])
            .chain(futures::stream::repeat(filler))
            .map(Ok::<_, std::io::Error>);

        Ok(Box::pin(body.into_async_read()))
    }

    async fn get_url_decompressed(
        &self,
        url: &Url,
        _: Compression,
    ) -> rpm_repository::Result<Pin<Box<dyn AsyncRead + Send>>> {
        self.get_url(url).await
    }
}

/// Answers discovery requests from a fixed table of seed to results.
#[derive(Default)]
pub struct StubDiscover {
    results: HashMap<String, Vec<String>>,
    requests: Mutex<Vec<FindOptions>>,
}

impl StubDiscover {
    pub fn insert(&mut self, seed: &str, results: &[&str]) {
        self.results.insert(
            seed.to_string(),
            results.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Options of every `find` call so far.
    pub fn requests(&self) -> Vec<FindOptions> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Discover for StubDiscover {
    async fn find(&self, options: &FindOptions) -> Result<Vec<String>> {
        self.requests.lock().unwrap().push(options.clone());

        let mut found = vec![];
        for seed in &options.seed_urls {
            match self.results.get(seed) {
                Some(results) => found.extend(results.iter().cloned()),
                None => {
                    return Err(PackagesError::Discovery(
                        seed.clone(),
                        Box::new(not_found(&Url::parse(seed)?).into()),
                    ))
                }
            }
        }

        Ok(found)
    }
}
