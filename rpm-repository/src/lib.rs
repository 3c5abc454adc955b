// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! RPM repository interaction.

This crate facilitates locating packages in RPM package repositories.

RPM repositories are defined by a base URL. Under that base URL is typically a
`repodata` directory containing a `repomd.xml` file. This `repomd.xml` file
(represented by [metadata::repomd::RepoMd]) describes other _metadata_
files constituting the repository, most importantly the _primary_ database
listing every package.

The [DataResolver] trait defines a generic read interface over absolute URLs.
[http::HttpDataResolver] implements it for content served via HTTP.

Primary databases are large. [stream_primary_packages()] decompresses and
filters one without ever holding the whole document in memory, handing back
matching [metadata::primary::Package] records as they are parsed.
*/

pub mod error;
pub mod http;
pub mod io;
pub mod metadata;

pub use crate::error::{Result, RpmRepositoryError, TransientKind};

use {
    crate::{
        io::{blocking_reader, read_decompressed, AbortableReader, Compression},
        metadata::{
            primary::{Package, PackageNameFilter},
            repomd::RepoMd,
        },
    },
    async_trait::async_trait,
    futures::{AsyncRead, AsyncReadExt},
    std::{
        pin::Pin,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
    },
    tokio::{sync::mpsc, task::JoinHandle},
    url::Url,
};

/// Name of the directory holding repository metadata.
pub const REPODATA_DIR: &str = "repodata";

/// URL based content fetching.
#[async_trait]
pub trait DataResolver: Send + Sync {
    /// Get the content of a URL as an async reader.
    async fn get_url(&self, url: &Url) -> Result<Pin<Box<dyn AsyncRead + Send>>>;

    /// Get the content of a URL, transparently applying decompression.
    async fn get_url_decompressed(
        &self,
        url: &Url,
        compression: Compression,
    ) -> Result<Pin<Box<dyn AsyncRead + Send>>> {
        let reader = self.get_url(url).await?;

        Ok(read_decompressed(
            futures::io::BufReader::new(reader),
            compression,
        ))
    }

    /// Get the content of a URL as a string.
    async fn get_url_text(&self, url: &Url) -> Result<String> {
        let mut reader = self.get_url(url).await?;

        let mut s = String::new();
        reader
            .read_to_string(&mut s)
            .await
            .map_err(|e| RpmRepositoryError::IoPath(url.to_string(), e))?;

        Ok(s)
    }

    /// Fetch and parse a `repomd.xml` file.
    async fn fetch_repomd(&self, url: &Url) -> Result<RepoMd> {
        let mut reader = self.get_url(url).await?;

        let mut data = vec![];
        reader
            .read_to_end(&mut data)
            .await
            .map_err(|e| RpmRepositoryError::IoPath(url.to_string(), e))?;

        RepoMd::from_reader(std::io::Cursor::new(data))
    }
}

/// Join a relative path onto a base URL.
///
/// The base is treated as a directory whether or not it carries a trailing
/// slash, and leading slashes on `path` are ignored.
pub fn join_path(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();

    // Trailing URLs are significant to the Url type when we .join(). So ensure
    // the URL has a trailing path.
    if !base.path().ends_with('/') {
        base.set_path(&format!("{}/", base.path()));
    }

    // The ./ prefix keeps names containing `:` from parsing as a scheme.
    Ok(base.join(&format!("./{}", path.trim_start_matches('/')))?)
}

/// Resolve the repository root of a `.../repodata/repomd.xml` URL.
///
/// This is the parent of the directory containing the metadata file.
pub fn repository_root_from_metadata_url(url: &Url) -> Result<Url> {
    Ok(url.join("../")?)
}

/// Resolve the repository root of a URL pointing inside a `repodata` directory.
///
/// The URL is cut at its first `repodata` path segment.
pub fn repository_root_from_data_url(url: &Url) -> Result<Url> {
    let segments = url
        .path_segments()
        .ok_or_else(|| RpmRepositoryError::CannotBeABase(url.to_string()))?
        .collect::<Vec<_>>();

    let position = segments
        .iter()
        .position(|s| *s == REPODATA_DIR)
        .ok_or_else(|| RpmRepositoryError::NoRepodataSegment(url.to_string()))?;

    let mut root = url.clone();
    root.set_query(None);
    root.set_fragment(None);
    root.set_path(&segments[..position].iter().fold(String::from("/"), |acc, s| {
        format!("{}{}/", acc, s)
    }));

    Ok(root)
}

/// Packages being streamed out of a primary database.
///
/// Parsing happens on a blocking thread. Dropping this value, or calling
/// [Self::abort()], stops the parser at its next read of the document.
pub struct PrimaryPackages {
    receiver: mpsc::Receiver<Package>,
    parser: JoinHandle<Result<usize>>,
    abort: Arc<AtomicBool>,
    url: Url,
}

impl PrimaryPackages {
    /// Obtain the next matching package.
    ///
    /// Returns None once the document is exhausted or parsing failed.
    pub async fn next(&mut self) -> Option<Package> {
        self.receiver.recv().await
    }

    /// Stop parsing without waiting for the rest of the document.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    /// Wait for the parser to finish, returning how many packages it emitted.
    ///
    /// Errors if the document could not be read or parsed to completion,
    /// including when parsing was aborted.
    pub async fn finish(mut self) -> Result<usize> {
        self.receiver.close();

        let joined = (&mut self.parser).await;
        joined.map_err(|e| {
            RpmRepositoryError::IoPath(
                self.url.to_string(),
                std::io::Error::new(std::io::ErrorKind::Other, e),
            )
        })?
    }
}

impl Drop for PrimaryPackages {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Stream packages named `name` out of the primary database at `url`.
///
/// Decompression is chosen from the URL's filename extension. The body is
/// decompressed and parsed incrementally as it arrives.
pub async fn stream_primary_packages(
    resolver: &(impl DataResolver + ?Sized),
    url: &Url,
    name: &str,
) -> Result<PrimaryPackages> {
    let compression = Compression::from_path(url.path());
    let reader = blocking_reader(resolver.get_url_decompressed(url, compression).await?);

    let (sender, receiver) = mpsc::channel(16);
    let abort = Arc::new(AtomicBool::new(false));
    let reader = AbortableReader::new(reader, abort.clone());
    let name = name.to_string();

    let parser = tokio::task::spawn_blocking(move || -> Result<usize> {
        let mut count = 0;

        for package in PackageNameFilter::new(std::io::BufReader::new(reader), name) {
            if sender.blocking_send(package?).is_err() {
                break;
            }
            count += 1;
        }

        Ok(count)
    });

    Ok(PrimaryPackages {
        receiver,
        parser,
        abort,
        url: url.clone(),
    })
}
