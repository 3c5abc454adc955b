// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    async_compression::futures::bufread::{GzipDecoder, XzDecoder, ZstdDecoder},
    futures::{AsyncBufRead, AsyncRead},
    std::{
        io::Read,
        pin::Pin,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
    },
    tokio_util::{compat::FuturesAsyncReadCompatExt, io::SyncIoBridge},
};

/// Compression format.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Compression {
    /// No compression.
    None,
    /// Gzip compression.
    Gzip,
    /// Xz compression.
    Xz,
    /// Zstd compression.
    Zstd,
}

impl Compression {
    /// Derive the compression format from a path or URL's filename extension.
    pub fn from_path(path: &str) -> Self {
        match path {
            _ if path.ends_with(".gz") => Self::Gzip,
            _ if path.ends_with(".xz") => Self::Xz,
            _ if path.ends_with(".zst") => Self::Zstd,
            _ => Self::None,
        }
    }
}

pub fn read_decompressed<'a>(
    stream: impl AsyncBufRead + Send + 'a,
    compression: Compression,
) -> Pin<Box<dyn AsyncRead + Send + 'a>> {
    match compression {
        Compression::None => Box::pin(stream),
        Compression::Gzip => Box::pin(GzipDecoder::new(stream)),
        Compression::Xz => Box::pin(XzDecoder::new(stream)),
        Compression::Zstd => Box::pin(ZstdDecoder::new(stream)),
    }
}

/// Adapt an async reader into a blocking [std::io::Read].
///
/// Reads block the calling thread until the async source yields data. The
/// returned reader must only be consumed off the async executor, e.g. inside
/// [tokio::task::spawn_blocking]. Must be called from within a Tokio runtime.
pub fn blocking_reader(
    reader: Pin<Box<dyn AsyncRead + Send>>,
) -> impl std::io::Read + Send + 'static {
    SyncIoBridge::new(reader.compat())
}

/// A [Read] that fails every read once a shared flag is raised.
///
/// This stops a blocking consumer at its next read, from any thread.
pub struct AbortableReader<R> {
    inner: R,
    abort: Arc<AtomicBool>,
}

impl<R> AbortableReader<R> {
    pub fn new(inner: R, abort: Arc<AtomicBool>) -> Self {
        Self { inner, abort }
    }
}

impl<R: Read> Read for AbortableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.abort.load(Ordering::Acquire) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "read aborted",
            ));
        }

        self.inner.read(buf)
    }
}
