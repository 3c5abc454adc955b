// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! HTTP fetching of repository content.

A single pooled [Client] is shared by everything fetching from mirrors. Requests
that fail because the peer reset the connection are retried exactly once after
a short fixed delay; every other failure, including non-200 responses, is
reported to the caller.
*/

use {
    crate::{
        error::{transient_kind_of_http, Result, RpmRepositoryError, TransientKind},
        DataResolver,
    },
    async_trait::async_trait,
    futures::{AsyncRead, TryStreamExt},
    log::debug,
    reqwest::{Client, ClientBuilder, Response, StatusCode, Url},
    std::{pin::Pin, time::Duration},
};

/// Default HTTP user agent string.
pub const USER_AGENT: &str = "rpm-repository Rust crate (https://crates.io/crates/rpm-repository)";

/// Settings for the pooled HTTP client.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Timeout for establishing a connection, TLS handshake included.
    pub connect_timeout: Duration,

    /// TCP keep-alive interval.
    pub tcp_keepalive: Duration,

    /// Maximum idle connections kept per host.
    pub pool_max_idle_per_host: usize,

    /// How long idle connections are kept.
    pub pool_idle_timeout: Duration,

    /// Overall per-request deadline. None means unbounded.
    pub request_timeout: Option<Duration>,

    /// User agent sent with requests.
    pub user_agent: String,

    /// Delay before the single retry of a request whose connection was reset.
    pub reset_retry_delay: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(60),
            tcp_keepalive: Duration::from_secs(30),
            pool_max_idle_per_host: 1000,
            pool_idle_timeout: Duration::from_secs(120),
            request_timeout: None,
            user_agent: USER_AGENT.to_string(),
            reset_retry_delay: Duration::from_secs(1),
        }
    }
}

impl HttpConfig {
    /// Obtain a [ClientBuilder] reflecting these settings.
    pub fn client_builder(&self) -> ClientBuilder {
        let builder = ClientBuilder::new()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(self.connect_timeout)
            .tcp_keepalive(self.tcp_keepalive)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .pool_idle_timeout(self.pool_idle_timeout);

        if let Some(timeout) = self.request_timeout {
            builder.timeout(timeout)
        } else {
            builder
        }
    }
}

async fn send_with_reset_retry(client: &Client, url: &Url, delay: Duration) -> Result<Response> {
    match client.get(url.clone()).send().await {
        Ok(res) => Ok(res),
        Err(e) if transient_kind_of_http(&e) == Some(TransientKind::ConnectionReset) => {
            debug!("connection reset fetching {}; retrying once in {:?}", url, delay);
            tokio::time::sleep(delay).await;

            client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| RpmRepositoryError::HttpRequest(url.to_string(), e))
        }
        Err(e) => Err(RpmRepositoryError::HttpRequest(url.to_string(), e)),
    }
}

async fn fetch_url(
    client: &Client,
    url: &Url,
    reset_retry_delay: Duration,
) -> Result<Pin<Box<dyn AsyncRead + Send>>> {
    let res = send_with_reset_retry(client, url, reset_retry_delay).await?;

    if res.status() != StatusCode::OK {
        return Err(RpmRepositoryError::HttpStatus(
            url.to_string(),
            res.status(),
        ));
    }

    Ok(Box::pin(
        res.bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("{:?}", e)))
            .into_async_read(),
    ))
}

/// Fetches repository content over HTTP.
///
/// Cloning is cheap: clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct HttpDataResolver {
    /// HTTP client to use.
    client: Client,

    /// Delay before retrying a reset connection.
    reset_retry_delay: Duration,
}

impl HttpDataResolver {
    /// Construct an instance using default settings.
    pub fn new() -> Result<Self> {
        Self::from_config(&HttpConfig::default())
    }

    /// Construct an instance from explicit settings.
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: config.client_builder().build()?,
            reset_retry_delay: config.reset_retry_delay,
        })
    }
}

#[async_trait]
impl DataResolver for HttpDataResolver {
    async fn get_url(&self, url: &Url) -> Result<Pin<Box<dyn AsyncRead + Send>>> {
        fetch_url(&self.client, url, self.reset_retry_delay).await
    }
}
