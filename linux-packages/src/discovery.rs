// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Discovery of files and directories on HTTP mirrors.

Stages never walk mirrors themselves. They describe what they are looking for
with [FindOptions] and hand that to a [Discover] implementation.
[HttpIndexFinder] is the stock implementation: it reads the HTML directory
listings (`autoindex` pages) that mirrors serve.
*/

use {
    crate::error::{PackagesError, Result},
    async_trait::async_trait,
    futures::StreamExt,
    log::debug,
    once_cell::sync::Lazy,
    regex::Regex,
    rpm_repository::{DataResolver, TransientKind},
    scraper::{Html, Selector},
    std::{
        collections::{HashMap, HashSet},
        sync::Arc,
        time::Duration,
    },
    url::Url,
};

static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Kind of filesystem entry to look for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileType {
    Directory,
    Regular,
}

/// Exponential backoff for retrying transient failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry. Doubles on each subsequent retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Maximum number of attempts, the initial one included.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Delay to wait before the given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 1u32 << (attempt - 1).min(16);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Describes a discovery run.
#[derive(Clone, Debug)]
pub struct FindOptions {
    /// Directory URLs to start from.
    pub seed_urls: Vec<String>,

    /// Entry names must match this.
    ///
    /// Directory names are matched with their trailing slash.
    pub filename_regex: Regex,

    /// Kind of entry to report.
    pub file_type: FileType,

    /// Whether to descend into subdirectories.
    pub recursive: bool,

    /// Retry policies per transient failure kind. Kinds without a policy are
    /// not retried.
    pub backoff: HashMap<TransientKind, BackoffPolicy>,
}

impl FindOptions {
    pub fn new(seed_urls: impl IntoIterator<Item = impl ToString>, filename_regex: &str) -> Result<Self> {
        Ok(Self {
            seed_urls: seed_urls.into_iter().map(|s| s.to_string()).collect(),
            filename_regex: Regex::new(filename_regex)?,
            file_type: FileType::Regular,
            recursive: false,
            backoff: HashMap::new(),
        })
    }

    pub fn with_file_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_backoff(mut self, kind: TransientKind, policy: BackoffPolicy) -> Self {
        self.backoff.insert(kind, policy);
        self
    }

    /// Retry connection resets, connection timeouts and deadlines with the
    /// default policy.
    pub fn with_default_backoff(self) -> Self {
        self.with_backoff(TransientKind::ConnectionReset, BackoffPolicy::default())
            .with_backoff(TransientKind::ConnectionTimeout, BackoffPolicy::default())
            .with_backoff(TransientKind::Deadline, BackoffPolicy::default())
    }
}

/// Finds files or directories beneath seed URLs.
#[async_trait]
pub trait Discover: Send + Sync {
    /// Obtain absolute URLs of every matching entry.
    async fn find(&self, options: &FindOptions) -> Result<Vec<String>>;
}

/// An entry of a directory listing.
#[derive(Clone, Debug, Eq, PartialEq)]
struct ListingEntry {
    url: Url,
    name: String,
    is_dir: bool,
}

fn as_directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        url.set_path(&format!("{}/", url.path()));
    }

    url
}

/// Extract child entries from an HTML directory listing of `dir`.
///
/// Only links that resolve beneath `dir` are kept.
fn parse_listing(dir: &Url, body: &str) -> Vec<ListingEntry> {
    let document = Html::parse_document(body);
    let mut seen = HashSet::new();

    let entries = document
        .select(&ANCHORS)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| {
            !(href.is_empty()
                || href.starts_with('?')
                || href.starts_with('#')
                || href.starts_with('/')
                || href.starts_with("..")
                || href.contains("://")
                || href.contains('?')
                || href.starts_with("mailto:"))
        })
        .filter_map(|href| {
            let href = href.trim_start_matches("./");
            let url = dir.join(&format!("./{}", href)).ok()?;

            if url == *dir || !url.as_str().starts_with(dir.as_str()) {
                return None;
            }

            let is_dir = href.ends_with('/');
            let base = href.trim_end_matches('/');
            let base = base.rsplit('/').next().unwrap_or(base);
            let name = if is_dir {
                format!("{}/", base)
            } else {
                base.to_string()
            };

            Some(ListingEntry { url, name, is_dir })
        })
        .filter(|entry| seen.insert(entry.url.clone()))
        .collect::<Vec<_>>();

    entries
}

/// Discovers entries by crawling HTML directory listings.
#[derive(Clone)]
pub struct HttpIndexFinder {
    resolver: Arc<dyn DataResolver>,
    max_concurrency: usize,
}

impl HttpIndexFinder {
    pub fn new(resolver: Arc<dyn DataResolver>) -> Self {
        Self {
            resolver,
            max_concurrency: 16,
        }
    }

    /// Set how many listings are fetched at once.
    pub fn with_max_concurrency(mut self, value: usize) -> Self {
        self.max_concurrency = value.max(1);
        self
    }

    async fn list(&self, dir: &Url, options: &FindOptions) -> Result<Vec<ListingEntry>> {
        let mut attempt = 0;

        loop {
            match self.resolver.get_url_text(dir).await {
                Ok(body) => return Ok(parse_listing(dir, &body)),
                Err(e) => {
                    let policy = e
                        .transient_kind()
                        .and_then(|kind| options.backoff.get(&kind));

                    match policy {
                        Some(policy) if attempt + 1 < policy.max_attempts => {
                            attempt += 1;
                            let delay = policy.delay_for_attempt(attempt);
                            debug!("listing {} failed ({}); retry {} in {:?}", dir, e, attempt, delay);
                            tokio::time::sleep(delay).await;
                        }
                        _ => return Err(e.into()),
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Discover for HttpIndexFinder {
    async fn find(&self, options: &FindOptions) -> Result<Vec<String>> {
        let seeds = options
            .seed_urls
            .iter()
            .map(|s| Url::parse(s).map(as_directory))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut visited = seeds.iter().cloned().collect::<HashSet<_>>();
        let mut found = vec![];
        let mut frontier = seeds.clone();

        while !frontier.is_empty() {
            let listings = futures::stream::iter(frontier.drain(..).map(|dir| async move {
                let listing = self.list(&dir, options).await;
                (dir, listing)
            }))
            .buffer_unordered(self.max_concurrency)
            .collect::<Vec<_>>()
            .await;

            let mut next = vec![];

            for (dir, listing) in listings {
                let entries = match listing {
                    Ok(entries) => entries,
                    Err(e) if seeds.contains(&dir) => {
                        return Err(PackagesError::Discovery(dir.to_string(), Box::new(e)));
                    }
                    Err(e) => {
                        debug!("skipping unlistable directory {}: {}", dir, e);
                        continue;
                    }
                };

                for entry in entries {
                    let wanted_type = match options.file_type {
                        FileType::Directory => entry.is_dir,
                        FileType::Regular => !entry.is_dir,
                    };

                    if wanted_type && options.filename_regex.is_match(&entry.name) {
                        found.push(entry.url.to_string());
                    }

                    if options.recursive && entry.is_dir && visited.insert(entry.url.clone()) {
                        next.push(entry.url);
                    }
                }
            }

            frontier = next;
        }

        Ok(found)
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::testutil::{FlakyResolver, MemoryResolver},
    };

    const HOMEDIR_BODY: &str = r#"
<html>
<head><title>Index of /mirror/</title></head>
<body>
<h1>Index of /mirror/</h1><hr><pre><a href="../">../</a>
<a href="?C=N;O=D">Name</a>
<a href="1/">1/</a>
<a href="2/">2/</a>
<a href="./3/">3/</a>
<a href="hello">hello/</a>
<a href="world">world/</a>
<a href="/centos/">Parent</a>
<a href="https://www.centos.org/">CentOS</a>
</pre><hr></body>
</html>
"#;

    fn subdir_body(dir: &str) -> String {
        format!(
            r#"<html><body><h1>Index of /mirror/{}/</h1><pre><a href="../">../</a>
<a href="Dir/">Dir/</a>
<a href="File">File</a>
</pre></body></html>"#,
            dir
        )
    }

    fn mirror() -> MemoryResolver {
        let mut resolver = MemoryResolver::default();
        resolver.insert("https://mirror.example.com/mirror/", HOMEDIR_BODY);
        for dir in ["1", "2", "3"] {
            resolver.insert(
                &format!("https://mirror.example.com/mirror/{}/", dir),
                subdir_body(dir),
            );
            resolver.insert(
                &format!("https://mirror.example.com/mirror/{}/Dir/", dir),
                r#"<a href="repodata/">repodata/</a>"#,
            );
            resolver.insert(
                &format!("https://mirror.example.com/mirror/{}/Dir/repodata/", dir),
                r#"<a href="repomd.xml">repomd.xml</a><a href="repomd.xml.asc">repomd.xml.asc</a>"#,
            );
        }
        resolver
    }

    #[test]
    fn backoff_delays() {
        let policy = BackoffPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            max_attempts: 5,
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(350));
    }

    #[test]
    fn listing_entries() -> Result<()> {
        let dir = Url::parse("https://mirror.example.com/mirror/")?;
        let entries = parse_listing(&dir, HOMEDIR_BODY);

        assert_eq!(
            entries
                .iter()
                .map(|e| (e.name.as_str(), e.is_dir))
                .collect::<Vec<_>>(),
            vec![
                ("1/", true),
                ("2/", true),
                ("3/", true),
                ("hello", false),
                ("world", false),
            ]
        );
        assert_eq!(
            entries[2].url.as_str(),
            "https://mirror.example.com/mirror/3/"
        );

        Ok(())
    }

    #[test]
    fn listing_markup() -> Result<()> {
        let dir = Url::parse("https://mirror.example.com/mirror/")?;
        let body = r#"<html><head>
<script>document.write('<a href="scripted/">scripted/</a>');</script>
</head><body><pre>
<!-- <a href="hidden/">hidden/</a> -->
<a href="a&amp;b/">a&amp;b/</a>
<A HREF=unquoted/>unquoted/</A>
<a name="anchor">no link</a>
</pre></body></html>"#;

        let entries = parse_listing(&dir, body);

        assert_eq!(
            entries
                .iter()
                .map(|e| (e.name.as_str(), e.url.as_str()))
                .collect::<Vec<_>>(),
            vec![
                ("a&b/", "https://mirror.example.com/mirror/a&b/"),
                ("unquoted/", "https://mirror.example.com/mirror/unquoted/"),
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn find_directories() -> Result<()> {
        let finder = HttpIndexFinder::new(Arc::new(mirror()));

        let options = FindOptions::new(["https://mirror.example.com/mirror"], r"^.+/?$")?
            .with_file_type(FileType::Directory)
            .with_recursive(false);

        let mut found = finder.find(&options).await?;
        found.sort();

        assert_eq!(
            found,
            vec![
                "https://mirror.example.com/mirror/1/",
                "https://mirror.example.com/mirror/2/",
                "https://mirror.example.com/mirror/3/",
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn find_files_recursively() -> Result<()> {
        let finder = HttpIndexFinder::new(Arc::new(mirror()));

        let options = FindOptions::new(["https://mirror.example.com/mirror/"], "repomd.xml$")?
            .with_file_type(FileType::Regular)
            .with_recursive(true);

        let mut found = finder.find(&options).await?;
        found.sort();

        assert_eq!(
            found,
            vec![
                "https://mirror.example.com/mirror/1/Dir/repodata/repomd.xml",
                "https://mirror.example.com/mirror/2/Dir/repodata/repomd.xml",
                "https://mirror.example.com/mirror/3/Dir/repodata/repomd.xml",
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn unreachable_seed() -> Result<()> {
        let finder = HttpIndexFinder::new(Arc::new(mirror()));
        let options = FindOptions::new(["https://mirror.example.com/elsewhere/"], ".+")?;

        assert!(matches!(
            finder.find(&options).await,
            Err(PackagesError::Discovery(..))
        ));

        Ok(())
    }

    #[tokio::test]
    async fn retries_connection_resets() -> Result<()> {
        let policy = BackoffPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            max_attempts: 3,
        };

        let options = FindOptions::new(["https://mirror.example.com/mirror/"], r"^.+/$")?
            .with_file_type(FileType::Directory)
            .with_backoff(TransientKind::ConnectionReset, policy);

        let finder = HttpIndexFinder::new(Arc::new(FlakyResolver::new(mirror(), 2)));
        assert_eq!(finder.find(&options).await?.len(), 3);

        // With a single attempt allowed, the first reset is final.
        let options = options.with_backoff(
            TransientKind::ConnectionReset,
            BackoffPolicy {
                max_attempts: 1,
                ..policy
            },
        );
        let finder = HttpIndexFinder::new(Arc::new(FlakyResolver::new(mirror(), 1)));
        assert!(finder.find(&options).await.is_err());

        Ok(())
    }
}
