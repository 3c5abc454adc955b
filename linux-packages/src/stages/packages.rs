// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package search within primary databases.

[PackageSearcher] streams each gzip compressed `primary.xml` database through
[rpm_repository::stream_primary_packages()], so only matching `<package>`
elements are ever materialized. Matches are emitted as they are parsed, with
their locations resolved against the repository root.
*/

use {
    crate::{
        error::{PackagesError, Result},
        package::Package,
        pipeline::{
            send, spawn_stage, ItemOutcome, PipelineConfig, ReportSink, SearchStage, Sink,
            Stream,
        },
    },
    log::warn,
    rpm_repository::{
        join_path, repository_root_from_data_url, stream_primary_packages, DataResolver,
        RpmRepositoryError,
    },
    std::sync::Arc,
    tokio_util::sync::CancellationToken,
    url::Url,
};

/// Name this stage reports under.
pub const STAGE: &str = "packages";

/// Filename suffix of supported primary databases.
pub const PRIMARY_DATABASE_SUFFIX: &str = ".xml.gz";

/// Finds packages by name in primary databases.
pub struct PackageSearcher {
    resolver: Arc<dyn DataResolver>,
    names: Vec<String>,
    config: PipelineConfig,
    reports: Option<ReportSink>,
}

impl PackageSearcher {
    pub fn new(
        resolver: Arc<dyn DataResolver>,
        names: impl IntoIterator<Item = impl ToString>,
    ) -> Self {
        Self {
            resolver,
            names: names.into_iter().map(|s| s.to_string()).collect(),
            config: PipelineConfig::default(),
            reports: None,
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Send this stage's report to `reports` once it finishes.
    pub fn with_reports(mut self, reports: ReportSink) -> Self {
        self.reports = Some(reports);
        self
    }

    /// The name packages are matched against.
    ///
    /// Only the first configured name takes part in matching.
    pub fn search_name(&self) -> Result<&str> {
        self.names
            .first()
            .map(|s| s.as_str())
            .ok_or(PackagesError::MissingSearchName)
    }
}

async fn search_primary(
    resolver: Arc<dyn DataResolver>,
    ctx: CancellationToken,
    name: Arc<str>,
    item: String,
    sink: Sink<Package>,
) -> Result<ItemOutcome> {
    let url = Url::parse(&item)?;

    let filename = url
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or_default();
    if !filename.ends_with(PRIMARY_DATABASE_SUFFIX) {
        return Ok(ItemOutcome::Skipped(
            RpmRepositoryError::UnsupportedDatabaseFormat(item).to_string(),
        ));
    }

    if ctx.is_cancelled() {
        return Ok(ItemOutcome::Skipped("cancelled".into()));
    }

    let root = repository_root_from_data_url(&url)?;
    let mut packages = stream_primary_packages(resolver.as_ref(), &url, &name).await?;

    let mut count = 0;
    loop {
        // Returning early drops the stream, which stops the parser.
        let package = tokio::select! {
            _ = ctx.cancelled() => return Ok(ItemOutcome::Skipped("cancelled".into())),
            package = packages.next() => match package {
                Some(package) => package,
                None => break,
            },
        };

        let location = join_path(&root, &package.location.href)?;
        let package = Package::new(
            package.name,
            package.version.epoch,
            package.version.version,
            package.version.release,
            package.arch,
            location,
        );

        if !send(STAGE, &sink, package).await {
            return Ok(ItemOutcome::Emitted(count));
        }
        count += 1;
    }

    packages.finish().await?;

    Ok(ItemOutcome::Emitted(count))
}

impl SearchStage for PackageSearcher {
    fn run(&self, ctx: CancellationToken, input: Stream<String>) -> Stream<Package> {
        let name: Arc<str> = match self.search_name() {
            Ok(name) => Arc::from(name),
            Err(e) => {
                warn!("{}; no packages will be searched", e);
                let (_, stream) = self.config.channel();
                return stream;
            }
        };

        if self.names.len() > 1 {
            warn!(
                "only the first package name is searched for; ignoring {}",
                self.names[1..].join(", ")
            );
        }

        let resolver = self.resolver.clone();
        let token = ctx.clone();

        spawn_stage(
            STAGE,
            &self.config,
            ctx,
            input,
            move |item, sink| {
                search_primary(resolver.clone(), token.clone(), name.clone(), item, sink)
            },
            self.reports.clone(),
        )
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::testutil::{gzip, EndlessPrimaryResolver, MemoryResolver, PRIMARY_XML},
        std::time::Duration,
        tokio::sync::mpsc,
    };

    const APPSTREAM: &str = "https://mirror.example.com/centos/8-stream/AppStream/x86_64/os/";

    fn primary_url() -> String {
        format!("{}repodata/abc123-primary.xml.gz", APPSTREAM)
    }

    fn mirror() -> MemoryResolver {
        let mut resolver = MemoryResolver::default();
        resolver.insert(&primary_url(), gzip(PRIMARY_XML));
        resolver.insert(
            &format!("{}repodata/abc123-primary.xml", APPSTREAM),
            PRIMARY_XML,
        );
        resolver.insert(
            &format!("{}repodata/corrupt-primary.xml.gz", APPSTREAM),
            b"definitely not gzip".to_vec(),
        );
        resolver
    }

    async fn run(stage: &PackageSearcher, items: &[String]) -> Vec<Package> {
        let (sink, input) = mpsc::channel(items.len().max(1));
        for item in items {
            sink.send(item.clone()).await.unwrap();
        }
        drop(sink);

        let mut output = stage.run(CancellationToken::new(), input);
        let mut res = vec![];
        while let Some(v) = output.recv().await {
            res.push(v);
        }
        res.sort_by(|a, b| a.location().cmp(b.location()));
        res
    }

    #[tokio::test]
    async fn no_names() {
        let stage = PackageSearcher::new(Arc::new(mirror()), Vec::<String>::new());
        assert!(matches!(
            stage.search_name(),
            Err(PackagesError::MissingSearchName)
        ));

        // The input is never closed, so only a stage that ignores it can finish.
        let (sink, input) = mpsc::channel(1);
        sink.send(primary_url()).await.unwrap();

        let mut output = stage.run(CancellationToken::new(), input);
        assert!(output.recv().await.is_none());
        drop(sink);
    }

    #[tokio::test]
    async fn matching_packages() -> Result<()> {
        let stage = PackageSearcher::new(Arc::new(mirror()), ["vim-common"]);

        let packages = run(&stage, &[primary_url()]).await;

        assert_eq!(
            packages,
            vec![
                Package::new(
                    "vim-common",
                    2,
                    "8.0.1763",
                    "15.el8",
                    "x86_64",
                    format!("{}Packages/vim-common-8.0.1763-15.el8.x86_64.rpm", APPSTREAM),
                ),
                Package::new(
                    "vim-common",
                    2,
                    "8.0.1763",
                    "16.el8",
                    "x86_64",
                    format!("{}Packages/vim-common-8.0.1763-16.el8.x86_64.rpm", APPSTREAM),
                ),
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn unsupported_and_broken_databases_are_dropped() {
        let stage = PackageSearcher::new(Arc::new(mirror()), ["vim-filesystem"]);

        let packages = run(
            &stage,
            &[
                format!("{}repodata/abc123-primary.xml", APPSTREAM),
                format!("{}repodata/abc123-primary.sqlite.xz", APPSTREAM),
                format!("{}repodata/corrupt-primary.xml.gz", APPSTREAM),
                format!("{}repodata/missing-primary.xml.gz", APPSTREAM),
                primary_url(),
            ],
        )
        .await;

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name(), "vim-filesystem");
        assert_eq!(packages[0].architecture(), "noarch");
        assert!(packages[0].location().ends_with(".noarch.rpm"));
    }

    #[tokio::test]
    async fn only_first_name_is_searched() {
        let stage = PackageSearcher::new(Arc::new(mirror()), ["vim-enhanced", "vim-common"]);

        let packages = run(&stage, &[primary_url()]).await;

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].name(), "vim-enhanced");
        assert_eq!(packages[0].version(), "8.0.1763+15.el8");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancellation_stops_database_parsing() {
        let stage = PackageSearcher::new(Arc::new(EndlessPrimaryResolver), ["vim-common"]);
        let ctx = CancellationToken::new();

        let (sink, input) = mpsc::channel(1);
        sink.send(primary_url()).await.unwrap();
        drop(sink);

        let mut output = stage.run(ctx.clone(), input);
        assert!(matches!(output.recv().await, Some(p) if p.name() == "vim-common"));

        // No further match ever arrives, so only cancellation can close the output.
        ctx.cancel();
        let closed = tokio::time::timeout(Duration::from_secs(10), output.recv()).await;
        assert!(matches!(closed, Ok(None)));
    }
}
