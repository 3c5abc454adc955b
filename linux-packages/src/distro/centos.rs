// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! CentOS package search.

CentOS mirrors host one directory per release beneath their root, and each
release hosts a handful of repositories per machine architecture. The
`kernel.org` mirrors carry current releases under [MIRROR_EDGE] and retired
ones under [MIRROR_ARCHIVE].
*/

use {
    crate::{
        discovery::{Discover, HttpIndexFinder},
        error::Result,
        package::Package,
        pipeline::{
            report_channel, run_search_pipeline, GenericProducer, PipelineConfig, ReportStream,
            Stage, Stream,
        },
        stages::{DbSearcher, MirrorRootSearcher, PackageSearcher, RepoSearcher, RepoTemplateExpander},
        template::VariableInventory,
    },
    rpm_repository::{
        http::{HttpConfig, HttpDataResolver},
        DataResolver,
    },
    std::sync::Arc,
    tokio_util::sync::CancellationToken,
};

pub const MIRROR_EDGE: &str = "https://mirrors.edge.kernel.org/centos/";
pub const MIRROR_ARCHIVE: &str = "https://archive.kernel.org/centos-vault/";

/// Release directory names. Any directory qualifies.
pub const VERSION_REGEX: &str = r"^.+/?$";

/// Repository metadata filenames looked for when crawling.
pub const REPOMD_REGEX: &str = "repomd.xml$";

/// Template variable holding machine architectures.
pub const ARCH_VARIABLE: &str = "arch";

pub const X86_64: &str = "x86_64";
pub const AARCH64: &str = "aarch64";
pub const I686: &str = "i686";
pub const PPC64LE: &str = "ppc64le";

pub const DEFAULT_MIRRORS: &[&str] = &[MIRROR_EDGE, MIRROR_ARCHIVE];

pub const DEFAULT_ARCHITECTURES: &[&str] = &[X86_64, AARCH64, I686, PPC64LE];

/// Repository metadata locations relative to a release directory.
pub const DEFAULT_REPOSITORY_TEMPLATES: &[&str] = &[
    "/AppStream/{{ .arch }}/os/repodata/repomd.xml",
    "/BaseOS/{{ .arch }}/os/repodata/repomd.xml",
    "/Devel/{{ .arch }}/os/repodata/repomd.xml",
    "/os/{{ .arch }}/repodata/repomd.xml",
];

/// How repositories are located within a release.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RepoStrategy {
    /// Expand repository templates for every architecture.
    Templates,
    /// Crawl the release directory for `repomd.xml` files.
    Crawl,
}

impl Default for RepoStrategy {
    fn default() -> Self {
        Self::Templates
    }
}

/// Settings for a CentOS package search.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Mirror roots to search.
    pub mirrors: Vec<String>,
    /// Package names to search for.
    pub names: Vec<String>,
    /// Architectures substituted into repository templates.
    pub architectures: Vec<String>,
    pub templates: Vec<String>,
    pub strategy: RepoStrategy,
    pub pipeline: PipelineConfig,
    pub http: HttpConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mirrors: DEFAULT_MIRRORS.iter().map(|s| s.to_string()).collect(),
            names: vec![],
            architectures: DEFAULT_ARCHITECTURES.iter().map(|s| s.to_string()).collect(),
            templates: DEFAULT_REPOSITORY_TEMPLATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            strategy: RepoStrategy::default(),
            pipeline: PipelineConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Search the default mirrors for the given package names.
    pub fn new(names: impl IntoIterator<Item = impl ToString>) -> Self {
        Self {
            names: names.into_iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn variables(&self) -> VariableInventory {
        let mut variables = VariableInventory::default();
        variables.insert(ARCH_VARIABLE, &self.architectures);
        variables
    }
}

/// A running package search.
pub struct PackageSearch {
    /// Matches, in no particular order.
    pub packages: Stream<Package>,

    /// The report of every stage, each sent before that stage's output closes.
    ///
    /// Once `packages` is exhausted every report is waiting here.
    pub reports: ReportStream,
}

/// Search CentOS mirrors over HTTP.
///
/// Packages are streamed as they are found, in no particular order. Mirrors,
/// repositories or databases that cannot be processed are skipped and counted
/// in the stage reports.
pub fn search_packages(ctx: CancellationToken, config: &SearchConfig) -> Result<PackageSearch> {
    let resolver: Arc<dyn DataResolver> = Arc::new(HttpDataResolver::from_config(&config.http)?);
    let discover = Arc::new(
        HttpIndexFinder::new(resolver.clone()).with_max_concurrency(config.pipeline.max_concurrency),
    );

    search_packages_with(ctx, config, resolver, discover)
}

/// Search CentOS mirrors through the given collaborators.
pub fn search_packages_with(
    ctx: CancellationToken,
    config: &SearchConfig,
    resolver: Arc<dyn DataResolver>,
    discover: Arc<dyn Discover>,
) -> Result<PackageSearch> {
    let (reports, report_stream) = report_channel();

    let producer = GenericProducer::new(&config.mirrors).with_config(config.pipeline);

    let versions = MirrorRootSearcher::new(discover.clone(), VERSION_REGEX)?
        .with_config(config.pipeline)
        .with_reports(reports.clone());

    let repos: Box<dyn Stage> = match config.strategy {
        RepoStrategy::Templates => Box::new(
            RepoTemplateExpander::new(&config.templates, config.variables())?
                .with_config(config.pipeline)
                .with_reports(reports.clone()),
        ),
        RepoStrategy::Crawl => Box::new(
            RepoSearcher::new(discover, REPOMD_REGEX)?
                .with_config(config.pipeline)
                .with_reports(reports.clone()),
        ),
    };

    let databases = DbSearcher::new(resolver.clone())
        .with_config(config.pipeline)
        .with_reports(reports.clone());
    let packages = PackageSearcher::new(resolver, &config.names)
        .with_config(config.pipeline)
        .with_reports(reports);

    Ok(PackageSearch {
        packages: run_search_pipeline(
            ctx,
            &producer,
            &packages,
            &[&versions, repos.as_ref(), &databases],
        ),
        reports: report_stream,
    })
}
