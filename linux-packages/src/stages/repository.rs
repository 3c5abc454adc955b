// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Repository candidate resolution.

Two interchangeable stages turn release directories into candidate
`repomd.xml` URLs. [RepoTemplateExpander] joins precomputed template paths
onto each directory and touches no network. [RepoSearcher] crawls the
directory tree looking for metadata files, which is slow but also finds
repositories laid out in unexpected ways.
*/

use {
    crate::{
        discovery::{Discover, FileType, FindOptions},
        error::Result,
        pipeline::{send, spawn_stage, ItemOutcome, PipelineConfig, ReportSink, Sink, Stage, Stream},
        template::{MultiplexTemplate, VariableInventory},
    },
    rpm_repository::join_path,
    std::sync::Arc,
    tokio_util::sync::CancellationToken,
    url::Url,
};

/// Crawls release directories for repository metadata files.
pub struct RepoSearcher {
    discover: Arc<dyn Discover>,
    options: FindOptions,
    config: PipelineConfig,
    reports: Option<ReportSink>,
}

impl RepoSearcher {
    /// Construct an instance matching file names against `filename_regex`.
    pub fn new(discover: Arc<dyn Discover>, filename_regex: &str) -> Result<Self> {
        let options = FindOptions::new(Vec::<String>::new(), filename_regex)?
            .with_file_type(FileType::Regular)
            .with_recursive(true)
            .with_default_backoff();

        Ok(Self {
            discover,
            options,
            config: PipelineConfig::default(),
            reports: None,
        })
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
}

async fn crawl_release(
    discover: Arc<dyn Discover>,
    options: FindOptions,
    ctx: CancellationToken,
    release: String,
    sink: Sink<String>,
) -> Result<ItemOutcome> {
    if ctx.is_cancelled() {
        return Ok(ItemOutcome::Skipped("cancelled".into()));
    }

    let options = FindOptions {
        seed_urls: vec![release],
        ..options
    };

    let mut count = 0;
    for url in discover.find(&options).await? {
        if ctx.is_cancelled() || !send("repo-crawl", &sink, url).await {
            break;
        }
        count += 1;
    }

    Ok(ItemOutcome::Emitted(count))
}

impl Stage for RepoSearcher {
    fn run(&self, ctx: CancellationToken, input: Stream<String>) -> Stream<String> {
        let discover = self.discover.clone();
        let options = self.options.clone();
        let token = ctx.clone();

        spawn_stage(
            "repo-crawl",
            &self.config,
            ctx,
            input,
            move |release, sink| {
                crawl_release(discover.clone(), options.clone(), token.clone(), release, sink)
            },
            self.reports.clone(),
        )
    }
}

/// Expands repository path templates beneath release directories.
pub struct RepoTemplateExpander {
    paths: Arc<Vec<String>>,
    config: PipelineConfig,
    reports: Option<ReportSink>,
}

impl RepoTemplateExpander {
    /// Construct an instance from templates and the variables they reference.
    ///
    /// Templates are multiplexed once, up front. Malformed templates are
    /// rejected here.
    pub fn new(
        templates: impl IntoIterator<Item = impl ToString>,
        variables: VariableInventory,
    ) -> Result<Self> {
        let paths = MultiplexTemplate::new(templates, variables).run()?;

        Ok(Self {
            paths: Arc::new(paths),
            config: PipelineConfig::default(),
            reports: None,
        })
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

    /// Paths joined onto every release directory.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

async fn expand_release(
    paths: Arc<Vec<String>>,
    release: String,
    sink: Sink<String>,
) -> Result<ItemOutcome> {
    let base = Url::parse(&release)?;

    let mut count = 0;
    for path in paths.iter() {
        let url = join_path(&base, path)?;

        if !send("repo-template", &sink, url.to_string()).await {
            break;
        }
        count += 1;
    }

    Ok(ItemOutcome::Emitted(count))
}

impl Stage for RepoTemplateExpander {
    fn run(&self, ctx: CancellationToken, input: Stream<String>) -> Stream<String> {
        let paths = self.paths.clone();

        spawn_stage(
            "repo-template",
            &self.config,
            ctx,
            input,
            move |release, sink| expand_release(paths.clone(), release, sink),
            self.reports.clone(),
        )
    }
}
