// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Primary database discovery from repository metadata. */

use {
    crate::{
        error::Result,
        pipeline::{send, spawn_stage, ItemOutcome, PipelineConfig, ReportSink, Sink, Stage, Stream},
    },
    rpm_repository::{join_path, repository_root_from_metadata_url, DataResolver},
    std::sync::Arc,
    tokio_util::sync::CancellationToken,
    url::Url,
};

const STAGE: &str = "database";

/// Resolves `repomd.xml` URLs to the URLs of their primary databases.
pub struct DbSearcher {
    resolver: Arc<dyn DataResolver>,
    config: PipelineConfig,
    reports: Option<ReportSink>,
}

impl DbSearcher {
    pub fn new(resolver: Arc<dyn DataResolver>) -> Self {
        Self {
            resolver,
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
}

async fn search_repomd(
    resolver: Arc<dyn DataResolver>,
    ctx: CancellationToken,
    item: String,
    sink: Sink<String>,
) -> Result<ItemOutcome> {
    let url = Url::parse(&item)?;

    if ctx.is_cancelled() {
        return Ok(ItemOutcome::Skipped("cancelled".into()));
    }

    let repomd = resolver.fetch_repomd(&url).await?;
    let root = repository_root_from_metadata_url(&url)?;

    let primaries = repomd
        .primary_entries()
        .map(|entry| join_path(&root, &entry.location.href))
        .collect::<rpm_repository::Result<Vec<_>>>()?;

    if primaries.is_empty() {
        return Ok(ItemOutcome::Skipped("no primary database".into()));
    }

    let mut count = 0;
    for primary in primaries {
        if !send(STAGE, &sink, primary.to_string()).await {
            break;
        }
        count += 1;
    }

    Ok(ItemOutcome::Emitted(count))
}

impl Stage for DbSearcher {
    fn run(&self, ctx: CancellationToken, input: Stream<String>) -> Stream<String> {
        let resolver = self.resolver.clone();
        let token = ctx.clone();

        spawn_stage(
            STAGE,
            &self.config,
            ctx,
            input,
            move |item, sink| search_repomd(resolver.clone(), token.clone(), item, sink),
            self.reports.clone(),
        )
    }
}
