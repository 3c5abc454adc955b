// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Release directory discovery under mirror roots. */

use {
    crate::{
        discovery::{Discover, FileType, FindOptions},
        error::Result,
        pipeline::{send, spawn_stage, ItemOutcome, PipelineConfig, ReportSink, Sink, Stage, Stream},
    },
    std::sync::Arc,
    tokio_util::sync::CancellationToken,
};

const STAGE: &str = "mirror";

/// Lists the release directories directly beneath each mirror root.
pub struct MirrorRootSearcher {
    discover: Arc<dyn Discover>,
    options: FindOptions,
    config: PipelineConfig,
    reports: Option<ReportSink>,
}

impl MirrorRootSearcher {
    /// Construct an instance matching directory names against `version_regex`.
    pub fn new(discover: Arc<dyn Discover>, version_regex: &str) -> Result<Self> {
        let options = FindOptions::new(Vec::<String>::new(), version_regex)?
            .with_file_type(FileType::Directory)
            .with_recursive(false)
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

async fn search_mirror(
    discover: Arc<dyn Discover>,
    options: FindOptions,
    ctx: CancellationToken,
    mirror: String,
    sink: Sink<String>,
) -> Result<ItemOutcome> {
    if ctx.is_cancelled() {
        return Ok(ItemOutcome::Skipped("cancelled".into()));
    }

    let options = FindOptions {
        seed_urls: vec![mirror],
        ..options
    };

    let mut count = 0;
    for dir in discover.find(&options).await? {
        if ctx.is_cancelled() || !send(STAGE, &sink, dir).await {
            break;
        }
        count += 1;
    }

    Ok(ItemOutcome::Emitted(count))
}

impl Stage for MirrorRootSearcher {
    fn run(&self, ctx: CancellationToken, input: Stream<String>) -> Stream<String> {
        let discover = self.discover.clone();
        let options = self.options.clone();
        let token = ctx.clone();

        spawn_stage(
            STAGE,
            &self.config,
            ctx,
            input,
            move |mirror, sink| {
                search_mirror(discover.clone(), options.clone(), token.clone(), mirror, sink)
            },
            self.reports.clone(),
        )
    }
}

#[cfg(test)]
mod test {
    use {super::*, crate::testutil::StubDiscover, tokio::sync::mpsc};

    async fn run(stage: &MirrorRootSearcher, items: &[&str]) -> Vec<String> {
        let (sink, input) = mpsc::channel(items.len().max(1));
        for item in items {
            sink.send(item.to_string()).await.unwrap();
        }
        drop(sink);

        let mut output = stage.run(CancellationToken::new(), input);
        let mut res = vec![];
        while let Some(v) = output.recv().await {
            res.push(v);
        }
        res.sort();
        res
    }

    #[tokio::test]
    async fn lists_release_directories() -> Result<()> {
        let mut discover = StubDiscover::default();
        discover.insert(
            "https://mirror.example.com/centos/",
            &[
                "https://mirror.example.com/centos/7/",
                "https://mirror.example.com/centos/8-stream/",
            ],
        );
        discover.insert(
            "https://vault.example.com/centos/",
            &["https://vault.example.com/centos/6.10/"],
        );
        let discover = Arc::new(discover);

        let stage = MirrorRootSearcher::new(discover.clone(), r"^.+/?$")?;
        let res = run(
            &stage,
            &[
                "https://mirror.example.com/centos/",
                "https://unreachable.example.com/centos/",
                "https://vault.example.com/centos/",
            ],
        )
        .await;

        assert_eq!(
            res,
            vec![
                "https://mirror.example.com/centos/7/",
                "https://mirror.example.com/centos/8-stream/",
                "https://vault.example.com/centos/6.10/",
            ]
        );

        let requests = discover.requests();
        assert_eq!(requests.len(), 3);
        for request in requests {
            assert_eq!(request.seed_urls.len(), 1);
            assert_eq!(request.file_type, FileType::Directory);
            assert!(!request.recursive);
            assert_eq!(request.backoff.len(), 3);
        }

        Ok(())
    }

    #[tokio::test]
    async fn empty_input() -> Result<()> {
        let stage = MirrorRootSearcher::new(Arc::new(StubDiscover::default()), r"^.+/?$")?;
        assert!(run(&stage, &[]).await.is_empty());

        Ok(())
    }
}
