// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Streaming search pipelines.

A pipeline is a [Producer] emitting seed URLs, followed by zero or more [Stage]s
each transforming a stream of URLs into another stream of URLs, terminated by a
[SearchStage] turning URLs into [Package]s. [run_search_pipeline()] wires them
together.

Streams are bounded channels. A stage owns the sending half of its output and
hands the receiving half to whoever runs it. Output is unordered.

Every stage built on [spawn_stage()] follows the same discipline: for each
input item, wait for a concurrency permit, then spawn the item's work into a
[JoinSet]. Once the input is closed, every spawned task is joined and only then
is the output closed. Work for an item either emits values, skips, or fails.
Failures are logged and counted, never propagated downstream.
*/

use {
    crate::{error::Result, package::Package},
    log::{debug, info},
    std::{fmt::Display, future::Future, sync::Arc},
    tokio::{
        sync::{mpsc, Semaphore},
        task::JoinSet,
    },
    tokio_util::sync::CancellationToken,
};

/// The receiving end of a stage's output.
pub type Stream<T> = mpsc::Receiver<T>;

/// The sending end of a stage's output.
pub type Sink<T> = mpsc::Sender<T>;

/// A finished stage's name and tally.
pub type StageSummary = (&'static str, StageReport);

/// Collects the summary of every stage that was given a clone of it.
pub type ReportSink = mpsc::UnboundedSender<StageSummary>;

/// The receiving end of a [ReportSink].
pub type ReportStream = mpsc::UnboundedReceiver<StageSummary>;

/// Create a channel for stage reports.
pub fn report_channel() -> (ReportSink, ReportStream) {
    mpsc::unbounded_channel()
}

/// Default ceiling on concurrently running items per stage.
pub const DEFAULT_MAX_CONCURRENCY: usize = 64;

/// Default capacity of inter-stage channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// Tuning shared by every stage of a pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PipelineConfig {
    /// Maximum number of items a single stage works on at once.
    pub max_concurrency: usize,

    /// Capacity of each stage's output channel.
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl PipelineConfig {
    pub fn with_max_concurrency(mut self, value: usize) -> Self {
        self.max_concurrency = value;
        self
    }

    pub fn with_channel_capacity(mut self, value: usize) -> Self {
        self.channel_capacity = value;
        self
    }

    fn effective_concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }

    /// Create a channel honoring the configured capacity.
    pub fn channel<T>(&self) -> (Sink<T>, Stream<T>) {
        mpsc::channel(self.channel_capacity.max(1))
    }
}

/// Emits an initial stream of strings.
pub trait Producer {
    fn produce(&self, ctx: CancellationToken) -> Stream<String>;
}

/// Transforms a stream of strings into another stream of strings.
pub trait Stage {
    fn run(&self, ctx: CancellationToken, input: Stream<String>) -> Stream<String>;
}

/// Transforms a stream of strings into a stream of packages.
pub trait SearchStage {
    fn run(&self, ctx: CancellationToken, input: Stream<String>) -> Stream<Package>;
}

/// Wire a producer through stages into a search stage.
pub fn run_search_pipeline(
    ctx: CancellationToken,
    producer: &dyn Producer,
    search: &dyn SearchStage,
    stages: &[&dyn Stage],
) -> Stream<Package> {
    let mut data = producer.produce(ctx.clone());

    for stage in stages {
        data = stage.run(ctx.clone(), data);
    }

    search.run(ctx, data)
}

/// Producer of a fixed set of seeds.
#[derive(Clone, Debug, Default)]
pub struct GenericProducer {
    seeds: Vec<String>,
    config: PipelineConfig,
}

impl GenericProducer {
    pub fn new(seeds: impl IntoIterator<Item = impl ToString>) -> Self {
        Self {
            seeds: seeds.into_iter().map(|s| s.to_string()).collect(),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }
}

impl Producer for GenericProducer {
    fn produce(&self, ctx: CancellationToken) -> Stream<String> {
        let (sink, stream) = self.config.channel();
        let seeds = self.seeds.clone();

        tokio::spawn(async move {
            for seed in seeds {
                if ctx.is_cancelled() {
                    break;
                }

                debug!("seed send: {}", seed);
                if sink.send(seed).await.is_err() {
                    break;
                }
            }
        });

        stream
    }
}

/// What the work for a single input item amounted to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ItemOutcome {
    /// This many values were sent downstream.
    Emitted(usize),
    /// The item was deliberately not processed.
    Skipped(String),
}

/// Tally of item outcomes for one run of a stage.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StageReport {
    pub items: usize,
    pub emitted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StageReport {
    fn record(&mut self, stage: &str, item: &str, outcome: Result<ItemOutcome>) {
        self.items += 1;

        match outcome {
            Ok(ItemOutcome::Emitted(count)) => {
                self.emitted += count;
            }
            Ok(ItemOutcome::Skipped(reason)) => {
                debug!("{}: skipped {}: {}", stage, item, reason);
                self.skipped += 1;
            }
            Err(e) => {
                debug!("{}: dropped {}: {}", stage, item, e);
                self.failed += 1;
            }
        }
    }
}

/// Send a value downstream, returning whether the receiver is still listening.
pub async fn send<T: Display>(stage: &str, sink: &Sink<T>, value: T) -> bool {
    debug!("{} send: {}", stage, value);
    sink.send(value).await.is_ok()
}

/// Run per-item work over an input stream with bounded concurrency.
///
/// `work` is invoked once per input item with a clone of the output sink. The
/// returned stream closes after the input is drained and every invocation has
/// completed, or after cancellation once in-flight work has wound down.
///
/// When `reports` is given, the stage's [StageReport] is sent there before the
/// output closes. A consumer that has drained the final stream of a pipeline
/// can therefore read every stage's report without waiting.
pub fn spawn_stage<T, F, Fut>(
    name: &'static str,
    config: &PipelineConfig,
    ctx: CancellationToken,
    mut input: Stream<String>,
    work: F,
    reports: Option<ReportSink>,
) -> Stream<T>
where
    T: Send + 'static,
    F: Fn(String, Sink<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ItemOutcome>> + Send + 'static,
{
    let (sink, stream) = config.channel();
    let semaphore = Arc::new(Semaphore::new(config.effective_concurrency()));

    tokio::spawn(async move {
        let mut tasks = JoinSet::new();
        let mut report = StageReport::default();

        loop {
            let item = tokio::select! {
                _ = ctx.cancelled() => break,
                item = input.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };
            debug!("{} receive: {}", name, item);

            let permit = tokio::select! {
                _ = ctx.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            while let Some(joined) = tasks.try_join_next() {
                record_joined(name, &mut report, joined);
            }

            let fut = work(item.clone(), sink.clone());
            tasks.spawn(async move {
                let outcome = fut.await;
                drop(permit);
                (item, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            record_joined(name, &mut report, joined);
        }

        info!(
            "{}: {} items, {} emitted, {} skipped, {} failed",
            name, report.items, report.emitted, report.skipped, report.failed
        );
        if let Some(reports) = reports {
            // The receiver going away only means nobody is interested.
            let _ = reports.send((name, report));
        }

        // Every clone of the sink handed to work has been dropped by now. Dropping
        // ours closes the output.
        drop(sink);
    });

    stream
}

fn record_joined(
    name: &str,
    report: &mut StageReport,
    joined: std::result::Result<(String, Result<ItemOutcome>), tokio::task::JoinError>,
) {
    match joined {
        Ok((item, outcome)) => report.record(name, &item, outcome),
        Err(e) => report.record(name, "<panicked task>", Err(e.into())),
    }
}
