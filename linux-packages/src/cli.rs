// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    anyhow::{Context, Result},
    clap::{Arg, ArgMatches, Command, ErrorKind},
    linux_packages::{
        distro::{
            centos::{self, RepoStrategy, SearchConfig},
            Distribution,
        },
        pipeline::DEFAULT_MAX_CONCURRENCY,
        stages::packages,
    },
    log::{debug, warn, LevelFilter},
    tokio_util::sync::CancellationToken,
};

const ABOUT: &str = "\
# About

`linux-packages` finds the packages of a Linux distribution by name across
its public mirrors, printing the version, architecture and download location
of every match.

Mirrors are searched release by release. Repositories within a release are
located by expanding well-known path templates for every architecture, or,
with `--crawl`, by walking the mirror's directory listings. Expect duplicate
results when the same package is published in several repositories.

Supported distributions:

* centos
";

fn init_logging(matches: &ArgMatches) {
    let log_level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    // These spew unwanted output at default levels. Nerf them by default.
    if log_level <= LevelFilter::Debug {
        for module in ["rustls", "reqwest", "hyper"] {
            builder.filter_module(module, LevelFilter::Error);
        }
    }

    builder.init();
}

fn search_config(matches: &ArgMatches, name: &str) -> Result<SearchConfig> {
    let mut config = SearchConfig::new([name]);

    if let Some(architectures) = matches.values_of("arch") {
        config.architectures = architectures.map(|s| s.to_string()).collect();
    }

    if let Some(mirrors) = matches.values_of("mirror") {
        config.mirrors = mirrors.map(|s| s.to_string()).collect();
    }

    if matches.is_present("crawl") {
        config.strategy = RepoStrategy::Crawl;
    }

    if let Some(value) = matches.value_of("concurrency") {
        let concurrency = value
            .parse::<usize>()
            .with_context(|| format!("invalid concurrency: {}", value))?;
        config.pipeline = config.pipeline.with_max_concurrency(concurrency);
    }

    Ok(config)
}

pub async fn run() -> Result<()> {
    let default_concurrency = format!("{}", DEFAULT_MAX_CONCURRENCY);

    let mut app = Command::new("linux-packages")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gregory Szorc <gregory.szorc@gmail.com>")
        .about("Find Linux distribution packages on public mirrors")
        .long_about(ABOUT)
        .override_usage("linux-packages [OPTIONS] <DISTRO|--all> <PACKAGE>")
        .arg_required_else_help(true);

    app = app.arg(
        Arg::new("verbose")
            .short('v')
            .long("verbose")
            .global(true)
            .multiple_occurrences(true)
            .help("Increase logging verbosity. Can be specified multiple times."),
    );

    app = app.arg(
        Arg::new("all")
            .long("all")
            .help("Search every supported distribution"),
    );

    app = app.arg(
        Arg::new("arch")
            .long("arch")
            .takes_value(true)
            .multiple_occurrences(true)
            .use_value_delimiter(true)
            .help("Machine architecture to search (default: x86_64,aarch64,i686,ppc64le)"),
    );

    app = app.arg(
        Arg::new("crawl")
            .long("crawl")
            .help("Crawl mirror directory listings instead of expanding repository templates"),
    );

    app = app.arg(
        Arg::new("concurrency")
            .long("concurrency")
            .takes_value(true)
            .default_value(&default_concurrency)
            .help("Maximum number of items each pipeline stage works on at once"),
    );

    app = app.arg(
        Arg::new("mirror")
            .long("mirror")
            .takes_value(true)
            .multiple_occurrences(true)
            .help("Mirror root URL to search instead of the distribution defaults"),
    );

    app = app.arg(
        Arg::new("args")
            .value_name("ARG")
            .multiple_values(true)
            .max_values(2)
            .help("Distribution (omitted with --all) followed by the package name"),
    );

    let matches = app.get_matches_mut();

    init_logging(&matches);

    let args = matches
        .values_of("args")
        .map(|values| values.collect::<Vec<_>>())
        .unwrap_or_default();

    let (distributions, name) = match (matches.is_present("all"), args.as_slice()) {
        (true, [name]) => (Distribution::all().to_vec(), *name),
        (false, [distro, name]) => (vec![distro.parse::<Distribution>()?], *name),
        _ => app
            .error(
                ErrorKind::MissingRequiredArgument,
                "Please specify a distro and package name as arguments",
            )
            .exit(),
    };

    let config = search_config(&matches, name)?;

    let ctx = CancellationToken::new();
    tokio::spawn({
        let ctx = ctx.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupted; cancelling search");
                ctx.cancel();
            }
        }
    });

    for distribution in distributions {
        debug!("searching {} for {}", distribution, name);

        let mut search = match distribution {
            Distribution::CentOs => centos::search_packages(ctx.clone(), &config)?,
        };

        while let Some(package) = search.packages.recv().await {
            println!("{}", package);
        }

        // Misses on the other stages are expected: not every release carries
        // every repository. A database that could not be read is a real gap.
        while let Some((stage, report)) = search.reports.recv().await {
            if stage == packages::STAGE && report.failed > 0 {
                warn!(
                    "{}: {} package databases could not be read; results may be incomplete",
                    distribution, report.failed
                );
            }
        }
    }

    Ok(())
}
