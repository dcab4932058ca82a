/*
** This file is a part of Vglog (Valgrind XML log reader and merger)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Vglog is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vglog::KindPolicy;
use vglog::Log;
use vglog::LogFeed;
use vglog::LogListener;
use vglog::LogReader;
use vglog::MergeProblem;
use vglog::ReaderConfig;
use vglog::Record;
use vglog::TopStatus;
use vglog::load_log;
use vglog::merge_all;

/// Reads, follows and merges Valgrind XML logs
#[derive(Parser, Debug, Clone)]
#[command(name = "vglog")]
#[command(version, about, long_about = None)]
struct Config {
    #[command(subcommand)]
    command: Command,

    /// Accept unknown error kinds and show them as ???
    ///
    /// By default an unknown error kind stops reading, like an unknown tag.
    #[arg(long, global = true)]
    lenient_kinds: bool,

    /// Accepted log protocol version, can be given more than once
    #[arg(
        long = "protocol",
        value_name = "N",
        global = true,
        env = "VGLOG_PROTOCOLS",
        value_delimiter = ','
    )]
    protocols: Vec<u32>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Read complete logs and print their summaries
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Merge the logs of several runs of the same program
    ///
    /// Errors of the other logs are folded into the first log.
    Merge {
        /// Output file, the merged log goes to standard output if not given
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a text report instead of XML
        #[arg(long)]
        text: bool,

        master: PathBuf,

        #[arg(required = true)]
        slaves: Vec<PathBuf>,
    },

    /// Follow a log while the tool is still writing it
    Watch {
        file: PathBuf,

        /// Time to wait between looking for new data
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },
}

impl Config {
    fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }

    fn reader_config(&self) -> ReaderConfig {
        let policy = if self.lenient_kinds {
            KindPolicy::Lenient
        } else {
            KindPolicy::Strict
        };
        let mut config = ReaderConfig::new().with_kind_policy(policy);
        if !self.protocols.is_empty() {
            config.protocols = self.protocols.clone();
        }
        config
    }
}

fn check(config: &ReaderConfig, files: &[PathBuf]) -> bool {
    let mut ok = true;
    for file in files {
        match load_log(file, config.clone()) {
            Ok(log) => {
                println!("{}: {}", file.display(), log.info.display());
                println!("  {}", log.status);
                for counts in [&log.error_counts, &log.supp_counts].into_iter().flatten() {
                    println!("  {counts}");
                }
                for error in &log.errors {
                    println!("  {error}");
                }
            }
            Err(err) => {
                error!(file = %file.display(), "{err}");
                ok = false;
            }
        }
    }
    ok
}

fn merge(
    config: &ReaderConfig,
    output: Option<&Path>,
    text: bool,
    master: &Path,
    slaves: &[PathBuf],
) -> Result<bool> {
    let mut logs = Vec::with_capacity(slaves.len() + 1);
    for path in std::iter::once(master).chain(slaves.iter().map(PathBuf::as_path)) {
        let log = load_log(path, config.clone())
            .with_context(|| format!("cannot load '{}'", path.display()))?;
        logs.push(log);
    }
    let (log, report) = merge_all(logs)?;
    info!(
        matched = report.matched + report.leaks_matched,
        appended = report.appended + report.leaks_appended,
        renumbered = report.renumbered,
        "merge finished"
    );

    let rendered = if text {
        log.text().to_string()
    } else {
        log.xml().to_string()
    };
    match output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("cannot write '{}'", path.display()))?,
        None => print!("{rendered}"),
    }

    let skipped = report
        .problems
        .iter()
        .any(|problem| matches!(problem, MergeProblem::Skipped { .. }));
    Ok(!skipped)
}

struct Printer;

impl LogListener for Printer {
    fn record_ready(&mut self, log: &Log, record: Record) {
        match record {
            Record::Status => println!("{}", log.status),
            Record::Info => println!("{} {}", log.info.display(), log.info.command_line()),
            Record::Preamble => {
                for line in &log.preamble.lines {
                    println!("{line}");
                }
            }
            Record::Error(index) => {
                let Some(error) = log.errors.get(index) else {
                    return;
                };
                println!("{error}");
                for frame in error.primary_stack().into_iter().flat_map(|s| &s.frames) {
                    println!("    {}", frame.display());
                }
            }
            Record::ErrorCounts | Record::SuppCounts => {
                let counts = if record == Record::ErrorCounts {
                    &log.error_counts
                } else {
                    &log.supp_counts
                };
                if let Some(counts) = counts {
                    println!("{counts}");
                }
            }
        }
    }

    fn status_updated(&mut self, status: &TopStatus) {
        println!("{status}");
    }
}

fn watch(config: &ReaderConfig, file: &Path, interval: Duration) -> Result<bool> {
    let mut feed =
        LogFeed::open(file).with_context(|| format!("cannot open '{}'", file.display()))?;
    let mut reader = LogReader::with_config(config.clone());
    let mut printer = Printer;
    loop {
        feed.poll(&mut reader, &mut printer)?;
        if reader.is_finished() {
            reader.finish()?;
            return Ok(true);
        }
        thread::sleep(interval);
    }
}

fn run(config: &Config) -> Result<bool> {
    let reader_config = config.reader_config();
    match &config.command {
        Command::Check { files } => Ok(check(&reader_config, files)),
        Command::Merge {
            output,
            text,
            master,
            slaves,
        } => merge(&reader_config, output.as_deref(), *text, master, slaves),
        Command::Watch { file, interval_ms } => {
            watch(&reader_config, file, Duration::from_millis(*interval_ms))
        }
    }
}

fn main() -> ExitCode {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(config.log_level().into()))
        .with_writer(std::io::stderr)
        .init();

    match run(&config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_line() {
        Config::command().debug_assert();

        let config = Config::parse_from([
            "vglog",
            "merge",
            "-o",
            "out.xml",
            "--protocol",
            "1",
            "--protocol",
            "4",
            "--lenient-kinds",
            "a.xml",
            "b.xml",
        ]);
        let reader_config = config.reader_config();
        assert_eq!(reader_config.kind_policy, KindPolicy::Lenient);
        assert!(reader_config.accepts_protocol(4));
        assert!(matches!(config.command, Command::Merge { ref slaves, .. } if slaves.len() == 1));
        assert_eq!(config.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn defaults() {
        let config = Config::parse_from(["vglog", "-q", "watch", "vg.xml"]);
        assert_eq!(config.reader_config(), ReaderConfig::default());
        assert_eq!(config.log_level(), tracing::Level::WARN);
        assert!(matches!(config.command, Command::Watch { interval_ms: 500, .. }));
        assert!(Config::try_parse_from(["vglog", "merge", "a.xml"]).is_err());
    }
}
