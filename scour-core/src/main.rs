//! src/main.rs
//! CLI harness for the scan/search worker: lists a directory or runs a
//! search through the full channel protocol, printing progress and the
//! terminal response exactly the way a UI front-end would consume them.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::info;

use scour_core::{
    Config, EngineSelector, Entry, Event, Request, System, logging::init_default_logging,
};

struct CliArgs {
    path: PathBuf,
    query: Option<String>,
    contents: bool,
    depth: Option<i32>,
}

fn usage() -> ! {
    eprintln!("Usage: scour <path> [query] [--contents] [--depth N]");
    std::process::exit(2);
}

fn parse_args() -> CliArgs {
    let mut path: Option<PathBuf> = None;
    let mut query: Option<String> = None;
    let mut contents: bool = false;
    let mut depth: Option<i32> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--contents" {
            contents = true;
        } else if arg == "--depth" {
            let value = args.next().unwrap_or_else(|| usage());
            depth = Some(value.parse().unwrap_or_else(|_| usage()));
        } else if arg == "--help" || arg == "-h" {
            usage();
        } else if path.is_none() {
            path = Some(PathBuf::from(arg));
        } else if query.is_none() {
            query = Some(arg);
        } else {
            usage();
        }
    }

    let Some(path) = path else { usage() };

    CliArgs {
        path,
        query,
        contents,
        depth,
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<ExitCode> {
    let args = parse_args();

    let _log_guard = init_default_logging().context("Failed to initialize logging")?;

    let config = Config::load().await.context("Failed to load configuration")?;

    let mut system = System::spawn(config.search.clone(), &config.channels);

    let request = match &args.query {
        None => Request::fetch_dir(1, args.path.clone()),

        Some(query) => {
            let depth = args.depth.unwrap_or(config.search.default_depth);
            let engine = if args.contents {
                config.search.engine
            } else {
                EngineSelector::Names
            };

            Request::search_dir(1, args.path.clone(), query.clone(), depth).with_engine(engine)
        }
    };

    system.submit(request).context("Failed to submit request")?;

    let exit = loop {
        match system.next_event().await {
            Some(Event::Progress(progress)) => {
                eprintln!("  {}", progress.label);
            }

            Some(Event::Response(response)) => {
                if let Some(error) = response.error {
                    eprintln!("scour: {error}");
                    break ExitCode::FAILURE;
                }

                if response.cancelled {
                    eprintln!("scour: operation cancelled");
                    break ExitCode::FAILURE;
                }

                print_entries(&response.entries, config.show_hidden);
                break ExitCode::SUCCESS;
            }

            None => {
                eprintln!("scour: worker exited without a response");
                break ExitCode::FAILURE;
            }
        }
    };

    system.shutdown().await;
    info!("Application exited cleanly");

    Ok(exit)
}

fn print_entries(entries: &[Entry], show_hidden: bool) {
    let mut shown: usize = 0;

    for entry in entries {
        if !show_hidden && entry.name.starts_with('.') {
            continue;
        }

        let kind = entry.object_type().to_string();
        println!(
            "{kind:<8} {:>10}  {}  {}",
            entry.size_human(),
            entry.format_date("%Y-%m-%d %H:%M"),
            entry.name,
        );
        shown += 1;
    }

    println!("{shown} entries");
}
