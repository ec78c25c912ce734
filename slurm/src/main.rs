// SPDX-FileCopyrightText: © 2024 Christopher Woods <Christopher.Woods@bristol.ac.uk>
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use gpureport::config::{default_config_file, initialise_tracing, Config};
use gpureport::report::{self, Format, Report};
use gpureport::{JobsView, NodesView, UsersView};

mod runner;
mod slurm;

use runner::SlurmRunner;

#[derive(Parser)]
#[command(
    version,
    about = "Report GPU capacity and usage of a Slurm cluster by node, job or user",
    long_about = None
)]
#[command(group(ArgGroup::new("view").args(["nodes", "jobs", "users"]).multiple(false)))]
struct Args {
    #[arg(long, help = "Show GPU capacity and allocation per node (default)")]
    nodes: bool,

    #[arg(long, help = "Show the GPUs requested by every job, in all states")]
    jobs: bool,

    #[arg(long, help = "Show GPU usage summed per user, over jobs in all states")]
    users: bool,

    #[arg(long, value_name = "PATH", help = "Also write the report as CSV to this file")]
    csv: Option<PathBuf>,

    #[arg(long, help = "Print tab-delimited fields instead of aligned columns")]
    plain: bool,

    #[arg(
        long,
        short = 'c',
        help = format!(
            "Path to the config file [default: {}]",
            default_config_file().display(),
        )
    )]
    config: Option<PathBuf>,

    #[arg(long, short = 'v', help = "Log the commands that are run to stderr")]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Nodes,
    Jobs,
    Users,
}

impl Args {
    fn view(&self) -> View {
        match (self.jobs, self.users) {
            (true, _) => View::Jobs,
            (_, true) => View::Users,
            _ => View::Nodes,
        }
    }

    fn format(&self) -> Format {
        match self.plain {
            true => Format::Plain,
            false => Format::Aligned,
        }
    }
}

///
/// Build the requested view. The nodes view needs both the inventory
/// and the active jobs, the others only need the jobs in all states.
///
async fn build_report(view: View, config: &Config) -> Result<Box<dyn Report>> {
    let runner = SlurmRunner::new(config);

    let report: Box<dyn Report> = match view {
        View::Nodes => {
            let inventory = slurm::query_inventory(&runner).await?;
            let jobs = slurm::query_active_jobs(&runner).await?;
            let expander = slurm::Expander::new(&runner, config);

            let view = NodesView::build(&inventory, &jobs, &expander).await;

            for node in view.unlisted() {
                tracing::debug!(
                    "Not reporting {} GPUs allocated on unlisted node {}",
                    node.allocated(),
                    node.name()
                );
            }

            Box::new(view)
        }
        View::Jobs => Box::new(JobsView::build(&slurm::query_all_jobs(&runner).await?)),
        View::Users => Box::new(UsersView::build(&slurm::query_all_jobs(&runner).await?)),
    };

    Ok(report)
}

///
/// Main function for the GPU report
///
/// This queries sinfo and squeue once for the requested view, prints
/// the table to stdout and optionally saves it as CSV.
///
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    initialise_tracing(args.verbose);

    let config = Config::load_or_default(args.config.as_deref())?;

    tracing::debug!("Using config: {:?}", config);

    let report = build_report(args.view(), &config).await?;

    println!("{}", report::to_text(report.as_ref(), args.format()));

    if let Some(path) = &args.csv {
        report::save_csv(report.as_ref(), path)?;
        eprintln!("CSV written to {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("gpu-report").chain(args.iter().copied()))
    }

    #[test]
    fn test_default_view() {
        #[allow(clippy::unwrap_used)]
        let args = parse(&[]).unwrap();
        assert_eq!(args.view(), View::Nodes);
        assert_eq!(args.format(), Format::Aligned);
        assert!(args.csv.is_none());
    }

    #[test]
    fn test_views() {
        #[allow(clippy::unwrap_used)]
        {
            assert_eq!(parse(&["--nodes"]).unwrap().view(), View::Nodes);
            assert_eq!(parse(&["--jobs"]).unwrap().view(), View::Jobs);
            assert_eq!(parse(&["--users"]).unwrap().view(), View::Users);
        }
    }

    #[test]
    fn test_csv_and_plain() {
        #[allow(clippy::unwrap_used)]
        let args = parse(&["--users", "--csv", "out.csv", "--plain"]).unwrap();
        assert_eq!(args.csv, Some(PathBuf::from("out.csv")));
        assert_eq!(args.format(), Format::Plain);
    }

    #[test]
    fn test_views_are_exclusive() {
        assert!(parse(&["--jobs", "--users"]).is_err());
    }

    #[test]
    fn test_unknown_flag() {
        match parse(&["--bogus"]) {
            Err(err) => assert_eq!(err.kind(), ErrorKind::UnknownArgument),
            Ok(_) => panic!("Expected an unknown argument error"),
        }
    }

    #[test]
    fn test_help() {
        match parse(&["-h"]) {
            Err(err) => assert_eq!(err.kind(), ErrorKind::DisplayHelp),
            Ok(_) => panic!("Expected help to be displayed"),
        }
    }
}
