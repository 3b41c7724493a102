//! `trip` -- a topology-discovery traceroute (classical or MDA).

mod args;
mod error;
mod options;
mod output;
mod run;

use args::{Args, OutputFormat};
use clap::Parser;
use error::CliError;
use output::{HumanSink, JsonSink, OutputSink, XmlSink};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_tracing(args: &Args) {
    let filter = if args.verbose {
        EnvFilter::new("trippy_core=debug,trip=debug")
    } else {
        EnvFilter::new("warn")
    };
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match args.log_format {
        args::LogFormat::Pretty => subscriber.init(),
        args::LogFormat::Json => subscriber.json().init(),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args);

    match try_main(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "trip failed");
            eprintln!("trip: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn try_main(args: &Args) -> Result<(), CliError> {
    let opts = options::build(args)?;
    let mut sink: Box<dyn OutputSink> = match args.output {
        OutputFormat::Text => Box::new(HumanSink::new()),
        OutputFormat::Json => Box::new(JsonSink::new(std::io::stdout())),
        OutputFormat::Xml => Box::new(XmlSink::new()),
    };
    run::run(&args.host, &opts, sink.as_mut())
}
