use clap::Parser;
use slog::{o, Drain, Level, Logger};

use filterspec::cli::{run, Args};
use filterspec::output::safe_stdout;
use filterspec::QueryError;

pub fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::Warning,
        1 => Level::Debug,
        _ => Level::Trace,
    };
    let decorator = slog_term::PlainSyncDecorator::new(std::io::stderr());
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let logger = Logger::root(drain.filter_level(level).fuse(), o!());

    if let Err(err) = run(&args, &logger, &mut safe_stdout()) {
        match err.downcast_ref::<QueryError>() {
            Some(query_error) => eprintln!("{:?}", miette::Report::new(query_error.clone())),
            None => eprintln!("error: {:#}", err),
        }
        std::process::exit(1);
    }
}
