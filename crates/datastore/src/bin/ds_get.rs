//! `ds-get`: evaluate store paths against a document.
//!
//! Usage:
//!   ds-get [--xml] <path>...
//!
//! The document is read from stdin and mounted as `$doc`; relative paths
//! are taken against it. Each result is printed as one line of JSON.
//! Set `RUST_LOG=debug` to see store activity on stderr.

use datastore::cli::{evaluate, Args};
use std::io::{self, Read, Write};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    let values = match evaluate(buf.trim(), args.format, &args.paths) {
        Ok(values) => values,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let mut stdout = io::stdout().lock();
    for value in values {
        if let Err(e) = writeln!(stdout, "{value}") {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
