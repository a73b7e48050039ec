//! Halberd CLI binary: `demo-search`, `rag` and `stats` over an in-memory
//! collection.

use std::io::Write;
use std::process;

use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use halberd::cli::args::HalberdArgs;
use halberd::cli::commands::execute_command;

/// Map `-q` / `-v` counts onto a log level. Warnings are shown by default.
fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

fn main() {
    let args = HalberdArgs::parse();

    // -v only raises halberd's own modules; dependencies stop at warn.
    let level = level_for(args.verbosity());
    Builder::new()
        .filter_level(level.min(LevelFilter::Warn))
        .filter_module("halberd", level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    if let Err(e) = execute_command(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for(0), LevelFilter::Error);
        assert_eq!(level_for(1), LevelFilter::Warn);
        assert_eq!(level_for(2), LevelFilter::Info);
        assert_eq!(level_for(5), LevelFilter::Debug);
        assert_eq!(level_for(0).min(LevelFilter::Warn), LevelFilter::Error);
        assert_eq!(level_for(3).min(LevelFilter::Warn), LevelFilter::Warn);
    }
}
