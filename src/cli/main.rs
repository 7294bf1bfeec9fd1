use std::path::Path;

use argument::{output_and_verbosity, Cli, Command};
use clap::Parser;
#[cfg(feature = "log")]
use submerge::initialize_logging;
use submerge::{template, utils, Verbosity};
use tokio::runtime;

mod argument;

const DEFAULT_MERGED_OUTPUT: &str = "merged_sources.yaml";
const DEFAULT_TEMPLATE_OUTPUT: &str = "output.yaml";

fn main() {
    let options = match Cli::try_parse() {
        Ok(options) => options,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    if let Err(e) = run_application(options) {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

fn run_application(options: Cli) -> anyhow::Result<()> {
    match options.command {
        Command::Merge {
            sources,
            output,
            verbosity,
        } => {
            let (output, verbosity) = output_and_verbosity(output, verbosity, DEFAULT_MERGED_OUTPUT);
            #[cfg(feature = "log")]
            initialize_logging(verbosity.level_filter())?;

            // Network I/O is cooperative on one thread; lookups go to the blocking pool.
            let runtime = runtime::Builder::new_current_thread().enable_all().build()?;
            let merged = runtime.block_on(submerge::merge_sources(&sources))?;

            let count = merged.count();
            utils::write_yaml(&output, &merged.into_document())?;
            print_summary(verbosity, count, &output);
        }
        Command::Template {
            merged,
            template,
            output,
            verbosity,
        } => {
            let (output, verbosity) =
                output_and_verbosity(output, verbosity, DEFAULT_TEMPLATE_OUTPUT);
            #[cfg(feature = "log")]
            initialize_logging(verbosity.level_filter())?;

            let count = template::merge_template(&merged, &template, &output)?;
            print_summary(verbosity, count, &output);
        }
    }
    Ok(())
}

fn print_summary(verbosity: Verbosity, count: usize, output: &Path) {
    if verbosity == Verbosity::Quiet {
        println!("generated {} nodes into {}", count, output.display());
    } else {
        println!("wrote {} ({} nodes)", output.display(), count);
    }
}
