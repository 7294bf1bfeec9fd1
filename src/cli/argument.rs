use std::path::PathBuf;

use clap::builder::styling::AnsiColor;
use clap::builder::Styles;
use clap::{Parser, Subcommand};
use submerge::Verbosity;

fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Green.on_default())
        .literal(AnsiColor::BrightGreen.on_default())
        .placeholder(AnsiColor::Cyan.on_default())
}

/// Merges proxy subscriptions into one deduplicated node list.
#[derive(Parser, Debug, Clone)]
#[command(version, styles = get_styles())]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch every configured source and write the merged node list.
    Merge {
        /// Sources document listing the subscription endpoints.
        sources: PathBuf,

        /// File to write the merged nodes to [default: merged_sources.yaml].
        output: Option<String>,

        /// How much to report: quiet, normal or verbose [default: normal].
        verbosity: Option<Verbosity>,
    },

    /// Splice a merged node list into a routing template.
    Template {
        /// Document produced by `merge`.
        merged: PathBuf,

        /// Routing template to fill in.
        template: PathBuf,

        /// File to write the final configuration to [default: output.yaml].
        output: Option<String>,

        /// How much to report: quiet, normal or verbose [default: normal].
        verbosity: Option<Verbosity>,
    },
}

/// Sorts out the optional trailing arguments.
///
/// A verbosity word in the output slot is taken as the verbosity, so
/// `merge sources.yaml quiet` writes to the default file.
pub fn output_and_verbosity(
    output: Option<String>, verbosity: Option<Verbosity>, default_output: &str,
) -> (PathBuf, Verbosity) {
    match (output, verbosity) {
        (Some(output), None) => match output.parse::<Verbosity>() {
            Ok(verbosity) => (PathBuf::from(default_output), verbosity),
            Err(_) => (PathBuf::from(output), Verbosity::default()),
        },
        (output, verbosity) => (
            output.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(default_output)),
            verbosity.unwrap_or_default(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_in_output_slot() {
        assert_eq!(
            output_and_verbosity(Some("quiet".into()), None, "merged.yaml"),
            (PathBuf::from("merged.yaml"), Verbosity::Quiet)
        );
        assert_eq!(
            output_and_verbosity(Some("out.yaml".into()), None, "merged.yaml"),
            (PathBuf::from("out.yaml"), Verbosity::Normal)
        );
        assert_eq!(
            output_and_verbosity(Some("out.yaml".into()), Some(Verbosity::Verbose), "m.yaml"),
            (PathBuf::from("out.yaml"), Verbosity::Verbose)
        );
        assert_eq!(
            output_and_verbosity(None, None, "m.yaml"),
            (PathBuf::from("m.yaml"), Verbosity::Normal)
        );
    }

    #[test]
    fn parses_merge_command() {
        let cli = Cli::try_parse_from(["submerge", "merge", "sources.yaml", "out.yaml", "verbose"])
            .unwrap();
        match cli.command {
            Command::Merge {
                sources,
                output,
                verbosity,
            } => {
                assert_eq!(sources, PathBuf::from("sources.yaml"));
                assert_eq!(output.as_deref(), Some("out.yaml"));
                assert_eq!(verbosity, Some(Verbosity::Verbose));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_verbosity() {
        assert!(Cli::try_parse_from(["submerge", "merge", "s.yaml", "o.yaml", "loud"]).is_err());
        assert!(Cli::try_parse_from(["submerge", "merge"]).is_err());
    }
}
