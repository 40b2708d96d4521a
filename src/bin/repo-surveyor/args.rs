use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, ValueEnum};
use std::path::PathBuf;

use repo_surveyor::refs::RefSelection;

// -----------------------------------------------------------------------------
// command-line args
// -----------------------------------------------------------------------------
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Survey a local Git repository and report how big it really is: \
        how many refs of which classes it has, how its reachable commits, trees, \
        and blobs are distributed by size, how much disk they occupy, and which \
        items are the largest along several dimensions."
)]
#[deny(missing_docs)]
/// Survey the scale of a Git repository
pub struct CommandLineArgs {
    /// Path to the repository to survey
    #[arg(value_name = "REPOSITORY", default_value = ".")]
    pub repository: PathBuf,

    #[command(flatten)]
    pub ref_args: RefSelectionArgs,

    #[command(flatten)]
    pub top_args: TopArgs,

    #[command(flatten)]
    pub output_args: OutputArgs,

    #[command(flatten)]
    pub global_args: GlobalArgs,
}

impl CommandLineArgs {
    pub fn parse_args() -> Self {
        let mut s = Self::parse();

        // If `NO_COLOR` is set in the environment, disable colored output
        //
        // https://no-color.org/
        if std::env::var("NO_COLOR").is_ok() {
            s.global_args.color = Mode::Never
        }

        s
    }
}

// -----------------------------------------------------------------------------
// ref selection
// -----------------------------------------------------------------------------
/// Which ref categories seed the survey. All flags are positive-only; when
/// none is given, the built-in default of branches, tags, and remotes is
/// used.
#[derive(Args, Debug)]
#[command(next_help_heading = "Ref Selection Options")]
pub struct RefSelectionArgs {
    /// Survey every ref category
    #[arg(long)]
    pub all_refs: bool,

    /// Survey branches (refs/heads/)
    #[arg(long)]
    pub branches: bool,

    /// Survey tags (refs/tags/)
    #[arg(long)]
    pub tags: bool,

    /// Survey remote-tracking refs (refs/remotes/)
    #[arg(long)]
    pub remotes: bool,

    /// Survey HEAD, including when detached
    #[arg(long)]
    pub detached: bool,

    /// Survey refs outside the usual namespaces (notes, stash, ...)
    #[arg(long)]
    pub other: bool,
}

impl RefSelectionArgs {
    /// A given flag means "wanted"; an absent one stays unspecified, which
    /// is what makes the default rule work.
    pub fn to_selection(&self) -> RefSelection {
        RefSelection {
            all: self.all_refs.then_some(true),
            branches: self.branches.then_some(true),
            tags: self.tags.then_some(true),
            remotes: self.remotes.then_some(true),
            detached: self.detached.then_some(true),
            other: self.other.then_some(true),
        }
    }
}

// -----------------------------------------------------------------------------
// large item dimensions
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "Large Item Options")]
pub struct TopArgs {
    /// How many commits to report by parent count (0 disables)
    #[arg(long, value_name = "N")]
    pub commit_parents: Option<usize>,

    /// How many commits to report by size (0 disables)
    #[arg(long, value_name = "N")]
    pub commit_sizes: Option<usize>,

    /// How many trees to report by entry count (0 disables)
    #[arg(long, value_name = "N")]
    pub tree_entries: Option<usize>,

    /// How many trees to report by size (0 disables)
    #[arg(long, value_name = "N")]
    pub tree_sizes: Option<usize>,

    /// How many blobs to report by size (0 disables)
    #[arg(long, value_name = "N")]
    pub blob_sizes: Option<usize>,

    /// Resolve a symbolic name for each large item's commit
    ///
    /// This is the default; it can be switched off with the `survey.namerev`
    /// configuration key, and back on with this flag.
    #[arg(long)]
    pub name_rev: bool,
}

// -----------------------------------------------------------------------------
// output options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "Output Options")]
pub struct OutputArgs {
    /// Emit the report as a structured JSON tree instead of tables
    #[arg(long)]
    pub json: bool,

    /// Write the report to the specified path
    ///
    /// If this argument is not provided, stdout will be used.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

impl OutputArgs {
    /// Get a writer for the specified output destination.
    pub fn get_writer(&self) -> std::io::Result<Box<dyn std::io::Write>> {
        use std::fs::File;
        use std::io::BufWriter;

        match &self.output {
            None => Ok(Box::new(BufWriter::new(std::io::stdout()))),
            Some(p) => {
                let f = File::create(p)?;
                Ok(Box::new(BufWriter::new(f)))
            }
        }
    }
}

// -----------------------------------------------------------------------------
// global options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "Global Options")]
pub struct GlobalArgs {
    /// Enable verbose output
    ///
    /// Once enables detailed tables; it can be repeated up to 3 times to
    /// enable successively more logging.
    #[arg(global=true, long, short, action=ArgAction::Count)]
    pub verbose: u8,

    /// Enable or disable colored output
    ///
    /// When this is "auto", colors are enabled when stdout is a tty.
    ///
    /// If the `NO_COLOR` environment variable is set, it takes precedence and is equivalent to `--color=never`.
    #[arg(global=true, long, default_value_t=Mode::Auto, value_name="MODE")]
    pub color: Mode,

    /// Enable or disable the progress meter
    ///
    /// A bare `--progress` forces it on; when this is "auto", the meter is
    /// shown when stderr is a tty.
    #[arg(
        global = true,
        long,
        value_name = "MODE",
        num_args = 0..=1,
        default_value_t = Mode::Auto,
        default_missing_value = "always"
    )]
    pub progress: Mode,
}

impl GlobalArgs {
    pub fn use_color(&self) -> bool {
        match self.color {
            Mode::Never => false,
            Mode::Always => true,
            Mode::Auto => atty::is(atty::Stream::Stdout),
        }
    }

    /// Whether to show progress, honoring the CLI mode first and a
    /// repository `survey.progress` setting when the mode is "auto".
    pub fn use_progress(&self, configured: Option<bool>) -> bool {
        match self.progress {
            Mode::Never => false,
            Mode::Always => true,
            Mode::Auto => configured.unwrap_or_else(|| atty::is(atty::Stream::Stderr)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Mode {
    Auto,
    Never,
    Always,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::Auto => "auto",
            Mode::Never => "never",
            Mode::Always => "always",
        };
        write!(f, "{s}")
    }
}

// -----------------------------------------------------------------------------
// report writer
// -----------------------------------------------------------------------------
pub trait Reportable {
    fn human_format<W: std::io::Write>(&self, writer: W) -> Result<()>;
    fn json_format<W: std::io::Write>(&self, writer: W) -> Result<()>;

    fn report(&self, json: bool, output_args: &OutputArgs) -> Result<()> {
        let writer = output_args
            .get_writer()
            .context("Failed to open output destination for writing")?;

        let result = if json {
            self.json_format(writer)
        } else {
            self.human_format(writer)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => match e.downcast_ref::<std::io::Error>() {
                // Ignore SIGPIPE errors, like those that can come from piping to `head`
                Some(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                _ => Err(e)?,
            },
        }
    }
}
