//! Defines the command-line interface for the application.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use substack_publish::config::PublishMode;

#[derive(Parser, Debug)]
#[command(
    name = "substack-publish",
    version,
    about = "Publish a Markdown article to a Substack publication."
)]
pub struct Cli {
    /// The Markdown article to publish. Looked up in the current directory, then in the base directory.
    #[arg(value_name = "ARTICLE")]
    pub article: PathBuf,

    /// Directory holding `.substack-config.json` and the `published/` log. [default: the executable's directory]
    #[arg(long, env = "SUBSTACK_PUBLISH_DIR", value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Read the configuration from this file instead of the base directory.
    #[arg(short, long, value_name = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Whether to update an existing post with the same title. Overrides the config file.
    #[arg(short, long, value_enum, value_name = "MODE")]
    pub mode: Option<ModeArg>,

    /// Subtitle shown under the post title.
    #[arg(long, value_name = "TEXT", default_value = "")]
    pub subtitle: String,

    /// Publish without emailing the post to subscribers.
    #[arg(long)]
    pub no_email: bool,

    /// Append the publish log row to this file. Overrides the config file.
    ///
    /// A relative path here is taken from the current directory, while a
    /// relative `logFile` in the config is taken from the base directory.
    #[arg(long, value_name = "LOG_PATH")]
    pub log_file: Option<PathBuf>,

    /// Print the parsed title and the draft document instead of publishing.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Update the post with the same title if one exists.
    Upsert,
    /// Always create a new post.
    Create,
}

impl From<ModeArg> for PublishMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Upsert => PublishMode::Upsert,
            ModeArg::Create => PublishMode::Create,
        }
    }
}
