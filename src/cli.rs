//! Command-line definitions.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Moves Google Tasks that are nearly due into your primary list
#[derive(Parser, Debug)]
#[command(name = "taskshift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Workspace directory holding config/ and state/ (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Never open a consent flow; fail if the stored credential is unusable
    #[arg(long, global = true)]
    pub no_interactive: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Move tasks due within the lookahead window into the primary list
    Run {
        /// Primary list id (overrides primaryListId in the config)
        #[arg(long, value_name = "ID")]
        primary_list: Option<String>,
    },

    /// Show task lists and which one is primary
    Lists {
        /// Primary list id (overrides primaryListId in the config)
        #[arg(long, value_name = "ID")]
        primary_list: Option<String>,
    },

    /// Obtain or refresh the stored credential
    Auth,

    /// Delete the stored credential
    Logout,

    /// Delete every task in the given lists
    Clear(ClearArgs),
}

#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Clear every list of the account
    #[arg(long, conflicts_with = "list_ids")]
    pub all: bool,

    /// List ids to clear
    #[arg(value_name = "LIST_ID", required_unless_present = "all")]
    pub list_ids: Vec<String>,

    /// Confirm deletion
    #[arg(long)]
    pub yes: bool,
}

impl Cli {
    /// Filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
