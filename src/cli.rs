use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kubedeck",
    version,
    about = "Pod access layer and session bridge for the kubedeck dashboard."
)]
pub struct CliArgs {
    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "warn", global = true)]
    pub log_filter: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Store a kubeconfig as the active session
    Login {
        /// Kubeconfig path, or `-` to read it from stdin
        #[arg(long)]
        kubeconfig: String,
    },
    /// Forget the stored session
    Logout,
    /// Verify the stored session against the cluster
    Check,
    /// Show the identity behind the stored session
    Whoami,
    /// List pods
    List(ListArgs),
    /// List pods related to a namespace, status or search term
    Related {
        target: String,
        value: String,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Fetch one or more pods by `namespace/name`
    Get {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Write a pod document from a patch file
    Create {
        #[arg(long)]
        file: PathBuf,
    },
    /// Replace one or more pods with a patch file
    Update {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete one or more pods
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
        /// Report an outcome per pod instead of failing on the first error
        #[arg(long)]
        itemized: bool,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct ListArgs {
    /// Limit to a namespace
    #[arg(short, long, conflicts_with = "all_namespaces")]
    pub namespace: Option<String>,

    /// Search all namespaces
    #[arg(short = 'A', long)]
    pub all_namespaces: bool,

    /// Case-insensitive search over name, namespace and status
    #[arg(short, long)]
    pub q: Option<String>,

    /// Only pods in this phase
    #[arg(long)]
    pub status: Option<String>,

    #[arg(long)]
    pub page: Option<usize>,

    #[arg(long)]
    pub per_page: Option<usize>,

    /// Field to sort on; dotted paths reach into nested values
    #[arg(long)]
    pub sort: Option<String>,

    #[arg(long, value_parser = ["asc", "desc", "ASC", "DESC"])]
    pub order: Option<String>,
}
