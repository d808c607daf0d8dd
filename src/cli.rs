use std::path::PathBuf;

use clap::Parser;

/// Run curl command lines from the shell.
///
/// Presentation flags are rurl's own and must come before the command;
/// everything from the first non-option word on is forwarded verbatim to
/// the curl parser. A leading `curl` word in the command is allowed and
/// ignored.
#[derive(Parser, Debug)]
#[command(name = "rurl", version, about = "Execute curl command lines as HTTP requests")]
pub struct Cli {
    /// Report request and response detail on stderr.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Include the status line and response headers in the output.
    #[arg(short = 'i', long)]
    pub include: bool,

    /// Suppress the error message on failure.
    #[arg(short = 's', long)]
    pub silent: bool,

    /// Write the response body to FILE instead of stdout.
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Render FORMAT on stdout after completion. Supports curl's
    /// %{http_code}, %{content_type}, %{size_download}, %{time_total},
    /// %{url_effective}, %{speed_download} and friends.
    #[arg(short = 'w', long = "write-out", value_name = "FORMAT")]
    pub write_out: Option<String>,

    /// The curl command to execute.
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required = true
    )]
    pub command: Vec<String>,
}
