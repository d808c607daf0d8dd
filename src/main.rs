mod cli;
mod writeout;

use std::io::{self, Write as _};
use std::process::ExitCode;

use clap::Parser;

use rurl::{Context, Error, Response};

fn main() -> ExitCode {
    env_logger::init();

    let args = cli::Cli::parse();
    log::debug!("{args:?}");
    let silent = args.silent;

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            if !silent {
                eprintln!("rurl: {err}");
                let mut source = std::error::Error::source(&err);
                while let Some(cause) = source {
                    eprintln!("rurl:   caused by: {cause}");
                    source = cause.source();
                }
            }
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(args: cli::Cli) -> Result<ExitCode, Error> {
    let mut options = rurl::flags::parse_argv(&args.command)?;

    // rurl's own presentation flags take precedence over hints parsed out
    // of the forwarded command.
    if args.verbose {
        options.presentation.verbose = true;
    }
    if args.include {
        options.presentation.include_headers = true;
    }
    if args.silent {
        options.presentation.silent = true;
    }
    if args.output.is_some() {
        options.output_file = args.output;
    }
    if args.write_out.is_some() {
        options.presentation.write_out = args.write_out;
    }

    let ctx = Context::background();

    if options.presentation.verbose {
        let url = options.parsed_url()?;
        eprintln!("> {} {}", options.effective_method(), url);
    }

    let mut response = rurl::execute(&ctx, &options)?;

    if options.presentation.verbose {
        eprintln!("< {:?} {}", response.version(), response.status());
    }

    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    if options.presentation.include_headers {
        write_head(&mut stdout, &response)?;
    }

    let output_target = match &options.output_file {
        Some(path) => Some(path.clone()),
        None if options.remote_name => Some(remote_filename(&options)?),
        None => None,
    };

    let size_download = match &output_target {
        Some(path) => {
            let written = response.save_to(path)?;
            log::debug!("wrote {written} bytes to {}", path.display());
            written
        }
        None if options.head_only => 0,
        None => {
            let bytes = response.bytes()?;
            stdout.write_all(bytes)?;
            bytes.len() as u64
        }
    };

    if let Some(format) = &options.presentation.write_out {
        let rendered = writeout::render(format, &response, size_download);
        stdout.write_all(rendered.as_bytes())?;
    }
    stdout.flush()?;

    Ok(ExitCode::SUCCESS)
}

/// `-O` writes to the last URL path segment, as curl does without `-J`.
fn remote_filename(options: &rurl::RequestOptions) -> Result<std::path::PathBuf, Error> {
    let url = options.parsed_url()?;
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| Error::Validation {
            field: "output",
            reason: "remote file name has no length".into(),
        })?;
    Ok(std::path::PathBuf::from(name))
}

fn write_head(out: &mut impl io::Write, response: &Response) -> io::Result<()> {
    writeln!(out, "{:?} {}", response.version(), response.status())?;
    for (name, value) in response.headers() {
        writeln!(out, "{}: {}", name, String::from_utf8_lossy(value.as_bytes()))?;
    }
    writeln!(out)
}

/// curl-convention exit codes: 3 for a malformed URL, 7 when the
/// connection was refused, 28 on timeout, 1 otherwise.
fn exit_code(err: &Error) -> u8 {
    if err.is_timeout() {
        return 28;
    }
    match err.root() {
        Error::Validation { field: "url", .. } => 3,
        Error::Transport(cause) if cause.is_connect() => 7,
        _ => 1,
    }
}
