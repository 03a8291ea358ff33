use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use protostream_codec::{UnknownFieldPolicy, DEFAULT_MAX_DEPTH};
use protostream_def::{MessageId, Registry};
use tracing::debug;

use crate::exit::{def_error, io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod describe;
pub mod reencode;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a binary message and print it.
    Decode(DecodeArgs),
    /// Decode a message and encode it again, reporting whether the bytes match.
    Reencode(ReencodeArgs),
    /// List the messages and enums a schema defines.
    Describe(DescribeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Reencode(args) => reencode::run(args, format),
        Command::Describe(args) => describe::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// JSON schema document.
    #[arg(long, short = 's', value_name = "FILE", env = "PROTOSTREAM_SCHEMA")]
    pub schema: PathBuf,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    #[command(flatten)]
    pub schema: SchemaArgs,
    /// Fully qualified message name.
    #[arg(long, short = 'm')]
    pub message: String,
    /// Input file. Reads stdin when absent or "-".
    pub input: Option<PathBuf>,
    /// Drop fields the schema does not define instead of printing them.
    #[arg(long)]
    pub skip_unknown: bool,
    /// Deepest submessage nesting accepted.
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,
    /// Print text output on a single line.
    #[arg(long)]
    pub single_line: bool,
}

#[derive(Args, Debug)]
pub struct ReencodeArgs {
    #[command(flatten)]
    pub schema: SchemaArgs,
    /// Fully qualified message name.
    #[arg(long, short = 'm')]
    pub message: String,
    /// Input file. Reads stdin when absent or "-".
    pub input: Option<PathBuf>,
    /// Write the encoded bytes here and print a report. Without it the bytes
    /// go to stdout.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
    /// Pack every repeated scalar field.
    #[arg(long)]
    pub pack_repeated: bool,
    /// Fail when a required field is missing.
    #[arg(long)]
    pub check_required: bool,
    /// Drop fields the schema does not define.
    #[arg(long)]
    pub skip_unknown: bool,
}

#[derive(Args, Debug)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub schema: SchemaArgs,
    /// Only describe this message.
    #[arg(long, short = 'm')]
    pub message: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn unknown_policy(skip: bool) -> UnknownFieldPolicy {
    if skip {
        UnknownFieldPolicy::Skip
    } else {
        UnknownFieldPolicy::Preserve
    }
}

pub fn load_registry(args: &SchemaArgs) -> CliResult<Registry> {
    let registry = Registry::from_file(&args.schema)
        .map_err(|err| def_error(&format!("loading schema {}", args.schema.display()), err))?;
    debug!(
        schema = %args.schema.display(),
        messages = registry.message_count(),
        enums = registry.enum_count(),
        "schema loaded"
    );
    Ok(registry)
}

pub fn resolve_message(registry: &Registry, name: &str) -> CliResult<MessageId> {
    registry
        .message_id(name)
        .ok_or_else(|| CliError::new(USAGE, format!("message not defined in schema: {name}")))
}

pub fn open_input(path: Option<&Path>) -> CliResult<Box<dyn Read>> {
    match path {
        None => Ok(Box::new(std::io::stdin().lock())),
        Some(path) if path == Path::new("-") => Ok(Box::new(std::io::stdin().lock())),
        Some(path) => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("opening input {}", path.display()), err))?;
            Ok(Box::new(file))
        }
    }
}
