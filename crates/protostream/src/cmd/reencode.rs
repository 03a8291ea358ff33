use std::io::Read;

use protostream_codec::{DecodeConfig, Decoder, EncodeConfig, StreamEncoder};
use protostream_wire::SliceSource;
use tracing::info;

use crate::cmd::{load_registry, open_input, resolve_message, unknown_policy, ReencodeArgs};
use crate::exit::{decode_error, encode_error, io_error, CliResult, SUCCESS};
use crate::output::{print_raw, print_reencode, OutputFormat, ReencodeOutput};

pub fn run(args: ReencodeArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = load_registry(&args.schema)?;
    let id = resolve_message(&registry, &args.message)?;

    let mut input = Vec::new();
    open_input(args.input.as_deref())?
        .read_to_end(&mut input)
        .map_err(|err| io_error("reading input", err))?;

    let encode_config = EncodeConfig {
        pack_repeated: args.pack_repeated,
        check_required: args.check_required,
        ..EncodeConfig::default()
    };
    let decode_config = DecodeConfig {
        max_depth: encode_config.max_depth,
        unknown_fields: unknown_policy(args.skip_unknown),
    };

    let mut encoder = StreamEncoder::with_config(&registry, id, encode_config)
        .map_err(|err| encode_error("preparing encoder", err))?;
    Decoder::with_config(&registry, decode_config)
        .decode(id, SliceSource::new(input.clone()), &mut encoder)
        .map_err(|err| decode_error("decoding input", err))?;
    let mut encoded = Vec::new();
    encoder
        .finish(&mut encoded)
        .map_err(|err| encode_error("encoding message", err))?;

    let identical = encoded == input;
    info!(
        message_type = %args.message,
        input_bytes = input.len(),
        output_bytes = encoded.len(),
        identical,
        "message re-encoded"
    );

    let Some(path) = args.output else {
        print_raw(&encoded);
        return Ok(SUCCESS);
    };
    std::fs::write(&path, &encoded)
        .map_err(|err| io_error(&format!("writing {}", path.display()), err))?;

    let report = ReencodeOutput {
        schema_id: "https://schemas.3leaps.dev/protostream/cli/v1/reencode.schema.json",
        message: &args.message,
        input_bytes: input.len() as u64,
        output_bytes: encoded.len() as u64,
        identical,
        output: path.display().to_string(),
    };
    print_reencode(&report, format);
    Ok(SUCCESS)
}
