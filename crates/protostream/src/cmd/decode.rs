use protostream_codec::{DecodeConfig, Decoder, TextPrinter, TreeBuilder};
use protostream_wire::{ReadSource, WriteSink};

use crate::cmd::{load_registry, open_input, resolve_message, unknown_policy, DecodeArgs};
use crate::exit::{decode_error, wire_error, CliResult, SUCCESS};
use crate::output::{message_table, message_to_json, print_json, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = load_registry(&args.schema)?;
    let id = resolve_message(&registry, &args.message)?;
    let config = DecodeConfig {
        max_depth: args.max_depth,
        unknown_fields: unknown_policy(args.skip_unknown),
    };
    let decoder = Decoder::with_config(&registry, config);
    let src = ReadSource::new(open_input(args.input.as_deref())?);

    match format {
        OutputFormat::Pretty | OutputFormat::Raw => {
            // Text streams straight to stdout; a decode error still leaves
            // the fields read before it on screen.
            let single_line = args.single_line || matches!(format, OutputFormat::Raw);
            let sink = WriteSink::new(std::io::stdout().lock());
            let mut printer = TextPrinter::new(&registry, sink).single_line(single_line);
            let decoded = decoder.decode(id, src, &mut printer);
            let mut sink = printer
                .finish()
                .map_err(|err| wire_error("writing output", err))?;
            sink.flush()
                .map_err(|err| wire_error("writing output", err))?;
            decoded.map_err(|err| decode_error("decoding input", err))?;
        }
        OutputFormat::Json | OutputFormat::Table => {
            let mut builder = TreeBuilder::new();
            decoder
                .decode(id, src, &mut builder)
                .map_err(|err| decode_error("decoding input", err))?;
            let message = builder.finish();
            if matches!(format, OutputFormat::Json) {
                print_json(&message_to_json(&registry, id, &message));
            } else {
                println!("{}", message_table(&registry, id, &message));
            }
        }
    }

    Ok(SUCCESS)
}
