use crate::cmd::{load_registry, resolve_message, DescribeArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{
    print_schema, EnumOutput, EnumValueOutput, MessageOutput, OutputFormat, SchemaOutput,
};

pub fn run(args: DescribeArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = load_registry(&args.schema)?;

    let messages = match args.message.as_deref() {
        Some(name) => {
            let id = resolve_message(&registry, name)?;
            registry
                .message(id)
                .map(MessageOutput::from_def)
                .into_iter()
                .collect()
        }
        None => registry
            .messages()
            .map(|(_, definition)| MessageOutput::from_def(definition))
            .collect(),
    };
    let enums = if args.message.is_some() {
        Vec::new()
    } else {
        registry
            .enums()
            .map(|(_, definition)| EnumOutput {
                name: definition.name(),
                values: definition
                    .values()
                    .map(|(number, name)| EnumValueOutput { name, number })
                    .collect(),
            })
            .collect()
    };

    let schema = SchemaOutput {
        schema_id: "https://schemas.3leaps.dev/protostream/cli/v1/describe.schema.json",
        messages,
        enums,
    };
    print_schema(&schema, format);
    Ok(SUCCESS)
}
