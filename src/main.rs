use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vimage::operation::{ArgDirection, ArgSpec, OperationInstance};
use vimage::{VImage, Value, ValueType, config, output, registry};

#[derive(Parser)]
#[command(name = "vimage")]
#[command(about = "Run image operations by name")]
#[command(long_about = "\
Run image operations by name

Every operation takes named, typed arguments. Required arguments are given
positionally, inputs first and then outputs; optional ones as --name=value.

  vimage list                                # every operation
  vimage describe resize                     # its arguments
  vimage run invert in.png out.png
  vimage run resize in.jpg 0.5 out.png --kernel=nearest
  vimage run avg in.png                      # prints the mean
  vimage run min in.png --x --y              # request optional outputs
  vimage header photo.jpg -f width -f height

Filenames may carry load or save options: 'in.jpg[shrink=2]', 'out.jpg[Q=90]'.

Run 'vimage gen-config' to generate a documented vimage.toml.")]
#[command(version)]
struct Cli {
    /// Engine config file
    #[arg(long, default_value = "vimage.toml", global = true)]
    config: PathBuf,

    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered operations
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the arguments of an operation
    Describe {
        operation: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run an operation
    Run {
        operation: String,
        /// Required arguments in order, then --name=value options
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print image header and metadata fields
    Header {
        files: Vec<String>,
        /// Only print these fields
        #[arg(short, long)]
        field: Vec<String>,
    },
    /// Print a stock vimage.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let engine_config = config::load_config(&cli.config)?;
    vimage::init(&engine_config)?;

    match cli.command {
        Command::List { json } => {
            let mut operations: Vec<_> = registry::operations()
                .iter()
                .map(|op| registry::OperationInfo::of(op.as_ref()))
                .collect();
            operations.sort_by(|a, b| a.name.cmp(&b.name));
            if json {
                println!("{}", serde_json::to_string_pretty(&operations)?);
            } else {
                output::print_operation_list(&operations);
            }
        }
        Command::Describe { operation, json } => {
            let info = registry::describe(&operation)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                output::print_describe(&info);
            }
        }
        Command::Run { operation, args } => run_operation(&operation, &args)?,
        Command::Header { files, field } => {
            for file in &files {
                let image = VImage::new_from_file(file, None)?;
                output::print_header(file, &image, &field);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over `-v` when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// A `run` command line split into positional arguments and `--name[=value]`
/// options.
#[derive(Debug, Default, PartialEq)]
struct RunArgs {
    positional: Vec<String>,
    options: Vec<(String, Option<String>)>,
}

fn split_run_args(args: &[String]) -> RunArgs {
    let mut run = RunArgs::default();
    for arg in args {
        match arg.strip_prefix("--") {
            Some(option) => match option.split_once('=') {
                Some((name, value)) => run.options.push((name.to_string(), Some(value.to_string()))),
                None => run.options.push((option.to_string(), None)),
            },
            None => run.positional.push(arg.clone()),
        }
    }
    run
}

/// Outputs written to a file named on the command line, rather than printed.
fn takes_filename(spec: &ArgSpec) -> bool {
    matches!(spec.value_type, ValueType::Image | ValueType::Blob)
}

fn run_operation(name: &str, args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let operation = registry::lookup(name)?;
    let specs = operation.args().to_vec();
    let mut instance = OperationInstance::new(operation);
    let run = split_run_args(args);

    let inputs = specs
        .iter()
        .filter(|s| s.required && s.direction == ArgDirection::Input);
    let file_outputs: Vec<&ArgSpec> = specs
        .iter()
        .filter(|s| s.required && s.direction == ArgDirection::Output && takes_filename(s))
        .collect();
    let wanted = inputs.clone().count() + file_outputs.len();
    if run.positional.len() != wanted {
        return Err(format!(
            "{name}: expected {wanted} positional arguments, got {} (see 'vimage describe {name}')",
            run.positional.len()
        )
        .into());
    }

    let mut positional = run.positional.iter();
    for (spec, text) in inputs.zip(positional.by_ref()) {
        let value = Value::parse(spec.value_type, text).map_err(|reason| {
            vimage::Error::InvalidArgument {
                operation: name.to_string(),
                argument: spec.name.to_string(),
                reason,
            }
        })?;
        instance.set_property(spec.name, value)?;
    }
    let destinations: Vec<(&ArgSpec, &String)> = file_outputs.into_iter().zip(positional).collect();

    let mut printed: Vec<&str> = specs
        .iter()
        .filter(|s| s.required && s.direction == ArgDirection::Output && !takes_filename(s))
        .map(|s| s.name)
        .collect();
    for (option, text) in &run.options {
        let option = vimage::option_string::canonical_name(option);
        let spec = instance
            .arg_spec(&option)
            .cloned()
            .ok_or_else(|| vimage::Error::UnknownArgument {
                operation: name.to_string(),
                argument: option.clone(),
            })?;
        if spec.direction == ArgDirection::Output {
            printed.push(spec.name);
            continue;
        }
        let value = match text {
            None if spec.value_type == ValueType::Bool => Value::Bool(true),
            None => {
                return Err(format!("{name}: option --{option} needs a value").into());
            }
            Some(text) => Value::parse(spec.value_type, text).map_err(|reason| {
                vimage::Error::InvalidArgument {
                    operation: name.to_string(),
                    argument: option.clone(),
                    reason,
                }
            })?,
        };
        instance.set_property(spec.name, value)?;
    }

    instance.build()?;

    for (spec, filename) in destinations {
        match instance.get_property(spec.name)? {
            Value::Image(image) => image.write_to_file(filename, None)?,
            Value::Blob(blob) => std::fs::write(filename, blob.as_bytes())?,
            other => println!("{}", output::format_output_value(spec.name, other, true)),
        }
    }
    let only = printed.len() == 1;
    for field in printed {
        let value = instance.get_property(field)?;
        println!("{}", output::format_output_value(field, value, only));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn run_args_split_options_from_positionals() {
        let run = split_run_args(&strings(&["in.png", "-3", "--kernel=nearest", "--x", "out.png"]));
        assert_eq!(run.positional, strings(&["in.png", "-3", "out.png"]));
        assert_eq!(
            run.options,
            vec![
                ("kernel".to_string(), Some("nearest".to_string())),
                ("x".to_string(), None),
            ]
        );
    }

    #[test]
    fn cli_parses_trailing_run_args() {
        let cli = Cli::try_parse_from(["vimage", "-vv", "run", "resize", "a.png", "0.5", "b.png", "--kernel=nearest"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run { operation, args } => {
                assert_eq!(operation, "resize");
                assert_eq!(args.len(), 4);
            }
            _ => panic!("expected run"),
        }
    }
}
