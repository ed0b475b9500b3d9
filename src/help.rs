//! Help text for generated scripts, rendered through Clap.

use crate::config::{
    is_short, ConfigError, DescriptorKind, HasArgument, OptionDescriptor, Settings,
};
use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, Command};

/// Program name shown in the help text; the shell expands it inside the heredoc.
pub const PROGRAM_NAME: &str = "${0}";

/// Build a Clap Command mirroring the generated parser.
fn build_command(
    descriptors: &[OptionDescriptor],
    settings: &Settings,
) -> Result<Command, ConfigError> {
    let mut cmd = Command::new(PROGRAM_NAME).disable_help_subcommand(true);

    if let Some(ref usage) = settings.usage {
        cmd = cmd.override_usage(format!("{} {}", PROGRAM_NAME, usage));
    }

    if let Some(ref description) = settings.description {
        cmd = cmd.about(description.clone());
    }

    for (index, descriptor) in descriptors.iter().enumerate() {
        cmd = cmd.arg(build_arg(index, descriptor)?);
    }

    Ok(cmd)
}

/// Build a Clap Arg from a descriptor.
///
/// The id carries the descriptor index, since several descriptors may share
/// a destination.
fn build_arg(index: usize, descriptor: &OptionDescriptor) -> Result<Arg, ConfigError> {
    let mut arg = Arg::new(format!("{}#{}", descriptor.destination, index));

    match descriptor.kind()? {
        DescriptorKind::Options(names) => {
            let (shorts, longs): (Vec<&str>, Vec<&str>) =
                names.into_iter().partition(|name| is_short(name));

            let mut shorts = shorts.into_iter().filter_map(|name| name.chars().next());
            if let Some(short) = shorts.next() {
                arg = arg.short(short);
            }
            for alias in shorts {
                arg = arg.visible_short_alias(alias);
            }

            let mut longs = longs.into_iter();
            if let Some(long) = longs.next() {
                arg = arg.long(long.to_string());
            }
            for alias in longs {
                arg = arg.visible_alias(alias.to_string());
            }

            arg = match descriptor.has_argument {
                HasArgument::Value => arg
                    .action(ArgAction::Set)
                    .value_name(descriptor.destination.to_uppercase()),
                HasArgument::SelfName | HasArgument::Flag => arg.action(ArgAction::SetTrue),
            };
        }
        DescriptorKind::Elements(elements) => {
            let values: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
            arg = arg
                .value_name(descriptor.destination.clone())
                .value_parser(PossibleValuesParser::new(values));
        }
    }

    Ok(arg.help(descriptor.help().to_string()))
}

/// Generate the full help text for a generated script.
///
/// Descriptors must have passed `validate_descriptors`; Clap asserts on
/// duplicate or reserved flags.
pub fn generate_help(
    descriptors: &[OptionDescriptor],
    settings: &Settings,
) -> Result<String, ConfigError> {
    let mut cmd = build_command(descriptors, settings)?;
    Ok(cmd.render_help().to_string())
}
