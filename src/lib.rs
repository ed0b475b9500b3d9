//! shoptgen - bash option parsers from declarative option lists.
//!
//! This library reads an option list written as YAML, JSON or `;`-delimited
//! text, and renders a bash fragment that parses matching command-line
//! options, together with a `usage` function carrying the help text.

pub mod config;
pub mod destination;
pub mod help;
pub mod logging;
pub mod output;
pub mod parser;

pub use config::{
    validate_descriptors, ConfigError, GeneratorOpts, HasArgument, OptionDescriptor, Sentinels,
    Settings,
};
pub use destination::{write_script, OutputTarget, WriteError};
pub use help::generate_help;
pub use output::{render_script, Script};
pub use parser::{parse_opts, parse_opts_file, parse_opts_str, Format, OptsFile, ParseError};
