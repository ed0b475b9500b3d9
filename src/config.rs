//! Option descriptors, generator settings and their validation.

use crate::destination::OutputTarget;
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

/// Characters that would break out of a `case` pattern in the generated script.
const PATTERN_SPECIAL: &[char] = &[
    '|', '(', ')', '*', '?', '[', ']', '"', '\'', '`', '$', '\\', ';', '&', '<', '>', '=', '!',
    '~',
];

/// Names claimed by the built-in help branch.
const RESERVED_NAMES: &[&str] = &["h", "help"];

/// Errors that can occur while validating descriptors or settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("descriptor '{0}' has neither options nor elements")]
    NoOptionSpecified(String),

    #[error("descriptor '{0}' has both options and elements")]
    OptionsAndElements(String),

    #[error("invalid destination '{0}': must be a shell variable name")]
    InvalidDestination(String),

    #[error("invalid option name '{0}' on destination '{1}'")]
    InvalidOptionName(String, String),

    #[error("option '{0}' is reserved for the built-in help branch")]
    ReservedOption(String),

    #[error("duplicate option: {0}")]
    DuplicateOption(String),

    #[error("true_false_choice must hold exactly two values, got {0}")]
    InvalidTrueFalseChoice(usize),
}

/// How a matched option produces its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HasArgument {
    /// The matched flag itself becomes the value (`"self"`).
    SelfName,
    /// The next token is consumed as the value (`"yes"` or `true`).
    Value,
    /// A boolean switch set to the "on" sentinel.
    #[default]
    Flag,
}

impl From<&str> for HasArgument {
    fn from(value: &str) -> Self {
        match value {
            "self" => HasArgument::SelfName,
            "yes" => HasArgument::Value,
            _ => HasArgument::Flag,
        }
    }
}

impl<'de> Deserialize<'de> for HasArgument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct HasArgumentVisitor;

        impl<'de> Visitor<'de> for HasArgumentVisitor {
            type Value = HasArgument;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("\"self\", \"yes\", a boolean or any scalar")
            }

            fn visit_bool<E>(self, value: bool) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if value {
                    Ok(HasArgument::Value)
                } else {
                    Ok(HasArgument::Flag)
                }
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(HasArgument::from(value))
            }

            fn visit_i64<E>(self, _value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(HasArgument::Flag)
            }

            fn visit_u64<E>(self, _value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(HasArgument::Flag)
            }

            fn visit_f64<E>(self, _value: f64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(HasArgument::Flag)
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(HasArgument::Flag)
            }

            fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(HasArgument::Flag)
            }
        }

        deserializer.deserialize_any(HasArgumentVisitor)
    }
}

/// One command-line switch or fixed-choice element set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OptionDescriptor {
    /// Comma-separated flag names, one character for `-x`, longer for `--name`
    pub options: Option<String>,
    /// Comma-separated literal values for a fixed-choice positional
    pub elements: Option<String>,
    /// Shell variable receiving the parsed value
    pub destination: String,
    #[serde(default)]
    pub has_argument: HasArgument,
    pub help_text: Option<String>,
}

/// The populated half of a descriptor, with its names split out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorKind<'a> {
    Options(Vec<&'a str>),
    Elements(Vec<&'a str>),
}

impl<'a> DescriptorKind<'a> {
    /// Case-pattern tokens for this descriptor, before lower-casing.
    pub fn tokens(&self) -> Vec<String> {
        match self {
            DescriptorKind::Options(names) => names.iter().map(|name| flag_token(name)).collect(),
            DescriptorKind::Elements(elements) => {
                elements.iter().map(|element| element.to_string()).collect()
            }
        }
    }

    fn names(&self) -> &[&'a str] {
        match self {
            DescriptorKind::Options(names) | DescriptorKind::Elements(names) => names,
        }
    }
}

impl OptionDescriptor {
    /// Build a flag descriptor, as read from a delimited row.
    pub fn flag(options: &str, destination: &str, has_argument: HasArgument, help: &str) -> Self {
        Self {
            options: Some(options.to_string()),
            elements: None,
            destination: destination.to_string(),
            has_argument,
            help_text: Some(help.to_string()),
        }
    }

    /// Build a fixed-choice descriptor.
    pub fn choice(elements: &str, destination: &str, help: &str) -> Self {
        Self {
            options: None,
            elements: Some(elements.to_string()),
            destination: destination.to_string(),
            has_argument: HasArgument::Flag,
            help_text: Some(help.to_string()),
        }
    }

    /// Determine whether this is a flag or an element descriptor.
    ///
    /// Empty strings count as absent.
    pub fn kind(&self) -> Result<DescriptorKind<'_>, ConfigError> {
        let options = non_empty(self.options.as_deref());
        let elements = non_empty(self.elements.as_deref());

        match (options, elements) {
            (Some(options), None) => Ok(DescriptorKind::Options(split_names(options))),
            (None, Some(elements)) => Ok(DescriptorKind::Elements(split_names(elements))),
            (Some(_), Some(_)) => Err(ConfigError::OptionsAndElements(self.destination.clone())),
            (None, None) => Err(ConfigError::NoOptionSpecified(self.destination.clone())),
        }
    }

    /// Help text, empty when the descriptor carries none.
    pub fn help(&self) -> &str {
        self.help_text.as_deref().unwrap_or("")
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

fn split_names(list: &str) -> Vec<&str> {
    list.split(',').map(str::trim).collect()
}

/// Whether a name renders as a single-dash flag.
pub fn is_short(name: &str) -> bool {
    name.chars().count() == 1
}

/// Turn an option name into its flag token: `v` -> `-v`, `verbose` -> `--verbose`.
pub fn flag_token(name: &str) -> String {
    if is_short(name) {
        format!("-{}", name)
    } else {
        format!("--{}", name)
    }
}

fn is_shell_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && !name
            .chars()
            .any(|c| c.is_whitespace() || PATTERN_SPECIAL.contains(&c))
}

/// Validate a descriptor list before rendering.
///
/// Flag tokens are compared lower-cased, since the generated parser
/// dispatches on the lower-cased argument.
pub fn validate_descriptors(descriptors: &[OptionDescriptor]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for descriptor in descriptors {
        if !is_shell_identifier(&descriptor.destination) {
            return Err(ConfigError::InvalidDestination(
                descriptor.destination.clone(),
            ));
        }

        let kind = descriptor.kind()?;
        let is_flag = matches!(kind, DescriptorKind::Options(_));
        for name in kind.names() {
            if !is_valid_name(name) {
                return Err(ConfigError::InvalidOptionName(
                    name.to_string(),
                    descriptor.destination.clone(),
                ));
            }
            if is_flag && RESERVED_NAMES.contains(&name.to_lowercase().as_str()) {
                return Err(ConfigError::ReservedOption(flag_token(name)));
            }
        }

        for token in kind.tokens() {
            if !seen.insert(token.to_lowercase()) {
                return Err(ConfigError::DuplicateOption(token));
            }
        }
    }

    Ok(())
}

/// Values stored in generated variables for boolean switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentinels {
    pub on: String,
    pub off: String,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            on: "yes".to_string(),
            off: String::new(),
        }
    }
}

impl Sentinels {
    /// Build from a `true_false_choice` list; an empty list selects the defaults.
    pub fn from_choice(choice: &[String]) -> Result<Self, ConfigError> {
        match choice {
            [] => Ok(Self::default()),
            [on, off] => Ok(Self {
                on: on.clone(),
                off: off.clone(),
            }),
            other => Err(ConfigError::InvalidTrueFalseChoice(other.len())),
        }
    }
}

/// Effective settings used to render one option file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settings {
    /// Usage line shown after the program name
    pub usage: Option<String>,
    /// Description shown in the help text
    pub description: Option<String>,
    /// Reserved; the generated parser is always a case loop
    pub use_getopt: bool,
    pub sentinels: Sentinels,
    /// Collect unrecognized tokens into an `args` array
    pub remains_as_args: bool,
    /// Add a `--debug` branch enabling `set -x`
    pub add_debug: bool,
    /// Append an echo of every destination after parsing
    pub add_test: bool,
    pub output: OutputTarget,
}

/// Overrides read from the `generator_opts` section of a structured file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorOpts {
    pub usage: Option<String>,
    pub description: Option<String>,
    pub use_getopt: Option<bool>,
    pub true_false_choice: Option<Vec<String>>,
    pub remains_as_args: Option<bool>,
    pub add_debug: Option<bool>,
    pub add_test: Option<bool>,
    pub output_file: Option<String>,
}

impl GeneratorOpts {
    /// Check whether the file overrides nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge these overrides over the invocation defaults.
    ///
    /// Each field present in the file wins; absent fields keep the default.
    pub fn apply_to(&self, defaults: &Settings) -> Result<Settings, ConfigError> {
        let sentinels = match self.true_false_choice {
            Some(ref choice) => Sentinels::from_choice(choice)?,
            None => defaults.sentinels.clone(),
        };

        Ok(Settings {
            usage: self.usage.clone().or_else(|| defaults.usage.clone()),
            description: self
                .description
                .clone()
                .or_else(|| defaults.description.clone()),
            use_getopt: self.use_getopt.unwrap_or(defaults.use_getopt),
            sentinels,
            remains_as_args: self.remains_as_args.unwrap_or(defaults.remains_as_args),
            add_debug: self.add_debug.unwrap_or(defaults.add_debug),
            add_test: self.add_test.unwrap_or(defaults.add_test),
            output: match self.output_file {
                Some(ref path) => OutputTarget::from(path.as_str()),
                None => defaults.output.clone(),
            },
        })
    }
}
