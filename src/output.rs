//! Rendering of the generated bash option parser.

use crate::config::{ConfigError, DescriptorKind, HasArgument, OptionDescriptor, Settings};
use crate::help::{generate_help, PROGRAM_NAME};
use std::fmt;
use tracing::debug;

/// Indentation of the `case` statement inside the loop.
const INDENT: &str = "\t";
/// Indentation of each `case` branch.
const BRANCH_INDENT: &str = "\t\t";
/// Last line of every generated script.
pub const END_MARKER: &str = "#END\n";

/// A generated script, one entry per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    lines: Vec<String>,
}

impl Script {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Join the lines into the text written to the destination.
    pub fn to_text(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Escape a string for safe use in a shell double-quoted context.
///
/// Escapes: $, `, \ and "
fn escape_shell_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '$' => escaped.push_str("\\$"),
            '`' => escaped.push_str("\\`"),
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Escape a help line for an unquoted heredoc.
///
/// Only the program-name token is left for the shell to expand.
fn escape_heredoc_line(line: &str) -> String {
    line.split(PROGRAM_NAME)
        .map(|part| {
            let mut escaped = String::with_capacity(part.len());
            for c in part.chars() {
                if matches!(c, '$' | '`' | '\\') {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
            escaped
        })
        .collect::<Vec<_>>()
        .join(PROGRAM_NAME)
}

/// Render the complete parser for a descriptor list.
///
/// Sections are built independently and joined once:
/// header, usage function, loop setup, user branches, catch-all, loop
/// closer, footer.
pub fn render_script(
    descriptors: &[OptionDescriptor],
    settings: &Settings,
) -> Result<Script, ConfigError> {
    if settings.use_getopt {
        debug!("getopt mode is not implemented, generating a case loop");
    }

    let branches = descriptors
        .iter()
        .map(|descriptor| render_branch(descriptor, settings))
        .collect::<Result<Vec<_>, _>>()?;
    let help = generate_help(descriptors, settings)?;

    let lines = [
        header(),
        usage_function(&help),
        loop_setup(descriptors, settings),
        branches,
        vec![catch_all(settings)],
        loop_closer(),
        footer(descriptors, settings),
    ]
    .concat();

    Ok(Script { lines })
}

/// Render the `case` branch for one descriptor.
fn render_branch(
    descriptor: &OptionDescriptor,
    settings: &Settings,
) -> Result<String, ConfigError> {
    let dest = &descriptor.destination;
    let kind = descriptor.kind()?;

    let action = match kind {
        DescriptorKind::Options(_) => match descriptor.has_argument {
            HasArgument::SelfName => format!(r#"{}="${{1#--}}";;"#, dest),
            HasArgument::Value => format!(r#"shift; {}="${{1}}";;"#, dest),
            HasArgument::Flag => format!(
                r#"{}="{}";;"#,
                dest,
                escape_shell_value(&settings.sentinels.on)
            ),
        },
        DescriptorKind::Elements(_) => format!(r#"{}="${{1}}";;"#, dest),
    };

    // The loop matches against "${1,,}", so patterns must be lower case too
    let pattern = kind
        .tokens()
        .iter()
        .map(|token| token.to_lowercase())
        .collect::<Vec<_>>()
        .join("|");

    Ok(format!("{}{}) {}", BRANCH_INDENT, pattern, action))
}

fn header() -> Vec<String> {
    vec![
        "#!/usr/bin/env bash".to_string(),
        "set -eu".to_string(),
        String::new(),
    ]
}

/// Wrap the help text in a `usage` function printing it to stderr.
fn usage_function(help: &str) -> Vec<String> {
    let body = help.lines().map(|line| {
        let line = line.trim_end();
        if line.is_empty() {
            String::new()
        } else {
            format!("{}{}", INDENT, escape_heredoc_line(line))
        }
    });

    ["function usage(){".to_string(), format!("{}cat > /dev/stderr <<-EOF", INDENT)]
        .into_iter()
        .chain(body)
        .chain([format!("{}EOF", INDENT), "}".to_string(), String::new()])
        .collect()
}

/// Destination initializations, the loop head and the built-in branches.
fn loop_setup(descriptors: &[OptionDescriptor], settings: &Settings) -> Vec<String> {
    let off = escape_shell_value(&settings.sentinels.off);

    descriptors
        .iter()
        .map(|descriptor| format!(r#"{}="{}""#, descriptor.destination, off))
        .chain(
            settings
                .remains_as_args
                .then(|| "declare -a args=()".to_string()),
        )
        .chain([
            String::new(),
            "while [ $# -ne 0 ]; do".to_string(),
            format!(r#"{}case "${{1,,}}" in"#, INDENT),
            format!("{}--) shift; break;;", BRANCH_INDENT),
            format!("{}-h|-help|--help) usage; exit 1;;", BRANCH_INDENT),
        ])
        .chain(
            settings
                .add_debug
                .then(|| format!("{}--debug) set -x;;", BRANCH_INDENT)),
        )
        .collect()
}

fn catch_all(settings: &Settings) -> String {
    if settings.remains_as_args {
        format!(r#"{}*) args+=("${{1}}");;"#, BRANCH_INDENT)
    } else {
        format!("{}*) ;;", BRANCH_INDENT)
    }
}

fn loop_closer() -> Vec<String> {
    vec![
        format!("{}esac", INDENT),
        format!("{}shift;", INDENT),
        "done".to_string(),
        String::new(),
    ]
}

/// Optional diagnostic echoes followed by the end marker.
fn footer(descriptors: &[OptionDescriptor], settings: &Settings) -> Vec<String> {
    if !settings.add_test {
        return vec![END_MARKER.to_string()];
    }

    descriptors
        .iter()
        .map(|descriptor| format!(r#"echo "{0}=${{{0}}}""#, descriptor.destination))
        .chain(
            settings
                .remains_as_args
                .then(|| r#"echo "args=${args[@]}""#.to_string()),
        )
        .chain([String::new(), END_MARKER.to_string()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Sentinels;

    fn render(descriptors: &[OptionDescriptor], settings: &Settings) -> Vec<String> {
        render_script(descriptors, settings).unwrap().lines().to_vec()
    }

    fn position(lines: &[String], needle: &str) -> usize {
        lines
            .iter()
            .position(|line| line == needle)
            .unwrap_or_else(|| panic!("{:?} not found in {:#?}", needle, lines))
    }

    fn verbose() -> OptionDescriptor {
        OptionDescriptor::flag(
            "v,verbose",
            "verbose",
            HasArgument::SelfName,
            "Enable verbose output",
        )
    }

    fn outfile() -> OptionDescriptor {
        OptionDescriptor::flag("o", "outfile", HasArgument::Value, "Output file")
    }

    #[test]
    fn test_self_branch_strips_dashes() {
        let lines = render(&[verbose()], &Settings::default());

        assert!(lines.contains(&"\t\t-v|--verbose) verbose=\"${1#--}\";;".to_string()));
        assert!(lines.contains(&"verbose=\"\"".to_string()));
    }

    #[test]
    fn test_value_branch_shifts() {
        let lines = render(&[outfile()], &Settings::default());

        assert!(lines.contains(&"\t\t-o) shift; outfile=\"${1}\";;".to_string()));
    }

    #[test]
    fn test_flag_branch_uses_on_sentinel() {
        let descriptor = OptionDescriptor::flag("f,force", "force", HasArgument::Flag, "Force");
        let lines = render(&[descriptor], &Settings::default());

        assert!(lines.contains(&"\t\t-f|--force) force=\"yes\";;".to_string()));
        assert!(!lines.iter().any(|l| l.contains("shift; force")));
    }

    #[test]
    fn test_custom_sentinels() {
        let settings = Settings {
            sentinels: Sentinels {
                on: "true".to_string(),
                off: "false".to_string(),
            },
            ..Settings::default()
        };
        let descriptor = OptionDescriptor::flag("q", "quiet", HasArgument::Flag, "");
        let lines = render(&[descriptor, outfile()], &settings);

        assert!(lines.contains(&"quiet=\"false\"".to_string()));
        assert!(lines.contains(&"outfile=\"false\"".to_string()));
        assert!(lines.contains(&"\t\t-q) quiet=\"true\";;".to_string()));
    }

    #[test]
    fn test_sentinels_are_escaped() {
        let settings = Settings {
            sentinels: Sentinels {
                on: "$HOME".to_string(),
                off: "say \"no\"".to_string(),
            },
            ..Settings::default()
        };
        let descriptor = OptionDescriptor::flag("q", "quiet", HasArgument::Flag, "");
        let lines = render(&[descriptor], &settings);

        assert!(lines.contains(&"quiet=\"say \\\"no\\\"\"".to_string()));
        assert!(lines.contains(&"\t\t-q) quiet=\"\\$HOME\";;".to_string()));
    }

    #[test]
    fn test_elements_branch() {
        let descriptor = OptionDescriptor::choice("start,stop", "mode", "Run mode");
        let lines = render(&[descriptor], &Settings::default());

        assert!(lines.contains(&"\t\tstart|stop) mode=\"${1}\";;".to_string()));
        assert!(lines.contains(&"mode=\"\"".to_string()));
    }

    #[test]
    fn test_patterns_are_lower_cased() {
        let flag = OptionDescriptor::flag("Force,X", "force", HasArgument::Flag, "");
        let choice = OptionDescriptor::choice("Start,STOP", "mode", "");
        let lines = render(&[flag, choice], &Settings::default());

        assert!(lines.contains(&"\t\t--force|-x) force=\"yes\";;".to_string()));
        assert!(lines.contains(&"\t\tstart|stop) mode=\"${1}\";;".to_string()));
    }

    #[test]
    fn test_assembly_order() {
        let lines = render(&[verbose(), outfile()], &Settings::default());

        assert_eq!(lines[0], "#!/usr/bin/env bash");
        assert_eq!(lines[1], "set -eu");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "function usage(){");
        assert_eq!(lines[4], "\tcat > /dev/stderr <<-EOF");

        let eof = position(&lines, "\tEOF");
        let init_verbose = position(&lines, "verbose=\"\"");
        let init_outfile = position(&lines, "outfile=\"\"");
        let loop_head = position(&lines, "while [ $# -ne 0 ]; do");
        let case_head = position(&lines, "\tcase \"${1,,}\" in");
        let stop = position(&lines, "\t\t--) shift; break;;");
        let help = position(&lines, "\t\t-h|-help|--help) usage; exit 1;;");
        let first = position(&lines, "\t\t-v|--verbose) verbose=\"${1#--}\";;");
        let second = position(&lines, "\t\t-o) shift; outfile=\"${1}\";;");
        let catch = position(&lines, "\t\t*) ;;");
        let esac = position(&lines, "\tesac");

        assert!(eof < init_verbose);
        assert!(init_verbose < init_outfile);
        assert!(init_outfile < loop_head);
        assert!(loop_head < case_head);
        assert!(case_head < stop);
        assert!(stop < help);
        assert!(help < first);
        assert!(first < second);
        assert!(second < catch);
        assert_eq!(catch + 1, esac);
        assert_eq!(lines[esac + 1], "\tshift;");
        assert_eq!(lines[esac + 2], "done");
        assert_eq!(lines[esac + 3], "");
        assert_eq!(lines.last().unwrap(), END_MARKER);
    }

    #[test]
    fn test_usage_function_wraps_help() {
        let lines = render(&[verbose()], &Settings::default());
        let start = position(&lines, "\tcat > /dev/stderr <<-EOF");
        let end = position(&lines, "\tEOF");
        let body = &lines[start + 1..end];

        assert!(body.iter().any(|l| l.starts_with("\tUsage: ${0}")));
        assert!(body.iter().any(|l| l.contains("Enable verbose output")));
        assert!(body.iter().all(|l| l.is_empty() || l.starts_with('\t')));
        assert!(body.iter().all(|l| l.trim_end() == l));
        assert_eq!(lines[end + 1], "}");
        assert_eq!(lines[end + 2], "");
    }

    #[test]
    fn test_remains_as_args_off() {
        let lines = render(&[verbose()], &Settings::default());

        assert!(lines.contains(&"\t\t*) ;;".to_string()));
        assert!(!lines.iter().any(|l| l.contains("declare -a args")));
    }

    #[test]
    fn test_remains_as_args_on() {
        let settings = Settings {
            remains_as_args: true,
            ..Settings::default()
        };
        let lines = render(&[verbose()], &settings);

        let declare = position(&lines, "declare -a args=()");
        let loop_head = position(&lines, "while [ $# -ne 0 ]; do");
        assert!(declare < loop_head);
        assert!(lines.contains(&"\t\t*) args+=(\"${1}\");;".to_string()));
        assert!(!lines.contains(&"\t\t*) ;;".to_string()));
    }

    #[test]
    fn test_debug_branch_before_user_branches() {
        let settings = Settings {
            add_debug: true,
            ..Settings::default()
        };
        let lines = render(&[verbose()], &settings);

        let debug = position(&lines, "\t\t--debug) set -x;;");
        let help = position(&lines, "\t\t-h|-help|--help) usage; exit 1;;");
        let user = position(&lines, "\t\t-v|--verbose) verbose=\"${1#--}\";;");
        assert!(help < debug);
        assert!(debug < user);
    }

    #[test]
    fn test_debug_branch_omitted_by_default() {
        let lines = render(&[verbose()], &Settings::default());
        assert!(!lines.iter().any(|l| l.contains("--debug")));
    }

    #[test]
    fn test_footer_without_test() {
        let lines = render(&[verbose()], &Settings::default());
        assert!(!lines.iter().any(|l| l.starts_with("echo ")));
        assert_eq!(lines[lines.len() - 2], "");
        assert_eq!(lines[lines.len() - 1], END_MARKER);
    }

    #[test]
    fn test_footer_with_test() {
        let settings = Settings {
            add_test: true,
            remains_as_args: true,
            ..Settings::default()
        };
        let lines = render(&[verbose(), outfile()], &settings);
        let n = lines.len();

        assert_eq!(lines[n - 5], "echo \"verbose=${verbose}\"");
        assert_eq!(lines[n - 4], "echo \"outfile=${outfile}\"");
        assert_eq!(lines[n - 3], "echo \"args=${args[@]}\"");
        assert_eq!(lines[n - 2], "");
        assert_eq!(lines[n - 1], END_MARKER);
    }

    #[test]
    fn test_to_text_ends_with_newline() {
        let script = render_script(&[verbose()], &Settings::default()).unwrap();
        let text = script.to_text();

        assert!(text.starts_with("#!/usr/bin/env bash\nset -eu\n\nfunction usage(){\n"));
        assert!(text.ends_with("done\n\n#END\n"));
        assert_eq!(script.to_string(), text);
    }

    #[test]
    fn test_empty_descriptor_list() {
        let lines = render(&[], &Settings::default());

        let loop_head = position(&lines, "while [ $# -ne 0 ]; do");
        assert_eq!(lines[loop_head - 1], "");
        assert!(lines.contains(&"\t\t*) ;;".to_string()));
    }

    #[test]
    fn test_help_text_is_escaped_in_heredoc() {
        let settings = Settings {
            usage: Some("[options] `cmd`".to_string()),
            ..Settings::default()
        };
        let descriptor = OptionDescriptor::flag(
            "p,prefix",
            "prefix",
            HasArgument::Value,
            "Install under $PREFIX or C:\\tools",
        );
        let lines = render(&[descriptor], &settings);

        assert!(lines.contains(&"\tUsage: ${0} [options] \\`cmd\\`".to_string()));
        assert!(lines
            .iter()
            .any(|l| l.contains("Install under \\$PREFIX or C:\\\\tools")));
    }

    #[test]
    fn test_escape_heredoc_line_keeps_program_name() {
        assert_eq!(escape_heredoc_line("${0} run"), "${0} run");
        assert_eq!(escape_heredoc_line("${0} $HOME ${0}"), "${0} \\$HOME ${0}");
        assert_eq!(escape_heredoc_line("${1}"), "\\${1}");
    }

    #[test]
    fn test_escape_shell_value() {
        assert_eq!(escape_shell_value("plain"), "plain");
        assert_eq!(
            escape_shell_value("$var \"quoted\" `cmd` \\path"),
            "\\$var \\\"quoted\\\" \\`cmd\\` \\\\path"
        );
    }
}
