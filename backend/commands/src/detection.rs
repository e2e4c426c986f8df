/// Text command detection: identify prefixed commands in inbound messages
/// and resolve their positional options.
use switchboard_core::{CommandArgs, OptionValue, TextSpec};

/// A prefixed message split into command token and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedText {
    /// Command token, lowercased.
    pub name: String,
    /// Everything after the command token, trimmed.
    pub raw_args: String,
    /// Non-empty tokens after the command token.
    pub args: Vec<String>,
}

/// Split `content` into command and arguments.
///
/// Returns `None` if the message does not start with `prefix` or has no
/// command token after it.
pub fn parse_text(content: &str, prefix: &str, separator: &str) -> Option<ParsedText> {
    let body = content.trim_start().strip_prefix(prefix)?;
    if separator.is_empty() {
        return None;
    }

    let mut tokens = body.split(separator).filter(|t| !t.trim().is_empty());
    let first = tokens.next()?;
    // A separator directly after the prefix means this is not a command.
    if !body.starts_with(first) {
        return None;
    }
    let name = first.trim().to_lowercase();
    let args: Vec<String> = tokens.map(|t| t.trim().to_string()).collect();
    let raw_args = body[first.len()..].trim_start_matches(separator).trim().to_string();

    Some(ParsedText { name, raw_args, args })
}

/// Pair declared options with positional arguments, in declaration order.
///
/// A missing optional option does not consume an argument; validators are
/// only run on supplied values.
pub fn resolve_options(spec: &TextSpec, args: &[String]) -> Vec<OptionValue> {
    let mut supplied = args.iter();
    spec.options
        .iter()
        .map(|option| match supplied.next() {
            Some(value) => OptionValue {
                name: option.name.clone(),
                value: Some(value.clone()),
                required: option.required,
                missing: false,
                invalid: !option.accepts(value),
            },
            None => OptionValue {
                name: option.name.clone(),
                value: None,
                required: option.required,
                missing: option.required,
                invalid: false,
            },
        })
        .collect()
}

/// Build the [`CommandArgs`] of a text invocation.
pub fn command_args(parsed: ParsedText, spec: Option<&TextSpec>) -> CommandArgs {
    let options = spec.map(|s| resolve_options(s, &parsed.args)).unwrap_or_default();
    CommandArgs { raw: parsed.raw_args, positional: parsed.args, options }
}
