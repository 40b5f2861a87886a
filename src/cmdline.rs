//! Editing of kernel command lines attached to a bootflow.
//!
//! A command line is a space-separated list of arguments, each either bare (`ro`) or carrying a
//! value (`root=/dev/mmcblk0p2`). Values containing spaces are quoted (`mary="abc def"`).
//! Argument names match whole names only, so `root` never matches `rootwait`.

use alloc::{format, string::String};

use crate::Error;

/// New value for an argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgValue<'a> {
    /// The argument without any value, e.g. `initrd`.
    Bare,
    /// The argument with a value, which may be empty (`console=`).
    Set(&'a str),
}

/// One argument as it appears in the command line, quotes included.
struct Token<'a> {
    start: usize,
    raw: &'a str,
}

impl<'a> Token<'a> {
    fn name(&self) -> &'a str {
        self.raw.split_once('=').map_or(self.raw, |(name, _)| name)
    }

    /// Offset and raw text of the value, if the argument has one.
    fn value(&self) -> Option<(usize, &'a str)> {
        self.raw
            .find('=')
            .map(|i| (self.start + i + 1, &self.raw[i + 1..]))
    }
}

fn tokens(cmdline: &str) -> impl Iterator<Item = Token<'_>> {
    let bytes = cmdline.as_bytes();
    let mut pos = 0;

    core::iter::from_fn(move || {
        while pos < bytes.len() && bytes[pos] == b' ' {
            pos += 1;
        }
        if pos == bytes.len() {
            return None;
        }

        let start = pos;
        let mut quoted = false;
        while pos < bytes.len() && (quoted || bytes[pos] != b' ') {
            if bytes[pos] == b'"' {
                quoted = !quoted;
            }
            pos += 1;
        }

        Some(Token {
            start,
            raw: &cmdline[start..pos],
        })
    })
}

/// Find an argument, returning the offset of its value and the value itself.
///
/// Quotes around the value are not part of it; the offset then points just past the opening
/// quote. A bare argument has an empty value located right after its name.
pub fn get_arg<'a>(cmdline: &'a str, arg: &str) -> Result<(usize, &'a str), Error> {
    let token = tokens(cmdline)
        .find(|token| token.name() == arg)
        .ok_or(Error::NotFound)?;

    match token.value() {
        None => Ok((token.start + token.raw.len(), "")),
        Some((pos, value)) => match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            Some(inner) => Ok((pos + 1, inner)),
            None => Ok((pos, value)),
        },
    }
}

fn format_arg(arg: &str, val: ArgValue<'_>) -> Result<String, Error> {
    match val {
        ArgValue::Bare => Ok(arg.into()),
        ArgValue::Set(value) if value.contains('"') => Err(Error::BadValue),
        ArgValue::Set(value) if value.contains(' ') => Ok(format!("{arg}=\"{value}\"")),
        ArgValue::Set(value) => Ok(format!("{arg}={value}")),
    }
}

/// Produce a new command line from `from` with `arg` updated.
///
/// `None` deletes the argument, which must then exist. An argument that does not exist yet is
/// appended. Whitespace between arguments is normalised to single spaces.
pub fn set_arg(from: Option<&str>, arg: &str, val: Option<ArgValue<'_>>) -> Result<String, Error> {
    if arg.is_empty() || arg.contains([' ', '=', '"']) {
        return Err(Error::InvalidArgument);
    }
    let replacement = val.map(|val| format_arg(arg, val)).transpose()?;

    let mut out = String::new();
    let mut found = false;
    for token in tokens(from.unwrap_or_default()) {
        let piece = if !found && token.name() == arg {
            found = true;
            match replacement.as_deref() {
                Some(replacement) => replacement,
                None => continue,
            }
        } else {
            token.raw
        };

        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(piece);
    }

    if !found {
        let Some(replacement) = replacement else {
            return Err(Error::NotFound);
        };
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&replacement);
    }

    Ok(out)
}
