//! strace-like tracing of host calls
//!
//! When `Options::enable_strace` is set, every host call is logged as one
//! line, `name(arg, ...) = status`, at info level.
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

use crate::error::BridgeResult;
use log::info;
use std::fmt::Write;
use wasmtime::Val;

/// How many characters to display from a string or memory buffer.
pub(crate) const BUFFER_DISPLAY_LEN: usize = 32;

/// State of strace structure.
enum TraceState {
    /// Initial state: we have only seen the function name.
    Func,
    /// We have seen one or more arguments.
    Args,
    /// We have seen the result of the function call.
    Done,
}

pub(crate) struct Strace {
    enabled: bool,
    state: TraceState,
    line: String,
}

/// Convert a vector of bytes into a printable ASCII string.
/// The string may contain readable text, which is useful to display,
/// but it may also contain binary data, so we cannot decode it as UTF-8.
pub(crate) fn strace_string(bytes: &[u8], max: usize) -> String {
    let mut res = String::from("\"");
    let n = bytes.len().min(max);
    for (i, byte) in bytes[..n].iter().copied().enumerate() {
        if (0x20..0x7f).contains(&byte) {
            if byte == b'\\' || byte == b'"' {
                res.push('\\');
            }
            res.push(byte as char);
        } else if byte == b'\t' {
            res.push_str("\\t")
        } else if byte == b'\n' {
            res.push_str("\\n")
        } else if i + 1 < n && bytes[i + 1].is_ascii_digit() {
            // The following character is a digit, so use three octal digits.
            let _ = write!(res, "\\{:03o}", byte);
        } else {
            let _ = write!(res, "\\{:o}", byte);
        }
    }
    res.push('"');
    if bytes.len() > max {
        res.push_str("...")
    }
    res
}

fn display_value(value: &Val) -> String {
    match value {
        Val::I32(n) => n.to_string(),
        Val::I64(n) => format!("0x{:x}", n),
        Val::F64(bits) => f64::from_bits(*bits).to_string(),
        other => format!("{:?}", other),
    }
}

impl Strace {
    /// Start generating strace output, given function name.
    pub(crate) fn func(enabled: bool, name: &str) -> Self {
        Strace {
            enabled,
            state: TraceState::Func,
            line: if enabled { format!("{}(", name) } else { String::new() },
        }
    }

    /// Common code for handling arguments: prints comma as required.
    /// Returns `true` if the argument should be skipped.
    fn arg(&mut self) -> bool {
        if !self.enabled {
            return true;
        }
        match self.state {
            TraceState::Func => self.state = TraceState::Args,
            TraceState::Args => self.line.push_str(", "),
            TraceState::Done => self.line.push_str(" unexpected strace arg: "),
        }
        false
    }

    pub(crate) fn arg_val(&mut self, value: &Val) {
        if self.arg() {
            return;
        }
        let shown = display_value(value);
        self.line.push_str(&shown);
    }

    /// Finishes the line with the outcome and the result slots.
    pub(crate) fn result(&mut self, outcome: &BridgeResult<()>, results: &[Val]) {
        if !self.enabled {
            return;
        }
        self.state = TraceState::Done;
        let _ = match outcome {
            Ok(()) => write!(self.line, ") ="),
            Err(e) => write!(self.line, ") = {:?} {}", e.errno(), e),
        };
        for value in results {
            let _ = write!(self.line, " {}", display_value(value));
        }
        info!("{}", self.line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_bytes_pass_through() {
        assert_eq!(strace_string(b"hi \"you\"", 32), r#""hi \"you\"""#);
    }

    #[test]
    fn control_bytes_are_escaped() {
        assert_eq!(strace_string(b"a\tb\n", 32), r#""a\tb\n""#);
        assert_eq!(strace_string(&[1, b'7'], 32), r#""\0017""#);
        assert_eq!(strace_string(&[1, b'x'], 32), r#""\1x""#);
    }

    #[test]
    fn long_buffers_are_truncated() {
        assert_eq!(strace_string(b"abcdef", 3), r#""abc"..."#);
    }
}
