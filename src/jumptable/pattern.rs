//! `{field}` substitution for rename and comment patterns.
//!
//! Recognised fields are `slot` (decimal by default) and `target`
//! (eight lowercase hex digits by default). A field may carry a format spec
//! after a colon: an optional `0` fill flag, a width of at most
//! [`MAX_WIDTH`], and a type of `x`, `X`, or `d`. `{{` and `}}` produce
//! literal braces.

use crate::error::ErrorCode;
use crate::types::Address;

/// Widest field a spec may request.
pub const MAX_WIDTH: usize = 64;

enum Radix {
    Dec,
    LowerHex,
    UpperHex,
}

/// Render `pattern` for a slot and its resolved target.
pub fn render(pattern: &str, slot: u32, target: Address) -> Result<String, ErrorCode> {
    let mut out = String::with_capacity(pattern.len() + 16);
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut field = String::new();
                let mut closed = false;
                for f in chars.by_ref() {
                    if f == '}' {
                        closed = true;
                        break;
                    }
                    field.push(f);
                }
                if !closed {
                    return Err(ErrorCode::FormatError(field));
                }
                out.push_str(&render_field(&field, slot, target)?);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(ErrorCode::FormatError(String::from("}"))),
            _ => out.push(c),
        }
    }

    Ok(out)
}

fn render_field(field: &str, slot: u32, target: Address) -> Result<String, ErrorCode> {
    let (name, spec) = match field.split_once(':') {
        Some((n, s)) => (n.trim(), Some(s)),
        None => (field.trim(), None),
    };

    let (value, default) = match name {
        "slot" => (u64::from(slot), (Radix::Dec, true, 0)),
        "target" => (target, (Radix::LowerHex, true, 8)),
        _ => return Err(ErrorCode::FormatError(name.to_string())),
    };

    let (radix, zero, width) = match spec {
        None => default,
        Some(s) => parse_spec(s).ok_or_else(|| ErrorCode::FormatError(field.to_string()))?,
    };

    let s = match (radix, zero) {
        (Radix::Dec, true) => format!("{:0width$}", value, width = width),
        (Radix::Dec, false) => format!("{:width$}", value, width = width),
        (Radix::LowerHex, true) => format!("{:0width$x}", value, width = width),
        (Radix::LowerHex, false) => format!("{:width$x}", value, width = width),
        (Radix::UpperHex, true) => format!("{:0width$X}", value, width = width),
        (Radix::UpperHex, false) => format!("{:width$X}", value, width = width),
    };
    Ok(s)
}

fn parse_spec(spec: &str) -> Option<(Radix, bool, usize)> {
    let (body, radix) = match spec.chars().last() {
        Some('x') => (&spec[..spec.len() - 1], Radix::LowerHex),
        Some('X') => (&spec[..spec.len() - 1], Radix::UpperHex),
        Some('d') => (&spec[..spec.len() - 1], Radix::Dec),
        _ => (spec, Radix::Dec),
    };
    let zero = body.starts_with('0');
    let width = if body.is_empty() {
        0
    } else if body.chars().all(|c| c.is_ascii_digit()) {
        body.parse().ok().filter(|&w| w <= MAX_WIDTH)?
    } else {
        return None;
    };
    Some((radix, zero, width))
}
