// packages/intercept/src/protocol/literal.rs
//! Literal encoding for values sent to the remote side
//!
//! Proxies are written as their bare remote name so the remote side can
//! resolve them to the live objects it already holds.

use crate::object::{Args, Value};

/// Encode a single value
pub fn encode_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Encode positional arguments as a tuple literal
pub fn encode_args(args: &[Value]) -> String {
    let mut out = String::new();
    write_tuple(&mut out, args);
    out
}

/// Encode keyword arguments as a mapping literal
pub fn encode_kwargs(kwargs: &[(String, Value)]) -> String {
    let mut out = String::from("{");
    for (i, (key, value)) in kwargs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_str(&mut out, key);
        out.push_str(": ");
        write_value(&mut out, value);
    }
    out.push('}');
    out
}

/// Encode a full argument set as `(args, kwargs)` literals
pub fn encode_call_args(args: &Args) -> (String, String) {
    (encode_args(&args.positional), encode_kwargs(&args.keywords))
}

/// Quote a string, preferring single quotes
pub fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    write_str(&mut out, s);
    out
}

/// Escape occurrences of `separator` inside the string literals of `literal`.
///
/// The first character of each occurrence is written as a hex escape, so the
/// string keeps its value while the framed message no longer contains the
/// separator inside a field.
pub fn guard_separator(literal: &str, separator: &str) -> String {
    if separator.is_empty() || !literal.contains(separator) {
        return literal.to_string();
    }

    let mut out = String::with_capacity(literal.len() + 8);
    let mut quote: Option<char> = None;
    let mut chars = literal.char_indices();
    while let Some((i, c)) = chars.next() {
        match quote {
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                out.push(c);
            }
            Some(_) if c == '\\' => {
                out.push(c);
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            }
            Some(q) if c == q => {
                quote = None;
                out.push(c);
            }
            Some(_) if literal[i..].starts_with(separator) => write_char_escape(&mut out, c),
            Some(_) => out.push(c),
        }
    }
    out
}

fn write_char_escape(out: &mut String, c: char) {
    let code = c as u32;
    if code <= 0xff {
        out.push_str(&format!("\\x{:02x}", code));
    } else if code <= 0xffff {
        out.push_str(&format!("\\u{:04x}", code));
    } else {
        out.push_str(&format!("\\U{:08x}", code));
    }
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::None => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(f) => out.push_str(&format_float(*f)),
        Value::Str(s) => write_str(out, s),
        Value::List(items) => {
            out.push('[');
            write_items(out, items);
            out.push(']');
        }
        Value::Tuple(items) => write_tuple(out, items),
        Value::Dict(pairs) => {
            out.push('{');
            for (i, (key, val)) in pairs.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, key);
                out.push_str(": ");
                write_value(out, val);
            }
            out.push('}');
        }
        Value::Object(obj) => match obj.remote_name() {
            Some(name) => out.push_str(&name),
            None => {
                out.push('<');
                out.push_str(obj.type_name());
                out.push_str(" object>");
            }
        },
    }
}

fn write_items(out: &mut String, items: &[Value]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_value(out, item);
    }
}

fn write_tuple(out: &mut String, items: &[Value]) {
    out.push('(');
    write_items(out, items);
    if items.len() == 1 {
        out.push(',');
    }
    out.push(')');
}

fn write_str(out: &mut String, s: &str) {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if f.abs() >= 1e16 {
        format!("{:e}", f)
    } else if f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}
