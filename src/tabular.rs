//! Single-line CSV records
//!
//! Task logs and reference tables are plain comma separated text. Fields
//! holding a comma or a quote are wrapped in double quotes, with inner quotes
//! doubled. Records never span lines.

use std::borrow::Cow;

/// Split one record into its fields, unquoting as needed.
///
/// Always yields at least one field. Whitespace around unquoted fields is
/// trimmed.
pub fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.trim().is_empty() && !quoted => {
                field.clear();
                quoted = true;
                in_quotes = true;
            }
            ',' if !in_quotes => {
                fields.push(finish(&mut field, quoted));
                quoted = false;
            }
            _ if quoted && !in_quotes => {
                // text after a closing quote is dropped, only whitespace is expected
            }
            _ => field.push(c),
        }
    }
    fields.push(finish(&mut field, quoted));
    fields
}

fn finish(field: &mut String, quoted: bool) -> String {
    let value = std::mem::take(field);
    if quoted {
        value
    } else {
        value.trim().to_string()
    }
}

/// Quote `field` if it would otherwise not survive [`split_record`].
pub fn quote_field(field: &str) -> Cow<'_, str> {
    let needs_quotes = field.contains([',', '"'])
        || field.starts_with(char::is_whitespace)
        || field.ends_with(char::is_whitespace);
    if needs_quotes {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Join fields into one record, quoting where needed.
pub fn join_record<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    fields.into_iter().map(quote_field).collect::<Vec<_>>().join(",")
}
