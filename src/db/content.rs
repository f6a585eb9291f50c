//! `.lr` content file tokenizer.
//!
//! ```text
//! title: Hello
//! ---
//! body:
//!
//! First paragraph.
//! ----
//! (a literal `---` line)
//! ---
//! _hidden: yes
//! ```
//!
//! Blocks are separated by lines consisting of exactly `---`. A block starts
//! with `key: value`; following lines extend the value. When the first line
//! is `key:` alone, one blank line after it is skipped. Lines of four or more
//! dashes inside a value lose one dash.

/// Parse `text` into `(key, value)` pairs in file order.
pub fn tokenize(text: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut key: Option<String> = None;
    let mut buf: Vec<&str> = Vec::new();
    let mut want_blank = false;

    for raw in text.lines() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if line.trim_end() == "---" {
            if let Some(key) = key.take() {
                out.push((key, join_value(&buf)));
            }
            buf.clear();
            want_blank = false;
            continue;
        }

        if key.is_some() {
            if want_blank {
                want_blank = false;
                if line.trim().is_empty() {
                    continue;
                }
            }
            buf.push(line);
            continue;
        }

        let Some((k, v)) = line.split_once(':') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        key = Some(k.to_string());
        let first = v.trim();
        if first.is_empty() {
            want_blank = true;
        } else {
            buf.push(first);
        }
    }

    if let Some(key) = key {
        out.push((key, join_value(&buf)));
    }
    out
}

fn join_value(lines: &[&str]) -> String {
    let mut value = String::new();
    for (idx, line) in lines.iter().enumerate() {
        if idx > 0 {
            value.push('\n');
        }
        if is_escaped_dashes(line) {
            value.push_str(&line.trim()[1..]);
        } else {
            value.push_str(line);
        }
    }
    value.truncate(value.trim_end().len());
    value
}

fn is_escaped_dashes(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 4 && trimmed.bytes().all(|b| b == b'-')
}

/// Serialize pairs back into the file format.
pub fn serialize<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (idx, (key, value)) in pairs.into_iter().enumerate() {
        if idx > 0 {
            out.push_str("---\n");
        }
        if value.contains('\n') {
            out.push_str(key);
            out.push_str(":\n\n");
            for line in value.lines() {
                if line.trim().len() >= 3 && line.trim().bytes().all(|b| b == b'-') {
                    out.push('-');
                }
                out.push_str(line);
                out.push('\n');
            }
        } else {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
    }
    out
}
