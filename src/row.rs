//! Row codec for one separator delimited line.
//!
//! A double quote toggles a "protected" state in which the separator does not split fields.
//! Quotes are not removed from field values and nothing is escaped, so [parse_row] followed by
//! [serialize_row] reproduces the line, minus the line ending. Values are never re-quoted when
//! serialized, which means a value containing the separator only survives a round trip when it
//! was quoted on input. Unbalanced quotes protect the rest of the line.

/// Strip the line ending, `\n` or `\r\n`.
pub fn strip_endl(line: &str) -> &str {
    line.trim_end_matches(|c| c == '\n' || c == '\r')
}

/// Split a line into borrowed fields.
///
/// # Examples
/// ```
/// use csv_sort_merge::row::split_row;
/// let fields = split_row("1,\"Smith, John\",42\n", ',');
/// assert_eq!(fields, vec!["1", "\"Smith, John\"", "42"]);
/// ```
pub fn split_row(line: &str, separator: char) -> Vec<&str> {
    let line = strip_endl(line);
    let mut fields = Vec::new();
    let mut protected = false;
    let mut start = 0;
    for (i, c) in line.char_indices() {
        if c == separator && !protected {
            fields.push(&line[start..i]);
            start = i + c.len_utf8();
        } else if c == '"' {
            protected = !protected;
        }
    }
    fields.push(&line[start..]);
    fields
}

/// Parse a line into owned fields. See [split_row].
pub fn parse_row(line: &str, separator: char) -> Vec<String> {
    split_row(line, separator)
        .into_iter()
        .map(|field| field.to_string())
        .collect()
}

/// Join fields with the separator, verbatim and without a line ending.
pub fn serialize_row<S: AsRef<str>>(fields: &[S], separator: char) -> String {
    let mut line = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(separator);
        }
        line.push_str(field.as_ref());
    }
    line
}
