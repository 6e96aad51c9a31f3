/// A command line split into arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLine {
    pub argv: Vec<String>,
    /// The line ended in an `&` argument, which has been dropped from `argv`.
    pub background: bool,
}

impl ParsedLine {
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    pub fn command(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

/// Splits `line` on spaces.
///
/// An argument beginning with `'` runs to the next `'`, spaces included, and
/// both quotes are dropped. Anything after a quote that is never closed is
/// discarded. A final argument that starts with `&` is removed and marks the
/// line as a background job.
pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let mut argv = Vec::new();
    let mut rest = line.trim_start_matches(' ');

    while !rest.is_empty() {
        if let Some(quoted) = rest.strip_prefix('\'') {
            match quoted.find('\'') {
                Some(end) => {
                    argv.push(quoted[..end].to_string());
                    rest = &quoted[end + 1..];
                }
                None => break,
            }
        } else {
            let end = rest.find(' ').unwrap_or(rest.len());
            argv.push(rest[..end].to_string());
            rest = &rest[end..];
        }
        rest = rest.trim_start_matches(' ');
    }

    let background = argv.last().is_some_and(|arg| arg.starts_with('&'));
    if background {
        argv.pop();
    }
    ParsedLine { argv, background }
}
