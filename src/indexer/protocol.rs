// Line-oriented extraction stream
//
// progress(<0-100>)
// symbol(name='<str>', type='<kind>', filename='<str>', line=<int>)
//
// Strings escape `\` and `'` with a backslash. Lines are parsed field by
// field and never evaluated.

use std::fmt;
use std::io::BufRead;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::error::Diagnostic;
use crate::index::{Symbol, SymbolKind};

static PROGRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^progress\((\d{1,3})\)$").expect("valid progress pattern"));

static SYMBOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^symbol\(name='((?:[^'\\]|\\.)*)', type='([a-z-]+)', filename='((?:[^'\\]|\\.)*)', line=(\d+)\)$",
    )
    .expect("valid symbol pattern")
});

/// One record of the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Progress(u8),
    Symbol(Symbol),
}

impl Record {
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(caps) = PROGRESS_RE.captures(line) {
            let percent: u8 = caps[1]
                .parse()
                .map_err(|_| format!("progress out of range: {}", &caps[1]))?;
            if percent > 100 {
                return Err(format!("progress out of range: {}", percent));
            }
            return Ok(Record::Progress(percent));
        }

        if let Some(caps) = SYMBOL_RE.captures(line) {
            let kind = SymbolKind::parse(&caps[2]).ok_or_else(|| format!("unknown symbol type '{}'", &caps[2]))?;
            let line_number: usize = caps[4]
                .parse()
                .map_err(|_| format!("invalid line number: {}", &caps[4]))?;
            return Ok(Record::Symbol(Symbol::new(
                unescape(&caps[1]),
                kind,
                unescape(&caps[3]),
                line_number,
            )));
        }

        Err("unrecognized record".to_string())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Progress(percent) => write!(f, "progress({})", percent),
            Record::Symbol(symbol) => write!(
                f,
                "symbol(name='{}', type='{}', filename='{}', line={})",
                escape(&symbol.name),
                symbol.kind,
                escape(&symbol.path),
                symbol.line
            ),
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Everything read from one stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutput {
    pub symbols: Vec<Symbol>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Read a whole stream. Unparseable lines become `ProtocolError` diagnostics
/// and reading continues.
pub fn read_stream<R: BufRead>(reader: R, mut on_progress: impl FnMut(u8)) -> StreamOutput {
    let mut output = StreamOutput::default();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                output
                    .diagnostics
                    .push(Diagnostic::protocol_error(format!("line {}: {}", line_number, e)));
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match Record::parse(&line) {
            Ok(Record::Progress(percent)) => on_progress(percent),
            Ok(Record::Symbol(symbol)) => output.symbols.push(symbol),
            Err(message) => {
                warn!("Skipping malformed record on line {}: {}", line_number, message);
                output
                    .diagnostics
                    .push(Diagnostic::protocol_error(format!("line {}: {}", line_number, message)));
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;
    use std::io::Cursor;

    #[test]
    fn test_parse_records() {
        assert_eq!(Record::parse("progress(42)").unwrap(), Record::Progress(42));
        assert_eq!(
            Record::parse("symbol(name='foo', type='function', filename='/src/a.py', line=3)\n").unwrap(),
            Record::Symbol(Symbol::new("foo", SymbolKind::Function, "/src/a.py", 3))
        );
    }

    #[test]
    fn test_rejects_malformed_records() {
        assert!(Record::parse("progress(101)").is_err());
        assert!(Record::parse("progress(-1)").is_err());
        assert!(Record::parse("symbol(name='x', type='global-attr', filename='a.py', line=1)").is_err());
        assert!(Record::parse("symbol(name='x', type='function', filename='a.py')").is_err());
        assert!(Record::parse("__import__('os').system('rm -rf /')").is_err());
    }

    #[test]
    fn test_escaped_strings_survive_rendering() {
        let symbol = Symbol::new("x", SymbolKind::ClassAttribute, r"C:\it's\a.py", 12);
        let line = Record::Symbol(symbol.clone()).to_string();

        assert_eq!(line, r"symbol(name='x', type='class-attribute', filename='C:\\it\'s\\a.py', line=12)");
        assert_eq!(Record::parse(&line).unwrap(), Record::Symbol(symbol));
    }

    #[test]
    fn test_read_stream_continues_past_bad_lines() {
        let stream = "progress(50)\n\
                      symbol(name='a', type='function', filename='a.py', line=1)\n\
                      garbage\n\
                      \n\
                      progress(100)\n\
                      symbol(name='B', type='class', filename='b.py', line=2)\n";

        let mut progress = Vec::new();
        let output = read_stream(Cursor::new(stream), |p| progress.push(p));

        assert_eq!(progress, vec![50, 100]);
        assert_eq!(output.symbols.len(), 2);
        assert_eq!(output.symbols[1].kind, SymbolKind::Class);
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(output.diagnostics[0].kind, DiagnosticKind::ProtocolError);
        assert!(output.diagnostics[0].message.starts_with("line 3:"));
    }
}
