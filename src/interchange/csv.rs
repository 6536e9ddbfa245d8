// CSV codec: every field quoted on write, RFC 4180 style parsing on read
use super::{cell_text, RowSet};

const BOM: char = '\u{feff}';

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Header line plus one line per row, joined with `\n`
pub fn encode(rows: &RowSet) -> String {
    let mut lines = Vec::with_capacity(rows.rows.len() + 1);
    lines.push(
        rows.columns
            .iter()
            .map(|c| quote(c))
            .collect::<Vec<_>>()
            .join(","),
    );

    for row in &rows.rows {
        let fields: Vec<String> = (0..rows.columns.len())
            .map(|i| quote(&row.get(i).map(cell_text).unwrap_or_default()))
            .collect();
        lines.push(fields.join(","));
    }

    lines.join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

struct Parser {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    field: String,
    quoted: bool,
}

impl Parser {
    fn end_field(&mut self) {
        self.row.push(std::mem::take(&mut self.field));
    }

    fn end_row(&mut self) {
        self.end_field();
        let row = std::mem::take(&mut self.row);
        let quoted = std::mem::take(&mut self.quoted);
        // Blank lines carry no record; a lone `""` is an empty value
        if quoted || !(row.len() == 1 && row[0].is_empty()) {
            self.rows.push(row);
        }
    }
}

/// Split CSV text into rows of raw cells. Handles quoted commas and
/// newlines, doubled quotes, CRLF or LF endings and a leading BOM.
pub fn parse(content: &str) -> Vec<Vec<String>> {
    let text = content.strip_prefix(BOM).unwrap_or(content);
    let mut parser = Parser {
        rows: Vec::new(),
        row: Vec::new(),
        field: String::new(),
        quoted: false,
    };
    let mut state = State::FieldStart;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        state = match (state, c) {
            (State::FieldStart, '"') => {
                parser.quoted = true;
                State::Quoted
            }
            (State::Quoted, '"') => State::QuoteInQuoted,
            (State::Quoted, _) => {
                parser.field.push(c);
                State::Quoted
            }
            (State::QuoteInQuoted, '"') => {
                parser.field.push('"');
                State::Quoted
            }
            (_, ',') => {
                parser.end_field();
                State::FieldStart
            }
            (_, '\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                parser.end_row();
                State::FieldStart
            }
            (_, '\n') => {
                parser.end_row();
                State::FieldStart
            }
            // Text after a closing quote is kept as-is
            (_, _) => {
                parser.field.push(c);
                State::Unquoted
            }
        };
    }

    if state != State::FieldStart || !parser.row.is_empty() {
        parser.end_row();
    }

    parser.rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rowset(columns: &[&str], rows: Vec<Vec<Value>>) -> RowSet {
        RowSet {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    #[test]
    fn test_encode_quotes_everything() {
        let rows = rowset(
            &["title", "size", "note"],
            vec![vec![json!("Say \"hi\""), json!(42), Value::Null]],
        );
        assert_eq!(
            encode(&rows),
            "\"title\",\"size\",\"note\"\n\"Say \"\"hi\"\"\",\"42\",\"\""
        );
    }

    #[test]
    fn test_parse_simple() {
        let rows = parse("title,objective\n\"A\",\"B\"");
        assert_eq!(rows, vec![vec!["title", "objective"], vec!["A", "B"]]);
    }

    #[test]
    fn test_parse_quoted_specials() {
        let rows = parse("a,b\r\n\"x, y\",\"line1\nline2\"\r\n\"he said \"\"no\"\"\",\r\n");
        assert_eq!(
            rows,
            vec![
                vec!["a", "b"],
                vec!["x, y", "line1\nline2"],
                vec!["he said \"no\"", ""],
            ]
        );
    }

    #[test]
    fn test_parse_strips_bom_and_blank_lines() {
        let rows = parse("\u{feff}title\n\nLogin\n");
        assert_eq!(rows, vec![vec!["title"], vec!["Login"]]);
    }

    #[test]
    fn test_round_trip() {
        let original = rowset(
            &["title", "steps"],
            vec![
                vec![json!("Commas, \"quotes\""), json!("first\nsecond")],
                vec![json!("plain"), json!("")],
            ],
        );
        let parsed = parse(&encode(&original));
        assert_eq!(parsed[0], vec!["title", "steps"]);
        assert_eq!(parsed[1], vec!["Commas, \"quotes\"", "first\nsecond"]);
        assert_eq!(parsed[2], vec!["plain", ""]);

        let single_column = rowset(&["note"], vec![vec![json!("")], vec![json!("x")]]);
        let parsed = parse(&encode(&single_column));
        assert_eq!(parsed, vec![vec!["note"], vec![""], vec!["x"]]);

        // Truly blank lines are still skipped
        assert_eq!(parse("\"note\"\n\n\"x\"\n"), vec![vec!["note"], vec!["x"]]);
    }
}
