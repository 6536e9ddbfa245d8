// Markdown (GitHub pipe table) codec
use super::{cell_text, RowSet};

fn cell(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
        .replace('|', "")
        .trim()
        .to_string()
}

fn table_line(cells: impl Iterator<Item = String>) -> String {
    format!("| {} |", cells.collect::<Vec<_>>().join(" | "))
}

/// Header row, `---` separator row, then one row per record
pub fn encode(rows: &RowSet) -> String {
    let width = rows.columns.len();
    let mut lines = Vec::with_capacity(rows.rows.len() + 2);
    lines.push(table_line(rows.columns.iter().map(|c| cell(c))));
    lines.push(table_line((0..width).map(|_| "---".to_string())));

    for row in &rows.rows {
        lines.push(table_line(
            (0..width).map(|i| cell(&row.get(i).map(cell_text).unwrap_or_default())),
        ));
    }

    lines.join("\n")
}

/// Table rows (header first) from the lines that start with `|`.
/// The second such line is the separator and is dropped.
pub fn parse(content: &str) -> Vec<Vec<String>> {
    content
        .lines()
        .filter(|line| line.starts_with('|'))
        .map(str::trim_end)
        .enumerate()
        .filter(|(index, _)| *index != 1)
        .map(|(_, line)| {
            let segments: Vec<&str> = line.split('|').collect();
            let inner = if segments.len() >= 2 {
                &segments[1..segments.len() - 1]
            } else {
                &segments[..0]
            };
            inner.iter().map(|s| s.trim().to_string()).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_encode() {
        let rows = RowSet {
            columns: vec!["title".to_string(), "tags".to_string()],
            rows: vec![vec![json!("Login | SSO"), Value::Null]],
        };
        assert_eq!(
            encode(&rows),
            "| title | tags |\n| --- | --- |\n| Login  SSO |  |"
        );
    }

    #[test]
    fn test_parse_ignores_prose_and_separator() {
        let content = "# Cases\n\n| title | objective |\n|---|---|\n| Login | sign in |\nfooter";
        assert_eq!(
            parse(content),
            vec![vec!["title", "objective"], vec!["Login", "sign in"]]
        );
    }

    #[test]
    fn test_parse_skips_indented_pipes() {
        let content = "| title |\n| --- |\n  | indented |\n| Login |  ";
        assert_eq!(parse(content), vec![vec!["title"], vec!["Login"]]);
    }

    #[test]
    fn test_round_trip_trims_whitespace() {
        let rows = RowSet {
            columns: vec!["title".to_string(), "objective".to_string()],
            rows: vec![
                vec![json!("  padded  "), json!("two\nlines")],
                vec![json!(7), json!("")],
            ],
        };
        let parsed = parse(&encode(&rows));
        assert_eq!(
            parsed,
            vec![
                vec!["title", "objective"],
                vec!["padded", "two lines"],
                vec!["7", ""],
            ]
        );
    }
}
