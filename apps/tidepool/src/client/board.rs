//! Renders example-library query results as a balanced card board on the
//! terminal.

use crate::api::Example;
use crate::layout::{PendingLayout, column_count_for_width};

/// Terminal-width breakpoints for the board's column tiers, the terminal
/// rendition of the web UI's responsive grid.
const BOARD_BREAKPOINTS: [u32; 3] = [100, 160, 220];

/// Spacing between adjacent columns, in cells.
const COLUMN_GAP: usize = 2;

/// Lay the example cards out into balanced columns for a terminal `width`
/// cells wide. Recomputed from scratch per call, so a resize is just a
/// re-render.
pub fn render_board(examples: &[Example], width: u16) -> String {
    let columns = column_count_for_width(u32::from(width), &BOARD_BREAKPOINTS);
    let column_width = (usize::from(width) / columns.get()).saturating_sub(COLUMN_GAP);
    let inner = column_width.max(16);

    // Card heights are only known once each card has rendered; the board is
    // balanced after the whole batch has reported.
    let mut pending = PendingLayout::new(examples.len());
    let mut cards: Vec<Vec<String>> = Vec::with_capacity(examples.len());
    for (index, example) in examples.iter().enumerate() {
        let card = render_card(example, inner);
        pending.resolve(index, card.len() as u32);
        cards.push(card);
    }
    let assignment = pending
        .balance(columns)
        .expect("every card height resolved");

    let stacked: Vec<Vec<&str>> = assignment
        .iter()
        .map(|indices| {
            indices
                .iter()
                .flat_map(|&i| cards[i].iter().map(String::as_str))
                .collect()
        })
        .collect();
    let rows = stacked.iter().map(Vec::len).max().unwrap_or(0);

    let mut out = String::new();
    for row in 0..rows {
        for column in &stacked {
            let cell = column.get(row).copied().unwrap_or("");
            out.push_str(&format!("{cell:<width$}", width = inner + COLUMN_GAP));
        }
        while out.ends_with(' ') {
            out.pop();
        }
        out.push('\n');
    }
    out
}

fn render_card(example: &Example, inner: usize) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(truncate(&example.name, inner));

    let mut meta = example.language.clone();
    for tag in &example.tags {
        meta.push_str(&format!(" [{tag}]"));
    }
    lines.push(truncate(&meta, inner));

    for line in example.code.lines() {
        lines.push(truncate(line, inner));
    }
    lines.push(String::new());
    lines
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(name: &str, code: &str) -> Example {
        Example {
            path: String::new(),
            name: name.into(),
            language: "lua".into(),
            tags: vec!["demo".into()],
            code: code.into(),
        }
    }

    #[test]
    fn narrow_terminal_renders_one_column() {
        let examples = vec![example("first", "print(1)"), example("second", "print(2)")];
        let board = render_board(&examples, 80);
        let lines: Vec<&str> = board.lines().collect();
        // One column: cards stacked, original order preserved.
        assert_eq!(lines[0].trim_end(), "first");
        assert!(lines.iter().any(|line| line.trim_end() == "second"));
        assert!(!lines[0].contains("second"));
    }

    #[test]
    fn wide_terminal_places_cards_side_by_side() {
        let examples = vec![example("alpha", "print(1)"), example("beta", "print(2)")];
        let board = render_board(&examples, 120);
        let first_line = board.lines().next().unwrap();
        assert!(first_line.contains("alpha"));
        assert!(first_line.contains("beta"));
    }

    #[test]
    fn empty_query_result_renders_nothing() {
        assert_eq!(render_board(&[], 120), "");
    }

    #[test]
    fn rendering_twice_is_identical() {
        let examples = vec![
            example("one", "a\nb\nc"),
            example("two", "d"),
            example("three", "e\nf"),
        ];
        assert_eq!(render_board(&examples, 120), render_board(&examples, 120));
    }

    #[test]
    fn long_lines_are_truncated_to_the_column() {
        let long = "x".repeat(400);
        let examples = vec![example("long", &long)];
        let board = render_board(&examples, 80);
        assert!(board.lines().all(|line| line.chars().count() <= 80));
    }
}
