//! Displaying the source around a stopped position.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::errors::Result;

/// How many lines of context to show around the target line.
const LINE_RANGE: u64 = 5;

/// Renders `line` and its surrounding context, the target line marked with
/// `>`.
pub fn render_window(reader: impl BufRead, line: u64) -> Vec<String> {
    let start_line = line.saturating_sub(LINE_RANGE).max(1);
    let end_line = line + LINE_RANGE;

    let mut out = Vec::new();
    for (idx, text) in reader.lines().enumerate() {
        let current = idx as u64 + 1;
        if current < start_line {
            continue;
        }
        if current > end_line {
            break;
        }
        let Ok(text) = text else { break };
        if current == line {
            out.push(format!("> {text}"));
        } else {
            out.push(format!("  {text}"));
        }
    }
    out
}

/// Prints the source window around `path:line` to stdout.
///
/// # Errors
///
/// Fails if the source file cannot be opened; callers treat that as
/// non-fatal (the binary may have been compiled elsewhere).
pub fn show(path: &Path, line: u64) -> Result<()> {
    let file = File::open(path)?;
    for text in render_window(BufReader::new(file), line) {
        println!("{text}");
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    const SOURCE: &str = r#"#include <stdio.h>

int helper(int x);

int main(void) {
    int foo = 1;
    int bar = helper(foo);
    printf("%d\n", bar);
    return 0;
}

int helper(int x) {
    return x + 1;
}
"#;

    #[test]
    fn test_window_marks_target_line() {
        let lines = render_window(SOURCE.as_bytes(), 7);
        // lines 2..=12
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[1], "  int helper(int x);");
        assert_eq!(lines[5], ">     int bar = helper(foo);");
        assert_eq!(lines.iter().filter(|l| l.starts_with("> ")).count(), 1);
    }

    #[test]
    fn test_window_near_top_of_file() {
        let lines = render_window(SOURCE.as_bytes(), 2);
        // lines 1..=7
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "  #include <stdio.h>");
        assert_eq!(lines[1], "> ");
    }

    #[test]
    fn test_window_near_end_of_file() {
        let lines = render_window(SOURCE.as_bytes(), 13);
        // lines 8..=14
        assert_eq!(lines.len(), 7);
        assert_eq!(lines.last().unwrap(), "  }");
        assert!(lines.iter().any(|l| l == ">     return x + 1;"));
    }
}
