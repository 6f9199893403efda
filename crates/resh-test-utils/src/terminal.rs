use anyhow::Result;
use resh_terminal::Emulator;
use similar::{ChangeTag, TextDiff};

/// Visible rows of the active screen, trailing blanks removed
pub fn screen_lines(terminal: &Emulator) -> Vec<String> {
    let fb = terminal.framebuffer();
    (0..fb.height())
        .map(|row| fb.row_text(row).trim_end().to_string())
        .collect()
}

pub struct TerminalComparator;

impl Default for TerminalComparator {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalComparator {
    pub fn new() -> Self {
        Self
    }

    /// Compare the text of two screens, reporting a line diff on mismatch
    pub fn compare_screens(&self, expected: &Emulator, actual: &Emulator) -> Result<()> {
        self.compare_output(&expected.screen_text(), &actual.screen_text())?;

        if expected.framebuffer().cursor_position() != actual.framebuffer().cursor_position() {
            anyhow::bail!(
                "Cursor mismatch: expected {:?}, got {:?}",
                expected.framebuffer().cursor_position(),
                actual.framebuffer().cursor_position()
            );
        }
        Ok(())
    }

    pub fn compare_output(&self, expected: &str, actual: &str) -> Result<()> {
        let expected_clean = self.normalize_output(expected);
        let actual_clean = self.normalize_output(actual);

        if expected_clean == actual_clean {
            return Ok(());
        }

        let diff = TextDiff::from_lines(&expected_clean, &actual_clean);
        let mut diff_output = String::new();

        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            diff_output.push_str(&format!("{sign}{change}"));
        }

        anyhow::bail!(
            "Terminal output mismatch:\n\nExpected:\n{}\n\nActual:\n{}\n\nDiff:\n{}",
            expected_clean,
            actual_clean,
            diff_output
        )
    }

    pub fn assert_contains(&self, haystack: &str, needle: &str) -> Result<()> {
        let haystack_clean = self.normalize_output(haystack);

        if !haystack_clean.contains(needle) {
            anyhow::bail!(
                "Output does not contain expected text:\nExpected to find:\n{}\n\nIn output:\n{}",
                needle,
                haystack_clean
            );
        }

        Ok(())
    }

    fn normalize_output(&self, output: &str) -> String {
        let mut lines: Vec<&str> = output.lines().map(str::trim_end).collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }
}
