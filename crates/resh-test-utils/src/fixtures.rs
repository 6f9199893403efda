// Common test data
pub mod data {
    pub const HELLO_WORLD: &str = "Hello, World!\r\n";

    pub const UNICODE_TEST: &str = "🦀 Rust 日本語 e\u{301}\r\n";

    pub const ANSI_COLORS: &str =
        "\x1b[31mRed\x1b[0m \x1b[32mGreen\x1b[0m \x1b[1;34mBlue\x1b[0m\r\n";

    /// Redraws that a full-screen program typically emits
    pub const FULL_SCREEN_APP: &str =
        "\x1b[?1049h\x1b[H\x1b[2J\x1b[7m top \x1b[0m\x1b[5;10Hbody\x1b[?25l";

    /// Bytes that are not a valid framed message
    pub const MISLEAD: &[u8] = b"mislead\n\x04:\x02@\x03\n2\x120\".";

    pub fn generate_text_lines(count: usize) -> String {
        (0..count)
            .map(|i| format!("Line {i}: The quick brown fox jumps over the lazy dog"))
            .collect::<Vec<_>>()
            .join("\r\n")
    }
}
