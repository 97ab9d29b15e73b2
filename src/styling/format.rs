//! Gutter formatting for quoted content

/// Format quoted content (tool output, file lists) with a gutter in column 0.
///
/// The gutter is followed by one space, so content starts at column 2 and
/// lines up with the text of symbol-prefixed messages.
///
/// ```
/// use stacktrunk::styling::format_with_gutter;
///
/// let out = format_with_gutter("src/lib.rs\nsrc/main.rs");
/// assert_eq!(out.lines().count(), 2);
/// ```
pub fn format_with_gutter(content: &str) -> String {
    let gutter = super::GUTTER;
    content
        .lines()
        .map(|line| format!("{gutter} {gutter:#} {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
