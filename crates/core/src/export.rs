//! File names for exported results.

/// File name used when exporting a single interactive result.
pub const SINGLE_RESULT_FILE_NAME: &str = "humanized_text.txt";

/// Prefix applied to every exported batch result.
const EXPORT_PREFIX: &str = "humanized_";

/// Deterministic export name for a batch item's output.
///
/// The source name is kept (so `report.pdf` and `report.docx` never collide)
/// and `.txt` is appended unless the name already ends in it, since the
/// exported content is always plain text. Path separators are replaced so the
/// result is always a bare file name.
pub fn export_file_name(source_name: &str) -> String {
    let base: String = source_name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    if base.to_ascii_lowercase().ends_with(".txt") {
        format!("{EXPORT_PREFIX}{base}")
    } else {
        format!("{EXPORT_PREFIX}{base}.txt")
    }
}
