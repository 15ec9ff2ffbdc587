//! Upload file-name handling.

use std::path::Path;

use docqa_rag::DocumentFormat;

/// Reduce a client-supplied file name to a safe name for the upload directory.
///
/// Only the last path component is kept. Runs of whitespace become `_`,
/// anything outside ASCII alphanumerics and `._-` is dropped, repeated dots
/// collapse to one, and leading or trailing dots and underscores are trimmed.
/// The result never contains a path separator or `..` and may be empty.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let joined = base.split_whitespace().collect::<Vec<_>>().join("_");

    let mut cleaned = String::with_capacity(joined.len());
    for c in joined.chars() {
        let keep = c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
        if keep && !(c == '.' && cleaned.ends_with('.')) {
            cleaned.push(c);
        }
    }

    cleaned.trim_matches(['.', '_']).to_string()
}

/// Whether `name` has an extension the extractor accepts.
pub fn allowed_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(DocumentFormat::from_extension)
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_ordinary_names() {
        assert_eq!(secure_filename("report-2024_final.pdf"), "report-2024_final.pdf");
    }

    #[test]
    fn strips_directories() {
        assert_eq!(secure_filename("../../etc/passwd.txt"), "passwd.txt");
        assert_eq!(secure_filename("C:\\Users\\me\\notes.docx"), "notes.docx");
        assert_eq!(secure_filename("/abs/path/"), "");
    }

    #[test]
    fn whitespace_and_symbols() {
        assert_eq!(secure_filename("my  annual report.pdf"), "my_annual_report.pdf");
        assert_eq!(secure_filename("q&a (v2).txt"), "qa_v2.txt");
        assert_eq!(secure_filename("résumé.docx"), "rsum.docx");
    }

    #[test]
    fn no_hidden_files_or_dot_runs() {
        assert_eq!(secure_filename(".env.txt"), "env.txt");
        assert_eq!(secure_filename("a...b.txt"), "a.b.txt");
        assert_eq!(secure_filename(".."), "");
        for name in ["..", "....//..txt", "a/../b.txt", "x\\..\\y.pdf"] {
            let safe = secure_filename(name);
            assert!(!safe.contains(".."), "{name:?} -> {safe:?}");
            assert!(!safe.contains('/') && !safe.contains('\\'));
        }
    }

    #[test]
    fn allowed_extensions_are_case_insensitive() {
        assert!(allowed_file("a.pdf"));
        assert!(allowed_file("a.DOCX"));
        assert!(allowed_file("notes.Txt"));
        assert!(!allowed_file("table.csv"));
        assert!(!allowed_file("pdf"));
        assert!(!allowed_file(""));
    }
}
