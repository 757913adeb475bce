// crates/core/src/naming.rs
//! Output identifiers and request-level input validation.

/// Prefix every produced document carries.
pub const OUTPUT_PREFIX: &str = "ocr_";

/// Language used when the client does not send one.
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Strip any directory components from a client-supplied filename.
///
/// Both `/` and `\` are treated as separators since browsers on Windows
/// may send the full local path. Returns `None` when nothing usable is left.
pub fn sanitize_filename(raw: &str) -> Option<&str> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
        return None;
    }
    Some(base)
}

/// Output identifier for an uploaded filename: `ocr_<basename>`.
pub fn output_target(raw: &str) -> Option<String> {
    sanitize_filename(raw).map(|base| format!("{OUTPUT_PREFIX}{base}"))
}

/// Whether `name` can be looked up in the output directory as-is.
pub fn is_safe_output_name(name: &str) -> bool {
    sanitize_filename(name) == Some(name)
}

/// Whether `lang` is an acceptable engine language hint (`eng`, `eng+deu`, `chi_sim`).
///
/// The hint is passed to the engine as a separate argument; rejecting a
/// leading `-` keeps it from being read as a flag.
pub fn is_valid_language(lang: &str) -> bool {
    !lang.is_empty()
        && lang.len() <= 64
        && !lang.starts_with(['+', '-'])
        && lang
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '+')
}
