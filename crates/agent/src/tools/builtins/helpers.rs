//! Shared helper utilities for builtin tools.
use std::path::Path;

/// Maximum lines to return before truncation (mirrors the mention-expansion
/// truncation hint in `spec.md` §4.5 Phase 0).
pub const MAX_LINES: usize = 2000;

/// Maximum bytes to return before truncation (50 KB).
pub const MAX_BYTES: usize = 51200;

/// Direction for truncation.
#[derive(Debug, Clone, Copy)]
pub enum TruncationDirection {
    Head,
    Tail,
}

/// Result of output truncation.
pub struct TruncationResult {
    pub content: String,
    pub was_truncated: bool,
    pub original_line_count: usize,
    pub original_byte_count: usize,
}

/// Truncate output based on line count and byte size.
pub fn truncate_output(
    content: &str,
    max_lines: usize,
    max_bytes: usize,
    direction: TruncationDirection,
) -> TruncationResult {
    let lines: Vec<&str> = content.lines().collect();
    let original_line_count = lines.len();
    let original_byte_count = content.len();

    let mut was_truncated = false;
    let mut result_lines = lines.clone();

    if lines.len() > max_lines {
        result_lines = match direction {
            TruncationDirection::Head => lines.iter().take(max_lines).copied().collect(),
            TruncationDirection::Tail => lines.iter().skip(lines.len() - max_lines).copied().collect(),
        };
        was_truncated = true;
    }

    let mut result = result_lines.join("\n");
    if result.len() > max_bytes {
        result = match direction {
            TruncationDirection::Head => result.chars().take(max_bytes).collect::<String>(),
            TruncationDirection::Tail => result.chars().skip(result.len() - max_bytes).collect(),
        };
        was_truncated = true;
    }

    TruncationResult {
        content: result,
        was_truncated,
        original_line_count,
        original_byte_count,
    }
}

/// Format a truncation message for the model, or `""` if nothing was cut.
pub fn format_truncation_message(result: &TruncationResult, direction: TruncationDirection) -> String {
    if !result.was_truncated {
        return String::new();
    }

    let dir_str = match direction {
        TruncationDirection::Head => "first",
        TruncationDirection::Tail => "last",
    };

    format!(
        "\n\n[Output truncated: showing {} {} lines / {} bytes of {} lines / {} bytes total. Use offset/limit parameters to view other sections.]",
        dir_str,
        result.content.lines().count(),
        result.content.len(),
        result.original_line_count,
        result.original_byte_count
    )
}

/// Whether `path` resolves outside `cwd`.
pub fn is_external_path(path: &Path, cwd: &Path) -> bool {
    let path = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => match path.parent() {
            Some(parent) => match parent.canonicalize() {
                Ok(p) => p.join(path.file_name().unwrap_or_default()),
                Err(_) => return true,
            },
            None => return true,
        },
    };

    match cwd.canonicalize() {
        Ok(cwd) => !path.starts_with(&cwd),
        Err(_) => true,
    }
}

/// Interpolate `${cwd}` / `${max_lines}` / `${max_bytes}` placeholders in a
/// tool description template.
pub fn interpolate_description(template: &str, cwd: &Path, max_lines: usize, max_bytes: usize) -> String {
    template
        .replace("${cwd}", &cwd.display().to_string())
        .replace("${max_lines}", &max_lines.to_string())
        .replace("${max_bytes}", &max_bytes.to_string())
}
