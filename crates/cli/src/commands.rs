//! Slash-command router (C9) — `spec.md` §4.9, closed command set.

use std::path::Path;

use vessel_sandbox::RemoteSandbox;

use crate::ui;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// Directories `/files` hides unless invoked with `all`
/// (`SPEC_FULL.md` §4.9 ADDED).
const HIDDEN_TREE_DIRS: [&str; 3] = ["code", "tools", "mcp_servers"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Clear,
    Tokens,
    Files { all: bool },
    View { path: String },
    Copy { path: String },
    Download { path: String, local: Option<String> },
    Model,
    Exit,
    Unknown(String),
}

/// Parse a line that begins with `/` into a [`SlashCommand`]. Returns
/// `None` if `line` is not a slash command at all.
pub fn parse(line: &str) -> Option<SlashCommand> {
    let line = line.trim();
    if !line.starts_with('/') {
        return None;
    }
    let mut parts = line[1..].split_whitespace();
    let cmd = parts.next().unwrap_or("");
    let rest: Vec<&str> = parts.collect();

    Some(match cmd {
        "help" => SlashCommand::Help,
        "clear" => SlashCommand::Clear,
        "tokens" => SlashCommand::Tokens,
        "files" => SlashCommand::Files {
            all: rest.first() == Some(&"all"),
        },
        "view" => SlashCommand::View {
            path: rest.first().unwrap_or(&"").to_string(),
        },
        "copy" => SlashCommand::Copy {
            path: rest.first().unwrap_or(&"").to_string(),
        },
        "download" => SlashCommand::Download {
            path: rest.first().unwrap_or(&"").to_string(),
            local: rest.get(1).map(|s| s.to_string()),
        },
        "model" => SlashCommand::Model,
        "exit" | "q" => SlashCommand::Exit,
        other => SlashCommand::Unknown(other.to_string()),
    })
}

pub fn print_help() {
    ui::print_info("Available commands:");
    println!("  /help                      show this reference");
    println!("  /clear                     start a new conversation thread");
    println!("  /tokens                    show token usage for this thread");
    println!("  /files [all]               show the sandbox file tree");
    println!("  /view <path>               print (or download) a file");
    println!("  /copy <path>               copy a file's contents to the clipboard");
    println!("  /download <path> [local]   fetch a file to the local filesystem");
    println!("  /model                     change the active model");
    println!("  /exit, /q                  quit");
}

/// `/files [all]`: render a sandbox tree, excluding scratch directories
/// unless `all` was given.
pub async fn run_files(sandbox: &dyn RemoteSandbox, all: bool) {
    match sandbox.list_directory("/").await {
        Ok(entries) => {
            for entry in entries {
                let base = Path::new(&entry)
                    .file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                if !all && HIDDEN_TREE_DIRS.contains(&base.as_str()) {
                    continue;
                }
                println!("{entry}");
            }
        }
        Err(e) => ui::print_assistant_error(&format!("could not list files: {e}")),
    }
}

fn is_image_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// `/view <path>`: print text files inline; auto-download images instead of
/// dumping raw bytes to the terminal (`SPEC_FULL.md` §4.9 ADDED).
pub async fn run_view(sandbox: &dyn RemoteSandbox, path: &str) {
    if path.is_empty() {
        ui::print_assistant_error("usage: /view <path>");
        return;
    }
    if is_image_path(path) {
        run_download(sandbox, path, None).await;
        return;
    }
    match sandbox.read_file(path).await {
        Ok(Some(content)) => {
            ui::print_separator();
            println!("{content}");
            ui::print_separator();
        }
        Ok(None) => ui::print_assistant_error(&format!("{path}: not found")),
        Err(e) => ui::print_assistant_error(&format!("{path}: {e}")),
    }
}

/// `/copy <path>`: copy a sandbox file's contents to the local clipboard.
pub async fn run_copy(sandbox: &dyn RemoteSandbox, path: &str) {
    if path.is_empty() {
        ui::print_assistant_error("usage: /copy <path>");
        return;
    }
    match sandbox.read_file(path).await {
        Ok(Some(content)) => match arboard::Clipboard::new() {
            Ok(mut clipboard) => match clipboard.set_text(content) {
                Ok(()) => ui::print_success(&format!("copied {path} to clipboard")),
                Err(e) => ui::print_assistant_error(&format!("clipboard write failed: {e}")),
            },
            Err(e) => ui::print_assistant_error(&format!("clipboard unavailable: {e}")),
        },
        Ok(None) => ui::print_assistant_error(&format!("{path}: not found")),
        Err(e) => ui::print_assistant_error(&format!("{path}: {e}")),
    }
}

/// `/download <path> [local]`: fetch sandbox bytes to the local filesystem.
pub async fn run_download(sandbox: &dyn RemoteSandbox, path: &str, local: Option<&str>) {
    if path.is_empty() {
        ui::print_assistant_error("usage: /download <path> [local]");
        return;
    }
    let dest = local.map(String::from).unwrap_or_else(|| {
        Path::new(path)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "download".to_string())
    });
    match sandbox.download_bytes(path).await {
        Ok(bytes) => match std::fs::write(&dest, &bytes) {
            Ok(()) => ui::print_success(&format!("downloaded {path} -> {dest}")),
            Err(e) => ui::print_assistant_error(&format!("could not write {dest}: {e}")),
        },
        Err(e) => ui::print_assistant_error(&format!("{path}: {e}")),
    }
}

/// `/model`: gated on there being no active conversation yet for the
/// current thread id (`SPEC_FULL.md` §4.9 ADDED).
pub fn run_model(has_active_conversation: bool) -> bool {
    if has_active_conversation {
        ui::print_assistant_error(
            "cannot change models mid-conversation; use /clear to start a new thread first",
        );
        false
    } else {
        true
    }
}

/// `/clear`: best-effort scratch-directory cleanup for the thread being
/// abandoned. Tolerant of a missing directory — a fresh sandbox has
/// nothing to clean up yet.
pub async fn run_clear(sandbox: &dyn RemoteSandbox, scratch_dir: &str) {
    let cmd = format!("find {scratch_dir} -mindepth 1 -delete");
    let _ = sandbox
        .execute_bash(&cmd, None, std::time::Duration::from_secs(10), false)
        .await;
    ui::print_info("started a new conversation thread");
}

/// `/tokens`: report token usage for the current thread.
pub fn run_tokens(captured_tokens: u64) {
    ui::print_info(&format!("tokens used this thread: {captured_tokens}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_files_with_all_flag() {
        assert_eq!(parse("/files all"), Some(SlashCommand::Files { all: true }));
        assert_eq!(parse("/files"), Some(SlashCommand::Files { all: false }));
    }

    #[test]
    fn parses_view_and_copy_with_path() {
        assert_eq!(
            parse("/view src/main.rs"),
            Some(SlashCommand::View {
                path: "src/main.rs".to_string()
            })
        );
        assert_eq!(
            parse("/copy notes.txt"),
            Some(SlashCommand::Copy {
                path: "notes.txt".to_string()
            })
        );
    }

    #[test]
    fn parses_download_with_optional_local_path() {
        assert_eq!(
            parse("/download out.png local.png"),
            Some(SlashCommand::Download {
                path: "out.png".to_string(),
                local: Some("local.png".to_string())
            })
        );
    }

    #[test]
    fn quit_aliases_map_to_exit() {
        assert_eq!(parse("/exit"), Some(SlashCommand::Exit));
        assert_eq!(parse("/q"), Some(SlashCommand::Exit));
    }

    #[test]
    fn non_slash_input_is_not_a_command() {
        assert_eq!(parse("hello there"), None);
    }

    #[test]
    fn unknown_command_is_preserved() {
        assert_eq!(parse("/frobnicate"), Some(SlashCommand::Unknown("frobnicate".to_string())));
    }

    #[test]
    fn image_extensions_are_detected_case_insensitively() {
        assert!(is_image_path("diagram.PNG"));
        assert!(is_image_path("photo.jpg"));
        assert!(!is_image_path("notes.txt"));
    }

    #[test]
    fn model_change_is_blocked_mid_conversation() {
        assert!(!run_model(true));
        assert!(run_model(false));
    }
}
