//! Input pre-processor (C8) — `spec.md` §4.8 / Phase 0 of §4.5.

use regex::Regex;
use std::sync::OnceLock;

use vessel_sandbox::RemoteSandbox;

const MAX_MENTION_BYTES: usize = 50_000;

fn mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(\S+)").expect("static regex"))
}

/// Extract `@path` mentions from `text`, preserving first-occurrence order
/// and de-duplicating. The original text is returned unchanged — mentions
/// stay in place.
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut mentions = Vec::new();
    for cap in mention_regex().captures_iter(text) {
        let path = cap[1].to_string();
        if seen.insert(path.clone()) {
            mentions.push(path);
        }
    }
    mentions
}

/// Phase 0 of the executor: expand `@path` mentions into a combined prompt
/// with an appended `"## Referenced Files"` section. Missing files are
/// annotated in place but never fail the turn.
pub async fn expand_mentions(text: &str, sandbox: &dyn RemoteSandbox) -> String {
    let mentions = extract_mentions(text);
    if mentions.is_empty() {
        return text.to_string();
    }

    let mut section = String::from("\n\n## Referenced Files\n");
    for mention in &mentions {
        // `normalize_path` resolves the user-visible form against the
        // sandbox's working directory; `read_file` re-does the same
        // resolution internally, so we only need it here to confirm the
        // mention resolves to something inside the sandbox at all.
        let _ = sandbox.normalize_path(mention);
        match sandbox.read_file(mention).await {
            Ok(Some(content)) => {
                let (content, truncated) = truncate_mention(&content);
                section.push_str(&format!("\n### {mention}\n```\n{content}\n```\n"));
                if truncated {
                    section.push_str(&format!(
                        "[truncated at {MAX_MENTION_BYTES} bytes]\n"
                    ));
                }
            }
            Ok(None) => {
                section.push_str(&format!("\n### {mention}\n[file not found]\n"));
            }
            Err(e) => {
                section.push_str(&format!("\n### {mention}\n[error reading file: {e}]\n"));
            }
        }
    }

    format!("{text}{section}")
}

fn truncate_mention(content: &str) -> (&str, bool) {
    if content.len() <= MAX_MENTION_BYTES {
        return (content, false);
    }
    let mut end = MAX_MENTION_BYTES;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    (&content[..end], true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vessel_sandbox::FakeSandbox;

    #[test]
    fn extract_mentions_preserves_first_occurrence_order_and_dedupes() {
        let text = "look at @src/a.rs and @src/b.rs again, also @src/a.rs";
        assert_eq!(
            extract_mentions(text),
            vec!["src/a.rs".to_string(), "src/b.rs".to_string()]
        );
    }

    #[test]
    fn extract_mentions_is_empty_for_plain_text() {
        assert!(extract_mentions("no mentions here").is_empty());
    }

    #[tokio::test]
    async fn expand_mentions_appends_referenced_files_section() {
        let sandbox = FakeSandbox::new();
        sandbox.seed_file("a.rs", "fn main() {}");
        let expanded = expand_mentions("check @a.rs please", &sandbox).await;
        assert!(expanded.contains("## Referenced Files"));
        assert!(expanded.contains("fn main() {}"));
    }

    #[tokio::test]
    async fn expand_mentions_annotates_missing_files_without_failing() {
        let sandbox = FakeSandbox::new();
        let expanded = expand_mentions("check @missing.rs please", &sandbox).await;
        assert!(expanded.contains("[file not found]"));
    }
}
