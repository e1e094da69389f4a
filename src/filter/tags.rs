//! Structural-tag neutralization.
//!
//! Plugin output and session-bootstrap bodies are wrapped in the system's
//! own XML-ish tags before injection. Any occurrence of those tag names
//! inside the body must be rewritten so untrusted content cannot close a
//! wrapper early or open a fake one. Unrelated tags (`<html>`, …) pass
//! through unchanged.

use regex::Regex;
use std::sync::OnceLock;

/// Tag names owned by the system. Occurrences inside content bodies are
/// bracket-escaped.
const STRUCTURAL_TAGS: &[&str] = &[
    "vault-context",
    "plugin-context",
    "session-bootstrap",
    "vault-handoff",
    "vault-decisions",
    "same-diagnostic",
];

struct TagRules {
    /// One (open, close) regex pair per structural tag, attribute- and
    /// self-closing-tolerant.
    structural: Vec<(Regex, String, Regex, String)>,
    system_open: Regex,
    system_close: Regex,
    inst_open: Regex,
    inst_close: Regex,
    sys_open: Regex,
    sys_close: Regex,
    cdata_open: Regex,
    cdata_close: Regex,
}

#[allow(clippy::unwrap_used)]
fn rules() -> &'static TagRules {
    static RULES: OnceLock<TagRules> = OnceLock::new();
    RULES.get_or_init(|| {
        let structural = STRUCTURAL_TAGS
            .iter()
            .map(|name| {
                let open = Regex::new(&format!(r"(?i)<\s*{name}(\s[^>]*)?/?\s*>")).unwrap();
                let close = Regex::new(&format!(r"(?i)<\s*/\s*{name}\s*>")).unwrap();
                (open, format!("[{name}]"), close, format!("[/{name}]"))
            })
            .collect();
        TagRules {
            structural,
            // `<system>` plus attributed and self-closing variants; the
            // plain-substring backstop in the snippet filter misses these.
            system_open: Regex::new(r"(?i)<\s*system(\s[^>]*)?/?\s*>").unwrap(),
            system_close: Regex::new(r"(?i)<\s*/\s*system\s*>").unwrap(),
            inst_open: Regex::new(r"\[INST\]").unwrap(),
            inst_close: Regex::new(r"\[/INST\]").unwrap(),
            sys_open: Regex::new(r"<<SYS>>").unwrap(),
            sys_close: Regex::new(r"<</SYS>>").unwrap(),
            cdata_open: Regex::new(r"(?i)<!\[CDATA\[").unwrap(),
            cdata_close: Regex::new(r"\]\]>").unwrap(),
        }
    })
}

/// Rewrites every structural wrapper occurrence in `text` to its bracketed
/// form. Idempotent: the bracket substitutions contain no `<`, so a second
/// pass is a no-op.
#[must_use]
pub fn sanitize_context_tags(text: &str) -> String {
    let rules = rules();
    let mut out = text.to_string();

    for (open, open_sub, close, close_sub) in &rules.structural {
        // Close first so `</name>` is not half-eaten by the open pattern.
        out = close.replace_all(&out, close_sub.as_str()).into_owned();
        out = open.replace_all(&out, open_sub.as_str()).into_owned();
    }

    out = rules.system_close.replace_all(&out, "[/system]").into_owned();
    out = rules.system_open.replace_all(&out, "[system]").into_owned();

    out = rules.inst_open.replace_all(&out, "[[inst]]").into_owned();
    out = rules.inst_close.replace_all(&out, "[[/inst]]").into_owned();
    out = rules.sys_open.replace_all(&out, "[[sys]]").into_owned();
    out = rules.sys_close.replace_all(&out, "[[/sys]]").into_owned();
    out = rules.cdata_open.replace_all(&out, "[cdata]").into_owned();
    out = rules.cdata_close.replace_all(&out, "[/cdata]").into_owned();

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_tags_rewritten() {
        let text = "<vault-context>payload</vault-context>";
        assert_eq!(
            sanitize_context_tags(text),
            "[vault-context]payload[/vault-context]"
        );
    }

    #[test]
    fn test_case_insensitive() {
        let text = "<Vault-Context>x</VAULT-CONTEXT>";
        assert_eq!(
            sanitize_context_tags(text),
            "[vault-context]x[/vault-context]"
        );
    }

    #[test]
    fn test_other_tags_pass_through() {
        let text = "<html><body>hello</body></html>";
        assert_eq!(sanitize_context_tags(text), text);
    }

    #[test]
    fn test_attributed_and_self_closing_variants() {
        assert_eq!(
            sanitize_context_tags(r#"<system role="root">"#),
            "[system]"
        );
        assert_eq!(sanitize_context_tags("<system />"), "[system]");
        assert_eq!(
            sanitize_context_tags(r#"<plugin-context source="x">"#),
            "[plugin-context]"
        );
    }

    #[test]
    fn test_inst_and_sys_markers() {
        assert_eq!(sanitize_context_tags("[INST] hi [/INST]"), "[[inst]] hi [[/inst]]");
        assert_eq!(sanitize_context_tags("<<SYS>>x<</SYS>>"), "[[sys]]x[[/sys]]");
    }

    #[test]
    fn test_cdata_neutralized() {
        assert_eq!(
            sanitize_context_tags("<![CDATA[sneaky]]>"),
            "[cdata]sneaky[/cdata]"
        );
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "<vault-context>x</vault-context>",
            "[INST] y [/INST]",
            "<<SYS>>z<</SYS>>",
            "<![CDATA[w]]>",
            r#"<session-bootstrap mode="full"/>"#,
        ];
        for input in inputs {
            let once = sanitize_context_tags(input);
            let twice = sanitize_context_tags(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_every_structural_tag_covered() {
        for name in STRUCTURAL_TAGS {
            let text = format!("<{name}>body</{name}>");
            let expected = format!("[{name}]body[/{name}]");
            assert_eq!(sanitize_context_tags(&text), expected);
        }
    }
}
