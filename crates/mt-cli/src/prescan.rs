//! Textual pre-scan for `use "path";` directives — grounded in
//! `original_source/src/preproc.c`'s `getImports`, which tokenizes the
//! source on whitespace/`;`/`"` and, on every `use` token, interprets
//! the named file before the host touches the rest of the source.
//!
//! The compiler's `Op::Use` stays a source-compatible no-op (see
//! `mt-core::compiler`); resolution happens here instead, at the
//! driver level, so imported files become part of the same
//! compilation unit rather than a second `interpret` call — simpler,
//! and it gives imported declarations the same scope as the rest of
//! the script.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Finds every `use "path";` directive in `source`, reads each target
/// file (relative to `base_dir`) and prepends its contents ahead of
/// `source`, in the order the directives appear. Each file is spliced
/// at most once even if `use`d more than once. Directives are left in
/// place in the output (as the source-compatible no-op `Op::Use`
/// expects to see them at compile time).
pub fn splice_use_directives(source: &str, base_path: &Path) -> anyhow::Result<String> {
    let base_dir = base_path.parent().unwrap_or_else(|| Path::new("."));
    let mut seen = HashSet::new();
    let mut prelude = String::new();
    for target in find_use_targets(source) {
        splice_one(&target, base_dir, &mut seen, &mut prelude)?;
    }
    if prelude.is_empty() {
        Ok(source.to_string())
    } else {
        prelude.push_str(source);
        Ok(prelude)
    }
}

fn splice_one(
    target: &str,
    base_dir: &Path,
    seen: &mut HashSet<PathBuf>,
    out: &mut String,
) -> anyhow::Result<()> {
    let path = base_dir.join(target);
    let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
    if !seen.insert(canonical) {
        return Ok(());
    }
    let text = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("'use \"{target}\"' could not open '{}': {e}", path.display()))?;
    out.push_str(&text);
    out.push('\n');
    Ok(())
}

/// Scans for the literal sequence `use "..."` followed eventually by a
/// `;`, matching the original's whitespace/`;`/`"`-delimited tokenizer
/// closely enough for the one shape guest scripts actually use.
fn find_use_targets(source: &str) -> Vec<String> {
    let mut targets = Vec::new();
    let mut scanned = 0usize;
    let mut rest = source;
    while let Some(pos) = rest.find("use") {
        let is_word_start = scanned + pos == 0
            || !source[..scanned + pos].chars().next_back().is_some_and(is_ident_char);
        let after_kw = &rest[pos + 3..];
        let is_word_end = !after_kw.chars().next().is_some_and(is_ident_char);
        if is_word_start && is_word_end {
            let trimmed = after_kw.trim_start();
            if let Some(quote_rest) = trimmed.strip_prefix('"') {
                if let Some(end) = quote_rest.find('"') {
                    targets.push(quote_rest[..end].to_string());
                    scanned += pos + 3 + (after_kw.len() - quote_rest.len()) + end + 1;
                    rest = &source[scanned..];
                    continue;
                }
            }
        }
        scanned += pos + 3;
        rest = &source[scanned..];
    }
    targets
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_single_use_target() {
        assert_eq!(find_use_targets(r#"use "lib/math.mt"; print 1;"#), vec!["lib/math.mt".to_string()]);
    }

    #[test]
    fn finds_multiple_use_targets_in_order() {
        assert_eq!(
            find_use_targets(r#"use "a.mt"; use "b.mt";"#),
            vec!["a.mt".to_string(), "b.mt".to_string()]
        );
    }

    #[test]
    fn no_directives_yields_empty() {
        assert!(find_use_targets("print 1;").is_empty());
    }
}
