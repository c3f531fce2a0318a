//! Literate-mode filter for `.l` files — grounded in
//! `original_source/src/main.c`'s `readLiterate`: keeps only the text
//! found between `---` fences, discarding everything outside them
//! (prose, headings, anything a `.l` file uses for its non-code
//! commentary).

/// Toggles "inside a fence" on every `---` run and keeps characters
/// only while inside one, exactly like the original's `in` flag —
/// including its behavior on an odd number of fences (the tail after
/// an unmatched `---` is kept, since `in` is left toggled on).
pub fn strip_literate_fences(src: &str) -> String {
    let mut out = String::new();
    let mut inside = false;
    let mut rest = src;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("---") {
            inside = !inside;
            rest = tail;
            continue;
        }
        let mut chars = rest.chars();
        let c = chars.next().expect("rest is non-empty");
        if inside {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_fenced_content() {
        let src = "# Title\nsome prose\n---\nprint 1;\n---\nmore prose\n";
        assert_eq!(strip_literate_fences(src), "\nprint 1;\n");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(strip_literate_fences(""), "");
    }

    #[test]
    fn no_fences_keeps_nothing() {
        assert_eq!(strip_literate_fences("just prose, no fences"), "");
    }
}
