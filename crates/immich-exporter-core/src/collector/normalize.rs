//! Queue name to label value conversion.

/// Converts a camelCase queue name into a snake_case label value.
///
/// Each ASCII capital becomes `_` plus its lowercase form and every existing
/// `_` is doubled, so distinct names always yield distinct labels:
/// `thumbnailGeneration` → `thumbnail_generation`, `thumbnail_generation` →
/// `thumbnail__generation`, `Library` → `_library`.
pub fn normalize_queue_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c == '_' {
            out.push_str("__");
        } else if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn camel_case_becomes_snake_case() {
        assert_eq!(normalize_queue_name("thumbnailGeneration"), "thumbnail_generation");
        assert_eq!(normalize_queue_name("metadataExtraction"), "metadata_extraction");
        assert_eq!(normalize_queue_name("backgroundTask"), "background_task");
        assert_eq!(normalize_queue_name("search"), "search");
    }

    #[test]
    fn same_input_same_output() {
        let first = normalize_queue_name("smartSearch");
        for _ in 0..10 {
            assert_eq!(normalize_queue_name("smartSearch"), first);
        }
    }

    #[test]
    fn distinct_inputs_stay_distinct() {
        let inputs = [
            "fooBar",
            "foo_bar",
            "FooBar",
            "foobar",
            "foo__bar",
            "foo_Bar",
            "fooBAR",
            "foo_b_a_r",
            "ﬁle",
            "Ｆile",
        ];
        let outputs: HashSet<String> = inputs.iter().map(|i| normalize_queue_name(i)).collect();
        assert_eq!(outputs.len(), inputs.len());
    }

    #[test]
    fn digits_and_non_ascii_pass_through() {
        assert_eq!(normalize_queue_name("video2Conversion"), "video2_conversion");
        assert_eq!(normalize_queue_name("café"), "café");
    }
}
