//! Property tests: normalizing an already normalized fragment is a no-op.

use proptest::prelude::*;

use moodle2pretext::html::{pretextify, simplify_html};

const TAGS: &[&str] = &["p", "b", "strong", "i", "u", "code", "div", "h4", "tt"];
const SPAN_STYLES: &[&str] = &["", " style=\"font-family: mono\"", " style=\"color: red\""];

/// Loosely structured editor output built from inline and paragraph tags.
fn arb_fragment() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        "[a-z ]{0,8}",
        Just("<br>".to_string()),
        Just("<sub>2</sub>".to_string()),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            (prop::sample::select(TAGS), prop::collection::vec(inner.clone(), 0..4))
                .prop_map(|(tag, children)| format!("<{tag}>{}</{tag}>", children.concat())),
            (prop::sample::select(SPAN_STYLES), prop::collection::vec(inner.clone(), 0..3))
                .prop_map(|(style, children)| format!("<span{style}>{}</span>", children.concat())),
            prop::collection::vec(inner, 1..4).prop_map(|children| children.concat()),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn simplify_is_idempotent(fragment in arb_fragment()) {
        let once = simplify_html(&fragment).unwrap();
        prop_assert_eq!(simplify_html(&once).unwrap(), once);
    }

    #[test]
    fn pretextify_is_idempotent(fragment in arb_fragment()) {
        let once = pretextify(&fragment, None).unwrap();
        prop_assert_eq!(pretextify(&once, None).unwrap(), once);
    }

    #[test]
    fn output_never_contains_source_vocabulary(fragment in arb_fragment()) {
        let out = pretextify(&fragment, None).unwrap();
        for tag in ["<b>", "<strong>", "<i>", "<u>", "<code>", "<span", "<div", "<h4>", "<tt>", "<br"] {
            prop_assert!(!out.contains(tag), "{} left in {}", tag, out);
        }
    }
}
