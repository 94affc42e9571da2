/*!
 * Format Tests
 */

use clipsel::data::format::{
    bare_mime, is_legacy_text_alias, is_plain_text, is_protocol_marker, normalize_offered,
    normalize_requested, TEXT_PLAIN,
};
use clipsel::DataKind;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn test_typical_browser_offer() {
    let offered = names(&[
        "TIMESTAMP",
        "TARGETS",
        "MULTIPLE",
        "SAVE_TARGETS",
        "text/html",
        "text/_moz_htmlcontext",
        "UTF8_STRING",
        "COMPOUND_TEXT",
        "TEXT",
        "STRING",
        "text/plain;charset=utf-8",
        "text/plain",
    ]);
    assert_eq!(
        normalize_offered(&offered),
        names(&[
            "text/html",
            "text/_moz_htmlcontext",
            "text/plain;charset=utf-8"
        ])
    );
}

#[test]
fn test_aliases_kept_without_text_mime() {
    // Old clients only speak the legacy names
    let offered = names(&["TARGETS", "UTF8_STRING", "STRING"]);
    assert_eq!(normalize_offered(&offered), names(&["UTF8_STRING", "STRING"]));
    assert_eq!(DataKind::of_format("UTF8_STRING"), DataKind::Text);
}

#[test]
fn test_uri_list_does_not_hide_aliases() {
    let offered = names(&["TARGETS", "text/uri-list", "UTF8_STRING", "STRING"]);
    assert_eq!(
        normalize_offered(&offered),
        names(&["text/uri-list", "UTF8_STRING", "STRING"])
    );
    assert!(is_plain_text("Text/Plain; charset=utf-8"));
    assert!(!is_plain_text("text/html"));
}

#[test]
fn test_requested_alias_maps_to_plain_text() {
    for alias in ["UTF8_STRING", "COMPOUND_TEXT", "TEXT", "STRING"] {
        assert!(is_legacy_text_alias(alias));
        assert_eq!(normalize_requested(alias), TEXT_PLAIN);
    }
    assert_eq!(normalize_requested("image/png"), "image/png");
    assert!(is_protocol_marker("INCR"));
    assert!(!is_protocol_marker("image/png"));
}

#[test]
fn test_kinds() {
    assert_eq!(DataKind::of_format("image/webp"), DataKind::Image);
    assert_eq!(DataKind::of_format("text/uri-list"), DataKind::FileList);
    assert_eq!(DataKind::of_format("x-special/gnome-copied-files"), DataKind::FileList);
    assert_eq!(DataKind::of_format("application/pdf"), DataKind::Invalid);
    assert_eq!(DataKind::of_format("garbage"), DataKind::Invalid);
    assert_eq!(bare_mime("text/plain;charset=utf-8"), "text/plain");
}

fn offered_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("TARGETS".to_string()),
        Just("MULTIPLE".to_string()),
        Just("TIMESTAMP".to_string()),
        Just("UTF8_STRING".to_string()),
        Just("STRING".to_string()),
        Just("text/plain".to_string()),
        Just("text/plain;charset=utf-8".to_string()),
        Just("image/png".to_string()),
        Just("text/uri-list".to_string()),
        Just("text/html".to_string()),
        "[a-z]{1,6}/[a-z]{1,6}",
    ]
}

proptest! {
    #[test]
    fn prop_normalize_offered(offered in proptest::collection::vec(offered_name(), 0..12)) {
        let kept = normalize_offered(&offered);

        // No markers and no duplicates
        prop_assert!(kept.iter().all(|n| !is_protocol_marker(n)));
        let mut unique = kept.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), kept.len());

        // Survivors keep their relative order
        let positions: Vec<usize> = kept
            .iter()
            .map(|n| offered.iter().position(|o| o == n).unwrap())
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));

        // A bare MIME type never survives next to its parameterised form
        for name in &kept {
            if !name.contains(';') {
                prop_assert!(!kept.iter().any(|o| o.contains(';') && bare_mime(o) == name));
            }
        }

        // Legacy aliases are hidden only behind a plain-text MIME type
        let plain_offered = offered.iter().any(|n| is_plain_text(n));
        for alias in offered.iter().filter(|n| is_legacy_text_alias(n)) {
            prop_assert_eq!(kept.contains(alias), !plain_offered);
        }

        // Idempotent
        prop_assert_eq!(normalize_offered(&kept), kept);
    }
}
