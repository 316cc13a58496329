use export_core::{fallback_name, marker_name, path_param_name, sanitize, url_segment_name};
use pretty_assertions::assert_eq;
use url::Url;

fn only_safe_chars(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[test]
fn label_is_folded_to_uppercase_underscored_name() {
    assert_eq!(sanitize("Jan 2024 Newsletter!", "x"), "JAN_2024_NEWSLETTER");
    assert_eq!(sanitize("  Q3   results - final ", "x"), "Q3_RESULTS_-_FINAL");
}

#[test]
fn marker_overrides_verbatim() {
    assert_eq!(sanitize("FILE NAME: report.jpg", "x"), "report.jpg");
    assert_eq!(
        sanitize("Comms skills FILE NAME:commskillsthumbnail.jpg (new)", "x"),
        "commskillsthumbnail.jpg"
    );
}

#[test]
fn marker_with_path_separator_is_ignored() {
    assert_eq!(marker_name("FILE NAME: ../../etc/passwd"), None);
    assert_eq!(sanitize("FILE NAME: a/b.jpg", "fallback"), "FILE_NAME_ABJPG");
}

#[test]
fn empty_label_uses_fallback_then_untitled() {
    assert_eq!(sanitize("", "brochure-2024"), "BROCHURE-2024");
    assert_eq!(sanitize("!!!", "???"), "UNTITLED");
}

#[test]
fn output_is_non_empty_and_safe_for_awkward_inputs() {
    let inputs = [
        "",
        " ",
        "\u{1F600}",
        "a/b\\c:d*e?f\"g<h>i|j",
        "tab\tand\nnewline",
        "ÄÖÜ straße",
        "CON",
        "----",
    ];
    for input in inputs {
        let name = sanitize(input, "");
        assert!(!name.is_empty(), "empty name for {input:?}");
        assert!(only_safe_chars(&name), "unsafe name {name:?} for {input:?}");
    }
}

#[test]
fn fallback_name_strips_extension_and_query() {
    assert_eq!(
        fallback_name("https://example.com/files/annual-report.pdf?v=2", 0),
        "annual-report"
    );
    assert_eq!(fallback_name("/docs/guide.v2.html", 1), "guide.v2");
    assert_eq!(fallback_name("https://example.com/", 4), "Page_4");
    assert_eq!(fallback_name("", 7), "Page_7");
}

#[test]
fn url_segment_keeps_extension() {
    let url = Url::parse("https://cdn.example.com/img/My%20Logo.png?size=2").unwrap();
    assert_eq!(url_segment_name(&url).as_deref(), Some("My_20Logo.png"));

    let root = Url::parse("https://cdn.example.com/").unwrap();
    assert_eq!(url_segment_name(&root), None);
}

#[test]
fn path_param_takes_last_segment() {
    let url =
        Url::parse("https://example.com/download?path=/news/2024/Spring%20Letter.pdf").unwrap();
    assert_eq!(path_param_name(&url).as_deref(), Some("Spring_Letter.pdf"));

    let missing = Url::parse("https://example.com/download?id=3").unwrap();
    assert_eq!(path_param_name(&missing), None);
}
