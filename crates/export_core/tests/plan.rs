use export_core::{
    cookie_header, file_name_for, ledger_text, plan_item, Candidate, ExportMode, ItemPlan,
    NameSource, PlanContext, ResolvedTarget, SessionCredential, SkipReason,
};
use pretty_assertions::assert_eq;
use url::Url;

fn ctx(mode: ExportMode) -> PlanContext {
    PlanContext::new(Url::parse("https://example.com/news/list.html").unwrap(), mode)
}

#[test]
fn pdf_plan_resolves_relative_link_and_names_from_label() {
    let candidate = Candidate::new("archive/jan.html", "Jan 2024");
    let plan = plan_item(&candidate, 0, &ctx(ExportMode::Pdf));
    assert_eq!(
        plan,
        ItemPlan::Export {
            target: ResolvedTarget {
                absolute_url: "https://example.com/news/archive/jan.html".to_string(),
                output_name: "JAN_2024".to_string(),
            },
            file_name: "JAN_2024.pdf".to_string(),
        }
    );
}

#[test]
fn pdf_mode_skips_links_that_already_point_at_a_pdf() {
    let candidate = Candidate::new("https://example.com/get?path=foo.PDF", "Foo");
    let plan = plan_item(&candidate, 0, &ctx(ExportMode::Pdf));
    assert_eq!(plan, ItemPlan::Skip(SkipReason::AlreadyPdf("foo.PDF".into())));
}

#[test]
fn fetch_mode_keeps_path_param_links() {
    let candidate = Candidate::new("https://example.com/get?path=docs/foo.pdf", "Foo 2024");
    let ctx = ctx(ExportMode::Fetch).with_name_source(NameSource::PathParam);
    match plan_item(&candidate, 0, &ctx) {
        ItemPlan::Export { file_name, .. } => assert_eq!(file_name, "foo.pdf"),
        other => panic!("unexpected plan {other:?}"),
    }
}

#[test]
fn non_http_schemes_are_skipped_in_every_mode() {
    let candidate = Candidate::new("mailto:office@example.com", "Mail us 2024");
    for mode in [ExportMode::Pdf, ExportMode::Fetch] {
        assert_eq!(
            plan_item(&candidate, 0, &ctx(mode)),
            ItemPlan::Skip(SkipReason::UnsupportedScheme("mailto".into()))
        );
    }
}

#[test]
fn fetch_mode_names_from_url_segment_unless_marker_present() {
    let plain = Candidate::new("/media/logo.png", "Company logo");
    let marked = Candidate::new("/media/logo.png", "Logo FILE NAME: brand.png");
    let ctx = ctx(ExportMode::Fetch);

    let name_of = |c: &Candidate| match plan_item(c, 0, &ctx) {
        ItemPlan::Export { file_name, .. } => file_name,
        other => panic!("unexpected plan {other:?}"),
    };
    assert_eq!(name_of(&plain), "logo.png");
    assert_eq!(name_of(&marked), "brand.png");
}

#[test]
fn unlabeled_candidate_uses_ordinal_fallback() {
    let candidate = Candidate::new("https://example.com/", "");
    match plan_item(&candidate, 3, &ctx(ExportMode::Pdf)) {
        ItemPlan::Export { file_name, .. } => assert_eq!(file_name, "PAGE_3.pdf"),
        other => panic!("unexpected plan {other:?}"),
    }
}

#[test]
fn unresolvable_reference_is_rejected_with_a_name() {
    let candidate = Candidate::new("", "Broken link");
    match plan_item(&candidate, 0, &ctx(ExportMode::Pdf)) {
        ItemPlan::Reject { file_name, reason } => {
            assert_eq!(file_name, "BROKEN_LINK.pdf");
            assert!(reason.contains("empty"));
        }
        other => panic!("unexpected plan {other:?}"),
    }
}

#[test]
fn pdf_file_name_does_not_double_the_extension() {
    assert_eq!(file_name_for(ExportMode::Pdf, "report.pdf"), "report.pdf");
    assert_eq!(file_name_for(ExportMode::Pdf, "REPORT"), "REPORT.pdf");
    assert_eq!(file_name_for(ExportMode::Fetch, "photo.jpg"), "photo.jpg");
}

#[test]
fn ledger_text_falls_back_to_file_name() {
    assert_eq!(ledger_text(&Candidate::new("a", "Jan"), "JAN.pdf"), "Jan");
    assert_eq!(ledger_text(&Candidate::new("a", " "), "PAGE_0.pdf"), "PAGE_0.pdf");
}

#[test]
fn cookie_header_joins_pairs() {
    let jar = vec![
        SessionCredential::new("session", "abc"),
        SessionCredential::new("theme", "dark"),
    ];
    assert_eq!(cookie_header(&jar).as_deref(), Some("session=abc; theme=dark"));
    assert_eq!(cookie_header(&[]), None);
}
