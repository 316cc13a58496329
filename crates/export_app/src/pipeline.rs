//! One export run: read the listing page, extract candidates, export each
//! one and record it in the ledger.

use std::sync::Arc;

use anyhow::{Context, Result};
use export_core::{Candidate, ExportMode, SessionCredential};
use export_engine::{
    decode_page, ensure_output_dir, BrowserDocument, ChromiumRenderer, CookieSpec, Dispatcher,
    DocumentQuery, FetchSettings, LaunchOptions, Ledger, Orchestrator, PdfExportOptions,
    PdfExporter, RenderPage, Renderer, ReqwestFetcher, ResourceFetcher, RunReport, StaticDocument,
};
use export_logging::{export_debug, export_info, export_warn};

use crate::config::{CookieConfig, DocumentSource, Settings};

const COOKIE_LIFETIME_SECS: i64 = 24 * 60 * 60;

/// Candidates read from the listing page plus the credentials downloads
/// should carry.
struct Listing {
    candidates: Vec<Candidate>,
    credentials: Vec<SessionCredential>,
}

/// Runs the whole export. Per-item failures end up in the ledger; only
/// setup problems (directories, browser launch, the listing page itself)
/// are returned as errors. The browser is closed either way.
pub async fn run(settings: &Settings) -> Result<RunReport> {
    ensure_output_dir(&settings.output_dir).with_context(|| {
        format!("failed to prepare output dir {}", settings.output_dir.display())
    })?;
    ensure_output_dir(&settings.report_dir).with_context(|| {
        format!("failed to prepare report dir {}", settings.report_dir.display())
    })?;

    if settings.accept_invalid_certs {
        export_warn!("TLS certificate validation is disabled for downloads");
    }
    let fetcher = ReqwestFetcher::new(FetchSettings {
        accept_invalid_certs: settings.accept_invalid_certs,
        ..FetchSettings::default()
    });

    let browser = if settings.needs_browser() {
        let options = LaunchOptions {
            executable: settings.chromium.clone(),
            no_sandbox: settings.no_sandbox,
        };
        let browser = ChromiumRenderer::launch(&options)
            .await
            .context("failed to launch Chromium")?;
        Some(Arc::new(browser))
    } else {
        None
    };

    let result = export_listing(settings, &fetcher, browser.clone()).await;

    if let Some(browser) = browser {
        shutdown(browser).await;
    }

    let report = result?;
    export_info!("Saved {} file(s).", report.succeeded);
    if report.failed > 0 || report.skipped > 0 {
        export_info!(
            "{} failure(s) and {} skipped candidate(s); see {}",
            report.failed,
            report.skipped,
            Ledger::in_dir(&settings.report_dir).path().display()
        );
    }
    Ok(report)
}

async fn export_listing(
    settings: &Settings,
    fetcher: &ReqwestFetcher,
    browser: Option<Arc<ChromiumRenderer>>,
) -> Result<RunReport> {
    let listing = match (&browser, settings.document_source) {
        (Some(browser), DocumentSource::Browser) => {
            read_in_browser(settings, browser.as_ref()).await?
        }
        _ => read_static(settings, fetcher).await?,
    };
    export_info!("Found {} matching candidate(s)", listing.candidates.len());

    let ledger = Ledger::in_dir(&settings.report_dir);
    let report = match (settings.mode, browser) {
        (ExportMode::Pdf, Some(browser)) => {
            let exporter = PdfExporter::new(browser, pdf_options(settings));
            let dispatcher = Dispatcher::Pdf {
                exporter: &exporter,
            };
            orchestrator(dispatcher, &ledger, settings)
                .run(&listing.candidates)
                .await
        }
        (ExportMode::Pdf, None) => anyhow::bail!("pdf mode requires a browser"),
        (ExportMode::Fetch, _) => fetch_all(settings, &ledger, fetcher, &listing).await,
    };
    Ok(report)
}

/// Downloads every candidate, sending the listing's credentials with each request.
async fn fetch_all(
    settings: &Settings,
    ledger: &Ledger,
    fetcher: &dyn ResourceFetcher,
    listing: &Listing,
) -> RunReport {
    let dispatcher = Dispatcher::Fetch {
        fetcher,
        credentials: &listing.credentials,
    };
    orchestrator(dispatcher, ledger, settings)
        .run(&listing.candidates)
        .await
}

fn orchestrator<'a>(
    dispatcher: Dispatcher<'a>,
    ledger: &'a Ledger,
    settings: &Settings,
) -> Orchestrator<'a> {
    Orchestrator::new(
        dispatcher,
        ledger,
        &settings.output_dir,
        settings.target_url.clone(),
    )
    .with_name_source(settings.name_source)
}

fn pdf_options(settings: &Settings) -> PdfExportOptions {
    PdfExportOptions {
        wait_until: settings.wait_until,
        navigation_timeout: settings.navigation_timeout,
        target_element: settings.target_element.clone(),
        asset_base_url: settings.asset_base_url.clone(),
        ..PdfExportOptions::default()
    }
}

async fn read_in_browser(settings: &Settings, browser: &dyn Renderer) -> Result<Listing> {
    let page = browser
        .new_page()
        .await
        .context("failed to open the listing page")?;
    let listing = read_page(settings, page.as_ref()).await;
    if let Err(err) = page.close().await {
        export_warn!("Failed to close listing page: {}", err);
    }
    listing
}

async fn read_page(settings: &Settings, page: &dyn RenderPage) -> Result<Listing> {
    let target = settings.target_url.as_str();

    if let Some(cookies) = &settings.cookies {
        let expires = chrono::Utc::now().timestamp() + COOKIE_LIFETIME_SECS;
        export_info!("Setting cookie(s): {}", cookies.names().join(", "));
        page.set_cookies(&cookie_specs(cookies, expires))
            .await
            .context("failed to inject cookies")?;
    }

    export_info!("Target URL: {}", target);
    page.navigate(target, settings.wait_until, settings.navigation_timeout)
        .await
        .with_context(|| format!("failed to load {target}"))?;
    if settings.cookies.is_some() && settings.reload_after_cookies {
        page.reload(settings.wait_until, settings.navigation_timeout)
            .await
            .with_context(|| format!("failed to reload {target}"))?;
    }

    let jar = page.cookies().await.context("failed to read browser cookies")?;
    export_debug!(
        "Browser cookies: {}",
        jar.iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let candidates = BrowserDocument::new(page)
        .include_unlabeled(settings.include_unlabeled)
        .extract(&settings.source_selector, &settings.pattern)
        .await
        .context("failed to extract candidates")?;

    Ok(Listing {
        candidates,
        credentials: merge_credentials(jar, &configured_credentials(settings)),
    })
}

async fn read_static(settings: &Settings, fetcher: &ReqwestFetcher) -> Result<Listing> {
    let target = settings.target_url.as_str();
    let credentials = configured_credentials(settings);
    export_info!("Target URL: {}", target);

    let page = fetcher
        .fetch_page(target, &credentials)
        .await
        .with_context(|| format!("failed to fetch {target}"))?;
    let decoded = decode_page(&page.bytes, page.content_type.as_deref());
    export_debug!("Decoded {} as {}", page.final_url, decoded.encoding_label);

    let candidates = StaticDocument::new(decoded.html)
        .include_unlabeled(settings.include_unlabeled)
        .extract_sync(&settings.source_selector, &settings.pattern)
        .context("failed to extract candidates")?;

    Ok(Listing {
        candidates,
        credentials,
    })
}

async fn shutdown(browser: Arc<ChromiumRenderer>) {
    match Arc::try_unwrap(browser) {
        Ok(browser) => {
            if let Err(err) = browser.close().await {
                export_warn!("Failed to close browser: {}", err);
            }
        }
        Err(_) => export_warn!("Browser still in use at shutdown; leaving it to exit"),
    }
}

fn configured_credentials(settings: &Settings) -> Vec<SessionCredential> {
    settings
        .cookies
        .as_ref()
        .map(|c| c.credentials.clone())
        .unwrap_or_default()
}

fn cookie_specs(cookies: &CookieConfig, expires: i64) -> Vec<CookieSpec> {
    cookies
        .credentials
        .iter()
        .map(|credential| CookieSpec::session(credential.clone(), &cookies.domain, expires))
        .collect()
}

/// The browser jar wins by name; configured cookies it lacks are appended.
fn merge_credentials(
    jar: Vec<SessionCredential>,
    configured: &[SessionCredential],
) -> Vec<SessionCredential> {
    let mut merged = jar;
    for credential in configured {
        if !merged.iter().any(|c| c.name == credential.name) {
            merged.push(credential.clone());
        }
    }
    merged
}
