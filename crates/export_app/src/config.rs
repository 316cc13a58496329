//! Run configuration, layered from lowest to highest precedence: built-in
//! defaults, an optional RON profile, `.env`, the process environment and
//! command-line flags.
//!
//! clap merges the last three (a flag beats its `env` fallback, and `.env`
//! never overrides a variable that is already set), so resolution here only
//! has to lay the profile underneath.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{Parser, ValueEnum};
use export_core::{ExportMode, MatchPattern, NameSource, SessionCredential, WaitUntil};
use export_logging::export_warn;
use log::LevelFilter;
use serde::Deserialize;
use url::Url;

use crate::logging::{parse_level_arg, LogDestination};

/// Older deployments name the selector after the image variant.
const LEGACY_SELECTOR_ENV: &str = "SOURCE_IMAGES_REF";
const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Parser)]
#[command(name = "page-export")]
#[command(about = "Export the resources or pages linked from a web page")]
#[command(version)]
pub struct Cli {
    /// RON profile supplying defaults for the settings below.
    #[arg(long, env = "EXPORT_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Page listing the candidates.
    #[arg(long, env = "TARGET_URL")]
    pub target_url: Option<String>,

    /// CSS selector for candidate elements.
    #[arg(long, env = "SOURCE_SELECTOR")]
    pub source_selector: Option<String>,

    /// Regex a candidate's label must match. Empty matches everything.
    #[arg(long = "match", env = "TARGET_REGEX")]
    pub match_pattern: Option<String>,

    #[arg(long, env = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory receiving export_results.csv.
    #[arg(long, env = "REPORT_DIR")]
    pub report_dir: Option<PathBuf>,

    /// `fetch` saves raw bytes, `pdf` prints each page.
    #[arg(long, env = "EXPORT_MODE")]
    pub mode: Option<ExportMode>,

    /// Render only this subtree of each page (pdf mode).
    #[arg(long, env = "TARGET_ELEMENT")]
    pub target_element: Option<String>,

    /// Cookie names, separated by commas or whitespace.
    #[arg(long, env = "COOKIE_NAMES")]
    pub cookie_names: Option<String>,

    /// Cookie values, paired with the names by position.
    #[arg(long, env = "COOKIE_VALUES", hide_env_values = true)]
    pub cookie_values: Option<String>,

    #[arg(long, env = "COOKIE_DOMAIN")]
    pub cookie_domain: Option<String>,

    /// `load`, `networkidle0` or `networkidle2`.
    #[arg(long, env = "WAIT_UNTIL")]
    pub wait_until: Option<WaitUntil>,

    #[arg(long, env = "NAVIGATION_TIMEOUT_SECS")]
    pub navigation_timeout_secs: Option<u64>,

    /// Skip TLS certificate validation for downloads.
    #[arg(
        long,
        env = "ACCEPT_INVALID_CERTS",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub accept_invalid_certs: Option<bool>,

    /// `label`, `url-segment` or `path-param`.
    #[arg(long, env = "NAME_SOURCE")]
    pub name_source: Option<NameSource>,

    /// Read the listing page through the browser or over plain HTTP.
    #[arg(long, env = "DOCUMENT_SOURCE", value_enum)]
    pub document_source: Option<DocumentSource>,

    /// Keep candidates with an empty label.
    #[arg(
        long,
        env = "INCLUDE_UNLABELED",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub include_unlabeled: Option<bool>,

    /// Reload the listing page once after injecting cookies.
    #[arg(
        long,
        env = "RELOAD_AFTER_COOKIES",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub reload_after_cookies: Option<bool>,

    /// `<base>` for isolated subtrees. Defaults to each page's origin.
    #[arg(long, env = "ASSET_BASE_URL")]
    pub asset_base_url: Option<String>,

    /// Chromium executable. Searched on PATH when absent.
    #[arg(long)]
    pub chromium: Option<PathBuf>,

    /// Launch Chromium without its sandbox (containers running as root).
    #[arg(long, env = "CHROMIUM_NO_SANDBOX")]
    pub no_sandbox: bool,

    #[arg(long, env = "EXPORT_LOG_LEVEL", default_value = "info", value_parser = parse_level_arg)]
    pub log_level: LevelFilter,

    #[arg(long, env = "EXPORT_LOG_TO", value_enum, default_value_t = LogDestination::Both)]
    pub log_to: LogDestination,
}

/// Where candidates are extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DocumentSource {
    /// The rendered DOM of the listing page in Chromium.
    #[default]
    Browser,
    /// The listing page fetched over HTTP and parsed without scripts.
    Static,
}

/// Settings a profile may provide. Cookie values only come from the
/// environment or flags.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub target_url: Option<String>,
    pub source_selector: Option<String>,
    pub match_pattern: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub mode: Option<String>,
    pub target_element: Option<String>,
    pub cookie_names: Option<String>,
    pub cookie_domain: Option<String>,
    pub wait_until: Option<String>,
    pub navigation_timeout_secs: Option<u64>,
    pub accept_invalid_certs: Option<bool>,
    pub name_source: Option<String>,
    pub document_source: Option<String>,
    pub include_unlabeled: Option<bool>,
    pub reload_after_cookies: Option<bool>,
    pub asset_base_url: Option<String>,
}

impl Profile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read profile {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid profile {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }
}

/// Cookies injected into the browsing context before the first navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieConfig {
    pub credentials: Vec<SessionCredential>,
    pub domain: String,
}

impl CookieConfig {
    pub fn names(&self) -> Vec<&str> {
        self.credentials.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Fully resolved, validated settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub target_url: Url,
    pub source_selector: String,
    pub pattern: MatchPattern,
    pub output_dir: PathBuf,
    pub report_dir: PathBuf,
    pub mode: ExportMode,
    pub target_element: Option<String>,
    pub cookies: Option<CookieConfig>,
    pub wait_until: WaitUntil,
    pub navigation_timeout: Duration,
    pub accept_invalid_certs: bool,
    pub name_source: NameSource,
    pub document_source: DocumentSource,
    pub include_unlabeled: bool,
    pub reload_after_cookies: bool,
    pub asset_base_url: Option<Url>,
    pub chromium: Option<PathBuf>,
    pub no_sandbox: bool,
}

impl Settings {
    /// Reads the profile named by `--profile`, if any, and resolves.
    pub fn load(cli: Cli) -> Result<Self> {
        let profile = match &cli.profile {
            Some(path) => Profile::load(path)?,
            None => Profile::default(),
        };
        let legacy_selector = std::env::var(LEGACY_SELECTOR_ENV).ok();
        Self::from_sources(cli, profile, legacy_selector)
    }

    pub fn from_sources(
        cli: Cli,
        profile: Profile,
        legacy_selector: Option<String>,
    ) -> Result<Self> {
        let target_url = required(
            pick(cli.target_url, profile.target_url),
            "target_url",
            "--target-url or TARGET_URL",
        )?;
        let target_url = Url::parse(&target_url)
            .with_context(|| format!("invalid target_url '{target_url}'"))?;

        let source_selector = required(
            non_blank(cli.source_selector)
                .or(non_blank(legacy_selector))
                .or(non_blank(profile.source_selector)),
            "source_selector",
            "--source-selector or SOURCE_SELECTOR",
        )?;

        let pattern = MatchPattern::new(
            cli.match_pattern
                .or(profile.match_pattern)
                .unwrap_or_default(),
        )?;

        let output_dir = required(
            cli.output_dir.or(profile.output_dir),
            "output_dir",
            "--output-dir or OUTPUT_DIR",
        )?;
        let report_dir = required(
            cli.report_dir.or(profile.report_dir),
            "report_dir",
            "--report-dir or REPORT_DIR",
        )?;

        let mode = layered(cli.mode, profile.mode, "mode")?.unwrap_or_default();
        let name_source = layered(cli.name_source, profile.name_source, "name_source")?
            .unwrap_or_else(|| NameSource::default_for(mode));
        let wait_until =
            layered(cli.wait_until, profile.wait_until, "wait_until")?.unwrap_or_default();
        let document_source = match cli.document_source {
            Some(source) => source,
            None => match non_blank(profile.document_source) {
                Some(raw) => <DocumentSource as ValueEnum>::from_str(&raw, true)
                    .map_err(|err| anyhow::anyhow!("invalid document_source in profile: {err}"))?,
                None => DocumentSource::default(),
            },
        };

        let target_element = pick(cli.target_element, profile.target_element);
        if target_element.is_some() && mode == ExportMode::Fetch {
            export_warn!("target_element only applies in pdf mode; ignoring it");
        }

        let cookies = cookie_config(
            pick(cli.cookie_names, profile.cookie_names),
            non_blank(cli.cookie_values),
            pick(cli.cookie_domain, profile.cookie_domain),
        );

        let asset_base_url = pick(cli.asset_base_url, profile.asset_base_url)
            .map(|raw| Url::parse(&raw).with_context(|| format!("invalid asset_base_url '{raw}'")))
            .transpose()?;

        let timeout_secs = cli
            .navigation_timeout_secs
            .or(profile.navigation_timeout_secs)
            .unwrap_or(DEFAULT_NAVIGATION_TIMEOUT_SECS);

        Ok(Self {
            target_url,
            source_selector,
            pattern,
            output_dir,
            report_dir,
            mode,
            target_element: target_element.filter(|_| mode == ExportMode::Pdf),
            cookies,
            wait_until,
            navigation_timeout: Duration::from_secs(timeout_secs),
            accept_invalid_certs: cli
                .accept_invalid_certs
                .or(profile.accept_invalid_certs)
                .unwrap_or(false),
            name_source,
            document_source,
            include_unlabeled: cli
                .include_unlabeled
                .or(profile.include_unlabeled)
                .unwrap_or(false),
            reload_after_cookies: cli
                .reload_after_cookies
                .or(profile.reload_after_cookies)
                .unwrap_or(true),
            asset_base_url,
            chromium: cli.chromium,
            no_sandbox: cli.no_sandbox,
        })
    }

    /// Chromium is needed to read the listing page or to print PDFs.
    pub fn needs_browser(&self) -> bool {
        self.document_source == DocumentSource::Browser || self.mode == ExportMode::Pdf
    }
}

/// Splits on runs of commas and whitespace.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn cookie_config(
    names: Option<String>,
    values: Option<String>,
    domain: Option<String>,
) -> Option<CookieConfig> {
    let (names, values, domain) = match (names, values, domain) {
        (Some(names), Some(values), Some(domain)) => {
            (split_list(&names), split_list(&values), domain)
        }
        (None, None, None) => return None,
        _ => {
            export_warn!(
                "Cookie injection needs COOKIE_NAMES, COOKIE_VALUES and COOKIE_DOMAIN; ignoring partial cookie settings"
            );
            return None;
        }
    };
    if names.len() != values.len() {
        export_warn!(
            "{} cookie name(s) but {} value(s); unpaired entries are ignored",
            names.len(),
            values.len()
        );
    }
    let credentials: Vec<SessionCredential> = names
        .into_iter()
        .zip(values)
        .map(|(name, value)| SessionCredential::new(name, value))
        .collect();
    if credentials.is_empty() {
        return None;
    }
    Some(CookieConfig {
        credentials,
        domain: domain.trim().to_string(),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn pick(cli: Option<String>, profile: Option<String>) -> Option<String> {
    non_blank(cli).or(non_blank(profile))
}

fn required<T>(value: Option<T>, name: &str, hint: &str) -> Result<T> {
    value.with_context(|| format!("missing required setting `{name}` ({hint})"))
}

/// A typed flag or environment value, else the profile's text parsed.
fn layered<T>(cli: Option<T>, profile: Option<String>, field: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if cli.is_some() {
        return Ok(cli);
    }
    non_blank(profile)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("invalid {field} in profile"))
        })
        .transpose()
}
