//! Export engine: extraction, fetching, PDF rendering, ledger and the run loop.
pub mod browser;
mod decode;
mod extract;
mod fetch;
mod ledger;
mod orchestrator;
mod pdf;
mod persist;
mod types;

pub use browser::chromium::{find_chromium, ChromiumRenderer, LaunchOptions};
pub use browser::{CookieSpec, PdfOptions, RenderPage, Renderer};
pub use decode::{decode_page, DecodedPage};
pub use extract::{extraction_script, BrowserDocument, DocumentQuery, StaticDocument};
pub use fetch::{FetchSettings, FetchedPage, ReqwestFetcher, ResourceFetcher};
pub use ledger::{row_fields, Ledger, LedgerError, LEDGER_FILE_NAME, LEDGER_HEADER};
pub use orchestrator::{Dispatcher, Orchestrator, RunReport};
pub use pdf::{standalone_document, PageExporter, PdfExportOptions, PdfExporter};
pub use persist::{ensure_output_dir, write_atomically, PersistError};
pub use types::{ExportError, FailureKind};
