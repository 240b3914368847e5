pub mod config;
pub mod delivery;
pub mod digest;
pub mod enrich;
pub mod extract;
pub mod fetch;
pub mod ingest;
pub mod llm;
pub mod parser;
pub mod registry;
pub mod runner;
pub mod store;
pub mod types;

pub use config::Config;
pub use delivery::{Deliver, SendGridMailer, StdoutDelivery};
pub use digest::DigestAssembler;
pub use enrich::{EnrichReport, EnrichmentPipeline};
pub use extract::{ContentExtractor, HtmlExtractor};
pub use fetch::Fetcher;
pub use ingest::{FetchCandidates, IngestReport, Orchestrator, SourceFetcher};
pub use llm::{Analyzer, MockAnalyzer, OfflineAnalyzer, OpenAiAnalyzer};
pub use registry::SourceRegistry;
pub use runner::run_once;
pub use store::Store;
pub use types::*;
