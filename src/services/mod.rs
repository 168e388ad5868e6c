pub mod analysis;
pub mod extract;
pub mod scraper;
pub mod session;
pub mod signature;

pub use analysis::{AnalysisStage, OpenAiGenerator, TextGenerator};
pub use extract::DocumentExtractor;
pub use scraper::{CaseScraper, ScrapeOutcome};
pub use session::SessionClient;
