pub mod fetcher;
pub mod identity;
pub mod location;
pub mod paginator;
pub mod portal;
pub mod proxy;
pub mod session;
#[cfg(test)]
pub mod testing;
pub mod traits;

pub use fetcher::Transport;
pub use proxy::ProxyPool;
pub use session::{CrawlOutcome, CrawlSession};
pub use traits::HtmlSink;
