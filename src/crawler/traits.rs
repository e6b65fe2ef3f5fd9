use crate::model::{FetchedPage, RequestKind, TransportError};

/// Anything that can fetch a page for the crawl: the real rate-limited
/// transport, or an in-memory fixture server in tests.
#[async_trait::async_trait]
pub trait PageFetcher: Send {
    async fn fetch(&mut self, url: &str, kind: RequestKind) -> Result<FetchedPage, TransportError>;
}

/// Receives every fetched body before it is parsed.
pub trait HtmlSink: Send {
    fn capture(&mut self, label: &str, html: &str);
}
