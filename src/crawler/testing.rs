// In-memory fetcher serving canned pages for tests
use crate::crawler::traits::{HtmlSink, PageFetcher};
use crate::model::{FetchedPage, RequestKind, TransportError};

enum Route {
    Page { final_url: Option<String>, body: String },
    Status(u16),
}

/// Routes are matched in insertion order by substring of the requested URL.
/// Unmatched URLs answer 404.
#[derive(Default)]
pub struct FixtureFetcher {
    routes: Vec<(String, Route)>,
    pub requests: Vec<(String, RequestKind)>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, needle: &str, body: &str) -> Self {
        self.routes.push((needle.to_string(), Route::Page { final_url: None, body: body.to_string() }));
        self
    }

    pub fn with_redirect(mut self, needle: &str, final_url: &str) -> Self {
        self.routes.push((
            needle.to_string(),
            Route::Page { final_url: Some(final_url.to_string()), body: String::new() },
        ));
        self
    }

    pub fn with_status(mut self, needle: &str, status: u16) -> Self {
        self.routes.push((needle.to_string(), Route::Status(status)));
        self
    }

    pub fn count(&self, kind: RequestKind) -> usize {
        self.requests.iter().filter(|(_, k)| *k == kind).count()
    }
}

#[async_trait::async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&mut self, url: &str, kind: RequestKind) -> Result<FetchedPage, TransportError> {
        self.requests.push((url.to_string(), kind));
        let route = self.routes.iter().find(|(needle, _)| url.contains(needle.as_str()));
        match route {
            Some((_, Route::Page { final_url, body })) => Ok(FetchedPage {
                url: final_url.clone().unwrap_or_else(|| url.to_string()),
                status: 200,
                body: body.clone(),
            }),
            Some((_, Route::Status(status))) => Err(TransportError::HttpStatus { url: url.to_string(), status: *status }),
            None => Err(TransportError::HttpStatus { url: url.to_string(), status: 404 }),
        }
    }
}

/// Sink that remembers the labels it was handed.
#[derive(Default)]
pub struct RecordingSink {
    pub labels: Vec<String>,
}

impl HtmlSink for RecordingSink {
    fn capture(&mut self, label: &str, _html: &str) {
        self.labels.push(label.to_string());
    }
}
