// One portal's crawl: warm-up, location resolution, pagination, details
use crate::crawler::location::{LocationResolver, LocationToken};
use crate::crawler::paginator::Paginator;
use crate::crawler::traits::{HtmlSink, PageFetcher};
use crate::model::{
    CanonicalProperty, Channel, CrawlError, ParserError, Portal, RawDetailRecord, RawListingRecord, RequestKind,
};
use crate::normalizer::Normalizer;
use crate::parser::DetailExtractor;
use futures::StreamExt;
use std::pin::pin;
use tracing::{info, warn};

/// Everything collected for one location.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub location: String,
    pub token: LocationToken,
    pub raw: Vec<RawDetailRecord>,
    pub properties: Vec<CanonicalProperty>,
    pub skipped: usize,
    pub duplicates: usize,
    pub pages_fetched: usize,
    pub details_fetched: usize,
}

pub struct CrawlSession<F: PageFetcher, S: HtmlSink> {
    fetcher: F,
    sink: S,
    portal: Portal,
    channel: Channel,
    pages: usize,
    detail_quota: usize,
    resolver: LocationResolver,
    details: DetailExtractor,
    normalizer: Normalizer,
    warmed_up: bool,
}

impl<F: PageFetcher, S: HtmlSink> CrawlSession<F, S> {
    pub fn new(
        fetcher: F,
        sink: S,
        portal: Portal,
        channel: Channel,
        pages: usize,
        detail_quota: usize,
        strict_resolution: bool,
    ) -> Result<Self, ParserError> {
        Ok(Self {
            fetcher,
            sink,
            portal,
            channel,
            pages,
            detail_quota,
            resolver: LocationResolver::new(portal, channel, strict_resolution)?,
            details: DetailExtractor::new()?,
            normalizer: Normalizer::new()?,
            warmed_up: false,
        })
    }

    /// Visits the home page once so later requests carry session cookies.
    /// A failure is logged and the crawl continues without them.
    async fn warm_up(&mut self) {
        if self.warmed_up {
            return;
        }
        self.warmed_up = true;
        let home = self.portal.home_url();
        info!("Visiting {} to establish a session", home);
        match self.fetcher.fetch(&home, RequestKind::Warmup).await {
            Ok(page) => info!("Session established (HTTP {})", page.status),
            Err(e) => warn!("Warm-up request failed, continuing without cookies: {}", e),
        }
    }

    pub async fn run(&mut self, location: &str) -> Result<CrawlOutcome, CrawlError> {
        self.warm_up().await;

        let token = self.resolver.resolve(&mut self.fetcher, location).await?;
        info!("Crawling {} for '{}' with token {} ({:?})", self.portal, location, token.value, token.source);

        let mut paginator = Paginator::new(self.portal, self.channel, &token.value, self.pages)?;
        let mut listings: Vec<RawListingRecord> = Vec::new();
        {
            let mut pages = pin!(paginator.pages(&mut self.fetcher, &mut self.sink));
            while let Some(batch) = pages.next().await {
                listings.extend(batch);
            }
        }

        if listings.is_empty() {
            warn!(
                "No properties found for '{}' on {}. The site may be blocking requests or the layout changed.",
                location, self.portal
            );
        } else {
            info!(
                "Collected {} unique listings for '{}' ({} duplicates skipped)",
                paginator.unique_listings(),
                location,
                paginator.duplicates()
            );
        }

        let (raw, details_fetched) = self.fetch_details(listings).await;
        let report = self.normalizer.normalize_all(&raw, self.channel);

        Ok(CrawlOutcome {
            location: location.to_string(),
            token,
            raw,
            properties: report.properties,
            skipped: report.skipped,
            duplicates: paginator.duplicates(),
            pages_fetched: paginator.pages_fetched(),
            details_fetched,
        })
    }

    /// Enriches the first `detail_quota` listings with their detail pages.
    /// A failed detail fetch keeps the search-card data.
    async fn fetch_details(&mut self, listings: Vec<RawListingRecord>) -> (Vec<RawDetailRecord>, usize) {
        let mut records = Vec::with_capacity(listings.len());
        let mut fetched = 0;
        let total = listings.len().min(self.detail_quota);

        for (i, listing) in listings.into_iter().enumerate() {
            if i >= self.detail_quota {
                records.push(RawDetailRecord::from(listing));
                continue;
            }

            info!("Fetching details for property {}/{}: {}", i + 1, total, listing.url);
            match self.fetcher.fetch(&listing.url, RequestKind::Detail).await {
                Ok(page) => {
                    let id = listing.listing_id.as_deref().unwrap_or("unknown");
                    self.sink.capture(&format!("{}_property_{}", self.portal, id), &page.body);
                    let detail = self.details.extract(&page.body, &listing.url, self.portal);
                    records.push(self.details.merge(listing, detail));
                    fetched += 1;
                }
                Err(e) => {
                    warn!("Error fetching property details for {}: {}", listing.url, e);
                    records.push(RawDetailRecord::from(listing));
                }
            }
        }
        (records, fetched)
    }

    #[cfg(test)]
    fn parts(&self) -> (&F, &S) {
        (&self.fetcher, &self.sink)
    }
}
