// Walks search result pages for one location, deduplicating listings
use crate::crawler::traits::{HtmlSink, PageFetcher};
use crate::model::{Channel, ParserError, Portal, RawListingRecord, RequestKind, TransportError};
use crate::parser::ListingExtractor;
use crate::utils::NumberParser;
use futures::stream::{self, Stream};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Listing URLs and ids already collected in this session.
#[derive(Debug, Default)]
pub struct SeenListings {
    urls: HashSet<String>,
    ids: HashSet<String>,
}

impl SeenListings {
    /// Records the listing and returns `true` if neither its URL nor its id
    /// was seen before.
    pub fn insert(&mut self, record: &RawListingRecord) -> bool {
        let id_seen = record.listing_id.as_ref().is_some_and(|id| self.ids.contains(id));
        if id_seen || self.urls.contains(&record.url) {
            return false;
        }
        self.urls.insert(record.url.clone());
        if let Some(id) = &record.listing_id {
            self.ids.insert(id.clone());
        }
        true
    }

    pub fn count(&self) -> usize {
        self.urls.len()
    }
}

/// What one search page contributed.
#[derive(Debug, Default)]
pub struct PageIngest {
    pub cards: usize,
    pub duplicates: usize,
    pub records: Vec<RawListingRecord>,
}

pub struct Paginator {
    portal: Portal,
    channel: Channel,
    token: String,
    max_pages: usize,
    next_index: usize,
    finished: bool,
    extractor: ListingExtractor,
    numbers: NumberParser,
    seen: SeenListings,
    duplicates: usize,
    pages_fetched: usize,
}

impl Paginator {
    pub fn new(portal: Portal, channel: Channel, token: &str, max_pages: usize) -> Result<Self, ParserError> {
        Ok(Self {
            portal,
            channel,
            token: token.to_string(),
            max_pages,
            next_index: 0,
            finished: false,
            extractor: ListingExtractor::new(portal)?,
            numbers: NumberParser::new()?,
            seen: SeenListings::default(),
            duplicates: 0,
            pages_fetched: 0,
        })
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn unique_listings(&self) -> usize {
        self.seen.count()
    }

    /// Parses one search page and keeps only listings not seen before.
    /// Prices are normalized to plain digits.
    pub fn ingest(&mut self, html: &str) -> PageIngest {
        let parse = self.extractor.extract(html);
        let mut ingest = PageIngest {
            cards: parse.cards,
            ..PageIngest::default()
        };

        for mut record in parse.records {
            if !self.seen.insert(&record) {
                debug!("Skipping duplicate listing {}", record.url);
                ingest.duplicates += 1;
                continue;
            }
            record.price = record.price.as_deref().and_then(|p| self.numbers.normalize_price(p));
            ingest.records.push(record);
        }

        self.duplicates += ingest.duplicates;
        ingest
    }

    /// Fetches pages until one yields new listings. Returns `None` once the
    /// page budget is spent, a page adds nothing new, or the portal serves a
    /// captcha instead of results.
    pub async fn next_page<F: PageFetcher + ?Sized>(
        &mut self,
        fetcher: &mut F,
        sink: &mut dyn HtmlSink,
    ) -> Option<Vec<RawListingRecord>> {
        while !self.finished && self.next_index < self.max_pages {
            let index = self.next_index;
            self.next_index += 1;

            info!("Fetching {} search page {}/{}", self.portal, index + 1, self.max_pages);
            let Some(body) = self.fetch_page(fetcher, index).await else {
                continue;
            };
            self.pages_fetched += 1;
            sink.capture(&format!("{}_search_page_{}", self.portal, index + 1), &body);

            let ingest = self.ingest(&body);
            if ingest.cards == 0 {
                if body.to_lowercase().contains("captcha") {
                    warn!("{} served a captcha on page {}, stopping", self.portal, index + 1);
                    self.finished = true;
                    return None;
                }
                warn!("No listings found on page {}, skipping", index + 1);
                continue;
            }

            if ingest.records.is_empty() {
                info!(
                    "No new listings on page {} ({} duplicates), reached end of results",
                    index + 1,
                    ingest.duplicates
                );
                self.finished = true;
                return None;
            }

            info!(
                "Page {}: {} new listings, {} duplicates (page size {})",
                index + 1,
                ingest.records.len(),
                ingest.duplicates,
                self.portal.page_size()
            );
            return Some(ingest.records);
        }

        self.finished = true;
        None
    }

    /// All remaining pages as a lazy stream of per-page batches.
    pub fn pages<'a, F: PageFetcher + ?Sized>(
        &'a mut self,
        fetcher: &'a mut F,
        sink: &'a mut dyn HtmlSink,
    ) -> impl Stream<Item = Vec<RawListingRecord>> + 'a {
        stream::unfold((self, fetcher, sink), |(paginator, fetcher, sink)| async move {
            let batch = paginator.next_page(&mut *fetcher, &mut *sink).await?;
            Some((batch, (paginator, fetcher, sink)))
        })
    }

    /// Primary search URL, then the alternate form once if the primary is
    /// refused with an HTTP status.
    async fn fetch_page<F: PageFetcher + ?Sized>(&self, fetcher: &mut F, index: usize) -> Option<String> {
        let primary = self.portal.search_url(&self.token, index, self.channel, false);
        match fetcher.fetch(&primary, RequestKind::Search).await {
            Ok(page) => return Some(page.body),
            Err(TransportError::HttpStatus { status, .. }) => {
                warn!("Search page returned HTTP {}, trying alternate URL", status);
            }
            Err(e) => {
                warn!("Failed to fetch page {}: {}", index + 1, e);
                return None;
            }
        }

        let alternate = self.portal.search_url(&self.token, index, self.channel, true);
        match fetcher.fetch(&alternate, RequestKind::Search).await {
            Ok(page) => Some(page.body),
            Err(e) => {
                warn!("Alternate URL failed for page {}: {}", index + 1, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::testing::{FixtureFetcher, RecordingSink};
    use futures::StreamExt;

    const TOKEN: &str = "REGION%5E787";

    const PAGE: &str = r#"
<html><body>
  <div class="propertyCard">
    <a class="propertyCard-link" href="/properties/111#/"></a>
    <div class="propertyCard-priceValue">£250,000</div>
  </div>
  <div class="propertyCard">
    <a class="propertyCard-link" href="/properties/222#/"></a>
    <div class="propertyCard-priceValue">POA</div>
  </div>
</body></html>"#;

    fn paginator(max_pages: usize) -> Paginator {
        Paginator::new(Portal::Rightmove, Channel::Sale, TOKEN, max_pages).unwrap()
    }

    #[test]
    fn test_same_page_twice_yields_nothing_new() {
        let mut p = paginator(5);
        let first = p.ingest(PAGE);
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.records[0].price.as_deref(), Some("250000"));
        assert_eq!(first.records[1].price, None);

        let second = p.ingest(PAGE);
        assert!(second.records.is_empty());
        assert_eq!(second.duplicates, 2);
        assert_eq!(p.duplicates(), 2);
        assert_eq!(p.unique_listings(), 2);
    }

    #[test]
    fn test_same_id_under_different_url_is_duplicate() {
        let mut seen = SeenListings::default();
        let mut a = RawListingRecord::new(Portal::Rightmove, "https://www.rightmove.co.uk/properties/111#/");
        a.listing_id = Some("111".into());
        let mut b = RawListingRecord::new(Portal::Rightmove, "https://www.rightmove.co.uk/properties/111?channel=RES_BUY");
        b.listing_id = Some("111".into());
        assert!(seen.insert(&a));
        assert!(!seen.insert(&b));
    }

    #[tokio::test]
    async fn test_stops_early_when_page_adds_nothing() {
        let mut p = paginator(5);
        let mut fetcher = FixtureFetcher::new()
            .with_page("index=0&", PAGE)
            .with_page("index=24&", PAGE);
        let mut sink = RecordingSink::default();

        let batches: Vec<_> = p.pages(&mut fetcher, &mut sink).collect().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(fetcher.count(RequestKind::Search), 2);
        assert_eq!(sink.labels, vec!["rightmove_search_page_1", "rightmove_search_page_2"]);
        assert_eq!(p.duplicates(), 2);
    }

    #[tokio::test]
    async fn test_alternate_url_after_refusal() {
        let mut p = paginator(1);
        let mut fetcher = FixtureFetcher::new()
            .with_status("searchType=SALE", 403)
            .with_page("?locationIdentifier=", PAGE);
        let mut sink = RecordingSink::default();

        let batch = p.next_page(&mut fetcher, &mut sink).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(fetcher.requests.len(), 2);
        assert!(fetcher.requests[1].0.ends_with("find.html?locationIdentifier=REGION%5E787&index=0"));
    }

    #[tokio::test]
    async fn test_page_without_cards_is_skipped() {
        let mut p = paginator(3);
        let mut fetcher = FixtureFetcher::new()
            .with_page("index=0&", "<html><body><p>Something went wrong</p></body></html>")
            .with_page("index=24&", PAGE);
        let mut sink = RecordingSink::default();

        let batches: Vec<_> = p.pages(&mut fetcher, &mut sink).collect().await;
        assert_eq!(batches.len(), 1);
        // third page is a 404 on both URL forms
        assert_eq!(fetcher.count(RequestKind::Search), 4);
        assert_eq!(p.pages_fetched(), 2);
    }

    #[tokio::test]
    async fn test_captcha_stops_pagination() {
        let mut p = paginator(3);
        let mut fetcher = FixtureFetcher::new().with_page("find.html", "<html><body>Complete the CAPTCHA to continue</body></html>");
        let mut sink = RecordingSink::default();

        assert!(p.next_page(&mut fetcher, &mut sink).await.is_none());
        assert!(p.next_page(&mut fetcher, &mut sink).await.is_none());
        assert_eq!(fetcher.count(RequestKind::Search), 1);
    }
}
