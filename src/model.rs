// Core structs: raw listing/detail records, canonical property, errors
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Portal {
    Rightmove,
    Zoopla,
}

impl Portal {
    pub fn key(&self) -> &'static str {
        match self {
            Portal::Rightmove => "rightmove",
            Portal::Zoopla => "zoopla",
        }
    }
}

impl fmt::Display for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Which search section of a portal is crawled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Sale,
    Rent,
}

impl Channel {
    pub fn listing_type(&self) -> &'static str {
        match self {
            Channel::Sale => "for-sale",
            Channel::Rent => "to-rent",
        }
    }
}

/// One search-result card. Everything but `url` may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListingRecord {
    pub portal: Portal,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_added: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_area: Option<String>,
}

impl RawListingRecord {
    pub fn new(portal: Portal, url: impl Into<String>) -> Self {
        Self {
            portal,
            url: url.into(),
            listing_id: None,
            price: None,
            address: None,
            bedrooms: None,
            bathrooms: None,
            property_type: None,
            description: None,
            agent: None,
            date_added: None,
            floor_area: None,
        }
    }

    /// Copies every field of `other` that is present over `self`.
    pub fn overlay(&mut self, other: RawListingRecord) {
        fn take(slot: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.listing_id, other.listing_id);
        take(&mut self.price, other.price);
        take(&mut self.address, other.address);
        take(&mut self.bedrooms, other.bedrooms);
        take(&mut self.bathrooms, other.bathrooms);
        take(&mut self.property_type, other.property_type);
        take(&mut self.description, other.description);
        take(&mut self.agent, other.agent);
        take(&mut self.date_added, other.date_added);
        take(&mut self.floor_area, other.floor_area);
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentContact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimilarListing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoiKind {
    School,
    Station,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub kind: PoiKind,
    pub name: String,
    pub distance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub event_type: String,
    pub date: String,
    pub price: String,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComparableSale {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketStats {
    /// "£350,000"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_price: Option<String>,
    /// Properties sold in the last 12 months.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sold_last_12_months: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub recent_sales: Vec<ComparableSale>,
    /// "£1,250 pcm"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_rent: Option<String>,
}

impl MarketStats {
    pub fn is_empty(&self) -> bool {
        self.average_price.is_none()
            && self.sold_last_12_months.is_none()
            && self.recent_sales.is_empty()
            && self.average_rent.is_none()
    }
}

/// Listing summary enriched with the detail page. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetailRecord {
    #[serde(flatten)]
    pub listing: RawListingRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_view_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_tour: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub description_paragraphs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub council_tax_band: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_years_remaining: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_charge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_rent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_contact: Option<AgentContact>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub similar_listings: Vec<SimilarListing>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub points_of_interest: Vec<PointOfInterest>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub floor_plans: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub listing_history: Vec<HistoryEvent>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub breadcrumbs: Vec<Breadcrumb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receptions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_stats: Option<MarketStats>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub additional_links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commonhold_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uprn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl From<RawListingRecord> for RawDetailRecord {
    fn from(listing: RawListingRecord) -> Self {
        Self {
            listing,
            title: None,
            latitude: None,
            longitude: None,
            map_url: None,
            street_view_url: None,
            virtual_tour: None,
            description_paragraphs: Vec::new(),
            features: Vec::new(),
            energy_rating: None,
            energy_certificate: None,
            council_tax_band: None,
            tenure: None,
            lease_years_remaining: None,
            service_charge: None,
            ground_rent: None,
            price_per_size: None,
            agent_contact: None,
            similar_listings: Vec::new(),
            points_of_interest: Vec::new(),
            images: Vec::new(),
            floor_plans: Vec::new(),
            listing_history: Vec::new(),
            breadcrumbs: Vec::new(),
            receptions: None,
            market_stats: None,
            additional_links: Vec::new(),
            availability: None,
            commonhold_details: None,
            uprn: None,
            currency: None,
            country_code: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBlock {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropertyDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_years_remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub council_tax_band: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearby_schools: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_demand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_growth: Option<String>,
}

impl PropertyDetails {
    pub fn is_empty(&self) -> bool {
        self.tenure.is_none()
            && self.lease_years_remaining.is_none()
            && self.energy_rating.is_none()
            && self.council_tax_band.is_none()
            && self.features.is_none()
            && self.nearby_schools.is_none()
            && self.market_demand.is_none()
            && self.area_growth.is_none()
    }
}

/// Normalized, cross-portal output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProperty {
    pub id: String,
    pub source: Portal,
    pub url: String,
    pub address: String,
    pub price: u64,
    pub listing_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_area_sqft: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<PropertyDetails>,
    pub scraped_at: DateTime<Utc>,
}

/// Body of a fetched page plus the URL it finally landed on.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Warmup,
    Resolve,
    Search,
    Detail,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout { .. } | TransportError::Network { .. } => true,
            TransportError::HttpStatus { status, .. } => is_retryable_status(*status),
            TransportError::Client(_) => false,
        }
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("empty location name")]
    EmptyPlace,
    #[error("could not resolve location '{place}' on {portal}")]
    Unresolved { place: String, portal: Portal },
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("invalid extraction rule: {0}")]
    HtmlParseError(String),
}

/// Ends the crawl of one location; other locations carry on.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Parser(#[from] ParserError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(String),
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::Csv(e.to_string())
    }
}
