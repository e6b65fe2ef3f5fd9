use crate::analyzer::MarketAnalyzer;
use crate::model::{
    AgentBlock, CanonicalProperty, Channel, Coordinates, ParserError, PropertyDetails, RawDetailRecord,
};
use crate::utils::{NumberParser, clean_text};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Canonical properties plus the number of records that failed the gate.
#[derive(Debug, Default)]
pub struct NormalizeReport {
    pub properties: Vec<CanonicalProperty>,
    pub skipped: usize,
}

pub struct Normalizer {
    numbers: NumberParser,
}

impl Normalizer {
    pub fn new() -> Result<Self, ParserError> {
        Ok(Self { numbers: NumberParser::new()? })
    }

    pub fn normalize_all(&self, records: &[RawDetailRecord], channel: Channel) -> NormalizeReport {
        let scraped_at = Utc::now();
        let mut report = NormalizeReport::default();
        for record in records {
            match self.normalize(record, channel, scraped_at) {
                Some(property) => report.properties.push(property),
                None => report.skipped += 1,
            }
        }
        info!(
            "Normalized {} properties, skipped {} incomplete records",
            report.properties.len(),
            report.skipped
        );
        report
    }

    /// Emits a property only when the record has a listing id, an address and a
    /// price above zero. Optional values that do not parse are left out.
    pub fn normalize(
        &self,
        record: &RawDetailRecord,
        channel: Channel,
        scraped_at: DateTime<Utc>,
    ) -> Option<CanonicalProperty> {
        let listing = &record.listing;

        let Some(listing_id) = non_empty(listing.listing_id.as_deref()) else {
            debug!("Skipping {}: no listing id", listing.url);
            return None;
        };
        let Some(address) = non_empty(listing.address.as_deref()) else {
            debug!("Skipping {}: no address", listing.url);
            return None;
        };
        let price = match listing.price.as_deref().and_then(|p| self.numbers.parse_price(p)) {
            Some(p) if p > 0 => p,
            _ => {
                debug!("Skipping {}: no usable price ({:?})", listing.url, listing.price);
                return None;
            }
        };

        let description = non_empty(listing.description.as_deref()).or_else(|| {
            let joined = record.description_paragraphs.join("\n\n");
            if joined.is_empty() { None } else { Some(joined) }
        });

        let details = self.property_details(record, price);

        Some(CanonicalProperty {
            id: format!("{}-{}", listing.portal, listing_id),
            source: listing.portal,
            url: listing.url.clone(),
            address,
            price,
            listing_type: channel.listing_type().to_string(),
            bedrooms: listing.bedrooms.as_deref().and_then(parse_count),
            bathrooms: listing.bathrooms.as_deref().and_then(parse_count),
            floor_area_sqft: listing.floor_area.as_deref().and_then(|a| self.numbers.parse_area_sqft(a)),
            image_url: record.images.first().cloned(),
            property_type: non_empty(listing.property_type.as_deref()),
            description,
            coordinates: coordinates(record),
            agent: agent(record),
            details: if details.is_empty() { None } else { Some(details) },
            scraped_at,
        })
    }

    fn property_details(&self, record: &RawDetailRecord, price: u64) -> PropertyDetails {
        let stats = record.market_stats.as_ref();
        PropertyDetails {
            tenure: non_empty(record.tenure.as_deref()),
            lease_years_remaining: record.lease_years_remaining.as_deref().and_then(leading_number),
            energy_rating: non_empty(record.energy_rating.as_deref()),
            council_tax_band: non_empty(record.council_tax_band.as_deref()),
            features: if record.features.is_empty() { None } else { Some(record.features.clone()) },
            nearby_schools: if record.points_of_interest.is_empty() {
                None
            } else {
                Some(MarketAnalyzer::nearby_school_count(&record.points_of_interest))
            },
            market_demand: stats
                .and_then(|s| s.sold_last_12_months)
                .map(MarketAnalyzer::market_demand),
            area_growth: stats
                .and_then(|s| s.average_price.as_deref())
                .and_then(|p| self.numbers.parse_price(p))
                .and_then(|average| MarketAnalyzer::area_growth(price, average)),
        }
    }
}

/// Agent block only when both a name and a phone number are known.
fn agent(record: &RawDetailRecord) -> Option<AgentBlock> {
    let contact = record.agent_contact.as_ref();
    let name = contact
        .and_then(|c| non_empty(c.name.as_deref()))
        .or_else(|| non_empty(record.listing.agent.as_deref()))?;
    let phone = contact.and_then(|c| non_empty(c.phone.as_deref()))?;
    Some(AgentBlock { name, phone })
}

fn coordinates(record: &RawDetailRecord) -> Option<Coordinates> {
    let latitude: f64 = record.latitude.as_deref()?.trim().parse().ok()?;
    let longitude: f64 = record.longitude.as_deref()?.trim().parse().ok()?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }
    Some(Coordinates { latitude, longitude })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    let cleaned = clean_text(value?);
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

fn parse_count(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

/// "95 years" -> 95
fn leading_number(value: &str) -> Option<u32> {
    let digits: String = value.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AgentContact, MarketStats, PoiKind, PointOfInterest, Portal, RawListingRecord};

    fn record(id: Option<&str>, address: Option<&str>, price: Option<&str>) -> RawDetailRecord {
        let mut listing = RawListingRecord::new(Portal::Rightmove, "https://www.rightmove.co.uk/properties/1");
        listing.listing_id = id.map(String::from);
        listing.address = address.map(String::from);
        listing.price = price.map(String::from);
        RawDetailRecord::from(listing)
    }

    fn run(record: &RawDetailRecord) -> Option<CanonicalProperty> {
        Normalizer::new().unwrap().normalize(record, Channel::Sale, Utc::now())
    }

    #[test]
    fn test_gate_accepts_complete_record() {
        let property = run(&record(Some("1"), Some("1 High Street"), Some("250,000"))).unwrap();
        assert_eq!(property.price, 250000);
        assert_eq!(property.id, "rightmove-1");
        assert_eq!(property.listing_type, "for-sale");
    }

    #[test]
    fn test_gate_rejects_zero_price_and_missing_id() {
        assert!(run(&record(Some("1"), Some("1 High Street"), Some("0"))).is_none());
        assert!(run(&record(None, Some("1 High Street"), Some("250,000"))).is_none());
        assert!(run(&record(Some("1"), Some("  "), Some("250,000"))).is_none());
        assert!(run(&record(Some("1"), Some("1 High Street"), Some("POA"))).is_none());
    }

    #[test]
    fn test_agent_all_or_nothing() {
        let mut name_only = record(Some("1"), Some("1 High Street"), Some("250000"));
        name_only.agent_contact = Some(AgentContact {
            name: Some("Acme Estates".into()),
            ..AgentContact::default()
        });
        assert!(run(&name_only).unwrap().agent.is_none());

        let mut both = name_only.clone();
        both.agent_contact = Some(AgentContact {
            name: Some("Acme Estates".into()),
            phone: Some("020 7123 4567".into()),
            logo: None,
        });
        let agent = run(&both).unwrap().agent.unwrap();
        assert_eq!(agent.name, "Acme Estates");
        assert_eq!(agent.phone, "020 7123 4567");
    }

    #[test]
    fn test_no_empty_details_block() {
        let property = run(&record(Some("1"), Some("1 High Street"), Some("250000"))).unwrap();
        assert!(property.details.is_none());
        let json = serde_json::to_value(&property).unwrap();
        assert!(json.get("details").is_none());
        assert!(json.get("agent").is_none());
    }

    #[test]
    fn test_details_and_numeric_fields() {
        let mut r = record(Some("1"), Some("1 High Street"), Some("300000"));
        r.listing.bedrooms = Some("3".into());
        r.listing.bathrooms = Some("two".into());
        r.listing.floor_area = Some("1000sq. ft".into());
        r.latitude = Some("51.5".into());
        r.longitude = Some("not-a-number".into());
        r.tenure = Some("Leasehold (95 years)".into());
        r.lease_years_remaining = Some("95 years".into());
        r.points_of_interest = vec![PointOfInterest {
            kind: PoiKind::School,
            name: "Park School".into(),
            distance: "0.2 miles".into(),
        }];
        r.market_stats = Some(MarketStats {
            average_price: Some("£350,000".into()),
            sold_last_12_months: Some(14),
            ..MarketStats::default()
        });

        let property = run(&r).unwrap();
        assert_eq!(property.bedrooms, Some(3));
        assert_eq!(property.bathrooms, None);
        assert_eq!(property.floor_area_sqft, Some(1000.0));
        assert!(property.coordinates.is_none());

        let details = property.details.unwrap();
        assert_eq!(details.lease_years_remaining, Some(95));
        assert_eq!(details.nearby_schools, Some(1));
        assert_eq!(details.market_demand.as_deref(), Some("High (14 properties sold)"));
        assert_eq!(details.area_growth.as_deref(), Some("14.3% below"));
    }

    #[test]
    fn test_normalize_all_counts_skipped() {
        let records = vec![
            record(Some("1"), Some("A"), Some("100000")),
            record(Some("2"), None, Some("100000")),
            record(Some("3"), Some("C"), None),
        ];
        let report = Normalizer::new().unwrap().normalize_all(&records, Channel::Rent);
        assert_eq!(report.properties.len(), 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.properties[0].listing_type, "to-rent");
    }
}
