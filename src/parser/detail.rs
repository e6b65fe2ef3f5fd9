//! Detail page -> `RawDetailRecord`.
//!
//! Roughly thirty independent rules run over one document. Each rule
//! yields an `Option`/`Vec`; an absent value is logged at trace level and
//! never stops the remaining rules. Labelled values ("Council Tax Band: D",
//! "Service charge £1,200 per annum") are located by scanning text nodes for
//! the label, then reading the value from the node or its parent element.

use crate::analyzer::MarketAnalyzer;
use crate::crawler::portal::ListingIds;
use crate::model::{
    AgentContact, Breadcrumb, ComparableSale, HistoryEvent, MarketStats, ParserError, PoiKind, PointOfInterest, Portal,
    RawDetailRecord, RawListingRecord, SimilarListing,
};
use crate::parser::rules::{FieldRule, attr, compile_selector, element_text, text};
use crate::utils::{NumberParser, absolutize, clean_text, compile_regex};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, trace};

const MAX_SIMILAR: usize = 5;
const MAX_POI_PER_KIND: usize = 5;
const MAX_IMAGES: usize = 16;
const MAX_RECENT_SALES: usize = 3;
const UNKNOWN_PRICE: &str = "Unknown";
const FULL_SIZE_SUFFIX: &str = "_max_1800x1800";

struct Patterns {
    latitude: Regex,
    longitude: Regex,
    virtual_tour: Regex,
    floor_area: Regex,
    council_tax_label: Regex,
    council_tax: Regex,
    tenure: Regex,
    years: Regex,
    lease_in_document: Regex,
    service_charge: Regex,
    ground_rent: Regex,
    money_per_period: Regex,
    first_listed: Regex,
    full_date: Regex,
    sold: Regex,
    pounds: Regex,
    sold_date: Regex,
    bedrooms: Regex,
    bathrooms: Regex,
    receptions: Regex,
    average_price: Regex,
    properties_sold_label: Regex,
    properties_sold: Regex,
    average_rent: Regex,
    rent_pcm: Regex,
    available_label: Regex,
    available_from: Regex,
    commonhold: Regex,
    uprn_label: Regex,
    uprn: Regex,
    thumbnail: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, ParserError> {
        Ok(Self {
            latitude: compile_regex(r#"latitude["\s:=]+(-?[0-9.]+)"#)?,
            longitude: compile_regex(r#"longitude["\s:=]+(-?[0-9.]+)"#)?,
            virtual_tour: compile_regex(r"(?i)virtual tour")?,
            floor_area: compile_regex(r"(?i)(\d[\d,.]*)\s*sq\.?\s*ft")?,
            council_tax_label: compile_regex(r"(?i)council tax band")?,
            council_tax: compile_regex(r"(?i:council tax band)\s*:?\s*([A-H])\b")?,
            tenure: compile_regex(r"(?i)\b(freehold|leasehold)\b")?,
            years: compile_regex(r"(?i)(\d+)\s*years")?,
            lease_in_document: compile_regex(r"(?i)leasehold\D{0,120}?(\d+)\s*years")?,
            service_charge: compile_regex(r"(?i)service charge")?,
            ground_rent: compile_regex(r"(?i)ground rent")?,
            money_per_period: compile_regex(r"(?i)£([\d,.]+)(?:\s*per\s*(\w+))?")?,
            first_listed: compile_regex(r"(?i)added on|listed on")?,
            full_date: compile_regex(r"(?i)(\d{1,2}(?:st|nd|rd|th)?\s+\w+\s+\d{4})")?,
            sold: compile_regex(r"(?i)sold for|sold in")?,
            pounds: compile_regex(r"£([\d,]+)")?,
            sold_date: compile_regex(r"(?i)(\d{1,2}(?:st|nd|rd|th)?\s+[a-z]+\s+\d{4}|[a-z]+\s+\d{4})")?,
            bedrooms: compile_regex(r"(?i)(\d+)\s*bed")?,
            bathrooms: compile_regex(r"(?i)(\d+)\s*bath")?,
            receptions: compile_regex(r"(?i)(\d+)\s*reception")?,
            average_price: compile_regex(r"(?i)average\s+price")?,
            properties_sold_label: compile_regex(r"(?i)properties sold")?,
            properties_sold: compile_regex(r"(?i)(\d+)\s+properties sold")?,
            average_rent: compile_regex(r"(?i)average\s+rent")?,
            rent_pcm: compile_regex(r"(?i)£([\d,]+)\s+pcm")?,
            available_label: compile_regex(r"(?i)available from")?,
            available_from: compile_regex(
                r"(?i)available from\s*(\d{1,2}(?:st|nd|rd|th)?\s+[a-z]+\s+\d{4}|[a-z]+\s+\d{4}|now|immediately)",
            )?,
            commonhold: compile_regex(r"(?i)commonhold")?,
            uprn_label: compile_regex(r"\bUPRN\b")?,
            uprn: compile_regex(r"(?i)UPRN\s*:?\s*(\d+)")?,
            thumbnail: compile_regex(r"_max_\d+x\d+")?,
        })
    }
}

/// A section holding repeated items, e.g. nearby schools.
struct ListSection {
    container: Selector,
    item: Selector,
}

impl ListSection {
    fn compile(container: &str, item: &str) -> Result<Self, ParserError> {
        Ok(Self {
            container: compile_selector(container)?,
            item: compile_selector(item)?,
        })
    }

    fn items<'a>(&self, root: ElementRef<'a>, limit: usize) -> Vec<ElementRef<'a>> {
        root.select(&self.container)
            .next()
            .map(|section| section.select(&self.item).take(limit).collect())
            .unwrap_or_default()
    }
}

struct PoiRule {
    kind: PoiKind,
    section: ListSection,
    name: FieldRule,
    distance: FieldRule,
}

/// Text node paired with the element that contains it.
struct TextNode<'a> {
    text: &'a str,
    parent: ElementRef<'a>,
}

impl TextNode<'_> {
    /// First capture group of `re`, tried on the node text, then on the
    /// whole parent element (values often sit in a sibling `<span>`).
    fn capture(&self, re: &Regex) -> Option<String> {
        capture(re, self.text).or_else(|| capture(re, &element_text(self.parent)))
    }
}

struct Page<'a> {
    document: &'a Html,
    nodes: Vec<TextNode<'a>>,
    base: &'static str,
}

impl<'a> Page<'a> {
    fn new(document: &'a Html, base: &'static str) -> Self {
        let nodes = document
            .tree
            .nodes()
            .filter_map(|node| {
                let text = node.value().as_text()?;
                let parent = node.parent().and_then(ElementRef::wrap)?;
                if matches!(parent.value().name(), "script" | "style" | "noscript") || text.trim().is_empty() {
                    return None;
                }
                Some(TextNode { text: &**text, parent })
            })
            .collect();
        Self { document, nodes, base }
    }

    fn root(&self) -> ElementRef<'a> {
        self.document.root_element()
    }

    fn find(&self, label: &Regex) -> Option<&TextNode<'a>> {
        self.nodes.iter().find(|n| label.is_match(n.text))
    }

    fn find_all<'p>(&'p self, label: &'p Regex) -> impl Iterator<Item = &'p TextNode<'a>> + 'p {
        self.nodes.iter().filter(move |n| label.is_match(n.text))
    }
}

pub struct DetailExtractor {
    title: FieldRule,
    address: FieldRule,
    price: FieldRule,
    description: Selector,
    paragraph: Selector,
    features: Selector,
    list_item: Selector,
    anchor: Selector,
    energy_rating: FieldRule,
    energy_certificate: FieldRule,
    agent_name: FieldRule,
    agent_phone: FieldRule,
    agent_logo: FieldRule,
    similar: ListSection,
    similar_price: FieldRule,
    similar_address: FieldRule,
    similar_link: FieldRule,
    pois: Vec<PoiRule>,
    images: Selector,
    floor_plans: Selector,
    history: Selector,
    breadcrumbs: Selector,
    recent_sales: ListSection,
    sale_address: FieldRule,
    sale_price: FieldRule,
    sale_date: FieldRule,
    documents: Selector,
    patterns: Patterns,
    numbers: NumberParser,
    ids: ListingIds,
}

impl DetailExtractor {
    pub fn new() -> Result<Self, ParserError> {
        Ok(Self {
            title: FieldRule::compile(
                "title",
                &[text("h1.property-header-title, [data-testid=\"property-title\"], .property-header h1"), text("h1")],
            )?,
            address: FieldRule::compile(
                "address",
                &[
                    text(".property-header-address, [data-testid=\"address-title\"], .property-header address"),
                    text("[itemprop=\"streetAddress\"]"),
                ],
            )?,
            price: FieldRule::compile(
                "price",
                &[
                    text(".property-header-price, [data-testid=\"property-price\"], [data-testid=\"price\"]"),
                    text("[itemprop=\"price\"]"),
                ],
            )?,
            description: compile_selector(
                "#property-description, [data-testid=\"property-description\"], .sect-wrap .sect",
            )?,
            paragraph: compile_selector("p")?,
            features: compile_selector("#key-features, [data-testid=\"key-features\"], .key-features")?,
            list_item: compile_selector("li")?,
            anchor: compile_selector("a[href]")?,
            energy_rating: FieldRule::compile(
                "energy_rating",
                &[text("[data-testid=\"epc-rating\"], .epc-rating, .energy-rating")],
            )?,
            energy_certificate: FieldRule::compile(
                "energy_certificate",
                &[attr(".epc-graph img, [data-testid=\"epc-graph\"] img", "src")],
            )?,
            agent_name: FieldRule::compile(
                "agent_name",
                &[text("[data-testid=\"agent-name\"], .agent-name, .agent-details .agent-name")],
            )?,
            agent_phone: FieldRule::compile(
                "agent_phone",
                &[
                    text("[data-testid=\"agent-phone\"], .agent-phone, .agent-details .agent-phone"),
                    text("a[href^=\"tel:\"]"),
                ],
            )?,
            agent_logo: FieldRule::compile(
                "agent_logo",
                &[attr(".agent-logo img, [data-testid=\"agent-logo\"] img", "src")],
            )?,
            similar: ListSection::compile(
                "#similarProperties, [data-testid=\"similar-properties\"], .similar-properties",
                ".propertyCard, [data-testid=\"property-card\"], .property-card",
            )?,
            similar_price: FieldRule::compile(
                "similar.price",
                &[text(".propertyCard-priceValue, [data-testid=\"property-price\"], .price")],
            )?,
            similar_address: FieldRule::compile(
                "similar.address",
                &[text("address, [data-testid=\"address-title\"], .address")],
            )?,
            similar_link: FieldRule::compile(
                "similar.link",
                &[attr(
                    "a[href*=\"/properties/\"], a[href*=\"/property-for-sale/\"], a[href*=\"/details/\"]",
                    "href",
                )],
            )?,
            pois: vec![
                PoiRule {
                    kind: PoiKind::School,
                    section: ListSection::compile(
                        "#schools, [data-testid=\"schools\"], .schools",
                        ".school-item, [data-testid=\"school-item\"]",
                    )?,
                    name: FieldRule::compile("school.name", &[text(".school-name, [data-testid=\"school-name\"]")])?,
                    distance: FieldRule::compile(
                        "school.distance",
                        &[text(".school-distance, [data-testid=\"school-distance\"]")],
                    )?,
                },
                PoiRule {
                    kind: PoiKind::Station,
                    section: ListSection::compile(
                        "#stations, [data-testid=\"stations\"], .stations",
                        ".station-item, [data-testid=\"station-item\"]",
                    )?,
                    name: FieldRule::compile("station.name", &[text(".station-name, [data-testid=\"station-name\"]")])?,
                    distance: FieldRule::compile(
                        "station.distance",
                        &[text(".station-distance, [data-testid=\"station-distance\"]")],
                    )?,
                },
            ],
            images: compile_selector("img[src*=\"/media/\"], [data-testid=\"gallery-image\"] img, .gallery-thumbs img")?,
            floor_plans: compile_selector(".floorplan-img img, [data-testid=\"floorplan-image\"] img")?,
            history: compile_selector("#historyMarket, [data-testid=\"listing-history\"]")?,
            breadcrumbs: compile_selector(".breadcrumb a, [data-testid=\"breadcrumb\"] a")?,
            recent_sales: ListSection::compile(
                "#recentlySold, [data-testid=\"recently-sold\"]",
                ".sold-property-item, [data-testid=\"sold-property\"]",
            )?,
            sale_address: FieldRule::compile("sale.address", &[text(".address, [data-testid=\"address\"]")])?,
            sale_price: FieldRule::compile("sale.price", &[text(".price, [data-testid=\"price\"]")])?,
            sale_date: FieldRule::compile("sale.date", &[text(".date, [data-testid=\"date\"]")])?,
            documents: compile_selector("a[href*=\".pdf\"], a[href*=\"brochure\"], a[href*=\"floorplan\"]")?,
            patterns: Patterns::compile()?,
            numbers: NumberParser::new()?,
            ids: ListingIds::new()?,
        })
    }

    /// Extracts every recoverable field of a detail page. Never fails; a
    /// page with nothing recognisable yields a record with only the URL,
    /// listing id and constant fields set.
    pub fn extract(&self, html: &str, url: &str, portal: Portal) -> RawDetailRecord {
        let document = Html::parse_document(html);
        let page = Page::new(&document, portal.base_url());
        let root = page.root();
        let p = &self.patterns;

        let mut listing = RawListingRecord::new(portal, url);
        listing.listing_id = self.ids.find(portal, url);
        listing.address = self.address.extract(root);
        listing.price = self.price.extract(root).and_then(|raw| self.numbers.normalize_price(&raw));
        listing.floor_area = found("floor_area", self.floor_area(&page));

        let mut record = RawDetailRecord::from(listing);
        record.title = found("title", self.title.extract(root));

        if let Some((lat, lng)) = found("coordinates", self.coordinates(html)) {
            record.map_url = Some(format!(
                "https://maps.googleapis.com/maps/api/staticmap?size=600x200&format=jpg&scale=1&center={lat},{lng}&maptype=roadmap&zoom=15&markers=scale:1%7C{lat},{lng}"
            ));
            record.street_view_url = Some(format!(
                "https://www.google.com/maps/@{lat},{lng},0a,73.7y,90t/data=!3m4!1e1!3m2!1s!2e0?source=apiv3"
            ));
            record.latitude = Some(lat);
            record.longitude = Some(lng);
        }

        record.virtual_tour = found("virtual_tour", self.virtual_tour(&page));
        record.description_paragraphs = self.description(root);
        record.features = self.features(root);
        record.energy_rating = found("energy_rating", self.energy_rating.extract(root));
        record.energy_certificate = self.energy_certificate.extract(root).map(|src| absolutize(page.base, &src));
        record.council_tax_band = found("council_tax_band", page.find(&p.council_tax_label).and_then(|n| n.capture(&p.council_tax)));

        if let Some((tenure, years)) = found("tenure", self.tenure(&page)) {
            record.tenure = Some(tenure);
            record.lease_years_remaining = years;
        }

        record.service_charge = found("service_charge", self.money_per_period(&page, &p.service_charge));
        record.ground_rent = found("ground_rent", self.money_per_period(&page, &p.ground_rent));
        record.agent_contact = found("agent_contact", self.agent_contact(&page));
        record.similar_listings = self.similar_listings(&page);
        record.points_of_interest = self.points_of_interest(root);
        record.images = self.images(&page);
        record.floor_plans = root
            .select(&self.floor_plans)
            .filter_map(|img| img.value().attr("src"))
            .map(|src| absolutize(page.base, src))
            .collect();
        record.listing_history = self.listing_history(&page, record.listing.price.as_deref());
        record.breadcrumbs = self.breadcrumbs(&page, record.title.as_deref(), url);

        record.listing.bedrooms = record.title.as_deref().and_then(|t| capture(&p.bedrooms, t));
        record.listing.bathrooms = first_capture(&p.bathrooms, &record.description_paragraphs, &record.features);
        record.receptions = first_capture(&p.receptions, &record.description_paragraphs, &record.features);

        record.market_stats = found("market_stats", self.market_stats(&page));
        record.additional_links = self.additional_links(&page);
        record.availability = found(
            "availability",
            page.find(&p.available_label)
                .and_then(|n| n.capture(&p.available_from))
                .map(|date| format!("Available from {}", date)),
        );
        record.commonhold_details = page.find(&p.commonhold).map(|n| clean_text(n.text));
        record.uprn = page.find(&p.uprn_label).and_then(|n| n.capture(&p.uprn));
        record.currency = Some("GBP".to_string());
        record.country_code = Some("GB".to_string());

        self.derive_fields(&mut record);
        debug!(
            "Extracted detail page {}: {} images, {} features, {} points of interest",
            url,
            record.images.len(),
            record.features.len(),
            record.points_of_interest.len()
        );
        record
    }

    fn coordinates(&self, html: &str) -> Option<(String, String)> {
        let lat = capture(&self.patterns.latitude, html)?;
        let lng = capture(&self.patterns.longitude, html)?;
        lat.parse::<f64>().ok()?;
        lng.parse::<f64>().ok()?;
        Some((lat, lng))
    }

    fn virtual_tour(&self, page: &Page<'_>) -> Option<String> {
        let node = page.find(&self.patterns.virtual_tour)?;
        let parent = node.parent;
        let href = if parent.value().name() == "a" {
            parent.value().attr("href")
        } else {
            parent.select(&self.anchor).next().and_then(|a| a.value().attr("href"))
        };
        Some(match href {
            Some(href) => absolutize(page.base, href),
            None => "Available (link not found)".to_string(),
        })
    }

    fn description(&self, root: ElementRef<'_>) -> Vec<String> {
        let Some(section) = root.select(&self.description).next() else {
            trace!(field = "description", "section absent");
            return Vec::new();
        };
        let paragraphs: Vec<String> = section
            .select(&self.paragraph)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();
        if paragraphs.is_empty() {
            let whole = element_text(section);
            if whole.is_empty() { Vec::new() } else { vec![whole] }
        } else {
            paragraphs
        }
    }

    fn features(&self, root: ElementRef<'_>) -> Vec<String> {
        root.select(&self.features)
            .next()
            .map(|section| {
                section
                    .select(&self.list_item)
                    .map(element_text)
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn floor_area(&self, page: &Page<'_>) -> Option<String> {
        let re = &self.patterns.floor_area;
        let value = page.find(re)?.capture(re)?;
        let digits = value.replace(',', "");
        let digits = digits.trim_end_matches('.');
        if digits.is_empty() {
            return None;
        }
        Some(format!("{}sq. ft", digits))
    }

    /// ("Leasehold (N years)", Some("N years")) or ("Freehold", None).
    fn tenure(&self, page: &Page<'_>) -> Option<(String, Option<String>)> {
        let p = &self.patterns;
        let node = page.find(&p.tenure)?;
        let kind = capture(&p.tenure, node.text)?.to_lowercase();
        if kind != "leasehold" {
            return Some(("Freehold".to_string(), None));
        }

        let years = node.capture(&p.years).or_else(|| {
            let document_text = element_text(page.root());
            capture(&p.lease_in_document, &document_text)
        });
        Some(match years {
            Some(n) => (format!("Leasehold ({} years)", n), Some(format!("{} years", n))),
            None => ("Leasehold".to_string(), None),
        })
    }

    fn money_per_period(&self, page: &Page<'_>, label: &Regex) -> Option<String> {
        let re = &self.patterns.money_per_period;
        page.find_all(label).find_map(|node| {
            let read = |text: &str| {
                re.captures(text).map(|caps| {
                    let amount = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                    let period = caps.get(2).map(|m| m.as_str()).unwrap_or("year");
                    format!("£{} per {}", amount, period)
                })
            };
            read(node.text).or_else(|| read(&element_text(node.parent)))
        })
    }

    fn agent_contact(&self, page: &Page<'_>) -> Option<AgentContact> {
        let root = page.root();
        let contact = AgentContact {
            name: self.agent_name.extract(root),
            phone: self.agent_phone.extract(root),
            logo: self.agent_logo.extract(root).map(|src| absolutize(page.base, &src)),
        };
        if contact.name.is_none() && contact.phone.is_none() && contact.logo.is_none() {
            None
        } else {
            Some(contact)
        }
    }

    fn similar_listings(&self, page: &Page<'_>) -> Vec<SimilarListing> {
        self.similar
            .items(page.root(), MAX_SIMILAR)
            .into_iter()
            .map(|item| SimilarListing {
                price: self.similar_price.extract(item),
                address: self.similar_address.extract(item),
                link: self.similar_link.extract(item).map(|href| absolutize(page.base, &href)),
            })
            .filter(|s| s.price.is_some() || s.address.is_some() || s.link.is_some())
            .collect()
    }

    fn points_of_interest(&self, root: ElementRef<'_>) -> Vec<PointOfInterest> {
        let mut pois = Vec::new();
        for rule in &self.pois {
            for item in rule.section.items(root, MAX_POI_PER_KIND) {
                let Some(name) = rule.name.extract(item) else {
                    continue;
                };
                pois.push(PointOfInterest {
                    kind: rule.kind,
                    name,
                    distance: rule.distance.extract(item).unwrap_or_else(|| "Unknown".to_string()),
                });
            }
        }
        pois
    }

    /// Gallery images upgraded to the large rendition, order kept, duplicates dropped.
    fn images(&self, page: &Page<'_>) -> Vec<String> {
        let mut seen = HashSet::new();
        page.root()
            .select(&self.images)
            .filter_map(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .map(|src| {
                let src = absolutize(page.base, src);
                self.patterns.thumbnail.replace_all(&src, FULL_SIZE_SUFFIX).into_owned()
            })
            .filter(|src| seen.insert(src.clone()))
            .take(MAX_IMAGES)
            .collect()
    }

    fn listing_history(&self, page: &Page<'_>, price: Option<&str>) -> Vec<HistoryEvent> {
        let p = &self.patterns;
        if page.root().select(&self.history).next().is_none() {
            return Vec::new();
        }

        let mut events = Vec::new();
        if let Some(date) = page.find(&p.first_listed).and_then(|n| n.capture(&p.full_date)) {
            events.push(HistoryEvent {
                event_type: "First listed".to_string(),
                date,
                price: price.unwrap_or(UNKNOWN_PRICE).to_string(),
                currency: "£".to_string(),
            });
        }
        for node in page.find_all(&p.sold) {
            let (Some(price), Some(date)) = (capture(&p.pounds, node.text), capture(&p.sold_date, node.text)) else {
                continue;
            };
            events.push(HistoryEvent {
                event_type: "Last sold".to_string(),
                date,
                price,
                currency: "£".to_string(),
            });
        }
        events
    }

    fn breadcrumbs(&self, page: &Page<'_>, title: Option<&str>, url: &str) -> Vec<Breadcrumb> {
        let mut crumbs: Vec<Breadcrumb> = page
            .root()
            .select(&self.breadcrumbs)
            .filter_map(|a| {
                let name = element_text(a);
                let href = a.value().attr("href")?;
                if name.is_empty() {
                    return None;
                }
                Some(Breadcrumb { name, url: absolutize(page.base, href) })
            })
            .collect();
        if let Some(title) = title
            && !crumbs.is_empty()
        {
            crumbs.push(Breadcrumb {
                name: title.to_string(),
                url: url.to_string(),
            });
        }
        crumbs
    }

    fn market_stats(&self, page: &Page<'_>) -> Option<MarketStats> {
        let p = &self.patterns;
        let stats = MarketStats {
            average_price: page
                .find(&p.average_price)
                .and_then(|n| n.capture(&p.pounds))
                .map(|v| format!("£{}", v)),
            sold_last_12_months: page
                .find(&p.properties_sold_label)
                .and_then(|n| n.capture(&p.properties_sold))
                .and_then(|v| v.parse().ok()),
            recent_sales: self
                .recent_sales
                .items(page.root(), MAX_RECENT_SALES)
                .into_iter()
                .map(|sale| ComparableSale {
                    address: self.sale_address.extract(sale),
                    price: self.sale_price.extract(sale),
                    date: self.sale_date.extract(sale),
                })
                .filter(|s| s.address.is_some() || s.price.is_some() || s.date.is_some())
                .collect(),
            average_rent: page
                .find(&p.average_rent)
                .and_then(|n| n.capture(&p.rent_pcm))
                .map(|v| format!("£{} pcm", v)),
        };
        if stats.is_empty() { None } else { Some(stats) }
    }

    fn additional_links(&self, page: &Page<'_>) -> Vec<String> {
        let mut seen = HashSet::new();
        page.root()
            .select(&self.documents)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| absolutize(page.base, href))
            .filter(|href| seen.insert(href.clone()))
            .collect()
    }

    /// Combines a search-card record with its detail page. Detail values win;
    /// gaps are filled from the card, then derived fields are recomputed.
    pub fn merge(&self, listing: RawListingRecord, mut detail: RawDetailRecord) -> RawDetailRecord {
        let mut base = listing;
        base.overlay(detail.listing);
        detail.listing = base;
        self.derive_fields(&mut detail);
        detail
    }

    /// Recomputes values that depend on several fields.
    fn derive_fields(&self, record: &mut RawDetailRecord) {
        let price = record.listing.price.as_deref().and_then(|p| self.numbers.parse_price(p));
        let area = record.listing.floor_area.as_deref().and_then(|a| self.numbers.parse_area_sqft(a));
        if let (Some(price), Some(area)) = (price, area) {
            record.price_per_size = MarketAnalyzer::price_per_area(price, area);
        }

        if let Some(price) = record.listing.price.clone() {
            for event in &mut record.listing_history {
                if event.event_type == "First listed" && event.price == UNKNOWN_PRICE {
                    event.price = price.clone();
                }
            }
        }
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    let caps = re.captures(text)?;
    let value = clean_text(caps.get(1)?.as_str());
    if value.is_empty() { None } else { Some(value) }
}

fn first_capture(re: &Regex, primary: &[String], secondary: &[String]) -> Option<String> {
    primary.iter().chain(secondary).find_map(|text| capture(re, text))
}

fn found<T>(field: &'static str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        trace!(field, "no value on detail page");
    }
    value
}
