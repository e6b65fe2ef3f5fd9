// Search-result page -> RawListingRecord per card
use crate::crawler::portal::ListingIds;
use crate::model::{ParserError, Portal, RawListingRecord};
use crate::parser::rules::{FieldRule, SelectorCascade, Strategy, attr, keyword, pattern, text};
use crate::utils::absolutize;
use scraper::{ElementRef, Html};
use tracing::debug;

const RIGHTMOVE_CARDS: &[&str] = &[
    "div.propertyCard",
    "div.l-searchResult",
    "div[data-test=\"propertyCard\"]",
    "div[data-testid=\"propertyCard\"]",
    "div.property-card",
];

const RIGHTMOVE_LINK: &[Strategy] = &[
    attr("a.propertyCard-link", "href"),
    attr("a.property-card-link", "href"),
    attr("[data-test=\"property-details-link\"]", "href"),
    attr("a[href*=\"/properties/\"]", "href"),
    attr("a[href*=\"/property-for-sale/\"]", "href"),
];

const RIGHTMOVE_PRICE: &[Strategy] = &[
    text(".propertyCard-priceValue"),
    text(".property-card-price"),
    text("[data-test=\"property-price\"]"),
];

const RIGHTMOVE_ADDRESS: &[Strategy] = &[
    text("address.propertyCard-address"),
    text(".property-card-address"),
    text("[data-test=\"address-title\"]"),
];

const RIGHTMOVE_BEDROOMS: &[Strategy] = &[
    pattern("h2.propertyCard-title", r"(?i)(\d+)\s*bedroom"),
    pattern(".property-card-title", r"(?i)(\d+)\s*bedroom"),
    pattern("[data-test=\"property-title\"]", r"(?i)(\d+)\s*bedroom"),
];

const RIGHTMOVE_TYPE: &[Strategy] = &[
    pattern("h2.propertyCard-title", r"(?i)bedroom\s+(.+?)\s+for\b"),
    pattern(".property-card-title", r"(?i)bedroom\s+(.+?)\s+for\b"),
    pattern("[data-test=\"property-title\"]", r"(?i)bedroom\s+(.+?)\s+for\b"),
    pattern("h2.propertyCard-title", r"(?i)^(.+?)\s+for\s+(?:sale|rent)"),
];

const RIGHTMOVE_DESCRIPTION: &[Strategy] = &[
    text(".propertyCard-description"),
    text(".property-card-description"),
    text("[data-test=\"property-description\"]"),
];

const RIGHTMOVE_BATHROOMS: &[Strategy] = &[
    pattern(".propertyCard-description", r"(?i)(\d+)\s*bathroom"),
    pattern(".property-card-description", r"(?i)(\d+)\s*bathroom"),
    pattern("[data-test=\"property-description\"]", r"(?i)(\d+)\s*bathroom"),
];

const RIGHTMOVE_AGENT: &[Strategy] = &[
    text(".propertyCard-branchSummary"),
    text(".property-card-agent"),
    text("[data-test=\"agent-name\"]"),
];

const RIGHTMOVE_DATE: &[Strategy] = &[
    text(".propertyCard-contactsAddedOrReduced"),
    text(".property-card-date"),
    text("[data-test=\"date-added\"]"),
];

const ZOOPLA_CARDS: &[&str] = &[
    "div[data-testid=\"search-result\"]",
    "div[class*=\"listing-results-wrapper\"]",
    "div[class*=\"property-card\"]",
];

const ZOOPLA_LINK: &[Strategy] = &[
    attr("a[data-testid=\"listing-details-link\"]", "href"),
    attr("a[href*=\"/details/\"]", "href"),
];

const ZOOPLA_PRICE: &[Strategy] = &[text("p[data-testid=\"listing-price\"]"), text("[class*=\"price\"]")];

const ZOOPLA_ADDRESS: &[Strategy] = &[
    text("h2[data-testid=\"listing-title\"]"),
    text("h3[data-testid=\"listing-title\"]"),
    text("[class*=\"address\"]"),
];

const ZOOPLA_BEDROOMS: &[Strategy] = &[
    pattern("div[data-testid=\"listing-spec\"]", r"(?i)(\d+)\s*bed"),
    pattern("[class*=\"specs\"]", r"(?i)(\d+)\s*bed"),
];

const ZOOPLA_BATHROOMS: &[Strategy] = &[
    pattern("div[data-testid=\"listing-spec\"]", r"(?i)(\d+)\s*bath"),
    pattern("[class*=\"specs\"]", r"(?i)(\d+)\s*bath"),
];

const ZOOPLA_AREA: &[Strategy] = &[
    pattern("div[data-testid=\"listing-spec\"]", r"(?i)(\d[\d,]*\s*sq\.?\s*ft)"),
    pattern("[class*=\"specs\"]", r"(?i)(\d[\d,]*\s*sq\.?\s*ft)"),
    pattern("div[data-testid=\"listing-spec\"]", r"(?i)(\d[\d,.]*\s*(?:sq\.?\s*m|m²))"),
];

const PROPERTY_TYPES: &[&str] = &["Semi-detached", "Detached", "Terraced", "Flat", "Bungalow", "Apartment", "House"];

const ZOOPLA_TYPE: &[Strategy] = &[
    keyword("p[data-testid=\"listing-description\"]", PROPERTY_TYPES),
    keyword("[class*=\"description\"]", PROPERTY_TYPES),
    keyword("h2[data-testid=\"listing-title\"]", PROPERTY_TYPES),
];

const ZOOPLA_DESCRIPTION: &[Strategy] = &[text("p[data-testid=\"listing-description\"]"), text("[class*=\"description\"]")];

const ZOOPLA_AGENT: &[Strategy] = &[attr("img[data-testid=\"agent-logo\"]", "alt"), text("[data-testid=\"agent-name\"]")];

const ZOOPLA_DATE: &[Strategy] = &[text("[data-testid=\"date-published\"]"), text("li[class*=\"date\"]")];

/// Fields of `RawListingRecord` filled from a card.
#[derive(Debug, Clone, Copy)]
enum Field {
    Price,
    Address,
    Bedrooms,
    Bathrooms,
    PropertyType,
    Description,
    Agent,
    DateAdded,
    FloorArea,
}

/// Result of parsing one search page.
#[derive(Debug, Default)]
pub struct PageParse {
    /// Cards located by the winning container selector.
    pub cards: usize,
    /// Cards dropped because no link could be read.
    pub missing_link: usize,
    pub records: Vec<RawListingRecord>,
}

pub struct ListingExtractor {
    portal: Portal,
    cards: SelectorCascade,
    link: FieldRule,
    fields: Vec<(Field, FieldRule)>,
    ids: ListingIds,
}

impl ListingExtractor {
    pub fn new(portal: Portal) -> Result<Self, ParserError> {
        let (cards, link, table): (&[&str], &[Strategy], Vec<(Field, &'static str, &[Strategy])>) = match portal {
            Portal::Rightmove => (
                RIGHTMOVE_CARDS,
                RIGHTMOVE_LINK,
                vec![
                    (Field::Price, "price", RIGHTMOVE_PRICE),
                    (Field::Address, "address", RIGHTMOVE_ADDRESS),
                    (Field::Bedrooms, "bedrooms", RIGHTMOVE_BEDROOMS),
                    (Field::Bathrooms, "bathrooms", RIGHTMOVE_BATHROOMS),
                    (Field::PropertyType, "property_type", RIGHTMOVE_TYPE),
                    (Field::Description, "description", RIGHTMOVE_DESCRIPTION),
                    (Field::Agent, "agent", RIGHTMOVE_AGENT),
                    (Field::DateAdded, "date_added", RIGHTMOVE_DATE),
                ],
            ),
            Portal::Zoopla => (
                ZOOPLA_CARDS,
                ZOOPLA_LINK,
                vec![
                    (Field::Price, "price", ZOOPLA_PRICE),
                    (Field::Address, "address", ZOOPLA_ADDRESS),
                    (Field::Bedrooms, "bedrooms", ZOOPLA_BEDROOMS),
                    (Field::Bathrooms, "bathrooms", ZOOPLA_BATHROOMS),
                    (Field::FloorArea, "floor_area", ZOOPLA_AREA),
                    (Field::PropertyType, "property_type", ZOOPLA_TYPE),
                    (Field::Description, "description", ZOOPLA_DESCRIPTION),
                    (Field::Agent, "agent", ZOOPLA_AGENT),
                    (Field::DateAdded, "date_added", ZOOPLA_DATE),
                ],
            ),
        };

        let fields = table
            .into_iter()
            .map(|(field, name, strategies)| Ok((field, FieldRule::compile(name, strategies)?)))
            .collect::<Result<Vec<_>, ParserError>>()?;

        Ok(Self {
            portal,
            cards: SelectorCascade::compile(cards)?,
            link: FieldRule::compile("link", link)?,
            fields,
            ids: ListingIds::new()?,
        })
    }

    /// Parses every card on a search page. Cards without a link are dropped;
    /// any other missing field is simply left empty.
    pub fn extract(&self, html: &str) -> PageParse {
        let document = Html::parse_document(html);
        let Some((selector, cards)) = self.cards.select_all(document.root_element()) else {
            debug!("No property cards matched on {} page", self.portal);
            return PageParse::default();
        };
        debug!("Found {} cards on {} page using {}", cards.len(), self.portal, selector);

        let mut parse = PageParse { cards: cards.len(), ..PageParse::default() };
        for card in cards {
            match self.extract_card(card) {
                Some(record) => parse.records.push(record),
                None => parse.missing_link += 1,
            }
        }
        if parse.missing_link > 0 {
            debug!("Skipped {} cards without a link", parse.missing_link);
        }
        parse
    }

    fn extract_card(&self, card: ElementRef<'_>) -> Option<RawListingRecord> {
        let href = self.link.extract(card)?;
        let url = absolutize(self.portal.base_url(), &href);
        let mut record = RawListingRecord::new(self.portal, url);
        record.listing_id = self.ids.find(self.portal, &record.url);

        for (field, rule) in &self.fields {
            let value = rule.extract(card);
            let slot = match field {
                Field::Price => &mut record.price,
                Field::Address => &mut record.address,
                Field::Bedrooms => &mut record.bedrooms,
                Field::Bathrooms => &mut record.bathrooms,
                Field::PropertyType => &mut record.property_type,
                Field::Description => &mut record.description,
                Field::Agent => &mut record.agent,
                Field::DateAdded => &mut record.date_added,
                Field::FloorArea => &mut record.floor_area,
            };
            *slot = value;
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RIGHTMOVE_PAGE: &str = r#"
<html><body>
  <div class="l-searchResult">
    <a class="propertyCard-link" href="/properties/111#/"></a>
    <div class="propertyCard-priceValue">£250,000</div>
    <address class="propertyCard-address">1 High Street, Leeds LS1</address>
    <h2 class="propertyCard-title">3 bedroom semi-detached house for sale</h2>
    <div class="propertyCard-description">Spacious home with 2 bathrooms and garden.</div>
    <div class="propertyCard-branchSummary">Added by Acme Estates</div>
    <div class="propertyCard-contactsAddedOrReduced">Added on 01/09/2025</div>
  </div>
  <div class="l-searchResult">
    <a class="propertyCard-link" href="/properties/222#/"></a>
    <h2 class="propertyCard-title">2 bedroom flat for sale</h2>
    <address class="propertyCard-address">Flat 4, Mill Lane</address>
  </div>
  <div class="l-searchResult">
    <div class="propertyCard-priceValue">£1</div>
  </div>
</body></html>"#;

    #[test]
    fn test_rightmove_second_card_selector_used() {
        let extractor = ListingExtractor::new(Portal::Rightmove).unwrap();
        let parse = extractor.extract(RIGHTMOVE_PAGE);
        assert_eq!(parse.cards, 3);
        assert_eq!(parse.missing_link, 1);
        assert_eq!(parse.records.len(), 2);

        let first = &parse.records[0];
        assert_eq!(first.url, "https://www.rightmove.co.uk/properties/111#/");
        assert_eq!(first.listing_id.as_deref(), Some("111"));
        assert_eq!(first.price.as_deref(), Some("£250,000"));
        assert_eq!(first.bedrooms.as_deref(), Some("3"));
        assert_eq!(first.bathrooms.as_deref(), Some("2"));
        assert_eq!(first.property_type.as_deref(), Some("semi-detached house"));
        assert_eq!(first.agent.as_deref(), Some("Added by Acme Estates"));
    }

    #[test]
    fn test_missing_field_leaves_others_intact() {
        let extractor = ListingExtractor::new(Portal::Rightmove).unwrap();
        let parse = extractor.extract(RIGHTMOVE_PAGE);
        let second = &parse.records[1];
        assert_eq!(second.price, None);
        assert_eq!(second.bathrooms, None);
        assert_eq!(second.bedrooms.as_deref(), Some("2"));
        assert_eq!(second.property_type.as_deref(), Some("flat"));
        assert_eq!(second.address.as_deref(), Some("Flat 4, Mill Lane"));
    }

    /// (fragment name, card markup, fields read from it)
    type CardPart = (&'static str, &'static str, &'static [&'static str]);

    const RIGHTMOVE_PARTS: &[CardPart] = &[
        ("price", r#"<div class="propertyCard-priceValue">£250,000</div>"#, &["price"]),
        ("address", r#"<address class="propertyCard-address">1 High Street, Leeds LS1</address>"#, &["address"]),
        (
            "title",
            r#"<h2 class="propertyCard-title">3 bedroom semi-detached house for sale</h2>"#,
            &["bedrooms", "property_type"],
        ),
        (
            "description",
            r#"<div class="propertyCard-description">Spacious home with 2 bathrooms and garden.</div>"#,
            &["description", "bathrooms"],
        ),
        ("agent", r#"<div class="propertyCard-branchSummary">Acme Estates</div>"#, &["agent"]),
        ("date", r#"<div class="propertyCard-contactsAddedOrReduced">Added on 01/09/2025</div>"#, &["date_added"]),
    ];

    const ZOOPLA_PARTS: &[CardPart] = &[
        ("price", r#"<p data-testid="listing-price">£425,000</p>"#, &["price"]),
        ("title", r#"<h2 data-testid="listing-title">Park Road, Leeds LS6</h2>"#, &["address"]),
        (
            "spec",
            r#"<div data-testid="listing-spec"><span>3 beds</span><span>1 bath</span><span>1,020 sq ft</span></div>"#,
            &["bedrooms", "bathrooms", "floor_area"],
        ),
        (
            "description",
            r#"<p data-testid="listing-description">A terraced house close to the park</p>"#,
            &["description", "property_type"],
        ),
        ("agent", r#"<img data-testid="agent-logo" alt="Acme Estates" src="/logo.png">"#, &["agent"]),
        ("date", r#"<span data-testid="date-published">Listed on 1st Sep 2025</span>"#, &["date_added"]),
    ];

    fn card_fields(record: &RawListingRecord) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("listing_id", record.listing_id.clone()),
            ("price", record.price.clone()),
            ("address", record.address.clone()),
            ("bedrooms", record.bedrooms.clone()),
            ("bathrooms", record.bathrooms.clone()),
            ("property_type", record.property_type.clone()),
            ("description", record.description.clone()),
            ("agent", record.agent.clone()),
            ("date_added", record.date_added.clone()),
            ("floor_area", record.floor_area.clone()),
        ]
    }

    /// Drops each part of a card in turn and checks that only the fields
    /// read from that part go missing.
    fn assert_parts_independent(portal: Portal, card_open: &str, parts: &[CardPart]) {
        let extractor = ListingExtractor::new(portal).unwrap();
        let page = |skip: Option<&str>| {
            let body: String = parts
                .iter()
                .filter(|(name, _, _)| Some(*name) != skip)
                .map(|(_, html, _)| *html)
                .collect();
            format!("<html><body>{}{}</div></body></html>", card_open, body)
        };

        let full = card_fields(&extractor.extract(&page(None)).records.remove(0));
        for (part, _, affected) in parts {
            let reduced = card_fields(&extractor.extract(&page(Some(*part))).records.remove(0));
            for ((field, before), (_, after)) in full.iter().zip(&reduced) {
                if affected.contains(field) {
                    assert!(before.is_some(), "{} not read from the full card", field);
                    assert_eq!(after, &None, "removing {} left {} set", part, field);
                } else {
                    assert_eq!(after, before, "removing {} changed {}", part, field);
                }
            }
        }
    }

    #[test]
    fn test_rightmove_removing_a_part_clears_only_its_fields() {
        assert_parts_independent(
            Portal::Rightmove,
            r#"<div class="propertyCard"><a class="propertyCard-link" href="/properties/111#/"></a>"#,
            RIGHTMOVE_PARTS,
        );
    }

    #[test]
    fn test_zoopla_removing_a_part_clears_only_its_fields() {
        assert_parts_independent(
            Portal::Zoopla,
            r#"<div data-testid="search-result"><a data-testid="listing-details-link" href="/for-sale/details/67001234/"></a>"#,
            ZOOPLA_PARTS,
        );
    }

    #[test]
    fn test_zoopla_card() {
        let html = r#"
<html><body>
  <div data-testid="search-result">
    <a data-testid="listing-details-link" href="/for-sale/details/67001234/"></a>
    <p data-testid="listing-price">£425,000</p>
    <h2 data-testid="listing-title">Park Road, Leeds LS6</h2>
    <div data-testid="listing-spec"><span>3 beds</span><span>1 bath</span><span>1,020 sq ft</span></div>
    <p data-testid="listing-description">A terraced house close to the park</p>
  </div>
</body></html>"#;
        let extractor = ListingExtractor::new(Portal::Zoopla).unwrap();
        let parse = extractor.extract(html);
        assert_eq!(parse.records.len(), 1);
        let record = &parse.records[0];
        assert_eq!(record.listing_id.as_deref(), Some("67001234"));
        assert_eq!(record.bedrooms.as_deref(), Some("3"));
        assert_eq!(record.bathrooms.as_deref(), Some("1"));
        assert_eq!(record.floor_area.as_deref(), Some("1,020 sq ft"));
        assert_eq!(record.property_type.as_deref(), Some("Terraced"));
        assert_eq!(record.address.as_deref(), Some("Park Road, Leeds LS6"));
    }

    #[test]
    fn test_page_without_cards() {
        let extractor = ListingExtractor::new(Portal::Zoopla).unwrap();
        let parse = extractor.extract("<html><body><p>Please verify you are human</p></body></html>");
        assert_eq!(parse.cards, 0);
        assert!(parse.records.is_empty());
    }
}
