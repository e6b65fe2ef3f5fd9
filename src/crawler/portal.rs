// Portal-specific URL layout: home page, search pages, listing ids
use crate::model::{Channel, ParserError, Portal};
use crate::utils::{compile_regex, to_kebab_case};
use regex::Regex;

const RIGHTMOVE_PAGE_SIZE: usize = 24;
const ZOOPLA_PAGE_SIZE: usize = 25;

/// Place names with a known search token. Keys are lowercase.
const RIGHTMOVE_LOCATIONS: &[(&str, &str)] = &[
    ("london", "REGION%5E87490"),
    ("manchester", "REGION%5E904"),
    ("birmingham", "REGION%5E162"),
    ("leeds", "REGION%5E787"),
    ("liverpool", "REGION%5E138"),
];

const ZOOPLA_LOCATIONS: &[(&str, &str)] = &[
    ("london", "london"),
    ("manchester", "manchester"),
    ("birmingham", "birmingham"),
    ("leeds", "leeds"),
    ("liverpool", "liverpool"),
];

impl Portal {
    pub fn base_url(&self) -> &'static str {
        match self {
            Portal::Rightmove => "https://www.rightmove.co.uk",
            Portal::Zoopla => "https://www.zoopla.co.uk",
        }
    }

    /// Visited once per crawl to obtain session cookies.
    pub fn home_url(&self) -> String {
        format!("{}/", self.base_url())
    }

    pub fn page_size(&self) -> usize {
        match self {
            Portal::Rightmove => RIGHTMOVE_PAGE_SIZE,
            Portal::Zoopla => ZOOPLA_PAGE_SIZE,
        }
    }

    pub fn static_locations(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Portal::Rightmove => RIGHTMOVE_LOCATIONS,
            Portal::Zoopla => ZOOPLA_LOCATIONS,
        }
    }

    /// URL whose redirect reveals the location token, if the portal has one.
    pub fn resolution_url(&self, place: &str, channel: Channel) -> Option<String> {
        match self {
            Portal::Rightmove => {
                let section = match channel {
                    Channel::Sale => "property-for-sale",
                    Channel::Rent => "property-to-rent",
                };
                Some(format!(
                    "{}/{}/search.html?searchLocation={}&useLocationIdentifier=true",
                    self.base_url(),
                    section,
                    urlencoding::encode(place)
                ))
            }
            Portal::Zoopla => None,
        }
    }

    /// Lossy token built straight from the place name.
    pub fn fallback_token(&self, place: &str) -> String {
        match self {
            Portal::Rightmove => format!("REGION%5E{}", urlencoding::encode(&place.trim().to_lowercase())),
            Portal::Zoopla => to_kebab_case(place),
        }
    }

    /// Search URL for zero-based `page`. `alternate` selects the reduced
    /// query-string form used when the primary one is refused.
    pub fn search_url(&self, token: &str, page: usize, channel: Channel, alternate: bool) -> String {
        match self {
            Portal::Rightmove => {
                let index = page * RIGHTMOVE_PAGE_SIZE;
                let (section, search_type) = match channel {
                    Channel::Sale => ("property-for-sale", "SALE"),
                    Channel::Rent => ("property-to-rent", "RENT"),
                };
                if alternate {
                    format!(
                        "{}/{}/find.html?locationIdentifier={}&index={}",
                        self.base_url(),
                        section,
                        token,
                        index
                    )
                } else {
                    format!(
                        "{}/{}/find.html?searchType={}&locationIdentifier={}&index={}&propertyTypes=&includeSSTC=false&mustHave=&dontShow=&furnishTypes=&keywords=",
                        self.base_url(),
                        section,
                        search_type,
                        token,
                        index
                    )
                }
            }
            Portal::Zoopla => {
                let page_number = page + 1;
                let section = match channel {
                    Channel::Sale => "for-sale",
                    Channel::Rent => "to-rent",
                };
                if alternate {
                    format!("{}/{}/property/{}/?pn={}", self.base_url(), section, token, page_number)
                } else {
                    format!(
                        "{}/{}/{}/?page_size={}&q={}&radius=0&results_sort=newest_listings&pn={}",
                        self.base_url(),
                        section,
                        token,
                        ZOOPLA_PAGE_SIZE,
                        urlencoding::encode(&token.replace('-', " ")),
                        page_number
                    )
                }
            }
        }
    }
}

/// Listing identifiers encoded in detail-page URLs.
pub struct ListingIds {
    rightmove: Regex,
    zoopla: Regex,
}

impl ListingIds {
    pub fn new() -> Result<Self, ParserError> {
        Ok(Self {
            rightmove: compile_regex(r"/properties/(\d+)")?,
            zoopla: compile_regex(r"/details/(\d+)")?,
        })
    }

    pub fn find(&self, portal: Portal, url: &str) -> Option<String> {
        let re = match portal {
            Portal::Rightmove => &self.rightmove,
            Portal::Zoopla => &self.zoopla,
        };
        re.captures(url).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
    }
}
