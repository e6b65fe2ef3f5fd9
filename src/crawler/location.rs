// Free-text place name -> portal search token
use crate::crawler::traits::PageFetcher;
use crate::model::{Channel, ParserError, Portal, RequestKind, ResolutionError};
use crate::utils::{clean_text, compile_regex, strip_punctuation, to_kebab_case};
use regex::Regex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Curated lookup table.
    Static,
    /// Read from the portal's redirect after a live search.
    Live,
    /// Slug derived from the name on a portal that searches by slug.
    Slug,
    /// Synthesized from the name; may not match any real region.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationToken {
    pub value: String,
    pub source: TokenSource,
}

pub struct LocationResolver {
    portal: Portal,
    channel: Channel,
    strict: bool,
    location_param: Regex,
}

impl LocationResolver {
    pub fn new(portal: Portal, channel: Channel, strict: bool) -> Result<Self, ParserError> {
        Ok(Self {
            portal,
            channel,
            strict,
            location_param: compile_regex(r"[?&]locationIdentifier=([^&#]+)")?,
        })
    }

    pub fn lookup_static(&self, place: &str) -> Option<LocationToken> {
        let key = clean_text(place).to_lowercase();
        self.portal
            .static_locations()
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, token)| LocationToken {
                value: token.to_string(),
                source: TokenSource::Static,
            })
    }

    /// Static table first, then a live search (raw name, then the name with
    /// punctuation stripped), then a lossy synthesized token unless strict.
    pub async fn resolve<F: PageFetcher + ?Sized>(
        &self,
        fetcher: &mut F,
        place: &str,
    ) -> Result<LocationToken, ResolutionError> {
        let place = clean_text(place);
        if place.is_empty() {
            return Err(ResolutionError::EmptyPlace);
        }

        if let Some(token) = self.lookup_static(&place) {
            info!("Using predefined location identifier for {}: {}", place, token.value);
            return Ok(token);
        }

        if self.portal.resolution_url(&place, self.channel).is_none() {
            let slug = to_kebab_case(&strip_punctuation(&place));
            if slug.is_empty() {
                return Err(ResolutionError::Unresolved { place, portal: self.portal });
            }
            return Ok(LocationToken { value: slug, source: TokenSource::Slug });
        }

        let mut candidates = vec![place.clone()];
        let stripped = strip_punctuation(&place);
        if !stripped.is_empty() && stripped != place {
            candidates.push(stripped);
        }

        for candidate in &candidates {
            if let Some(value) = self.resolve_live(fetcher, candidate).await {
                info!("Found location identifier for {}: {}", place, value);
                return Ok(LocationToken { value, source: TokenSource::Live });
            }
        }

        if self.strict {
            return Err(ResolutionError::Unresolved { place, portal: self.portal });
        }

        let value = self.portal.fallback_token(&place);
        warn!("Could not resolve {} on {}, using fallback identifier {}", place, self.portal, value);
        Ok(LocationToken { value, source: TokenSource::Fallback })
    }

    async fn resolve_live<F: PageFetcher + ?Sized>(&self, fetcher: &mut F, place: &str) -> Option<String> {
        let url = self.portal.resolution_url(place, self.channel)?;
        match fetcher.fetch(&url, RequestKind::Resolve).await {
            Ok(page) => self.token_from_url(&page.url),
            Err(e) => {
                warn!("Location lookup for '{}' failed: {}", place, e);
                None
            }
        }
    }

    fn token_from_url(&self, url: &str) -> Option<String> {
        self.location_param
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}
