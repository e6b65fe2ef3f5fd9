//! Declarative extraction rules.
//!
//! A field is an ordered list of strategies; each strategy names a CSS
//! selector and how to read a value out of the first element it matches.
//! The first strategy producing a non-empty value wins. A strategy that
//! matches nothing is logged and skipped, never an error.

use crate::model::ParserError;
use crate::utils::{clean_text, compile_regex};
use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::trace;

/// How a value is read from a matched element.
#[derive(Debug, Clone, Copy)]
pub enum Capture {
    /// Whitespace-collapsed text content.
    Text,
    /// An attribute value.
    Attr(&'static str),
    /// First capture group of a regex applied to the text.
    Pattern(&'static str),
    /// First vocabulary word contained in the text (case-insensitive).
    Keyword(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct Strategy {
    pub selector: &'static str,
    pub capture: Capture,
}

pub const fn text(selector: &'static str) -> Strategy {
    Strategy { selector, capture: Capture::Text }
}

pub const fn attr(selector: &'static str, name: &'static str) -> Strategy {
    Strategy { selector, capture: Capture::Attr(name) }
}

pub const fn pattern(selector: &'static str, regex: &'static str) -> Strategy {
    Strategy { selector, capture: Capture::Pattern(regex) }
}

pub const fn keyword(selector: &'static str, words: &'static [&'static str]) -> Strategy {
    Strategy { selector, capture: Capture::Keyword(words) }
}

enum CompiledCapture {
    Text,
    Attr(&'static str),
    Pattern(Regex),
    Keyword(&'static [&'static str]),
}

struct CompiledStrategy {
    selector: Selector,
    capture: CompiledCapture,
}

/// A field's strategies, compiled once and reused for every card/page.
pub struct FieldRule {
    pub field: &'static str,
    strategies: Vec<CompiledStrategy>,
}

impl FieldRule {
    pub fn compile(field: &'static str, strategies: &[Strategy]) -> Result<Self, ParserError> {
        let strategies = strategies
            .iter()
            .map(|s| {
                let capture = match s.capture {
                    Capture::Text => CompiledCapture::Text,
                    Capture::Attr(name) => CompiledCapture::Attr(name),
                    Capture::Pattern(p) => CompiledCapture::Pattern(compile_regex(p)?),
                    Capture::Keyword(words) => CompiledCapture::Keyword(words),
                };
                Ok(CompiledStrategy { selector: compile_selector(s.selector)?, capture })
            })
            .collect::<Result<Vec<_>, ParserError>>()?;
        Ok(Self { field, strategies })
    }

    /// Value of this field within `scope`, or `None` when no strategy yields one.
    pub fn extract(&self, scope: ElementRef<'_>) -> Option<String> {
        for (index, strategy) in self.strategies.iter().enumerate() {
            let value = scope
                .select(&strategy.selector)
                .next()
                .and_then(|el| read(el, &strategy.capture));
            match value {
                Some(v) => return Some(v),
                None => trace!(field = self.field, strategy = index, "strategy yielded nothing"),
            }
        }
        None
    }
}

fn read(el: ElementRef<'_>, capture: &CompiledCapture) -> Option<String> {
    let value = match capture {
        CompiledCapture::Text => element_text(el),
        CompiledCapture::Attr(name) => el.value().attr(name)?.trim().to_string(),
        CompiledCapture::Pattern(re) => {
            let text = element_text(el);
            let caps = re.captures(&text)?;
            let m = caps.get(1).or_else(|| caps.get(0))?;
            clean_text(m.as_str())
        }
        CompiledCapture::Keyword(words) => {
            let lower = element_text(el).to_lowercase();
            words.iter().find(|w| lower.contains(&w.to_lowercase()))?.to_string()
        }
    };
    if value.is_empty() { None } else { Some(value) }
}

/// Ordered list of structural selectors; the first that matches at least
/// one element wins.
pub struct SelectorCascade {
    selectors: Vec<(&'static str, Selector)>,
}

impl SelectorCascade {
    pub fn compile(selectors: &[&'static str]) -> Result<Self, ParserError> {
        let selectors = selectors
            .iter()
            .map(|s| Ok((*s, compile_selector(s)?)))
            .collect::<Result<Vec<_>, ParserError>>()?;
        Ok(Self { selectors })
    }

    pub fn select_all<'a>(&self, scope: ElementRef<'a>) -> Option<(&'static str, Vec<ElementRef<'a>>)> {
        self.selectors.iter().find_map(|(raw, selector)| {
            let found: Vec<_> = scope.select(selector).collect();
            if found.is_empty() {
                trace!(selector = raw, "cascade selector matched nothing");
                None
            } else {
                Some((*raw, found))
            }
        })
    }
}

pub fn compile_selector(raw: &str) -> Result<Selector, ParserError> {
    Selector::parse(raw).map_err(|e| ParserError::HtmlParseError(format!("selector `{}`: {}", raw, e)))
}

/// Text content of an element with runs of whitespace collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}
