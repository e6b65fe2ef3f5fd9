// Derived market figures computed from extracted listing data.

pub mod market;

pub use market::MarketAnalyzer;
