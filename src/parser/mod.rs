pub mod detail;
pub mod listing;
pub mod rules;

pub use detail::DetailExtractor;
pub use listing::ListingExtractor;
