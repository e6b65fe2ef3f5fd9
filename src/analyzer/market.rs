use crate::model::PointOfInterest;
use crate::utils::group_thousands;

/// Sold-count threshold above which an area counts as high demand.
const HIGH_DEMAND_SALES: u32 = 10;

pub struct MarketAnalyzer;

impl MarketAnalyzer {
    /// "£300/sq. ft" for 300000 over 1000 sq ft. `None` unless both inputs are positive.
    pub fn price_per_area(price: u64, area_sqft: f64) -> Option<String> {
        if price == 0 || !area_sqft.is_finite() || area_sqft <= 0.0 {
            return None;
        }
        let per_unit = (price as f64 / area_sqft).round_ties_even() as u64;
        Some(format!("£{}/sq. ft", group_thousands(per_unit)))
    }

    pub fn market_demand(sold_last_12_months: u32) -> String {
        let level = if sold_last_12_months > HIGH_DEMAND_SALES { "High" } else { "Low" };
        format!("{} ({} properties sold)", level, sold_last_12_months)
    }

    /// Asking price relative to the area average, e.g. "14.3% below".
    pub fn area_growth(price: u64, area_average: u64) -> Option<String> {
        if area_average == 0 {
            return None;
        }
        let pct = (price as f64 - area_average as f64) / area_average as f64 * 100.0;
        let direction = if pct >= 0.0 { "above" } else { "below" };
        Some(format!("{:.1}% {}", pct.abs(), direction))
    }

    pub fn nearby_school_count(points: &[PointOfInterest]) -> usize {
        points
            .iter()
            .filter(|p| p.name.to_lowercase().contains("school"))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PoiKind;

    #[test]
    fn test_price_per_area() {
        assert_eq!(MarketAnalyzer::price_per_area(300000, 1000.0).as_deref(), Some("£300/sq. ft"));
        assert_eq!(MarketAnalyzer::price_per_area(2500000, 1000.0).as_deref(), Some("£2,500/sq. ft"));
        // halves go to the even neighbour: 312.5 -> 312, 313.5 -> 314
        assert_eq!(MarketAnalyzer::price_per_area(250000, 800.0).as_deref(), Some("£312/sq. ft"));
        assert_eq!(MarketAnalyzer::price_per_area(627, 2.0).as_deref(), Some("£314/sq. ft"));
        assert_eq!(MarketAnalyzer::price_per_area(300000, 0.0), None);
        assert_eq!(MarketAnalyzer::price_per_area(0, 1000.0), None);
    }

    #[test]
    fn test_market_demand_threshold() {
        assert_eq!(MarketAnalyzer::market_demand(11), "High (11 properties sold)");
        assert_eq!(MarketAnalyzer::market_demand(10), "Low (10 properties sold)");
    }

    #[test]
    fn test_area_growth() {
        assert_eq!(MarketAnalyzer::area_growth(300000, 350000).as_deref(), Some("14.3% below"));
        assert_eq!(MarketAnalyzer::area_growth(385000, 350000).as_deref(), Some("10.0% above"));
        assert_eq!(MarketAnalyzer::area_growth(350000, 350000).as_deref(), Some("0.0% above"));
        assert_eq!(MarketAnalyzer::area_growth(1, 0), None);
    }

    #[test]
    fn test_school_count_uses_name() {
        let poi = |kind, name: &str| PointOfInterest {
            kind,
            name: name.to_string(),
            distance: "Unknown".to_string(),
        };
        let points = vec![
            poi(PoiKind::School, "St Mary's Primary School"),
            poi(PoiKind::School, "Westminster Academy"),
            poi(PoiKind::Station, "Old School Lane Station"),
        ];
        assert_eq!(MarketAnalyzer::nearby_school_count(&points), 2);
    }
}
