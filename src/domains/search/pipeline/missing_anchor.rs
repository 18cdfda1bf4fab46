//! Stage 4: if the route needs a location and none is present, short-circuit
//! to a deterministic CLARIFY asking for one.

use super::route_mapping::ProviderRequestMapping;
use crate::domains::search::pipeline::intent::ProviderRoute;

pub struct MissingAnchor {
    pub blocks_search: bool,
    pub question: &'static str,
    pub suggested_action: &'static str,
}

/// `NEARBY` and `LANDMARK` routes need an anchor (user coordinates, a city,
/// or landmark text); `TEXTSEARCH` does not strictly require one (the query
/// text itself may carry a place name).
pub fn check_missing_anchor(
    mapping: &ProviderRequestMapping,
    city_hint: Option<&str>,
    landmark_text: Option<&str>,
) -> Option<MissingAnchor> {
    let needs_anchor = matches!(mapping.route, ProviderRoute::Nearby | ProviderRoute::Landmark);
    if !needs_anchor {
        return None;
    }

    let has_anchor = mapping.bias.is_some() || city_hint.is_some() || landmark_text.is_some();
    if has_anchor {
        return None;
    }

    Some(MissingAnchor {
        blocks_search: true,
        question: "Which city or area should I search near?",
        suggested_action: "ASK_LOCATION",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::search::pipeline::route_mapping::RankingProfile;

    fn mapping(route: ProviderRoute, bias: bool) -> ProviderRequestMapping {
        ProviderRequestMapping {
            route,
            canonical_query: "restaurants".into(),
            language_code: "en".into(),
            region_code: None,
            bias: bias.then_some(super::super::route_mapping::BiasCircle {
                latitude: 1.0,
                longitude: 1.0,
                radius_m: 1000,
            }),
            ranking_profile: RankingProfile::Default,
        }
    }

    #[test]
    fn nearby_without_any_anchor_blocks_search() {
        let m = mapping(ProviderRoute::Nearby, false);
        let anchor = check_missing_anchor(&m, None, None).unwrap();
        assert!(anchor.blocks_search);
        assert_eq!(anchor.suggested_action, "ASK_LOCATION");
    }

    #[test]
    fn nearby_with_bias_does_not_block() {
        let m = mapping(ProviderRoute::Nearby, true);
        assert!(check_missing_anchor(&m, None, None).is_none());
    }

    #[test]
    fn textsearch_never_requires_an_anchor() {
        let m = mapping(ProviderRoute::TextSearch, false);
        assert!(check_missing_anchor(&m, None, None).is_none());
    }

    #[test]
    fn landmark_with_city_hint_does_not_block() {
        let m = mapping(ProviderRoute::Landmark, false);
        assert!(check_missing_anchor(&m, Some("Tel Aviv"), None).is_none());
    }
}
