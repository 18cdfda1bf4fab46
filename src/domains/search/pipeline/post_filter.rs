//! Stage 6: drops permanently-closed places; optionally applies open-now,
//! price, and rating-bucket constraints.

use crate::domains::search::models::{BusinessStatus, OpenNowState, PlaceResult};

#[derive(Debug, Clone, Default)]
pub struct PostFilterConstraints {
    pub open_now_only: bool,
    pub max_price_level: Option<u8>,
    pub min_rating: Option<f64>,
}

pub fn apply_post_filter(
    results: Vec<PlaceResult>,
    constraints: &PostFilterConstraints,
) -> Vec<PlaceResult> {
    results
        .into_iter()
        .filter(|r| r.business_status != BusinessStatus::ClosedPermanently)
        .filter(|r| !constraints.open_now_only || r.open_now == OpenNowState::Open)
        .filter(|r| match (constraints.max_price_level, r.price_level) {
            (Some(max), Some(level)) => level <= max,
            _ => true,
        })
        .filter(|r| match (constraints.min_rating, r.rating) {
            (Some(min), Some(rating)) => rating >= min,
            (Some(_), None) => false,
            (None, _) => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(status: BusinessStatus, open: OpenNowState, rating: Option<f64>, price: Option<u8>) -> PlaceResult {
        PlaceResult {
            id: "p1".into(),
            name: "Place".into(),
            address: "1 Main St".into(),
            latitude: 0.0,
            longitude: 0.0,
            rating,
            review_count: Some(10),
            price_level: price,
            business_status: status,
            open_now: open,
            photo_reference: None,
        }
    }

    #[test]
    fn permanently_closed_places_are_always_dropped() {
        let results = vec![place(
            BusinessStatus::ClosedPermanently,
            OpenNowState::Unknown,
            None,
            None,
        )];
        let filtered = apply_post_filter(results, &PostFilterConstraints::default());
        assert!(filtered.is_empty());
    }

    #[test]
    fn open_now_only_drops_closed_and_unknown() {
        let results = vec![
            place(BusinessStatus::Operational, OpenNowState::Open, None, None),
            place(BusinessStatus::Operational, OpenNowState::Closed, None, None),
            place(BusinessStatus::Operational, OpenNowState::Unknown, None, None),
        ];
        let filtered = apply_post_filter(
            results,
            &PostFilterConstraints {
                open_now_only: true,
                ..Default::default()
            },
        );
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn min_rating_drops_places_with_no_rating() {
        let results = vec![place(BusinessStatus::Operational, OpenNowState::Open, None, None)];
        let filtered = apply_post_filter(
            results,
            &PostFilterConstraints {
                min_rating: Some(4.0),
                ..Default::default()
            },
        );
        assert!(filtered.is_empty());
    }

    #[test]
    fn no_constraints_passes_everything_not_permanently_closed() {
        let results = vec![
            place(BusinessStatus::Operational, OpenNowState::Unknown, None, None),
            place(BusinessStatus::ClosedTemporarily, OpenNowState::Closed, None, None),
        ];
        let filtered = apply_post_filter(results, &PostFilterConstraints::default());
        assert_eq!(filtered.len(), 2);
    }
}
