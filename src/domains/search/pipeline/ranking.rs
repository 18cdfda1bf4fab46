//! Stage 7: deterministic weighted-sum scoring. Weight selection is a
//! deterministic rule first; the LM is only consulted otherwise. Invariant:
//! any absent signal has its weight forced to 0 before scoring.

use std::cmp::Ordering;

use crate::common::geocoding::calculate_distance_km;
use crate::domains::search::models::PlaceResult;
use crate::domains::search::pipeline::route_mapping::RankingProfile;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub rating: f64,
    pub review_count: f64,
    pub distance: f64,
    pub open_boost: f64,
    pub cuisine_match: f64,
}

impl RankingWeights {
    /// Configuration, per spec §9's open question: the specific numbers are
    /// not otherwise documented and are treated as tunable defaults.
    pub fn default_profile() -> Self {
        Self {
            rating: 0.35,
            review_count: 0.15,
            distance: 0.2,
            open_boost: 0.15,
            cuisine_match: 0.15,
        }
    }

    pub fn distance_heavy_profile() -> Self {
        Self {
            rating: 0.2,
            review_count: 0.1,
            distance: 0.5,
            open_boost: 0.1,
            cuisine_match: 0.1,
        }
    }

    /// Deterministic rule first: a `NEARBY` route with a known user location
    /// is distance-heavy. Otherwise the default profile is used (the LM-
    /// selected profile path is intentionally not modeled here beyond the
    /// deterministic rule, per spec §9's fallback-weights open question).
    pub fn select(profile: RankingProfile, user_location: Option<(f64, f64)>) -> Self {
        match (profile, user_location) {
            (RankingProfile::DistanceHeavy, Some(_)) => Self::distance_heavy_profile(),
            _ => Self::default_profile(),
        }
    }

    /// Zero-forcing invariant: an absent signal's weight is forced to 0
    /// before scoring, regardless of the selected profile.
    pub fn zero_forced(
        mut self,
        user_location: Option<(f64, f64)>,
        cuisine_key: Option<&str>,
        open_now_requested: bool,
    ) -> Self {
        if user_location.is_none() {
            self.distance = 0.0;
        }
        if cuisine_key.is_none() {
            self.cuisine_match = 0.0;
        }
        if !open_now_requested {
            self.open_boost = 0.0;
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct ScoredResult {
    pub place: PlaceResult,
    pub score: f64,
    pub provider_index: usize,
}

fn normalize_rating(place: &PlaceResult) -> f64 {
    place.rating.unwrap_or(0.0) / 5.0
}

fn normalize_reviews(place: &PlaceResult) -> f64 {
    // log-scale so a handful of extra reviews doesn't dominate the score.
    (place.review_count.unwrap_or(0) as f64 + 1.0).ln() / 10.0
}

fn normalize_distance(place: &PlaceResult, user_location: Option<(f64, f64)>) -> f64 {
    let Some((lat, lng)) = user_location else {
        return 0.0;
    };
    let km = calculate_distance_km(lat, lng, place.latitude, place.longitude);
    // closer is better: invert and clamp to [0, 1] over a 20km horizon.
    (1.0 - (km / 20.0).min(1.0)).max(0.0)
}

fn open_boost(place: &PlaceResult) -> f64 {
    if place.open_now == crate::domains::search::models::OpenNowState::Open {
        1.0
    } else {
        0.0
    }
}

fn cuisine_match(_place: &PlaceResult, cuisine_key: Option<&str>) -> f64 {
    // Opaque matching signal — the actual cuisine taxonomy lookup is
    // outside this spec's scope; presence of a cuisine key is what the
    // zero-forcing invariant cares about.
    if cuisine_key.is_some() {
        1.0
    } else {
        0.0
    }
}

pub fn rank(
    places: Vec<PlaceResult>,
    weights: RankingWeights,
    user_location: Option<(f64, f64)>,
    cuisine_key: Option<&str>,
) -> Vec<ScoredResult> {
    let mut scored: Vec<ScoredResult> = places
        .into_iter()
        .enumerate()
        .map(|(provider_index, place)| {
            let score = weights.rating * normalize_rating(&place)
                + weights.review_count * normalize_reviews(&place)
                + weights.distance * normalize_distance(&place, user_location)
                + weights.open_boost * open_boost(&place)
                + weights.cuisine_match * cuisine_match(&place, cuisine_key);
            ScoredResult {
                place,
                score,
                provider_index,
            }
        })
        .collect();

    // Tie-break order: score desc, rating desc, reviews desc, provider index asc.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.place
                    .rating
                    .unwrap_or(0.0)
                    .partial_cmp(&a.place.rating.unwrap_or(0.0))
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| b.place.review_count.unwrap_or(0).cmp(&a.place.review_count.unwrap_or(0)))
            .then_with(|| a.provider_index.cmp(&b.provider_index))
    });

    scored
}
