//! Random multiplier draws
//!
//! Draws come from a fixed two-tier piecewise-uniform mixture that favours the
//! house: 65% of draws land in the low band, the rest are split between a
//! medium, high and very high band.

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Probability of drawing from the low (loss-biased) band
pub const LOW_TIER_PROBABILITY: f64 = 0.65;
/// Within the upper tier: cumulative cut-off for the medium band
pub const MEDIUM_BAND_CUTOFF: f64 = 0.70;
/// Within the upper tier: cumulative cut-off for the high band
pub const HIGH_BAND_CUTOFF: f64 = 0.90;

/// Smallest multiplier a draw can produce
pub const MIN_DRAW: Decimal = dec!(0.10);
/// Largest multiplier a draw can produce
pub const MAX_DRAW: Decimal = dec!(50.00);

/// Bands of the draw distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Band {
    pub const ALL: [Band; 4] = [Band::Low, Band::Medium, Band::High, Band::VeryHigh];

    /// Inclusive uniform range of the band
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Band::Low => (0.1, 2.0),
            Band::Medium => (1.0, 5.0),
            Band::High => (5.0, 20.0),
            Band::VeryHigh => (20.0, 50.0),
        }
    }

    /// Overall probability that a draw comes from this band
    pub fn weight(self) -> f64 {
        let upper = 1.0 - LOW_TIER_PROBABILITY;
        match self {
            Band::Low => LOW_TIER_PROBABILITY,
            Band::Medium => upper * MEDIUM_BAND_CUTOFF,
            Band::High => upper * (HIGH_BAND_CUTOFF - MEDIUM_BAND_CUTOFF),
            Band::VeryHigh => upper * (1.0 - HIGH_BAND_CUTOFF),
        }
    }
}

/// A single draw together with the band it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Draw {
    pub band: Band,
    pub multiplier: Decimal,
}

/// Pick a band, then a uniform value inside it, rounded to 2 decimals
pub fn draw_from<R: Rng + ?Sized>(rng: &mut R) -> Draw {
    let band = if rng.gen::<f64>() < LOW_TIER_PROBABILITY {
        Band::Low
    } else {
        let r2 = rng.gen::<f64>();
        if r2 < MEDIUM_BAND_CUTOFF {
            Band::Medium
        } else if r2 < HIGH_BAND_CUTOFF {
            Band::High
        } else {
            Band::VeryHigh
        }
    };

    let (low, high) = band.bounds();
    let value = rng.gen_range(low..=high);

    Draw {
        band,
        multiplier: round_to_cents(value),
    }
}

fn round_to_cents(value: f64) -> Decimal {
    let cents = (value * 100.0).round() as i64;
    Decimal::new(cents, 2).clamp(MIN_DRAW, MAX_DRAW)
}

/// Probability that a draw reaches `target`, i.e. the chance a bet on
/// `target` wins. Ignores the 0.01 rounding of drawn values.
///
/// This is computed exactly from the band mixture, not read from a fixed
/// step table of odds, so it tracks the draw if the bands ever change.
pub fn win_probability(target: f64) -> f64 {
    Band::ALL
        .iter()
        .map(|band| {
            let (low, high) = band.bounds();
            let share = if target <= low {
                1.0
            } else if target >= high {
                0.0
            } else {
                (high - target) / (high - low)
            };
            band.weight() * share
        })
        .sum()
}

/// Source of drawn multipliers used by the betting service
pub trait OutcomeSource: Send + Sync {
    fn draw(&self) -> Decimal;
}

/// Production generator backed by the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OutcomeGenerator;

impl OutcomeGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl OutcomeSource for OutcomeGenerator {
    fn draw(&self) -> Decimal {
        draw_from(&mut rand::thread_rng()).multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashMap;

    #[test]
    fn test_draws_stay_in_range_with_two_decimals() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let draw = draw_from(&mut rng);
            assert!(draw.multiplier >= MIN_DRAW && draw.multiplier <= MAX_DRAW);
            assert!(draw.multiplier.scale() <= 2);
            assert_eq!(draw.multiplier, draw.multiplier.round_dp(2));
        }
    }

    #[test]
    fn test_draw_lies_inside_its_band() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..10_000 {
            let draw = draw_from(&mut rng);
            let (low, high) = draw.band.bounds();
            let low = round_to_cents(low);
            let high = round_to_cents(high);
            assert!(draw.multiplier >= low && draw.multiplier <= high, "{:?}", draw);
        }
    }

    #[test]
    fn test_band_distribution_matches_tiers() {
        const DRAWS: usize = 100_000;
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts: HashMap<Band, usize> = HashMap::new();
        for _ in 0..DRAWS {
            *counts.entry(draw_from(&mut rng).band).or_default() += 1;
        }

        let low = counts[&Band::Low] as f64 / DRAWS as f64;
        assert!((low - 0.65).abs() < 0.01, "low tier share {}", low);

        let upper = (DRAWS - counts[&Band::Low]) as f64;
        let medium = counts[&Band::Medium] as f64 / upper;
        let high = counts[&Band::High] as f64 / upper;
        let very_high = counts[&Band::VeryHigh] as f64 / upper;
        assert!((medium - 0.70).abs() < 0.015, "medium share {}", medium);
        assert!((high - 0.20).abs() < 0.015, "high share {}", high);
        assert!((very_high - 0.10).abs() < 0.01, "very high share {}", very_high);
    }

    #[test]
    fn test_band_weights_sum_to_one() {
        let total: f64 = Band::ALL.iter().map(|b| b.weight()).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_win_probability_shape() {
        assert!((win_probability(0.1) - 1.0).abs() < 1e-12);
        assert_eq!(win_probability(50.0), 0.0);

        // Only the medium band and above can reach 2.0x
        let expected = 0.35 * 0.70 * 0.75 + 0.35 * 0.30;
        assert!((win_probability(2.0) - expected).abs() < 1e-12);

        assert!(win_probability(2.0) > win_probability(5.0));
        assert!(win_probability(5.0) > win_probability(20.0));
    }

    #[test]
    fn test_win_probability_matches_empirical_rate() {
        let mut rng = StdRng::seed_from_u64(3);
        let target = Decimal::new(20, 1);
        let wins = (0..100_000)
            .filter(|_| draw_from(&mut rng).multiplier >= target)
            .count();
        let empirical = wins as f64 / 100_000.0;
        assert!((empirical - win_probability(2.0)).abs() < 0.01);
    }
}
