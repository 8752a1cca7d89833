use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rust_decimal::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::config::GbmConfig;
use crate::models::RawTick;

/// Per-symbol stochastic process state
///
/// Each symbol carries its own random stream so paths stay uncorrelated.
struct GeneratorState {
    price: f64,
    rng: StdRng,
}

/// Random-walk tick generator (discretized Geometric Brownian Motion)
///
/// Advances each symbol by
/// `price' = price * exp((mu - sigma^2/2) * dt + sigma * sqrt(dt) * Z)`
/// with `Z ~ N(0, 1)`, flooring the result at a small positive epsilon.
/// State is created when GBM mode starts (seeded from the last broadcast
/// price per symbol) and dropped when the mode exits.
pub struct GbmGenerator {
    states: Vec<(String, GeneratorState)>,
    drift: f64,
    volatility: f64,
    dt: f64,
    price_floor: f64,
}

impl GbmGenerator {
    /// Build a generator from `(symbol, seed_price)` pairs
    ///
    /// `dt` is the scheduler interval in the same (annualized) unit as
    /// `drift`/`volatility`. With `config.seed` set, every symbol derives a
    /// reproducible stream from the base seed and its name; otherwise each
    /// stream is drawn independently from the thread generator.
    pub fn new(seeds: Vec<(String, f64)>, config: &GbmConfig, dt: f64) -> Self {
        let states = seeds
            .into_iter()
            .map(|(symbol, price)| {
                let rng = match config.seed {
                    Some(base) => StdRng::seed_from_u64(base ^ symbol_hash(&symbol)),
                    None => StdRng::from_rng(&mut rand::rng()),
                };
                let price = if price > 0.0 { price } else { config.initial_price };
                (symbol, GeneratorState { price, rng })
            })
            .collect();

        Self {
            states,
            drift: config.drift,
            volatility: config.volatility,
            dt,
            price_floor: config.price_floor,
        }
    }

    /// Advance every symbol by one step and emit the resulting ticks
    pub fn next_round(&mut self) -> Vec<RawTick> {
        let now = Utc::now();
        let mut ticks = Vec::with_capacity(self.states.len());

        for (symbol, state) in &mut self.states {
            let z: f64 = state.rng.sample(StandardNormal);
            let step =
                (self.drift - 0.5 * self.volatility * self.volatility) * self.dt
                    + self.volatility * self.dt.sqrt() * z;
            state.price = (state.price * step.exp()).max(self.price_floor);

            if let Some(price) = Decimal::from_f64_retain(state.price) {
                ticks.push(RawTick::simulated(symbol.clone(), price.round_dp(4), now));
            }
        }

        ticks
    }

    pub fn symbol_count(&self) -> usize {
        self.states.len()
    }
}

fn symbol_hash(symbol: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    symbol.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_config() -> GbmConfig {
        GbmConfig {
            seed: Some(42),
            ..Default::default()
        }
    }

    const DT: f64 = 1.0 / 252.0;

    #[test]
    fn test_seeds_from_last_known_price() {
        let mut generator = GbmGenerator::new(
            vec![("AAPL".to_string(), 175.0)],
            &GbmConfig {
                volatility: 0.0,
                drift: 0.0,
                ..seeded_config()
            },
            DT,
        );

        // Zero drift and volatility: the first tick is exactly the seed price
        let ticks = generator.next_round();
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].ticker, "AAPL");
        assert_eq!(ticks[0].price.to_f64().unwrap(), 175.0);
    }

    #[test]
    fn test_zero_volatility_follows_drift() {
        let config = GbmConfig {
            drift: 0.05,
            volatility: 0.0,
            ..seeded_config()
        };
        let mut generator = GbmGenerator::new(vec![("TCS.NS".to_string(), 100.0)], &config, DT);

        let ticks = generator.next_round();
        let expected = 100.0 * (0.05 * DT).exp();
        let price = ticks[0].price.to_f64().unwrap();
        assert!((price - expected).abs() < 1e-3);
    }

    #[test]
    fn test_price_is_floored_at_epsilon() {
        let config = GbmConfig {
            drift: -1_000_000.0,
            volatility: 0.0,
            price_floor: 0.01,
            ..seeded_config()
        };
        let mut generator = GbmGenerator::new(vec![("PENNY".to_string(), 1.0)], &config, DT);

        for _ in 0..5 {
            let ticks = generator.next_round();
            assert!(ticks[0].price > Decimal::ZERO);
        }
        let ticks = generator.next_round();
        assert_eq!(ticks[0].price.to_f64().unwrap(), 0.01);
    }

    #[test]
    fn test_symbols_use_independent_streams() {
        let config = seeded_config();
        let mut generator = GbmGenerator::new(
            vec![("A".to_string(), 100.0), ("B".to_string(), 100.0)],
            &config,
            DT,
        );

        // Same seed price, same parameters - paths must still diverge
        let mut diverged = false;
        for _ in 0..10 {
            let ticks = generator.next_round();
            if ticks[0].price != ticks[1].price {
                diverged = true;
                break;
            }
        }
        assert!(diverged, "per-symbol streams produced identical paths");
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let config = seeded_config();
        let run = |_: ()| {
            let mut generator =
                GbmGenerator::new(vec![("TCS.NS".to_string(), 3800.0)], &config, DT);
            (0..5)
                .flat_map(|_| generator.next_round())
                .map(|t| t.price)
                .collect::<Vec<_>>()
        };

        assert_eq!(run(()), run(()));
    }

    #[test]
    fn test_non_positive_seed_falls_back_to_initial_price() {
        let config = GbmConfig {
            volatility: 0.0,
            drift: 0.0,
            initial_price: 100.0,
            ..seeded_config()
        };
        let mut generator = GbmGenerator::new(vec![("NEW".to_string(), 0.0)], &config, DT);

        let ticks = generator.next_round();
        assert_eq!(ticks[0].price.to_f64().unwrap(), 100.0);
    }
}
