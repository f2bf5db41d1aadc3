// Small numeric helpers shared by the metrics and tactics modules.

use serde::Serialize;

/// `numerator / denominator`, or 0.0 when the denominator is zero. Metrics
/// are averaged across matches downstream, so they never carry NaN.
pub fn ratio(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Arithmetic mean of the present values, 0.0 when there are none.
pub fn mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Points (or games, or sets) played and won, with the win rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WinRate {
    pub played: u32,
    pub won: u32,
    pub win_pct: f64,
}

impl WinRate {
    pub fn record(&mut self, won: bool) {
        self.played += 1;
        if won {
            self.won += 1;
        }
        self.win_pct = ratio(self.won, self.played);
    }

    pub fn from_outcomes<I: IntoIterator<Item = bool>>(outcomes: I) -> Self {
        let mut rate = Self::default();
        for won in outcomes {
            rate.record(won);
        }
        rate
    }
}
