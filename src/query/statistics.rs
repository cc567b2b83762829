//! Monthly statistics over settled transfers

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Aggregates for one direction (sent or received) within the window.
///
/// A direction with no matching transfers reports all zeroes rather than
/// failing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectionStats {
    pub total: Decimal,
    pub count: u32,
    pub highest: Decimal,
    pub lowest: Decimal,
    /// Rounded to 2 decimal places, half-up
    pub average: Decimal,
}

impl DirectionStats {
    pub fn from_amounts(amounts: &[Decimal]) -> Self {
        if amounts.is_empty() {
            return Self::default();
        }

        let total: Decimal = amounts.iter().sum();
        let count = amounts.len() as u32;
        let highest = *amounts.iter().max().unwrap();
        let lowest = *amounts.iter().min().unwrap();
        let average = (total / Decimal::from(count))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        Self {
            total,
            count,
            highest,
            lowest,
            average,
        }
    }
}

/// Per-customer monthly statistics, both directions computed independently
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyStatistics {
    pub monthly_received_amount: Decimal,
    pub monthly_sent_amount: Decimal,
    pub received_count: u32,
    pub sent_count: u32,
    pub average_amount_received: Decimal,
    pub average_amount_sent: Decimal,
    pub highest_amount_received: Decimal,
    pub lowest_amount_received: Decimal,
    pub highest_amount_sent: Decimal,
    pub lowest_amount_sent: Decimal,
}

impl MonthlyStatistics {
    pub fn from_directions(received: DirectionStats, sent: DirectionStats) -> Self {
        Self {
            monthly_received_amount: received.total,
            monthly_sent_amount: sent.total,
            received_count: received.count,
            sent_count: sent.count,
            average_amount_received: received.average,
            average_amount_sent: sent.average,
            highest_amount_received: received.highest,
            lowest_amount_received: received.lowest,
            highest_amount_sent: sent.highest,
            lowest_amount_sent: sent.lowest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_empty_direction_is_all_zero() {
        let stats = DirectionStats::from_amounts(&[]);
        assert_eq!(stats, DirectionStats::default());
        assert_eq!(stats.count, 0);
        assert_eq!(stats.total, Decimal::ZERO);
    }

    #[test]
    fn test_single_amount() {
        let stats = DirectionStats::from_amounts(&[Decimal::from(100)]);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.total, Decimal::from(100));
        assert_eq!(stats.highest, Decimal::from(100));
        assert_eq!(stats.lowest, Decimal::from(100));
        assert_eq!(stats.average, Decimal::from_str("100.00").unwrap());
    }

    #[test]
    fn test_average_rounds_half_up() {
        // 10 + 5 + 5 = 20, / 3 = 6.666... -> 6.67
        let amounts = [Decimal::from(10), Decimal::from(5), Decimal::from(5)];
        let stats = DirectionStats::from_amounts(&amounts);
        assert_eq!(stats.average, Decimal::from_str("6.67").unwrap());

        // 1 + 2 = 3, / 2 = 1.5 stays exact at 2dp
        let amounts = [Decimal::from(1), Decimal::from(2)];
        let stats = DirectionStats::from_amounts(&amounts);
        assert_eq!(stats.average, Decimal::from_str("1.50").unwrap());

        // 0.01 + 0.02 + 0.02 = 0.05, / 3 = 0.01666... -> 0.02
        let amounts = [
            Decimal::from_str("0.01").unwrap(),
            Decimal::from_str("0.02").unwrap(),
            Decimal::from_str("0.02").unwrap(),
        ];
        let stats = DirectionStats::from_amounts(&amounts);
        assert_eq!(stats.average, Decimal::from_str("0.02").unwrap());
    }

    #[test]
    fn test_min_max() {
        let amounts = [
            Decimal::from(30),
            Decimal::from(10),
            Decimal::from(20),
        ];
        let stats = DirectionStats::from_amounts(&amounts);
        assert_eq!(stats.highest, Decimal::from(30));
        assert_eq!(stats.lowest, Decimal::from(10));
        assert_eq!(stats.total, Decimal::from(60));
    }

    #[test]
    fn test_monthly_statistics_composition() {
        let received = DirectionStats::from_amounts(&[Decimal::from(40)]);
        let sent = DirectionStats::from_amounts(&[]);
        let stats = MonthlyStatistics::from_directions(received, sent);

        assert_eq!(stats.received_count, 1);
        assert_eq!(stats.monthly_received_amount, Decimal::from(40));
        assert_eq!(stats.sent_count, 0);
        assert_eq!(stats.monthly_sent_amount, Decimal::ZERO);
        assert_eq!(stats.average_amount_sent, Decimal::ZERO);
    }
}
