use alloy_primitives::U256;
use chaindb_primitives::{ChainSpec, Era, Header};

/// Blocks per difficulty-bomb period.
const EXP_DIFF_PERIOD: u64 = 100_000;

/// Largest number of missed ten-second periods the Homestead formula
/// penalizes.
const MAX_ADJUSTMENT_PERIODS: u64 = 99;

/// Calculates the canonical difficulty of `header` from its parent under the
/// era rules selected by the chain parameters.
///
/// Homestead adjusts by `parent_diff / 2048 * max(1 - elapsed/10, -99)`;
/// Frontier and Olympic adjust by `+/- parent_diff / bound_divisor` around the
/// duration limit. Both add the difficulty bomb `2^(number/100000 - 2)`
/// (omitted while the exponent is negative) and floor the result at the
/// chain's minimum difficulty.
pub fn calculate_difficulty(spec: &ChainSpec, header: &Header, parent: &Header) -> U256 {
    let elapsed = header.timestamp.saturating_sub(parent.timestamp);

    let adjusted = match spec.era_at(header.number) {
        Era::Homestead => {
            let adjustment = parent.difficulty / U256::from(2_048u64);
            let periods = elapsed / 10;
            if periods == 0 {
                parent.difficulty + adjustment
            } else {
                let missed = U256::from((periods - 1).min(MAX_ADJUSTMENT_PERIODS));
                parent.difficulty.saturating_sub(adjustment * missed)
            }
        }
        Era::Frontier => {
            let adjustment = parent.difficulty / spec.difficulty_bound_divisor;
            if elapsed < spec.duration_limit {
                parent.difficulty + adjustment
            } else {
                parent.difficulty.saturating_sub(adjustment)
            }
        }
    };

    let with_bomb = adjusted + difficulty_bomb(header.number);
    spec.minimum_difficulty.max(with_bomb)
}

/// The exponential difficulty increase, `2^(number/100000 - 2)`, zero while
/// the exponent is negative.
fn difficulty_bomb(number: u64) -> U256 {
    let periods = number / EXP_DIFF_PERIOD;
    if periods < 2 {
        return U256::ZERO
    }
    U256::from(1u64) << ((periods - 2) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent(difficulty: u64, timestamp: u64, number: u64) -> Header {
        Header { difficulty: U256::from(difficulty), timestamp, number, ..Default::default() }
    }

    fn candidate(timestamp: u64, number: u64) -> Header {
        Header { timestamp, number, ..Default::default() }
    }

    #[test]
    fn homestead_on_target_block() {
        // Ten-second delta leaves the difficulty unchanged; the bomb adds
        // 2^(1000000/100000 - 2) = 256.
        let spec = ChainSpec::homestead_test();
        let parent = parent(0x100000, 1_000, 999_999);
        let header = candidate(1_010, 1_000_000);
        assert_eq!(calculate_difficulty(&spec, &header, &parent), U256::from(0x100100u64));
    }

    #[test]
    fn homestead_fast_block_increases() {
        let spec = ChainSpec::homestead_test();
        let parent = parent(0x100000, 1_000, 49_999);
        let header = candidate(1_005, 50_000);
        // elapsed/10 == 0: difficulty rises by parent/2048, no bomb below
        // block 200000.
        assert_eq!(
            calculate_difficulty(&spec, &header, &parent),
            U256::from(0x100000u64 + 0x100000 / 2_048)
        );
    }

    #[test]
    fn homestead_adjustment_saturates_at_minus_ninety_nine() {
        let spec = ChainSpec::homestead_test();
        let parent = parent(2_048_000, 1_000, 10);
        // A delta of 10000 seconds implies b = 1 - 1000, saturated to -99.
        let header = candidate(11_000, 11);
        let expected = U256::from(2_048_000u64 - 99 * (2_048_000 / 2_048));
        assert_eq!(calculate_difficulty(&spec, &header, &parent), expected);
    }

    #[test]
    fn frontier_fast_block_increases() {
        // Bomb exponent is negative below block 200000 and is omitted.
        let spec = ChainSpec::frontier();
        let parent = parent(131_072, 1_000, 100);
        let header = candidate(1_005, 101);
        assert_eq!(calculate_difficulty(&spec, &header, &parent), U256::from(131_136u64));
    }

    #[test]
    fn frontier_slow_block_floors_at_minimum() {
        let spec = ChainSpec::frontier();
        let parent = parent(131_072, 1_000, 100);
        // Delta of exactly the duration limit counts as slow.
        let header = candidate(1_013, 101);
        assert_eq!(calculate_difficulty(&spec, &header, &parent), spec.minimum_difficulty);
    }

    #[test]
    fn olympic_duration_limit_differs() {
        let spec = ChainSpec::olympic();
        let parent = parent(1_000_000, 1_000, 100);
        // Nine seconds: fast under Frontier (13s), slow under Olympic (8s).
        let header = candidate(1_009, 101);
        let adjustment = U256::from(1_000_000u64 / 2_048);
        assert_eq!(
            calculate_difficulty(&spec, &header, &parent),
            U256::from(1_000_000u64) - adjustment
        );

        let frontier = ChainSpec::frontier();
        assert_eq!(
            calculate_difficulty(&frontier, &header, &parent),
            U256::from(1_000_000u64) + adjustment
        );
    }

    #[test]
    fn bomb_kicks_in_at_two_hundred_thousand() {
        let spec = ChainSpec::frontier();
        let parent = parent(131_072, 1_000, 199_999);
        let header = candidate(1_001, 200_000);
        // 2^(200000/100000 - 2) = 1.
        assert_eq!(
            calculate_difficulty(&spec, &header, &parent),
            U256::from(131_072u64 + 131_072 / 2_048 + 1)
        );
    }
}
