//! Property tests for holder filtering and selection

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;

use crate::holders::{filter_eligible, EligibilityRules};
use crate::selection::{
    decide, validate_selection, weighted_pick, Band, Outcome, RewardRange, PRIORITY_BAND_END,
};
use crate::token_config::TokenConfig;
use crate::types::TokenHolder;

fn holder_set() -> impl Strategy<Value = Vec<(TokenHolder, bool)>> {
    prop::collection::vec(
        (any::<[u8; 32]>(), 0.0f64..120_000_000.0, any::<bool>()),
        1..40,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(key, balance, excluded)| {
                (TokenHolder::new(Pubkey::new_from_array(key), balance), excluded)
            })
            .collect()
    })
}

fn config_excluding(excluded: HashSet<Pubkey>) -> TokenConfig {
    TokenConfig {
        mint: Pubkey::new_unique(),
        burn_address: Pubkey::new_unique(),
        excluded_wallets: excluded,
        flip_interval_seconds: 300,
    }
}

proptest! {
    #[test]
    fn prop_weighted_winner_is_never_excluded_or_over_cap(
        rows in holder_set(),
        draw in PRIORITY_BAND_END..1.0f64,
        seed in any::<u64>(),
    ) {
        let excluded: HashSet<Pubkey> = rows
            .iter()
            .filter(|(_, excluded)| *excluded)
            .map(|(h, _)| h.address)
            .collect();
        let config = config_excluding(excluded);
        let rules = EligibilityRules::default();
        let holders: Vec<TokenHolder> = rows.into_iter().map(|(h, _)| h).collect();

        let eligible = filter_eligible(holders, &config, &rules);
        let mut rng = StdRng::seed_from_u64(seed);

        match decide(draw, &[], &eligible, &mut rng) {
            Ok(outcome) => {
                let recipient = outcome.recipient().unwrap();
                prop_assert!(!config.is_excluded(&recipient));
                let winner = eligible.iter().find(|h| h.address == recipient).unwrap();
                prop_assert!(winner.balance <= 50_000_000.0);
                prop_assert!(validate_selection(&outcome, &config, &eligible, &rules).is_ok());
            }
            // Only possible when nothing survived the filters
            Err(_) => prop_assert!(eligible.is_empty()),
        }
    }

    #[test]
    fn prop_bands_partition_unit_interval(draw in 0.0f64..1.0) {
        let band = Band::from_draw(draw);
        let expected = if draw < 0.35 {
            Band::Burn
        } else if draw < 0.53 {
            Band::Priority
        } else {
            Band::Weighted
        };
        prop_assert_eq!(band, expected);

        let mut rng = StdRng::seed_from_u64(0);
        let holders = vec![TokenHolder::new(Pubkey::new_unique(), 1.0)];
        let outcome = decide(draw, &[Pubkey::new_unique()], &holders, &mut rng).unwrap();
        prop_assert_eq!(outcome == Outcome::Burn, band == Band::Burn);
    }

    #[test]
    fn prop_reward_amount_in_range(seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let amount = RewardRange::default().draw(&mut rng);
        prop_assert!((5_000..=10_000).contains(&amount.micros()));
        prop_assert_eq!(amount.lamports() % 1_000, 0);
    }

    #[test]
    fn prop_weighted_pick_only_returns_positive_balances(
        rows in holder_set(),
        unit in 0.0f64..1.0,
    ) {
        let holders: Vec<TokenHolder> = rows.into_iter().map(|(h, _)| h).collect();
        if let Some(winner) = weighted_pick(&holders, unit) {
            prop_assert!(winner.balance > 0.0);
        }
    }
}
