//! Property-based tests for configuration module
//!
//! These tests use proptest to generate random configurations and verify
//! validation and serialization invariants.

use super::*;
use proptest::prelude::*;

fn pacing_policy() -> impl Strategy<Value = PacingPolicy> {
    prop_oneof![
        Just(PacingPolicy::Unpaced),
        Just(PacingPolicy::BlockingRoundTrip),
        Just(PacingPolicy::FrameCallbackGated),
    ]
}

// Strategy for generating valid window configurations
prop_compose! {
    fn valid_window_config()(
        title in "[a-zA-Z0-9 _-]{1,32}",
        app_id in "[a-z][a-z0-9.]{0,31}",
        slot_count in 1u8..=(MAX_SLOTS as u8),
        pacing in pacing_policy(),
    ) -> WindowConfig {
        WindowConfig {
            title,
            app_id,
            slot_count,
            pacing,
        }
    }
}

prop_compose! {
    fn valid_config()(
        window in valid_window_config(),
        queue_capacity in 1usize..100_000,
        timeout_ms in proptest::option::of(1u64..60_000),
        display in proptest::option::of("wayland-[0-9]"),
    ) -> PaneConfig {
        PaneConfig {
            session: SessionConfig { display },
            window,
            events: EventConfig { queue_capacity },
            dispatch: DispatchConfig { timeout_ms },
        }
    }
}

proptest! {
    #[test]
    fn valid_configs_validate(config in valid_config()) {
        prop_assert!(config.validate().is_ok());
    }

    #[test]
    fn valid_configs_survive_toml(config in valid_config()) {
        let text = toml::to_string(&config).unwrap();
        let parsed: PaneConfig = toml::from_str(&text).unwrap();
        prop_assert_eq!(parsed, config);
    }

    #[test]
    fn out_of_range_slot_counts_fail(slot_count in (MAX_SLOTS as u8 + 1)..=u8::MAX) {
        let mut config = PaneConfig::default();
        config.window.slot_count = slot_count;
        prop_assert!(config.validate().is_err());
    }

    #[test]
    fn merge_with_default_is_identity(config in valid_config()) {
        let merged = config.clone().merge_partial(PaneConfig::default());
        prop_assert_eq!(merged, config);
    }
}
