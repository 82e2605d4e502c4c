use super::*;
use crate::test_utils::arb_messy_string;
use proptest::prelude::*;

/// Generates a ConfigUpdate touching a random subset of fields
fn arb_config_update() -> impl Strategy<Value = ConfigUpdate> {
    (
        prop::option::of(arb_messy_string()),
        prop::option::of(arb_messy_string()),
        prop::option::of(1i64..10_000),
        prop::option::of(prop_oneof![
            Just(LlmProvider::None),
            Just(LlmProvider::Openai),
            Just(LlmProvider::Gemini),
        ]),
        prop::option::of(0i32..=100),
        prop::option::of(any::<bool>()),
    )
        .prop_map(
            |(database_url, bind_address, token_ttl_minutes, llm_provider, unlock_threshold, enforce_time_limits)| {
                ConfigUpdate {
                    database_url,
                    bind_address,
                    token_ttl_minutes,
                    llm_provider,
                    unlock_threshold,
                    enforce_time_limits,
                    ..Default::default()
                }
            },
        )
}

proptest! {
    /// Fields present in the update win; absent ones keep the old value
    #[test]
    fn prop_apply_update_field_wise(update in arb_config_update()) {
        let base = base_config(None);
        let merged = base.clone().apply_update(update.clone());

        prop_assert_eq!(merged.database_url, update.database_url.unwrap_or(base.database_url));
        prop_assert_eq!(merged.bind_address, update.bind_address.unwrap_or(base.bind_address));
        prop_assert_eq!(merged.token_ttl_minutes, update.token_ttl_minutes.unwrap_or(base.token_ttl_minutes));
        prop_assert_eq!(merged.llm_provider, update.llm_provider.unwrap_or(base.llm_provider));
        prop_assert_eq!(merged.unlock_threshold, update.unlock_threshold.unwrap_or(base.unlock_threshold));
        prop_assert_eq!(merged.enforce_time_limits, update.enforce_time_limits.unwrap_or(base.enforce_time_limits));
    }

    /// Applying an empty update is the identity
    #[test]
    fn prop_empty_update_is_identity(update in arb_config_update()) {
        let config = base_config(None).apply_update(update);
        let again = config.clone().apply_update(ConfigUpdate::default());
        prop_assert_eq!(format!("{config:?}"), format!("{again:?}"));
    }

}
