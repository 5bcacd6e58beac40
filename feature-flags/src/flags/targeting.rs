use std::sync::Arc;

use serde::Serialize;
use strum::{Display, EnumIter};

use crate::{
    api::errors::FlagError,
    flags::{
        flag_models::{FlagName, Percentage, Variant},
        flag_store::FlagStore,
        hashing::{hash_string, percentile},
    },
};

/// The A/B tests currently registered. Each one is backed by a variant flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum AbTest {
    NotificationTiming,
    NotificationContent,
    UiVariant,
}

impl AbTest {
    pub fn flag(&self) -> FlagName {
        match self {
            AbTest::NotificationTiming => FlagName::NotificationTimingTest,
            AbTest::NotificationContent => FlagName::NotificationContentTest,
            AbTest::UiVariant => FlagName::UiVariantTest,
        }
    }

    /// Accepts the flag name of the test, e.g. `UI_VARIANT_TEST`.
    pub fn parse(test_name: &str) -> Result<AbTest, FlagError> {
        match FlagName::parse(test_name)? {
            FlagName::NotificationTimingTest => Ok(AbTest::NotificationTiming),
            FlagName::NotificationContentTest => Ok(AbTest::NotificationContent),
            FlagName::UiVariantTest => Ok(AbTest::UiVariant),
            other => Err(FlagError::NotAnAbTest(other)),
        }
    }

    pub fn variants(&self) -> &'static [Variant] {
        self.flag().variants()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RolloutDecision {
    pub percentage: Percentage,
    pub percentile: u8,
    pub in_rollout: bool,
}

/// Sticky percentage check. Comparing the same percentile against a larger
/// threshold can only keep a user in, so raising the percentage is monotonic.
pub fn rollout_includes(percentage: Percentage, user_id: &str) -> bool {
    match percentage.get() {
        0 => false,
        100 => true,
        p => percentile(user_id) <= p,
    }
}

/// Sticky variant pick for one test. Each test hashes `<TEST_NAME>_<user_id>`,
/// so the same user can land in different arms of different tests.
pub fn assign_variant(
    test: AbTest,
    user_id: &str,
    ab_testing_enabled: bool,
    test_flag: Variant,
) -> Variant {
    if !ab_testing_enabled || test_flag == Variant::Off {
        return Variant::Off;
    }
    let variants = test.variants();
    if variants.is_empty() {
        return Variant::Off;
    }
    let input = format!("{}_{}", test.flag(), user_id);
    let index = hash_string(&input) as usize % variants.len();
    variants[index]
}

/// Per-user decisions against the current contents of a [`FlagStore`].
/// Reads the store on every call and never writes to it.
#[derive(Debug, Clone)]
pub struct TargetingEvaluator {
    store: Arc<FlagStore>,
}

impl TargetingEvaluator {
    pub fn new(store: Arc<FlagStore>) -> Self {
        Self { store }
    }

    pub fn rollout_decision(&self, user_id: &str) -> Result<RolloutDecision, FlagError> {
        let percentage = self.store.get_percentage(FlagName::TargetUserPercentage)?;
        Ok(RolloutDecision {
            percentage,
            percentile: percentile(user_id),
            in_rollout: rollout_includes(percentage, user_id),
        })
    }

    pub fn is_user_in_rollout(&self, user_id: &str) -> bool {
        match self.store.get_percentage(FlagName::TargetUserPercentage) {
            Ok(percentage) => rollout_includes(percentage, user_id),
            // unreachable with a validated store; fail closed
            Err(e) => {
                tracing::error!("rollout percentage unreadable: {}", e);
                false
            }
        }
    }

    pub fn get_variant(&self, test: AbTest, user_id: &str) -> Variant {
        let ab_testing_enabled = self
            .store
            .get_bool(FlagName::AbTestingEnabled)
            .unwrap_or(false);
        let test_flag = self.store.get_variant(test.flag()).unwrap_or(Variant::Off);
        assign_variant(test, user_id, ab_testing_enabled, test_flag)
    }

    pub fn get_variant_by_name(&self, test_name: &str, user_id: &str) -> Result<Variant, FlagError> {
        Ok(self.get_variant(AbTest::parse(test_name)?, user_id))
    }

    /// A boolean feature flag gated by the rollout percentage.
    pub fn is_feature_enabled_for_user(
        &self,
        flag: FlagName,
        user_id: &str,
    ) -> Result<bool, FlagError> {
        Ok(self.store.get_bool(flag)? && self.is_user_in_rollout(user_id))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::flags::{environment::Environment, flag_models::FlagValue};

    fn pct(value: i64) -> Percentage {
        Percentage::new(value).unwrap()
    }

    fn setup(environment: Environment) -> (Arc<FlagStore>, TargetingEvaluator) {
        let store = Arc::new(FlagStore::new(environment));
        (store.clone(), TargetingEvaluator::new(store))
    }

    #[rstest]
    #[case("")]
    #[case("user-42")]
    #[case("user-1")]
    #[case("ありがとう")]
    fn test_zero_and_full_percentages(#[case] user_id: &str) {
        assert!(!rollout_includes(Percentage::ZERO, user_id));
        assert!(rollout_includes(Percentage::FULL, user_id));
    }

    #[test]
    fn test_rollout_is_monotonic_in_percentage() {
        for i in 0..500 {
            let user_id = format!("user-{}", i);
            let mut included = false;
            for p in 0..=100 {
                let now = rollout_includes(pct(p), &user_id);
                assert!(!included || now, "{} dropped out at {}%", user_id, p);
                included = now;
            }
            assert!(included);
        }
    }

    #[test]
    fn test_rollout_is_sticky() {
        let (_, evaluator) = setup(Environment::Production50);
        for i in 0..100 {
            let user_id = format!("mama-{}", i);
            let first = evaluator.is_user_in_rollout(&user_id);
            for _ in 0..10 {
                assert_eq!(evaluator.is_user_in_rollout(&user_id), first);
            }
        }
    }

    #[test]
    fn test_production_alpha_scenario_for_user_42() {
        let (store, evaluator) = setup(Environment::ProductionAlpha);
        assert!(store.get_bool(FlagName::AlphaUsersOnly).unwrap());

        // hash("user-42") = 147182656, percentile 57: outside the 5% alpha
        let decision = evaluator.rollout_decision("user-42").unwrap();
        assert_eq!(decision.percentile, 57);
        assert_eq!(decision.percentage, pct(5));
        assert!(!decision.in_rollout);
        assert!(!evaluator.is_user_in_rollout("user-42"));

        // user-2 sits in bucket 25, so it is in by the 25% checkpoint
        let (_, later) = setup(Environment::Production25);
        assert!(later.is_user_in_rollout("user-2"));
        assert!(!later.is_user_in_rollout("user-42"));
        let (_, full) = setup(Environment::Production75);
        assert!(full.is_user_in_rollout("user-42"));
    }

    #[test]
    fn test_ui_variant_for_abc_is_sticky() {
        let (store, evaluator) = setup(Environment::Development);
        assert!(store.get_bool(FlagName::AbTestingEnabled).unwrap());
        assert_eq!(
            store.get_variant(FlagName::UiVariantTest).unwrap(),
            Variant::V1
        );

        let first = evaluator.get_variant(AbTest::UiVariant, "abc");
        // hash("UI_VARIANT_TEST_abc") = 1543875558, even
        assert_eq!(first, Variant::V1);
        for _ in 0..100 {
            assert_eq!(evaluator.get_variant(AbTest::UiVariant, "abc"), first);
        }
    }

    #[test]
    fn test_variant_is_off_when_ab_testing_disabled() {
        let (store, evaluator) = setup(Environment::Development);
        store
            .set(FlagName::AbTestingEnabled, FlagValue::Bool(false))
            .unwrap();
        for test in AbTest::iter() {
            assert_eq!(evaluator.get_variant(test, "abc"), Variant::Off);
        }
    }

    #[test]
    fn test_variant_is_off_when_test_flag_is_off() {
        let (store, evaluator) = setup(Environment::Development);
        store
            .set(FlagName::NotificationContentTest, FlagValue::Variant(Variant::Off))
            .unwrap();
        assert_eq!(
            evaluator.get_variant(AbTest::NotificationContent, "abc"),
            Variant::Off
        );
        assert_ne!(
            evaluator.get_variant(AbTest::NotificationTiming, "abc"),
            Variant::Off
        );
    }

    #[test]
    fn test_variants_stay_within_each_test() {
        let (_, evaluator) = setup(Environment::Development);
        for i in 0..200 {
            let user_id = format!("user-{}", i);
            for test in AbTest::iter() {
                let variant = evaluator.get_variant(test, &user_id);
                assert!(test.variants().contains(&variant), "{} got {}", test, variant);
            }
        }
    }

    #[test]
    fn test_each_test_hashes_its_own_input() {
        let timing = hash_string(&format!("{}_abc", FlagName::NotificationTimingTest));
        let ui = hash_string(&format!("{}_abc", FlagName::UiVariantTest));
        assert_ne!(timing, ui);

        // same user, different arm index in two tests
        assert_eq!(
            assign_variant(AbTest::NotificationTiming, "abc", true, Variant::A),
            Variant::A
        );
        assert_eq!(
            assign_variant(AbTest::NotificationContent, "abc", true, Variant::Concise),
            Variant::Detailed
        );
    }

    #[test]
    fn test_variant_by_name() {
        let (_, evaluator) = setup(Environment::Development);
        assert_eq!(
            evaluator.get_variant_by_name("UI_VARIANT_TEST", "abc").unwrap(),
            Variant::V1
        );
        assert!(matches!(
            evaluator.get_variant_by_name("AB_TESTING_ENABLED", "abc"),
            Err(FlagError::NotAnAbTest(FlagName::AbTestingEnabled))
        ));
        assert!(matches!(
            evaluator.get_variant_by_name("CHECKOUT_TEST", "abc"),
            Err(FlagError::UnknownFlag(_))
        ));
    }

    #[test]
    fn test_feature_enabled_for_user_combines_flag_and_rollout() {
        let (store, evaluator) = setup(Environment::Production25);
        assert!(evaluator
            .is_feature_enabled_for_user(FlagName::PushNotificationsEnabled, "user-2")
            .unwrap());
        assert!(!evaluator
            .is_feature_enabled_for_user(FlagName::PushNotificationsEnabled, "user-42")
            .unwrap());

        store
            .set(FlagName::PushNotificationsEnabled, FlagValue::Bool(false))
            .unwrap();
        assert!(!evaluator
            .is_feature_enabled_for_user(FlagName::PushNotificationsEnabled, "user-2")
            .unwrap());
        assert!(matches!(
            evaluator.is_feature_enabled_for_user(FlagName::TargetUserPercentage, "user-2"),
            Err(FlagError::TypeMismatch { .. })
        ));
    }
}
