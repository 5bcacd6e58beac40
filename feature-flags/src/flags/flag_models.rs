use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::api::errors::FlagError;

/// Every flag the app knows about. The set is closed: a name that doesn't parse
/// into one of these is a deployment mismatch between code and schema.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagName {
    PushNotificationsEnabled,
    RealtimeNotificationsEnabled,
    NotificationBatchingEnabled,
    QuietHoursEnabled,
    AbTestingEnabled,
    TokenEncryptionEnabled,
    RateLimitingEnabled,
    AuditLoggingEnabled,
    PerformanceMonitoringEnabled,
    ErrorTrackingEnabled,
    DebugLoggingEnabled,
    AlphaUsersOnly,
    BetaUsersOnly,
    TargetUserPercentage,
    NotificationTimingTest,
    NotificationContentTest,
    UiVariantTest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    Boolean,
    Percentage,
    Variant,
}

/// What a flag guards. Drives the emergency snapshot: product features go dark,
/// safety and monitoring stay on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagCategory {
    Product,
    Safety,
    RolloutGate,
    Rollout,
    Experiment,
}

const NOTIFICATION_TIMING_VARIANTS: &[Variant] = &[Variant::A, Variant::B];
const NOTIFICATION_CONTENT_VARIANTS: &[Variant] = &[Variant::Concise, Variant::Detailed];
const UI_VARIANTS: &[Variant] = &[Variant::V1, Variant::V2];

impl FlagName {
    /// Parses a wire/flag name, failing loudly on anything outside the schema.
    pub fn parse(name: &str) -> Result<FlagName, FlagError> {
        name.parse::<FlagName>()
            .map_err(|_| FlagError::UnknownFlag(name.to_string()))
    }

    pub fn all() -> impl Iterator<Item = FlagName> {
        FlagName::iter()
    }

    pub fn kind(&self) -> FlagKind {
        match self {
            FlagName::TargetUserPercentage => FlagKind::Percentage,
            FlagName::NotificationTimingTest
            | FlagName::NotificationContentTest
            | FlagName::UiVariantTest => FlagKind::Variant,
            _ => FlagKind::Boolean,
        }
    }

    pub fn category(&self) -> FlagCategory {
        match self {
            FlagName::PushNotificationsEnabled
            | FlagName::RealtimeNotificationsEnabled
            | FlagName::NotificationBatchingEnabled
            | FlagName::QuietHoursEnabled
            | FlagName::AbTestingEnabled => FlagCategory::Product,
            FlagName::TokenEncryptionEnabled
            | FlagName::RateLimitingEnabled
            | FlagName::AuditLoggingEnabled
            | FlagName::PerformanceMonitoringEnabled
            | FlagName::ErrorTrackingEnabled
            | FlagName::DebugLoggingEnabled => FlagCategory::Safety,
            FlagName::AlphaUsersOnly | FlagName::BetaUsersOnly => FlagCategory::RolloutGate,
            FlagName::TargetUserPercentage => FlagCategory::Rollout,
            FlagName::NotificationTimingTest
            | FlagName::NotificationContentTest
            | FlagName::UiVariantTest => FlagCategory::Experiment,
        }
    }

    /// The non-OFF arms of a variant flag, in assignment order. Empty for
    /// boolean and percentage flags.
    pub fn variants(&self) -> &'static [Variant] {
        match self {
            FlagName::NotificationTimingTest => NOTIFICATION_TIMING_VARIANTS,
            FlagName::NotificationContentTest => NOTIFICATION_CONTENT_VARIANTS,
            FlagName::UiVariantTest => UI_VARIANTS,
            _ => &[],
        }
    }

    /// The "disabled" value of this flag's kind.
    pub fn off_value(&self) -> FlagValue {
        match self.kind() {
            FlagKind::Boolean => FlagValue::Bool(false),
            FlagKind::Percentage => FlagValue::Percentage(Percentage::ZERO),
            FlagKind::Variant => FlagValue::Variant(Variant::Off),
        }
    }

    /// Checks that `value` is a legal value for this flag.
    pub fn validate(&self, value: FlagValue) -> Result<FlagValue, FlagError> {
        match (self.kind(), value) {
            (FlagKind::Boolean, FlagValue::Bool(_))
            | (FlagKind::Percentage, FlagValue::Percentage(_)) => Ok(value),
            (FlagKind::Variant, FlagValue::Variant(variant)) => {
                if variant == Variant::Off || self.variants().contains(&variant) {
                    Ok(value)
                } else {
                    Err(FlagError::InvalidVariant {
                        flag: *self,
                        variant: variant.to_string(),
                    })
                }
            }
            (expected, _) => Err(FlagError::TypeMismatch {
                flag: *self,
                expected,
            }),
        }
    }
}

/// Variant tags across all A/B tests, plus the `OFF` sentinel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
pub enum Variant {
    #[strum(serialize = "A")]
    #[serde(rename = "A")]
    A,
    #[strum(serialize = "B")]
    #[serde(rename = "B")]
    B,
    #[strum(serialize = "concise")]
    #[serde(rename = "concise")]
    Concise,
    #[strum(serialize = "detailed")]
    #[serde(rename = "detailed")]
    Detailed,
    #[strum(serialize = "v1")]
    #[serde(rename = "v1")]
    V1,
    #[strum(serialize = "v2")]
    #[serde(rename = "v2")]
    V2,
    #[strum(serialize = "OFF")]
    #[serde(rename = "OFF")]
    Off,
}

/// Integer percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Percentage(u8);

impl Percentage {
    pub const ZERO: Percentage = Percentage(0);
    pub const FULL: Percentage = Percentage(100);

    pub fn new(value: i64) -> Result<Percentage, FlagError> {
        match u8::try_from(value) {
            Ok(p) if p <= 100 => Ok(Percentage(p)),
            _ => Err(FlagError::InvalidPercentage(value)),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Percentage::new(raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Percentage(Percentage),
    Variant(Variant),
}

impl FlagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_percentage(&self) -> Option<Percentage> {
        match self {
            FlagValue::Percentage(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_variant(&self) -> Option<Variant> {
        match self {
            FlagValue::Variant(v) => Some(*v),
            _ => None,
        }
    }

    /// Parses a JSON value for a specific flag, checking both shape and kind.
    pub fn from_json(name: FlagName, raw: &Value) -> Result<FlagValue, FlagError> {
        let value = match (name.kind(), raw) {
            (FlagKind::Boolean, Value::Bool(b)) => FlagValue::Bool(*b),
            (FlagKind::Percentage, Value::Number(n)) => match n.as_i64() {
                Some(p) => FlagValue::Percentage(Percentage::new(p)?),
                None => {
                    return Err(FlagError::TypeMismatch {
                        flag: name,
                        expected: FlagKind::Percentage,
                    })
                }
            },
            (FlagKind::Variant, Value::String(s)) => {
                let variant = s.parse::<Variant>().map_err(|_| FlagError::InvalidVariant {
                    flag: name,
                    variant: s.clone(),
                })?;
                FlagValue::Variant(variant)
            }
            (expected, _) => {
                return Err(FlagError::TypeMismatch {
                    flag: name,
                    expected,
                })
            }
        };
        name.validate(value)
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

impl From<Percentage> for FlagValue {
    fn from(value: Percentage) -> Self {
        FlagValue::Percentage(value)
    }
}

impl From<Variant> for FlagValue {
    fn from(value: Variant) -> Self {
        FlagValue::Variant(value)
    }
}

/// How to treat keys outside the schema when parsing a JSON overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownKeys {
    /// Operator input: a typo must fail.
    Reject,
    /// Remote payloads may carry keys from a newer schema.
    Ignore,
}

/// A partial set of flag values. Used for the remote layer and for overrides,
/// never as a baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FlagOverlay(BTreeMap<FlagName, FlagValue>);

impl FlagOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: FlagName, value: FlagValue) -> Result<(), FlagError> {
        let value = name.validate(value)?;
        self.0.insert(name, value);
        Ok(())
    }

    pub fn with(mut self, name: FlagName, value: impl Into<FlagValue>) -> Result<Self, FlagError> {
        self.insert(name, value.into())?;
        Ok(self)
    }

    pub fn get(&self, name: FlagName) -> Option<FlagValue> {
        self.0.get(&name).copied()
    }

    pub fn remove(&mut self, name: FlagName) -> Option<FlagValue> {
        self.0.remove(&name)
    }

    pub fn extend(&mut self, other: &FlagOverlay) {
        self.0.extend(other.iter());
    }

    pub fn clear(&mut self) {
        self.0.clear()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FlagName, FlagValue)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    /// Parses a JSON object of `FLAG_NAME: value` pairs. Returns the overlay and
    /// the keys that were skipped under [`UnknownKeys::Ignore`].
    pub fn from_json(
        raw: &Value,
        unknown_keys: UnknownKeys,
    ) -> Result<(FlagOverlay, Vec<String>), FlagError> {
        let Value::Object(entries) = raw else {
            return Err(FlagError::InvalidPayload(
                "expected a JSON object of flag values".to_string(),
            ));
        };

        let mut overlay = FlagOverlay::new();
        let mut ignored = Vec::new();
        for (key, raw_value) in entries {
            let name = match FlagName::parse(key) {
                Ok(name) => name,
                Err(e) => match unknown_keys {
                    UnknownKeys::Reject => return Err(e),
                    UnknownKeys::Ignore => {
                        ignored.push(key.clone());
                        continue;
                    }
                },
            };
            overlay
                .0
                .insert(name, FlagValue::from_json(name, raw_value)?);
        }
        Ok((overlay, ignored))
    }
}

/// A complete set of flag values: every schema key is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FlagSet(BTreeMap<FlagName, FlagValue>);

impl FlagSet {
    /// Builds a complete set by asking `value_of` for every flag in the schema.
    pub fn from_fn<F>(mut value_of: F) -> FlagSet
    where
        F: FnMut(FlagName) -> FlagValue,
    {
        FlagSet(FlagName::all().map(|name| (name, value_of(name))).collect())
    }

    pub fn get(&self, name: FlagName) -> FlagValue {
        // Complete by construction; the fallback only guards the type system.
        self.0.get(&name).copied().unwrap_or_else(|| name.off_value())
    }

    /// Applies an overlay field by field.
    pub fn apply(&mut self, overlay: &FlagOverlay) {
        for (name, value) in overlay.iter() {
            self.0.insert(name, value);
        }
    }

    pub fn overlaid(&self, overlay: &FlagOverlay) -> FlagSet {
        let mut merged = self.clone();
        merged.apply(overlay);
        merged
    }

    /// Checks every value against the schema. Baseline tables are validated
    /// with this in tests.
    pub fn validate(&self) -> Result<(), FlagError> {
        for name in FlagName::all() {
            match self.0.get(&name) {
                Some(value) => {
                    name.validate(*value)?;
                }
                None => return Err(FlagError::IncompleteFlagSet(name)),
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (FlagName, FlagValue)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_flag_names_round_trip_through_strings() {
        assert_eq!(
            FlagName::parse("AB_TESTING_ENABLED").unwrap(),
            FlagName::AbTestingEnabled
        );
        assert_eq!(FlagName::UiVariantTest.to_string(), "UI_VARIANT_TEST");
        assert_eq!(
            FlagName::TargetUserPercentage.as_ref(),
            "TARGET_USER_PERCENTAGE"
        );
    }

    #[test]
    fn test_unknown_flag_name_fails_loudly() {
        match FlagName::parse("DEBUG_LOGGING_ENABLE") {
            Err(FlagError::UnknownFlag(name)) => assert_eq!(name, "DEBUG_LOGGING_ENABLE"),
            other => panic!("Expected UnknownFlag, got {:?}", other),
        }
    }

    #[test]
    fn test_percentage_bounds() {
        assert_eq!(Percentage::new(0).unwrap(), Percentage::ZERO);
        assert_eq!(Percentage::new(100).unwrap(), Percentage::FULL);
        assert!(matches!(
            Percentage::new(101),
            Err(FlagError::InvalidPercentage(101))
        ));
        assert!(matches!(
            Percentage::new(-1),
            Err(FlagError::InvalidPercentage(-1))
        ));
    }

    #[test]
    fn test_validate_rejects_wrong_kind() {
        let err = FlagName::TargetUserPercentage
            .validate(FlagValue::Bool(true))
            .unwrap_err();
        assert!(matches!(
            err,
            FlagError::TypeMismatch {
                flag: FlagName::TargetUserPercentage,
                expected: FlagKind::Percentage
            }
        ));
    }

    #[test]
    fn test_validate_rejects_variant_from_another_test() {
        let err = FlagName::UiVariantTest
            .validate(FlagValue::Variant(Variant::Concise))
            .unwrap_err();
        assert!(matches!(err, FlagError::InvalidVariant { .. }));

        assert!(FlagName::UiVariantTest
            .validate(FlagValue::Variant(Variant::Off))
            .is_ok());
    }

    #[test]
    fn test_overlay_from_json_strict_and_lenient() {
        let raw = json!({
            "DEBUG_LOGGING_ENABLED": true,
            "TARGET_USER_PERCENTAGE": 25,
            "UI_VARIANT_TEST": "v2",
            "SOME_FUTURE_FLAG": true,
        });

        assert!(matches!(
            FlagOverlay::from_json(&raw, UnknownKeys::Reject),
            Err(FlagError::UnknownFlag(_))
        ));

        let (overlay, ignored) = FlagOverlay::from_json(&raw, UnknownKeys::Ignore).unwrap();
        assert_eq!(ignored, vec!["SOME_FUTURE_FLAG".to_string()]);
        assert_eq!(overlay.len(), 3);
        assert_eq!(
            overlay.get(FlagName::TargetUserPercentage),
            Some(FlagValue::Percentage(Percentage::new(25).unwrap()))
        );
        assert_eq!(
            overlay.get(FlagName::UiVariantTest),
            Some(FlagValue::Variant(Variant::V2))
        );
    }

    #[test]
    fn test_overlay_from_json_rejects_bad_values() {
        for raw in [
            json!({"TARGET_USER_PERCENTAGE": 150}),
            json!({"TARGET_USER_PERCENTAGE": "50"}),
            json!({"AB_TESTING_ENABLED": "yes"}),
            json!({"NOTIFICATION_TIMING_TEST": "C"}),
            json!(["AB_TESTING_ENABLED"]),
        ] {
            assert!(
                FlagOverlay::from_json(&raw, UnknownKeys::Ignore).is_err(),
                "expected {} to be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_flag_set_serializes_with_schema_names() {
        let set = FlagSet::from_fn(|name| name.off_value());
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["AB_TESTING_ENABLED"], json!(false));
        assert_eq!(json["TARGET_USER_PERCENTAGE"], json!(0));
        assert_eq!(json["NOTIFICATION_CONTENT_TEST"], json!("OFF"));
        assert_eq!(json.as_object().unwrap().len(), FlagName::all().count());
    }

    #[test]
    fn test_flag_value_deserializes_untagged() {
        let values: Vec<FlagValue> = serde_json::from_value(json!([true, 42, "detailed"])).unwrap();
        assert_eq!(
            values,
            vec![
                FlagValue::Bool(true),
                FlagValue::Percentage(Percentage::new(42).unwrap()),
                FlagValue::Variant(Variant::Detailed),
            ]
        );
    }
}
