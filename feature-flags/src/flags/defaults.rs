use crate::flags::{
    environment::Environment,
    flag_models::{FlagCategory, FlagName, FlagSet, FlagValue, Percentage, Variant},
};

/// Baseline flag set for a stage. Pure; called once when the store is built.
pub fn resolve_baseline(environment: Environment) -> FlagSet {
    match environment {
        Environment::Development => development(),
        Environment::Test => test(),
        Environment::Staging => staging(),
        Environment::ProductionInitial => production(Checkpoint::INITIAL),
        Environment::ProductionAlpha => production(Checkpoint::ALPHA),
        Environment::ProductionBeta => production(Checkpoint::BETA),
        Environment::Production25 => production(Checkpoint::at(25)),
        Environment::Production50 => production(Checkpoint::at(50)),
        Environment::Production75 => production(Checkpoint::at(75)),
        Environment::ProductionFull => production(Checkpoint::at(100)),
        Environment::EmergencyRollback => emergency_snapshot(),
    }
}

/// Everything a user can see off, every safety and monitoring feature on,
/// rollout at zero, every experiment OFF.
pub fn emergency_snapshot() -> FlagSet {
    FlagSet::from_fn(|name| match name.category() {
        FlagCategory::Safety => FlagValue::Bool(true),
        FlagCategory::Product | FlagCategory::RolloutGate => FlagValue::Bool(false),
        FlagCategory::Rollout => FlagValue::Percentage(Percentage::ZERO),
        FlagCategory::Experiment => FlagValue::Variant(Variant::Off),
    })
}

fn pct(value: u8) -> FlagValue {
    // Callers only pass literals in 0..=100.
    FlagValue::Percentage(Percentage::new(i64::from(value)).unwrap_or(Percentage::ZERO))
}

fn development() -> FlagSet {
    FlagSet::from_fn(|name| match name {
        FlagName::TargetUserPercentage => pct(100),
        FlagName::AlphaUsersOnly | FlagName::BetaUsersOnly => FlagValue::Bool(false),
        FlagName::NotificationTimingTest => FlagValue::Variant(Variant::A),
        FlagName::NotificationContentTest => FlagValue::Variant(Variant::Concise),
        FlagName::UiVariantTest => FlagValue::Variant(Variant::V1),
        // everything else, including debug logging, on
        _ => FlagValue::Bool(true),
    })
}

fn test() -> FlagSet {
    FlagSet::from_fn(|name| match name {
        FlagName::TargetUserPercentage => pct(100),
        FlagName::AlphaUsersOnly | FlagName::BetaUsersOnly => FlagValue::Bool(false),
        FlagName::PerformanceMonitoringEnabled | FlagName::ErrorTrackingEnabled => {
            FlagValue::Bool(false)
        }
        FlagName::NotificationTimingTest => FlagValue::Variant(Variant::A),
        FlagName::NotificationContentTest => FlagValue::Variant(Variant::Concise),
        FlagName::UiVariantTest => FlagValue::Variant(Variant::V1),
        _ => FlagValue::Bool(true),
    })
}

fn staging() -> FlagSet {
    FlagSet::from_fn(|name| match name {
        FlagName::TargetUserPercentage => pct(100),
        FlagName::AlphaUsersOnly | FlagName::BetaUsersOnly => FlagValue::Bool(false),
        FlagName::DebugLoggingEnabled => FlagValue::Bool(true),
        FlagName::NotificationTimingTest => FlagValue::Variant(Variant::A),
        FlagName::NotificationContentTest => FlagValue::Variant(Variant::Detailed),
        FlagName::UiVariantTest => FlagValue::Variant(Variant::V2),
        _ => FlagValue::Bool(true),
    })
}

/// One step of the production rollout plan.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    percentage: u8,
    alpha_only: bool,
    beta_only: bool,
}

impl Checkpoint {
    const INITIAL: Checkpoint = Checkpoint {
        percentage: 0,
        alpha_only: false,
        beta_only: false,
    };
    const ALPHA: Checkpoint = Checkpoint {
        percentage: 5,
        alpha_only: true,
        beta_only: false,
    };
    const BETA: Checkpoint = Checkpoint {
        percentage: 15,
        alpha_only: false,
        beta_only: true,
    };

    const fn at(percentage: u8) -> Checkpoint {
        Checkpoint {
            percentage,
            alpha_only: false,
            beta_only: false,
        }
    }

    fn notifications_live(&self) -> bool {
        self.percentage > 0
    }

    fn batching_live(&self) -> bool {
        self.percentage >= 15
    }

    fn experiments_live(&self) -> bool {
        self.percentage >= 25
    }

    fn ui_experiment_live(&self) -> bool {
        self.percentage >= 50
    }
}

fn production(checkpoint: Checkpoint) -> FlagSet {
    let experiment = |live: bool, variant: Variant| {
        if live {
            FlagValue::Variant(variant)
        } else {
            FlagValue::Variant(Variant::Off)
        }
    };

    FlagSet::from_fn(|name| match name {
        FlagName::PushNotificationsEnabled | FlagName::RealtimeNotificationsEnabled => {
            FlagValue::Bool(checkpoint.notifications_live())
        }
        FlagName::NotificationBatchingEnabled | FlagName::QuietHoursEnabled => {
            FlagValue::Bool(checkpoint.batching_live())
        }
        FlagName::AbTestingEnabled => FlagValue::Bool(checkpoint.experiments_live()),
        FlagName::TokenEncryptionEnabled
        | FlagName::RateLimitingEnabled
        | FlagName::AuditLoggingEnabled
        | FlagName::PerformanceMonitoringEnabled
        | FlagName::ErrorTrackingEnabled => FlagValue::Bool(true),
        FlagName::DebugLoggingEnabled => FlagValue::Bool(false),
        FlagName::AlphaUsersOnly => FlagValue::Bool(checkpoint.alpha_only),
        FlagName::BetaUsersOnly => FlagValue::Bool(checkpoint.beta_only),
        FlagName::TargetUserPercentage => pct(checkpoint.percentage),
        FlagName::NotificationTimingTest => experiment(checkpoint.experiments_live(), Variant::A),
        FlagName::NotificationContentTest => {
            experiment(checkpoint.experiments_live(), Variant::Concise)
        }
        FlagName::UiVariantTest => experiment(checkpoint.ui_experiment_live(), Variant::V1),
    })
}
