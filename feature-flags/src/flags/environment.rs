use serde::Serialize;
use strum::{Display, EnumIter, EnumString};

/// Deployment stage the process runs in. Chosen once at startup; each stage
/// has exactly one baseline flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize)]
pub enum Environment {
    #[strum(serialize = "development")]
    #[serde(rename = "development")]
    Development,
    #[strum(serialize = "test")]
    #[serde(rename = "test")]
    Test,
    #[strum(serialize = "staging")]
    #[serde(rename = "staging")]
    Staging,
    #[strum(serialize = "production-initial")]
    #[serde(rename = "production-initial")]
    ProductionInitial,
    #[strum(serialize = "production-alpha")]
    #[serde(rename = "production-alpha")]
    ProductionAlpha,
    #[strum(serialize = "production-beta")]
    #[serde(rename = "production-beta")]
    ProductionBeta,
    #[strum(serialize = "production-25")]
    #[serde(rename = "production-25")]
    Production25,
    #[strum(serialize = "production-50")]
    #[serde(rename = "production-50")]
    Production50,
    #[strum(serialize = "production-75")]
    #[serde(rename = "production-75")]
    Production75,
    #[strum(serialize = "production-full")]
    #[serde(rename = "production-full")]
    ProductionFull,
    #[strum(serialize = "emergency-rollback")]
    #[serde(rename = "emergency-rollback")]
    EmergencyRollback,
}

impl Environment {
    /// Resolves the runtime signal (`APP_ENV`) into a stage. `production` is
    /// narrowed by the rollout stage (`alpha`, `beta`, `25`, `50`, `75`, `full`);
    /// explicit stage names are accepted as-is. Anything else falls back to
    /// development.
    pub fn from_signal(app_env: &str, rollout_stage: &str) -> Environment {
        let app_env = app_env.trim().to_lowercase();
        match app_env.as_str() {
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            "staging" => Environment::Staging,
            "production" | "prod" => Environment::production_checkpoint(rollout_stage),
            other => match other.parse::<Environment>() {
                Ok(environment) => environment,
                Err(_) => {
                    tracing::warn!(
                        app_env = other,
                        "unrecognized environment, falling back to development"
                    );
                    Environment::Development
                }
            },
        }
    }

    fn production_checkpoint(stage: &str) -> Environment {
        match stage.trim().to_lowercase().as_str() {
            "" | "initial" => Environment::ProductionInitial,
            "alpha" => Environment::ProductionAlpha,
            "beta" => Environment::ProductionBeta,
            "25" => Environment::Production25,
            "50" => Environment::Production50,
            "75" => Environment::Production75,
            "full" | "100" => Environment::ProductionFull,
            other => {
                tracing::warn!(
                    rollout_stage = other,
                    "unrecognized rollout stage, using production-initial"
                );
                Environment::ProductionInitial
            }
        }
    }

    /// Key of the remote record this stage reads and writes. All production
    /// checkpoints share one record.
    pub fn remote_key(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Staging => "staging",
            Environment::ProductionInitial
            | Environment::ProductionAlpha
            | Environment::ProductionBeta
            | Environment::Production25
            | Environment::Production50
            | Environment::Production75
            | Environment::ProductionFull
            | Environment::EmergencyRollback => "production",
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("development", "", Environment::Development)]
    #[case("test", "alpha", Environment::Test)]
    #[case("staging", "", Environment::Staging)]
    #[case("production", "", Environment::ProductionInitial)]
    #[case("production", "initial", Environment::ProductionInitial)]
    #[case("production", "alpha", Environment::ProductionAlpha)]
    #[case("production", "beta", Environment::ProductionBeta)]
    #[case("production", "25", Environment::Production25)]
    #[case("PRODUCTION", "50", Environment::Production50)]
    #[case("production", "75", Environment::Production75)]
    #[case("production", "full", Environment::ProductionFull)]
    #[case("production", "ninety", Environment::ProductionInitial)]
    #[case("production-alpha", "", Environment::ProductionAlpha)]
    #[case("emergency-rollback", "", Environment::EmergencyRollback)]
    #[case("qa", "", Environment::Development)]
    #[case("", "", Environment::Development)]
    fn test_from_signal(#[case] app_env: &str, #[case] stage: &str, #[case] expected: Environment) {
        assert_eq!(Environment::from_signal(app_env, stage), expected);
    }

    #[test]
    fn test_production_checkpoints_share_a_remote_key() {
        assert_eq!(Environment::ProductionAlpha.remote_key(), "production");
        assert_eq!(Environment::ProductionFull.remote_key(), "production");
        assert_eq!(Environment::Staging.remote_key(), "staging");
    }

    #[test]
    fn test_display_matches_stage_names() {
        assert_eq!(Environment::Production25.to_string(), "production-25");
        assert_eq!(
            Environment::EmergencyRollback.to_string(),
            "emergency-rollback"
        );
    }
}
