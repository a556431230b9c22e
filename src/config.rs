//! Tunable constants for rating updates and pairing.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ValidationError};

/// Default starting rating for new players.
pub const DEFAULT_RATING: f64 = 1500.0;

/// K-factor for rating updates.
pub const K_FACTOR: f64 = 32.0;

/// Every knob the rating model and the round generator read.
///
/// Missing keys in a TOML file fall back to [`MatchmakingConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingConfig {
    /// Elo K-factor.
    pub k_factor: f64,
    /// Rating given to players added without one.
    pub initial_rating: f64,
    /// Width of the Gaussian around an even (0.5) expected score.
    pub skill_sigma: f64,
    /// Rounds after which a history penalty has halved.
    pub history_half_life: f64,
    /// Group rating range tolerated before the spread term kicks in.
    pub spread_tolerance: f64,
    /// Hard cap on group range, as a multiple of `spread_tolerance`.
    pub spread_cap_multiplier: f64,
    /// Reject finished groups whose range exceeds [`MatchmakingConfig::spread_cap`].
    pub enforce_spread_cap: bool,
    /// Weight of the skill-mismatch term.
    pub skill_weight: f64,
    /// Weight of the repeat-partner term.
    pub partner_weight: f64,
    /// Weight of the repeat-opponent term.
    pub opponent_weight: f64,
    /// Weight per rating point of spread beyond the tolerance.
    pub spread_weight: f64,
    /// Softmax sharpness over negative cost.
    pub alpha: f64,
    /// Generated rounds remembered for immediate-repeat suppression.
    pub recent_rounds_window: usize,
    /// Sampling attempts per seed before it sits out the round.
    pub group_attempts: usize,
    /// Most rounds one generation request may ask for.
    pub max_rounds: u32,
    /// Most courts one generation request may ask for.
    pub max_courts: usize,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            k_factor: K_FACTOR,
            initial_rating: DEFAULT_RATING,
            skill_sigma: 0.15,
            history_half_life: 1.0,
            spread_tolerance: 200.0,
            spread_cap_multiplier: 2.0,
            enforce_spread_cap: true,
            skill_weight: 1.0,
            partner_weight: 0.5,
            opponent_weight: 0.2,
            spread_weight: 0.01,
            alpha: 1.0,
            recent_rounds_window: 3,
            group_attempts: 3,
            max_rounds: 10,
            max_courts: 20,
        }
    }
}

impl MatchmakingConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Rating range above which a finalized group is rejected.
    pub fn spread_cap(&self) -> f64 {
        self.spread_tolerance * self.spread_cap_multiplier
    }

    /// Checks that every value is in range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let positive = [
            ("k_factor", self.k_factor),
            ("skill_sigma", self.skill_sigma),
            ("history_half_life", self.history_half_life),
            ("alpha", self.alpha),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ValidationError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        let non_negative = [
            ("spread_tolerance", self.spread_tolerance),
            ("spread_cap_multiplier", self.spread_cap_multiplier),
            ("skill_weight", self.skill_weight),
            ("partner_weight", self.partner_weight),
            ("opponent_weight", self.opponent_weight),
            ("spread_weight", self.spread_weight),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ValidationError::InvalidConfig(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }

        if !self.initial_rating.is_finite() {
            return Err(ValidationError::InvalidRating(self.initial_rating));
        }
        if self.group_attempts == 0 {
            return Err(ValidationError::InvalidConfig(
                "group_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_rounds == 0 || self.max_courts == 0 {
            return Err(ValidationError::InvalidConfig(
                "max_rounds and max_courts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
