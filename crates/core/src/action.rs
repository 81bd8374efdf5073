use crate::catalog::{Expression, LightEffectId, LightSetting, Motion};

/// A composite instruction: what to say, how to move, which face to show and
/// how to light up. Consumed exactly once by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCommand {
    pub text: String,
    pub motion: Motion,
    pub expression: Expression,
    pub light: LightSetting,
}

impl ActionCommand {
    pub fn new(
        text: impl Into<String>,
        motion: Motion,
        expression: Expression,
        light: impl Into<LightSetting>,
    ) -> Self {
        Self {
            text: text.into(),
            motion,
            expression,
            light: light.into(),
        }
    }

    /// The fixed greeting: wave the head, smile, rainbow lights.
    pub fn greeting() -> Self {
        Self::new("", Motion::Greeting, Expression::Happy, LightEffectId::Rainbow)
    }
}

impl Default for ActionCommand {
    fn default() -> Self {
        Self {
            text: String::new(),
            motion: Motion::Neutral,
            expression: Expression::Neutral,
            light: LightSetting::default(),
        }
    }
}
