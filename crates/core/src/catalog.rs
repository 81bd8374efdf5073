//! Behavior Catalog
//!
//! Static tables mapping the closed set of motions, expressions and light
//! effects to the concrete parameters sent to the device. Everything here is
//! a process-lifetime constant; lookups are exhaustive `match`es and need no
//! synchronization.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Returned when a name does not match any catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{name}'")]
pub struct UnknownId {
    pub kind: &'static str,
    pub name: String,
}

// --- Motions ---

/// Head motions driven by the pitch/yaw servos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Motion {
    Neutral,
    Nod,
    Shake,
    TiltLeft,
    TiltRight,
    LookUp,
    LookDown,
    LookLeft,
    LookRight,
    Excited,
    Shy,
    Greeting,
}

impl Motion {
    pub const ALL: [Motion; 12] = [
        Motion::Neutral,
        Motion::Nod,
        Motion::Shake,
        Motion::TiltLeft,
        Motion::TiltRight,
        Motion::LookUp,
        Motion::LookDown,
        Motion::LookLeft,
        Motion::LookRight,
        Motion::Excited,
        Motion::Shy,
        Motion::Greeting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Motion::Neutral => "neutral",
            Motion::Nod => "nod",
            Motion::Shake => "shake",
            Motion::TiltLeft => "tilt_left",
            Motion::TiltRight => "tilt_right",
            Motion::LookUp => "look_up",
            Motion::LookDown => "look_down",
            Motion::LookLeft => "look_left",
            Motion::LookRight => "look_right",
            Motion::Excited => "excited",
            Motion::Shy => "shy",
            Motion::Greeting => "greeting",
        }
    }
}

impl fmt::Display for Motion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Motion {
    type Err = UnknownId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Motion::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownId {
                kind: "motion",
                name: s.to_string(),
            })
    }
}

/// Playback speed for a motion sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MotionSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl MotionSpeed {
    /// Multiplier applied to each step's duration.
    pub fn factor(self) -> f64 {
        match self {
            MotionSpeed::Slow => 1.5,
            MotionSpeed::Normal => 1.0,
            MotionSpeed::Fast => 0.6,
        }
    }
}

impl FromStr for MotionSpeed {
    type Err = UnknownId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slow" => Ok(MotionSpeed::Slow),
            "normal" => Ok(MotionSpeed::Normal),
            "fast" => Ok(MotionSpeed::Fast),
            _ => Err(UnknownId {
                kind: "motion speed",
                name: s.to_string(),
            }),
        }
    }
}

pub const PITCH_RANGE: (i32, i32) = (-30, 30);
pub const YAW_RANGE: (i32, i32) = (-45, 45);

/// A head position in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoPosition {
    pub pitch: i32,
    pub yaw: i32,
}

impl ServoPosition {
    pub const fn new(pitch: i32, yaw: i32) -> Self {
        Self { pitch, yaw }
    }

    /// The position limited to the mechanical range of the servos.
    pub fn clamped(self) -> Self {
        Self {
            pitch: self.pitch.clamp(PITCH_RANGE.0, PITCH_RANGE.1),
            yaw: self.yaw.clamp(YAW_RANGE.0, YAW_RANGE.1),
        }
    }
}

/// An ordered list of positions played back at a fixed per-step duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionSequence {
    pub positions: &'static [ServoPosition],
    pub step_ms: u64,
}

impl MotionSequence {
    /// Total playback time at the given speed.
    pub fn duration_ms(&self, speed: MotionSpeed) -> u64 {
        (self.positions.len() as f64 * self.step_ms as f64 * speed.factor()).round() as u64
    }
}

const fn seq(positions: &'static [ServoPosition], step_ms: u64) -> MotionSequence {
    MotionSequence { positions, step_ms }
}

macro_rules! steps {
    ($(($pitch:expr, $yaw:expr)),* $(,)?) => {
        &[$(ServoPosition { pitch: $pitch, yaw: $yaw }),*]
    };
}

static NEUTRAL: MotionSequence = seq(steps![(0, 0)], 300);
static NOD: MotionSequence = seq(steps![(-20, 0), (0, 0), (-20, 0), (0, 0)], 150);
static SHAKE: MotionSequence = seq(steps![(0, -30), (0, 30), (0, -30), (0, 30), (0, 0)], 120);
static TILT_LEFT: MotionSequence = seq(steps![(15, -20)], 300);
static TILT_RIGHT: MotionSequence = seq(steps![(15, 20)], 300);
static LOOK_UP: MotionSequence = seq(steps![(25, 0)], 300);
static LOOK_DOWN: MotionSequence = seq(steps![(-25, 0)], 300);
static LOOK_LEFT: MotionSequence = seq(steps![(0, -35)], 300);
static LOOK_RIGHT: MotionSequence = seq(steps![(0, 35)], 300);
static EXCITED: MotionSequence = seq(steps![(10, 0), (-10, 0), (10, 0), (-10, 0), (0, 0)], 80);
static SHY: MotionSequence = seq(steps![(-15, -25)], 400);
static GREETING: MotionSequence = seq(steps![(-15, 0), (0, -20), (0, 20), (0, 0)], 200);

/// Servo sequence for a motion. Every motion has one.
pub fn motion_sequence(motion: Motion) -> &'static MotionSequence {
    match motion {
        Motion::Neutral => &NEUTRAL,
        Motion::Nod => &NOD,
        Motion::Shake => &SHAKE,
        Motion::TiltLeft => &TILT_LEFT,
        Motion::TiltRight => &TILT_RIGHT,
        Motion::LookUp => &LOOK_UP,
        Motion::LookDown => &LOOK_DOWN,
        Motion::LookLeft => &LOOK_LEFT,
        Motion::LookRight => &LOOK_RIGHT,
        Motion::Excited => &EXCITED,
        Motion::Shy => &SHY,
        Motion::Greeting => &GREETING,
    }
}

// --- Expressions ---

/// Eye expressions rendered by the expression controller.
///
/// `Blink` and `Wink` are transient animations rather than resting states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Sleepy,
    Thinking,
    Love,
    Doubt,
    Scared,
    Proud,
    Speechless,
    Blink,
    Wink,
}

impl Expression {
    pub const ALL: [Expression; 14] = [
        Expression::Neutral,
        Expression::Happy,
        Expression::Sad,
        Expression::Angry,
        Expression::Surprised,
        Expression::Sleepy,
        Expression::Thinking,
        Expression::Love,
        Expression::Doubt,
        Expression::Scared,
        Expression::Proud,
        Expression::Speechless,
        Expression::Blink,
        Expression::Wink,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Expression::Neutral => "neutral",
            Expression::Happy => "happy",
            Expression::Sad => "sad",
            Expression::Angry => "angry",
            Expression::Surprised => "surprised",
            Expression::Sleepy => "sleepy",
            Expression::Thinking => "thinking",
            Expression::Love => "love",
            Expression::Doubt => "doubt",
            Expression::Scared => "scared",
            Expression::Proud => "proud",
            Expression::Speechless => "speechless",
            Expression::Blink => "blink",
            Expression::Wink => "wink",
        }
    }

    pub fn is_animation(self) -> bool {
        matches!(self, Expression::Blink | Expression::Wink)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Expression {
    type Err = UnknownId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| UnknownId {
                kind: "expression",
                name: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyeShape {
    Round,
    Arc,
    Heart,
    Line,
}

/// Shape parameters for a resting expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpressionState {
    /// 0.0 closed .. 1.0 fully open.
    pub open_ratio: f32,
    /// 0.5 .. 1.5
    pub pupil_size: f32,
    pub pupil_x: f32,
    pub pupil_y: f32,
    /// Degrees, -30 .. 30.
    pub eyebrow_angle: f32,
    pub shape: EyeShape,
}

impl ExpressionState {
    const fn open(open_ratio: f32) -> Self {
        Self {
            open_ratio,
            pupil_size: 1.0,
            pupil_x: 0.0,
            pupil_y: 0.0,
            eyebrow_angle: 0.0,
            shape: EyeShape::Round,
        }
    }

    const fn pupil(mut self, size: f32) -> Self {
        self.pupil_size = size;
        self
    }

    const fn look(mut self, x: f32, y: f32) -> Self {
        self.pupil_x = x;
        self.pupil_y = y;
        self
    }

    const fn brow(mut self, angle: f32) -> Self {
        self.eyebrow_angle = angle;
        self
    }

    const fn shape(mut self, shape: EyeShape) -> Self {
        self.shape = shape;
        self
    }
}

/// Resting eye state for an expression; `None` for the transient animations.
pub fn expression_state(expression: Expression) -> Option<ExpressionState> {
    let state = match expression {
        Expression::Neutral => ExpressionState::open(1.0),
        Expression::Happy => ExpressionState::open(0.3).shape(EyeShape::Arc),
        Expression::Sad => ExpressionState::open(0.7).look(0.0, 0.3).brow(-15.0),
        Expression::Angry => ExpressionState::open(0.6).pupil(0.8).brow(25.0),
        Expression::Surprised => ExpressionState::open(1.0).pupil(1.4),
        Expression::Sleepy => ExpressionState::open(0.3).pupil(0.9),
        Expression::Thinking => ExpressionState::open(0.9).look(0.4, -0.3),
        Expression::Love => ExpressionState::open(1.0).shape(EyeShape::Heart),
        Expression::Doubt => ExpressionState::open(0.7).look(-0.2, 0.0).brow(10.0),
        Expression::Scared => ExpressionState::open(1.0).pupil(0.6),
        Expression::Proud => ExpressionState::open(0.5)
            .look(0.0, -0.2)
            .shape(EyeShape::Arc),
        Expression::Speechless => ExpressionState::open(0.1).shape(EyeShape::Line),
        Expression::Blink | Expression::Wink => return None,
    };
    Some(state)
}

// --- Light effects ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LightMode {
    Off,
    Solid,
    Breathing,
    Pulse,
    Rainbow,
    Spin,
    Blink,
    Chase,
}

impl LightMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LightMode::Off => "off",
            LightMode::Solid => "solid",
            LightMode::Breathing => "breathing",
            LightMode::Pulse => "pulse",
            LightMode::Rainbow => "rainbow",
            LightMode::Spin => "spin",
            LightMode::Blink => "blink",
            LightMode::Chase => "chase",
        }
    }
}

impl FromStr for LightMode {
    type Err = UnknownId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = match s {
            "off" => LightMode::Off,
            "solid" => LightMode::Solid,
            "breathing" => LightMode::Breathing,
            "pulse" => LightMode::Pulse,
            "rainbow" => LightMode::Rainbow,
            "spin" => LightMode::Spin,
            "blink" => LightMode::Blink,
            "chase" => LightMode::Chase,
            _ => {
                return Err(UnknownId {
                    kind: "light mode",
                    name: s.to_string(),
                });
            }
        };
        Ok(mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const GREEN: Rgb = Rgb(0, 255, 0);
    pub const BLUE: Rgb = Rgb(0, 0, 255);
    pub const YELLOW: Rgb = Rgb(255, 255, 0);
    pub const CYAN: Rgb = Rgb(0, 255, 255);
    pub const PURPLE: Rgb = Rgb(128, 0, 128);
    pub const ORANGE: Rgb = Rgb(255, 165, 0);
    pub const PINK: Rgb = Rgb(255, 192, 203);

    /// Builds a color from untrusted integers, saturating each channel.
    pub fn saturating(r: i64, g: i64, b: i64) -> Self {
        let ch = |v: i64| v.clamp(0, 255) as u8;
        Rgb(ch(r), ch(g), ch(b))
    }
}

pub const DEFAULT_LIGHT_SPEED: u8 = 50;
pub const DEFAULT_LIGHT_BRIGHTNESS: u8 = 80;

/// Concrete LED parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightEffect {
    pub mode: LightMode,
    pub color: Rgb,
    /// 1..=100
    pub speed: u8,
    /// 0..=100
    pub brightness: u8,
}

impl LightEffect {
    pub const fn new(mode: LightMode, color: Rgb) -> Self {
        Self {
            mode,
            color,
            speed: DEFAULT_LIGHT_SPEED,
            brightness: DEFAULT_LIGHT_BRIGHTNESS,
        }
    }

    const fn with_speed(mut self, speed: u8) -> Self {
        self.speed = speed;
        self
    }

    /// The effect with speed and brightness forced into their valid ranges.
    pub fn clamped(self) -> Self {
        Self {
            speed: self.speed.clamp(1, 100),
            brightness: self.brightness.min(100),
            ..self
        }
    }
}

/// Named LED presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LightEffectId {
    Off,
    BreathingWhite,
    BreathingCyan,
    BreathingBlue,
    BreathingPink,
    BreathingGreen,
    BreathingOrange,
    PulseBlue,
    PulseGreen,
    PulseRed,
    Rainbow,
    SpinPurple,
    SpinCyan,
    BlinkYellow,
    BlinkRed,
    SolidWhite,
    SolidCyan,
}

impl LightEffectId {
    pub const ALL: [LightEffectId; 17] = [
        LightEffectId::Off,
        LightEffectId::BreathingWhite,
        LightEffectId::BreathingCyan,
        LightEffectId::BreathingBlue,
        LightEffectId::BreathingPink,
        LightEffectId::BreathingGreen,
        LightEffectId::BreathingOrange,
        LightEffectId::PulseBlue,
        LightEffectId::PulseGreen,
        LightEffectId::PulseRed,
        LightEffectId::Rainbow,
        LightEffectId::SpinPurple,
        LightEffectId::SpinCyan,
        LightEffectId::BlinkYellow,
        LightEffectId::BlinkRed,
        LightEffectId::SolidWhite,
        LightEffectId::SolidCyan,
    ];

    /// Effect used whenever a light name cannot be resolved.
    pub const FALLBACK: LightEffectId = LightEffectId::BreathingCyan;

    pub fn as_str(self) -> &'static str {
        match self {
            LightEffectId::Off => "off",
            LightEffectId::BreathingWhite => "breathing_white",
            LightEffectId::BreathingCyan => "breathing_cyan",
            LightEffectId::BreathingBlue => "breathing_blue",
            LightEffectId::BreathingPink => "breathing_pink",
            LightEffectId::BreathingGreen => "breathing_green",
            LightEffectId::BreathingOrange => "breathing_orange",
            LightEffectId::PulseBlue => "pulse_blue",
            LightEffectId::PulseGreen => "pulse_green",
            LightEffectId::PulseRed => "pulse_red",
            LightEffectId::Rainbow => "rainbow",
            LightEffectId::SpinPurple => "spin_purple",
            LightEffectId::SpinCyan => "spin_cyan",
            LightEffectId::BlinkYellow => "blink_yellow",
            LightEffectId::BlinkRed => "blink_red",
            LightEffectId::SolidWhite => "solid_white",
            LightEffectId::SolidCyan => "solid_cyan",
        }
    }

    /// Resolves a preset name, falling back to [`LightEffectId::FALLBACK`].
    pub fn resolve(name: &str) -> Self {
        name.parse().unwrap_or_else(|e: UnknownId| {
            tracing::warn!(error = %e, fallback = %Self::FALLBACK, "using fallback light effect");
            Self::FALLBACK
        })
    }
}

impl fmt::Display for LightEffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LightEffectId {
    type Err = UnknownId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LightEffectId::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| UnknownId {
                kind: "light effect",
                name: s.to_string(),
            })
    }
}

/// LED parameters for a preset.
pub fn light_effect(id: LightEffectId) -> LightEffect {
    use LightEffectId as L;
    use LightMode as M;
    match id {
        L::Off => LightEffect::new(M::Off, Rgb::CYAN),
        L::BreathingWhite => LightEffect::new(M::Breathing, Rgb::WHITE),
        L::BreathingCyan => LightEffect::new(M::Breathing, Rgb::CYAN),
        L::BreathingBlue => LightEffect::new(M::Breathing, Rgb::BLUE),
        L::BreathingPink => LightEffect::new(M::Breathing, Rgb::PINK),
        L::BreathingGreen => LightEffect::new(M::Breathing, Rgb::GREEN),
        L::BreathingOrange => LightEffect::new(M::Breathing, Rgb::ORANGE),
        L::PulseBlue => LightEffect::new(M::Pulse, Rgb::BLUE).with_speed(70),
        L::PulseGreen => LightEffect::new(M::Pulse, Rgb::GREEN).with_speed(70),
        L::PulseRed => LightEffect::new(M::Pulse, Rgb::RED).with_speed(70),
        L::Rainbow => LightEffect::new(M::Rainbow, Rgb::CYAN),
        L::SpinPurple => LightEffect::new(M::Spin, Rgb::PURPLE),
        L::SpinCyan => LightEffect::new(M::Spin, Rgb::CYAN),
        L::BlinkYellow => LightEffect::new(M::Blink, Rgb::YELLOW),
        L::BlinkRed => LightEffect::new(M::Blink, Rgb::RED),
        L::SolidWhite => LightEffect::new(M::Solid, Rgb::WHITE),
        L::SolidCyan => LightEffect::new(M::Solid, Rgb::CYAN),
    }
}

/// Light requested by an action: either a preset or explicit parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightSetting {
    Preset(LightEffectId),
    Custom(LightEffect),
}

impl LightSetting {
    /// Concrete, range-checked LED parameters.
    pub fn effect(self) -> LightEffect {
        match self {
            LightSetting::Preset(id) => light_effect(id),
            LightSetting::Custom(effect) => effect,
        }
        .clamped()
    }
}

impl Default for LightSetting {
    fn default() -> Self {
        LightSetting::Preset(LightEffectId::FALLBACK)
    }
}

impl From<LightEffectId> for LightSetting {
    fn from(id: LightEffectId) -> Self {
        LightSetting::Preset(id)
    }
}

impl fmt::Display for LightSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightSetting::Preset(id) => f.write_str(id.as_str()),
            LightSetting::Custom(e) => write!(
                f,
                "custom({},{},{},{})",
                e.mode.as_str(),
                e.color.0,
                e.color.1,
                e.color.2
            ),
        }
    }
}
