use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

/// Curve used to compress HDR output into display range.
///
/// The numeric codes match the ones the debug panel exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToneMapping {
    None,
    Linear,
    Reinhard,
    Cineon,
    AcesFilmic,
}

impl ToneMapping {
    pub const ALL: [ToneMapping; 5] = [
        ToneMapping::None,
        ToneMapping::Linear,
        ToneMapping::Reinhard,
        ToneMapping::Cineon,
        ToneMapping::AcesFilmic,
    ];

    pub fn code(self) -> u32 {
        match self {
            ToneMapping::None => 0,
            ToneMapping::Linear => 1,
            ToneMapping::Reinhard => 2,
            ToneMapping::Cineon => 3,
            ToneMapping::AcesFilmic => 4,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.code() == code)
    }

    /// Label shown in the debug panel dropdown.
    pub fn label(self) -> &'static str {
        match self {
            ToneMapping::None => "No",
            ToneMapping::Linear => "Linear",
            ToneMapping::Reinhard => "Reinhard",
            ToneMapping::Cineon => "Cineon",
            ToneMapping::AcesFilmic => "ACESFilmic",
        }
    }

    /// Maps a linear HDR colour to display range.
    pub fn apply(self, color: Vec3, exposure: f32) -> Vec3 {
        match self {
            ToneMapping::None => color,
            ToneMapping::Linear => saturate(color * exposure),
            ToneMapping::Reinhard => {
                let color = color * exposure;
                saturate(color / (Vec3::ONE + color))
            }
            ToneMapping::Cineon => {
                // Hejl and Burgess-Dawson fit; the pow bakes in display gamma.
                let color = (color * exposure - Vec3::splat(0.004)).max(Vec3::ZERO);
                let mapped = (color * (6.2 * color + Vec3::splat(0.5)))
                    / (color * (6.2 * color + Vec3::splat(1.7)) + Vec3::splat(0.06));
                mapped.powf(2.2)
            }
            ToneMapping::AcesFilmic => aces_filmic(color, exposure),
        }
    }
}

impl std::fmt::Display for ToneMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn saturate(color: Vec3) -> Vec3 {
    color.clamp(Vec3::ZERO, Vec3::ONE)
}

// sRGB => XYZ => D65_2_D60 => AP1 => RRT_SAT
const ACES_INPUT: Mat3 = Mat3::from_cols(
    Vec3::new(0.59719, 0.07600, 0.02840),
    Vec3::new(0.35458, 0.90834, 0.13383),
    Vec3::new(0.04823, 0.01566, 0.83777),
);

// ODT_SAT => XYZ => D60_2_D65 => sRGB
const ACES_OUTPUT: Mat3 = Mat3::from_cols(
    Vec3::new(1.60475, -0.10208, -0.00327),
    Vec3::new(-0.53108, 1.10813, -0.07276),
    Vec3::new(-0.07367, -0.00605, 1.07602),
);

fn aces_filmic(color: Vec3, exposure: f32) -> Vec3 {
    let color = ACES_INPUT * (color * exposure / 0.6);
    let a = color * (color + Vec3::splat(0.0245786)) - Vec3::splat(0.000090537);
    let b = color * (0.983729 * color + Vec3::splat(0.4329510)) + Vec3::splat(0.238081);
    saturate(ACES_OUTPUT * (a / b))
}
