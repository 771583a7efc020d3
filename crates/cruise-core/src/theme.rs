//! Environment themes ("tracks").
//!
//! A theme is a static configuration record: ground tint, sky colour, ambient
//! light level and exponential fog. It also selects which decoration style the
//! generator produces.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::Error, scene::Rgb};

/// Identifier of a selectable theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeId {
    /// Night-time city with buildings and street lights.
    #[default]
    City,
    /// Green valley with mountains and trees.
    Mountain,
    /// Bright desert with cacti, rocks and dunes.
    Desert,
}

impl ThemeId {
    /// All themes, in display order.
    pub const ALL: [ThemeId; 3] = [ThemeId::City, ThemeId::Mountain, ThemeId::Desert];

    /// The identifier used by the external interface.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeId::City => "city",
            ThemeId::Mountain => "mountain",
            ThemeId::Desert => "desert",
        }
    }

    /// The configuration record for this theme.
    #[must_use]
    pub fn theme(self) -> &'static Theme {
        match self {
            ThemeId::City => &CITY,
            ThemeId::Mountain => &MOUNTAIN,
            ThemeId::Desert => &DESERT,
        }
    }
}

impl fmt::Display for ThemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThemeId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| Error::UnknownTheme { id: s.to_string() })
    }
}

/// Immutable environment configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    /// Tint applied to the ground plane material.
    pub ground_color: Rgb,
    /// Background / clear colour.
    pub sky_color: Rgb,
    /// Ambient light intensity.
    pub ambient_light: f32,
    /// Exponential fog colour.
    pub fog_color: Rgb,
    /// Exponential fog density.
    pub fog_density: f32,
}

const CITY: Theme = Theme {
    ground_color: Rgb::from_hex(0x1a_52_76),
    sky_color: Rgb::from_hex(0x0a_0a_0a),
    ambient_light: 0.5,
    fog_color: Rgb::from_hex(0x1a_1a_2e),
    fog_density: 0.02,
};

const MOUNTAIN: Theme = Theme {
    ground_color: Rgb::from_hex(0x2e_cc_71),
    sky_color: Rgb::from_hex(0x2c_3e_50),
    ambient_light: 0.7,
    fog_color: Rgb::from_hex(0x4a_65_72),
    fog_density: 0.01,
};

const DESERT: Theme = Theme {
    ground_color: Rgb::from_hex(0xf3_9c_12),
    sky_color: Rgb::from_hex(0xf5_b0_41),
    ambient_light: 1.0,
    fog_color: Rgb::from_hex(0xf5_de_b3),
    fog_density: 0.005,
};
