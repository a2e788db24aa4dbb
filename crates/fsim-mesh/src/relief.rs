//! Elevation-banded vertex colors and automatic vertical exaggeration.
//!
//! The palette is tuned for contrast against a dark sky: blue-grey water,
//! sandy flats, green lowlands, tan hills, brown uplands and grey-to-white
//! peaks.

use fsim_dem::ElevationGrid;

/// One elevation band: colors interpolate linearly from `start` at `lower`
/// to `end` at `upper`.
struct Band {
    lower: f32,
    upper: f32,
    start: [f32; 3],
    end: [f32; 3],
}

const WATER: [f32; 3] = [0.18, 0.25, 0.38];

const BANDS: [Band; 6] = [
    // Beach / river flats
    Band {
        lower: 0.0,
        upper: 5.0,
        start: [0.55, 0.52, 0.35],
        end: [0.60, 0.55, 0.37],
    },
    // Low floodplain
    Band {
        lower: 5.0,
        upper: 30.0,
        start: [0.15, 0.45, 0.10],
        end: [0.20, 0.60, 0.15],
    },
    // Low hills
    Band {
        lower: 30.0,
        upper: 80.0,
        start: [0.20, 0.60, 0.15],
        end: [0.50, 0.55, 0.20],
    },
    // Mid hills
    Band {
        lower: 80.0,
        upper: 200.0,
        start: [0.50, 0.55, 0.20],
        end: [0.75, 0.40, 0.32],
    },
    // High hills
    Band {
        lower: 200.0,
        upper: 500.0,
        start: [0.75, 0.40, 0.32],
        end: [0.55, 0.30, 0.30],
    },
    // Mountains, saturating at 1500 m
    Band {
        lower: 500.0,
        upper: 1500.0,
        start: [0.55, 0.52, 0.50],
        end: [0.95, 0.95, 0.95],
    },
];

/// RGB color in `[0, 1]` for a raw elevation in meters.
pub fn color_for(elevation: f32) -> [f32; 3] {
    if elevation < 0.0 || elevation.is_nan() {
        return WATER;
    }

    let band = BANDS
        .iter()
        .find(|band| elevation < band.upper)
        .unwrap_or(&BANDS[BANDS.len() - 1]);
    let t = ((elevation - band.lower) / (band.upper - band.lower)).clamp(0.0, 1.0);

    [
        band.start[0] + t * (band.end[0] - band.start[0]),
        band.start[1] + t * (band.end[1] - band.start[1]),
        band.start[2] + t * (band.end[2] - band.start[2]),
    ]
}

/// RGBA8 vertex color for a raw elevation; channels are truncated, alpha is opaque.
pub fn rgba8_for(elevation: f32) -> [u8; 4] {
    let [r, g, b] = color_for(elevation);
    [
        (r * 255.0) as u8,
        (g * 255.0) as u8,
        (b * 255.0) as u8,
        255,
    ]
}

/// Vertical exaggeration for a relief range (max - min) in meters.
pub fn exaggeration_for_range(range: f32) -> f64 {
    if range < 10.0 {
        5.0
    } else if range < 50.0 {
        3.0
    } else if range < 200.0 {
        2.0
    } else if range < 500.0 {
        1.5
    } else {
        1.0
    }
}

/// Vertical exaggeration for a grid: flat terrain is stretched, dramatic
/// terrain is left alone.
pub fn vertical_exaggeration_for(grid: &ElevationGrid) -> f64 {
    exaggeration_for_range(grid.range())
}
