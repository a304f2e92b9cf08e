//! Colour assignment for dynamic communities

/// Inclusive span of dynamic-community ids a colour scale is stretched over.
///
/// Passed explicitly to [`dynamic_community_color`] so every caller chooses
/// the range it normalizes against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange {
    pub min_id: u32,
    pub max_id: u32,
}

impl IdRange {
    pub fn new(min_id: u32, max_id: u32) -> Self {
        Self { min_id, max_id }
    }

    /// Smallest range covering `ids`; `0..=0` when there are none
    pub fn from_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        let mut range: Option<Self> = None;
        for id in ids {
            range = Some(match range {
                None => Self::new(id, id),
                Some(r) => Self::new(r.min_id.min(id), r.max_id.max(id)),
            });
        }
        range.unwrap_or(Self::new(0, 0))
    }

    /// Position of `id` within the range, clamped to `[0, 1]`.
    /// A single-id range maps to the middle of the scale.
    pub fn normalize(&self, id: u32) -> f64 {
        if self.max_id <= self.min_id {
            return 0.5;
        }
        let t = (id as f64 - self.min_id as f64) / (self.max_id as f64 - self.min_id as f64);
        t.clamp(0.0, 1.0)
    }
}

/// Polynomial fit of the Turbo colormap
fn turbo(t: f64) -> (f64, f64, f64) {
    const R: [f64; 6] = [
        0.13572138, 4.61539260, -42.66032258, 132.13108234, -152.94239396, 59.28637943,
    ];
    const G: [f64; 6] = [
        0.09140261, 2.19418839, 4.84296658, -14.18503333, 4.27729857, 2.82956604,
    ];
    const B: [f64; 6] = [
        0.10667330, 12.64194608, -60.58204836, 110.36276771, -89.90310912, 27.34824973,
    ];

    let poly = |c: &[f64; 6]| c.iter().rev().fold(0.0, |acc, k| acc * t + k);
    (poly(&R), poly(&G), poly(&B))
}

fn channel(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Hex colour for a dynamic community, spread over `range` with Turbo
pub fn dynamic_community_color(id: u32, range: IdRange) -> String {
    let (r, g, b) = turbo(range.normalize(id));
    format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b))
}
