//! Representative frame selection.

use serde::Serialize;

use crate::domain::RankDirection;

/// Chosen frame plus the values it was chosen from.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FrameSelection {
    pub index: usize,
    pub values: Vec<Option<f64>>,
}

impl FrameSelection {
    /// Value of the selected frame, if the metric produced one.
    pub fn value(&self) -> Option<f64> {
        self.values.get(self.index).copied().flatten()
    }
}

/// Pick the best value under `direction`.
///
/// Unavailable (`None` or NaN) values are skipped. Ties keep the earliest
/// index. When no frame has a value, index 0 is selected.
pub fn select_frame(values: Vec<Option<f64>>, direction: RankDirection) -> FrameSelection {
    let values: Vec<Option<f64>> = values
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();

    let mut best: Option<(usize, f64)> = None;
    for (index, value) in values.iter().enumerate() {
        let Some(value) = *value else { continue };
        match best {
            Some((_, current)) if !direction.improves(value, current) => {}
            _ => best = Some((index, value)),
        }
    }

    FrameSelection {
        index: best.map(|(i, _)| i).unwrap_or(0),
        values,
    }
}
