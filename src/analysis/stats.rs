//! Small descriptive statistics over gappy columns

use std::collections::{BTreeMap, BTreeSet};

/// Pearson correlation over the pairs where both values are present.
///
/// `None` when fewer than two complete pairs exist or either side is constant.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let (dx, dy) = (x - mean_x, y - mean_y);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= f64::EPSILON || syy <= f64::EPSILON {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Mean of `value` for every (row key, column key) cell that received data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeanPivot {
    pub rows: Vec<u32>,
    pub columns: Vec<u32>,
    /// `cells[r][c]`, `None` where no value fell
    pub cells: Vec<Vec<Option<f64>>>,
}

impl MeanPivot {
    /// Aggregate `(row, column, value)` triples; missing values are ignored
    pub fn build(points: impl IntoIterator<Item = (u32, u32, Option<f64>)>) -> Self {
        let mut sums: BTreeMap<(u32, u32), (f64, usize)> = BTreeMap::new();
        let mut rows = BTreeSet::new();
        let mut columns = BTreeSet::new();
        for (r, c, v) in points {
            let Some(v) = v else { continue };
            let cell = sums.entry((r, c)).or_insert((0.0, 0));
            cell.0 += v;
            cell.1 += 1;
            rows.insert(r);
            columns.insert(c);
        }

        let rows: Vec<u32> = rows.into_iter().collect();
        let columns: Vec<u32> = columns.into_iter().collect();
        let cells = rows
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| sums.get(&(*r, *c)).map(|(s, n)| s / *n as f64))
                    .collect()
            })
            .collect();
        Self { rows, columns, cells }
    }

    /// Replace empty cells with `value`
    pub fn fill(mut self, value: f64) -> Self {
        for row in &mut self.cells {
            for cell in row.iter_mut() {
                cell.get_or_insert(value);
            }
        }
        self
    }
}
