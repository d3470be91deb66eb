use std::collections::HashMap;

use crate::position::Point;

/// Uniform grid over points, with cells as wide as the coincidence tolerance
/// so a query only has to look at the 3×3 block around its own cell.
#[derive(Debug, Clone)]
pub(crate) struct PointIndex {
    tolerance: f64,
    cells: HashMap<(i64, i64), Vec<Point>>,
    points: Vec<Point>,
}

impl PointIndex {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            cells: HashMap::new(),
            points: Vec::new(),
        }
    }

    /// A tolerance that is not a positive finite number matches nothing, so
    /// any cell size keeps the index consistent.
    fn cell_size(&self) -> f64 {
        if self.tolerance.is_finite() && self.tolerance > 0.0 {
            self.tolerance
        } else {
            1.0
        }
    }

    fn cell_of(&self, p: Point) -> (i64, i64) {
        let size = self.cell_size();
        ((p.x / size).floor() as i64, (p.y / size).floor() as i64)
    }

    pub fn insert(&mut self, p: Point) {
        let cell = self.cell_of(p);
        self.cells.entry(cell).or_default().push(p);
        self.points.push(p);
    }

    pub fn extend(&mut self, points: impl IntoIterator<Item = Point>) {
        for p in points {
            self.insert(p);
        }
    }

    /// Whether any indexed point coincides with `p`.
    pub fn contains_near(&self, p: Point) -> bool {
        let (cx, cy) = self.cell_of(p);
        (cx.saturating_sub(1)..=cx.saturating_add(1)).any(|x| {
            (cy.saturating_sub(1)..=cy.saturating_add(1)).any(|y| {
                self.cells
                    .get(&(x, y))
                    .is_some_and(|pts| pts.iter().any(|q| q.coincides(p, self.tolerance)))
            })
        })
    }

    /// Whether any indexed point lies strictly closer than `radius`.
    pub fn any_within(&self, p: Point, radius: f64) -> bool {
        self.points.iter().any(|q| q.distance(p) < radius)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
