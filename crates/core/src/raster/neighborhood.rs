//! Neighbourhood patterns used by the per-cell stages

/// A neighbourhood pattern around a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighborhood {
    /// 8 neighbours
    Queen,
    /// 4 edge-sharing neighbours
    Rook,
    /// All cells whose centre lies within a Euclidean radius (in cells)
    Disk(usize),
}

impl Neighborhood {
    /// Radius of the bounding square
    pub fn radius(&self) -> usize {
        match self {
            Neighborhood::Queen | Neighborhood::Rook => 1,
            Neighborhood::Disk(r) => *r,
        }
    }

    /// Check if a relative position is within this neighbourhood (centre included)
    pub fn contains(&self, dr: isize, dc: isize) -> bool {
        match self {
            Neighborhood::Queen => dr.abs() <= 1 && dc.abs() <= 1,
            Neighborhood::Rook => dr.abs() + dc.abs() <= 1,
            Neighborhood::Disk(r) => {
                let r = *r as isize;
                dr * dr + dc * dc <= r * r
            }
        }
    }

    /// Relative positions, centre excluded, in row-major order
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let r = self.radius() as isize;
        let mut offsets = Vec::new();

        for dr in -r..=r {
            for dc in -r..=r {
                if (dr != 0 || dc != 0) && self.contains(dr, dc) {
                    offsets.push((dr, dc));
                }
            }
        }

        offsets
    }

    /// Offsets paired with their distance in cell units
    pub fn weighted_offsets(&self) -> Vec<(isize, isize, f64)> {
        self.offsets()
            .into_iter()
            .map(|(dr, dc)| (dr, dc, ((dr * dr + dc * dc) as f64).sqrt()))
            .collect()
    }

    /// Neighbour index shifted by (dr, dc), or `None` outside a rows x cols grid
    #[inline]
    pub fn shift(row: usize, col: usize, dr: isize, dc: isize, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let nr = row as isize + dr;
        let nc = col as isize + dc;
        if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
            None
        } else {
            Some((nr as usize, nc as usize))
        }
    }
}
