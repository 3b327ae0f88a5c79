//! 2D k-d tree over ground samples
//!
//! The tree is implicit: points are reordered once so that the node of the
//! slice `[lo, hi)` sits at its midpoint, split on x at even depths and on
//! y at odd depths. No node structs or child links are stored.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::SamplePoint;

/// Median-ordered 2D k-d tree
#[derive(Debug, Clone)]
pub struct KdTree {
    points: Vec<SamplePoint>,
}

/// A point returned by a query
#[derive(Debug, Clone, Copy)]
pub struct NearestResult {
    pub point: SamplePoint,
    pub distance_sq: f64,
}

/// Heap entry, ordered by distance so the heap top is the farthest kept point
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance_sq: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_sq
            .total_cmp(&other.distance_sq)
            .then(self.index.cmp(&other.index))
    }
}

#[inline]
fn coord(p: &SamplePoint, axis: usize) -> f64 {
    if axis == 0 { p.x } else { p.y }
}

fn build_range(points: &mut [SamplePoint], depth: usize) {
    if points.len() <= 1 {
        return;
    }
    let axis = depth % 2;
    let mid = points.len() / 2;
    points.select_nth_unstable_by(mid, |a, b| coord(a, axis).total_cmp(&coord(b, axis)));
    let (left, right) = points.split_at_mut(mid);
    build_range(left, depth + 1);
    build_range(&mut right[1..], depth + 1);
}

impl KdTree {
    /// Build a tree from sample points, O(n log n)
    pub fn build(points: &[SamplePoint]) -> Self {
        let mut points = points.to_vec();
        build_range(&mut points, 0);
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Nearest point to (qx, qy)
    pub fn nearest(&self, qx: f64, qy: f64) -> Option<NearestResult> {
        self.k_nearest_within(qx, qy, 1, f64::INFINITY).into_iter().next()
    }

    /// Up to `k` nearest points no farther than `max_distance`, sorted by
    /// ascending distance. Ties are broken by tree order, so results are
    /// deterministic for a given tree.
    pub fn k_nearest_within(&self, qx: f64, qy: f64, k: usize, max_distance: f64) -> Vec<NearestResult> {
        if self.points.is_empty() || k == 0 || !(max_distance >= 0.0) {
            return Vec::new();
        }

        let mut heap = BinaryHeap::with_capacity(k + 1);
        let limit_sq = max_distance * max_distance;
        self.search(0, self.points.len(), 0, qx, qy, k, limit_sq, &mut heap);

        heap.into_sorted_vec()
            .into_iter()
            .map(|c| NearestResult {
                point: self.points[c.index],
                distance_sq: c.distance_sq,
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn search(
        &self,
        lo: usize,
        hi: usize,
        depth: usize,
        qx: f64,
        qy: f64,
        k: usize,
        limit_sq: f64,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let p = &self.points[mid];
        let distance_sq = p.dist_sq(qx, qy);

        if distance_sq <= limit_sq {
            heap.push(Candidate { distance_sq, index: mid });
            if heap.len() > k {
                heap.pop();
            }
        }

        let axis = depth % 2;
        let diff = if axis == 0 { qx - p.x } else { qy - p.y };
        let (near, far) = if diff < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };

        self.search(near.0, near.1, depth + 1, qx, qy, k, limit_sq, heap);

        let bound = match heap.peek() {
            Some(worst) if heap.len() == k => worst.distance_sq.min(limit_sq),
            _ => limit_sq,
        };
        if diff * diff <= bound {
            self.search(far.0, far.1, depth + 1, qx, qy, k, limit_sq, heap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scattered(n: usize) -> Vec<SamplePoint> {
        (0..n)
            .map(|i| {
                let x = ((i * 7 + 13) % 100) as f64;
                let y = ((i * 11 + 37) % 97) as f64;
                SamplePoint::new(x, y, i as f64)
            })
            .collect()
    }

    fn brute_force(pts: &[SamplePoint], qx: f64, qy: f64, k: usize, max_d: f64) -> Vec<f64> {
        let mut d: Vec<f64> = pts
            .iter()
            .map(|p| p.dist_sq(qx, qy))
            .filter(|&d| d <= max_d * max_d)
            .collect();
        d.sort_by(f64::total_cmp);
        d.truncate(k);
        d
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(&[]);
        assert!(tree.is_empty());
        assert!(tree.nearest(0.0, 0.0).is_none());
        assert!(tree.k_nearest_within(0.0, 0.0, 3, 10.0).is_empty());
    }

    #[test]
    fn test_nearest_exact_point() {
        let pts = scattered(50);
        let tree = KdTree::build(&pts);
        let target = pts[17];
        let r = tree.nearest(target.x, target.y).unwrap();
        assert_eq!(r.distance_sq, 0.0);
    }

    #[test]
    fn test_k_nearest_matches_brute_force() {
        let pts = scattered(700);
        let tree = KdTree::build(&pts);
        assert_eq!(tree.len(), 700);

        for &(qx, qy) in &[(50.5, 50.5), (0.0, 0.0), (99.0, 3.3), (-20.0, 40.0)] {
            for &(k, max_d) in &[(1, f64::INFINITY), (8, 6.0), (30, 15.0)] {
                let got: Vec<f64> = tree
                    .k_nearest_within(qx, qy, k, max_d)
                    .iter()
                    .map(|r| r.distance_sq)
                    .collect();
                assert_eq!(got, brute_force(&pts, qx, qy, k, max_d), "query ({}, {}) k={}", qx, qy, k);
            }
        }
    }

    #[test]
    fn test_radius_cuts_off() {
        let pts = vec![SamplePoint::new(0.0, 0.0, 1.0), SamplePoint::new(10.0, 0.0, 2.0)];
        let tree = KdTree::build(&pts);
        let r = tree.k_nearest_within(4.0, 0.0, 5, 5.0);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].point.value, 1.0);
        assert!(tree.k_nearest_within(5.0, 0.0, 5, 1.0).is_empty());
    }

    #[test]
    fn test_collinear_points() {
        let pts: Vec<SamplePoint> = (0..10).map(|i| SamplePoint::new(i as f64, 0.0, i as f64)).collect();
        let tree = KdTree::build(&pts);
        let knn = tree.k_nearest_within(4.4, 0.0, 3, f64::INFINITY);
        let values: Vec<f64> = knn.iter().map(|r| r.point.value).collect();
        assert_eq!(values, vec![4.0, 5.0, 3.0]);
    }
}
