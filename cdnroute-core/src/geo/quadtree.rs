//! Quadtree over the whole globe answering "which cache group is closest".

use super::{CacheGroupLocation, GeoPoint, Rect};
use crate::error::ConstructionError;

/// Leaves stop splitting at this depth (cells about 1e-12 degrees wide).
const MAX_DEPTH: u32 = 48;

/// A region quadtree of cache group locations.
///
/// Every split node has exactly four children whose boxes partition its own box.
/// A leaf holds at most one point, except that points with identical coordinates
/// are never split apart and simply accumulate in the same leaf.
///
/// The index is built once per topology update and then only read, so lookups
/// need no locking; the next build produces a new value.
#[derive(Debug, Clone)]
pub struct GeoIndex {
    root: Node,
    len: usize,
}

#[derive(Debug, Clone)]
struct Node {
    bounds: Rect,
    depth: u32,
    points: Vec<CacheGroupLocation>,
    children: Option<Box<[Node; 4]>>,
}

impl Default for GeoIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoIndex {
    /// Create an empty index covering the globe.
    pub fn new() -> Self {
        Self {
            root: Node::leaf(Rect::WORLD, 0),
            len: 0,
        }
    }

    /// Build an index from a set of locations.
    pub fn from_locations<I>(locations: I) -> Result<Self, ConstructionError>
    where
        I: IntoIterator<Item = CacheGroupLocation>,
    {
        let mut index = Self::new();
        for location in locations {
            index.insert(location)?;
        }
        Ok(index)
    }

    /// Number of points in the index.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the index holds no points.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Add a location, splitting the leaf it lands in if needed.
    ///
    /// Fails if the point is not a finite position on the globe.
    pub fn insert(&mut self, location: CacheGroupLocation) -> Result<(), ConstructionError> {
        if !Rect::WORLD.contains(&location.point) {
            return Err(ConstructionError::InvalidCoordinates(location.name));
        }
        self.root.insert(location);
        self.len += 1;
        Ok(())
    }

    /// The location with the smallest squared distance to `point`.
    ///
    /// Returns `None` only when the index is empty.
    pub fn nearest(&self, point: &GeoPoint) -> Option<&CacheGroupLocation> {
        let mut best = None;
        self.root.nearest(point, &mut best);
        best.map(|(location, _)| location)
    }

    /// All locations strictly inside `rect`.
    pub fn get(&self, rect: &Rect) -> Vec<&CacheGroupLocation> {
        let mut found = Vec::new();
        self.root.collect(rect, &mut found);
        found
    }
}

impl Node {
    fn leaf(bounds: Rect, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            points: Vec::new(),
            children: None,
        }
    }

    fn insert(&mut self, location: CacheGroupLocation) {
        if let Some(children) = self.children.as_mut() {
            let quadrant = self.bounds.quadrant_of(&location.point);
            children[quadrant].insert(location);
            return;
        }

        self.points.push(location);
        let n = self.points.len();
        if n > 1
            && !self.points[n - 1]
                .point
                .same_coordinates(&self.points[n - 2].point)
        {
            self.split();
        }
    }

    fn split(&mut self) {
        if self.depth >= MAX_DEPTH {
            return;
        }

        let depth = self.depth + 1;
        let mut children = self.bounds.quadrants().map(|bounds| Node::leaf(bounds, depth));
        for location in self.points.drain(..) {
            let quadrant = self.bounds.quadrant_of(&location.point);
            children[quadrant].points.push(location);
        }

        for child in children.iter_mut() {
            if !child.is_colocated() {
                child.split();
            }
        }
        self.children = Some(Box::new(children));
    }

    /// True if the leaf holds at most one distinct coordinate.
    fn is_colocated(&self) -> bool {
        match self.points.split_first() {
            Some((first, rest)) => rest.iter().all(|p| p.point.same_coordinates(&first.point)),
            None => true,
        }
    }

    fn nearest<'a>(&'a self, target: &GeoPoint, best: &mut Option<(&'a CacheGroupLocation, f64)>) {
        let Some(children) = self.children.as_ref() else {
            for location in &self.points {
                let distance = location.point.distance_sq(target);
                if best.map_or(true, |(_, d)| distance < d) {
                    *best = Some((location, distance));
                }
            }
            return;
        };

        // Search the quadrant holding the target first, then any sibling that could still be closer.
        let home = self.bounds.quadrant_of(target);
        children[home].nearest(target, best);
        for (i, child) in children.iter().enumerate() {
            if i == home {
                continue;
            }
            if best.map_or(true, |(_, d)| child.bounds.distance_sq(target) < d) {
                child.nearest(target, best);
            }
        }
    }

    fn collect<'a>(&'a self, rect: &Rect, found: &mut Vec<&'a CacheGroupLocation>) {
        if !self.bounds.intersects(rect) {
            return;
        }
        match self.children.as_ref() {
            Some(children) => {
                for child in children.iter() {
                    child.collect(rect, found);
                }
            }
            None => found.extend(self.points.iter().filter(|p| rect.strictly_contains(&p.point))),
        }
    }
}
