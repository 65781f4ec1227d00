//! Bounding Volume Hierarchy Broad Phase (3D)
//!
//! Binary hierarchy over 3D AABBs, maintained incrementally: inserts
//! encapsulate bounds on the way down, updates take a cheap contained
//! fast path, removals are O(1) to locate via the entity → leaf index.
//! Each object lives in exactly one leaf.
//!
//! Split policy: when a leaf exceeds its object cap (below the depth cap),
//! it splits on the longest axis of its combined bounds at the median
//! object center. The median-index split keeps the tree balanced even when
//! many centers coincide. Member order inside the sort is tie-broken by id
//! so the resulting tree is identical on every machine.

use std::collections::HashMap;

use crate::core::fixed::Fix64;

use super::aabb::Aabb3;

#[derive(Clone, Debug)]
struct ObjectEntry {
    bounds: Aabb3,
    layer: u8,
}

#[derive(Clone, Debug)]
enum NodeKind {
    Leaf { objects: Vec<u32> },
    Internal { left: usize, right: usize },
}

#[derive(Clone, Debug)]
struct BvhNode {
    bounds: Aabb3,
    parent: Option<usize>,
    depth: u32,
    kind: NodeKind,
}

/// Incrementally maintained BVH keyed by entity id.
#[derive(Clone, Debug)]
pub struct Bvh {
    max_objects: usize,
    max_depth: u32,
    nodes: Vec<BvhNode>,
    objects: HashMap<u32, ObjectEntry>,
    /// Entity → leaf node index. Every tracked entity has exactly one leaf.
    leaf_of: HashMap<u32, usize>,
}

impl Bvh {
    /// Create an empty hierarchy.
    ///
    /// # Panics
    /// Panics if `max_objects` is zero (configuration bug).
    pub fn new(max_objects: usize, max_depth: u32) -> Self {
        assert!(max_objects > 0, "bvh needs a positive leaf capacity");
        Self {
            max_objects,
            max_depth,
            nodes: vec![BvhNode {
                bounds: Aabb3::default(),
                parent: None,
                depth: 0,
                kind: NodeKind::Leaf {
                    objects: Vec::new(),
                },
            }],
            objects: HashMap::new(),
            leaf_of: HashMap::new(),
        }
    }

    /// Number of tracked objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if no objects are tracked.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// The leaf currently holding an entity, if tracked. Exposed for the
    /// leaf-invariant checks in tests and debug overlays.
    pub fn leaf_bounds_of(&self, id: u32) -> Option<Aabb3> {
        self.leaf_of.get(&id).map(|&leaf| self.nodes[leaf].bounds)
    }

    /// Insert an object. Replaces any existing entry with the same id.
    pub fn insert(&mut self, id: u32, bounds: Aabb3, layer: u8) {
        if self.objects.contains_key(&id) {
            self.remove(id);
        }
        self.objects.insert(id, ObjectEntry { bounds, layer });
        self.insert_descend(id, bounds);
    }

    /// Remove an object: O(1) leaf lookup, then a leaf-bounds recompute and
    /// an ancestor refit. Empty leaves are tolerated and keep their bounds.
    pub fn remove(&mut self, id: u32) {
        let Some(leaf) = self.leaf_of.remove(&id) else {
            return;
        };
        self.objects.remove(&id);
        if let NodeKind::Leaf { objects } = &mut self.nodes[leaf].kind {
            objects.retain(|o| *o != id);
        }
        self.recompute_leaf_bounds(leaf);
        self.refit_ancestors(leaf);
    }

    /// Update an object's bounds.
    ///
    /// If the new bounds are still fully contained in its leaf's bounds the
    /// leaf bounds are recomputed in place; otherwise the object is removed
    /// and re-inserted from the root.
    pub fn update(&mut self, id: u32, bounds: Aabb3) {
        let Some(&leaf) = self.leaf_of.get(&id) else {
            return;
        };
        if self.nodes[leaf].bounds.contains(bounds) {
            self.objects
                .get_mut(&id)
                .expect("leaf-indexed object has a table entry")
                .bounds = bounds;
            self.recompute_leaf_bounds(leaf);
        } else {
            let layer = self.objects[&id].layer;
            self.remove(id);
            self.objects.insert(id, ObjectEntry { bounds, layer });
            self.insert_descend(id, bounds);
        }
    }

    /// Collect the ids of every object whose bounds intersect `area` and
    /// whose layer bit is set in `layer_mask`, sorted ascending.
    pub fn query(&self, area: Aabb3, layer_mask: u32) -> Vec<u32> {
        let mut out = Vec::new();
        self.query_node(0, area, layer_mask, &mut out);
        out.sort_unstable();
        out
    }

    /// Descend from the root, encapsulating bounds, and drop the object
    /// into the leaf selected by center-vs-split comparisons.
    fn insert_descend(&mut self, id: u32, bounds: Aabb3) {
        let mut node = 0;
        loop {
            if self.objects.len() == 1 && node == 0 {
                // First object defines the root bounds outright.
                self.nodes[0].bounds = bounds;
            } else {
                self.nodes[node].bounds = self.nodes[node].bounds.union(bounds);
            }
            match &self.nodes[node].kind {
                NodeKind::Internal { left, right } => {
                    let (left, right) = (*left, *right);
                    // Descend toward the child whose center is nearer along
                    // the axis that separated them at split time.
                    let axis = self.split_axis(left, right);
                    let split = (self.nodes[left].bounds.center().axis(axis)
                        + self.nodes[right].bounds.center().axis(axis))
                        * Fix64::HALF;
                    let c = bounds.center().axis(axis);
                    node = if c < split { left } else { right };
                }
                NodeKind::Leaf { .. } => break,
            }
        }

        if let NodeKind::Leaf { objects } = &mut self.nodes[node].kind {
            objects.push(id);
        }
        self.leaf_of.insert(id, node);

        let over_capacity = match &self.nodes[node].kind {
            NodeKind::Leaf { objects } => objects.len() > self.max_objects,
            NodeKind::Internal { .. } => false,
        };
        if over_capacity && self.nodes[node].depth < self.max_depth {
            self.split_leaf(node);
        }
    }

    /// Axis along which two sibling subtrees are most separated.
    fn split_axis(&self, left: usize, right: usize) -> usize {
        self.nodes[left].bounds.union(self.nodes[right].bounds).longest_axis()
    }

    /// Split a leaf at the median object center on the longest axis of its
    /// combined bounds.
    fn split_leaf(&mut self, node: usize) {
        let members = match &self.nodes[node].kind {
            NodeKind::Leaf { objects } => objects.clone(),
            NodeKind::Internal { .. } => return,
        };

        let mut combined = self.objects[&members[0]].bounds;
        for id in &members[1..] {
            combined = combined.union(self.objects[id].bounds);
        }
        let axis = combined.longest_axis();

        // Sort by center along the split axis; tie-break by id so the
        // partition is deterministic.
        let mut order = members;
        order.sort_by(|a, b| {
            let ca = self.objects[a].bounds.center().axis(axis);
            let cb = self.objects[b].bounds.center().axis(axis);
            ca.cmp(&cb).then(a.cmp(b))
        });
        let mid = order.len() / 2;
        let (left_ids, right_ids) = order.split_at(mid);

        let depth = self.nodes[node].depth;
        let left = self.new_leaf(left_ids.to_vec(), node, depth + 1);
        let right = self.new_leaf(right_ids.to_vec(), node, depth + 1);
        for id in left_ids {
            self.leaf_of.insert(*id, left);
        }
        for id in right_ids {
            self.leaf_of.insert(*id, right);
        }

        self.nodes[node].kind = NodeKind::Internal { left, right };
    }

    fn new_leaf(&mut self, members: Vec<u32>, parent: usize, depth: u32) -> usize {
        let mut bounds = self.objects[&members[0]].bounds;
        for id in &members[1..] {
            bounds = bounds.union(self.objects[id].bounds);
        }
        self.nodes.push(BvhNode {
            bounds,
            parent: Some(parent),
            depth,
            kind: NodeKind::Leaf { objects: members },
        });
        self.nodes.len() - 1
    }

    /// Recompute a leaf's bounds from its members. An empty leaf keeps its
    /// previous bounds.
    fn recompute_leaf_bounds(&mut self, leaf: usize) {
        let members = match &self.nodes[leaf].kind {
            NodeKind::Leaf { objects } => objects.clone(),
            NodeKind::Internal { .. } => return,
        };
        let Some(first) = members.first() else {
            return;
        };
        let mut bounds = self.objects[first].bounds;
        for id in &members[1..] {
            bounds = bounds.union(self.objects[id].bounds);
        }
        self.nodes[leaf].bounds = bounds;
    }

    /// Refresh ancestor bounds bottom-up after a leaf changed.
    fn refit_ancestors(&mut self, mut node: usize) {
        while let Some(parent) = self.nodes[node].parent {
            if let NodeKind::Internal { left, right } = self.nodes[parent].kind {
                self.nodes[parent].bounds =
                    self.nodes[left].bounds.union(self.nodes[right].bounds);
            }
            node = parent;
        }
    }

    fn query_node(&self, node: usize, area: Aabb3, layer_mask: u32, out: &mut Vec<u32>) {
        if !self.nodes[node].bounds.overlaps(area) {
            return;
        }
        match &self.nodes[node].kind {
            NodeKind::Internal { left, right } => {
                self.query_node(*left, area, layer_mask, out);
                self.query_node(*right, area, layer_mask, out);
            }
            NodeKind::Leaf { objects } => {
                for &id in objects {
                    let entry = &self.objects[&id];
                    if layer_mask & (1u32 << entry.layer) != 0 && entry.bounds.overlaps(area) {
                        out.push(id);
                    }
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec3::FixVec3;
    use proptest::prelude::*;

    fn cube(x: i32, y: i32, z: i32, size: i32) -> Aabb3 {
        Aabb3::new(
            FixVec3::from_ints(x, y, z),
            FixVec3::from_ints(x + size, y + size, z + size),
        )
    }

    /// Every live object's bounds must be contained by its leaf's bounds.
    fn assert_leaf_invariant(bvh: &Bvh, entries: &[(u32, Aabb3)]) {
        for (id, bounds) in entries {
            let leaf = bvh
                .leaf_bounds_of(*id)
                .expect("live object maps to a leaf");
            assert!(
                leaf.contains(*bounds),
                "leaf bounds must contain object {id}"
            );
        }
    }

    #[test]
    fn test_insert_query() {
        let mut bvh = Bvh::new(2, 8);
        bvh.insert(1, cube(0, 0, 0, 2), 0);
        bvh.insert(2, cube(10, 0, 0, 2), 0);
        bvh.insert(3, cube(0, 10, 0, 2), 0);
        bvh.insert(4, cube(5, 5, 5, 2), 0);

        assert_eq!(bvh.query(cube(-1, -1, -1, 4), u32::MAX), vec![1]);
        assert_eq!(bvh.query(cube(-1, -1, -1, 30), u32::MAX), vec![1, 2, 3, 4]);
        assert!(bvh.query(cube(50, 50, 50, 2), u32::MAX).is_empty());
    }

    #[test]
    fn test_remove_tolerates_empty_leaves() {
        let mut bvh = Bvh::new(1, 8);
        for i in 0..6 {
            bvh.insert(i, cube(i as i32 * 4, 0, 0, 2), 0);
        }
        for i in 0..6 {
            bvh.remove(i);
        }
        assert!(bvh.is_empty());
        assert!(bvh.query(cube(-100, -100, -100, 200), u32::MAX).is_empty());
        // Removing an unknown id is a no-op
        bvh.remove(99);
    }

    #[test]
    fn test_update_contained_fast_path() {
        let mut bvh = Bvh::new(4, 8);
        bvh.insert(1, cube(0, 0, 0, 10), 0);
        bvh.insert(2, cube(2, 2, 2, 2), 0);
        // Shrinking inside the leaf takes the fast path
        bvh.update(2, cube(3, 3, 3, 1));
        assert_eq!(bvh.query(cube(3, 3, 3, 1), u32::MAX), vec![1, 2]);
        assert_leaf_invariant(&bvh, &[(1, cube(0, 0, 0, 10)), (2, cube(3, 3, 3, 1))]);
    }

    #[test]
    fn test_update_escape_reinserts() {
        let mut bvh = Bvh::new(1, 8);
        bvh.insert(1, cube(0, 0, 0, 2), 0);
        bvh.insert(2, cube(4, 0, 0, 2), 0);
        bvh.insert(3, cube(8, 0, 0, 2), 0);
        // Move object 1 far away: must leave its leaf and be found again
        bvh.update(1, cube(100, 100, 100, 2));
        assert_eq!(bvh.query(cube(99, 99, 99, 4), u32::MAX), vec![1]);
        assert!(!bvh.query(cube(-1, -1, -1, 4), u32::MAX).contains(&1));
        assert_leaf_invariant(
            &bvh,
            &[(1, cube(100, 100, 100, 2)), (2, cube(4, 0, 0, 2)), (3, cube(8, 0, 0, 2))],
        );
    }

    #[test]
    fn test_layer_mask() {
        let mut bvh = Bvh::new(4, 8);
        bvh.insert(1, cube(0, 0, 0, 2), 1);
        bvh.insert(2, cube(0, 0, 0, 2), 5);
        assert_eq!(bvh.query(cube(0, 0, 0, 2), 1 << 1), vec![1]);
        assert_eq!(bvh.query(cube(0, 0, 0, 2), 1 << 5), vec![2]);
        assert_eq!(bvh.query(cube(0, 0, 0, 2), u32::MAX), vec![1, 2]);
    }

    #[test]
    fn test_coincident_centers_split() {
        // Median-index split must not loop when all centers coincide.
        let mut bvh = Bvh::new(2, 4);
        for i in 0..10 {
            bvh.insert(i, cube(0, 0, 0, 2), 0);
        }
        assert_eq!(bvh.len(), 10);
        let hits = bvh.query(cube(0, 0, 0, 2), u32::MAX);
        assert_eq!(hits, (0..10).collect::<Vec<_>>());
    }

    proptest! {
        /// Property 5: after any sequence of inserts/updates/removes, the
        /// index maps each live entity to a leaf whose bounds contain its
        /// current bounds.
        #[test]
        fn prop_leaf_invariant(
            ops in prop::collection::vec(
                (0u32..20, -30i32..30, -30i32..30, -30i32..30, 1i32..5, 0u8..3),
                1..80,
            )
        ) {
            let mut bvh = Bvh::new(2, 10);
            let mut live: std::collections::BTreeMap<u32, Aabb3> = Default::default();
            for (id, x, y, z, size, op) in ops {
                let bounds = cube(x, y, z, size);
                match op {
                    0 => {
                        bvh.insert(id, bounds, 0);
                        live.insert(id, bounds);
                    }
                    1 => {
                        if live.contains_key(&id) {
                            bvh.update(id, bounds);
                            live.insert(id, bounds);
                        }
                    }
                    _ => {
                        bvh.remove(id);
                        live.remove(&id);
                    }
                }
                let entries: Vec<(u32, Aabb3)> =
                    live.iter().map(|(k, v)| (*k, *v)).collect();
                assert_leaf_invariant(&bvh, &entries);
            }

            // Query over everything finds exactly the live set.
            let all = bvh.query(cube(-100, -100, -100, 200), u32::MAX);
            let expected: Vec<u32> = live.keys().copied().collect();
            prop_assert_eq!(all, expected);
        }
    }
}
