//! Quadtree Broad Phase (2D)
//!
//! Loose-membership quadtree over dynamic AABBs: an object is stored in
//! every leaf its AABB overlaps, and queries deduplicate before returning.
//! The tree is rebuilt against the current world each physics refresh.
//!
//! ## Auto-resize
//!
//! Arenas are extensible: before an insert, if any *dynamic* object's AABB
//! has escaped the root rectangle, the whole tree is rebuilt with
//! `root = union(all AABBs)` scaled ×1.5 about its center. Static objects
//! never trigger a resize (their bounds were valid at insertion and do not
//! move). Nodes are never merged on removal.
//!
//! Query results are returned sorted ascending by id, so downstream pair
//! processing is deterministic.

use crate::collections::OrderedMap;
use crate::core::fixed::Fix64;
use crate::core::vec2::FixVec2;

use super::aabb::Aabb2;

/// Growth factor applied to the union bounds on resize (1.5).
const EXPAND_FACTOR: Fix64 = Fix64::from_ratio(3, 2);

/// Per-object record tracked by the tree.
#[derive(Clone, Copy, Debug)]
struct TreeObject {
    aabb: Aabb2,
    layer: u8,
    is_static: bool,
}

/// Arena-allocated tree node. Children order: LU, RU, LD, RD.
#[derive(Clone, Debug)]
struct QuadNode {
    bounds: Aabb2,
    depth: u32,
    objects: Vec<u32>,
    children: Option<[usize; 4]>,
}

/// Extensible-bounds quadtree keyed by entity id.
#[derive(Clone, Debug)]
pub struct Quadtree {
    max_objects: usize,
    max_depth: u32,
    nodes: Vec<QuadNode>,
    objects: OrderedMap<u32, TreeObject>,
}

impl Quadtree {
    /// Create a tree with the given root bounds and node parameters.
    ///
    /// # Panics
    /// Panics if `max_objects` is zero or `bounds` is degenerate; these are
    /// construction-time configuration bugs, not runtime conditions.
    pub fn new(bounds: Aabb2, max_objects: usize, max_depth: u32) -> Self {
        assert!(max_objects > 0, "quadtree needs a positive object cap");
        assert!(
            bounds.min.x < bounds.max.x && bounds.min.y < bounds.max.y,
            "quadtree root bounds must have positive area"
        );
        Self {
            max_objects,
            max_depth,
            nodes: vec![QuadNode {
                bounds,
                depth: 0,
                objects: Vec::new(),
                children: None,
            }],
            objects: OrderedMap::new(),
        }
    }

    /// Current root rectangle.
    pub fn root_bounds(&self) -> Aabb2 {
        self.nodes[0].bounds
    }

    /// Number of tracked objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if no objects are tracked.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Insert an object. Replaces any existing entry with the same id.
    pub fn insert(&mut self, id: u32, aabb: Aabb2, layer: u8, is_static: bool) {
        if self.objects.contains(&id) {
            self.remove(id);
        }
        self.objects.insert(
            id,
            TreeObject {
                aabb,
                layer,
                is_static,
            },
        );
        // A resize re-inserts everything, including this object.
        if !self.check_and_expand() {
            self.insert_into(0, id, aabb);
        }
    }

    /// Remove an object from the tree. No node merging happens.
    pub fn remove(&mut self, id: u32) {
        if self.objects.remove(&id).is_none() {
            return;
        }
        self.remove_from(0, id);
    }

    /// Update an object's AABB: remove and re-insert with the same
    /// layer/static flags.
    pub fn update(&mut self, id: u32, aabb: Aabb2) {
        let Some(obj) = self.objects.get(&id).copied() else {
            return;
        };
        self.remove(id);
        self.insert(id, aabb, obj.layer, obj.is_static);
    }

    /// Collect the ids of every object whose AABB intersects `area` and
    /// whose layer bit is set in `layer_mask`. Results are deduplicated
    /// (objects can live in several leaves) and sorted ascending.
    pub fn query(&self, area: Aabb2, layer_mask: u32) -> Vec<u32> {
        let mut out = Vec::new();
        self.query_node(0, area, layer_mask, &mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Rebuild the tree if any dynamic object has escaped the root.
    /// Returns true if a rebuild happened.
    ///
    /// New root = union of every tracked AABB, scaled ×1.5 about its
    /// center.
    fn check_and_expand(&mut self) -> bool {
        let root = self.nodes[0].bounds;
        let escaped = self
            .objects
            .values()
            .any(|o| !o.is_static && !root.contains(o.aabb));
        if !escaped {
            return false;
        }

        let mut union = root;
        for obj in self.objects.values() {
            union = union.union(obj.aabb);
        }
        let new_root = union.scaled(EXPAND_FACTOR);

        self.nodes.clear();
        self.nodes.push(QuadNode {
            bounds: new_root,
            depth: 0,
            objects: Vec::new(),
            children: None,
        });
        // Re-insert in insertion order so the rebuilt tree is identical on
        // every machine.
        let ids: Vec<(u32, Aabb2)> = self.objects.iter().map(|(id, o)| (*id, o.aabb)).collect();
        for (id, aabb) in ids {
            self.insert_into(0, id, aabb);
        }
        true
    }

    fn insert_into(&mut self, node: usize, id: u32, aabb: Aabb2) {
        if let Some(children) = self.nodes[node].children {
            for child in children {
                if self.nodes[child].bounds.overlaps(aabb) {
                    self.insert_into(child, id, aabb);
                }
            }
            return;
        }

        self.nodes[node].objects.push(id);
        if self.nodes[node].objects.len() > self.max_objects
            && self.nodes[node].depth < self.max_depth
        {
            self.split(node);
        }
    }

    /// Split a leaf into four equal quadrants and redistribute its objects
    /// into every overlapping child.
    fn split(&mut self, node: usize) {
        let bounds = self.nodes[node].bounds;
        let depth = self.nodes[node].depth;
        let center = bounds.center();

        let quadrants = [
            // LU
            Aabb2::new(FixVec2::new(bounds.min.x, center.y), FixVec2::new(center.x, bounds.max.y)),
            // RU
            Aabb2::new(center, bounds.max),
            // LD
            Aabb2::new(bounds.min, center),
            // RD
            Aabb2::new(FixVec2::new(center.x, bounds.min.y), FixVec2::new(bounds.max.x, center.y)),
        ];

        let base = self.nodes.len();
        for q in quadrants {
            self.nodes.push(QuadNode {
                bounds: q,
                depth: depth + 1,
                objects: Vec::new(),
                children: None,
            });
        }
        let children = [base, base + 1, base + 2, base + 3];
        self.nodes[node].children = Some(children);

        let moved = std::mem::take(&mut self.nodes[node].objects);
        for id in moved {
            let aabb = self
                .objects
                .get(&id)
                .expect("tree object has a table entry")
                .aabb;
            for child in children {
                if self.nodes[child].bounds.overlaps(aabb) {
                    self.insert_into(child, id, aabb);
                }
            }
        }
    }

    // No overlap pruning here: an object whose AABB lies outside the node
    // it was stored in (static outside the root) must still be unlinked.
    fn remove_from(&mut self, node: usize, id: u32) {
        if let Some(children) = self.nodes[node].children {
            for child in children {
                self.remove_from(child, id);
            }
        } else {
            self.nodes[node].objects.retain(|o| *o != id);
        }
    }

    fn query_node(&self, node: usize, area: Aabb2, layer_mask: u32, out: &mut Vec<u32>) {
        if !self.nodes[node].bounds.overlaps(area) {
            return;
        }
        if let Some(children) = self.nodes[node].children {
            for child in children {
                self.query_node(child, area, layer_mask, out);
            }
            return;
        }
        for &id in &self.nodes[node].objects {
            let obj = self.objects.get(&id).expect("tree object has a table entry");
            if layer_mask & (1u32 << obj.layer) != 0 && obj.aabb.overlaps(area) {
                out.push(id);
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
