//! Disk-serialisable B+-tree index (§4.4).
//!
//! Nodes live in a growable arena (`Vec<Node>`); children are `usize` indices into
//! that pool rather than raw pointers (Design Notes §9: "Raw pointer graphs -> arena +
//! indices"). This makes breadth-first-ish persistence trivial (serialize the pool in
//! insertion order) and removes any lifetime bookkeeping for child links.
//!
//! Leaf payloads are row positions: either directly into the column (clustered case)
//! or into a [`crate::sorted_index::SortedIndex`]'s position array (unclustered case) —
//! the tree itself is agnostic to which.

const NO_LEAF: usize = usize::MAX;

struct Node {
    is_leaf: bool,
    keys: Vec<i32>,
    /// Leaf payloads, parallel to `keys`. Empty for internal nodes.
    positions: Vec<i64>,
    /// Internal-node children; `children.len() == keys.len() + 1`. Empty for leaves.
    children: Vec<usize>,
    /// Leaf-to-leaf link (the tree is leaf-linked per §4.4), `NO_LEAF` if none.
    next_leaf: usize,
}

/// A B+-tree with build-time fanout (max keys per node).
pub struct BTree {
    fanout: usize,
    nodes: Vec<Node>,
    root: usize,
}

impl BTree {
    /// An empty tree (a single empty leaf as root) with the given fanout.
    pub fn new(fanout: usize) -> Self {
        let root_node = Node {
            is_leaf: true,
            keys: Vec::new(),
            positions: Vec::new(),
            children: Vec::new(),
            next_leaf: NO_LEAF,
        };
        BTree {
            fanout: fanout.max(2),
            nodes: vec![root_node],
            root: 0,
        }
    }

    /// Build a tree by inserting every `(value, position)` pair, in the order given.
    /// Building from an already value-sorted source (a [`crate::sorted_index::SortedIndex`]
    /// or a clustered column) is fine — insertion order does not need to be sorted.
    pub fn build(pairs: impl Iterator<Item = (i32, i64)>, fanout: usize) -> Self {
        let mut t = BTree::new(fanout);
        for (v, p) in pairs {
            t.insert(v, p);
        }
        t
    }

    fn push_node(&mut self, n: Node) -> usize {
        self.nodes.push(n);
        self.nodes.len() - 1
    }

    /// Insert `(key, pos)`. Splits overflowing nodes after insertion (post-order split
    /// propagation) rather than splitting preemptively on the way down; both reach the
    /// same tree invariants (non-decreasing keys per node, separator == min of right
    /// subtree, uniform leaf depth) — see the design ledger.
    pub fn insert(&mut self, key: i32, pos: i64) {
        if let Some((sep, new_node)) = self.insert_into(self.root, key, pos) {
            let new_root = Node {
                is_leaf: false,
                keys: vec![sep],
                positions: Vec::new(),
                children: vec![self.root, new_node],
                next_leaf: NO_LEAF,
            };
            self.root = self.push_node(new_root);
        }
    }

    fn insert_into(&mut self, node_idx: usize, key: i32, pos: i64) -> Option<(i32, usize)> {
        if self.nodes[node_idx].is_leaf {
            let node = &mut self.nodes[node_idx];
            let at = node.keys.partition_point(|&k| k <= key);
            node.keys.insert(at, key);
            node.positions.insert(at, pos);
            if node.keys.len() > self.fanout {
                Some(self.split_leaf(node_idx))
            } else {
                None
            }
        } else {
            let ci = self.nodes[node_idx].keys.partition_point(|&k| k <= key);
            let child_idx = self.nodes[node_idx].children[ci];
            let split = self.insert_into(child_idx, key, pos);
            let (sep, new_child) = split?;
            let node = &mut self.nodes[node_idx];
            node.keys.insert(ci, sep);
            node.children.insert(ci + 1, new_child);
            if node.keys.len() > self.fanout {
                Some(self.split_internal(node_idx))
            } else {
                None
            }
        }
    }

    fn split_leaf(&mut self, node_idx: usize) -> (i32, usize) {
        let mid = self.nodes[node_idx].keys.len() / 2;
        let (right_keys, right_positions) = {
            let node = &mut self.nodes[node_idx];
            (node.keys.split_off(mid), node.positions.split_off(mid))
        };
        let sep = right_keys[0];
        let old_next = self.nodes[node_idx].next_leaf;
        let new_leaf = Node {
            is_leaf: true,
            keys: right_keys,
            positions: right_positions,
            children: Vec::new(),
            next_leaf: old_next,
        };
        let new_idx = self.push_node(new_leaf);
        self.nodes[node_idx].next_leaf = new_idx;
        (sep, new_idx)
    }

    fn split_internal(&mut self, node_idx: usize) -> (i32, usize) {
        let (sep, right_keys, right_children) = {
            let node = &mut self.nodes[node_idx];
            let mid = node.keys.len() / 2;
            let sep = node.keys[mid];
            let right_keys = node.keys.split_off(mid + 1);
            node.keys.truncate(mid);
            let right_children = node.children.split_off(mid + 1);
            (sep, right_keys, right_children)
        };
        let new_node = Node {
            is_leaf: false,
            keys: right_keys,
            positions: Vec::new(),
            children: right_children,
            next_leaf: NO_LEAF,
        };
        let new_idx = self.push_node(new_node);
        (sep, new_idx)
    }

    fn leftmost_leaf(&self) -> usize {
        let mut idx = self.root;
        while !self.nodes[idx].is_leaf {
            idx = self.nodes[idx].children[0];
        }
        idx
    }

    /// Descend to the leaf that would contain the smallest key `>= target`.
    fn find_leaf(&self, target: i32) -> usize {
        let mut idx = self.root;
        while !self.nodes[idx].is_leaf {
            let node = &self.nodes[idx];
            let ci = node.keys.partition_point(|&k| k <= target);
            idx = node.children[ci];
        }
        idx
    }

    /// All positions whose key is in the inclusive `[low, high]` range (either bound
    /// `None` meaning +/- infinity), walking leaf links left to right.
    pub fn range(&self, low: Option<i32>, high: Option<i32>) -> Vec<i64> {
        let mut leaf_idx = match low {
            Some(v) => self.find_leaf(v),
            None => self.leftmost_leaf(),
        };
        let mut pos_in_leaf = match low {
            Some(v) => self.nodes[leaf_idx].keys.partition_point(|&k| k < v),
            None => 0,
        };
        let mut out = Vec::new();
        loop {
            let node = &self.nodes[leaf_idx];
            while pos_in_leaf < node.keys.len() {
                let k = node.keys[pos_in_leaf];
                if let Some(h) = high {
                    if k > h {
                        return out;
                    }
                }
                out.push(node.positions[pos_in_leaf]);
                pos_in_leaf += 1;
            }
            if node.next_leaf == NO_LEAF {
                break;
            }
            leaf_idx = node.next_leaf;
            pos_in_leaf = 0;
        }
        out
    }

    /// In-order `(value, position)` pairs — used to check the tree against the
    /// underlying sorted index / column (§8 invariant 3).
    pub fn in_order(&self) -> Vec<(i32, i64)> {
        let mut leaf_idx = self.leftmost_leaf();
        let mut out = Vec::new();
        loop {
            let node = &self.nodes[leaf_idx];
            for i in 0..node.keys.len() {
                out.push((node.keys[i], node.positions[i]));
            }
            if node.next_leaf == NO_LEAF {
                break;
            }
            leaf_idx = node.next_leaf;
        }
        out
    }

    /// Depth of every leaf, used to check the uniform-leaf-depth invariant in tests.
    pub fn leaf_depths(&self) -> Vec<usize> {
        fn walk(t: &BTree, idx: usize, depth: usize, out: &mut Vec<usize>) {
            let node = &t.nodes[idx];
            if node.is_leaf {
                out.push(depth);
            } else {
                for &c in &node.children {
                    walk(t, c, depth + 1, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self, self.root, 0, &mut out);
        out
    }

    /// Breadth-first byte serialization (§6.2): node count, fanout, then per node in
    /// arena order `is_leaf, key count, keys[], (positions[] | child count, children[]), next_leaf`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.fanout as u64).to_le_bytes());
        out.extend_from_slice(&(self.root as u64).to_le_bytes());
        out.extend_from_slice(&(self.nodes.len() as u64).to_le_bytes());
        for node in &self.nodes {
            out.push(node.is_leaf as u8);
            out.extend_from_slice(&(node.keys.len() as u64).to_le_bytes());
            for k in &node.keys {
                out.extend_from_slice(&k.to_le_bytes());
            }
            if node.is_leaf {
                for p in &node.positions {
                    out.extend_from_slice(&p.to_le_bytes());
                }
                out.extend_from_slice(&(node.next_leaf as u64).to_le_bytes());
            } else {
                out.extend_from_slice(&(node.children.len() as u64).to_le_bytes());
                for c in &node.children {
                    out.extend_from_slice(&(*c as u64).to_le_bytes());
                }
            }
        }
        out
    }

    /// Inverse of [`BTree::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Self {
        let fanout = crate::util::getu64(data, 0) as usize;
        let root = crate::util::getu64(data, 8) as usize;
        let node_count = crate::util::getu64(data, 16) as usize;
        let mut off = 24;
        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let is_leaf = data[off] != 0;
            off += 1;
            let key_count = crate::util::getu64(data, off) as usize;
            off += 8;
            let mut keys = Vec::with_capacity(key_count);
            for _ in 0..key_count {
                keys.push(crate::util::geti32(data, off));
                off += 4;
            }
            if is_leaf {
                let mut positions = Vec::with_capacity(key_count);
                for _ in 0..key_count {
                    positions.push(crate::util::geti64(data, off));
                    off += 8;
                }
                let next_leaf = crate::util::getu64(data, off) as usize;
                off += 8;
                nodes.push(Node {
                    is_leaf: true,
                    keys,
                    positions,
                    children: Vec::new(),
                    next_leaf,
                });
            } else {
                let child_count = crate::util::getu64(data, off) as usize;
                off += 8;
                let mut children = Vec::with_capacity(child_count);
                for _ in 0..child_count {
                    children.push(crate::util::getu64(data, off) as usize);
                    off += 8;
                }
                nodes.push(Node {
                    is_leaf: false,
                    keys,
                    positions: Vec::new(),
                    children,
                    next_leaf: NO_LEAF,
                });
            }
        }
        BTree {
            fanout,
            nodes,
            root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn range_matches_brute_force_over_random_data() {
        let mut rng = rand::thread_rng();
        let values: Vec<i32> = (0..5000).map(|_| rng.gen_range(0..1000)).collect();
        let t = BTree::build(
            values.iter().enumerate().map(|(i, &v)| (v, i as i64)),
            16,
        );
        let (low, high) = (100, 200);
        let mut expect: Vec<i64> = values
            .iter()
            .enumerate()
            .filter(|&(_, &v)| (low..=high).contains(&v))
            .map(|(i, _)| i as i64)
            .collect();
        let mut got = t.range(Some(low), Some(high));
        expect.sort_unstable();
        got.sort_unstable();
        assert_eq!(got, expect);
    }

    #[test]
    fn all_leaves_share_depth() {
        let t = BTree::build((0..2000i32).map(|v| (v, v as i64)), 8);
        let depths = t.leaf_depths();
        assert!(depths.iter().all(|&d| d == depths[0]));
    }

    #[test]
    fn in_order_matches_sorted_input() {
        let mut pairs: Vec<(i32, i64)> = (0..500).map(|i| (999 - i, i as i64)).collect();
        let t = BTree::build(pairs.iter().copied(), 4);
        pairs.sort_by_key(|p| p.0);
        assert_eq!(t.in_order(), pairs);
    }

    #[test]
    fn round_trips_through_bytes() {
        let t = BTree::build((0..300i32).map(|v| (v * 7 % 101, v as i64)), 6);
        let bytes = t.to_bytes();
        let t2 = BTree::from_bytes(&bytes);
        assert_eq!(t.in_order(), t2.in_order());
        assert_eq!(t.range(Some(10), Some(50)).len(), t2.range(Some(10), Some(50)).len());
    }
}
