//! The genealogy forest: node arena, frontier, pruning, trajectories.

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::AncestryError;

/// One particle instance: its state, the node it was resampled from,
/// and how many newer nodes name it as parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    state: Vec<f64>,
    parent: Option<usize>,
    children: u32,
}

/// Reference-counted genealogy forest.
///
/// One generation of particles is appended per time step; each new
/// node holds a parent link to the frontier node it was resampled
/// from. A node stays in memory while it is on the frontier or has a
/// positive child-reference count; everything else is reclaimed
/// inline, cascading up dead lineages. Under resampling this keeps the
/// retained node count proportional to the population, not to
/// population x time.
#[derive(Debug, Clone, Default)]
pub struct AncestryStore {
    /// Arena; `None` marks a reusable slot.
    nodes: Vec<Option<Node>>,
    /// Reusable arena slots.
    free: Vec<usize>,
    /// Node id per population slot, replaced wholesale each generation.
    frontier: Vec<usize>,
    /// Generations appended since construction or `clear`.
    generations: usize,
    /// State dimension established by the first generation.
    state_dim: Option<usize>,
    /// Number of occupied arena slots.
    live: usize,
}

impl AncestryStore {
    /// Creates an empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one generation of particles.
    ///
    /// Row `i` of `states` becomes the new particle at slot `i`, with
    /// parent `frontier[ancestors[i]]`. The first generation ignores
    /// ancestor *values* and creates parentless roots. After the
    /// frontier swap, nodes no longer reachable from any live particle
    /// are reclaimed.
    ///
    /// # Errors
    ///
    /// - [`AncestryError::PopulationMismatch`] if `states.nrows() != ancestors.len()`;
    /// - [`AncestryError::StateDimMismatch`] if the state dimension
    ///   differs from earlier generations;
    /// - [`AncestryError::InvalidAncestor`] if an ancestor index is
    ///   outside the current frontier.
    pub fn append_generation(
        &mut self,
        states: ArrayView2<'_, f64>,
        ancestors: &[usize],
    ) -> Result<(), AncestryError> {
        if states.nrows() != ancestors.len() {
            return Err(AncestryError::PopulationMismatch {
                states: states.nrows(),
                ancestors: ancestors.len(),
            });
        }
        if let Some(d) = self.state_dim {
            if states.ncols() != d {
                return Err(AncestryError::StateDimMismatch {
                    expected: d,
                    got: states.ncols(),
                });
            }
        }
        let roots = self.generations == 0;
        if !roots {
            for &a in ancestors {
                if a >= self.frontier.len() {
                    return Err(AncestryError::InvalidAncestor {
                        index: a,
                        frontier: self.frontier.len(),
                    });
                }
            }
        }

        let mut new_frontier = Vec::with_capacity(ancestors.len());
        for (i, row) in states.rows().into_iter().enumerate() {
            let parent = if roots {
                None
            } else {
                Some(self.frontier[ancestors[i]])
            };
            if let Some(p) = parent {
                self.nodes[p].as_mut().expect("frontier node is live").children += 1;
            }
            let id = self.alloc(Node {
                state: row.to_vec(),
                parent,
                children: 0,
            });
            new_frontier.push(id);
        }

        let old = std::mem::replace(&mut self.frontier, new_frontier);
        for id in old {
            let children = self.nodes[id].as_ref().expect("frontier node is live").children;
            if children == 0 {
                self.reclaim(id);
            }
        }

        self.generations += 1;
        if self.state_dim.is_none() {
            self.state_dim = Some(states.ncols());
        }
        Ok(())
    }

    /// Reconstructs the trajectory of the particle at frontier `slot`.
    ///
    /// Row `t` of the result is the state the lineage held at
    /// generation `t`; row 0 is the root, the last row the particle
    /// itself.
    ///
    /// # Errors
    ///
    /// Returns [`AncestryError::SlotOutOfRange`] if `slot` is outside
    /// the current frontier.
    pub fn trajectory(&self, slot: usize) -> Result<Array2<f64>, AncestryError> {
        let mut out = Array2::zeros((self.generations, self.state_dim.unwrap_or(0)));
        self.trajectory_into(slot, &mut out)?;
        Ok(out)
    }

    /// Reconstructs a trajectory into a pre-allocated matrix.
    ///
    /// # Errors
    ///
    /// As [`AncestryStore::trajectory`], plus
    /// [`AncestryError::ShapeMismatch`] if `out` is not
    /// `generations x state_dim`.
    pub fn trajectory_into(
        &self,
        slot: usize,
        out: &mut Array2<f64>,
    ) -> Result<(), AncestryError> {
        if slot >= self.frontier.len() {
            return Err(AncestryError::SlotOutOfRange {
                slot,
                len: self.frontier.len(),
            });
        }
        let rows = self.generations;
        let cols = self.state_dim.unwrap_or(0);
        if out.nrows() != rows || out.ncols() != cols {
            return Err(AncestryError::ShapeMismatch {
                expected_rows: rows,
                expected_cols: cols,
                got_rows: out.nrows(),
                got_cols: out.ncols(),
            });
        }

        let mut id = Some(self.frontier[slot]);
        for t in (0..rows).rev() {
            let node = id
                .and_then(|i| self.nodes[i].as_ref())
                .expect("lineage reaches generation 0");
            out.row_mut(t).assign(&ArrayView1::from(&node.state[..]));
            id = node.parent;
        }
        debug_assert!(id.is_none(), "lineage longer than generation count");
        Ok(())
    }

    /// Number of generations appended since construction or `clear`.
    pub fn generations(&self) -> usize {
        self.generations
    }

    /// Current population size (frontier slots).
    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// Number of retained nodes across all surviving lineages.
    pub fn live_nodes(&self) -> usize {
        self.live
    }

    /// State dimension, once the first generation has established it.
    pub fn state_dim(&self) -> Option<usize> {
        self.state_dim
    }

    /// Discards all nodes and the frontier, keeping allocated capacity.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.frontier.clear();
        self.generations = 0;
        self.state_dim = None;
        self.live = 0;
    }

    /// As [`AncestryStore::clear`], additionally releasing storage.
    pub fn empty(&mut self) {
        self.clear();
        self.nodes.shrink_to_fit();
        self.free.shrink_to_fit();
        self.frontier.shrink_to_fit();
    }

    /// Captures the full forest state for checkpointing.
    pub fn snapshot(&self) -> AncestrySnapshot {
        AncestrySnapshot {
            nodes: self.nodes.clone(),
            frontier: self.frontier.clone(),
            generations: self.generations,
            state_dim: self.state_dim,
        }
    }

    /// Replaces the forest state with a previously captured snapshot.
    pub fn restore(&mut self, snapshot: AncestrySnapshot) {
        self.free = snapshot
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.is_none().then_some(i))
            .collect();
        self.live = snapshot.nodes.iter().filter(|n| n.is_some()).count();
        self.nodes = snapshot.nodes;
        self.frontier = snapshot.frontier;
        self.generations = snapshot.generations;
        self.state_dim = snapshot.state_dim;
    }

    fn alloc(&mut self, node: Node) -> usize {
        self.live += 1;
        match self.free.pop() {
            Some(i) => {
                self.nodes[i] = Some(node);
                i
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    /// Reclaims `id` and cascades up through parents whose child count
    /// drops to zero. Parents are always from older generations, never
    /// on the current frontier.
    fn reclaim(&mut self, id: usize) {
        let mut cur = Some(id);
        while let Some(i) = cur {
            let node = self.nodes[i].take().expect("reclaiming a live node");
            self.free.push(i);
            self.live -= 1;
            cur = match node.parent {
                Some(p) => {
                    let parent = self.nodes[p].as_mut().expect("parent outlives child");
                    parent.children -= 1;
                    (parent.children == 0).then_some(p)
                }
                None => None,
            };
        }
    }
}

/// Serializable copy of an [`AncestryStore`]'s full state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AncestrySnapshot {
    nodes: Vec<Option<Node>>,
    frontier: Vec<usize>,
    generations: usize,
    state_dim: Option<usize>,
}
