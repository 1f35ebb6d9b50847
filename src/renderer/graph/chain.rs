//! Final Chain Splicing
//!
//! The tail of the graph is a fixed sequence such as
//! `composite → edge → FXAA`. The head is always live; the others are
//! spliced in and out without ever changing their relative order.
//!
//! ```text
//! insert(edge), FXAA already live:
//!
//!   composite ─────────────► FXAA ═► final
//!   composite ─► edge ─────► FXAA ═► final
//!
//! insert(FXAA), nothing after it:
//!
//!   composite ═► final
//!   composite ─► FXAA ═► final
//! ```
//!
//! Removal is the exact inverse, so an insert followed by a remove leaves
//! every input and target as it was.

use super::graph::EffectGraph;
use super::node::{InputSource, NodeId, NodeTarget};
use super::CHAIN_INPUT_SLOT;

impl EffectGraph {
    /// The chain in its fixed order, live or not.
    #[must_use]
    pub fn chain(&self) -> &[NodeId] {
        &self.chain
    }

    #[must_use]
    pub fn is_chain_node_live(&self, node: NodeId) -> bool {
        self.chain_position(node)
            .is_some_and(|index| self.chain_live[index])
    }

    /// The last live chain node, which renders into the final target.
    #[must_use]
    pub fn tail(&self) -> NodeId {
        self.chain
            .iter()
            .zip(&self.chain_live)
            .rev()
            .find_map(|(id, live)| live.then_some(*id))
            .unwrap_or(self.chain[0])
    }

    fn chain_position(&self, node: NodeId) -> Option<usize> {
        self.chain.iter().position(|&id| id == node)
    }

    fn live_before(&self, index: usize) -> Option<NodeId> {
        (0..index)
            .rev()
            .find(|&i| self.chain_live[i])
            .map(|i| self.chain[i])
    }

    fn live_after(&self, index: usize) -> Option<NodeId> {
        (index + 1..self.chain.len())
            .find(|&i| self.chain_live[i])
            .map(|i| self.chain[i])
    }

    /// Splices `node` into the chain at its fixed position.
    ///
    /// Returns `false` without changing anything when the node is not a chain
    /// node, is already live, or has no live predecessor.
    pub fn insert_chain_node(&mut self, node: NodeId) -> bool {
        let Some(index) = self.chain_position(node) else {
            log::warn!("insert of '{}' ignored: not a chain node", self.name(node).unwrap_or("?"));
            return false;
        };
        if self.chain_live[index] {
            return false;
        }
        let Some(predecessor) = self.live_before(index) else {
            log::warn!(
                "insert of '{}' ignored: no live predecessor",
                self.name(node).unwrap_or("?")
            );
            return false;
        };

        self.nodes[node].set_input(CHAIN_INPUT_SLOT, Some(InputSource::node(predecessor)));
        self.nodes[predecessor].target = NodeTarget::Texture;

        match self.live_after(index) {
            Some(successor) => {
                self.nodes[successor].set_input(CHAIN_INPUT_SLOT, Some(InputSource::node(node)));
                self.nodes[node].target = NodeTarget::Texture;
            }
            None => self.nodes[node].target = NodeTarget::Final,
        }

        self.chain_live[index] = true;
        self.dirty = true;
        log::debug!("chain node '{}' inserted", self.nodes[node].name);
        true
    }

    /// Splices `node` out, reconnecting its neighbours.
    ///
    /// The head of the chain cannot be removed.
    pub fn remove_chain_node(&mut self, node: NodeId) -> bool {
        let Some(index) = self.chain_position(node) else {
            return false;
        };
        if index == 0 || !self.chain_live[index] {
            return false;
        }
        let Some(predecessor) = self.live_before(index) else {
            return false;
        };

        match self.live_after(index) {
            Some(successor) => {
                self.nodes[successor]
                    .set_input(CHAIN_INPUT_SLOT, Some(InputSource::node(predecessor)));
            }
            None => self.nodes[predecessor].target = NodeTarget::Final,
        }

        self.nodes[node].set_input(CHAIN_INPUT_SLOT, None);
        self.nodes[node].target = NodeTarget::Texture;
        self.chain_live[index] = false;
        self.dirty = true;
        log::debug!("chain node '{}' removed", self.nodes[node].name);
        true
    }
}
