use crate::{BlockChain, ChainError};
use alloy_primitives::B256;

/// The path between two blocks through their latest common ancestor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRoute {
    /// Hashes along the route: a parent-to-child descent from `from`,
    /// optionally the common ancestor, then a child-to-parent ascent to
    /// `to`, subject to the emission toggles.
    pub route: Vec<B256>,
    /// The latest common ancestor of both blocks.
    pub common: B256,
    /// Position where the common ancestor sits (or would be inserted) in
    /// `route`.
    pub index: usize,
}

impl BlockChain {
    /// Computes the route between two known blocks.
    ///
    /// `include_pre` emits the descent from `from` down to just above the
    /// common ancestor, `include_common` the ancestor itself, and
    /// `include_post` the ascent from just above the ancestor up to `to`.
    /// When the ancestor is `from` or `to` itself it is always part of the
    /// route, regardless of `include_common`. Two sibling blocks meet at
    /// their shared parent; two blocks with no later ancestor in common
    /// meet at genesis.
    pub fn tree_route(
        &self,
        from: B256,
        to: B256,
        include_common: bool,
        include_pre: bool,
        include_post: bool,
    ) -> Result<TreeRoute, ChainError> {
        let mut from_details = self.require_details(from)?;
        let mut to_details = self.require_details(to)?;

        let mut from_cursor = from;
        let mut to_cursor = to;
        let mut descent = Vec::new();
        let mut ascent = Vec::new();

        // Walk the deeper side up until both cursors sit at equal height.
        while from_details.number > to_details.number {
            descent.push(from_cursor);
            from_cursor = from_details.parent;
            from_details = self.require_details(from_cursor)?;
        }
        while to_details.number > from_details.number {
            ascent.push(to_cursor);
            to_cursor = to_details.parent;
            to_details = self.require_details(to_cursor)?;
        }

        // Lockstep ascent until the cursors coincide.
        while from_cursor != to_cursor {
            descent.push(from_cursor);
            ascent.push(to_cursor);
            from_cursor = from_details.parent;
            to_cursor = to_details.parent;
            from_details = self.require_details(from_cursor)?;
            to_details = self.require_details(to_cursor)?;
        }

        let common = from_cursor;
        let mut route = if include_pre { descent } else { Vec::new() };
        let index = route.len();
        if include_common || common == from || common == to {
            route.push(common);
        }
        if include_post {
            ascent.reverse();
            route.extend(ascent);
        }
        Ok(TreeRoute { route, common, index })
    }
}
