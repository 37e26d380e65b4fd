//! Compact, tree-relative encoding of a subset of refinement-forest nodes.
//!
//! An [`ElementSet`] serializes an arbitrary subset of [`ElementArena`] nodes
//! (interior or leaf) into a byte stream addressable relative to the fixed
//! root array: one control byte per visited node, in pre-order, where bit 0
//! marks membership and bit 1 marks "descend into children". A subtree with
//! no members costs a single byte, so the stream is proportional to the
//! relevant part of the hierarchy, not the whole mesh.
//!
//! Decoding against a structurally compatible arena (same root array, same
//! refinement history reachable from those roots) reproduces exactly the
//! encoded subset; indices are never transmitted, only topology relative to
//! the roots. Small fixed-width integers can additionally be embedded after
//! the traversal via [`ElementSet::push_int`] / [`ElementSet::set_int`] /
//! [`ElementSet::get_int`] without disturbing it.

use crate::error::ParNcError;
use crate::topology::tree::{ElementArena, NodeId};
use bytes::Bytes;
use std::collections::BTreeSet;

const FLAG_MEMBER: u8 = 1 << 0;
const FLAG_DESCEND: u8 = 1 << 1;

/// Encoded subset of refinement-forest nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementSet {
    data: Vec<u8>,
}

impl ElementSet {
    /// Encode `subset` relative to the arena's root array.
    ///
    /// Members must each be reachable from some root; nodes outside the
    /// forest are impossible by construction of [`NodeId`].
    pub fn encode(subset: &BTreeSet<NodeId>, arena: &ElementArena) -> Self {
        let mut data = Vec::new();
        for &root in arena.roots() {
            encode_node(arena, subset, root, &mut data);
        }
        ElementSet { data }
    }

    /// Decode against a structurally compatible arena.
    ///
    /// Fails fast on truncated input or invalid control bytes; trailing bytes
    /// after the traversal are permitted (embedded-integer region).
    pub fn decode(&self, arena: &ElementArena) -> Result<BTreeSet<NodeId>, ParNcError> {
        let mut subset = BTreeSet::new();
        let mut pos = 0usize;
        for &root in arena.roots() {
            decode_node(arena, &self.data, &mut pos, root, &mut subset)?;
        }
        Ok(subset)
    }

    /// Byte offset one past the traversal; embedded integers live from here.
    pub fn traversal_len(&self, arena: &ElementArena) -> Result<usize, ParNcError> {
        let mut pos = 0usize;
        let mut ignore = BTreeSet::new();
        for &root in arena.roots() {
            decode_node(arena, &self.data, &mut pos, root, &mut ignore)?;
        }
        Ok(pos)
    }

    /// Append a little-endian `i32`, returning its byte offset for later
    /// [`ElementSet::set_int`] / [`ElementSet::get_int`] access.
    pub fn push_int(&mut self, value: i32) -> usize {
        let pos = self.data.len();
        self.data.extend_from_slice(&value.to_le_bytes());
        pos
    }

    /// Overwrite the `i32` at byte offset `pos`.
    pub fn set_int(&mut self, pos: usize, value: i32) -> Result<(), ParNcError> {
        let end = pos.checked_add(4).filter(|&e| e <= self.data.len());
        let Some(end) = end else {
            return Err(ParNcError::ElementSetBounds {
                pos,
                len: self.data.len(),
            });
        };
        self.data[pos..end].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Read the `i32` at byte offset `pos`.
    pub fn get_int(&self, pos: usize) -> Result<i32, ParNcError> {
        let end = pos.checked_add(4).filter(|&e| e <= self.data.len());
        let Some(end) = end else {
            return Err(ParNcError::ElementSetBounds {
                pos,
                len: self.data.len(),
            });
        };
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.data[pos..end]);
        Ok(i32::from_le_bytes(raw))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data)
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        ElementSet { data: data.into() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Emit the control byte for `node` and, when any strict descendant is a
/// member, the encodings of its children in order. Returns whether the
/// subtree rooted here intersects the subset.
fn encode_node(
    arena: &ElementArena,
    subset: &BTreeSet<NodeId>,
    node: NodeId,
    out: &mut Vec<u8>,
) -> bool {
    let member = subset.contains(&node);
    let mut child_bytes = Vec::new();
    let mut any_descendant = false;
    for &child in arena.children(node) {
        any_descendant |= encode_node(arena, subset, child, &mut child_bytes);
    }
    let mut flag = 0u8;
    if member {
        flag |= FLAG_MEMBER;
    }
    if any_descendant {
        flag |= FLAG_DESCEND;
    }
    out.push(flag);
    if any_descendant {
        out.extend_from_slice(&child_bytes);
    }
    member || any_descendant
}

fn decode_node(
    arena: &ElementArena,
    data: &[u8],
    pos: &mut usize,
    node: NodeId,
    subset: &mut BTreeSet<NodeId>,
) -> Result<(), ParNcError> {
    let Some(&flag) = data.get(*pos) else {
        return Err(ParNcError::ElementSetDecode {
            pos: *pos,
            detail: "traversal truncated".into(),
        });
    };
    if flag & !(FLAG_MEMBER | FLAG_DESCEND) != 0 {
        return Err(ParNcError::ElementSetDecode {
            pos: *pos,
            detail: format!("invalid control byte {flag:#04x}"),
        });
    }
    *pos += 1;
    if flag & FLAG_MEMBER != 0 {
        subset.insert(node);
    }
    if flag & FLAG_DESCEND != 0 {
        let children = arena.children(node);
        if children.is_empty() {
            // The sender refined this node; our tree has not. Root arrays or
            // refinement histories diverged.
            return Err(ParNcError::ElementSetDecode {
                pos: *pos - 1,
                detail: format!("descend into unrefined node {node:?}"),
            });
        }
        for &child in children {
            decode_node(arena, data, pos, child, subset)?;
        }
    }
    Ok(())
}
