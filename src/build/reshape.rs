//! Dimension merging for array references.
//!
//! Two arrays are related through the names of their dimensions. The merged dimension order
//! comes from a longest-matching-block diff of the two name sequences (the classic
//! Ratcliff/Obershelp matcher): spans common to both sides, or only on the source side, keep
//! source order; spans only on the target side are spliced in where they occur; spans that
//! differ on both sides contribute the source span followed by the target span.

use std::{collections::HashMap, hash::Hash, ops::Range};

use crate::{error::BaldError, graph::ShapeMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTag {
    Equal,
    Delete,
    Insert,
    Replace,
}

/// One edit step turning `a[a_range]` into `b[b_range]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opcode {
    pub tag: OpTag,
    pub a: Range<usize>,
    pub b: Range<usize>,
}

/// The longest block `(i, j, k)` with `a[i..i+k] == b[j..j+k]` inside the given windows,
/// earliest in `a` (then in `b`) on ties.
fn longest_match<T: Eq + Hash>(
    a: &[T],
    b2j: &HashMap<&T, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut besti, mut bestj, mut bestsize) = (alo, blo, 0);
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for (i, item) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b2j.get(item) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j
                    .checked_sub(1)
                    .and_then(|prev| j2len.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next.insert(j, k);
                if k > bestsize {
                    besti = i + 1 - k;
                    bestj = j + 1 - k;
                    bestsize = k;
                }
            }
        }
        j2len = next;
    }
    (besti, bestj, bestsize)
}

fn matching_blocks<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<(usize, usize, usize)> {
    let mut b2j: HashMap<&T, Vec<usize>> = HashMap::new();
    for (j, item) in b.iter().enumerate() {
        b2j.entry(item).or_default().push(j);
    }
    let mut blocks = Vec::new();
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k > 0 {
            blocks.push((i, j, k));
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
    }
    blocks.sort_unstable();

    // collapse adjacent blocks
    let mut collapsed = Vec::with_capacity(blocks.len() + 1);
    let (mut i1, mut j1, mut k1) = (0, 0, 0);
    for (i2, j2, k2) in blocks {
        if i1 + k1 == i2 && j1 + k1 == j2 {
            k1 += k2;
        } else {
            if k1 > 0 {
                collapsed.push((i1, j1, k1));
            }
            (i1, j1, k1) = (i2, j2, k2);
        }
    }
    if k1 > 0 {
        collapsed.push((i1, j1, k1));
    }
    collapsed.push((a.len(), b.len(), 0));
    collapsed
}

/// Edit steps between two sequences.
pub fn sequence_opcodes<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<Opcode> {
    let mut opcodes = Vec::new();
    let (mut i, mut j) = (0, 0);
    for (ai, bj, size) in matching_blocks(a, b) {
        let tag = match (i < ai, j < bj) {
            (true, true) => Some(OpTag::Replace),
            (true, false) => Some(OpTag::Delete),
            (false, true) => Some(OpTag::Insert),
            (false, false) => None,
        };
        if let Some(tag) = tag {
            opcodes.push(Opcode {
                tag,
                a: i..ai,
                b: j..bj,
            });
        }
        i = ai + size;
        j = bj + size;
        if size > 0 {
            opcodes.push(Opcode {
                tag: OpTag::Equal,
                a: ai..i,
                b: bj..j,
            });
        }
    }
    opcodes
}

/// A single ordering covering both sequences.
pub fn merge_sequences<T: Clone + Eq + Hash>(a: &[T], b: &[T]) -> Vec<T> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    for op in sequence_opcodes(a, b) {
        match op.tag {
            OpTag::Equal | OpTag::Delete => merged.extend_from_slice(&a[op.a]),
            OpTag::Insert => merged.extend_from_slice(&b[op.b]),
            OpTag::Replace => {
                merged.extend_from_slice(&a[op.a]);
                merged.extend_from_slice(&b[op.b]);
            }
        }
    }
    merged
}

/// Broadcast-compatible reshapes for a source and target array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reshape {
    pub source: ShapeMap,
    pub target: ShapeMap,
}

impl Reshape {
    pub fn source_sizes(&self) -> Vec<usize> {
        self.source.values().copied().collect()
    }

    pub fn target_sizes(&self) -> Vec<usize> {
        self.target.values().copied().collect()
    }

    /// The same reshape seen from the target.
    pub fn mirrored(&self) -> Reshape {
        Reshape {
            source: self.target.clone(),
            target: self.source.clone(),
        }
    }
}

/// Lays both sides out over the merged dimension order.
///
/// A dimension missing from a side becomes a size-1 axis on that side; present dimensions keep
/// that side's size. Fails with [BaldError::Reshape] if a side's element count changes, which
/// happens when a dimension name repeats within one side with different sizes.
pub fn merge_dimensions(
    source: &[(String, usize)],
    target: &[(String, usize)],
) -> Result<Reshape, BaldError> {
    let source_names: Vec<&str> = source.iter().map(|(n, _)| n.as_str()).collect();
    let target_names: Vec<&str> = target.iter().map(|(n, _)| n.as_str()).collect();
    let order = merge_sequences(&source_names, &target_names);

    let layout = |side: &[(String, usize)]| -> ShapeMap {
        let declared: ShapeMap = side.iter().cloned().collect();
        order
            .iter()
            .map(|name| (name.to_string(), declared.get(*name).copied().unwrap_or(1)))
            .collect()
    };
    let reshape = Reshape {
        source: layout(source),
        target: layout(target),
    };

    for (label, side, reshaped) in [
        ("source", source, &reshape.source),
        ("target", target, &reshape.target),
    ] {
        let original: usize = side.iter().map(|(_, s)| *s).product();
        let merged: usize = reshaped.values().product();
        if original != merged {
            return Err(BaldError::Reshape(format!(
                "{label} holds {original} elements but its reshape holds {merged}"
            )));
        }
    }
    Ok(reshape)
}

/// Pairs dimension names with sizes.
pub fn named_shape(dimensions: &[String], shape: &[usize]) -> Vec<(String, usize)> {
    dimensions.iter().cloned().zip(shape.iter().copied()).collect()
}
