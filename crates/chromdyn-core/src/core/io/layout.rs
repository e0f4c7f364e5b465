use crate::core::models::system::Chain;
use std::collections::HashSet;

/// Groups consecutive beads sharing a chain label into chains.
///
/// A chain is marked as a ring when `links` contains a pair joining its first and last
/// bead.
pub(crate) fn chains_from_labels<L: PartialEq>(
    labels: &[L],
    links: &HashSet<(usize, usize)>,
) -> Vec<Chain> {
    let mut chains = Vec::new();
    let mut start = 0;
    for i in 1..=labels.len() {
        if i == labels.len() || labels[i] != labels[start] {
            let end = i;
            let is_ring = end - start > 2
                && (links.contains(&(start, end - 1)) || links.contains(&(end - 1, start)));
            chains.push(Chain::new(start, end, is_ring));
            start = i;
        }
    }
    chains
}

/// Chain identifier letter used by text formats, cycling through `A..Z`.
pub(crate) fn chain_letter(index: usize) -> char {
    (b'A' + (index % 26) as u8) as char
}
