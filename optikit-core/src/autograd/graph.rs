use std::collections::HashSet;

use crate::tensor::{Tensor, TensorId};

/// Orders the graph reachable from `root` so that every node comes before
/// the inputs of its `grad_fn` (root first, leaves last).
pub(crate) fn topological_sort(root: &Tensor) -> Vec<Tensor> {
    let mut visited: HashSet<TensorId> = HashSet::new();
    let mut post_order: Vec<Tensor> = Vec::new();
    // Iterative DFS: (node, inputs already expanded)
    let mut stack: Vec<(Tensor, bool)> = vec![(root.clone(), false)];

    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            post_order.push(node);
            continue;
        }
        if !visited.insert(node.id()) {
            continue;
        }
        let inputs = node.grad_fn().map(|op| op.inputs()).unwrap_or_default();
        stack.push((node, true));
        for input in inputs {
            if !visited.contains(&input.id()) {
                stack.push((input, false));
            }
        }
    }

    post_order.reverse();
    post_order
}
