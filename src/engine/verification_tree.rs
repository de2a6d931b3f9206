//! A trie over the input literals of external-atom IO-nogoods, used during
//! propagation to batch-verify which replacement auxiliaries are already
//! forced by the current partial assignment.

use log::debug;

use crate::basic_types::Id;
use crate::basic_types::Interpretation;
use crate::basic_types::ID_FAIL;
use crate::nogoods::Nogood;
use crate::registry::Registry;

#[derive(Debug)]
struct Node {
    /// The input literal labelling the edge into this node; `ID_FAIL` for
    /// the root.
    label: Id,
    /// Replacement auxiliaries verified once the path to this node is
    /// satisfied.
    verified: Option<Interpretation>,
    children: Vec<Node>,
}

impl Node {
    fn new(label: Id) -> Node {
        Node {
            label,
            verified: None,
            children: Vec::new(),
        }
    }
}

/// Stores IO-nogoods path-compressed by their input literals. A nogood
/// qualifies as an IO-nogood iff it contains exactly one replacement
/// auxiliary; all other nogoods are ignored.
#[derive(Debug)]
pub struct ExternalAtomVerificationTree {
    root: Node,
}

impl Default for ExternalAtomVerificationTree {
    fn default() -> ExternalAtomVerificationTree {
        ExternalAtomVerificationTree::new()
    }
}

impl ExternalAtomVerificationTree {
    pub fn new() -> ExternalAtomVerificationTree {
        ExternalAtomVerificationTree {
            root: Node::new(ID_FAIL),
        }
    }

    /// Inserts one IO-nogood. With `include_negated`, the
    /// opposite-polarity sibling of the auxiliary is verified as well.
    pub fn add_nogood(&mut self, io_nogood: &Nogood, reg: &mut Registry, include_negated: bool) {
        let mut aux = ID_FAIL;
        let mut path = Vec::new();
        for literal in io_nogood.iter() {
            let mut labelled = reg.ground_atom_id(literal.address());
            if literal.is_naf() {
                labelled = labelled.negated();
            }
            if labelled.is_external_aux() {
                if aux != ID_FAIL {
                    // more than one auxiliary: not an IO-nogood
                    return;
                }
                aux = labelled;
            } else {
                path.push(labelled);
            }
        }
        if aux == ID_FAIL {
            return;
        }

        let mut current = &mut self.root;
        for label in path {
            let node = current;
            let position = node.children.iter().position(|child| child.label == label);
            current = match position {
                Some(index) => &mut node.children[index],
                None => {
                    node.children.push(Node::new(label));
                    node.children.last_mut().expect("a node was just pushed")
                }
            };
        }

        let verified = current.verified.get_or_insert_with(Interpretation::new);
        verified.set_fact(aux.address());
        if include_negated {
            let swapped = reg.swap_external_aux_atom(aux.strip_naf());
            current
                .verified
                .get_or_insert_with(Interpretation::new)
                .set_fact(swapped.address());
        }
    }

    /// Collects the auxiliaries verified by the current partial
    /// assignment. The trie is not a search tree, so every matching path
    /// is followed.
    pub fn verified_auxiliaries(
        &self,
        partial: &Interpretation,
        assigned: &Interpretation,
    ) -> Interpretation {
        let mut verified = Interpretation::new();
        Self::collect(&self.root, partial, assigned, &mut verified);
        debug!("verification tree returns {} auxiliaries", verified.count());
        verified
    }

    fn collect(
        node: &Node,
        partial: &Interpretation,
        assigned: &Interpretation,
        output: &mut Interpretation,
    ) {
        if let Some(verified) = &node.verified {
            output.add(verified);
        }
        for child in &node.children {
            let address = child.label.address();
            if assigned.get_fact(address) && partial.get_fact(address) != child.label.is_naf() {
                Self::collect(child, partial, assigned, output);
            }
        }
    }
}
