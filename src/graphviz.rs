//! GraphViz rendering of instrumented blocks, for debugging.

use crate::containers::unordered::UnorderedMap;
use crate::ir::{Atom, Block, Stmt, Temp};
use crate::shadow_env::Provenance;

type Node = usize;
/// `(definer, user, temporary)`
type Edge = (Node, Node, Temp);

struct Graph<'a> {
    block: &'a Block,
    provenance: &'a [Provenance],
}

impl<'a> Graph<'a> {
    fn provenance(&self, n: Node) -> Provenance {
        self.provenance
            .get(n)
            .copied()
            .unwrap_or(Provenance::Original)
    }

    /// The statement index that defines each temporary
    fn definers(&self) -> UnorderedMap<Temp, Node> {
        let mut r = UnorderedMap::new();
        for (i, st) in self.block.stmts.iter().enumerate() {
            for t in st.defined_temps() {
                r.insert(t, i);
            }
        }
        r
    }

    fn def_use_edges(&self) -> Vec<Edge> {
        let definers = self.definers();
        let mut edges = vec![];
        for (i, st) in self.block.stmts.iter().enumerate() {
            let mut seen = vec![];
            for a in st.atoms() {
                if let Atom::Tmp(t) = a {
                    if seen.contains(&t) {
                        continue;
                    }
                    seen.push(t);
                    if let Some(&d) = definers.get(&t) {
                        edges.push((d, i, t));
                    }
                }
            }
        }
        edges
    }
}

impl<'a> dot::Labeller<'a, Node, Edge> for Graph<'a> {
    fn graph_id(&'a self) -> dot::Id<'a> {
        dot::Id::new("InstrumentedBlock").unwrap()
    }
    fn node_id(&'a self, n: &Node) -> dot::Id<'a> {
        dot::Id::new(format!("s{}", n)).unwrap()
    }
    fn node_label<'b>(&'b self, n: &Node) -> dot::LabelText<'b> {
        let st: &Stmt = &self.block.stmts[*n];
        dot::LabelText::label(format!("{}: {}", self.provenance(*n).tag(), st))
    }
    fn node_shape(&'a self, n: &Node) -> Option<dot::LabelText<'a>> {
        match self.provenance(*n) {
            Provenance::Original => Some(dot::LabelText::label("box")),
            Provenance::Shadow => Some(dot::LabelText::label("ellipse")),
            Provenance::Diagnostic => Some(dot::LabelText::label("note")),
        }
    }
    fn edge_label<'b>(&'b self, e: &Edge) -> dot::LabelText<'b> {
        dot::LabelText::label(format!("{}", e.2))
    }
}

impl<'a> dot::GraphWalk<'a, Node, Edge> for Graph<'a> {
    fn nodes(&self) -> dot::Nodes<'a, Node> {
        (0..self.block.stmts.len()).collect::<Vec<_>>().into()
    }
    fn edges(&'a self) -> dot::Edges<'a, Edge> {
        self.def_use_edges().into()
    }
    fn source(&self, e: &Edge) -> Node {
        e.0
    }
    fn target(&self, e: &Edge) -> Node {
        e.1
    }
}

/// Write a `.dot` graph of `block`: one node per statement, shaped by its provenance, and one
/// edge per temporary flowing from the statement defining it to each statement reading it.
pub fn write_dot<W: std::io::Write>(
    block: &Block,
    provenance: &[Provenance],
    w: &mut W,
) -> std::io::Result<()> {
    let g = Graph { block, provenance };
    dot::render(&g, w)
}

/// Generate a `.dot` file representing `block`
pub fn generate_dot(block: &Block, provenance: &[Provenance]) -> String {
    let mut s: Vec<u8> = vec![];
    write_dot(block, provenance, &mut s).unwrap();
    String::from_utf8(s).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Expr, JumpKind, Type};
    use crate::ops::Op;

    #[test]
    fn edges_follow_temporaries() {
        let mut b = Block::new(Atom::u64(0), JumpKind::Boring, 184);
        let t0 = b.tyenv.new_temp(Type::I64);
        let t1 = b.tyenv.new_temp(Type::I64);
        b.stmts.push(Stmt::WrTmp {
            tmp: t0,
            data: Expr::Get {
                offset: 16,
                ty: Type::I64,
            },
        });
        b.stmts.push(Stmt::WrTmp {
            tmp: t1,
            data: Expr::Binop(Op::Add64, Atom::Tmp(t0), Atom::Tmp(t0)),
        });
        b.stmts.push(Stmt::Put {
            offset: 24,
            data: Atom::Tmp(t1),
        });
        let prov = [Provenance::Original, Provenance::Shadow, Provenance::Original];
        let g = Graph {
            block: &b,
            provenance: &prov,
        };
        assert_eq!(g.def_use_edges(), vec![(0, 1, t0), (1, 2, t1)]);

        let dot = generate_dot(&b, &prov);
        assert!(dot.starts_with("digraph InstrumentedBlock"));
        assert!(dot.contains("s1 -> s2"));
        assert!(dot.contains("ellipse"));
    }
}
