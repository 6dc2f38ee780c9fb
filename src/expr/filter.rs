//! Opportunistic secondary-index filter extraction.

use crate::expr::node::CmpOp;
use crate::expr::node::LiteralValue;
use crate::expr::node::Node;

/// A predicate on one indexed bin, extracted opportunistically from a lowered expression.
///
/// Extraction is sound (it never produces a filter that changes result semantics) but may be
/// incomplete: only top-level single-predicate forms are recognized today (decided Open Question
/// (b) — deeper extraction, e.g. conjunctions on the same indexed bin, is a documented future
/// extension, not a bug).
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
	/// `bin = value`.
	Equal(LiteralValue),
	/// `low <= bin <= high`, either bound optionally open (`None` = unbounded).
	Range(Option<LiteralValue>, Option<LiteralValue>),
	/// A geospatial containment predicate. The core only threads the region payload through; it
	/// does not interpret it.
	GeoWithin(Vec<u8>),
}

/// Attempts to extract a [`Filter`] from the top level of a lowered expression tree.
///
/// Only recognizes `binRef OP literal` (or the symmetric `literal OP binRef`) where the whole
/// expression *is* that single predicate — i.e. `root` itself must be the `Cmp` node, not a
/// sub-expression buried inside a larger tree. This matches the extractor's documented
/// soundness-over-completeness stance.
pub fn extract(root: &Node) -> Option<Filter> {
	match root {
		Node::Cmp { op, left, right } => extract_cmp(*op, left.as_ref(), right.as_ref()),
		Node::Between { value, low, high } => extract_between(value.as_ref(), low.as_ref(), high.as_ref()),
		_ => None,
	}
}

fn extract_cmp(op: CmpOp, left: &Node, right: &Node) -> Option<Filter> {
	let (is_bin, literal, flipped) = match (left, right) {
		(Node::BinRef { .. }, Node::Literal { value, .. }) => (true, value, false),
		(Node::Literal { value, .. }, Node::BinRef { .. }) => (true, value, true),
		_ => (false, &LiteralValue::Bool(false), false),
	};
	if !is_bin {
		return None;
	}
	let op = if flipped { flip(op) } else { op };
	match op {
		CmpOp::Eq => Some(Filter::Equal(literal.clone())),
		CmpOp::Ge => Some(Filter::Range(Some(literal.clone()), None)),
		CmpOp::Gt => Some(Filter::Range(Some(literal.clone()), None)),
		CmpOp::Le => Some(Filter::Range(None, Some(literal.clone()))),
		CmpOp::Lt => Some(Filter::Range(None, Some(literal.clone()))),
		CmpOp::Ne => None,
	}
}

fn extract_between(value: &Node, low: &Node, high: &Node) -> Option<Filter> {
	match (value, low, high) {
		(Node::BinRef { .. }, Node::Literal { value: lo, .. }, Node::Literal { value: hi, .. }) => {
			Some(Filter::Range(Some(lo.clone()), Some(hi.clone())))
		}
		_ => None,
	}
}

fn flip(op: CmpOp) -> CmpOp {
	match op {
		CmpOp::Lt => CmpOp::Gt,
		CmpOp::Le => CmpOp::Ge,
		CmpOp::Gt => CmpOp::Lt,
		CmpOp::Ge => CmpOp::Le,
		other => other,
	}
}
