//! Behaviors: named, inheritable bundles of patches, and the cached per-triple resolution they
//! produce.

use crate::behavior::patch::apply_field;
use crate::behavior::patch::Patch;
use crate::behavior::patch::ALL_FIELDS;
use crate::behavior::selector::Triple;
use crate::behavior::settings::Settings;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

/// A named, inheritable bundle of patches. Immutable after construction apart from its resolution
/// cache, which is internally synchronized; safe to share via `Arc` across threads.
pub struct Behavior {
	/// The behavior's name, unique within a registry.
	pub name: String,
	parent: Option<Arc<Behavior>>,
	patches: Vec<Patch>,
	cache: RwLock<HashMap<Triple, Settings>>,
}

impl std::fmt::Debug for Behavior {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Behavior").field("name", &self.name).field("parent", &self.parent.as_ref().map(|p| &p.name)).finish()
	}
}

impl Behavior {
	/// Builds a new behavior named `name` with the given `parent` (its resolved ancestor, `None`
	/// only for DEFAULT) and an ordered list of `patches` in document order.
	pub fn new(name: impl Into<String>, parent: Option<Arc<Behavior>>, patches: Vec<Patch>) -> Behavior {
		Behavior { name: name.into(), parent, patches, cache: RwLock::new(HashMap::new()) }
	}

	/// The ancestor chain from the root (DEFAULT) to `self`, inclusive.
	fn ancestor_chain(&self) -> Vec<&Behavior> {
		let mut chain = Vec::new();
		let mut cursor = Some(self);
		while let Some(behavior) = cursor {
			chain.push(behavior);
			cursor = behavior.parent.as_deref();
		}
		chain.reverse();
		chain
	}

	/// Resolves the fully-populated [`Settings`] for `triple`, consulting (and populating) the
	/// per-behavior cache.
	pub fn resolve(&self, triple: Triple) -> Settings {
		if let Some(settings) = self.cache.read().expect("behavior cache poisoned").get(&triple) {
			return *settings;
		}
		let settings = self.resolve_uncached(triple);
		self.cache.write().expect("behavior cache poisoned").insert(triple, settings);
		settings
	}

	fn resolve_uncached(&self, triple: Triple) -> Settings {
		let chain = self.ancestor_chain();
		// (document index, patch) for every patch anywhere in the chain whose selector contains
		// this triple, in root-to-self, within-behavior declaration order.
		let mut candidates: Vec<(usize, &Patch)> = Vec::new();
		for behavior in &chain {
			for patch in &behavior.patches {
				if patch.selector.contains(triple) {
					let doc_index = candidates.len();
					candidates.push((doc_index, patch));
				}
			}
		}
		let mut settings = Settings::baseline();
		for &field in ALL_FIELDS {
			// Most-specific-wins, where specificity is the (kinds, shapes, modes) axis
			// cardinalities compared lexicographically (kind > shape > mode); equal
			// specificity is broken by later document position.
			let mut winner: Option<((usize, usize, usize), usize, &Patch)> = None;
			for &(doc_index, patch) in &candidates {
				if patch.value(field).is_none() {
					continue;
				}
				let specificity = patch.selector.axes().specificity();
				let better = match winner {
					None => true,
					Some((best_specificity, best_index, _)) => {
						specificity < best_specificity || (specificity == best_specificity && doc_index > best_index)
					}
				};
				if better {
					winner = Some((specificity, doc_index, patch));
				}
			}
			if let Some((_, _, patch)) = winner {
				if let Some(value) = patch.value(field) {
					apply_field(&mut settings, field, value);
				}
			}
		}
		settings
	}

	/// Invalidates every cached triple resolution for this behavior. Called after a hot-reload
	/// rebuilds the behavior's patches.
	pub fn clear_cache(&self) {
		self.cache.write().expect("behavior cache poisoned").clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::behavior::patch::PatchBuilder;
	use crate::behavior::selector::Mode;
	use crate::behavior::selector::OpKind;
	use crate::behavior::selector::OpShape;
	use crate::behavior::selector::Selector;

	#[test]
	fn most_specific_patch_wins_regardless_of_document_order() {
		// DEFAULT: reads.max_attempts=2, reads.batch.max_attempts=3, reads.batch.ap.max_attempts=4
		let default = Arc::new(Behavior::new(
			"DEFAULT",
			None,
			vec![
				PatchBuilder::new(Selector::Reads).max_attempts(2).build(),
				PatchBuilder::new(Selector::ReadsBatch).max_attempts(3).build(),
				PatchBuilder::new(Selector::ReadsBatchAp).max_attempts(4).build(),
			],
		));
		let ap = Triple::new(OpKind::Read, OpShape::Batch, Mode::Ap);
		let cp = Triple::new(OpKind::Read, OpShape::Batch, Mode::Cp);
		assert_eq!(default.resolve(ap).max_attempts, 4);
		assert_eq!(default.resolve(cp).max_attempts, 3);
	}

	#[test]
	fn equal_cardinality_patches_break_ties_on_kind_axis_not_document_order() {
		// writes.retryable (kind={WriteRetryable}, shape={Point,Batch}, mode={Ap,Cp}, product 4)
		// and writes.point (kind={WriteRetryable,WriteNonRetryable}, shape={Point},
		// mode={Ap,Cp}, product 4) tie on raw cardinality but writes.retryable is tighter on the
		// kind axis, which outranks shape, so it must win regardless of declaration order.
		let default = Arc::new(Behavior::new(
			"DEFAULT",
			None,
			vec![
				PatchBuilder::new(Selector::WritesPoint).max_attempts(3).build(),
				PatchBuilder::new(Selector::WritesRetryable).max_attempts(7).build(),
			],
		));
		let t = Triple::new(OpKind::WriteRetryable, OpShape::Point, Mode::Ap);
		assert_eq!(default.resolve(t).max_attempts, 7);

		// Reversing declaration order must not change the winner.
		let reversed = Arc::new(Behavior::new(
			"DEFAULT",
			None,
			vec![
				PatchBuilder::new(Selector::WritesRetryable).max_attempts(7).build(),
				PatchBuilder::new(Selector::WritesPoint).max_attempts(3).build(),
			],
		));
		assert_eq!(reversed.resolve(t).max_attempts, 7);
	}

	#[test]
	fn child_inherits_then_overrides_parent() {
		let default = Arc::new(Behavior::new("DEFAULT", None, vec![PatchBuilder::new(Selector::All).max_attempts(2).build()]));
		let child =
			Behavior::new("aggressive", Some(default.clone()), vec![PatchBuilder::new(Selector::Reads).max_attempts(5).build()]);
		let read = Triple::new(OpKind::Read, OpShape::Point, Mode::Ap);
		let write = Triple::new(OpKind::WriteRetryable, OpShape::Point, Mode::Ap);
		assert_eq!(child.resolve(read).max_attempts, 5);
		assert_eq!(child.resolve(write).max_attempts, 2);
	}

	#[test]
	fn clear_cache_does_not_change_resolution() {
		let default = Arc::new(Behavior::new("DEFAULT", None, vec![PatchBuilder::new(Selector::All).max_attempts(2).build()]));
		let t = Triple::new(OpKind::Read, OpShape::Point, Mode::Ap);
		let before = default.resolve(t).max_attempts;
		default.clear_cache();
		let after = default.resolve(t).max_attempts;
		assert_eq!(before, after);
	}
}
