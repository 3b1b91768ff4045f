/// Refusal from the snapshot allocation capability.
///
/// Surfaced by mutating operations when the injected [`ArrayAlloc`]
/// declines to provide backing storage for a snapshot copy. The mutation
/// fails atomically: the prior snapshot stays installed and no partial
/// state is ever visible.
///
/// [`ArrayAlloc`]: crate::snapshot::ArrayAlloc
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
#[error("snapshot allocation refused for {requested} listener entries")]
pub struct AllocError {
	/// Number of listener entries the factory requested storage for.
	pub requested: usize,
}
