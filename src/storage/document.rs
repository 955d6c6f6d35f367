/// An identity-bearing record mirrored from a remote collection.
///
/// `PartialEq` is the structural comparison used to decide whether a
/// re-fetched document actually changed.
pub trait Document: Clone + PartialEq + Send + Sync + 'static {
    /// Stable identifier, unique within its collection
    fn id(&self) -> &str;
}
