//! Specialized collection types

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable handle to a node stored in a scene arena
    pub struct NodeKey;
}

/// Handle-based map using slot map for stable node references
pub type NodeMap<T> = SlotMap<NodeKey, T>;
