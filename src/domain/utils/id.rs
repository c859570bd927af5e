use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Identifier of a world (dimension) of the host simulation.
pub type WorldId = uuid::Uuid;

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T> {
    pub id: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(id: impl Into<String>) -> Self {
        Id { id: id.into(), _marker: PhantomData }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> From<Id<T>> for String {
    fn from(id_wrapper: Id<T>) -> Self {
        id_wrapper.id
    }
}

impl<T> From<&str> for Id<T> {
    fn from(id: &str) -> Self {
        Id::new(id)
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full_name = std::any::type_name::<T>();
        let clean_name = full_name.split("::").last().unwrap_or(full_name);
        let display_name = clean_name.replace("Tag", "Id");

        write!(f, "{}: {:?}", display_name, self.id)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct NodeTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct TrainTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct RouteTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct TicketTag;

pub type NodeId = Id<NodeTag>;
pub type TrainId = Id<TrainTag>;
pub type RouteId = Id<RouteTag>;
pub type TicketId = Id<TicketTag>;

/// Undirected track segment identifier.
///
/// The endpoints are stored in sorted order, so `EdgeId::new(a, b) == EdgeId::new(b, a)`
/// and both hash identically.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Serialize, Deserialize)]
pub struct EdgeId {
    low: NodeId,
    high: NodeId,
}

impl EdgeId {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b { EdgeId { low: a, high: b } } else { EdgeId { low: b, high: a } }
    }

    pub fn touches(&self, node: &NodeId) -> bool {
        &self.low == node || &self.high == node
    }

    /// Returns the endpoint opposite to `node`, or `None` if `node` is not an endpoint.
    pub fn other(&self, node: &NodeId) -> Option<&NodeId> {
        if &self.low == node {
            Some(&self.high)
        } else if &self.high == node {
            Some(&self.low)
        } else {
            None
        }
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.low, self.high)
    }
}

impl fmt::Debug for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeId: \"{}\"", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_id_is_symmetric() {
        let ab = EdgeId::new(NodeId::new("op:a"), NodeId::new("op:b"));
        let ba = EdgeId::new(NodeId::new("op:b"), NodeId::new("op:a"));

        assert_eq!(ab, ba);
        assert_eq!(ab.to_string(), "op:a<->op:b");
        assert_eq!(ab.other(&NodeId::new("op:b")), Some(&NodeId::new("op:a")));
        assert_eq!(ab.other(&NodeId::new("op:c")), None);
    }
}
