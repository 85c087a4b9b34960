use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::error::SnapshotError;
use crate::record::{NodeId, NodeRecord};

/// Lookup from node id to its record within one snapshot.
///
/// Besides the record itself the index remembers the record's position in the
/// snapshot, which is what keeps the tree transform deterministic with respect
/// to input order.
#[derive(Debug)]
pub struct NodeIndex<'a> {
    records: &'a [NodeRecord],
    positions: HashMap<NodeId, usize>,
}

impl<'a> NodeIndex<'a> {
    /// Index a snapshot, rejecting it when two records share an id.
    pub fn build(records: &'a [NodeRecord]) -> Result<Self, SnapshotError> {
        let mut positions = HashMap::with_capacity(records.len());

        for (position, record) in records.iter().enumerate() {
            match positions.entry(record.id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(position);
                }
                Entry::Occupied(_) => {
                    return Err(SnapshotError::DuplicateId(record.id.clone()));
                }
            }
        }

        Ok(Self { records, positions })
    }

    pub fn get(&self, id: &NodeId) -> Option<&'a NodeRecord> {
        self.positions.get(id).map(|&position| &self.records[position])
    }

    /// Position of the record in the snapshot it was built from.
    pub fn position(&self, id: &NodeId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.positions.contains_key(id)
    }

    pub fn records(&self) -> &'a [NodeRecord] {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let records = vec![NodeRecord::new("a", "A"), NodeRecord::new("b", "B")];
        let index = NodeIndex::build(&records).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&"b".into()).map(|r| r.name.as_str()), Some("B"));
        assert_eq!(index.position(&"a".into()), Some(0));
        assert!(!index.contains(&"c".into()));
    }

    #[test]
    fn test_duplicate_id() {
        let records = vec![
            NodeRecord::new("x", "first"),
            NodeRecord::new("y", "other"),
            NodeRecord::new("x", "second"),
        ];

        let err = NodeIndex::build(&records).unwrap_err();
        assert_eq!(err, SnapshotError::DuplicateId("x".into()));
        assert_eq!(err.to_string(), "Duplicate node id 'x' in snapshot");
    }

    #[test]
    fn test_empty() {
        let index = NodeIndex::build(&[]).unwrap();
        assert!(index.is_empty());
    }
}
