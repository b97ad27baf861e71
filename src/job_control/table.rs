use super::process::ProcessRecord;
use nix::unistd::Pid;
use slab::Slab;

/// Stable handle to a record in a [`ProcessTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordKey(usize);

/// Insertion-ordered collection of every launched process that has not been
/// garbage-collected yet.
///
/// Records live in a slab so keys stay valid across unrelated removals;
/// `order` keeps the launch order for enumeration.
#[derive(Debug, Default)]
pub struct ProcessTable {
    records: Slab<ProcessRecord>,
    order: Vec<usize>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ProcessRecord) -> RecordKey {
        debug_assert!(
            self.find_by_pid(record.pid()).is_none(),
            "pid {} is already tracked",
            record.pid()
        );
        let index = self.records.insert(record);
        self.order.push(index);
        RecordKey(index)
    }

    /// Removes a record. Only completed records may leave the table.
    pub fn remove(&mut self, key: RecordKey) -> Option<ProcessRecord> {
        let record = self.records.get(key.0)?;
        assert!(
            record.is_completed(),
            "removing live process {} from the table",
            record.pid()
        );
        self.order.retain(|&index| index != key.0);
        Some(self.records.remove(key.0))
    }

    pub fn get(&self, key: RecordKey) -> Option<&ProcessRecord> {
        self.records.get(key.0)
    }

    pub fn get_mut(&mut self, key: RecordKey) -> Option<&mut ProcessRecord> {
        self.records.get_mut(key.0)
    }

    pub fn find_by_pid(&self, pid: Pid) -> Option<RecordKey> {
        self.order
            .iter()
            .copied()
            .find(|&index| self.records[index].pid() == pid)
            .map(RecordKey)
    }

    /// Records in launch order. The iterator borrows the table, so it can
    /// be recreated at any time to restart the traversal.
    pub fn iter(&self) -> impl Iterator<Item = (RecordKey, &ProcessRecord)> + '_ {
        self.order
            .iter()
            .map(move |&index| (RecordKey(index), &self.records[index]))
    }

    /// Keys of the records launched into the given process group.
    pub fn group_members(&self, pgid: Pid) -> Vec<RecordKey> {
        self.iter()
            .filter(|(_, record)| record.pgid() == pgid)
            .map(|(key, _)| key)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drops every completed record whose status has already been handed
    /// to the user.
    pub fn remove_reported(&mut self) -> usize {
        let finished: Vec<RecordKey> = self
            .iter()
            .filter(|(_, record)| record.is_completed() && record.is_reported())
            .map(|(key, _)| key)
            .collect();
        for &key in &finished {
            self.remove(key);
        }
        finished.len()
    }
}
