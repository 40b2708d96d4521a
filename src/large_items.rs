use bstr::{BStr, BString, ByteVec};
use gix::ObjectId;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// One slot in a [`LargeItemVec`]: the item itself, the magnitude it was
/// ranked by, and the commit whose treewalk first surfaced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LargeItem {
    pub magnitude: u64,
    pub oid: ObjectId,
    pub name: Option<BString>,
    pub commit: ObjectId,
    pub name_rev: Option<String>,
}

impl Serialize for LargeItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("LargeItem", 5)?;
        s.serialize_field("magnitude", &self.magnitude)?;
        s.serialize_field("oid", &self.oid.to_string())?;
        match &self.name {
            Some(name) => s.serialize_field("name", &String::from_utf8_lossy(name))?,
            None => s.skip_field("name")?,
        }
        s.serialize_field("commit", &self.commit.to_string())?;
        match &self.name_rev {
            Some(name_rev) => s.serialize_field("name_rev", name_rev)?,
            None => s.skip_field("name_rev")?,
        }
        s.end()
    }
}

/// A fixed-capacity set of the largest items seen so far, kept sorted by
/// descending magnitude.
///
/// Capacity is tiny (default 10), so this is a plain insertion-sorted vector
/// rather than a binary heap; the linear scan also gives the tie-break rule
/// that an earlier-offered item outranks a later one of equal magnitude.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LargeItemVec {
    capacity: usize,
    synthesize_tree_names: bool,
    entries: Vec<LargeItem>,
}

impl LargeItemVec {
    pub fn new(capacity: usize) -> Self {
        LargeItemVec {
            capacity,
            synthesize_tree_names: false,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Like [`LargeItemVec::new`], but unnamed entries get a synthesized
    /// `<commit>^{tree}` name, for dimensions that hold root trees.
    pub fn for_trees(capacity: usize) -> Self {
        LargeItemVec {
            capacity,
            synthesize_tree_names: true,
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.capacity == 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LargeItem> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, LargeItem> {
        self.entries.iter_mut()
    }

    /// Offer a candidate. It is inserted in rank order if it beats the
    /// current minimum (or there is room), evicting the last slot when full.
    pub fn offer(
        &mut self,
        magnitude: u64,
        oid: ObjectId,
        name: Option<&BStr>,
        commit: ObjectId,
    ) {
        if self.capacity == 0 {
            return;
        }
        let full = self.entries.len() == self.capacity;
        if full && magnitude <= self.entries[self.capacity - 1].magnitude {
            return;
        }
        let k = self
            .entries
            .iter()
            .position(|e| e.magnitude < magnitude)
            .unwrap_or(self.entries.len());

        // The evicted slot donates its name buffer to the incoming entry.
        let mut recycled = if full {
            self.entries.pop().and_then(|e| e.name)
        } else {
            None
        };
        let name = match name {
            Some(name) => {
                let mut buf = recycled.take().unwrap_or_default();
                buf.clear();
                buf.push_str(name);
                Some(buf)
            }
            None if self.synthesize_tree_names => {
                let mut buf = recycled.take().unwrap_or_default();
                buf.clear();
                buf.push_str(format!("{commit}^{{tree}}"));
                Some(buf)
            }
            None => None,
        };
        self.entries.insert(
            k,
            LargeItem {
                magnitude,
                oid,
                name,
                commit,
                name_rev: None,
            },
        );
    }
}

impl Serialize for LargeItemVec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}
