use serde::ser::{Serialize, SerializeMap, Serializer};

/// Number of base-16 size buckets: enough to cover the machine word range.
pub const HBIN_LEN: usize = std::mem::size_of::<usize>() * 2;

/// Number of base-4 buckets, finer-grained at the low end.
pub const QBIN_LEN: usize = std::mem::size_of::<usize>() * 4;

/// Number of commit parent-count buckets; the last one saturates.
pub const PBIN_LEN: usize = 17;

/// Map a magnitude to its base-16 bucket: bin `k` covers `[16^k, 16^(k+1))`,
/// with bin 0 also covering zero.
pub fn hbin(v: u64) -> usize {
    let mut v = v;
    for k in 0..HBIN_LEN {
        if v <= 0xf {
            return k;
        }
        v >>= 4;
    }
    0
}

/// Map a magnitude to its base-4 bucket: bin `k` covers `[4^k, 4^(k+1))`.
pub fn qbin(v: u64) -> usize {
    let mut v = v;
    for k in 0..QBIN_LEN {
        if v <= 0x3 {
            return k;
        }
        v >>= 2;
    }
    0
}

/// One histogram bucket: how many values landed here, and what they amounted
/// to in logical and on-disk bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Bin {
    pub count: u64,
    pub sum_size: u64,
    pub sum_disk_size: u64,
}

impl Bin {
    fn add(&mut self, size: u64, disk_size: u64) {
        self.count += 1;
        self.sum_size += size;
        self.sum_disk_size += disk_size;
    }
}

/// Base-16 histogram of object sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeHistogram {
    bins: [Bin; HBIN_LEN],
}

impl Default for SizeHistogram {
    fn default() -> Self {
        SizeHistogram {
            bins: [Bin::default(); HBIN_LEN],
        }
    }
}

impl SizeHistogram {
    pub fn record(&mut self, size: u64, disk_size: u64) {
        self.bins[hbin(size)].add(size, disk_size);
    }

    pub fn total_count(&self) -> u64 {
        self.bins.iter().map(|b| b.count).sum()
    }

    /// Buckets with their `H<k>` labels, zero buckets skipped.
    pub fn iter_nonzero(&self) -> impl Iterator<Item = (String, &Bin)> {
        self.bins
            .iter()
            .enumerate()
            .filter(|(_, b)| b.count > 0)
            .map(|(k, b)| (format!("H{k}"), b))
    }
}

impl Serialize for SizeHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (label, bin) in self.iter_nonzero() {
            map.serialize_entry(&label, bin)?;
        }
        map.end()
    }
}

/// Base-4 histogram keyed by tree entry count; each bucket still accumulates
/// the logical and on-disk sizes of the trees that landed in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryCountHistogram {
    bins: [Bin; QBIN_LEN],
}

impl Default for EntryCountHistogram {
    fn default() -> Self {
        EntryCountHistogram {
            bins: [Bin::default(); QBIN_LEN],
        }
    }
}

impl EntryCountHistogram {
    pub fn record(&mut self, nr_entries: u64, size: u64, disk_size: u64) {
        self.bins[qbin(nr_entries)].add(size, disk_size);
    }

    pub fn total_count(&self) -> u64 {
        self.bins.iter().map(|b| b.count).sum()
    }

    pub fn iter_nonzero(&self) -> impl Iterator<Item = (String, &Bin)> {
        self.bins
            .iter()
            .enumerate()
            .filter(|(_, b)| b.count > 0)
            .map(|(k, b)| (format!("Q{k:02}"), b))
    }
}

impl Serialize for EntryCountHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (label, bin) in self.iter_nonzero() {
            map.serialize_entry(&label, bin)?;
        }
        map.end()
    }
}

/// Plain counts of commits by parent multiplicity; `P16` collects everything
/// with 16 or more parents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentCountHistogram {
    bins: [u64; PBIN_LEN],
}

impl Default for ParentCountHistogram {
    fn default() -> Self {
        ParentCountHistogram {
            bins: [0; PBIN_LEN],
        }
    }
}

impl ParentCountHistogram {
    pub fn record(&mut self, nr_parents: usize) {
        self.bins[nr_parents.min(PBIN_LEN - 1)] += 1;
    }

    pub fn total_count(&self) -> u64 {
        self.bins.iter().sum()
    }

    pub fn iter_nonzero(&self) -> impl Iterator<Item = (String, u64)> + '_ {
        self.bins
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(|(k, &c)| (format!("P{k:02}"), c))
    }
}

impl Serialize for ParentCountHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (label, count) in self.iter_nonzero() {
            map.serialize_entry(&label, &count)?;
        }
        map.end()
    }
}
