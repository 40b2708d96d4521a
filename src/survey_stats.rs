use std::collections::BTreeMap;

use serde::Serialize;

use crate::histogram::{EntryCountHistogram, ParentCountHistogram, SizeHistogram};
use crate::large_items::LargeItemVec;
use crate::object_probe::{ObjectHeader, Whence};
use crate::survey::SurveyOptions;

/// Per-storage-location counts of present objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WhenceCounts {
    pub cached: u64,
    pub loose: u64,
    pub packed: u64,
    pub dbcached: u64,
}

impl WhenceCounts {
    pub fn bump(&mut self, whence: Whence) {
        match whence {
            Whence::Cached => self.cached += 1,
            Whence::Loose => self.loose += 1,
            Whence::Packed => self.packed += 1,
            Whence::DbCached => self.dbcached += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.cached + self.loose + self.packed + self.dbcached
    }
}

/// Counts and size sums shared by every object class.
///
/// `seen` counts every object the walker surfaced; `missing` the subset the
/// object store could not produce (expected under partial clone). Sizes and
/// the histogram cover present objects only, so `seen == missing +
/// count_by_whence.total()` holds throughout.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BaseStats {
    pub seen: u64,
    pub missing: u64,
    pub count_by_whence: WhenceCounts,
    pub sum_size: u64,
    pub sum_disk_size: u64,
    pub size_hbin: SizeHistogram,
}

impl BaseStats {
    pub fn record_present(&mut self, h: &ObjectHeader) {
        self.count_by_whence.bump(h.whence);
        self.sum_size += h.size;
        self.sum_disk_size += h.disk_size;
        self.size_hbin.record(h.size, h.disk_size);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitStats {
    #[serde(flatten)]
    pub base: BaseStats,
    pub parent_cnt_pbin: ParentCountHistogram,
    #[serde(skip_serializing_if = "LargeItemVec::is_disabled")]
    pub largest_by_parents: LargeItemVec,
    #[serde(skip_serializing_if = "LargeItemVec::is_disabled")]
    pub largest_by_size: LargeItemVec,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeStats {
    #[serde(flatten)]
    pub base: BaseStats,
    pub sum_entries: u64,
    pub entry_qbin: EntryCountHistogram,
    #[serde(skip_serializing_if = "LargeItemVec::is_disabled")]
    pub largest_by_entries: LargeItemVec,
    #[serde(skip_serializing_if = "LargeItemVec::is_disabled")]
    pub largest_by_size: LargeItemVec,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlobStats {
    #[serde(flatten)]
    pub base: BaseStats,
    #[serde(skip_serializing_if = "LargeItemVec::is_disabled")]
    pub largest_by_size: LargeItemVec,
}

/// Maximum and total refname length for one group of refs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NameLengths {
    pub max: u64,
    pub sum: u64,
}

impl NameLengths {
    pub fn record(&mut self, len: usize) {
        let len = len as u64;
        self.max = self.max.max(len);
        self.sum += len;
    }
}

/// What the ref enumeration found: counts by class, storage, and symref-ness,
/// plus per-class-prefix multiplicities and refname length totals split into
/// local and remote groups.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefStats {
    pub count: u64,
    pub branches: u64,
    pub tags: u64,
    pub annotated_tags: u64,
    pub remotes: u64,
    pub detached: u64,
    pub other: u64,
    pub symrefs: u64,
    pub loose: u64,
    pub packed: u64,
    pub class_prefixes: BTreeMap<String, u64>,
    pub local_name_lengths: NameLengths,
    pub remote_name_lengths: NameLengths,
}

/// The aggregate survey output: created once, filled in by the walk phases,
/// then frozen into the report.
#[derive(Debug, Clone, Serialize)]
pub struct SurveyStats {
    pub refs: RefStats,
    pub commits: CommitStats,
    pub trees: TreeStats,
    pub blobs: BlobStats,
}

impl SurveyStats {
    pub fn new(opts: &SurveyOptions) -> Self {
        SurveyStats {
            refs: RefStats::default(),
            commits: CommitStats {
                base: BaseStats::default(),
                parent_cnt_pbin: ParentCountHistogram::default(),
                largest_by_parents: LargeItemVec::new(opts.show_commit_parents),
                largest_by_size: LargeItemVec::new(opts.show_commit_sizes),
            },
            trees: TreeStats {
                base: BaseStats::default(),
                sum_entries: 0,
                entry_qbin: EntryCountHistogram::default(),
                largest_by_entries: LargeItemVec::for_trees(opts.show_tree_entries),
                largest_by_size: LargeItemVec::for_trees(opts.show_tree_sizes),
            },
            blobs: BlobStats {
                base: BaseStats::default(),
                largest_by_size: LargeItemVec::new(opts.show_blob_sizes),
            },
        }
    }

    /// All five large-item dimensions, in report order.
    pub fn large_item_vecs(&self) -> [&LargeItemVec; 5] {
        [
            &self.commits.largest_by_parents,
            &self.commits.largest_by_size,
            &self.trees.largest_by_entries,
            &self.trees.largest_by_size,
            &self.blobs.largest_by_size,
        ]
    }

    pub fn large_item_vecs_mut(&mut self) -> [&mut LargeItemVec; 5] {
        [
            &mut self.commits.largest_by_parents,
            &mut self.commits.largest_by_size,
            &mut self.trees.largest_by_entries,
            &mut self.trees.largest_by_size,
            &mut self.blobs.largest_by_size,
        ]
    }
}
