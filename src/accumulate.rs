use anyhow::Result;
use gix::object::Kind;

use crate::object_probe::ObjectProbe;
use crate::progress::Progress;
use crate::survey_stats::SurveyStats;
use crate::walker::{CommitVisit, ObjectClass, ObjectSink, ObjectVisit};

/// Folds walker callbacks into the statistics record, one probe per object.
///
/// Each OID lands in exactly one per-class base: the commit callback feeds
/// the commit stats, the generic callback feeds trees and blobs. Objects the
/// probe cannot produce (or whose stored type contradicts the walk) count
/// only toward `seen` and `missing`; sizes, histograms, and the large-item
/// dimensions see present objects exclusively.
pub struct StatsAccumulator<'a, 'r> {
    stats: &'a mut SurveyStats,
    probe: &'a mut ObjectProbe<'r>,
    progress: &'a mut Progress,
}

impl<'a, 'r> StatsAccumulator<'a, 'r> {
    pub fn new(
        stats: &'a mut SurveyStats,
        probe: &'a mut ObjectProbe<'r>,
        progress: &'a mut Progress,
    ) -> Self {
        StatsAccumulator {
            stats,
            probe,
            progress,
        }
    }
}

impl ObjectSink for StatsAccumulator<'_, '_> {
    fn visit_commit(&mut self, commit: &CommitVisit) -> Result<()> {
        self.progress.inc(1);
        let stats = &mut self.stats.commits;
        stats.base.seen += 1;
        let header = match self.probe.header(&commit.oid) {
            Some(h) if h.kind == Kind::Commit => h,
            _ => {
                stats.base.missing += 1;
                return Ok(());
            }
        };
        stats.base.record_present(&header);
        stats.parent_cnt_pbin.record(commit.parent_count);
        stats
            .largest_by_parents
            .offer(commit.parent_count as u64, commit.oid, None, commit.oid);
        stats
            .largest_by_size
            .offer(header.size, commit.oid, None, commit.oid);
        Ok(())
    }

    fn visit_object(&mut self, object: &ObjectVisit<'_>) -> Result<()> {
        self.progress.inc(1);
        match object.class {
            ObjectClass::Tree => {
                let header = {
                    let stats = &mut self.stats.trees;
                    stats.base.seen += 1;
                    match self.probe.header(&object.oid) {
                        Some(h) if h.kind == Kind::Tree => h,
                        _ => {
                            stats.base.missing += 1;
                            return Ok(());
                        }
                    }
                };
                let nr_entries = self.probe.tree_entry_count(&object.oid).unwrap_or(0);
                let stats = &mut self.stats.trees;
                stats.base.record_present(&header);
                stats.sum_entries += nr_entries;
                stats
                    .entry_qbin
                    .record(nr_entries, header.size, header.disk_size);
                stats
                    .largest_by_entries
                    .offer(nr_entries, object.oid, object.path, object.commit);
                stats
                    .largest_by_size
                    .offer(header.size, object.oid, object.path, object.commit);
            }
            ObjectClass::Blob => {
                let stats = &mut self.stats.blobs;
                stats.base.seen += 1;
                let header = match self.probe.header(&object.oid) {
                    Some(h) if h.kind == Kind::Blob => h,
                    _ => {
                        stats.base.missing += 1;
                        return Ok(());
                    }
                };
                stats.base.record_present(&header);
                stats
                    .largest_by_size
                    .offer(header.size, object.oid, object.path, object.commit);
            }
        }
        Ok(())
    }
}
