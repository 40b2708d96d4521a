use std::collections::VecDeque;

use anyhow::Result;
use bstr::{BStr, BString, ByteVec};
use gix::hashtable::HashSet;
use gix::{ObjectId, Repository};
use tracing::{debug, warn};

/// A commit surfaced by the walk.
#[derive(Debug, Clone, Copy)]
pub struct CommitVisit {
    pub oid: ObjectId,
    pub parent_count: usize,
}

/// The class of a non-commit object surfaced by the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectClass {
    Tree,
    Blob,
}

/// A tree or blob surfaced by the walk. `path` is the path the object was
/// first reached under, absent for root trees; `commit` is the commit whose
/// treewalk discovered it.
#[derive(Debug, Clone, Copy)]
pub struct ObjectVisit<'a> {
    pub oid: ObjectId,
    pub class: ObjectClass,
    pub path: Option<&'a BStr>,
    pub commit: ObjectId,
}

/// Receives walk callbacks: one per commit, one per non-commit object.
pub trait ObjectSink {
    fn visit_commit(&mut self, commit: &CommitVisit) -> Result<()>;
    fn visit_object(&mut self, object: &ObjectVisit<'_>) -> Result<()>;
}

enum EntryClass {
    Subtree,
    Leaf,
}

/// Walks every object reachable from a seed set of commits, visiting each
/// OID at most once across the entire walk.
///
/// Commits are traversed breadth-first from the seeds. Immediately after a
/// commit is reported, its root tree is walked depth-first, so all trees and
/// blobs a commit introduces are reported within that commit's frame and
/// attributed to it. Unreadable commits and trees are still reported (the
/// metadata probe downstream counts them missing) but not descended into.
pub struct ObjectWalk<'r> {
    repo: &'r Repository,
    seen: HashSet<ObjectId>,
    queue: VecDeque<ObjectId>,
    scratch: Vec<u8>,
}

impl<'r> ObjectWalk<'r> {
    pub fn new(repo: &'r Repository) -> Self {
        ObjectWalk {
            repo,
            seen: HashSet::default(),
            queue: VecDeque::new(),
            scratch: Vec::with_capacity(1024 * 1024),
        }
    }

    pub fn run(
        mut self,
        seeds: impl IntoIterator<Item = ObjectId>,
        sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        for seed in seeds {
            if !seed.is_null() {
                self.queue.push_back(seed);
            }
        }
        while let Some(oid) = self.queue.pop_front() {
            if !self.seen.insert(oid) {
                continue;
            }
            self.visit_commit(oid, sink)?;
        }
        Ok(())
    }

    fn visit_commit(&mut self, oid: ObjectId, sink: &mut dyn ObjectSink) -> Result<()> {
        use gix::prelude::*;

        let (parents, tree) = match self.repo.objects.find_commit(&oid, &mut self.scratch) {
            Ok(commit) => {
                let parents: Vec<ObjectId> = commit.parents().collect();
                (parents, Some(commit.tree()))
            }
            Err(e) => {
                debug!("Cannot read commit {oid}, not descending: {e}");
                (Vec::new(), None)
            }
        };
        sink.visit_commit(&CommitVisit {
            oid,
            parent_count: parents.len(),
        })?;
        if let Some(tree_oid) = tree {
            if self.seen.insert(tree_oid) {
                sink.visit_object(&ObjectVisit {
                    oid: tree_oid,
                    class: ObjectClass::Tree,
                    path: None,
                    commit: oid,
                })?;
                self.walk_tree(tree_oid, BStr::new(""), oid, sink)?;
            }
        }
        for parent in parents {
            if !self.seen.contains(&parent) {
                self.queue.push_back(parent);
            }
        }
        Ok(())
    }

    fn walk_tree(
        &mut self,
        oid: ObjectId,
        prefix: &BStr,
        commit: ObjectId,
        sink: &mut dyn ObjectSink,
    ) -> Result<()> {
        use gix::prelude::*;

        let entries: Vec<(EntryClass, BString, ObjectId)> =
            match self.repo.objects.find_tree_iter(&oid, &mut self.scratch) {
                Ok(iter) => iter
                    .filter_map(|entry| {
                        let entry = match entry {
                            Ok(entry) => entry,
                            Err(e) => {
                                warn!("Failed to decode entry in tree {oid}: {e}");
                                return None;
                            }
                        };
                        let class = if entry.mode.is_tree() {
                            EntryClass::Subtree
                        } else if entry.mode.is_blob_or_symlink() {
                            EntryClass::Leaf
                        } else {
                            // gitlink: points outside this repository
                            return None;
                        };
                        Some((class, entry.filename.to_owned(), entry.oid.to_owned()))
                    })
                    .collect(),
                Err(e) => {
                    debug!("Cannot read tree {oid}, not descending: {e}");
                    return Ok(());
                }
            };

        for (class, filename, child) in entries {
            if self.seen.contains(&child) {
                continue;
            }
            let path = join_path(prefix, filename.as_ref());
            self.seen.insert(child);
            match class {
                EntryClass::Subtree => {
                    sink.visit_object(&ObjectVisit {
                        oid: child,
                        class: ObjectClass::Tree,
                        path: Some(path.as_ref()),
                        commit,
                    })?;
                    self.walk_tree(child, path.as_ref(), commit, sink)?;
                }
                EntryClass::Leaf => {
                    sink.visit_object(&ObjectVisit {
                        oid: child,
                        class: ObjectClass::Blob,
                        path: Some(path.as_ref()),
                        commit,
                    })?;
                }
            }
        }
        Ok(())
    }
}

fn join_path(prefix: &BStr, name: &BStr) -> BString {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        let mut path = BString::from(prefix);
        path.push_byte(b'/');
        path.push_str(name);
        path
    }
}
