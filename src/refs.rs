use anyhow::{Context, Result};
use gix::{ObjectId, Repository};
use tracing::{debug, warn};

use crate::progress::Progress;
use crate::survey_stats::RefStats;

/// Classification of a surveyed ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
    Remote,
    DetachedHead,
    Other,
}

/// One enumerated ref, resolved and classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefRecord {
    pub refname: String,
    pub target: ObjectId,
    pub kind: RefKind,
    pub is_symbolic: bool,
    pub is_packed: bool,
    /// For annotated tags: the object the tag chain ultimately points at.
    pub peeled: Option<ObjectId>,
}

impl RefRecord {
    /// The OID to seed the object walk with.
    pub fn walk_seed(&self) -> ObjectId {
        self.peeled.unwrap_or(self.target)
    }
}

/// Which ref categories the user asked for. Each flag is tri-state: `None`
/// means unspecified, which matters for the default rule below.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefSelection {
    pub all: Option<bool>,
    pub branches: Option<bool>,
    pub tags: Option<bool>,
    pub remotes: Option<bool>,
    pub detached: Option<bool>,
    pub other: Option<bool>,
}

/// The resolved form of [`RefSelection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WantedRefs {
    pub branches: bool,
    pub tags: bool,
    pub remotes: bool,
    pub detached: bool,
    pub other: bool,
}

impl RefSelection {
    /// Resolve the tri-state flags: `all` wants everything; nothing specified
    /// falls back to the built-in default of branches, tags, and remotes;
    /// otherwise anything left unspecified is not wanted.
    pub fn resolve(&self) -> WantedRefs {
        if self.all.unwrap_or(false) {
            return WantedRefs {
                branches: true,
                tags: true,
                remotes: true,
                detached: true,
                other: true,
            };
        }
        let nothing_specified = self.branches.is_none()
            && self.tags.is_none()
            && self.remotes.is_none()
            && self.detached.is_none()
            && self.other.is_none();
        if nothing_specified {
            return WantedRefs {
                branches: true,
                tags: true,
                remotes: true,
                detached: false,
                other: false,
            };
        }
        WantedRefs {
            branches: self.branches.unwrap_or(false),
            tags: self.tags.unwrap_or(false),
            remotes: self.remotes.unwrap_or(false),
            detached: self.detached.unwrap_or(false),
            other: self.other.unwrap_or(false),
        }
    }
}

impl WantedRefs {
    fn wants(&self, kind: RefKind) -> bool {
        match kind {
            RefKind::Branch => self.branches,
            RefKind::Tag => self.tags,
            RefKind::Remote => self.remotes,
            RefKind::DetachedHead => self.detached,
            RefKind::Other => self.other,
        }
    }
}

/// Classify a ref by its full name. `HEAD` is handled separately by the
/// enumerator, which knows whether it is symbolic.
pub fn classify_refname(refname: &str) -> RefKind {
    if refname.starts_with("refs/heads/") {
        RefKind::Branch
    } else if refname.starts_with("refs/tags/") {
        RefKind::Tag
    } else if refname.starts_with("refs/remotes/") {
        RefKind::Remote
    } else {
        RefKind::Other
    }
}

/// The class prefix a ref aggregates under: three path components for
/// `refs/remotes/<remote>/` so each remote gets its own bucket, two for
/// everything else under `refs/`.
pub fn class_prefix(refname: &str) -> String {
    let components: Vec<&str> = refname.split('/').collect();
    let keep = if refname.starts_with("refs/remotes/") && components.len() > 3 {
        3
    } else if components.len() > 2 && components[0] == "refs" {
        2
    } else {
        return refname.to_string();
    };
    let mut prefix = components[..keep].join("/");
    prefix.push('/');
    prefix
}

/// Enumerate, resolve, classify, and sort the refs selected by `wanted`.
///
/// The result is ordered by target OID (ties by refname) so that every
/// downstream phase sees a reproducible sequence.
pub fn discover_refs(
    repo: &Repository,
    wanted: &WantedRefs,
    progress: &mut Progress,
) -> Result<Vec<RefRecord>> {
    let mut records = Vec::new();
    let mut scratch = Vec::with_capacity(4 * 1024);

    let platform = repo
        .references()
        .context("Failed to set up ref enumeration")?;
    let iter = platform.all().context("Failed to enumerate refs")?;
    for reference in iter {
        let reference = match reference {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to decode a reference: {e}");
                continue;
            }
        };
        let refname = reference.name().as_bstr().to_string();
        if refname == "HEAD" {
            continue;
        }
        let kind = classify_refname(&refname);
        if !wanted.wants(kind) {
            continue;
        }
        let is_symbolic = reference.try_id().is_none();
        let Some(target) = resolve_target(reference) else {
            debug!("Skipping unresolvable ref {refname}");
            continue;
        };
        let peeled = peel_tag_chain(repo, target, &mut scratch);
        records.push(RefRecord {
            is_packed: is_packed(repo, &refname),
            refname,
            target,
            kind,
            is_symbolic,
            peeled,
        });
        progress.inc(1);
    }

    if wanted.detached {
        if let Some(record) = head_record(repo, &mut scratch)? {
            records.push(record);
            progress.inc(1);
        }
    }

    records.sort_by(|a, b| {
        a.target
            .cmp(&b.target)
            .then_with(|| a.refname.cmp(&b.refname))
    });
    Ok(records)
}

/// Survey `HEAD` itself: a detached-head record when it points straight at
/// an object, a symbolic "other" record when it points at a branch. An
/// unborn `HEAD` yields nothing.
fn head_record(repo: &Repository, scratch: &mut Vec<u8>) -> Result<Option<RefRecord>> {
    let head_name = repo
        .head_name()
        .context("Failed to read HEAD")?;
    let target = match repo.head_id() {
        Ok(id) => id.detach(),
        Err(e) => {
            debug!("HEAD is unborn or unreadable, skipping: {e}");
            return Ok(None);
        }
    };
    let is_symbolic = head_name.is_some();
    let kind = if is_symbolic {
        RefKind::Other
    } else {
        RefKind::DetachedHead
    };
    let peeled = peel_tag_chain(repo, target, scratch);
    Ok(Some(RefRecord {
        refname: "HEAD".to_string(),
        target,
        kind,
        is_symbolic,
        is_packed: false,
        peeled,
    }))
}

/// Follow a (possibly symbolic) ref to the OID it resolves to.
fn resolve_target(reference: gix::Reference<'_>) -> Option<ObjectId> {
    let mut reference = reference;
    for _ in 0..16 {
        if let Some(id) = reference.try_id() {
            return Some(id.detach());
        }
        match reference.follow() {
            Some(Ok(next)) => reference = next,
            Some(Err(e)) => {
                debug!("Broken symbolic ref {}: {e}", reference.name().as_bstr());
                return None;
            }
            None => return None,
        }
    }
    None
}

/// If `target` is an annotated tag, follow the tag chain to the underlying
/// object. Returns `None` for anything that is not a tag object.
fn peel_tag_chain(repo: &Repository, target: ObjectId, scratch: &mut Vec<u8>) -> Option<ObjectId> {
    use gix::prelude::*;

    let mut oid = target;
    let mut peeled = None;
    for _ in 0..16 {
        match repo.objects.try_header(&oid) {
            Ok(Some(hdr)) if hdr.kind() == gix::object::Kind::Tag => {
                match repo.objects.find_tag(&oid, scratch) {
                    Ok(tag) => {
                        oid = tag.target();
                        peeled = Some(oid);
                    }
                    Err(e) => {
                        warn!("Failed to read tag object {oid}: {e}");
                        return peeled;
                    }
                }
            }
            _ => return peeled,
        }
    }
    peeled
}

/// A ref is packed when no loose file shadows it in the ref store.
fn is_packed(repo: &Repository, refname: &str) -> bool {
    !repo.git_dir().join(refname).is_file()
}

/// Fold the consumed ref array into the ref section of the report.
pub fn calc_ref_stats(records: &[RefRecord]) -> RefStats {
    let mut stats = RefStats::default();
    for record in records {
        stats.count += 1;
        match record.kind {
            RefKind::Branch => stats.branches += 1,
            RefKind::Tag => {
                stats.tags += 1;
                if record.peeled.is_some() {
                    stats.annotated_tags += 1;
                }
            }
            RefKind::Remote => stats.remotes += 1,
            RefKind::DetachedHead => stats.detached += 1,
            RefKind::Other => stats.other += 1,
        }
        if record.is_symbolic {
            stats.symrefs += 1;
        }
        if record.is_packed {
            stats.packed += 1;
        } else {
            stats.loose += 1;
        }
        *stats
            .class_prefixes
            .entry(class_prefix(&record.refname))
            .or_insert(0) += 1;
        if record.kind == RefKind::Remote {
            stats.remote_name_lengths.record(record.refname.len());
        } else {
            stats.local_name_lengths.record(record.refname.len());
        }
    }
    stats
}
