use anyhow::{Context, Result};
use gix::hashtable::{HashMap, HashSet};
use gix::{ObjectId, Repository};
use tracing::{debug, debug_span, error, warn};

use crate::accumulate::StatsAccumulator;
use crate::git_binary::Git;
use crate::object_probe::ObjectProbe;
use crate::progress::Progress;
use crate::refs::{calc_ref_stats, discover_refs, RefSelection};
use crate::survey_stats::SurveyStats;
use crate::walker::ObjectWalk;

pub const DEFAULT_TOP_COUNT: usize = 10;

/// Everything that shapes one survey run. Defaults may be overridden first
/// by the repository's `survey.*` configuration, then by command-line flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyOptions {
    pub refs: RefSelection,
    pub show_commit_parents: usize,
    pub show_commit_sizes: usize,
    pub show_tree_entries: usize,
    pub show_tree_sizes: usize,
    pub show_blob_sizes: usize,
    /// Run the post-walk name-rev enrichment. On by default; expensive on
    /// repositories with very many refs.
    pub name_rev: bool,
    /// Extra detail in the tabular output.
    pub verbose: bool,
    /// Emit the structured report instead of tables.
    pub json: bool,
    /// Show a progress meter, if also attached to a terminal.
    pub progress: Option<bool>,
}

impl Default for SurveyOptions {
    fn default() -> Self {
        SurveyOptions {
            refs: RefSelection::default(),
            show_commit_parents: DEFAULT_TOP_COUNT,
            show_commit_sizes: DEFAULT_TOP_COUNT,
            show_tree_entries: DEFAULT_TOP_COUNT,
            show_tree_sizes: DEFAULT_TOP_COUNT,
            show_blob_sizes: DEFAULT_TOP_COUNT,
            name_rev: true,
            verbose: false,
            json: false,
            progress: None,
        }
    }
}

impl SurveyOptions {
    /// Apply the repository's `survey.*` configuration on top of the
    /// defaults. Unset keys leave the current value alone.
    pub fn overlay_repo_config(&mut self, repo: &Repository) {
        let config = repo.config_snapshot();
        if let Some(v) = config.boolean("survey.verbose") {
            self.verbose = v;
        }
        if let Some(v) = config.boolean("survey.progress") {
            self.progress = Some(v);
        }
        if let Some(v) = config.boolean("survey.json") {
            self.json = v;
        }
        if let Some(v) = config.boolean("survey.namerev") {
            self.name_rev = v;
        }
        let top_count = |key: &'static str, slot: &mut usize| {
            if let Some(v) = config.integer(key) {
                *slot = v.max(0) as usize;
            }
        };
        top_count("survey.showcommitparents", &mut self.show_commit_parents);
        top_count("survey.showcommitsizes", &mut self.show_commit_sizes);
        top_count("survey.showtreeentries", &mut self.show_tree_entries);
        top_count("survey.showtreesizes", &mut self.show_tree_sizes);
        top_count("survey.showblobsizes", &mut self.show_blob_sizes);
    }
}

/// Run the whole survey pipeline over an opened repository:
/// ref enumeration, the reachable-object walk, ref stats, and name-rev
/// enrichment, in that order. Ref enumeration failure is fatal; everything
/// after it degrades to a partial report.
pub fn run_survey(
    repo: &Repository,
    opts: &SurveyOptions,
    progress_enabled: bool,
) -> Result<SurveyStats> {
    let _span = debug_span!("survey", "{}", repo.git_dir().display()).entered();

    let mut stats = SurveyStats::new(opts);
    let wanted = opts.refs.resolve();

    debug!(phase = "load_refs", "enumerating refs");
    let refs = {
        let mut progress = Progress::new_counter_spinner("Enumerating refs...", progress_enabled);
        let refs = discover_refs(repo, &wanted, &mut progress)
            .context("Failed to enumerate repository refs")?;
        progress.finish_with_message(format!("Enumerated {} refs", refs.len()));
        refs
    };

    debug!(phase = "walk_objects", refs = refs.len(), "walking reachable objects");
    {
        let mut probe = ObjectProbe::new(repo);
        let mut progress = Progress::new_counter_spinner("Walking objects...", progress_enabled);
        let mut sink = StatsAccumulator::new(&mut stats, &mut probe, &mut progress);
        let seeds: Vec<ObjectId> = refs.iter().map(|r| r.walk_seed()).collect();
        if let Err(e) = ObjectWalk::new(repo).run(seeds, &mut sink) {
            error!("Object walk ended early, reporting partial data: {e}");
        }
        progress.finish_with_message(format!(
            "Walked {} objects",
            stats.commits.base.seen + stats.trees.base.seen + stats.blobs.base.seen
        ));
    }

    debug!(phase = "calc_ref_stats", "folding ref stats");
    stats.refs = calc_ref_stats(&refs);
    drop(refs);

    if opts.name_rev {
        debug!(phase = "name_rev", "resolving commit names");
        enrich_name_revs(repo, &mut stats, progress_enabled);
    }

    debug!(phase = "report", "statistics complete");
    Ok(stats)
}

/// Give every large-item entry a human name for its containing commit.
/// One batched `git name-rev` run answers for the distinct commits across
/// all dimensions; any failure leaves the raw OIDs in place.
fn enrich_name_revs(repo: &Repository, stats: &mut SurveyStats, progress_enabled: bool) {
    let mut order: Vec<ObjectId> = Vec::new();
    let mut distinct = HashSet::default();
    for vec in stats.large_item_vecs() {
        for entry in vec.iter() {
            if !entry.commit.is_null() && distinct.insert(entry.commit) {
                order.push(entry.commit);
            }
        }
    }
    if order.is_empty() {
        return;
    }

    let total_entries: u64 = stats.large_item_vecs().iter().map(|v| v.len() as u64).sum();
    let mut progress = Progress::new_bar(total_entries, "Resolving commit names", progress_enabled);
    let names = match Git::new().name_revs(repo.git_dir(), &order) {
        Ok(names) => names,
        Err(e) => {
            progress.suspend(|| warn!("git name-rev failed, keeping raw OIDs: {e}"));
            return;
        }
    };
    if names.len() != order.len() {
        warn!(
            "git name-rev answered {} of {} names, keeping raw OIDs",
            names.len(),
            order.len()
        );
        return;
    }
    let by_commit: HashMap<ObjectId, String> = order.into_iter().zip(names).collect();
    for vec in stats.large_item_vecs_mut() {
        for entry in vec.iter_mut() {
            if let Some(name) = by_commit.get(&entry.commit) {
                entry.name_rev = Some(name.clone());
            }
            progress.inc(1);
        }
    }
    progress.finish();
}
