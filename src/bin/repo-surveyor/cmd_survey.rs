use anyhow::{Context, Result};
use console::style;
use gix::ObjectId;
use indicatif::{HumanBytes, HumanCount};
use prettytable::{row, Table};
use tracing::debug;

use repo_surveyor::histogram::{EntryCountHistogram, ParentCountHistogram, SizeHistogram};
use repo_surveyor::large_items::LargeItemVec;
use repo_surveyor::survey::{run_survey, SurveyOptions};
use repo_surveyor::survey_stats::{BaseStats, SurveyStats};

use crate::args;
use crate::args::Reportable;

pub fn run(global_args: &args::GlobalArgs, args: &args::CommandLineArgs) -> Result<()> {
    let repo = gix::open_opts(&args.repository, gix::open::Options::isolated()).with_context(
        || format!("Failed to open repository at {}", args.repository.display()),
    )?;

    let mut opts = SurveyOptions::default();
    opts.overlay_repo_config(&repo);
    opts.refs = args.ref_args.to_selection();
    if let Some(n) = args.top_args.commit_parents {
        opts.show_commit_parents = n;
    }
    if let Some(n) = args.top_args.commit_sizes {
        opts.show_commit_sizes = n;
    }
    if let Some(n) = args.top_args.tree_entries {
        opts.show_tree_entries = n;
    }
    if let Some(n) = args.top_args.tree_sizes {
        opts.show_tree_sizes = n;
    }
    if let Some(n) = args.top_args.blob_sizes {
        opts.show_blob_sizes = n;
    }
    if args.top_args.name_rev {
        opts.name_rev = true;
    }
    if args.output_args.json {
        opts.json = true;
    }
    if global_args.verbose > 0 {
        opts.verbose = true;
    }
    debug!("Options: {opts:#?}");

    let progress_enabled = global_args.use_progress(opts.progress);
    let stats = run_survey(&repo, &opts, progress_enabled)?;

    let reporter = SurveyReporter {
        stats,
        verbose: opts.verbose,
    };
    reporter.report(opts.json, &args.output_args)
}

struct SurveyReporter {
    stats: SurveyStats,
    verbose: bool,
}

impl Reportable for SurveyReporter {
    fn human_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        let stats = &self.stats;

        section(&mut writer, "OVERVIEW")?;
        let total_size = stats.commits.base.sum_size
            + stats.trees.base.sum_size
            + stats.blobs.base.sum_size;
        let total_disk_size = stats.commits.base.sum_disk_size
            + stats.trees.base.sum_disk_size
            + stats.blobs.base.sum_disk_size;
        let mut table = new_table();
        table.add_row(row![l -> "Refs", r -> HumanCount(stats.refs.count)]);
        table.add_row(row![l -> "Commits", r -> HumanCount(stats.commits.base.seen)]);
        table.add_row(row![l -> "Trees", r -> HumanCount(stats.trees.base.seen)]);
        table.add_row(row![l -> "Blobs", r -> HumanCount(stats.blobs.base.seen)]);
        table.add_row(row![l -> "Logical size", r -> HumanBytes(total_size)]);
        table.add_row(row![l -> "On-disk size", r -> HumanBytes(total_disk_size)]);
        table.print(&mut writer)?;

        section(&mut writer, "REFS")?;
        let refs = &stats.refs;
        let mut table = new_table();
        table.set_titles(row![lb -> "Class", cb -> "Count"]);
        table.add_row(row![l -> "Branches", r -> HumanCount(refs.branches)]);
        table.add_row(row![l -> "Tags", r -> HumanCount(refs.tags)]);
        table.add_row(row![l -> "Tags (annotated)", r -> HumanCount(refs.annotated_tags)]);
        table.add_row(row![l -> "Remote refs", r -> HumanCount(refs.remotes)]);
        table.add_row(row![l -> "Detached HEAD", r -> HumanCount(refs.detached)]);
        table.add_row(row![l -> "Other", r -> HumanCount(refs.other)]);
        table.add_row(row![l -> "Symbolic refs", r -> HumanCount(refs.symrefs)]);
        table.add_row(row![l -> "Loose refs", r -> HumanCount(refs.loose)]);
        table.add_row(row![l -> "Packed refs", r -> HumanCount(refs.packed)]);
        table.print(&mut writer)?;

        if !refs.class_prefixes.is_empty() {
            writeln!(writer)?;
            let mut table = new_table();
            table.set_titles(row![lb -> "Prefix", cb -> "Count"]);
            for (prefix, count) in &refs.class_prefixes {
                table.add_row(row![l -> prefix, r -> HumanCount(*count)]);
            }
            table.print(&mut writer)?;
        }

        if self.verbose {
            writeln!(writer)?;
            let mut table = new_table();
            table.set_titles(row![lb -> "Refname lengths", cb -> "Max", cb -> "Sum"]);
            table.add_row(row![
                l -> "Local",
                r -> HumanCount(refs.local_name_lengths.max),
                r -> HumanCount(refs.local_name_lengths.sum)
            ]);
            table.add_row(row![
                l -> "Remote",
                r -> HumanCount(refs.remote_name_lengths.max),
                r -> HumanCount(refs.remote_name_lengths.sum)
            ]);
            table.print(&mut writer)?;
        }

        section(&mut writer, "COMMITS")?;
        base_table(&stats.commits.base).print(&mut writer)?;
        if self.verbose {
            size_histogram_table(&mut writer, "Commit sizes", &stats.commits.base.size_hbin)?;
            parent_histogram_table(&mut writer, &stats.commits.parent_cnt_pbin)?;
        }
        largest_section(
            &mut writer,
            "Largest commits by parent count",
            &stats.commits.largest_by_parents,
            "Parents",
            Unit::Count,
        )?;
        largest_section(
            &mut writer,
            "Largest commits by size",
            &stats.commits.largest_by_size,
            "Size",
            Unit::Bytes,
        )?;

        section(&mut writer, "TREES")?;
        let mut table = base_table(&stats.trees.base);
        table.add_row(row![l -> "Total entries", r -> HumanCount(stats.trees.sum_entries)]);
        table.print(&mut writer)?;
        if self.verbose {
            entry_histogram_table(&mut writer, &stats.trees.entry_qbin)?;
        }
        largest_section(
            &mut writer,
            "Largest trees by entry count",
            &stats.trees.largest_by_entries,
            "Entries",
            Unit::Count,
        )?;
        largest_section(
            &mut writer,
            "Largest trees by size",
            &stats.trees.largest_by_size,
            "Size",
            Unit::Bytes,
        )?;

        section(&mut writer, "BLOBS")?;
        base_table(&stats.blobs.base).print(&mut writer)?;
        if self.verbose {
            size_histogram_table(&mut writer, "Blob sizes", &stats.blobs.base.size_hbin)?;
        }
        largest_section(
            &mut writer,
            "Largest blobs by size",
            &stats.blobs.largest_by_size,
            "Size",
            Unit::Bytes,
        )?;

        writeln!(writer)?;
        Ok(())
    }

    fn json_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, &self.stats)?;
        writeln!(writer)?;
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Unit {
    Bytes,
    Count,
}

impl Unit {
    fn cell(&self, v: u64) -> String {
        match self {
            Unit::Bytes => HumanBytes(v).to_string(),
            Unit::Count => HumanCount(v).to_string(),
        }
    }
}

fn new_table() -> Table {
    use prettytable::format::{FormatBuilder, LinePosition, LineSeparator};

    let f = FormatBuilder::new()
        .column_separator(' ')
        .separators(&[LinePosition::Title], LineSeparator::new('─', '─', '─', '─'))
        .padding(1, 1)
        .build();
    let mut table = Table::new();
    table.set_format(f);
    table
}

fn section<W: std::io::Write>(writer: &mut W, title: &str) -> Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", style(title).bold())?;
    writeln!(writer)?;
    Ok(())
}

fn base_table(base: &BaseStats) -> Table {
    let mut table = new_table();
    table.add_row(row![l -> "Seen", r -> HumanCount(base.seen)]);
    table.add_row(row![l -> "Missing", r -> HumanCount(base.missing)]);
    table.add_row(row![l -> "Loose", r -> HumanCount(base.count_by_whence.loose)]);
    table.add_row(row![l -> "Packed", r -> HumanCount(base.count_by_whence.packed)]);
    if base.count_by_whence.cached > 0 {
        table.add_row(row![l -> "Cached", r -> HumanCount(base.count_by_whence.cached)]);
    }
    if base.count_by_whence.dbcached > 0 {
        table.add_row(row![l -> "DB-cached", r -> HumanCount(base.count_by_whence.dbcached)]);
    }
    table.add_row(row![l -> "Logical size", r -> HumanBytes(base.sum_size)]);
    table.add_row(row![l -> "On-disk size", r -> HumanBytes(base.sum_disk_size)]);
    table
}

fn size_histogram_table<W: std::io::Write>(
    writer: &mut W,
    title: &str,
    hist: &SizeHistogram,
) -> Result<()> {
    if hist.total_count() == 0 {
        return Ok(());
    }
    writeln!(writer)?;
    let mut table = new_table();
    table.set_titles(row![lb -> title, cb -> "Count", cb -> "Size", cb -> "Disk Size"]);
    for (label, bin) in hist.iter_nonzero() {
        table.add_row(row![
            l -> label,
            r -> HumanCount(bin.count),
            r -> HumanBytes(bin.sum_size),
            r -> HumanBytes(bin.sum_disk_size)
        ]);
    }
    table.print(writer)?;
    Ok(())
}

fn entry_histogram_table<W: std::io::Write>(
    writer: &mut W,
    hist: &EntryCountHistogram,
) -> Result<()> {
    if hist.total_count() == 0 {
        return Ok(());
    }
    writeln!(writer)?;
    let mut table = new_table();
    table.set_titles(row![lb -> "Tree entries", cb -> "Count", cb -> "Size", cb -> "Disk Size"]);
    for (label, bin) in hist.iter_nonzero() {
        table.add_row(row![
            l -> label,
            r -> HumanCount(bin.count),
            r -> HumanBytes(bin.sum_size),
            r -> HumanBytes(bin.sum_disk_size)
        ]);
    }
    table.print(writer)?;
    Ok(())
}

fn parent_histogram_table<W: std::io::Write>(
    writer: &mut W,
    hist: &ParentCountHistogram,
) -> Result<()> {
    if hist.total_count() == 0 {
        return Ok(());
    }
    writeln!(writer)?;
    let mut table = new_table();
    table.set_titles(row![lb -> "Commit parents", cb -> "Count"]);
    for (label, count) in hist.iter_nonzero() {
        table.add_row(row![l -> label, r -> HumanCount(count)]);
    }
    table.print(writer)?;
    Ok(())
}

fn largest_section<W: std::io::Write>(
    writer: &mut W,
    title: &str,
    items: &LargeItemVec,
    magnitude_label: &str,
    unit: Unit,
) -> Result<()> {
    if items.is_disabled() || items.is_empty() {
        return Ok(());
    }
    writeln!(writer)?;
    writeln!(writer, "{}", style(title).bold())?;
    let mut table = new_table();
    table.set_titles(row![cb -> magnitude_label, lb -> "Object", lb -> "Commit", lb -> "Name"]);
    for item in items.iter() {
        let commit = item
            .name_rev
            .clone()
            .unwrap_or_else(|| short_oid(&item.commit));
        let name = item
            .name
            .as_ref()
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();
        table.add_row(row![
            r -> unit.cell(item.magnitude),
            l -> short_oid(&item.oid),
            l -> commit,
            l -> name
        ]);
    }
    table.print(writer)?;
    Ok(())
}

fn short_oid(oid: &ObjectId) -> String {
    let hex = oid.to_string();
    hex[..hex.len().min(12)].to_string()
}
