//! End-to-end surveys over scratch repositories built with the `git` binary.
//!
//! Every test skips itself when `git` is not on the PATH.

mod common;
use common::*;

use pretty_assertions::assert_eq;
use predicates::prelude::*;

/// `seen == missing + sum(count_by_whence)` and the size histogram covers
/// exactly the present objects, for one object class section.
fn assert_class_invariants(class: &serde_json::Value) {
    let seen = class["seen"].as_u64().expect("seen should be a number");
    let missing = class["missing"].as_u64().expect("missing should be a number");
    let whence = &class["count_by_whence"];
    let whence_total: u64 = ["cached", "loose", "packed", "dbcached"]
        .iter()
        .map(|k| whence[k].as_u64().expect("whence count should be a number"))
        .sum();
    assert_eq!(seen, missing + whence_total);

    let hist_total: u64 = class["size_hbin"]
        .as_object()
        .expect("size_hbin should be a map")
        .values()
        .map(|bin| bin["count"].as_u64().expect("bin count should be a number"))
        .sum();
    assert_eq!(hist_total, seen - missing);
}

#[test]
fn empty_repository_reports_all_zero() {
    let Some(repo) = RepoFixture::new() else { return };
    let v = repo.survey_json(&[]);
    assert_eq!(v["refs"]["count"], 0);
    assert_eq!(v["commits"]["seen"], 0);
    assert_eq!(v["trees"]["seen"], 0);
    assert_eq!(v["blobs"]["seen"], 0);
    // sections are present even when empty
    assert!(v["commits"]["largest_by_size"].is_array());
    assert!(v["refs"]["class_prefixes"].is_object());
}

#[test]
fn single_empty_commit_counts_the_commit_and_its_empty_tree() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.commit("root");
    let v = repo.survey_json(&[]);
    assert_eq!(v["refs"]["count"], 1);
    assert_eq!(v["refs"]["branches"], 1);
    assert_eq!(v["commits"]["seen"], 1);
    assert_eq!(v["trees"]["seen"], 1);
    assert_eq!(v["blobs"]["seen"], 0);
    assert_eq!(v["commits"]["parent_cnt_pbin"]["P00"], 1);
}

#[test]
fn linear_chain_distributes_parent_counts() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.commit("one");
    repo.commit("two");
    repo.commit("three");
    let v = repo.survey_json(&[]);
    assert_eq!(v["commits"]["seen"], 3);
    assert_eq!(v["commits"]["parent_cnt_pbin"]["P00"], 1);
    assert_eq!(v["commits"]["parent_cnt_pbin"]["P01"], 2);
    // three identical empty trees dedupe to one
    assert_eq!(v["trees"]["seen"], 1);
}

#[test]
fn octopus_merge_lands_in_the_matching_parent_bucket() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.commit("base");
    let main = repo.current_branch();
    for i in 1..=4 {
        repo.git(&["checkout", "-q", "-b", &format!("b{i}"), &main]);
        repo.write_file(&format!("f{i}.txt"), format!("side {i}\n").as_bytes());
        repo.commit(&format!("side {i}"));
    }
    repo.git(&["checkout", "-q", &main]);
    repo.git(&["merge", "-q", "-m", "octopus", "b1", "b2", "b3", "b4"]);

    let v = repo.survey_json(&[]);
    assert_eq!(v["commits"]["seen"], 6);
    assert_eq!(v["commits"]["parent_cnt_pbin"]["P00"], 1);
    assert_eq!(v["commits"]["parent_cnt_pbin"]["P01"], 4);
    assert_eq!(v["commits"]["parent_cnt_pbin"]["P05"], 1);
    assert_eq!(v["refs"]["branches"], 5);

    for class in ["commits", "trees", "blobs"] {
        assert_class_invariants(&v[class]);
    }
}

#[test]
fn largest_blob_carries_its_oid_and_introducing_commit() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.write_file("big.bin", &vec![0x42u8; 4096]);
    repo.write_file("small.txt", b"tiny\n");
    repo.commit("add files");

    let v = repo.survey_json(&["--blob-sizes", "3"]);
    let entries = v["blobs"]["largest_by_size"]
        .as_array()
        .expect("largest_by_size should be an array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["magnitude"], 4096);
    assert_eq!(entries[0]["oid"], repo.rev_parse("HEAD:big.bin").as_str());
    assert_eq!(entries[0]["commit"], repo.rev_parse("HEAD").as_str());
    assert_eq!(entries[0]["name"], "big.bin");
    assert_eq!(entries[1]["magnitude"], 5);
}

#[test]
fn capacity_zero_removes_the_dimension_from_the_report() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.write_file("a.txt", b"contents\n");
    repo.commit("add file");
    let v = repo.survey_json(&["--blob-sizes", "0"]);
    assert!(v["blobs"].get("largest_by_size").is_none());
    assert!(v["commits"].get("largest_by_size").is_some());
}

#[test]
fn annotated_tag_is_peeled_and_seeds_the_walk() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.commit("root");
    repo.git(&["tag", "-a", "v1.0", "-m", "release"]);

    // survey only the tag: the commit is reached through the peeled seed
    let v = repo.survey_json(&["--tags"]);
    assert_eq!(v["refs"]["count"], 1);
    assert_eq!(v["refs"]["tags"], 1);
    assert_eq!(v["refs"]["annotated_tags"], 1);
    assert_eq!(v["refs"]["branches"], 0);
    assert_eq!(v["commits"]["seen"], 1);
}

#[test]
fn lightweight_tag_is_not_annotated() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.commit("root");
    repo.git(&["tag", "v1.0-light"]);
    let v = repo.survey_json(&["--tags"]);
    assert_eq!(v["refs"]["tags"], 1);
    assert_eq!(v["refs"]["annotated_tags"], 0);
}

#[test]
fn symbolic_head_counts_as_a_symref_not_a_detached_head() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.commit("root");
    let v = repo.survey_json(&["--all-refs"]);
    assert_eq!(v["refs"]["count"], 2);
    assert_eq!(v["refs"]["symrefs"], 1);
    assert_eq!(v["refs"]["branches"], 1);
    assert_eq!(v["refs"]["detached"], 0);
}

#[test]
fn detached_head_is_classified_as_detached() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.commit("root");
    let head = repo.rev_parse("HEAD");
    repo.git(&["checkout", "-q", &head]);
    let v = repo.survey_json(&["--all-refs"]);
    assert_eq!(v["refs"]["detached"], 1);
    assert_eq!(v["refs"]["symrefs"], 0);
}

#[test]
fn positive_selection_disables_unselected_categories() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.commit("root");
    repo.git(&["tag", "-a", "v1.0", "-m", "release"]);
    let v = repo.survey_json(&["--branches"]);
    assert_eq!(v["refs"]["branches"], 1);
    assert_eq!(v["refs"]["tags"], 0);
}

#[test]
fn packed_refs_are_counted_as_packed() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.commit("root");
    repo.git(&["pack-refs", "--all"]);
    let v = repo.survey_json(&[]);
    assert_eq!(v["refs"]["count"], 1);
    assert_eq!(v["refs"]["packed"], 1);
    assert_eq!(v["refs"]["loose"], 0);
}

#[test]
fn class_prefixes_aggregate_per_namespace() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.commit("root");
    repo.git(&["branch", "dev"]);
    repo.git(&["tag", "v1.0"]);
    let v = repo.survey_json(&[]);
    assert_eq!(v["refs"]["class_prefixes"]["refs/heads/"], 2);
    assert_eq!(v["refs"]["class_prefixes"]["refs/tags/"], 1);
}

#[test]
fn structured_output_is_idempotent() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.write_file("a.txt", b"alpha\n");
    repo.commit("one");
    repo.write_file("b.txt", b"beta\n");
    repo.commit("two");
    repo.git(&["tag", "-a", "v1.0", "-m", "release"]);

    let first = repo.survey_raw(&["--json"]);
    let second = repo.survey_raw(&["--json"]);
    assert_eq!(first, second);
}

#[test]
fn human_report_has_the_fixed_sections() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.write_file("a.txt", b"alpha\n");
    repo.commit("one");

    surveyor!(repo.path(), "--progress=never")
        .assert()
        .success()
        .stdout(predicate::str::contains("OVERVIEW"))
        .stdout(predicate::str::contains("REFS"))
        .stdout(predicate::str::contains("COMMITS"))
        .stdout(predicate::str::contains("TREES"))
        .stdout(predicate::str::contains("BLOBS"));
}

#[test]
fn verbose_human_report_includes_histograms() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.write_file("a.txt", b"alpha\n");
    repo.commit("one");

    surveyor!(repo.path(), "--progress=never", "-v")
        .assert()
        .success()
        .stdout(predicate::str::contains("Commit parents"));
}

#[test]
fn tree_entry_counts_roll_up() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.write_file("src/a.rs", b"fn a() {}\n");
    repo.write_file("src/b.rs", b"fn b() {}\n");
    repo.write_file("README.md", b"# hello\n");
    repo.commit("layout");

    let v = repo.survey_json(&[]);
    // root tree (README.md + src) and the src tree
    assert_eq!(v["trees"]["seen"], 2);
    assert_eq!(v["trees"]["sum_entries"], 4);
    assert_eq!(v["blobs"]["seen"], 3);

    let by_entries = v["trees"]["largest_by_entries"]
        .as_array()
        .expect("largest_by_entries should be an array");
    assert_eq!(by_entries.len(), 2);
    assert_eq!(by_entries[0]["magnitude"], 2);
    // the root tree has no path; its name is synthesized from the commit
    let head = repo.rev_parse("HEAD");
    let names: Vec<String> = by_entries
        .iter()
        .map(|e| e["name"].as_str().unwrap_or_default().to_string())
        .collect();
    assert!(names.contains(&format!("{head}^{{tree}}")));
    assert!(names.contains(&"src".to_string()));
}

#[test]
fn missing_blob_is_counted_not_fatal() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.write_file("a.txt", b"some file contents\n");
    repo.commit("add file");
    let blob = repo.rev_parse("HEAD:a.txt");
    repo.remove_loose_object(&blob);

    let v = repo.survey_json(&[]);
    assert_eq!(v["blobs"]["seen"], 1);
    assert_eq!(v["blobs"]["missing"], 1);
    // missing objects contribute to no size sums, histograms, or large items
    assert_eq!(v["blobs"]["sum_size"], 0);
    assert!(v["blobs"]["size_hbin"]
        .as_object()
        .expect("size_hbin should be a map")
        .is_empty());
    assert_eq!(
        v["blobs"]["largest_by_size"]
            .as_array()
            .expect("largest_by_size should be an array")
            .len(),
        0
    );
    assert_class_invariants(&v["blobs"]);
}

#[test]
fn missing_trees_leave_commit_stats_populated() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.write_file("a.txt", b"some file contents\n");
    repo.commit("add file");
    let tree = repo.rev_parse("HEAD^{tree}");
    repo.remove_loose_object(&tree);

    let v = repo.survey_json(&[]);
    assert_eq!(v["commits"]["seen"], 1);
    assert_eq!(v["commits"]["missing"], 0);
    assert_eq!(v["trees"]["seen"], 1);
    assert_eq!(v["trees"]["missing"], 1);
    // with the tree unreadable, no blob is ever surfaced
    assert_eq!(v["blobs"]["seen"], 0);
    for class in ["commits", "trees", "blobs"] {
        assert_class_invariants(&v[class]);
    }
}

#[test]
fn ref_to_a_non_commit_counts_as_a_missing_commit() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.write_file("a.txt", b"some file contents\n");
    repo.commit("add file");
    let blob = repo.rev_parse("HEAD:a.txt");
    repo.git(&["tag", "blob-tag", &blob]);

    let v = repo.survey_json(&["--tags"]);
    assert_eq!(v["refs"]["tags"], 1);
    assert_eq!(v["commits"]["seen"], 1);
    assert_eq!(v["commits"]["missing"], 1);
    // the type-mismatched seed never reaches the parent histogram
    assert!(v["commits"]["parent_cnt_pbin"]
        .as_object()
        .expect("parent_cnt_pbin should be a map")
        .is_empty());
    assert_class_invariants(&v["commits"]);
}

#[test]
fn name_rev_enrichment_labels_large_items_with_ref_names() {
    let Some(repo) = RepoFixture::new() else { return };
    repo.write_file("a.txt", b"some file contents\n");
    repo.commit("add file");
    let branch = repo.current_branch();

    // name-rev enrichment is on by default; the only commit sits at the
    // branch tip, so its resolved name is exactly the branch name
    let v = repo.survey_json(&[]);
    assert_eq!(v["blobs"]["largest_by_size"][0]["name_rev"], branch.as_str());
    assert_eq!(
        v["commits"]["largest_by_size"][0]["name_rev"],
        branch.as_str()
    );
}

#[test]
fn nonexistent_repository_fails_with_a_diagnostic() {
    surveyor!("/definitely/not/a/repository")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open repository"));
}
