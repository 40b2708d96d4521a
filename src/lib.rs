pub mod accumulate;
pub mod git_binary;
pub mod histogram;
pub mod large_items;
pub mod object_probe;
pub mod progress;
pub mod refs;
pub mod survey;
pub mod survey_stats;
pub mod walker;
