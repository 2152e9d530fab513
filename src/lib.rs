//! This crate sorts and merges delimited text files, such as CSV or TSV, that are too large to
//! fit in memory.
//!
//! Sorting is an external merge sort. The input is read in chunks of a bounded number of rows,
//! each chunk is sorted in memory and written to a temporary run, and runs are merged in groups
//! of a bounded number of open files, generation after generation, until a single sorted run
//! remains. Rows are compared by one column in natural order, where embedded numbers compare
//! numerically, so `item2` sorts before `item10`. A file can also be shuffled.
//!
//! Merging concatenates files whose columns differ. The merged file has the union of the
//! columns of all its parts and every row is aligned to it.
//!
//! Fields are split on a separator character. A double quote toggles masking of the separator
//! and quotes are kept in the values; there is no escaping and rows cannot span lines.
//!
//! # Examples
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use csv_sort_merge::merge::Merge;
//! use csv_sort_merge::sort::Sort;
//! use csv_sort_merge::sort_axis::SortAxis;
//!
//! // optimized for use with Jemalloc
//! use tikv_jemallocator::Jemalloc;
//! #[global_allocator]
//! static GLOBAL: Jemalloc = Jemalloc;
//!
//! fn sort_and_merge(parts: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
//!     // concatenate all csv files of a directory, in natural order of their names
//!     let mut merge = Merge::new(PathBuf::from("./target/output"))?;
//!     merge.stage(&[parts], ',', encoding_rs::UTF_8)?;
//!     let merged = merge.merge_staged_files(Path::new("merged.csv"), ',', encoding_rs::UTF_8, false, true)?;
//!
//!     let mut sort = Sort::new(merged, PathBuf::from("./target/output/sorted.csv"));
//!     sort.with_sort_axis(SortAxis::column("id"));
//!
//!     // set the directory for intermediate results. The default is the system temp dir -
//!     // std::env::temp_dir(), however, for large files it is recommended to provide a dedicated
//!     // directory for intermediate files, preferably on the same file system as the output result.
//!     sort.with_tmp_dir(tmp);
//!
//!     // merge independent groups of runs on 4 threads
//!     sort.with_tasks(4);
//!
//!     let summary = sort.sort_file()?;
//!     log::info!("sorted {} rows", summary.rows());
//!     Ok(())
//! }
//! ```
//!

pub(crate) mod config;
pub(crate) mod line_record;
pub(crate) mod sort_key;
pub(crate) mod chunk_iterator;
pub(crate) mod chunk_sorter;
pub(crate) mod run;
pub(crate) mod run_reader;
pub(crate) mod merger;
pub(crate) mod merge_command;
pub(crate) mod lines;

pub mod error;
pub mod row;
pub mod key;
pub mod sort_axis;
pub mod row_source;
pub mod sort;
pub mod header;
pub mod merge;
pub mod writer;
