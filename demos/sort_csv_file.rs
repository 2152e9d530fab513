use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Error;
use simple_logger::SimpleLogger;

use csv_sort_merge::merge::Merge;
use csv_sort_merge::sort::Sort;
use csv_sort_merge::sort_axis::SortAxis;

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn create_input(path: &Path, columns: &str, rows: usize, offset: usize) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{}", columns)?;
    for i in 0..rows {
        let id = (i * 7919) % rows + offset;
        writeln!(writer, "{},item{},{}", id, id % 13, i)?;
    }
    writer.flush()?;
    Ok(())
}

fn shuffle(input_path: &Path, output_path: &Path) -> Result<(), Error> {
    // random is the default sort axis
    let mut csv_file = Sort::new(input_path.to_path_buf(), output_path.to_path_buf());
    csv_file.with_seed(42);
    csv_file.sort_file()?;
    Ok(())
}

fn sort_by_name(input_path: &Path, output_path: &Path) -> Result<(), Error> {
    let mut csv_file = Sort::new(input_path.to_path_buf(), output_path.to_path_buf());
    csv_file.with_sort_axis(SortAxis::column("name"));
    csv_file.with_chunk_size(1000);
    csv_file.with_max_open(4);
    let summary = csv_file.sort_file()?;
    log::info!("Sorted {} rows, runs per generation: {:?}", summary.rows(), summary.runs_per_generation());
    Ok(())
}

fn merge(parts: &[PathBuf], output_folder: &Path) -> Result<PathBuf, Error> {
    let mut merge = Merge::new(output_folder.to_path_buf())?;
    merge.stage(parts, ',', encoding_rs::UTF_8)?;
    log::info!("Union header: {:?}", merge.union_header()?);
    merge.merge_staged_files(Path::new("merged.csv"), ',', encoding_rs::UTF_8, false, true)?
        .canonicalize()
        .map_err(Error::from)
}

// cargo run -r --example sort_csv_file
pub fn main() -> Result<(), Error> {
    SimpleLogger::new().init()?;

    let part_1 = PathBuf::from("./target/demo-part-1.csv");
    let part_2 = PathBuf::from("./target/demo-part-2.csv");
    let random_path = PathBuf::from("./target/demo-random.csv");
    let sorted_path = PathBuf::from("./target/demo-sorted.csv");

    create_input(&part_1, "id,name,value", 10_000, 0)?;
    create_input(&part_2, "id,name,value", 5_000, 10_000)?;
    let merged = merge(&[part_1, part_2], Path::new("./target/demo"))?;
    shuffle(&merged, &random_path)?;
    sort_by_name(&random_path, &sorted_path)?;

    Ok(())
}
