use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use data_encoding::HEXLOWER;

pub fn setup() {
    let results_dir_path = PathBuf::from_str("./target/results/").unwrap();

    if !results_dir_path.exists() {
        fs::create_dir_all(&results_dir_path).unwrap_or_else(|_|
            panic!("Failed to create results directory: {:?}", results_dir_path)
        );
    }
}

#[allow(dead_code)]
pub fn read_lines(path: &PathBuf) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

#[allow(dead_code)]
pub fn temp_file_name(dir: &str) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

#[allow(dead_code)]
pub fn temp_csv_name(dir: &str) -> PathBuf {
    let mut result = temp_file_name(dir);
    result.set_extension("csv");
    result
}

#[allow(dead_code)]
pub fn write_lines(path: &PathBuf, lines: &[String]) -> Result<(), anyhow::Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Header `id,name,value` followed by `rows` rows with shuffled ids.
#[allow(dead_code)]
pub fn shuffled_rows(rows: usize) -> Vec<String> {
    let mut result = Vec::with_capacity(rows + 1);
    result.push("id,name,value".to_string());
    for i in 0..rows {
        let id = (i * 7919) % rows;
        result.push(format!("{},item{},{}", id, id % 97, i));
    }
    result
}
