use std::path::PathBuf;

use encoding_rs::Encoding;

#[derive(Clone)]
pub(crate) struct Config {
    tmp: PathBuf,
    tmp_prefix: String,
    tasks: usize,
    queue_size: usize,
    field_separator: char,
    encoding: &'static Encoding,
    has_header: bool,
    chunk_size: usize,
    max_open: usize,
    seed: Option<u64>,
}

impl Config {
    pub(crate) fn new(
        tmp: PathBuf,
        tmp_prefix: String,
        tasks: usize,
        field_separator: char,
        encoding: &'static Encoding,
        has_header: bool,
        chunk_size: usize,
        max_open: usize,
        seed: Option<u64>,
    ) -> Config {
        let queue_size = 4096;
        Config {
            tmp,
            tmp_prefix,
            tasks,
            queue_size,
            field_separator,
            encoding,
            has_header,
            chunk_size,
            max_open,
            seed,
        }
    }

    pub(crate) fn tmp(&self) -> &PathBuf {
        &self.tmp
    }

    pub(crate) fn tmp_prefix(&self) -> &String {
        &self.tmp_prefix
    }

    pub(crate) fn tasks(&self) -> usize {
        self.tasks
    }

    pub(crate) fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub(crate) fn field_separator(&self) -> char {
        self.field_separator
    }

    pub(crate) fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub(crate) fn has_header(&self) -> bool {
        self.has_header
    }

    pub(crate) fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub(crate) fn max_open(&self) -> usize {
        self.max_open
    }

    pub(crate) fn seed(&self) -> Option<u64> {
        self.seed
    }
}
