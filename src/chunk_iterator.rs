use crate::error::CsvError;

/// Groups a stream of lines into chunks of at most `chunk_size` lines. Only the last chunk may be
/// shorter, and no chunk is empty.
pub struct ChunkIterator<I> {
    lines: I,
    chunk_size: usize,
    done: bool,
}

impl<I> ChunkIterator<I>
    where I: Iterator<Item=Result<String, anyhow::Error>> {
    pub(crate) fn new(lines: I, chunk_size: usize) -> Result<ChunkIterator<I>, anyhow::Error> {
        if chunk_size == 0 {
            return Err(CsvError::parameter("chunk size must be positive").into());
        }
        Ok(
            ChunkIterator {
                lines,
                chunk_size,
                done: false,
            }
        )
    }
}

impl<I> Iterator for ChunkIterator<I>
    where I: Iterator<Item=Result<String, anyhow::Error>> {
    type Item = Result<Vec<String>, anyhow::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut chunk = Vec::with_capacity(self.chunk_size);
        while chunk.len() < self.chunk_size {
            match self.lines.next() {
                Some(Ok(line)) => chunk.push(line),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }
        if chunk.is_empty() {
            None
        } else {
            Some(Ok(chunk))
        }
    }
}
