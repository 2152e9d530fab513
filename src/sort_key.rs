use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::CsvError;
use crate::key::NaturalKey;
use crate::row::split_row;
use crate::sort_axis::SortAxis;

/// A [SortAxis] resolved against the header of the file being sorted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SortKey {
    /// Sort by the field at this position.
    Index {
        index: usize
    },
    /// Sort by a synthetic leading field holding a permutation value.
    Random,
}

impl SortKey {
    /// Resolve a column name to its position once, against the header fields.
    pub(crate) fn resolve(axis: &SortAxis, header: Option<&[String]>) -> Result<SortKey, anyhow::Error> {
        match axis {
            SortAxis::Column(name) => {
                let header = header.ok_or_else(|| {
                    CsvError::parameter("Cannot infer sorting column's position without a header")
                })?;
                let index = header.iter()
                    .position(|column| column == name)
                    .ok_or_else(|| CsvError::parameter(format!("Column '{}' not found in header", name)))?;
                Ok(SortKey::Index { index })
            }
            SortAxis::Index(index) => {
                Ok(SortKey::Index { index: *index })
            }
            SortAxis::Random => {
                Ok(SortKey::Random)
            }
        }
    }

    pub(crate) fn is_random(&self) -> bool {
        matches!(self, SortKey::Random)
    }

    /// Extract the natural order key of a line.
    pub(crate) fn extract(&self, line: &str, field_separator: char) -> Result<NaturalKey, anyhow::Error> {
        match self {
            SortKey::Index { index } => {
                let fields = split_row(line, field_separator);
                let field = fields.get(*index).ok_or_else(|| {
                    CsvError::format(
                        format!(
                            "Requested comparison for field {} but there are only {} fields using {} as field separator, line: {}",
                            index,
                            fields.len(),
                            field_separator,
                            line.trim_end(),
                        )
                    )
                })?;
                Ok(NaturalKey::new(field))
            }
            SortKey::Random => {
                let index = line.split(field_separator).next().unwrap_or_default();
                Ok(NaturalKey::new(index))
            }
        }
    }

    /// A random permutation of `0..rows`, one value per data row.
    pub(crate) fn permutation<R: Rng + ?Sized>(rows: usize, rng: &mut R) -> Vec<usize> {
        let mut permutation: Vec<usize> = (0..rows).collect();
        permutation.shuffle(rng);
        permutation
    }

    /// Prepend the synthetic key field to a line.
    pub(crate) fn prepend(index: usize, line: &str, field_separator: char) -> String {
        format!("{}{}{}", index, field_separator, line)
    }

    /// Remove the synthetic key field from a line.
    pub(crate) fn strip(line: &str, field_separator: char) -> &str {
        match line.split_once(field_separator) {
            Some((_, rest)) => rest,
            None => line,
        }
    }
}
