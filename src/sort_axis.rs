/// The column along which a file is sorted.
///
/// # Examples
/// ```
/// use csv_sort_merge::sort_axis::SortAxis;
/// // sort by the column named "id", resolved against the file header
/// let by_name = SortAxis::column("id");
/// // sort by the third column, counting from 0
/// let by_index = SortAxis::Index(2);
/// // shuffle the file
/// let shuffled = SortAxis::Random;
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortAxis {
    /// A column name. Requires a header.
    Column(String),
    /// A column position, starting at 0.
    Index(usize),
    /// A random permutation of the rows.
    Random,
}

impl SortAxis {
    /// Create a [SortAxis::Column] from a &str
    pub fn column(name: &str) -> SortAxis {
        SortAxis::Column(name.to_string())
    }

    /// Check whether this is [SortAxis::Random]
    pub fn is_random(&self) -> bool {
        matches!(self, SortAxis::Random)
    }
}
