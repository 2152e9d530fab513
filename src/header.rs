//! Column alignment between the header of a file being appended and the header of the file it
//! is appended to.

use crate::error::CsvError;

/// How rows of a secondary file map onto the primary header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// Both headers are identical, rows can be copied verbatim.
    Identical,
    /// One entry per primary column: the position of that column in the secondary header, or
    /// None when the secondary file lacks it.
    Realign(Vec<Option<usize>>),
}

/// Check that every secondary column appears in the primary header and compute the alignment.
///
/// Fails with [CsvError::Schema] listing the secondary columns absent from the primary header.
///
/// # Examples
/// ```
/// use csv_sort_merge::header::{reconcile, Reconciliation};
/// let primary = vec!["a".to_string(), "b".to_string(), "c".to_string()];
/// let secondary = vec!["c".to_string(), "a".to_string()];
/// assert_eq!(
///     reconcile(&primary, &secondary).unwrap(),
///     Reconciliation::Realign(vec![Some(1), None, Some(0)])
/// );
/// ```
pub fn reconcile(primary: &[String], secondary: &[String]) -> Result<Reconciliation, anyhow::Error> {
    let missing: Vec<String> = secondary.iter()
        .filter(|column| !primary.contains(column))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(CsvError::Schema { missing }.into());
    }
    if primary == secondary {
        Ok(Reconciliation::Identical)
    } else {
        Ok(Reconciliation::Realign(build_index(secondary, primary)))
    }
}

/// For each global column, its position in the local header.
pub fn build_index(local: &[String], global: &[String]) -> Vec<Option<usize>> {
    global.iter()
        .map(|name| local.iter().position(|column| column == name))
        .collect()
}

/// Reorder the fields of a secondary row along an index from [build_index], filling absent
/// columns with empty strings. The row must have exactly `arity` fields.
pub fn realign_row(fields: &[&str], index: &[Option<usize>], arity: usize) -> Result<Vec<String>, anyhow::Error> {
    if fields.len() != arity {
        return Err(
            CsvError::format(format!("expected {} fields, found {}", arity, fields.len())).into()
        );
    }
    let row = index.iter()
        .map(|position| match position {
            Some(i) => fields[*i].to_string(),
            None => String::new(),
        })
        .collect();
    Ok(row)
}

/// Append to `union` every column of `header` not already in it, preserving order.
pub fn extend_union(union: &mut Vec<String>, header: &[String]) {
    for column in header {
        if !union.contains(column) {
            union.push(column.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::CsvError;
    use crate::header::{build_index, extend_union, realign_row, reconcile, Reconciliation};

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_identical() -> Result<(), anyhow::Error> {
        let h = columns(&["a", "b"]);
        assert_eq!(reconcile(&h, &h)?, Reconciliation::Identical);
        Ok(())
    }

    #[test]
    fn test_same_columns_different_order() -> Result<(), anyhow::Error> {
        let reconciliation = reconcile(&columns(&["a", "b"]), &columns(&["b", "a"]))?;
        assert_eq!(reconciliation, Reconciliation::Realign(vec![Some(1), Some(0)]));
        Ok(())
    }

    #[test]
    fn test_missing_columns() {
        let error = reconcile(&columns(&["a", "b"]), &columns(&["b", "x", "y"])).unwrap_err();
        match error.downcast_ref::<CsvError>() {
            Some(CsvError::Schema { missing }) => assert_eq!(missing, &columns(&["x", "y"])),
            _ => panic!("expected a schema error"),
        }
    }

    #[test]
    fn test_realign_fills_absent_columns() -> Result<(), anyhow::Error> {
        let index = build_index(&columns(&["c", "a"]), &columns(&["a", "b", "c"]));
        let row = realign_row(&["3", "1"], &index, 2)?;
        assert_eq!(row, columns(&["1", "", "3"]));
        Ok(())
    }

    #[test]
    fn test_realign_arity_mismatch() {
        let index = vec![Some(0), None];
        let error = realign_row(&["1", "2", "3"], &index, 2).unwrap_err();
        assert!(matches!(error.downcast_ref::<CsvError>(), Some(CsvError::Format(_))));
    }

    #[test]
    fn test_union_preserves_first_seen_order() {
        let mut union = Vec::new();
        extend_union(&mut union, &columns(&["b", "a"]));
        extend_union(&mut union, &columns(&["c", "a"]));
        extend_union(&mut union, &columns(&["b", "d"]));
        assert_eq!(union, columns(&["b", "a", "c", "d"]));
    }
}
