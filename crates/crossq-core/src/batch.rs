//! Splitting load work into fixed-size batches.

/// Split `items` into consecutive batches of at most `size` elements.
///
/// Concatenating the batches yields `items` unchanged. An empty input
/// produces no batches.
///
/// # Panics
///
/// Panics if `size` is zero; configuration validation rejects that earlier.
pub fn partition<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    assert!(size > 0, "batch size must be greater than 0");
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut current = Vec::with_capacity(size.min(items.len()));
    for item in items {
        current.push(item);
        if current.len() == size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Batch sizes `partition` would produce for `len` items.
pub fn batch_sizes(len: usize, size: usize) -> Vec<usize> {
    assert!(size > 0, "batch size must be greater than 0");
    (0..len.div_ceil(size))
        .map(|i| size.min(len - i * size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_sizes() {
        let batches = partition((0..2500).collect(), 1000);
        let sizes: Vec<_> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![1000, 1000, 500]);
        assert_eq!(batch_sizes(2500, 1000), sizes);
    }

    #[test]
    fn test_partition_edges() {
        assert!(partition(Vec::<u8>::new(), 10).is_empty());
        assert_eq!(partition(vec![1], 10), vec![vec![1]]);
        assert_eq!(partition((0..9).collect::<Vec<_>>(), 10).len(), 1);
        assert_eq!(partition((0..10).collect::<Vec<_>>(), 10).len(), 1);
        assert_eq!(partition((0..11).collect::<Vec<_>>(), 10).len(), 2);
    }

    #[test]
    #[should_panic(expected = "batch size")]
    fn test_zero_size_panics() {
        partition(vec![1, 2, 3], 0);
    }
}
