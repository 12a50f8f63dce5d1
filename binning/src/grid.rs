//! C-order (last axis fastest) index arithmetic for multi-dimensional bins.

use crate::binning::BinContents;

pub(crate) fn ravel(tuple: &[usize], shape: &[usize]) -> Option<usize> {
    if tuple.len() != shape.len() {
        return None;
    }
    let mut index = 0;
    for (&i, &n) in tuple.iter().zip(shape) {
        if i >= n {
            return None;
        }
        index = index * n + i;
    }
    Some(index)
}

pub(crate) fn unravel(mut index: usize, shape: &[usize]) -> Option<Vec<usize>> {
    let total: usize = shape.iter().product();
    if index >= total {
        return None;
    }
    let mut tuple = vec![0; shape.len()];
    for (axis, &n) in shape.iter().enumerate().rev() {
        tuple[axis] = index % n;
        index /= n;
    }
    Some(tuple)
}

/// Sum the counts of a grid into a new grid.
///
/// `axis_maps[a][i]` gives the new index along new axis `a` of old index `i`
/// along old axis `sources[a]`, or `None` if those bins are dropped. Old axes
/// not listed in `sources` are summed over.
pub(crate) fn regrid(
    contents: &BinContents,
    old_shape: &[usize],
    sources: &[usize],
    axis_maps: &[Vec<Option<usize>>],
    new_shape: &[usize],
) -> BinContents {
    let mut out = BinContents::new(new_shape.iter().product());
    let mut new_tuple = vec![0; new_shape.len()];
    for old in 0..contents.len() {
        let Some(old_tuple) = unravel(old, old_shape) else {
            continue;
        };
        let mapped = sources
            .iter()
            .zip(axis_maps)
            .zip(new_tuple.iter_mut())
            .all(|((&axis, map), slot)| match map[old_tuple[axis]] {
                Some(i) => {
                    *slot = i;
                    true
                }
                None => false,
            });
        if !mapped {
            continue;
        }
        if let Some(new) = ravel(&new_tuple, new_shape) {
            out.accumulate(new, contents, old);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ravel_roundtrip() {
        let shape = [2, 4];
        assert_eq!(ravel(&[1, 2], &shape), Some(6));
        assert_eq!(unravel(6, &shape), Some(vec![1, 2]));
        assert_eq!(ravel(&[2, 0], &shape), None);
        assert_eq!(unravel(8, &shape), None);
        let shape = [2, 4, 2];
        assert_eq!(unravel(ravel(&[1, 3, 0], &shape).unwrap(), &shape), Some(vec![1, 3, 0]));
    }

    #[test]
    fn test_regrid_sums_dropped_axis() {
        let mut contents = BinContents::new(4);
        contents.values = vec![1.0, 2.0, 3.0, 4.0];
        let identity = vec![Some(0), Some(1)];
        let out = regrid(&contents, &[2, 2], &[0], &[identity], &[2]);
        assert_eq!(out.values, vec![3.0, 7.0]);
    }
}
