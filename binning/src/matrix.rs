//! A small dense row-major matrix, enough for response matrices and
//! Fisher information.

use crate::error::{BinningError, BinningResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatrixLayout", into = "MatrixLayout")]
pub struct Matrix {
    nrows: usize,
    ncols: usize,
    data: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MatrixLayout {
    nrows: usize,
    ncols: usize,
    data: Vec<f64>,
}

impl TryFrom<MatrixLayout> for Matrix {
    type Error = BinningError;

    fn try_from(layout: MatrixLayout) -> BinningResult<Self> {
        Self::new(layout.nrows, layout.ncols, layout.data)
    }
}

impl From<Matrix> for MatrixLayout {
    fn from(matrix: Matrix) -> Self {
        Self {
            nrows: matrix.nrows,
            ncols: matrix.ncols,
            data: matrix.data,
        }
    }
}

impl Matrix {
    pub fn new(nrows: usize, ncols: usize, data: Vec<f64>) -> BinningResult<Self> {
        if data.len() != nrows * ncols {
            return Err(BinningError::LengthMismatch {
                expected: nrows * ncols,
                actual: data.len(),
            });
        }
        Ok(Self { nrows, ncols, data })
    }

    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            data: vec![0.0; nrows * ncols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, 1.0);
        }
        m
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> BinningResult<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, |r| r.len());
        let mut data = Vec::with_capacity(nrows * ncols);
        for row in rows {
            if row.len() != ncols {
                return Err(BinningError::LengthMismatch {
                    expected: ncols,
                    actual: row.len(),
                });
            }
            data.extend(row);
        }
        Ok(Self { nrows, ncols, data })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.ncols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.ncols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.ncols..(row + 1) * self.ncols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.nrows).map(move |r| &self.data[r * self.ncols..(r + 1) * self.ncols])
    }

    /// Matrix-vector product.
    pub fn dot(&self, vector: &[f64]) -> BinningResult<Vec<f64>> {
        if vector.len() != self.ncols {
            return Err(BinningError::LengthMismatch {
                expected: self.ncols,
                actual: vector.len(),
            });
        }
        Ok(self
            .rows()
            .map(|row| row.iter().zip(vector).map(|(a, b)| a * b).sum())
            .collect())
    }

    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.ncols];
        for row in self.rows() {
            for (s, v) in sums.iter_mut().zip(row) {
                *s += v;
            }
        }
        sums
    }

    /// A new matrix with only the columns where `keep` is true.
    pub fn select_columns(&self, keep: &[bool]) -> BinningResult<Matrix> {
        if keep.len() != self.ncols {
            return Err(BinningError::LengthMismatch {
                expected: self.ncols,
                actual: keep.len(),
            });
        }
        let ncols = keep.iter().filter(|&&k| k).count();
        let data = self
            .rows()
            .flat_map(|row| row.iter().zip(keep).filter(|(_, &k)| k).map(|(v, _)| *v))
            .collect();
        Ok(Matrix {
            nrows: self.nrows,
            ncols,
            data,
        })
    }

    /// Natural logarithm of the absolute value of the determinant.
    ///
    /// Uses LU decomposition with partial pivoting. Singular matrices give
    /// negative infinity.
    pub fn log_abs_determinant(&self) -> BinningResult<f64> {
        if self.nrows != self.ncols {
            return Err(BinningError::Incompatible {
                message: format!("determinant of a {}x{} matrix", self.nrows, self.ncols),
            });
        }
        let n = self.nrows;
        let mut a = self.data.clone();
        let mut log_det = 0.0;
        for k in 0..n {
            let pivot = (k..n)
                .max_by(|&i, &j| a[i * n + k].abs().total_cmp(&a[j * n + k].abs()))
                .unwrap_or(k);
            let p = a[pivot * n + k];
            if p == 0.0 || !p.is_finite() {
                return Ok(f64::NEG_INFINITY);
            }
            if pivot != k {
                for c in 0..n {
                    a.swap(k * n + c, pivot * n + c);
                }
            }
            log_det += p.abs().ln();
            for i in (k + 1)..n {
                let factor = a[i * n + k] / p;
                for c in k..n {
                    a[i * n + c] -= factor * a[k * n + c];
                }
            }
        }
        Ok(log_det)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_and_column_sums() {
        let m = Matrix::from_rows(vec![vec![1.0, 0.0], vec![0.5, 1.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(m.dot(&[1.0, 10.0]).unwrap(), vec![1.0, 10.5, 10.0]);
        assert_eq!(m.column_sums(), vec![1.5, 2.0]);
        assert!(m.dot(&[1.0]).is_err());
    }

    #[test]
    fn test_dot_without_columns() {
        let m = Matrix::zeros(2, 0);
        assert_eq!(m.rows().count(), 2);
        assert_eq!(m.dot(&[]).unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_deserialize_checks_shape() {
        let m: Matrix = serde_json::from_str(r#"{"nrows":2,"ncols":2,"data":[1,0,0,1]}"#).unwrap();
        assert_eq!(m, Matrix::identity(2));

        let short = serde_json::from_str::<Matrix>(r#"{"nrows":3,"ncols":2,"data":[1,0,0,1]}"#);
        assert!(short.is_err());
    }

    #[test]
    fn test_select_columns() {
        let m = Matrix::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        let s = m.select_columns(&[true, false, true]).unwrap();
        assert_eq!(s.ncols(), 2);
        assert_eq!(s.row(1), &[4.0, 6.0]);
    }

    #[test]
    fn test_log_abs_determinant() {
        let m = Matrix::from_rows(vec![vec![0.0, 2.0], vec![3.0, 0.0]]).unwrap();
        assert!((m.log_abs_determinant().unwrap() - 6.0f64.ln()).abs() < 1e-12);
        let singular = Matrix::from_rows(vec![vec![1.0, 2.0], vec![2.0, 4.0]]).unwrap();
        assert_eq!(singular.log_abs_determinant().unwrap(), f64::NEG_INFINITY);
        assert_eq!(Matrix::identity(3).log_abs_determinant().unwrap(), 0.0);
    }

    #[test]
    fn test_from_rows_mismatch() {
        assert!(Matrix::from_rows(vec![vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(Matrix::new(2, 2, vec![1.0]).is_err());
    }
}
