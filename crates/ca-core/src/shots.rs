//! Multi-shot time-series storage.
//!
//! A `Shots` value holds N samples for each of S shots as an N x S column-major
//! matrix. A single series is simply S = 1. Shots shorter than the longest one
//! are padded with NaN at the end.

use crate::{CaError, CaResult, Real};
use nalgebra::DMatrix;

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shots {
    data: DMatrix<Real>,
}

impl Shots {
    pub fn single(values: Vec<Real>) -> Self {
        let n = values.len();
        Self {
            data: DMatrix::from_vec(n, 1, values),
        }
    }

    /// Stack columns, padding shorter ones with NaN.
    pub fn from_columns(columns: Vec<Vec<Real>>) -> CaResult<Self> {
        if columns.is_empty() {
            return Err(CaError::Empty { what: "shot columns" });
        }
        let nrows = columns.iter().map(Vec::len).max().unwrap_or(0);
        let ncols = columns.len();
        let mut flat = Vec::with_capacity(nrows * ncols);
        for col in columns {
            let pad = nrows - col.len();
            flat.extend(col);
            flat.extend(std::iter::repeat_n(Real::NAN, pad));
        }
        Ok(Self {
            data: DMatrix::from_vec(nrows, ncols, flat),
        })
    }

    pub fn from_matrix(data: DMatrix<Real>) -> Self {
        Self { data }
    }

    pub fn matrix(&self) -> &DMatrix<Real> {
        &self.data
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_shots(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_single(&self) -> bool {
        self.n_shots() == 1
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Column `i` as a contiguous slice.
    pub fn shot(&self, i: usize) -> &[Real] {
        let n = self.n_samples();
        &self.data.as_slice()[i * n..(i + 1) * n]
    }

    pub fn shot_mut(&mut self, i: usize) -> &mut [Real] {
        let n = self.n_samples();
        &mut self.data.as_mut_slice()[i * n..(i + 1) * n]
    }

    pub fn shots(&self) -> impl Iterator<Item = &[Real]> {
        (0..self.n_shots()).map(move |i| self.shot(i))
    }

    pub fn as_flat(&self) -> &[Real] {
        self.data.as_slice()
    }

    pub fn columns(&self) -> Vec<Vec<Real>> {
        self.shots().map(<[Real]>::to_vec).collect()
    }

    /// Apply `f` to every column, producing a new value of the same shape.
    pub fn map_shots<F>(&self, mut f: F) -> CaResult<Self>
    where
        F: FnMut(&[Real]) -> CaResult<Vec<Real>>,
    {
        let mut cols = Vec::with_capacity(self.n_shots());
        for s in self.shots() {
            let out = f(s)?;
            if out.len() != s.len() {
                return Err(CaError::LengthMismatch {
                    what: "mapped shot",
                    expected: s.len(),
                    got: out.len(),
                });
            }
            cols.push(out);
        }
        Self::from_columns(cols)
    }

    pub fn map_values(&self, f: impl Fn(Real) -> Real) -> Self {
        Self {
            data: self.data.map(f),
        }
    }

    /// Element-wise combination of two values with identical shape.
    pub fn zip_with(&self, other: &Shots, f: impl Fn(Real, Real) -> Real) -> CaResult<Self> {
        if self.data.shape() != other.data.shape() {
            return Err(CaError::LengthMismatch {
                what: "shots shape",
                expected: self.as_flat().len(),
                got: other.as_flat().len(),
            });
        }
        Ok(Self {
            data: self.data.zip_map(&other.data, f),
        })
    }

    /// Check that `other` has the same sample count and either the same
    /// number of shots or a single shot.
    pub fn check_compatible(&self, other: &Shots, what: &'static str) -> CaResult<()> {
        if other.n_samples() != self.n_samples() {
            return Err(CaError::LengthMismatch {
                what,
                expected: self.n_samples(),
                got: other.n_samples(),
            });
        }
        if other.n_shots() != self.n_shots() && other.n_shots() != 1 {
            return Err(CaError::LengthMismatch {
                what,
                expected: self.n_shots(),
                got: other.n_shots(),
            });
        }
        Ok(())
    }

    /// Shot `i`, or shot 0 when this value only holds a single shot.
    pub fn shot_or_first(&self, i: usize) -> &[Real] {
        if self.is_single() { self.shot(0) } else { self.shot(i) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_columns_are_nan_padded() {
        let s = Shots::from_columns(vec![vec![1.0, 2.0, 3.0], vec![4.0]]).unwrap();
        assert_eq!(s.n_samples(), 3);
        assert_eq!(s.n_shots(), 2);
        assert_eq!(s.shot(0), &[1.0, 2.0, 3.0]);
        assert_eq!(s.shot(1)[0], 4.0);
        assert!(s.shot(1)[1].is_nan());
        assert!(s.shot(1)[2].is_nan());
    }

    #[test]
    fn map_shots_keeps_shape() {
        let s = Shots::from_columns(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let doubled = s.map_shots(|c| Ok(c.iter().map(|v| 2.0 * v).collect())).unwrap();
        assert_eq!(doubled.shot(1), &[6.0, 8.0]);
    }

    #[test]
    fn single_broadcasts_in_compat_check() {
        let a = Shots::from_columns(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let b = Shots::single(vec![0.0, 0.0]);
        assert!(a.check_compatible(&b, "b").is_ok());
        assert_eq!(b.shot_or_first(1), &[0.0, 0.0]);
        let c = Shots::single(vec![0.0]);
        assert!(a.check_compatible(&c, "c").is_err());
    }
}
