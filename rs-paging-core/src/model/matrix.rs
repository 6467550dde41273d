use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, ChainResult};

/// Square `size x size` grid stored as one contiguous row-major buffer.
///
/// Cell `(row, col)` lives at `row * size + col`. All accessors are
/// bounds-checked; the buffer is released when the matrix is dropped.
///
/// # Invariants
/// - `size >= 1`
/// - `data.len() == size * size` (checked by `is_consistent` after decoding)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Matrix<T> {
	size: usize,
	data: Vec<T>,
}

impl<T: Copy + Default> Matrix<T> {
	/// Allocates a `size x size` matrix with every cell set to zero.
	///
	/// # Errors
	/// - `InvalidArgument` if `size` is 0.
	/// - `Allocation` if `size * size` overflows or the buffer cannot be reserved.
	pub fn zeros(size: usize) -> ChainResult<Self> {
		if size == 0 {
			return Err(ChainError::invalid("allocate", "matrix size must be >= 1"));
		}
		let allocation_error = || ChainError::Allocation { operation: "allocate", pages: size };
		let len = size.checked_mul(size).ok_or_else(|| allocation_error())?;

		let mut data = Vec::new();
		data.try_reserve_exact(len).map_err(|_| allocation_error())?;
		data.resize(len, T::default());

		Ok(Self { size, data })
	}

	/// Builds a matrix from explicit rows.
	///
	/// # Errors
	/// `InvalidArgument` if there are no rows or the rows do not form a square.
	pub fn from_rows<R: AsRef<[T]>>(rows: &[R]) -> ChainResult<Self> {
		let size = rows.len();
		if let Some(bad) = rows.iter().position(|row| row.as_ref().len() != size) {
			return Err(ChainError::invalid(
				"from_rows",
				format!("row {bad} has {} cells, expected {size}", rows[bad].as_ref().len()),
			));
		}
		let mut matrix = Self::zeros(size)?;
		for (target, row) in matrix.rows_mut().zip(rows) {
			target.copy_from_slice(row.as_ref());
		}
		Ok(matrix)
	}

	/// Number of rows (and columns).
	pub fn size(&self) -> usize {
		self.size
	}

	/// Returns the cell at `(row, col)`, or `None` outside the matrix.
	pub fn get(&self, row: usize, col: usize) -> Option<T> {
		self.offset(row, col).map(|i| self.data[i])
	}

	/// Mutable access to the cell at `(row, col)`, or `None` outside the matrix.
	pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
		let i = self.offset(row, col)?;
		Some(&mut self.data[i])
	}

	/// Returns row `row` as a slice, or `None` outside the matrix.
	pub fn row(&self, row: usize) -> Option<&[T]> {
		if row >= self.size {
			return None;
		}
		Some(&self.data[row * self.size..(row + 1) * self.size])
	}

	/// Iterates over all rows in order.
	pub fn rows(&self) -> impl Iterator<Item = &[T]> {
		self.data.chunks_exact(self.size)
	}

	/// Checks the buffer length against the declared size.
	///
	/// Only a deserialized matrix can fail this check.
	pub fn is_consistent(&self) -> bool {
		self.size > 0 && self.size.checked_mul(self.size) == Some(self.data.len())
	}

	pub(crate) fn rows_mut(&mut self) -> impl Iterator<Item = &mut [T]> {
		self.data.chunks_exact_mut(self.size)
	}

	fn offset(&self, row: usize, col: usize) -> Option<usize> {
		(row < self.size && col < self.size).then(|| row * self.size + col)
	}
}

impl<T: Copy + Default> Index<(usize, usize)> for Matrix<T> {
	type Output = T;

	/// # Panics
	/// Panics if `row` or `col` is outside the matrix.
	fn index(&self, (row, col): (usize, usize)) -> &T {
		match self.offset(row, col) {
			Some(i) => &self.data[i],
			None => panic!("cell ({row}, {col}) outside a {0}x{0} matrix", self.size),
		}
	}
}

impl Matrix<f64> {
	/// Allocates the `size x size` identity matrix.
	pub fn identity(size: usize) -> ChainResult<Self> {
		let mut matrix = Self::zeros(size)?;
		for (i, row) in matrix.rows_mut().enumerate() {
			row[i] = 1.0;
		}
		Ok(matrix)
	}

	/// Returns `self * other` as a freshly allocated matrix.
	///
	/// # Errors
	/// `InvalidArgument` if the operands have different sizes.
	pub fn multiply(&self, other: &Self) -> ChainResult<Self> {
		self.check_same_size(other)?;
		let mut result = Self::zeros(self.size)?;
		self.multiply_into(other, &mut result)?;
		Ok(result)
	}

	/// Writes `self * other` into `out`, overwriting whatever it held.
	///
	/// Plain triple loop, `O(n^3)`. The loop order is `i, k, j` so the inner
	/// loop walks rows of both `other` and `out`; every `out[i][j]` is still
	/// accumulated over `k` in ascending order.
	///
	/// # Errors
	/// `InvalidArgument` if the three matrices do not share one size.
	pub fn multiply_into(&self, other: &Self, out: &mut Self) -> ChainResult<()> {
		self.check_same_size(other)?;
		self.check_same_size(out)?;

		let n = self.size;
		out.data.fill(0.0);
		for (lhs_row, out_row) in self.rows().zip(out.data.chunks_exact_mut(n)) {
			for (&a, rhs_row) in lhs_row.iter().zip(other.data.chunks_exact(n)) {
				for (cell, &b) in out_row.iter_mut().zip(rhs_row) {
					*cell += a * b;
				}
			}
		}
		Ok(())
	}

	fn check_same_size(&self, other: &Self) -> ChainResult<()> {
		if self.size != other.size {
			return Err(ChainError::invalid(
				"multiply",
				format!("dimension mismatch: {0}x{0} and {1}x{1}", self.size, other.size),
			));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn from_rows(rows: &[&[f64]]) -> Matrix<f64> {
		Matrix::from_rows(rows).unwrap()
	}

	#[test]
	fn zeros_is_zero_initialized() {
		let counts: Matrix<u64> = Matrix::zeros(4).unwrap();
		assert_eq!(counts.size(), 4);
		assert!(counts.rows().all(|row| row.iter().all(|c| *c == 0)));

		let probabilities: Matrix<f64> = Matrix::zeros(3).unwrap();
		assert!(probabilities.rows().flatten().all(|p| *p == 0.0));
		assert!(probabilities.is_consistent());
	}

	#[test]
	fn zero_size_is_rejected() {
		let err = Matrix::<f64>::zeros(0).unwrap_err();
		assert!(matches!(err, ChainError::InvalidArgument { operation: "allocate", .. }));
	}

	#[test]
	fn overflowing_size_is_an_allocation_error() {
		let err = Matrix::<u64>::zeros(usize::MAX).unwrap_err();
		assert!(matches!(err, ChainError::Allocation { pages: usize::MAX, .. }));
	}

	#[test]
	fn accessors_are_bounds_checked() {
		let mut m: Matrix<u64> = Matrix::zeros(2).unwrap();
		*m.get_mut(1, 0).unwrap() += 3;
		assert_eq!(m.get(1, 0), Some(3));
		assert_eq!(m[(1, 0)], 3);
		assert_eq!(m.get(2, 0), None);
		assert_eq!(m.get(0, 2), None);
		assert!(m.get_mut(0, 5).is_none());
		assert_eq!(m.row(1), Some(&[3, 0][..]));
		assert!(m.row(2).is_none());
	}

	#[test]
	#[should_panic(expected = "outside a 2x2 matrix")]
	fn index_panics_outside_the_matrix() {
		let m: Matrix<f64> = Matrix::zeros(2).unwrap();
		let _ = m[(0, 2)];
	}

	#[test]
	fn multiply_matches_hand_computation() {
		let a = from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
		let b = from_rows(&[&[5.0, 6.0], &[7.0, 8.0]]);
		let r = a.multiply(&b).unwrap();
		assert_eq!(r, from_rows(&[&[19.0, 22.0], &[43.0, 50.0]]));
	}

	#[test]
	fn identity_is_neutral() {
		let a = from_rows(&[&[0.2, 0.8, 0.0], &[0.5, 0.0, 0.5], &[0.0, 0.0, 1.0]]);
		let id = Matrix::identity(3).unwrap();
		assert_eq!(a.multiply(&id).unwrap(), a);
		assert_eq!(id.multiply(&a).unwrap(), a);
	}

	#[test]
	fn multiply_into_overwrites_stale_output() {
		let a = from_rows(&[&[0.0, 1.0], &[1.0, 0.0]]);
		let mut out = from_rows(&[&[9.0, 9.0], &[9.0, 9.0]]);
		a.multiply_into(&a, &mut out).unwrap();
		assert_eq!(out, Matrix::identity(2).unwrap());
	}

	#[test]
	fn multiply_rejects_mismatched_sizes() {
		let a = Matrix::identity(2).unwrap();
		let b = Matrix::identity(3).unwrap();
		let err = a.multiply(&b).unwrap_err();
		assert!(matches!(err, ChainError::InvalidArgument { operation: "multiply", .. }));

		let mut out = Matrix::zeros(3).unwrap();
		assert!(a.multiply_into(&a, &mut out).is_err());
	}

	#[test]
	fn from_rows_requires_a_square() {
		let err = Matrix::<u64>::from_rows(&[vec![1, 2], vec![3]]).unwrap_err();
		assert_eq!(err.to_string(), "invalid argument to from_rows: row 1 has 1 cells, expected 2");
		assert!(Matrix::<u64>::from_rows::<Vec<u64>>(&[]).is_err());
	}

	#[test]
	fn decoded_matrix_with_short_buffer_is_inconsistent() {
		let broken: Matrix<u64> = Matrix { size: 3, data: vec![0; 8] };
		assert!(!broken.is_consistent());
	}
}
