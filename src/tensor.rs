//! Tensor Operations for Neural Networks
//!
//! This module provides a minimal tensor library for the transformer forward
//! pass. Tensors store multi-dimensional arrays with shape and stride
//! information for efficient indexing and memory layout.
//!
//! ## Core Concepts
//!
//! - **Data**: Flat `Vec<f32>` storing all elements in row-major order
//! - **Shape**: Dimensions of the tensor (e.g., `[batch, seq, dim]`)
//! - **Strides**: Step sizes for each dimension to compute flat indices
//!
//! ## Example
//!
//! ```rust
//! use puck::Tensor;
//!
//! // Create a 2x3 matrix
//! let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let tensor = Tensor::new(data, vec![2, 3]);
//!
//! // Matrix multiplication
//! let other = Tensor::new(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], vec![3, 2]);
//! let result = tensor.matmul(&other);
//! assert_eq!(result.shape, vec![2, 2]);
//! ```
//!
//! ## Contract
//!
//! Tensor kernels assume their operands were validated by the calling layer.
//! A shape disagreement at this level is a programming error and panics with
//! a message naming both shapes. Layers check user-facing inputs first and
//! report [`PuckError::ShapeMismatch`](crate::PuckError::ShapeMismatch).
//!
//! ## Performance
//!
//! Several operations use Rayon:
//!
//! - **Matrix multiplication**: Cache-blocked algorithm with parallel row blocks
//! - **Batched matmul**: One independent product per batch element
//! - **Element-wise operations**: Parallel iteration over data
//! - **Softmax / mean / variance**: Parallel computation per row

use rayon::prelude::*;

/// A multi-dimensional array for neural network computations
///
/// For shape `[2, 3]`, data is stored as
/// `[row0_col0, row0_col1, row0_col2, row1_col0, row1_col1, row1_col2]`
/// and strides are `[3, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    /// Flat storage of all tensor elements
    pub data: Vec<f32>,
    /// Shape of the tensor (dimensions)
    pub shape: Vec<usize>,
    /// Strides for each dimension (computed from shape)
    pub strides: Vec<usize>,
}

impl Tensor {
    /// Create a new tensor with given data and shape
    ///
    /// # Panics
    ///
    /// Panics if the product of shape dimensions doesn't equal data length
    ///
    /// # Example
    ///
    /// ```rust
    /// # use puck::Tensor;
    /// let tensor = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    /// assert_eq!(tensor.shape, vec![2, 2]);
    /// ```
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        let expected_size: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_size,
            "Data length ({}) doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_size
        );

        let strides = Self::compute_strides(&shape);
        Self {
            data,
            shape,
            strides,
        }
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: Vec<usize>) -> Self {
        let size: usize = shape.iter().product();
        Self::new(vec![0.0; size], shape)
    }

    /// Create a tensor filled with a constant
    pub fn full(shape: Vec<usize>, value: f32) -> Self {
        let size: usize = shape.iter().product();
        Self::new(vec![value; size], shape)
    }

    /// For shape `[d0, d1, d2]`, strides are `[d1*d2, d2, 1]`
    fn compute_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides = vec![1; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        strides
    }

    /// Number of dimensions
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Size of the innermost dimension (1 for a scalar tensor)
    pub fn last_dim(&self) -> usize {
        self.shape.last().copied().unwrap_or(1)
    }

    /// Read one element by multi-index
    ///
    /// # Panics
    ///
    /// Panics if the index rank or any coordinate is out of bounds
    pub fn at(&self, index: &[usize]) -> f32 {
        assert_eq!(index.len(), self.shape.len(), "Index rank mismatch");
        let mut flat = 0;
        for ((&i, &dim), &stride) in index.iter().zip(&self.shape).zip(&self.strides) {
            assert!(i < dim, "Index {:?} out of bounds for shape {:?}", index, self.shape);
            flat += i * stride;
        }
        self.data[flat]
    }

    /// Iterate over the innermost rows (chunks of `last_dim` elements)
    pub fn rows(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.last_dim().max(1))
    }

    /// Simple loop structured so LLVM can auto-vectorize it
    /// Computes: result[j] += a_val * b[j] for all j
    #[inline(always)]
    fn matmul_inner_simd(a_val: f32, b: &[f32], result: &mut [f32]) {
        for (r, &b_val) in result.iter_mut().zip(b.iter()) {
            *r += a_val * b_val;
        }
    }

    /// Matrix multiplication
    ///
    /// Supports:
    /// - `[m, k] @ [k, n] -> [m, n]`
    /// - `[batch, m, k] @ [k, n] -> [batch, m, n]` (shared right operand,
    ///   used by linear layers)
    /// - `[batch, m, k] @ [batch, k, n] -> [batch, m, n]` (batched, used by
    ///   attention)
    ///
    /// # Panics
    ///
    /// Panics if dimensions are incompatible or unsupported
    ///
    /// # Example
    ///
    /// ```rust
    /// # use puck::Tensor;
    /// let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    /// let b = Tensor::new(vec![1.0, 0.0, 0.0, 1.0], vec![2, 2]);
    /// let c = a.matmul(&b);
    /// assert_eq!(c.data, vec![1.0, 2.0, 3.0, 4.0]);
    /// ```
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        match (self.shape.len(), other.shape.len()) {
            (2, 2) => {
                assert_eq!(
                    self.shape[1], other.shape[0],
                    "Matrix dimensions incompatible: {:?} @ {:?}",
                    self.shape, other.shape
                );
                let (m, k, n) = (self.shape[0], self.shape[1], other.shape[1]);
                Tensor::new(
                    Self::matmul_2d(&self.data, &other.data, m, k, n),
                    vec![m, n],
                )
            }
            (3, 2) => {
                // Fold batch into rows: [batch * m, k] @ [k, n]
                let (batch, m, k) = (self.shape[0], self.shape[1], self.shape[2]);
                assert_eq!(
                    k, other.shape[0],
                    "Matrix dimensions incompatible: {:?} @ {:?}",
                    self.shape, other.shape
                );
                let n = other.shape[1];
                Tensor::new(
                    Self::matmul_2d(&self.data, &other.data, batch * m, k, n),
                    vec![batch, m, n],
                )
            }
            (3, 3) => {
                let (batch, m, k) = (self.shape[0], self.shape[1], self.shape[2]);
                assert_eq!(
                    other.shape[0], batch,
                    "Batch dimensions must match for batched matmul: {:?} @ {:?}",
                    self.shape, other.shape
                );
                assert_eq!(
                    other.shape[1], k,
                    "Inner dimensions must match for batched matmul: {:?} @ {:?}",
                    self.shape, other.shape
                );
                let n = other.shape[2];
                let mut result = vec![0.0; batch * m * n];

                // Each batch element is an independent m×n product
                result
                    .par_chunks_mut((m * n).max(1))
                    .enumerate()
                    .for_each(|(b, chunk)| {
                        let a = &self.data[b * m * k..(b + 1) * m * k];
                        let bm = &other.data[b * k * n..(b + 1) * k * n];
                        for i in 0..m {
                            let row = &mut chunk[i * n..(i + 1) * n];
                            for l in 0..k {
                                Self::matmul_inner_simd(a[i * k + l], &bm[l * n..(l + 1) * n], row);
                            }
                        }
                    });

                Tensor::new(result, vec![batch, m, n])
            }
            _ => panic!(
                "Unsupported matmul shapes: {:?} @ {:?}",
                self.shape, other.shape
            ),
        }
    }

    /// Plain row-major `[m, k] @ [k, n]` on raw slices
    fn matmul_2d(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
        // Work threshold balances parallel overhead against the gain
        if m * n * k >= 1_000 {
            return Self::matmul_parallel_blocked(a, b, m, k, n);
        }

        let mut result = vec![0.0; m * n];
        for i in 0..m {
            for l in 0..k {
                Self::matmul_inner_simd(
                    a[i * k + l],
                    &b[l * n..(l + 1) * n],
                    &mut result[i * n..(i + 1) * n],
                );
            }
        }
        result
    }

    /// Parallel cache-blocked matrix multiplication
    ///
    /// Processes 8×8 blocks (256 bytes, fits in L1) and distributes output
    /// row blocks across cores via Rayon. Inner loops walk memory
    /// sequentially.
    fn matmul_parallel_blocked(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
        const BLOCK_SIZE: usize = 8;

        let mut result = vec![0.0; m * n];
        if n == 0 {
            return result;
        }

        result
            .par_chunks_mut(BLOCK_SIZE * n)
            .enumerate()
            .for_each(|(block_i, result_block)| {
                let i_start = block_i * BLOCK_SIZE;
                let i_end = (i_start + BLOCK_SIZE).min(m);

                for j_start in (0..n).step_by(BLOCK_SIZE) {
                    let j_end = (j_start + BLOCK_SIZE).min(n);

                    for k_start in (0..k).step_by(BLOCK_SIZE) {
                        let k_end = (k_start + BLOCK_SIZE).min(k);

                        for i in i_start..i_end {
                            let row_offset = (i - i_start) * n;
                            for k_idx in k_start..k_end {
                                Self::matmul_inner_simd(
                                    a[i * k + k_idx],
                                    &b[k_idx * n + j_start..k_idx * n + j_end],
                                    &mut result_block[row_offset + j_start..row_offset + j_end],
                                );
                            }
                        }
                    }
                }
            });

        result
    }

    /// Softmax along the last axis
    ///
    /// ```text
    /// softmax(x)[i] = exp(x[i] - max(x)) / sum(exp(x[j] - max(x)))
    /// ```
    ///
    /// Subtracting the row maximum keeps `exp()` from overflowing on large
    /// scores. Entries equal to `-inf` come out as exactly `0.0`, which is
    /// what causal masking relies on. A row must contain at least one finite
    /// entry.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use puck::Tensor;
    /// let tensor = Tensor::new(vec![1.0, 2.0, f32::NEG_INFINITY], vec![1, 3]);
    /// let result = tensor.softmax();
    /// assert_eq!(result.data[2], 0.0);
    /// assert!((result.data.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    /// ```
    pub fn softmax(&self) -> Tensor {
        let cols = self.last_dim().max(1);

        let result: Vec<f32> = self
            .data
            .par_chunks(cols)
            .flat_map_iter(|row| softmax_row(row).into_iter())
            .collect();

        Tensor::new(result, self.shape.clone())
    }

    /// Element-wise addition with broadcasting support
    ///
    /// 1. **Exact match**: Same shape
    /// 2. **Broadcast batch**: `[batch, seq, dim] + [seq, dim]` (positions)
    /// 3. **Broadcast last dim**: `[*, n] + [n]` (bias)
    ///
    /// ```rust
    /// # use puck::Tensor;
    /// let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
    /// let b = Tensor::new(vec![10.0, 20.0], vec![2]);
    /// assert_eq!(a.add(&b).data, vec![11.0, 22.0, 13.0, 24.0]);
    /// ```
    pub fn add(&self, other: &Tensor) -> Tensor {
        if self.shape == other.shape {
            let result = self
                .data
                .par_iter()
                .zip(&other.data)
                .map(|(a, b)| a + b)
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        if self.shape.len() == 3 && other.shape.len() == 2 {
            assert_eq!(
                &self.shape[1..],
                &other.shape[..],
                "Unsupported broadcast for add: {:?} + {:?}",
                self.shape,
                other.shape
            );
            let inner = other.data.len();
            let result = self
                .data
                .par_chunks(inner.max(1))
                .flat_map_iter(move |chunk| chunk.iter().zip(&other.data).map(|(a, b)| a + b))
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        self.broadcast_last(other, "add", |a, b| a + b)
    }

    /// Element-wise multiplication (exact shape or `[*, n] * [n]`)
    pub fn mul(&self, other: &Tensor) -> Tensor {
        if self.shape == other.shape {
            let result = self
                .data
                .par_iter()
                .zip(&other.data)
                .map(|(a, b)| a * b)
                .collect();
            return Tensor::new(result, self.shape.clone());
        }
        self.broadcast_last(other, "mul", |a, b| a * b)
    }

    /// Element-wise subtraction
    ///
    /// Also accepts a keepdim reduction as right operand (`[.., n] - [.., 1]`),
    /// which is how normalisation subtracts a per-row mean.
    pub fn sub(&self, other: &Tensor) -> Tensor {
        self.zip_rows(other, "sub", |a, b| a - b)
    }

    /// Element-wise division (same broadcasting as [`Tensor::sub`])
    pub fn div(&self, other: &Tensor) -> Tensor {
        self.zip_rows(other, "div", |a, b| a / b)
    }

    /// `[*, n] op [n]`
    fn broadcast_last(&self, other: &Tensor, op: &str, f: impl Fn(f32, f32) -> f32 + Sync) -> Tensor {
        let last_dim = self.last_dim();
        assert!(
            self.shape.len() > other.shape.len() && other.data.len() == last_dim,
            "Unsupported broadcast for {}: {:?} and {:?}",
            op,
            self.shape,
            other.shape
        );
        let f = &f;
        let result = self
            .data
            .par_chunks(last_dim.max(1))
            .flat_map_iter(move |row| row.iter().zip(&other.data).map(move |(&a, &b)| f(a, b)))
            .collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Exact shape, or `[.., n] op [.., 1]` with matching leading dims
    fn zip_rows(&self, other: &Tensor, op: &str, f: impl Fn(f32, f32) -> f32 + Sync) -> Tensor {
        if self.shape == other.shape {
            let result = self
                .data
                .par_iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect();
            return Tensor::new(result, self.shape.clone());
        }

        let keepdim = self.shape.len() == other.shape.len()
            && other.last_dim() == 1
            && self.shape[..self.shape.len() - 1] == other.shape[..other.shape.len() - 1];
        assert!(
            keepdim,
            "Shapes must match for {}: {:?} and {:?}",
            op, self.shape, other.shape
        );

        let cols = self.last_dim().max(1);
        let result = self
            .data
            .par_chunks(cols)
            .zip(other.data.par_iter())
            .flat_map_iter(|(row, &b)| row.iter().map(move |&a| (a, b)))
            .map(|(a, b)| f(a, b))
            .collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Add scalar to all elements
    pub fn add_scalar(&self, scalar: f32) -> Tensor {
        let result = self.data.par_iter().map(|&x| x + scalar).collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Multiply all elements by scalar
    pub fn mul_scalar(&self, scalar: f32) -> Tensor {
        let result = self.data.par_iter().map(|&x| x * scalar).collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Element-wise square root
    pub fn sqrt(&self) -> Tensor {
        let result = self.data.par_iter().map(|&x| x.sqrt()).collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Transpose two dimensions (negative indices count from the end)
    ///
    /// ```rust
    /// # use puck::Tensor;
    /// let tensor = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
    /// let transposed = tensor.transpose(0, 1);
    /// assert_eq!(transposed.shape, vec![3, 2]);
    /// assert_eq!(transposed.data, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    /// ```
    pub fn transpose(&self, dim1: isize, dim2: isize) -> Tensor {
        let d1 = self.axis(dim1);
        let d2 = self.axis(dim2);

        let mut new_shape = self.shape.clone();
        new_shape.swap(d1, d2);

        // Walk the output in order, reading from the swapped input strides
        let new_strides = Self::compute_strides(&new_shape);
        let mut old_strides = self.strides.clone();
        old_strides.swap(d1, d2);

        let result: Vec<f32> = (0..self.data.len())
            .into_par_iter()
            .map(|i| {
                let mut remaining = i;
                let mut old_idx = 0;
                for (&stride, &old_stride) in new_strides.iter().zip(&old_strides) {
                    old_idx += (remaining / stride) * old_stride;
                    remaining %= stride;
                }
                self.data[old_idx]
            })
            .collect();

        Tensor::new(result, new_shape)
    }

    /// Replace entries where `mask` is true with `value`
    ///
    /// `mask` covers the trailing two dimensions (`[rows, cols]`, row-major)
    /// and is broadcast over every leading dimension. Causal attention uses
    /// it to write `-inf` into future positions.
    pub fn masked_fill(&self, mask: &[bool], value: f32) -> Tensor {
        assert!(self.shape.len() >= 2, "masked_fill needs at least 2 dims");
        let plane = self.shape[self.shape.len() - 2] * self.shape[self.shape.len() - 1];
        assert_eq!(
            mask.len(),
            plane,
            "Mask length {} doesn't cover trailing dims of {:?}",
            mask.len(),
            self.shape
        );
        let result = self
            .data
            .par_chunks(plane.max(1))
            .flat_map_iter(move |chunk| {
                chunk
                    .iter()
                    .zip(mask)
                    .map(move |(&x, &m)| if m { value } else { x })
            })
            .collect();
        Tensor::new(result, self.shape.clone())
    }

    /// Mean along the last axis, keeping it as size 1 (`[.., n] -> [.., 1]`)
    pub fn mean_last(&self) -> Tensor {
        let cols = self.last_dim().max(1);
        let result: Vec<f32> = self
            .data
            .par_chunks(cols)
            .map(|row| row.iter().sum::<f32>() / cols as f32)
            .collect();
        Tensor::new(result, self.keepdim_shape())
    }

    /// Population variance along the last axis (`[.., n] -> [.., 1]`)
    pub fn var_last(&self) -> Tensor {
        let cols = self.last_dim().max(1);
        let result: Vec<f32> = self
            .data
            .par_chunks(cols)
            .map(|row| {
                let mean = row.iter().sum::<f32>() / cols as f32;
                row.iter().map(|&x| (x - mean) * (x - mean)).sum::<f32>() / cols as f32
            })
            .collect();
        Tensor::new(result, self.keepdim_shape())
    }

    /// Concatenate tensors along the last axis
    ///
    /// All inputs must agree on every leading dimension.
    pub fn concat_last(parts: &[Tensor]) -> Tensor {
        assert!(!parts.is_empty(), "Cannot concatenate zero tensors");
        let lead = &parts[0].shape[..parts[0].shape.len() - 1];
        for part in parts {
            assert_eq!(
                &part.shape[..part.shape.len() - 1],
                lead,
                "Leading dimensions must match for concat: {:?} vs {:?}",
                part.shape,
                parts[0].shape
            );
        }

        let rows: usize = lead.iter().product();
        let width: usize = parts.iter().map(|p| p.last_dim()).sum();
        let mut data = Vec::with_capacity(rows * width);
        for r in 0..rows {
            for part in parts {
                let w = part.last_dim();
                data.extend_from_slice(&part.data[r * w..(r + 1) * w]);
            }
        }

        let mut shape = lead.to_vec();
        shape.push(width);
        Tensor::new(data, shape)
    }

    fn keepdim_shape(&self) -> Vec<usize> {
        let mut shape = self.shape.clone();
        if let Some(last) = shape.last_mut() {
            *last = 1;
        }
        shape
    }

    fn axis(&self, axis: isize) -> usize {
        let ndim = self.shape.len() as isize;
        let pos = if axis < 0 { ndim + axis } else { axis };
        assert!(
            (0..ndim).contains(&pos),
            "Axis {} out of range for shape {:?}",
            axis,
            self.shape
        );
        pos as usize
    }
}

/// Numerically stable softmax of one row
///
/// Shared by [`Tensor::softmax`] and the generator.
pub fn softmax_row(row: &[f32]) -> Vec<f32> {
    let max = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_values: Vec<f32> = row.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exp_values.iter().sum();
    exp_values.into_iter().map(|v| v / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f32], b: &[f32], tol: f32) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < tol, "{} vs {}", x, y);
        }
    }

    #[test]
    fn test_strides() {
        let t = Tensor::zeros(vec![2, 3, 4]);
        assert_eq!(t.strides, vec![12, 4, 1]);
        assert_eq!(t.ndim(), 3);
        assert_eq!(t.last_dim(), 4);
    }

    #[test]
    fn test_matmul_2d() {
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]);
        let b = Tensor::new(vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0], vec![3, 2]);
        let c = a.matmul(&b);
        assert_eq!(c.shape, vec![2, 2]);
        assert_eq!(c.data, vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_parallel_matches_sequential() {
        // 16 x 16 x 16 goes down the blocked path
        let n = 16;
        let a: Vec<f32> = (0..n * n).map(|i| (i % 7) as f32 - 3.0).collect();
        let b: Vec<f32> = (0..n * n).map(|i| (i % 5) as f32 * 0.5).collect();

        let blocked = Tensor::matmul_parallel_blocked(&a, &b, n, n, n);

        let mut naive = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                naive[i * n + j] = (0..n).map(|l| a[i * n + l] * b[l * n + j]).sum();
            }
        }
        assert_close(&blocked, &naive, 1e-4);
    }

    #[test]
    fn test_matmul_3d_by_2d() {
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 1, 2]);
        let w = Tensor::new(vec![1.0, 0.0, 0.0, 1.0], vec![2, 2]);
        let c = a.matmul(&w);
        assert_eq!(c.shape, vec![2, 1, 2]);
        assert_eq!(c.data, a.data);
    }

    #[test]
    fn test_matmul_batched() {
        // Batch 0 multiplies by identity, batch 1 by 2 * identity
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0], vec![2, 2, 2]);
        let b = Tensor::new(vec![1.0, 0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 2.0], vec![2, 2, 2]);
        let c = a.matmul(&b);
        assert_eq!(c.shape, vec![2, 2, 2]);
        assert_eq!(c.data, vec![1.0, 2.0, 3.0, 4.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    #[should_panic(expected = "Matrix dimensions incompatible")]
    fn test_matmul_incompatible_panics() {
        let a = Tensor::zeros(vec![2, 3]);
        let b = Tensor::zeros(vec![2, 3]);
        a.matmul(&b);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0], vec![2, 3]);
        let s = t.softmax();
        for row in s.rows() {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        }
        assert_close(&s.data[3..], &[1.0 / 3.0; 3], 1e-6);
    }

    #[test]
    fn test_softmax_is_stable_for_large_scores() {
        let t = Tensor::new(vec![1000.0, 1001.0, 1002.0], vec![1, 3]);
        let s = t.softmax();
        assert!(s.data.iter().all(|x| x.is_finite()));
        let shifted = Tensor::new(vec![0.0, 1.0, 2.0], vec![1, 3]).softmax();
        assert_close(&s.data, &shifted.data, 1e-6);
    }

    #[test]
    fn test_softmax_neg_infinity_is_exact_zero() {
        let t = Tensor::new(
            vec![0.5, f32::NEG_INFINITY, f32::NEG_INFINITY, 0.1, 0.2, f32::NEG_INFINITY],
            vec![1, 2, 3],
        );
        let s = t.softmax();
        assert_eq!(s.data[0], 1.0);
        assert_eq!(s.data[1], 0.0);
        assert_eq!(s.data[2], 0.0);
        assert_eq!(s.data[5], 0.0);
    }

    #[test]
    fn test_add_broadcasts() {
        let x = Tensor::new(vec![1.0; 12], vec![2, 3, 2]);
        let pos = Tensor::new(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], vec![3, 2]);
        let y = x.add(&pos);
        assert_eq!(&y.data[..6], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(&y.data[6..], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let bias = Tensor::new(vec![10.0, 20.0], vec![2]);
        let z = x.add(&bias);
        assert_eq!(&z.data[..4], &[11.0, 21.0, 11.0, 21.0]);
    }

    #[test]
    fn test_sub_div_keepdim() {
        let x = Tensor::new(vec![1.0, 3.0, 2.0, 6.0], vec![1, 2, 2]);
        let mean = x.mean_last();
        assert_eq!(mean.shape, vec![1, 2, 1]);
        assert_eq!(mean.data, vec![2.0, 4.0]);

        let centered = x.sub(&mean);
        assert_eq!(centered.data, vec![-1.0, 1.0, -2.0, 2.0]);

        let var = x.var_last();
        assert_eq!(var.data, vec![1.0, 4.0]);
        let normed = centered.div(&var.sqrt());
        assert_eq!(normed.data, vec![-1.0, 1.0, -1.0, 1.0]);
    }

    #[test]
    fn test_transpose_last_two_dims() {
        let t = Tensor::new((0..12).map(|i| i as f32).collect(), vec![2, 2, 3]);
        let tt = t.transpose(-2, -1);
        assert_eq!(tt.shape, vec![2, 3, 2]);
        assert_eq!(tt.at(&[1, 2, 0]), t.at(&[1, 0, 2]));
        assert_eq!(tt.at(&[0, 1, 1]), t.at(&[0, 1, 1]));
        assert_eq!(tt.transpose(-1, -2), t);
    }

    #[test]
    fn test_masked_fill_broadcasts_over_batch() {
        let t = Tensor::new(vec![1.0; 8], vec![2, 2, 2]);
        let mask = [false, true, false, false];
        let filled = t.masked_fill(&mask, -5.0);
        assert_eq!(filled.data, vec![1.0, -5.0, 1.0, 1.0, 1.0, -5.0, 1.0, 1.0]);
    }

    #[test]
    fn test_concat_last() {
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2]);
        let b = Tensor::new(vec![5.0, 6.0], vec![2, 1]);
        let c = Tensor::concat_last(&[a, b]);
        assert_eq!(c.shape, vec![2, 3]);
        assert_eq!(c.data, vec![1.0, 2.0, 5.0, 3.0, 4.0, 6.0]);
    }
}
