use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ffi::c_int;

/// Sorted list of unique `(row, col)` index pairs, zero based.
pub type SparsityPattern = Vec<(usize, usize)>;

/// Dense gradient pattern over `nf` fitness rows and `nx` variables, row-major.
pub fn dense_gradient(nf: usize, nx: usize) -> SparsityPattern {
    (0..nf)
        .flat_map(|i| (0..nx).map(move |j| (i, j)))
        .collect()
}

/// Dense lower triangular pattern of an `nx` by `nx` Hessian.
pub fn dense_hessian(nx: usize) -> SparsityPattern {
    (0..nx)
        .flat_map(|i| (0..=i).map(move |j| (i, j)))
        .collect()
}

/// One dense lower triangular Hessian pattern per fitness row.
pub fn dense_hessians(nf: usize, nx: usize) -> Vec<SparsityPattern> {
    vec![dense_hessian(nx); nf]
}

fn check_pattern(sp: &[(usize, usize)], nrows: usize, ncols: usize, what: &str) -> Result<()> {
    for (k, &(i, j)) in sp.iter().enumerate() {
        if i >= nrows || j >= ncols {
            return Err(Error::InvalidSparsity(format!(
                "{} entry ({}, {}) is out of bounds for a {}x{} matrix",
                what, i, j, nrows, ncols
            )));
        }
        if k > 0 && sp[k - 1] >= (i, j) {
            return Err(Error::InvalidSparsity(format!(
                "{} entries must be sorted and unique, found ({}, {}) after {:?}",
                what,
                i,
                j,
                sp[k - 1]
            )));
        }
    }
    Ok(())
}

/// Checks that the gradient pattern is sorted, unique and within `nf` by `nx`.
pub fn check_gradient_sparsity(sp: &[(usize, usize)], nf: usize, nx: usize) -> Result<()> {
    check_pattern(sp, nf, nx, "gradient sparsity")
}

/// Checks one pattern per fitness row, each sorted, unique and lower triangular.
pub fn check_hessians_sparsity(hs: &[SparsityPattern], nf: usize, nx: usize) -> Result<()> {
    if hs.len() != nf {
        return Err(Error::InvalidSparsity(format!(
            "expected {} hessian patterns, one per fitness component, found {}",
            nf,
            hs.len()
        )));
    }
    for (f, sp) in hs.iter().enumerate() {
        let what = format!("hessian sparsity of fitness component {}", f);
        check_pattern(sp, nx, nx, &what)?;
        if let Some(&(i, j)) = sp.iter().find(|(i, j)| j > i) {
            return Err(Error::InvalidSparsity(format!(
                "{} entry ({}, {}) is not in the lower triangle",
                what, i, j
            )));
        }
    }
    Ok(())
}

/// Position of the first constraint entry in a sorted gradient pattern.
///
/// Entries before the split belong to the objective (row 0).
pub fn gradient_split(sp: &[(usize, usize)]) -> usize {
    sp.partition_point(|&e| e < (1, 0))
}

fn by_column(a: &(usize, usize), b: &(usize, usize)) -> Ordering {
    a.1.cmp(&b.1).then(a.0.cmp(&b.0))
}

/// Permutation ordering the entries of `sp` by column, then by row.
///
/// `sp[perm[k]]` is the `k`-th entry in column-major order.
pub fn column_major_permutation(sp: &[(usize, usize)]) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..sp.len()).collect();
    perm.sort_by(|&a, &b| by_column(&sp[a], &sp[b]));
    perm
}

/// Set union of a list of sorted patterns.
pub fn merge_patterns<'a, I>(patterns: I) -> SparsityPattern
where
    I: IntoIterator<Item = &'a SparsityPattern>,
{
    let merged: BTreeSet<(usize, usize)> = patterns.into_iter().flatten().copied().collect();
    merged.into_iter().collect()
}

/// Lagrangian Hessian layout: strict lower triangle sorted by column then
/// row, followed by the complete diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct HessianLayout {
    /// Aggregate lower triangular pattern, row-major.
    pub merged: SparsityPattern,
    /// Indices into `merged` of the off-diagonal entries, column-major.
    pub lower: Vec<usize>,
    /// Order of the matrix.
    pub dim: usize,
}

impl HessianLayout {
    pub fn new(merged: SparsityPattern, dim: usize) -> Self {
        let lower = column_major_permutation(&merged)
            .into_iter()
            .filter(|&k| merged[k].0 != merged[k].1)
            .collect();
        Self { merged, lower, dim }
    }

    /// Number of stored values, diagonal included.
    pub fn nnz(&self) -> usize {
        self.lower.len() + self.dim
    }

    /// One-based `(row, col)` of every stored value in solver order.
    pub fn fortran_indices(&self) -> (Vec<c_int>, Vec<c_int>) {
        let (mut rows, mut cols): (Vec<c_int>, Vec<c_int>) = self
            .lower
            .iter()
            .map(|&k| (fortran(self.merged[k].0), fortran(self.merged[k].1)))
            .unzip();
        for i in 0..self.dim {
            rows.push(fortran(i));
            cols.push(fortran(i));
        }
        (rows, cols)
    }
}

/// Objective and constraint parts of a gradient pattern in solver order.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientLayout {
    /// Number of objective gradient entries.
    pub split: usize,
    /// Column-major permutation of the constraint entries, relative to `split`.
    pub jacobian: Vec<usize>,
}

impl GradientLayout {
    pub fn new(sp: &[(usize, usize)]) -> Self {
        let split = gradient_split(sp);
        Self {
            split,
            jacobian: column_major_permutation(&sp[split..]),
        }
    }

    /// One-based variable index of each objective gradient entry.
    pub fn objective_indices(&self, sp: &[(usize, usize)]) -> Vec<c_int> {
        sp[..self.split].iter().map(|&(_, j)| fortran(j)).collect()
    }

    /// Constraint (row, col) indices, one based, in column-major order.
    ///
    /// Rows are not shifted since row 0 of the fitness gradient is the objective.
    pub fn jacobian_indices(&self, sp: &[(usize, usize)]) -> (Vec<c_int>, Vec<c_int>) {
        let gs = &sp[self.split..];
        self.jacobian
            .iter()
            .map(|&k| (gs[k].0 as c_int, fortran(gs[k].1)))
            .unzip()
    }
}

fn fortran(i: usize) -> c_int {
    (i + 1) as c_int
}
