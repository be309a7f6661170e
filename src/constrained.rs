/// Tests equality constraints against their tolerances.
///
/// Returns the number of satisfied constraints and the 2-norm of the
/// violations of the unsatisfied ones.
pub fn test_eq_constraints(c: &[f64], tol: &[f64]) -> (usize, f64) {
    let mut n = 0;
    let mut sqsum = 0.0;
    for (&ci, &ti) in c.iter().zip(tol) {
        if ci.abs() <= ti {
            n += 1;
        } else {
            sqsum += ci * ci;
        }
    }
    (n, f64::sqrt(sqsum))
}

/// Tests inequality constraints (`c <= 0`) against their tolerances.
pub fn test_ineq_constraints(c: &[f64], tol: &[f64]) -> (usize, f64) {
    let mut n = 0;
    let mut sqsum = 0.0;
    for (&ci, &ti) in c.iter().zip(tol) {
        if ci <= ti {
            n += 1;
        } else {
            sqsum += ci * ci;
        }
    }
    (n, f64::sqrt(sqsum))
}

/// Summary of the constraint violations of a fitness vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    /// Number of violated constraints.
    pub violated: usize,
    /// Sum of the equality and inequality violation norms.
    pub norm: f64,
    pub feasible: bool,
}

/// Computes the violation summary of a single objective fitness vector.
pub fn violation(f: &[f64], n_eq: usize, tol: &[f64]) -> Violation {
    let nc = f.len() - 1;
    let (eq, ineq) = f[1..].split_at(n_eq);
    let (tol_eq, tol_ineq) = tol.split_at(n_eq);

    let (n_eq_ok, eq_norm) = test_eq_constraints(eq, tol_eq);
    let (n_ineq_ok, ineq_norm) = test_ineq_constraints(ineq, tol_ineq);
    let violated = nc - n_eq_ok - n_ineq_ok;
    Violation {
        violated,
        norm: eq_norm + ineq_norm,
        feasible: violated == 0,
    }
}

/// Returns true if all constraints of `f` are satisfied.
pub fn feasibility_f(f: &[f64], n_eq: usize, tol: &[f64]) -> bool {
    violation(f, n_eq, tol).feasible
}

/// Returns true if `f1` is strictly better than `f2`.
///
/// The fitness with more satisfied constraints wins. With the same number
/// of satisfied constraints, infeasible points are ranked by violation norm
/// and feasible ones (or equally violated ones) by objective.
pub fn compare_fc(f1: &[f64], f2: &[f64], n_eq: usize, tol: &[f64]) -> bool {
    let nc = f1.len() - 1;
    if nc == 0 {
        return f1[0] < f2[0];
    }
    let (eq1, ineq1) = f1[1..].split_at(n_eq);
    let (eq2, ineq2) = f2[1..].split_at(n_eq);
    let (tol_eq, tol_ineq) = tol.split_at(n_eq);

    let (ne1, le1) = test_eq_constraints(eq1, tol_eq);
    let (ni1, li1) = test_ineq_constraints(ineq1, tol_ineq);
    let (ne2, le2) = test_eq_constraints(eq2, tol_eq);
    let (ni2, li2) = test_ineq_constraints(ineq2, tol_ineq);

    let (n1, n2) = (ne1 + ni1, ne2 + ni2);
    let (l1, l2) = (
        f64::sqrt(le1 * le1 + li1 * li1),
        f64::sqrt(le2 * le2 + li2 * li2),
    );
    if n1 == n2 {
        if n1 == nc || l1 == l2 {
            f1[0] < f2[0]
        } else {
            l1 < l2
        }
    } else {
        n1 > n2
    }
}
