//! Minimum-cost one-to-one assignment (Hungarian / Kuhn-Munkres) for
//! rectangular cost matrices.

/// Cost used in place of NaN or infinite entries.
const NON_FINITE_COST: f64 = 1e12;

/// Assigns rows to columns minimising the summed cost.
///
/// Returns one entry per row: `Some(column)` for matched rows, `None` when
/// there are more rows than columns and the row was left over. No column is
/// used twice.
pub fn solve(cost: &[Vec<f64>]) -> Vec<Option<usize>> {
    let rows = cost.len();
    let cols = cost.iter().map(Vec::len).min().unwrap_or(0);
    if rows == 0 || cols == 0 {
        return vec![None; rows];
    }

    let cell = |r: usize, c: usize| {
        let v = cost[r][c];
        if v.is_finite() {
            v
        } else {
            NON_FINITE_COST
        }
    };

    if rows <= cols {
        let matrix: Vec<Vec<f64>> = (0..rows).map(|r| (0..cols).map(|c| cell(r, c)).collect()).collect();
        hungarian(&matrix).into_iter().map(Some).collect()
    } else {
        let transposed: Vec<Vec<f64>> = (0..cols).map(|c| (0..rows).map(|r| cell(r, c)).collect()).collect();
        let mut assignment = vec![None; rows];
        for (col, row) in hungarian(&transposed).into_iter().enumerate() {
            assignment[row] = Some(col);
        }
        assignment
    }
}

/// Potentials-based Hungarian algorithm. Requires `n <= m`; returns the
/// column chosen for each row.
fn hungarian(a: &[Vec<f64>]) -> Vec<usize> {
    let n = a.len();
    let m = a[0].len();

    // 1-based: column 0 and row 0 are sentinels.
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; m + 1];
    let mut p = vec![0usize; m + 1];
    let mut way = vec![0usize; m + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0;
        let mut minv = vec![f64::INFINITY; m + 1];
        let mut used = vec![false; m + 1];

        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;

            for j in 1..=m {
                if used[j] {
                    continue;
                }
                let cur = a[i0 - 1][j - 1] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }

            for j in 0..=m {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }

            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0; n];
    for j in 1..=m {
        if p[j] != 0 {
            assignment[p[j] - 1] = j - 1;
        }
    }
    assignment
}
