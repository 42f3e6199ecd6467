//! Integration tests for the sparse matrix

mod common;

use common::{ALL_KERNELS, ALL_KINDS, ALL_ORGANIZATIONS, host_clients, random_matrix, rng, to_dense};
use rand::Rng;
use segmr::prelude::*;
use segmr::segments::LayoutState;

/// 5x5 tridiagonal matrix: 2 on the diagonal, -1 beside it
fn tridiagonal<S: Segments<i32>>(layout: S) -> SparseMatrix<f64, i32, S> {
    let n = 5;
    let mut m = SparseMatrix::with_layout(n, n, layout);
    m.set_row_capacities(&[2, 3, 3, 3, 2]).unwrap();
    for row in 0..n {
        if row > 0 {
            m.set_element(row, row - 1, -1.0).unwrap();
        }
        // diagonal assembled in two steps: 1.5, then 1.5 * 1 + 0.5
        m.set_element(row, row, 1.5).unwrap();
        m.add_element(row, row, 0.5, 1.0).unwrap();
        if row + 1 < n {
            m.set_element(row, row + 1, -1.0).unwrap();
        }
    }
    m
}

#[test]
fn test_tridiagonal_row_sum() {
    let (client, _) = common::create_cpu_client();
    for kind in ALL_KINDS {
        let m = tridiagonal(AnySegments::new(kind, ElementsOrganization::RowMajor));
        assert_eq!(m.nonzeros(), 13);

        let row_two = std::sync::Mutex::new(None);
        m.reduce_rows(
            &client,
            &ScalarKernel,
            2..3,
            |_, _, value| value,
            |a, b| a + b,
            |row, sum| *row_two.lock().unwrap() = Some((row, sum)),
            0.0,
        )
        .unwrap();
        let entries: Vec<_> = m.row(2).unwrap().iter().collect();
        assert_eq!(entries, vec![(1, -1.0), (2, 2.0), (3, -1.0)]);
        let stored: f64 = entries.iter().map(|&(_, value)| value).sum();
        assert_eq!(row_two.into_inner().unwrap(), Some((2, stored)));

        assert_eq!(m.row_sums(&client).unwrap(), vec![1.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(m.trace(&client).unwrap(), 10.0);
    }
}

#[test]
fn test_capacity_enforced_and_duplicates_update() {
    let mut m = tridiagonal(Csr::<i32>::new());
    assert!(matches!(
        m.set_element(0, 4, 1.0),
        Err(Error::RowCapacityExceeded { row: 0, capacity: 2, .. })
    ));
    m.set_element(0, 1, 7.0).unwrap();
    assert_eq!(m.element(0, 1).unwrap(), 7.0);
    assert_eq!(m.row(0).unwrap().nonzeros(), 2);
    assert_eq!(m.element(0, 4).unwrap(), 0.0);
}

#[test]
fn test_vector_product_matches_dense() {
    let mut rng = rng(99);
    let (rows, columns) = (130, 41);
    let x: Vec<f64> = (0..columns).map(|_| rng.random_range(-2.0..2.0)).collect();
    for kind in ALL_KINDS {
        for organization in ALL_ORGANIZATIONS {
            let m = random_matrix(&mut rng, kind, organization, rows, columns);
            let dense = to_dense(&m);
            let expected: Vec<f64> = dense
                .iter()
                .map(|row| row.iter().zip(&x).map(|(a, b)| a * b).sum())
                .collect();
            for ctx in host_clients() {
                for kernel in ALL_KERNELS {
                    let mut out = vec![0.0; rows];
                    m.vector_product(&ctx, &x, &mut out, kernel).unwrap();
                    common::assert_allclose_f64(
                        &out,
                        &expected,
                        1e-12,
                        1e-12,
                        &format!("{kind} {organization} {kernel}"),
                    );
                }
            }
        }
    }
}

#[test]
fn test_row_reduce_builtins() {
    let m = SparseMatrix::<f64, u32, SlicedEllpack<u32>>::from_triplets(
        3,
        4,
        &[(0, 0, -3.0), (0, 3, 2.0), (2, 1, -1.0)],
    )
    .unwrap();
    let (client, _) = common::create_cpu_client();
    let mut out = vec![0.0; 3];

    m.row_reduce(&client, SegmentReduction::max(), &[], &mut out, KernelKind::Vector)
        .unwrap();
    assert_eq!(out, vec![2.0, f64::NEG_INFINITY, -1.0]);

    m.row_reduce(&client, SegmentReduction::abs_sum(), &[], &mut out, KernelKind::Hybrid)
        .unwrap();
    assert_eq!(out, vec![5.0, 0.0, 1.0]);

    let reduction = SegmentReduction::new(FetchKind::ValueTimesVector, ReduceOp::Min);
    m.row_reduce(&client, reduction, &[1.0, 1.0, 1.0, -1.0], &mut out, KernelKind::Scalar)
        .unwrap();
    assert_eq!(out, vec![-3.0, f64::INFINITY, -1.0]);
}

#[test]
fn test_shape_checks() {
    let m = tridiagonal(Ellpack::<i32>::new(ElementsOrganization::ColumnMajor));
    let (client, _) = common::create_cpu_client();
    let mut out = vec![0.0; 5];
    assert!(matches!(
        m.vector_product(&client, &[1.0; 4], &mut out, KernelKind::Scalar),
        Err(Error::ShapeMismatch { expected: 5, got: 4 })
    ));
    let mut short = vec![0.0; 4];
    assert!(matches!(
        m.vector_product(&client, &[1.0; 5], &mut short, KernelKind::Scalar),
        Err(Error::ShapeMismatch { expected: 5, got: 4 })
    ));
}

#[test]
fn test_for_all_rows_sees_every_row() {
    let m = tridiagonal(BiEllpack::<i32>::new(ElementsOrganization::RowMajor));
    let (client, _) = common::create_cpu_client();
    let seen = std::sync::Mutex::new(Vec::new());
    m.for_all_rows(&client, |row| {
        seen.lock()
            .unwrap()
            .push((row.index(), row.capacity(), row.nonzeros()));
    })
    .unwrap();
    let mut seen = seen.into_inner().unwrap();
    seen.sort_unstable();
    assert_eq!(
        seen,
        vec![(0, 2, 2), (1, 3, 3), (2, 3, 3), (3, 3, 3), (4, 2, 2)]
    );
}

#[test]
fn test_lifecycle_states() {
    let mut m = SparseMatrix::<f32, i32>::new(2, 2);
    assert_eq!(m.state(), LayoutState::Uninitialized);
    assert!(m.row_sums(&CpuClient::sequential()).is_err());
    m.set_row_capacities(&[1, 0]).unwrap();
    assert_eq!(m.state(), LayoutState::Ready);
    assert_eq!(m.residency(), segmr::runtime::Residency::Host);
    m.reset();
    assert_eq!(m.state(), LayoutState::Uninitialized);
}

#[test]
fn test_narrow_index_rejects_wide_columns() {
    let mut m = SparseMatrix::<f64, i32>::new(1, usize::MAX);
    assert!(matches!(
        m.set_row_capacities(&[1]),
        Err(Error::IndexOverflow { .. })
    ));
}
