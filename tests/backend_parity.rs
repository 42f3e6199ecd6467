//! CPU/CUDA parity for the built-in row reductions
//!
//! Skipped when the crate is built without `cuda` or no device is present.

#[cfg(feature = "cuda")]
mod common;

#[cfg(feature = "cuda")]
mod cuda_parity {
    use super::common::{
        ALL_KERNELS, ALL_ORGANIZATIONS, assert_allclose_f64, create_cpu_client, create_cuda_client,
        random_matrix, rng,
    };
    use rand::Rng;
    use segmr::prelude::*;

    #[test]
    fn test_vector_product_matches_host() {
        let Some((cuda, _)) = create_cuda_client() else {
            eprintln!("no CUDA device, skipping");
            return;
        };
        let (cpu, _) = create_cpu_client();
        let mut rng = rng(1234);
        let (rows, columns) = (700, 64);
        let x: Vec<f64> = (0..columns).map(|_| rng.random_range(-1.0..1.0)).collect();

        for kind in [SegmentsKind::Csr, SegmentsKind::Ellpack] {
            for organization in ALL_ORGANIZATIONS {
                let m = random_matrix(&mut rng, kind, organization, rows, columns);
                let device = DeviceSparseMatrix::upload(&cuda, &m).unwrap();
                for kernel in ALL_KERNELS {
                    let mut host = vec![0.0; rows];
                    m.vector_product(&cpu, &x, &mut host, kernel).unwrap();
                    let gpu = device.vector_product(&x, kernel).unwrap();
                    assert_allclose_f64(
                        &gpu,
                        &host,
                        1e-12,
                        1e-12,
                        &format!("{kind} {organization} {kernel}"),
                    );
                }
            }
        }
    }

    #[test]
    fn test_row_max_matches_host() {
        let Some((cuda, _)) = create_cuda_client() else {
            return;
        };
        let (cpu, _) = create_cpu_client();
        let mut rng = rng(77);
        let m = random_matrix(
            &mut rng,
            SegmentsKind::Ellpack,
            ElementsOrganization::ColumnMajor,
            300,
            20,
        );
        let device = DeviceSparseMatrix::upload(&cuda, &m).unwrap();
        for kernel in ALL_KERNELS {
            let mut host = vec![0.0; m.rows()];
            m.row_reduce(&cpu, SegmentReduction::max(), &[], &mut host, kernel)
                .unwrap();
            let gpu = device.reduce_rows(SegmentReduction::max(), None, kernel).unwrap();
            assert_eq!(cuda.download_vec(&gpu).unwrap(), host, "{kernel}");
        }
    }

    #[test]
    fn test_unsupported_layout_reported() {
        let Some((cuda, _)) = create_cuda_client() else {
            return;
        };
        let m = SparseMatrix::<f64, i32, BiEllpack<i32>>::with_row_capacities(2, 2, &[1, 1])
            .unwrap();
        assert!(matches!(
            DeviceSparseMatrix::upload(&cuda, &m),
            Err(Error::UnsupportedOperation { .. })
        ));
    }
}
