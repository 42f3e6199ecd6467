//! Common test utilities
#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use segmr::prelude::*;

/// Every layout variant
pub const ALL_KINDS: [SegmentsKind; 4] = [
    SegmentsKind::Csr,
    SegmentsKind::Ellpack,
    SegmentsKind::SlicedEllpack,
    SegmentsKind::BiEllpack,
];

/// Both slot placements
pub const ALL_ORGANIZATIONS: [ElementsOrganization; 2] =
    [ElementsOrganization::RowMajor, ElementsOrganization::ColumnMajor];

/// Every reduction kernel
pub const ALL_KERNELS: [KernelKind; 3] = [KernelKind::Scalar, KernelKind::Vector, KernelKind::Hybrid];

/// Create a CPU client through the runtime, like applications do
pub fn create_cpu_client() -> (CpuClient, CpuDevice) {
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device).expect("cpu client");
    (client, device)
}

/// Sequential client plus a pool with small chunks, so parallel paths
/// actually split the work
pub fn host_clients() -> Vec<CpuClient> {
    let parallel = CpuClient::with_parallelism(
        CpuDevice::new(),
        ParallelismConfig::threads(4).with_min_len(1),
    )
    .expect("thread pool");
    vec![CpuClient::sequential(), parallel]
}

/// Seeded generator so failures reproduce
pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// `count` segment sizes in `0..=max`, with a few long outliers
pub fn random_sizes(rng: &mut StdRng, count: usize, max: u32) -> Vec<i32> {
    (0..count)
        .map(|_| {
            if rng.random_range(0..10) == 0 {
                rng.random_range(0..=max * 8) as i32
            } else {
                rng.random_range(0..=max) as i32
            }
        })
        .collect()
}

/// Layout of `kind` built from `sizes`
pub fn layout(
    kind: SegmentsKind,
    organization: ElementsOrganization,
    sizes: &[i32],
) -> AnySegments<i32> {
    AnySegments::with_sizes(kind, organization, sizes).expect("layout")
}

/// Random matrix of the given layout, each row filled to capacity with
/// distinct columns
pub fn random_matrix(
    rng: &mut StdRng,
    kind: SegmentsKind,
    organization: ElementsOrganization,
    rows: usize,
    columns: usize,
) -> SparseMatrix<f64, i32, AnySegments<i32>> {
    let capacities: Vec<i32> = (0..rows)
        .map(|_| rng.random_range(0..=columns.min(12)) as i32)
        .collect();
    let mut m = SparseMatrix::with_layout(rows, columns, AnySegments::new(kind, organization));
    m.set_row_capacities(&capacities).expect("capacities");
    for (row, &capacity) in capacities.iter().enumerate() {
        let start = rng.random_range(0..columns);
        for k in 0..capacity as usize {
            let value = rng.random_range(-1.0..1.0);
            m.set_element(row, (start + k) % columns, value)
                .expect("slot within capacity");
        }
    }
    m
}

/// Dense reference of a matrix
pub fn to_dense<S: Segments<i32>>(m: &SparseMatrix<f64, i32, S>) -> Vec<Vec<f64>> {
    let mut dense = vec![vec![0.0; m.columns()]; m.rows()];
    for e in m.elements() {
        if let Some(column) = e.column {
            dense[e.row][column] += e.value;
        }
    }
    dense
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Create a CUDA client and device, returning None if CUDA is unavailable
#[cfg(feature = "cuda")]
pub fn create_cuda_client() -> Option<(CudaClient, CudaDevice)> {
    if !segmr::runtime::cuda::is_cuda_available() {
        return None;
    }
    let device = CudaDevice::new(0);
    let client = CudaRuntime::default_client(&device).ok()?;
    Some((client, device))
}
