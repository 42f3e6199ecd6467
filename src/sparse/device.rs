//! Sparse matrix resident on a CUDA device

use cudarc::driver::{DeviceRepr, ValidAsZeroBits};

use super::SparseMatrix;
use crate::dtype::{Element, SegmentIndex};
use crate::error::{Error, Result};
use crate::runtime::cuda::{CudaBuffer, CudaClient};
use crate::runtime::cuda::kernels::{
    DeviceGeometry, SegmentedKernelSpec, SegmentedLaunch, launch_segmented_reduce,
};
use crate::runtime::{Residency, WARP_SIZE};
use crate::segments::kernels::{KernelKind, SegmentReduction, hybrid_threads_per_segment};
use crate::segments::{KernelGeometry, LayoutState, Segments, SegmentsKind, SegmentsView};

/// Device copy of a [`SparseMatrix`]
///
/// Holds the layout metadata, column indexes and values in device memory.
/// Reductions run the generated kernels for the layout and return results
/// to the host explicitly. CSR and Ellpack layouts have device kernels.
pub struct DeviceSparseMatrix<T, I>
where
    T: Element + DeviceRepr,
    I: SegmentIndex + DeviceRepr,
{
    client: CudaClient,
    geometry: DeviceGeometry,
    kind: SegmentsKind,
    rows: usize,
    columns: usize,
    width: usize,
    stride: usize,
    total_size: usize,
    meta: CudaBuffer<I>,
    column_indexes: CudaBuffer<I>,
    values: CudaBuffer<T>,
}

impl<T, I> DeviceSparseMatrix<T, I>
where
    T: Element + DeviceRepr + ValidAsZeroBits,
    I: SegmentIndex + DeviceRepr + ValidAsZeroBits,
{
    /// Copy a host matrix to the client's device
    ///
    /// # Errors
    ///
    /// - `NotInitialized` if the matrix is not ready
    /// - `UnsupportedOperation` for layouts or value types without a device
    ///   kernel
    /// - `TransferFailure` if a copy fails part way
    pub fn upload<S: Segments<I>>(client: &CudaClient, matrix: &SparseMatrix<T, I, S>) -> Result<Self> {
        if matrix.state() != LayoutState::Ready {
            return Err(Error::NotInitialized {
                what: "sparse matrix",
            });
        }
        if !T::DTYPE.is_float() {
            return Err(Error::unsupported(
                "cuda",
                "upload",
                format!("value type {} (device kernels use f32 or f64)", T::DTYPE),
            ));
        }

        let segments = matrix.segments();
        let kind = segments.kind();
        let (geometry, meta, width, stride) = match segments.kernel_geometry() {
            Some(KernelGeometry::Offsets(offsets)) => (DeviceGeometry::Csr, offsets, 0, 0),
            Some(KernelGeometry::Padded {
                sizes,
                width,
                stride,
                organization,
            }) => (DeviceGeometry::Ellpack(organization), sizes, width, stride),
            None => {
                return Err(Error::unsupported(
                    "cuda",
                    "upload",
                    format!("{kind} layout has no device kernel"),
                ));
            }
        };

        let total_size = segments.view().total_size();
        tracing::debug!(
            layout = %kind,
            rows = matrix.rows(),
            storage = matrix.values().len(),
            device = client.device.index,
            "uploading sparse matrix"
        );

        Ok(Self {
            client: client.clone(),
            geometry,
            kind,
            rows: matrix.rows(),
            columns: matrix.columns(),
            width,
            stride,
            total_size,
            meta: client.upload(meta)?,
            column_indexes: client.upload(matrix.column_indexes())?,
            values: client.upload(matrix.values())?,
        })
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Layout of the uploaded matrix
    pub fn kind(&self) -> SegmentsKind {
        self.kind
    }

    /// Where the buffers live
    pub fn residency(&self) -> Residency {
        self.values.residency()
    }

    fn threads_per_segment(&self, kernel: KernelKind) -> usize {
        match kernel {
            KernelKind::Scalar => 1,
            KernelKind::Vector => WARP_SIZE,
            KernelKind::Hybrid => hybrid_threads_per_segment(self.total_size, self.rows, WARP_SIZE),
        }
    }

    /// Apply a built-in reduction to every row on the device
    ///
    /// `x` must be given (with `columns` entries) when the reduction reads a
    /// vector. The result stays on the device.
    pub fn reduce_rows(
        &self,
        reduction: SegmentReduction,
        x: Option<&CudaBuffer<T>>,
        kernel: KernelKind,
    ) -> Result<CudaBuffer<T>> {
        let placeholder;
        let x = match x {
            Some(x) => {
                if x.len() != self.columns {
                    return Err(Error::shape_mismatch(self.columns, x.len()));
                }
                x
            }
            None if reduction.fetch.needs_vector() => {
                return Err(Error::invalid_argument(
                    "x",
                    format!("{reduction} reads an input vector"),
                ));
            }
            None => {
                placeholder = self.client.alloc_zeros::<T>(0)?;
                &placeholder
            }
        };

        let spec = SegmentedKernelSpec {
            geometry: self.geometry,
            fetch: reduction.fetch,
            op: reduction.op,
            threads_per_segment: self.threads_per_segment(kernel),
            value: T::DTYPE,
        };
        let mut out = self.client.alloc_zeros::<T>(self.rows)?;
        launch_segmented_reduce::<I, T>(
            &self.client,
            &spec,
            SegmentedLaunch {
                meta: &self.meta.slice,
                columns: &self.column_indexes.slice,
                values: &self.values.slice,
                x: &x.slice,
                out: &mut out.slice,
                first: 0,
                last: self.rows,
                width: self.width,
                stride: self.stride,
            },
        )?;
        Ok(out)
    }

    /// `A x`, copied back to the host
    pub fn vector_product(&self, x: &[T], kernel: KernelKind) -> Result<Vec<T>> {
        if x.len() != self.columns {
            return Err(Error::shape_mismatch(self.columns, x.len()));
        }
        let x = self.client.upload(x)?;
        let out = self.reduce_rows(SegmentReduction::dot(), Some(&x), kernel)?;
        self.client.download_vec(&out)
    }

    /// Row sums, copied back to the host
    pub fn row_sums(&self, kernel: KernelKind) -> Result<Vec<T>> {
        let out = self.reduce_rows(SegmentReduction::sum(), None, kernel)?;
        self.client.download_vec(&out)
    }

    /// Copy the values back into a host buffer
    pub fn download_values(&self) -> Result<Vec<T>> {
        self.client.download_vec(&self.values)
    }
}
