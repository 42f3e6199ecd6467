//! Generated segment reduction kernels
//!
//! One CUDA C template covers Scalar, Vector and Hybrid scheduling: `TPS`
//! threads cooperate on a segment (1 for Scalar, 32 for Vector, the hybrid
//! choice otherwise). Lane `k` of a segment group accumulates local slots
//! `k, k + TPS, ...`; the partials are combined with `__shfl_down_sync` in
//! `log2(TPS)` steps, matching the host kernels' combine tree.
//!
//! The segment loop is warp-uniform so every lane of a warp reaches the
//! shuffle together, even when the last warp runs past `last`.

use cudarc::driver::safe::CudaSlice;
use cudarc::driver::{DeviceRepr, PushKernelArg};

use super::loader::{get_kernel_function, get_or_compile_module, launch_config};
use crate::dtype::{DType, SegmentIndex};
use crate::error::{Error, Result};
use crate::runtime::WARP_SIZE;
use crate::runtime::cuda::CudaClient;
use crate::segments::ElementsOrganization;
use crate::segments::kernels::{FetchKind, ReduceOp};

const KERNEL_NAME: &str = "segmr_reduce";

/// Geometry families the device kernels understand
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum DeviceGeometry {
    /// `meta` holds `segments + 1` offsets
    Csr,
    /// `meta` holds logical sizes; `width` slots per segment
    Ellpack(ElementsOrganization),
}

impl DeviceGeometry {
    fn tag(self) -> &'static str {
        match self {
            Self::Csr => "csr",
            Self::Ellpack(ElementsOrganization::RowMajor) => "ellrm",
            Self::Ellpack(ElementsOrganization::ColumnMajor) => "ellcm",
        }
    }

    fn macros(self) -> &'static str {
        match self {
            Self::Csr => {
                "#define SEG_BEGIN(s) ((long long)meta[s])\n\
                 #define SEG_CAP(s) ((long long)meta[(s) + 1] - (long long)meta[s])\n\
                 #define SEG_SIZE(s) SEG_CAP(s)\n\
                 #define SEG_STEP 1LL\n"
            }
            Self::Ellpack(ElementsOrganization::RowMajor) => {
                "#define SEG_BEGIN(s) ((s) * width)\n\
                 #define SEG_CAP(s) (width)\n\
                 #define SEG_SIZE(s) ((long long)meta[s])\n\
                 #define SEG_STEP 1LL\n"
            }
            Self::Ellpack(ElementsOrganization::ColumnMajor) => {
                "#define SEG_BEGIN(s) (s)\n\
                 #define SEG_CAP(s) (width)\n\
                 #define SEG_SIZE(s) ((long long)meta[s])\n\
                 #define SEG_STEP (stride)\n"
            }
        }
    }
}

/// Everything that determines a generated kernel's source
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct SegmentedKernelSpec {
    pub geometry: DeviceGeometry,
    pub fetch: FetchKind,
    pub op: ReduceOp,
    pub threads_per_segment: usize,
    pub value: DType,
}

impl SegmentedKernelSpec {
    fn value_type(&self) -> Result<&'static str> {
        match self.value {
            DType::F32 => Ok("float"),
            DType::F64 => Ok("double"),
            other => Err(Error::unsupported(
                "cuda",
                "segment reduction",
                format!("value type {other} (only f32 and f64 kernels are generated)"),
            )),
        }
    }

    fn infinity(&self) -> &'static str {
        match self.value {
            DType::F32 => "__int_as_float(0x7f800000)",
            _ => "__longlong_as_double(0x7ff0000000000000LL)",
        }
    }

    fn neg_infinity(&self) -> &'static str {
        match self.value {
            DType::F32 => "__int_as_float((int)0xff800000u)",
            _ => "__longlong_as_double((long long)0xfff0000000000000ULL)",
        }
    }

    /// Unique module name for this spec and index type
    pub(crate) fn module_name<I: SegmentIndex>(&self) -> String {
        format!(
            "segmr_{}_{}_{}_{}_{}_t{}",
            self.geometry.tag(),
            self.value,
            I::DTYPE,
            self.op.name(),
            self.fetch.name(),
            self.threads_per_segment
        )
    }

    /// CUDA C source for this spec
    pub(crate) fn source<I: SegmentIndex>(&self) -> Result<String> {
        let tps = self.threads_per_segment;
        if !tps.is_power_of_two() || tps > WARP_SIZE {
            return Err(Error::invalid_argument(
                "threads_per_segment",
                format!("{tps} is not a power of two in [1, {WARP_SIZE}]"),
            ));
        }

        let val = self.value_type()?;
        let idx = I::CUDA_TYPE;
        let pad = format!("(({idx}){}{})", I::padding(), I::CUDA_SUFFIX);

        let identity = match self.op {
            ReduceOp::Sum => format!("(({val})0)"),
            ReduceOp::Max => self.neg_infinity().to_string(),
            ReduceOp::Min => self.infinity().to_string(),
        };
        // Same comparison as ReduceOp::combine, so NaN is handled alike on
        // host and device.
        let reduce = match self.op {
            ReduceOp::Sum => "((a) + (b))",
            ReduceOp::Max => "((b) > (a) ? (b) : (a))",
            ReduceOp::Min => "((b) < (a) ? (b) : (a))",
        };
        let fetch = match self.fetch {
            FetchKind::Value => "values[g]",
            FetchKind::ValueTimesVector => "values[g] * x[(long long)col]",
            FetchKind::AbsValue => "fabs(values[g])",
        };

        Ok(format!(
            r#"typedef {val} VAL;
typedef {idx} IDX;
#define TPS {tps}
#define PAD_COL {pad}
#define IDENTITY {identity}
#define REDUCE(a, b) {reduce}
{macros}
extern "C" __global__ void {KERNEL_NAME}(
    const IDX* __restrict__ meta,
    const IDX* __restrict__ columns,
    const VAL* __restrict__ values,
    const VAL* __restrict__ x,
    VAL* __restrict__ out,
    long long first,
    long long last,
    long long width,
    long long stride)
{{
    const long long tid = (long long)blockIdx.x * blockDim.x + threadIdx.x;
    const int lane = threadIdx.x % TPS;
    const long long group = (threadIdx.x % {warp}) / TPS;
    const long long groups_per_warp = {warp} / TPS;
    const long long warp_id = tid / {warp};
    const long long total_warps = ((long long)gridDim.x * blockDim.x) / {warp};

    for (long long base = first + warp_id * groups_per_warp; base < last;
         base += total_warps * groups_per_warp) {{
        const long long s = base + group;
        VAL acc = IDENTITY;
        if (s < last) {{
            const long long begin = SEG_BEGIN(s);
            const long long cap = SEG_CAP(s);
            const long long size = SEG_SIZE(s);
            for (long long l = lane; l < cap; l += TPS) {{
                const long long g = begin + l * SEG_STEP;
                const IDX col = columns[g];
                VAL v = IDENTITY;
                if (l < size && col != PAD_COL) {{
                    v = {fetch};
                }}
                acc = REDUCE(acc, v);
            }}
        }}
        for (int off = TPS / 2; off > 0; off >>= 1) {{
            VAL other = __shfl_down_sync(0xffffffffu, acc, off, TPS);
            acc = REDUCE(acc, other);
        }}
        if (s < last && lane == 0) {{
            out[s] = acc;
        }}
    }}
}}
"#,
            macros = self.geometry.macros(),
            warp = WARP_SIZE,
        ))
    }
}

/// Device-side inputs of one reduction launch
pub(crate) struct SegmentedLaunch<'a, I: DeviceRepr, T: DeviceRepr> {
    pub meta: &'a CudaSlice<I>,
    pub columns: &'a CudaSlice<I>,
    pub values: &'a CudaSlice<T>,
    pub x: &'a CudaSlice<T>,
    pub out: &'a mut CudaSlice<T>,
    pub first: usize,
    pub last: usize,
    pub width: usize,
    pub stride: usize,
}

/// Compile (or fetch from cache) and launch a segment reduction
///
/// Synchronizes the client's stream before returning, so `out` is readable.
pub(crate) fn launch_segmented_reduce<I, T>(
    client: &CudaClient,
    spec: &SegmentedKernelSpec,
    args: SegmentedLaunch<'_, I, T>,
) -> Result<()>
where
    I: SegmentIndex + DeviceRepr,
    T: DeviceRepr,
{
    if args.first >= args.last {
        return Ok(());
    }

    let name = spec.module_name::<I>();
    let source = spec.source::<I>()?;
    let module = get_or_compile_module(&client.context, client.device.index, &name, || source)?;
    let func = get_kernel_function(&module, KERNEL_NAME)?;

    let segments = args.last - args.first;
    let cfg = launch_config(segments * spec.threads_per_segment);
    let first = args.first as i64;
    let last = args.last as i64;
    let width = args.width as i64;
    let stride = args.stride as i64;

    let mut builder = client.stream.launch_builder(&func);
    builder.arg(args.meta);
    builder.arg(args.columns);
    builder.arg(args.values);
    builder.arg(args.x);
    builder.arg(args.out);
    builder.arg(&first);
    builder.arg(&last);
    builder.arg(&width);
    builder.arg(&stride);

    // SAFETY: argument order and types match the generated signature; every
    // global index the kernel forms is below the layout's storage size, which
    // is the length of `columns` and `values`.
    unsafe { builder.launch(cfg) }
        .map_err(|e| Error::Backend(format!("segment reduction launch failed: {e:?}")))?;

    client.stream.synchronize()?;
    Ok(())
}
