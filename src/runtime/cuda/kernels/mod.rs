//! CUDA kernel generation, loading and launching

pub(crate) mod loader;
pub(crate) mod segmented;

pub(crate) use segmented::{
    DeviceGeometry, SegmentedKernelSpec, SegmentedLaunch, launch_segmented_reduce,
};
