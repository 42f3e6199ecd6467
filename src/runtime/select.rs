//! Device selection from strings or indices

use crate::error::{Error, Result};
use crate::runtime::cpu::{CpuClient, CpuDevice, ParallelismConfig};
use std::fmt;
use std::str::FromStr;

/// Which backend and device the surrounding application asked for
///
/// Parsed from `"cpu"`, `"cpu:seq"`, `"cuda"` or `"cuda:N"`; a bare index
/// converts to the matching CUDA device.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum DeviceSpec {
    /// Host, multi-threaded when the `rayon` feature is enabled
    #[default]
    Cpu,
    /// Host, sequential reference loop
    Sequential,
    /// CUDA device by index
    Cuda(usize),
}

impl DeviceSpec {
    /// Returns true for host backends
    pub fn is_host(&self) -> bool {
        matches!(self, Self::Cpu | Self::Sequential)
    }

    /// Check that the selected device can be used in this build and process
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` for a CUDA device when the crate was built without
    /// the `cuda` feature, when no driver is loaded, or when the index is past
    /// the number of installed devices.
    pub fn ensure_available(&self) -> Result<()> {
        match *self {
            Self::Cpu | Self::Sequential => Ok(()),
            #[cfg(not(feature = "cuda"))]
            Self::Cuda(_) => Err(Error::device_unavailable(
                self,
                "built without the `cuda` feature",
            )),
            #[cfg(feature = "cuda")]
            Self::Cuda(index) => {
                let count = crate::runtime::cuda::device_count()
                    .map_err(|e| Error::device_unavailable(self, e.to_string()))?;
                if index >= count {
                    return Err(Error::device_unavailable(
                        self,
                        format!("only {count} CUDA device(s) present"),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Build the host client for `Cpu` or `Sequential`
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if this names a CUDA device.
    pub fn cpu_client(&self) -> Result<CpuClient> {
        match self {
            Self::Cpu => Ok(CpuClient::new(CpuDevice::new())),
            Self::Sequential => {
                CpuClient::with_parallelism(CpuDevice::new(), ParallelismConfig::sequential())
            }
            Self::Cuda(_) => Err(Error::invalid_argument(
                "device",
                format!("{self} is not a host device"),
            )),
        }
    }

    /// Build the CUDA client for a `Cuda` spec
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for host specs, `DeviceUnavailable` if the device
    /// cannot be opened.
    #[cfg(feature = "cuda")]
    pub fn cuda_client(&self) -> Result<crate::runtime::cuda::CudaClient> {
        use crate::runtime::cuda::{CudaClient, CudaDevice};

        match *self {
            Self::Cuda(index) => {
                self.ensure_available()?;
                CudaClient::new(CudaDevice::new(index))
            }
            _ => Err(Error::invalid_argument(
                "device",
                format!("{self} is not a CUDA device"),
            )),
        }
    }
}

impl FromStr for DeviceSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let spec = s.trim().to_ascii_lowercase();
        match spec.as_str() {
            "cpu" | "host" => Ok(Self::Cpu),
            "cpu:seq" | "seq" | "sequential" => Ok(Self::Sequential),
            "cuda" | "gpu" => Ok(Self::Cuda(0)),
            other => {
                let index = other
                    .strip_prefix("cuda:")
                    .or_else(|| other.strip_prefix("gpu:"))
                    .ok_or_else(|| {
                        Error::invalid_argument("device", format!("unknown device '{s}'"))
                    })?;
                index.parse::<usize>().map(Self::Cuda).map_err(|_| {
                    Error::invalid_argument("device", format!("invalid device index in '{s}'"))
                })
            }
        }
    }
}

impl From<usize> for DeviceSpec {
    fn from(index: usize) -> Self {
        Self::Cuda(index)
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Sequential => f.write_str("cpu:seq"),
            Self::Cuda(index) => write!(f, "cuda:{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_specs() {
        assert_eq!("cpu".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cpu);
        assert_eq!(" CPU:SEQ ".parse::<DeviceSpec>().unwrap(), DeviceSpec::Sequential);
        assert_eq!("cuda".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cuda(0));
        assert_eq!("cuda:3".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cuda(3));
        assert!("cuda:x".parse::<DeviceSpec>().is_err());
        assert!("tpu".parse::<DeviceSpec>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for spec in [DeviceSpec::Cpu, DeviceSpec::Sequential, DeviceSpec::from(2)] {
            assert_eq!(spec.to_string().parse::<DeviceSpec>().unwrap(), spec);
        }
    }

    #[test]
    fn test_host_client() {
        let client = DeviceSpec::Sequential.cpu_client().unwrap();
        assert!(client.is_sequential());
        assert!(DeviceSpec::Cuda(0).cpu_client().is_err());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_unavailable_without_feature() {
        let err = DeviceSpec::Cuda(1).ensure_available().unwrap_err();
        assert!(matches!(err, Error::DeviceUnavailable { ref device, .. } if device == "cuda:1"));
    }
}
