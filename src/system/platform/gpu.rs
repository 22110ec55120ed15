#[cfg(feature = "nvml")]
use nvml_wrapper::{Nvml, enum_wrappers::device::TemperatureSensor};

use super::GpuReading;

/// First NVIDIA device, if the management library loads.
pub(super) struct GpuReader {
    #[cfg(feature = "nvml")]
    nvml: Nvml,
}

impl GpuReader {
    pub(super) fn detect() -> Option<Self> {
        #[cfg(feature = "nvml")]
        {
            match Nvml::init() {
                Ok(nvml) => Some(Self { nvml }),
                Err(e) => {
                    tracing::debug!(error = %e, "NVML not available, GPU telemetry disabled");
                    None
                }
            }
        }
        #[cfg(not(feature = "nvml"))]
        {
            None
        }
    }

    #[cfg(feature = "nvml")]
    pub(super) fn read(&self) -> Option<GpuReading> {
        let device = self.nvml.device_by_index(0).ok()?;
        let memory = device.memory_info().ok()?;
        let utilization = device.utilization_rates().ok()?;
        Some(GpuReading {
            name: device.name().unwrap_or_else(|_| "Unknown GPU".to_string()),
            load: utilization.gpu as f32,
            memory_used: memory.used,
            memory_total: memory.total,
            temperature: device
                .temperature(TemperatureSensor::Gpu)
                .ok()
                .map(|t| t as f32),
        })
    }

    #[cfg(not(feature = "nvml"))]
    pub(super) fn read(&self) -> Option<GpuReading> {
        None
    }
}
