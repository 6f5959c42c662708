//! The accelerated execution backend seam.
//!
//! A backend receives the shared bar buffer, a kernel id and its 16-byte
//! parameter block, and eventually yields an interleaved output buffer.
//! Device backends (GPU compute, remote workers) implement
//! [`AcceleratedBackend`]; [`SoftwareBackend`] runs the reference kernels
//! on the calling thread and is what parity tests compare against.
//!
//! # Example
//!
//! ```
//! use futures::executor::block_on;
//! use mochart::kernels::{AcceleratedBackend, BarBuffer, KernelId, KernelRequest, SoftwareBackend};
//! use mochart::plan::params::Params;
//! use mochart::series::Bar;
//!
//! let bars: Vec<Bar> = (0..10).map(|i| {
//!     let c = 100.0 + f64::from(i);
//!     Bar::new(i64::from(i), c, c, c, c, 1.0)
//! }).collect();
//! let buffer = BarBuffer::from_bars(&bars);
//! let params = KernelId::Sma.layout().pack(&Params::new().with("period", 5), bars.len()).unwrap();
//!
//! let out = block_on(SoftwareBackend::new().dispatch(KernelRequest::new(KernelId::Sma, &buffer, params))).unwrap();
//! assert_eq!(out[4], 102.0);
//! ```

use async_trait::async_trait;

use super::params::ParamBlock;
use super::{software, BarBuffer, KernelId};
use crate::error::{Error, Result};

/// One kernel submission.
#[derive(Debug, Clone, Copy)]
pub struct KernelRequest<'a> {
    /// Kernel to run.
    pub kernel: KernelId,
    /// Shared bar buffer.
    pub bars: &'a BarBuffer,
    /// Packed parameters.
    pub params: ParamBlock,
}

impl<'a> KernelRequest<'a> {
    /// Creates a request.
    #[must_use]
    pub const fn new(kernel: KernelId, bars: &'a BarBuffer, params: ParamBlock) -> Self {
        Self {
            kernel,
            bars,
            params,
        }
    }

    /// Number of `f32` slots the output buffer must hold.
    #[must_use]
    pub const fn output_len(&self) -> usize {
        self.bars.len() * self.kernel.output_count()
    }
}

/// An execution backend for the accelerated path.
#[async_trait]
pub trait AcceleratedBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Runs one kernel and returns its interleaved output buffer.
    ///
    /// # Errors
    ///
    /// Implementations report device and submission failures as
    /// [`Error::AcceleratedPath`].
    async fn dispatch(&self, request: KernelRequest<'_>) -> Result<Vec<f32>>;
}

/// Runs the reference `f32` kernels in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareBackend;

impl SoftwareBackend {
    /// Creates the backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AcceleratedBackend for SoftwareBackend {
    fn name(&self) -> &str {
        "software"
    }

    async fn dispatch(&self, request: KernelRequest<'_>) -> Result<Vec<f32>> {
        let declared = request.params.u32_at(bar_count_offset(request.kernel)) as usize;
        if declared != request.bars.len() {
            return Err(Error::accelerated(format!(
                "parameter block declares {declared} bars, buffer holds {}",
                request.bars.len()
            )));
        }
        let mut out = vec![0.0; request.output_len()];
        software::run(
            request.kernel,
            request.bars.as_slice(),
            request.bars.len(),
            &request.params,
            &mut out,
        );
        Ok(out)
    }
}

fn bar_count_offset(kernel: KernelId) -> usize {
    match kernel.layout() {
        super::params::ParamLayout::Band => 8,
        super::params::ParamLayout::Triple => 12,
        super::params::ParamLayout::Single => 4,
    }
}
