use thiserror::Error;

/// Why the graphics device went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceLossReason {
    /// The device was destroyed on purpose during teardown.
    Destroyed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLoss {
    pub reason: DeviceLossReason,
    pub message: String,
}

impl DeviceLoss {
    pub fn is_expected(&self) -> bool {
        self.reason == DeviceLossReason::Destroyed
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("no graphics backend is available on this platform")]
    UnsupportedPlatform,
    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(String),
    #[error("drawable surface unavailable: {0}")]
    ContextUnavailable(String),
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(String),
    #[error("shader failed to compile:\n{message}")]
    ShaderCompile { message: String },
    #[error("GPU device lost ({reason:?}): {message}")]
    DeviceLost {
        reason: DeviceLossReason,
        message: String,
    },
    #[error("failed to decode image: {message}")]
    ImageDecode { message: String },
    #[error("image is {width}x{height} but the GPU limit is {limit}x{limit}")]
    TextureTooLarge { width: u32, height: u32, limit: u32 },
    #[error("surface error: {0}")]
    Surface(String),
    #[error("frame readback failed: {0}")]
    Readback(String),
    #[error("{required} uniform slots required but only {capacity} available")]
    UniformOverflow { required: usize, capacity: usize },
    #[error("renderer is not ready")]
    NotReady,
}

impl RenderError {
    /// Fatal errors end the current session; everything else is surfaced and
    /// the last good frame stays on screen.
    pub fn is_fatal(&self) -> bool {
        match self {
            RenderError::UnsupportedPlatform
            | RenderError::NoAdapter(_)
            | RenderError::ContextUnavailable(_)
            | RenderError::DeviceRequest(_) => true,
            RenderError::DeviceLost { reason, .. } => *reason != DeviceLossReason::Destroyed,
            _ => false,
        }
    }

    pub(crate) fn compile(message: impl Into<String>) -> Self {
        RenderError::ShaderCompile {
            message: message.into(),
        }
    }
}

impl From<DeviceLoss> for RenderError {
    fn from(loss: DeviceLoss) -> Self {
        RenderError::DeviceLost {
            reason: loss.reason,
            message: loss.message,
        }
    }
}
