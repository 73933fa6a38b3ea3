//! Encoder configuration.
//!
//! The knobs a caller can turn for one emission run. Everything else about the
//! output is decided by the platform feature matrix.

/// Options controlling one kernel emission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Let the backend compact every instruction it can.
    pub auto_compact: bool,
    /// Let the backend add scoreboard annotations to un-annotated instructions.
    pub enable_scoreboard_auto_insertion: bool,
    /// Encode register extended descriptors in the base-scale-offset bindless form.
    pub use_extended_descriptor_bindless_format: bool,
    /// Append a fixed patchable region for debuggers after the kernel body.
    pub emit_debuggable_kernel_reservation: bool,
}

impl EncoderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_compact(mut self, on: bool) -> Self {
        self.auto_compact = on;
        self
    }

    pub fn with_scoreboard_auto_insertion(mut self, on: bool) -> Self {
        self.enable_scoreboard_auto_insertion = on;
        self
    }

    pub fn with_extended_descriptor_bindless_format(mut self, on: bool) -> Self {
        self.use_extended_descriptor_bindless_format = on;
        self
    }

    pub fn with_debuggable_kernel_reservation(mut self, on: bool) -> Self {
        self.emit_debuggable_kernel_reservation = on;
        self
    }
}
