use bytemuck::{Pod, Zeroable};
use effects::{EffectDescriptor, ParamSpec, ParamValue, ParameterValues, MAX_PARAMS};

use crate::error::RenderError;

/// Number of 4-byte slots in the uniform buffer.
pub const UNIFORM_SLOTS: usize = 64;
/// Size of the uniform buffer in bytes.
pub const UNIFORM_BYTES: u64 = (UNIFORM_SLOTS * std::mem::size_of::<f32>()) as u64;

/// Width, height and time around the per-effect parameters.
const RESERVED_SLOTS: usize = 3;

const _: () = assert!(MAX_PARAMS + RESERVED_SLOTS <= UNIFORM_SLOTS);

/// Fixed-layout uniform record uploaded once per change.
///
/// Slot order: texture width, texture height, one slot per parameter in
/// declared order, elapsed seconds for animated effects, then zeros.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct UniformBlock {
    slots: [f32; UNIFORM_SLOTS],
}

impl UniformBlock {
    pub fn slots(&self) -> &[f32; UNIFORM_SLOTS] {
        &self.slots
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Number of slots written by [`pack`]; everything after is zero padding.
    pub fn populated(&self, descriptor: &EffectDescriptor) -> usize {
        populated_slots(descriptor)
    }

    pub fn texture_size(&self) -> (f32, f32) {
        (self.slots[0], self.slots[1])
    }

    pub fn time(&self, descriptor: &EffectDescriptor) -> Option<f32> {
        descriptor
            .animated
            .then(|| self.slots[2 + descriptor.params.len()])
    }

    /// Bit-level comparison; `PartialEq` treats `NaN` slots as unequal.
    pub fn bits_eq(&self, other: &UniformBlock) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Default for UniformBlock {
    fn default() -> Self {
        Self::zeroed()
    }
}

fn populated_slots(descriptor: &EffectDescriptor) -> usize {
    2 + descriptor.params.len() + usize::from(descriptor.animated)
}

/// Serializes `values` for `descriptor` into a uniform block.
///
/// `values` must belong to `descriptor`'s effect. `time` is only written for
/// animated effects.
pub fn pack(
    descriptor: &EffectDescriptor,
    values: &ParameterValues,
    texture_size: (u32, u32),
    time: f32,
) -> Result<UniformBlock, RenderError> {
    let required = populated_slots(descriptor);
    if required > UNIFORM_SLOTS {
        return Err(RenderError::UniformOverflow {
            required,
            capacity: UNIFORM_SLOTS,
        });
    }

    let mut block = UniformBlock::zeroed();
    block.slots[0] = texture_size.0 as f32;
    block.slots[1] = texture_size.1 as f32;
    debug_assert_eq!(values.effect(), descriptor.id);
    for (index, (_, value)) in values.ordered().enumerate() {
        block.slots[2 + index] = value.as_f32();
    }
    if descriptor.animated {
        block.slots[2 + descriptor.params.len()] = time;
    }
    Ok(block)
}

/// Reads parameter values back out of a packed block.
pub fn unpack(descriptor: &EffectDescriptor, block: &UniformBlock) -> ParameterValues {
    let mut values = ParameterValues::defaults_for(descriptor);
    for (index, def) in descriptor.params.iter().enumerate() {
        let raw = block.slots[2 + index];
        let value = match def.spec {
            ParamSpec::Number { .. } => ParamValue::Number(raw),
            ParamSpec::Boolean { .. } => ParamValue::Boolean(raw != 0.0),
        };
        if let Err(error) = values.set(def.key, value) {
            tracing::debug!(key = def.key, %error, "skipping unpacked uniform slot");
        }
    }
    values
}
