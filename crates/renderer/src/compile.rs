use std::borrow::Cow;

use effects::FRAGMENT_ENTRY;
use wgpu::naga;

use crate::error::RenderError;

pub(crate) const VERTEX_ENTRY: &str = "vertexMain";

/// Full-screen quad built from six implicit vertices.
///
/// Texture coordinates put the image's first row at the top of the quad, so
/// uploads never need a vertical flip.
pub(crate) const VERTEX_SHADER_WGSL: &str = r"
struct VertexOutput {
    @builtin(position) position: vec4f,
    @location(0) texCoord: vec2f,
}

@vertex
fn vertexMain(@builtin(vertex_index) index: u32) -> VertexOutput {
    var positions = array<vec2f, 6>(
        vec2f(-1.0, -1.0),
        vec2f(1.0, -1.0),
        vec2f(1.0, 1.0),
        vec2f(-1.0, -1.0),
        vec2f(1.0, 1.0),
        vec2f(-1.0, 1.0),
    );
    var coords = array<vec2f, 6>(
        vec2f(0.0, 1.0),
        vec2f(1.0, 1.0),
        vec2f(1.0, 0.0),
        vec2f(0.0, 1.0),
        vec2f(1.0, 0.0),
        vec2f(0.0, 0.0),
    );

    var output: VertexOutput;
    output.position = vec4f(positions[index], 0.0, 1.0);
    output.texCoord = coords[index];
    return output;
}
";

/// Parses and validates WGSL on the CPU, returning a diagnostic on failure.
pub fn validate_wgsl(source: &str) -> Result<naga::Module, RenderError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|error| RenderError::compile(error.emit_to_string(source)))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|error| RenderError::compile(error.emit_to_string(source)))?;
    Ok(module)
}

/// Validates an effect fragment shader, including its entry point.
pub fn validate_fragment_shader(source: &str) -> Result<naga::Module, RenderError> {
    let module = validate_wgsl(source)?;
    let has_entry = module
        .entry_points
        .iter()
        .any(|entry| entry.name == FRAGMENT_ENTRY && entry.stage == naga::ShaderStage::Fragment);
    if !has_entry {
        return Err(RenderError::compile(format!(
            "shader does not declare a `@fragment fn {FRAGMENT_ENTRY}` entry point"
        )));
    }
    Ok(module)
}

/// Compiles the static full-screen quad vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen quad vertex"),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(VERTEX_SHADER_WGSL)),
    })
}

/// Validates `source` on the CPU, then hands it to wgpu.
///
/// A shader that fails validation never reaches the device, so its
/// diagnostic is returned instead of going to the uncaptured error handler.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    source: &str,
) -> Result<wgpu::ShaderModule, RenderError> {
    validate_fragment_shader(source)?;
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("effect fragment"),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.to_owned())),
    }))
}
