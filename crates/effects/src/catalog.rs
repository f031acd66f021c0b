use crate::{EffectDescriptor, EffectId, ParamDef};

const FRAGMENT_PATTERNS: &[&str] = &[
    "Diagonal Lines",
    "Diagonal Lines 2",
    "Vertical Lines",
    "Horizontal Segments",
    "Noise Texture",
    "Static Noise",
];

const MIRROR_PATTERNS: &[&str] = &[
    "Radial Stripes",
    "S-Curve",
    "Vertical Pinch",
    "Horizontal Pinch",
    "Zigzag",
    "Wavy Horizontal",
];

const HALFTONE_SHAPES: &[&str] = &["Circle", "Square", "Triangle"];

const NOISE_TYPES: &[&str] = &["Random", "Perlin", "Warp", "Voronoi", "Cellular", "Simplex"];

const NOISE_COLOR_MODES: &[&str] = &[
    "Grayscale",
    "Heat Map",
    "Rainbow",
    "Cyberpunk",
    "Neon",
    "Earth",
];

const NOISE_BLEND_MODES: &[&str] = &["Normal", "Multiply", "Screen", "Overlay", "Add"];

const PIXELATE_PARAMS: &[ParamDef] = &[ParamDef::number(
    "pixelSize",
    "Pixel Size",
    1.0,
    128.0,
    1.0,
    8.0,
    0,
)];

const DITHER_PARAMS: &[ParamDef] = &[
    ParamDef::number("matrixSize", "Matrix Size", 0.0, 8.0, 1.0, 3.0, 0),
    ParamDef::number("patternSize", "Pattern Size", 1.0, 16.0, 1.0, 4.0, 0),
    ParamDef::number("levels", "Color Levels", 2.0, 16.0, 1.0, 4.0, 0),
    ParamDef::boolean("colorDither", "Color Dither", true),
];

const HALFTONE_PARAMS: &[ParamDef] = &[
    ParamDef::number("dotRadius", "Dot Radius", 1.0, 20.0, 0.5, 10.0, 1),
    ParamDef::number("angle", "Angle", 0.0, 90.0, 1.0, 45.0, 0),
    ParamDef::boolean("colorMode", "Color Mode", true),
    ParamDef::number("shapeType", "Shape", 0.0, 2.0, 1.0, 0.0, 0).with_choices(HALFTONE_SHAPES),
];

const GLASS_PARAMS: &[ParamDef] = &[
    ParamDef::number("distortionStrength", "Distortion", 0.0, 50.0, 1.0, 4.0, 0),
    ParamDef::number("glassScale", "Glass Scale", 1.0, 50.0, 1.0, 24.0, 0),
    ParamDef::number("bumpiness", "Bumpiness", 0.1, 5.0, 0.1, 1.0, 1),
    ParamDef::boolean("chromaticAberration", "Chromatic Aberration", true),
];

const FRAGMENTS_PARAMS: &[ParamDef] = &[
    ParamDef::number("patternType", "Pattern", 0.0, 5.0, 1.0, 0.0, 0)
        .with_choices(FRAGMENT_PATTERNS),
    ParamDef::number("radius", "Radius", 1.0, 50.0, 1.0, 2.0, 0),
    ParamDef::number("smoothness", "Smoothness", 0.0, 1.0, 0.01, 0.5, 2),
    ParamDef::number("intensity", "Intensity", 0.0, 1.0, 0.01, 0.48, 2),
    ParamDef::number("segments", "Segments", 1.0, 50.0, 1.0, 16.0, 0),
];

const MIRROR_PARAMS: &[ParamDef] = &[
    ParamDef::number("patternType", "Pattern", 0.0, 5.0, 1.0, 0.0, 0)
        .with_choices(MIRROR_PATTERNS),
    ParamDef::number("radius", "Radius", 1.0, 100.0, 1.0, 100.0, 0),
    ParamDef::number("amplitude", "Amplitude", 0.0, 1.0, 0.01, 0.08, 2),
    ParamDef::number("intensity", "Intensity", 0.0, 1.0, 0.01, 0.8, 2),
    ParamDef::number("frequency", "Frequency", 1.0, 50.0, 1.0, 10.0, 0),
];

const NOISE_PARAMS: &[ParamDef] = &[
    ParamDef::number("noiseType", "Noise Type", 0.0, 5.0, 1.0, 1.0, 0).with_choices(NOISE_TYPES),
    ParamDef::number("colorMode", "Color Mode", 0.0, 5.0, 1.0, 0.0, 0)
        .with_choices(NOISE_COLOR_MODES),
    ParamDef::number("blendMode", "Blend Mode", 0.0, 4.0, 1.0, 0.0, 0)
        .with_choices(NOISE_BLEND_MODES),
    ParamDef::number("scale", "Scale", 1.0, 50.0, 1.0, 8.0, 0),
    ParamDef::number("speed", "Speed", 0.0, 5.0, 0.1, 1.0, 1),
    ParamDef::number("intensity", "Intensity", 0.0, 1.0, 0.01, 0.5, 2),
];

/// Every effect, in [`EffectId::ALL`] order.
pub const CATALOG: &[EffectDescriptor] = &[
    EffectDescriptor {
        id: EffectId::Pixelate,
        name: "Pixelate",
        description: "Snaps the image to a grid of flat square cells.",
        params: PIXELATE_PARAMS,
        shader_source: include_str!("../shaders/pixelate.wgsl"),
        animated: false,
    },
    EffectDescriptor {
        id: EffectId::Dither,
        name: "Dither",
        description: "Ordered Bayer dithering with a reduced colour palette.",
        params: DITHER_PARAMS,
        shader_source: include_str!("../shaders/dither.wgsl"),
        animated: false,
    },
    EffectDescriptor {
        id: EffectId::Halftone,
        name: "Halftone",
        description: "Print-style halftone screen of rotated dots, squares or triangles.",
        params: HALFTONE_PARAMS,
        shader_source: include_str!("../shaders/halftone.wgsl"),
        animated: false,
    },
    EffectDescriptor {
        id: EffectId::Glass,
        name: "Glass",
        description: "Refraction through bumpy frosted glass.",
        params: GLASS_PARAMS,
        shader_source: include_str!("../shaders/glass.wgsl"),
        animated: false,
    },
    EffectDescriptor {
        id: EffectId::Fragments,
        name: "Fragments",
        description: "Slices the image into displaced, drifting fragments.",
        params: FRAGMENTS_PARAMS,
        shader_source: include_str!("../shaders/fragments.wgsl"),
        animated: true,
    },
    EffectDescriptor {
        id: EffectId::Mirror,
        name: "Mirror",
        description: "Warped mirror distortions along procedural patterns.",
        params: MIRROR_PARAMS,
        shader_source: include_str!("../shaders/mirror.wgsl"),
        animated: false,
    },
    EffectDescriptor {
        id: EffectId::Noise,
        name: "Noise",
        description: "Animated procedural noise blended over the image.",
        params: NOISE_PARAMS,
        shader_source: include_str!("../shaders/noise.wgsl"),
        animated: true,
    },
];
