//! The static catalog of operation families and their methods.
//!
//! Families and methods are closed enums; names are matched exactly
//! (snake_case). The catalog is `'static` data and can be queried without
//! running anything.

use std::fmt;

use crate::error::{PipelineError, Result};
use crate::params::ParamSpec;

macro_rules! method_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(name: &str) -> Option<Self> {
                match name {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

method_enum! {
    /// Operation families.
    Family {
        Threshold => "threshold",
        EdgeDetection => "edge_detection",
        NoiseReduction => "noise_reduction",
        Morphological => "morphological",
        ColorTransformation => "color_transformation",
        SpecialEffect => "special_effect",
        Geometric => "geometric",
    }
}

method_enum! {
    ThresholdMethod {
        Binary => "binary",
        Adaptive => "adaptive",
        Otsu => "otsu",
        Triangle => "triangle",
    }
}

method_enum! {
    EdgeMethod {
        Canny => "canny",
        Sobel => "sobel",
        Laplace => "laplace",
        Prewitt => "prewitt",
        Roberts => "roberts",
    }
}

method_enum! {
    NoiseMethod {
        Gaussian => "gaussian",
        Median => "median",
        Bilateral => "bilateral",
        NlMeans => "nlmeans",
        Wavelet => "wavelet",
    }
}

method_enum! {
    MorphMethod {
        Dilate => "dilate",
        Erode => "erode",
        Opening => "opening",
        Closing => "closing",
        Gradient => "gradient",
        TopHat => "tophat",
        BlackHat => "blackhat",
    }
}

method_enum! {
    ColorMethod {
        RgbToHsv => "rgb_to_hsv",
        RgbToLab => "rgb_to_lab",
        Gamma => "gamma",
        Equalize => "equalize",
        AutoContrast => "autocontrast",
    }
}

method_enum! {
    EffectMethod {
        Cartoon => "cartoon",
        OilPainting => "oil_painting",
        PencilSketch => "pencil_sketch",
        Watercolor => "watercolor",
        Pixelate => "pixelate",
    }
}

method_enum! {
    GeometricMethod {
        Resize => "resize",
        Rotate => "rotate",
        Affine => "affine",
        Perspective => "perspective",
    }
}

const THRESHOLD_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("threshold", 0.0, 255.0, 127.0),
    ParamSpec::odd("block_size", 3.0, 21.0, 11.0),
    ParamSpec::int("c", -10.0, 10.0, 2.0),
];

const EDGE_PARAMS: &[ParamSpec] = &[
    ParamSpec::float("sigma", 0.1, 5.0, 2.0),
    ParamSpec::int("low_threshold", 0.0, 255.0, 100.0),
    ParamSpec::int("high_threshold", 0.0, 255.0, 200.0),
];

const NOISE_PARAMS: &[ParamSpec] = &[
    ParamSpec::odd("kernel_size", 3.0, 15.0, 5.0),
    ParamSpec::float("sigma", 0.1, 5.0, 1.5),
];

const MORPH_PARAMS: &[ParamSpec] = &[
    ParamSpec::odd("kernel_size", 3.0, 15.0, 5.0),
    ParamSpec::int("iterations", 1.0, 10.0, 1.0),
];

const COLOR_PARAMS: &[ParamSpec] = &[ParamSpec::float("gamma", 0.1, 5.0, 1.0)];

const EFFECT_PARAMS: &[ParamSpec] = &[ParamSpec::float("strength", 0.1, 1.0, 0.5)];

const RESIZE_PARAMS: &[ParamSpec] = &[
    ParamSpec::required_int("width", 1.0, 16384.0),
    ParamSpec::required_int("height", 1.0, 16384.0),
];

const ROTATE_PARAMS: &[ParamSpec] = &[ParamSpec::float("angle", -360.0, 360.0, 90.0)];

const AFFINE_PARAMS: &[ParamSpec] = &[ParamSpec::matrix("matrix", 2, 3)];

const PERSPECTIVE_PARAMS: &[ParamSpec] = &[ParamSpec::matrix("matrix", 3, 3)];

/// A fully resolved method: family plus one of its closed method set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Threshold(ThresholdMethod),
    Edge(EdgeMethod),
    Noise(NoiseMethod),
    Morph(MorphMethod),
    Color(ColorMethod),
    Effect(EffectMethod),
    Geometric(GeometricMethod),
}

impl Method {
    pub fn family(self) -> Family {
        match self {
            Self::Threshold(_) => Family::Threshold,
            Self::Edge(_) => Family::EdgeDetection,
            Self::Noise(_) => Family::NoiseReduction,
            Self::Morph(_) => Family::Morphological,
            Self::Color(_) => Family::ColorTransformation,
            Self::Effect(_) => Family::SpecialEffect,
            Self::Geometric(_) => Family::Geometric,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Threshold(m) => m.as_str(),
            Self::Edge(m) => m.as_str(),
            Self::Noise(m) => m.as_str(),
            Self::Morph(m) => m.as_str(),
            Self::Color(m) => m.as_str(),
            Self::Effect(m) => m.as_str(),
            Self::Geometric(m) => m.as_str(),
        }
    }

    /// Parameters accepted by this method.
    ///
    /// Methods of the same family share one schema, except geometric
    /// methods which each take their own.
    pub fn params(self) -> &'static [ParamSpec] {
        match self {
            Self::Threshold(_) => THRESHOLD_PARAMS,
            Self::Edge(_) => EDGE_PARAMS,
            Self::Noise(_) => NOISE_PARAMS,
            Self::Morph(_) => MORPH_PARAMS,
            Self::Color(_) => COLOR_PARAMS,
            Self::Effect(_) => EFFECT_PARAMS,
            Self::Geometric(GeometricMethod::Resize) => RESIZE_PARAMS,
            Self::Geometric(GeometricMethod::Rotate) => ROTATE_PARAMS,
            Self::Geometric(GeometricMethod::Affine) => AFFINE_PARAMS,
            Self::Geometric(GeometricMethod::Perspective) => PERSPECTIVE_PARAMS,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.family(), self.name())
    }
}

/// Catalog entry for one family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FamilySpec {
    pub family: Family,
    pub default_method: Method,
    /// Key under which callers may put the method inside `params`.
    pub method_key: &'static str,
}

impl FamilySpec {
    pub fn name(&self) -> &'static str {
        self.family.as_str()
    }

    /// All methods of the family in declaration order.
    pub fn methods(&self) -> Vec<Method> {
        match self.family {
            Family::Threshold => ThresholdMethod::ALL.iter().map(|&m| Method::Threshold(m)).collect(),
            Family::EdgeDetection => EdgeMethod::ALL.iter().map(|&m| Method::Edge(m)).collect(),
            Family::NoiseReduction => NoiseMethod::ALL.iter().map(|&m| Method::Noise(m)).collect(),
            Family::Morphological => MorphMethod::ALL.iter().map(|&m| Method::Morph(m)).collect(),
            Family::ColorTransformation => {
                ColorMethod::ALL.iter().map(|&m| Method::Color(m)).collect()
            }
            Family::SpecialEffect => EffectMethod::ALL.iter().map(|&m| Method::Effect(m)).collect(),
            Family::Geometric => GeometricMethod::ALL
                .iter()
                .map(|&m| Method::Geometric(m))
                .collect(),
        }
    }

    /// Union of the methods' parameter schemas, first declaration wins.
    pub fn params(&self) -> Vec<&'static ParamSpec> {
        let mut out: Vec<&'static ParamSpec> = Vec::new();
        for method in self.methods() {
            for spec in method.params() {
                if !out.iter().any(|seen| seen.name == spec.name) {
                    out.push(spec);
                }
            }
        }
        out
    }

    /// Whether each method validates against its own schema.
    pub fn has_method_schemas(&self) -> bool {
        matches!(self.family, Family::Geometric)
    }

    pub fn method(&self, name: &str) -> Option<Method> {
        self.methods().into_iter().find(|m| m.name() == name)
    }
}

static CATALOG: [FamilySpec; 7] = [
    FamilySpec {
        family: Family::Threshold,
        default_method: Method::Threshold(ThresholdMethod::Binary),
        method_key: "method",
    },
    FamilySpec {
        family: Family::EdgeDetection,
        default_method: Method::Edge(EdgeMethod::Canny),
        method_key: "method",
    },
    FamilySpec {
        family: Family::NoiseReduction,
        default_method: Method::Noise(NoiseMethod::Gaussian),
        method_key: "method",
    },
    FamilySpec {
        family: Family::Morphological,
        default_method: Method::Morph(MorphMethod::Dilate),
        method_key: "operation",
    },
    FamilySpec {
        family: Family::ColorTransformation,
        default_method: Method::Color(ColorMethod::RgbToHsv),
        method_key: "method",
    },
    FamilySpec {
        family: Family::SpecialEffect,
        default_method: Method::Effect(EffectMethod::Cartoon),
        method_key: "effect",
    },
    FamilySpec {
        family: Family::Geometric,
        default_method: Method::Geometric(GeometricMethod::Resize),
        method_key: "operation",
    },
];

/// Every family in catalog order.
pub fn families() -> &'static [FamilySpec] {
    &CATALOG
}

/// Catalog entry for `family`.
pub fn family_spec(family: Family) -> &'static FamilySpec {
    // CATALOG is declared in Family::ALL order.
    &CATALOG[family as usize]
}

/// Look up a family by name.
pub fn lookup(name: &str) -> Result<&'static FamilySpec> {
    Family::parse(name)
        .map(family_spec)
        .ok_or_else(|| PipelineError::UnknownFamily(name.to_string()))
}

/// Resolve a family and optional method name. An omitted method selects
/// the family default.
///
/// # Errors
///
/// `UnknownFamily` if the family is not in the catalog, `UnknownMethod` if
/// the method is not one of the family's methods.
pub fn resolve(family: &str, method: Option<&str>) -> Result<Method> {
    let spec = lookup(family)?;
    match method {
        None => Ok(spec.default_method),
        Some(name) => spec.method(name).ok_or_else(|| PipelineError::UnknownMethod {
            family: family.to_string(),
            method: name.to_string(),
        }),
    }
}
