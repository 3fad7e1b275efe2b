//! Visual interface contract for candidate shaders.
//!
//! Every candidate is a single GLSL fragment shader that declares:
//! - `#version 330`
//! - `in vec2 v_uv;`
//! - `uniform sampler2D u_input;`, `uniform vec2 u_resolution;`, `uniform float u_time;`
//! - `out vec4 f_color;`
//!
//! The renderer is the authority on whether a shader compiles. The check here
//! is structural only and runs at the proposal boundary so that obviously
//! malformed proposals never reach the renderer.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Contract text handed to proposers verbatim.
pub const INTERFACE_CONTRACT: &str = "Shader interface contract (must follow exactly):\n\
- GLSL version: #version 330\n\
- Inputs: in vec2 v_uv;\n\
- Uniforms: sampler2D u_input, vec2 u_resolution, float u_time\n\
- Output: out vec4 f_color\n";

/// Guaranteed-renderable fallback floor.
pub const BASELINE_FRAGMENT_SHADER: &str = r#"#version 330
uniform sampler2D u_input;
uniform vec2 u_resolution;
uniform float u_time;

in vec2 v_uv;
out vec4 f_color;

float hash21(vec2 p) {
    p = fract(p * vec2(233.34, 851.73));
    p += dot(p, p + 23.45);
    return fract(p.x * p.y);
}

float value_noise(vec2 p) {
    vec2 cell = floor(p);
    vec2 local = fract(p);
    vec2 blend = local * local * (3.0 - 2.0 * local);
    float n00 = hash21(cell);
    float n10 = hash21(cell + vec2(1.0, 0.0));
    float n01 = hash21(cell + vec2(0.0, 1.0));
    float n11 = hash21(cell + vec2(1.0, 1.0));
    return mix(mix(n00, n10, blend.x), mix(n01, n11, blend.x), blend.y);
}

void main() {
    vec2 uv = v_uv;
    float n = value_noise(uv * 4.0 + vec2(u_time * 0.05));
    vec3 guide = texture(u_input, uv).rgb;
    f_color = vec4(mix(vec3(n), guide, 0.2), 1.0);
}
"#;

/// One declaration the contract requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractMarker {
    Version,
    InputCoordinate,
    SourceSampler,
    Resolution,
    Time,
    OutputColor,
}

impl ContractMarker {
    pub const ALL: [ContractMarker; 6] = [
        ContractMarker::Version,
        ContractMarker::InputCoordinate,
        ContractMarker::SourceSampler,
        ContractMarker::Resolution,
        ContractMarker::Time,
        ContractMarker::OutputColor,
    ];

    /// Declaration as it should appear in source.
    pub fn declaration(self) -> &'static str {
        match self {
            ContractMarker::Version => "#version 330",
            ContractMarker::InputCoordinate => "in vec2 v_uv",
            ContractMarker::SourceSampler => "uniform sampler2D u_input",
            ContractMarker::Resolution => "uniform vec2 u_resolution",
            ContractMarker::Time => "uniform float u_time",
            ContractMarker::OutputColor => "out vec4 f_color",
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            ContractMarker::Version => r"(?m)^\s*#\s*version\s+330\b",
            ContractMarker::InputCoordinate => r"\bin\s+(?:highp\s+|mediump\s+)?vec2\s+v_uv\b",
            ContractMarker::SourceSampler => r"\buniform\s+sampler2D\s+u_input\b",
            ContractMarker::Resolution => r"\buniform\s+(?:highp\s+)?vec2\s+u_resolution\b",
            ContractMarker::Time => r"\buniform\s+(?:highp\s+)?float\s+u_time\b",
            ContractMarker::OutputColor => r"\bout\s+(?:highp\s+|mediump\s+)?vec4\s+f_color\b",
        }
    }
}

/// A candidate that lacks one or more required declarations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("candidate violates interface contract; missing: {}", describe(.missing))]
pub struct ContractViolation {
    pub missing: Vec<ContractMarker>,
}

fn describe(markers: &[ContractMarker]) -> String {
    markers
        .iter()
        .map(|m| m.declaration())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compiled contract checker.
#[derive(Debug)]
pub struct InterfaceContract {
    rules: Vec<(ContractMarker, Regex)>,
}

impl InterfaceContract {
    /// Shared checker; patterns are compiled once per process.
    pub fn standard() -> &'static InterfaceContract {
        static CONTRACT: OnceLock<InterfaceContract> = OnceLock::new();
        CONTRACT.get_or_init(|| {
            let rules = ContractMarker::ALL
                .iter()
                .map(|m| (*m, Regex::new(m.pattern()).expect("static pattern")))
                .collect();
            InterfaceContract { rules }
        })
    }

    /// Check that `source` declares every element of the contract.
    pub fn check(&self, source: &str) -> Result<(), ContractViolation> {
        let missing: Vec<ContractMarker> = self
            .rules
            .iter()
            .filter(|(_, re)| !re.is_match(source))
            .map(|(marker, _)| *marker)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ContractViolation { missing })
        }
    }

    pub fn is_satisfied(&self, source: &str) -> bool {
        self.check(source).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(InterfaceContract::standard().rules.len(), ContractMarker::ALL.len());
    }

    #[test]
    fn test_baseline_satisfies_contract() {
        InterfaceContract::standard()
            .check(BASELINE_FRAGMENT_SHADER)
            .expect("baseline must satisfy the contract");
    }

    #[test]
    fn test_missing_markers_are_listed() {
        let src = "#version 330\nout vec4 f_color;\nvoid main() { f_color = vec4(1.0); }";
        let err = InterfaceContract::standard().check(src).unwrap_err();
        assert_eq!(
            err.missing,
            vec![
                ContractMarker::InputCoordinate,
                ContractMarker::SourceSampler,
                ContractMarker::Resolution,
                ContractMarker::Time,
            ]
        );
        assert!(err.to_string().contains("in vec2 v_uv"));
    }

    #[test]
    fn test_layout_qualifiers_and_spacing_accepted() {
        let src = "#version 330 core\n\
                   uniform  sampler2D   u_input;\n\
                   uniform vec2 u_resolution;\n\
                   uniform float u_time;\n\
                   in vec2 v_uv;\n\
                   layout(location = 0) out vec4 f_color;\n";
        assert!(InterfaceContract::standard().is_satisfied(src));
    }

    #[test]
    fn test_other_glsl_versions_rejected() {
        let src = BASELINE_FRAGMENT_SHADER.replacen("#version 330", "#version 450", 1);
        let err = InterfaceContract::standard().check(&src).unwrap_err();
        assert_eq!(err.missing, vec![ContractMarker::Version]);

        let src = BASELINE_FRAGMENT_SHADER.replacen("#version 330", "#version 3300", 1);
        assert!(!InterfaceContract::standard().is_satisfied(&src));
    }

    #[test]
    fn test_plain_text_fails_everything() {
        let err = InterfaceContract::standard()
            .check("here is your shader!")
            .unwrap_err();
        assert_eq!(err.missing.len(), ContractMarker::ALL.len());
    }
}
