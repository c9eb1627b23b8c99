//! Shader Templates
//!
//! WGSL sources live under `src/shaders/` and are embedded into the binary.
//! They are rendered through a shared minijinja environment with a syntax
//! that does not collide with WGSL attributes:
//!
//! | Construct          | Syntax            |
//! |--------------------|-------------------|
//! | Block              | `{$ include "x" $}` |
//! | Expression         | `{{ NAME }}`      |
//! | Line statement     | `$$ if NAME == "X"` |
//!
//! `include` resolves relative to `chunks/`.

use std::borrow::Cow;
use std::sync::OnceLock;

use lumen_core::{LumenError, Result};
use minijinja::{Environment, Error, ErrorKind, syntax::SyntaxConfig};
use rust_embed::RustEmbed;
use rustc_hash::FxHashMap;

use crate::device::PixelProgram;
use crate::tone_mapping::composite::ToneMapCurve;

static SHADER_ENV: OnceLock<std::result::Result<Environment<'static>, String>> = OnceLock::new();

#[derive(RustEmbed)]
#[folder = "src/shaders"]
struct ShaderAssets;

fn build_env() -> std::result::Result<Environment<'static>, String> {
    let mut env = Environment::new();

    let syntax = SyntaxConfig::builder()
        .block_delimiters("{$", "$}")
        .variable_delimiters("{{", "}}")
        .line_statement_prefix("$$")
        .build()
        .map_err(|e| e.to_string())?;

    env.set_syntax(syntax);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_undefined_behavior(minijinja::UndefinedBehavior::SemiStrict);
    env.set_loader(shader_loader);
    env.set_path_join_callback(|name, _parent| format!("chunks/{name}").into());

    Ok(env)
}

fn get_env() -> Result<&'static Environment<'static>> {
    SHADER_ENV
        .get_or_init(build_env)
        .as_ref()
        .map_err(|reason| LumenError::ShaderCompile {
            shader: "<environment>".to_string(),
            reason: reason.clone(),
        })
}

fn shader_loader(name: &str) -> std::result::Result<Option<String>, Error> {
    let filename = if std::path::Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wgsl"))
    {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{name}.wgsl"))
    };

    match ShaderAssets::get(&filename) {
        Some(file) => std::str::from_utf8(file.data.as_ref())
            .map(|source| Some(source.to_string()))
            .map_err(|e| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("{filename} is not UTF-8: {e}"),
                )
            }),
        None => Ok(None),
    }
}

/// Template defines for a program.
fn defines_for(program: PixelProgram) -> FxHashMap<&'static str, String> {
    let mut defines = FxHashMap::default();
    match program {
        PixelProgram::Brightness | PixelProgram::Downsample => {}
        PixelProgram::ToneMap(curve) => {
            defines.insert("TONE_MAP_CURVE", curve.define_value().to_string());
        }
    }
    defines
}

/// Renders the full WGSL source (mapping vertex stage + pixel program).
pub fn render_program(program: PixelProgram) -> Result<String> {
    let env = get_env()?;
    let name = program.template_name();
    let compile_err = |e: Error| LumenError::ShaderCompile {
        shader: name.to_string(),
        reason: e.to_string(),
    };

    let template = env.get_template(name).map_err(compile_err)?;
    let source = template.render(defines_for(program)).map_err(compile_err)?;
    log::debug!("Rendered shader '{name}' ({} bytes)", source.len());
    Ok(source)
}

/// Renders every program the pipeline uses, failing on the first broken one.
pub fn validate_all() -> Result<()> {
    for program in [
        PixelProgram::Brightness,
        PixelProgram::Downsample,
        PixelProgram::ToneMap(ToneMapCurve::Reinhard),
        PixelProgram::ToneMap(ToneMapCurve::Exponential),
    ] {
        render_program(program)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_program_includes_the_mapping_stage() {
        for program in [
            PixelProgram::Brightness,
            PixelProgram::Downsample,
            PixelProgram::ToneMap(ToneMapCurve::Reinhard),
        ] {
            let source = render_program(program).unwrap();
            assert!(source.contains("fn vs_main"), "{program:?}");
            assert!(source.contains("fn fs_main"), "{program:?}");
            assert!(!source.contains("{$"), "{program:?} left template syntax");
        }
    }

    #[test]
    fn tone_curve_is_selected_by_define() {
        let reinhard = render_program(PixelProgram::ToneMap(ToneMapCurve::Reinhard)).unwrap();
        let exponential =
            render_program(PixelProgram::ToneMap(ToneMapCurve::Exponential)).unwrap();
        assert!(reinhard.contains("c / (c + vec3<f32>(la))"));
        assert!(!reinhard.contains("exp(-c / la)"));
        assert!(exponential.contains("exp(-c / la)"));
    }

    #[test]
    fn brightness_reads_the_whole_footprint() {
        let source = render_program(PixelProgram::Brightness).unwrap();
        assert!(source.contains("let extent = hi - lo;"));
        assert!(!source.contains("MAX_TAPS"));
    }
}
