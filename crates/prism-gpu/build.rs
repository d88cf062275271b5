//! Build script to compile the GLSL shaders to SPIR-V.
//!
//! The binaries land in `$OUT_DIR/shaders`, exported to the crate as
//! `PRISM_SPIRV_DIR` so the pipeline can load them by path at runtime.

use shaderc::{Compiler, ShaderKind};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let spirv_dir = out_dir.join("shaders");
    let shader_dir = Path::new("shaders");

    println!("cargo:rerun-if-changed=shaders/");

    fs::create_dir_all(&spirv_dir)
        .unwrap_or_else(|e| panic!("Failed to create {}: {e}", spirv_dir.display()));

    let compiler = Compiler::new().expect("Failed to create shader compiler");

    compile_shader(
        &compiler,
        shader_dir.join("triangle.vert"),
        spirv_dir.join("triangle.vert.spv"),
        ShaderKind::Vertex,
    );
    compile_shader(
        &compiler,
        shader_dir.join("triangle.frag"),
        spirv_dir.join("triangle.frag.spv"),
        ShaderKind::Fragment,
    );

    println!("cargo:rustc-env=PRISM_SPIRV_DIR={}", spirv_dir.display());
}

fn compile_shader(
    compiler: &Compiler,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    kind: ShaderKind,
) {
    let input_path = input.as_ref();
    let output_path = output.as_ref();

    let source = fs::read_to_string(input_path)
        .unwrap_or_else(|e| panic!("Failed to read shader {}: {e}", input_path.display()));

    let file_name = input_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("shader");

    let mut options = shaderc::CompileOptions::new().expect("Failed to create compile options");
    // Instances are created at API 1.0
    options.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    options.set_target_spirv(shaderc::SpirvVersion::V1_0);
    options.set_optimization_level(shaderc::OptimizationLevel::Performance);

    let result = compiler
        .compile_into_spirv(&source, kind, file_name, "main", Some(&options))
        .unwrap_or_else(|e| panic!("Failed to compile shader {}: {e}", input_path.display()));

    if result.get_num_warnings() > 0 {
        println!(
            "cargo:warning=Shader warnings in {}: {}",
            input_path.display(),
            result.get_warning_messages()
        );
    }

    fs::write(output_path, bytemuck::cast_slice::<u32, u8>(result.as_binary()))
        .unwrap_or_else(|e| panic!("Failed to write shader {}: {e}", output_path.display()));
}
