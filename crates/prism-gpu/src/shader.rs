//! SPIR-V loading.

use crate::error::{GpuError, Result};
use ash::vk;
use std::fs::File;
use std::io;
use std::path::Path;

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Read a compiled SPIR-V binary into words.
pub fn read_spirv(path: &Path) -> Result<Vec<u32>> {
    let load_error = |source: io::Error| GpuError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(load_error)?;
    let words = ash::util::read_spv(&mut file).map_err(load_error)?;

    if words.first() != Some(&SPIRV_MAGIC) {
        return Err(load_error(io::Error::new(
            io::ErrorKind::InvalidData,
            "missing SPIR-V magic number",
        )));
    }

    tracing::debug!("Read shader {} ({} words)", path.display(), words.len());
    Ok(words)
}

/// Load a SPIR-V file and wrap it in a shader module.
///
/// # Safety
/// The device must be valid.
pub unsafe fn load_shader_module(device: &ash::Device, path: &Path) -> Result<vk::ShaderModule> {
    let words = read_spirv(path).inspect_err(|e| tracing::error!("{e}"))?;
    let create_info = vk::ShaderModuleCreateInfo::default().code(&words);

    unsafe { device.create_shader_module(&create_info, None) }
        .map_err(|e| GpuError::ShaderModule(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("prism-shader-{}-{name}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    fn words_to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn reads_valid_module() {
        let words = [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0];
        let path = temp_file("valid.spv", &words_to_bytes(&words));

        let read = read_spirv(&path).unwrap();
        assert_eq!(read, words);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_is_load_error() {
        let path = std::env::temp_dir().join("prism-shader-does-not-exist.spv");
        match read_spirv(&path) {
            Err(GpuError::ShaderLoad { path: p, source }) => {
                assert_eq!(p, path);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected ShaderLoad, got {other:?}"),
        }
    }

    #[test]
    fn unaligned_file_is_rejected() {
        let path = temp_file("unaligned.spv", &[0x03, 0x02, 0x23]);
        assert!(matches!(read_spirv(&path), Err(GpuError::ShaderLoad { .. })));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let path = temp_file("magic.spv", &words_to_bytes(&[0xDEAD_BEEF, 0]));
        let err = read_spirv(&path).unwrap_err();
        assert!(err.to_string().contains("magic"));
        std::fs::remove_file(path).unwrap();
    }
}
