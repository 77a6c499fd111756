//! Target backend identifiers and the device-flag bitset.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Bitset selecting which backend(s) a construct, archive or dump
    /// operation targets simultaneously.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceFlags: u32 {
        const D3D11 = 1 << 0;
        const D3D12 = 1 << 1;
        const VULKAN = 1 << 2;
        const METAL_MACOS = 1 << 3;
        const METAL_IOS = 1 << 4;
        const GL = 1 << 5;
        const GLES = 1 << 6;
    }
}

impl DeviceFlags {
    /// Iterates the backends present in this set, lowest bit first.
    pub fn backends(self) -> BackendIter {
        BackendIter { bits: self.bits() }
    }
}

impl Default for DeviceFlags {
    fn default() -> Self {
        DeviceFlags::empty()
    }
}

/// Iterator over the backends of a [`DeviceFlags`] value.
///
/// Extracts the lowest set bit on each step, so iteration order matches
/// the bit order of the flags.
pub struct BackendIter {
    bits: u32,
}

impl Iterator for BackendIter {
    type Item = Backend;

    fn next(&mut self) -> Option<Backend> {
        while self.bits != 0 {
            let low = self.bits & self.bits.wrapping_neg();
            self.bits &= !low;
            if let Some(backend) = Backend::from_flag_bit(low) {
                return Some(backend);
            }
        }
        None
    }
}

/// A single target backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Backend {
    Dx11,
    Dx12,
    Vulkan,
    MetalMacos,
    MetalIos,
    Gl,
    Gles,
}

impl Backend {
    fn from_flag_bit(bit: u32) -> Option<Self> {
        match DeviceFlags::from_bits_truncate(bit) {
            DeviceFlags::D3D11 => Some(Backend::Dx11),
            DeviceFlags::D3D12 => Some(Backend::Dx12),
            DeviceFlags::VULKAN => Some(Backend::Vulkan),
            DeviceFlags::METAL_MACOS => Some(Backend::MetalMacos),
            DeviceFlags::METAL_IOS => Some(Backend::MetalIos),
            DeviceFlags::GL => Some(Backend::Gl),
            DeviceFlags::GLES => Some(Backend::Gles),
            _ => None,
        }
    }

    /// The flag bit corresponding to this backend.
    pub fn flag(self) -> DeviceFlags {
        match self {
            Backend::Dx11 => DeviceFlags::D3D11,
            Backend::Dx12 => DeviceFlags::D3D12,
            Backend::Vulkan => DeviceFlags::VULKAN,
            Backend::MetalMacos => DeviceFlags::METAL_MACOS,
            Backend::MetalIos => DeviceFlags::METAL_IOS,
            Backend::Gl => DeviceFlags::GL,
            Backend::Gles => DeviceFlags::GLES,
        }
    }

    /// Backend name, also used as the directory name in bytecode dumps.
    pub fn name(self) -> &'static str {
        match self {
            Backend::Dx11 => "DirectX11",
            Backend::Dx12 => "DirectX12",
            Backend::Vulkan => "Vulkan",
            Backend::MetalMacos => "Metal_macOS",
            Backend::MetalIos => "Metal_iOS",
            Backend::Gl => "OpenGL",
            Backend::Gles => "OpenGLES",
        }
    }

    /// Whether this backend embeds compiled bytecode (as opposed to
    /// patched source text) in archives.
    pub fn stores_bytecode(self) -> bool {
        match self {
            Backend::Dx11 | Backend::Dx12 | Backend::Vulkan => true,
            Backend::MetalMacos | Backend::MetalIos => true,
            Backend::Gl | Backend::Gles => false,
        }
    }

    /// File extension for a dumped shader artifact, including the dot.
    pub fn artifact_extension(self) -> &'static str {
        match self {
            Backend::Dx11 | Backend::Dx12 => ".dxbc",
            Backend::Vulkan => ".spv",
            Backend::MetalMacos | Backend::MetalIos => ".air",
            Backend::Gl | Backend::Gles => ".glsl",
        }
    }

    /// Whether this is one of the Metal backends.
    pub fn is_metal(self) -> bool {
        matches!(self, Backend::MetalMacos | Backend::MetalIos)
    }
}
