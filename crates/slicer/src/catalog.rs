use picker_protocol::models::ResolvedEntry;

/// Distance between consecutive order keys handed out by the catalog and by
/// new custom entries.
pub const ORDER_STEP: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Windows => "windows",
            Self::Linux => "linux",
        }
    }
}

/// A known slicer application and where it installs by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlicerDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub macos_path: &'static str,
    pub windows_path: &'static str,
    pub linux_path: &'static str,
}

impl SlicerDescriptor {
    pub fn default_path(&self, platform: Platform) -> &'static str {
        match platform {
            Platform::MacOs => self.macos_path,
            Platform::Windows => self.windows_path,
            Platform::Linux => self.linux_path,
        }
    }
}

pub const CATALOG: &[SlicerDescriptor] = &[
    SlicerDescriptor {
        id: "cura",
        name: "Cura",
        macos_path: "/Applications/Ultimaker Cura.app/Contents/MacOS/Ultimaker Cura",
        windows_path: r"C:\Program Files\Ultimaker Cura\Ultimaker-Cura.exe",
        linux_path: "/usr/bin/cura",
    },
    SlicerDescriptor {
        id: "prusaslicer",
        name: "PrusaSlicer",
        macos_path: "/Applications/PrusaSlicer.app/Contents/MacOS/PrusaSlicer",
        windows_path: r"C:\Program Files\PrusaSlicer\prusa-slicer.exe",
        linux_path: "/usr/bin/prusa-slicer",
    },
    SlicerDescriptor {
        id: "superslicer",
        name: "SuperSlicer",
        macos_path: "/Applications/SuperSlicer.app/Contents/MacOS/SuperSlicer",
        windows_path: r"C:\Program Files\SuperSlicer\super-slicer.exe",
        linux_path: "/usr/bin/super-slicer",
    },
    SlicerDescriptor {
        id: "orcaslicer",
        name: "OrcaSlicer",
        macos_path: "/Applications/OrcaSlicer.app/Contents/MacOS/OrcaSlicer",
        windows_path: r"C:\Program Files\OrcaSlicer\OrcaSlicer.exe",
        linux_path: "/usr/bin/orca-slicer",
    },
    SlicerDescriptor {
        id: "bambustudio",
        name: "Bambu Studio",
        macos_path: "/Applications/BambuStudio.app/Contents/MacOS/BambuStudio",
        windows_path: r"C:\Program Files\BambuStudio\BambuStudio.exe",
        linux_path: "/usr/bin/bambu-studio",
    },
    SlicerDescriptor {
        id: "slic3r",
        name: "Slic3r",
        macos_path: "/Applications/Slic3r.app/Contents/MacOS/Slic3r",
        windows_path: r"C:\Program Files\Slic3r\slic3r.exe",
        linux_path: "/usr/bin/slic3r",
    },
    SlicerDescriptor {
        id: "ideamaker",
        name: "IdeaMaker",
        macos_path: "/Applications/IdeaMaker.app/Contents/MacOS/IdeaMaker",
        windows_path: r"C:\Program Files\Raise3D\IdeaMaker\IdeaMaker.exe",
        linux_path: "/usr/bin/ideamaker",
    },
    SlicerDescriptor {
        id: "simplify3d",
        name: "Simplify3D",
        macos_path: "/Applications/Simplify3D.app/Contents/MacOS/Simplify3D",
        windows_path: r"C:\Program Files\Simplify3D\Simplify3D.exe",
        linux_path: "/usr/bin/simplify3d",
    },
    SlicerDescriptor {
        id: "kisslicer",
        name: "KISSlicer",
        macos_path: "/Applications/KISSlicer.app/Contents/MacOS/KISSlicer",
        windows_path: r"C:\Program Files\KISSlicer\KISSlicer.exe",
        linux_path: "/usr/bin/kisslicer",
    },
    SlicerDescriptor {
        id: "slic3rpe",
        name: "Slic3r PE",
        macos_path: "/Applications/Slic3r PE.app/Contents/MacOS/Slic3r PE",
        windows_path: r"C:\Program Files\Slic3r PE\slic3r-pe.exe",
        linux_path: "/usr/bin/slic3r-pe",
    },
];

pub fn descriptor(id: &str) -> Option<&'static SlicerDescriptor> {
    CATALOG.iter().find(|item| item.id == id)
}

/// Catalog position turned into an order key.
pub(crate) fn catalog_order(index: usize) -> i32 {
    i32::try_from(index)
        .unwrap_or(i32::MAX / ORDER_STEP)
        .saturating_mul(ORDER_STEP)
}

pub(crate) fn descriptor_order(id: &str) -> Option<i32> {
    CATALOG
        .iter()
        .position(|item| item.id == id)
        .map(catalog_order)
}

pub fn list_descriptors(platform: Platform) -> Vec<ResolvedEntry> {
    CATALOG
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let path = item.default_path(platform).to_string();
            ResolvedEntry {
                id: item.id.to_string(),
                name: item.name.to_string(),
                default_path: path.clone(),
                path,
                enabled: true,
                order: catalog_order(index),
                arguments: Vec::new(),
                working_dir: None,
                is_custom: false,
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "../tests/core/catalog_tests.rs"]
mod tests;
