//! Loads the WGSL kernels.
//!
//! Kernel sources are embedded in the binary. Before compilation a kernel's `#import "file.wgsl"`
//! lines are replaced by the named file, recursively, and the constant prelude generated from
//! `tether_gpu_shared::constants` is put in front.

use std::collections::{BTreeMap, BTreeSet};

use tether_gpu_shared::wgsl_prelude;

use crate::{
    error::{Error, Result},
    gpu_manager::Gpu,
};

/// Turns a shader name into a compiled module
pub trait ShaderLoader {
    /// Compile the shader called `name`
    ///
    /// # Errors
    /// `ShaderNotFound` for unknown names, `CompileFailure` if the device rejects the source
    fn compile(&self, gpu: &Gpu, name: &str) -> Result<wgpu::ShaderModule>;
}

/// WGSL sources, by file name
#[derive(Clone, Debug, Default)]
pub struct ShaderLibrary {
    /// Raw, unresolved sources
    sources: BTreeMap<String, String>,
}

impl ShaderLibrary {
    /// Shared structs and grid math
    pub const COMMON: &'static str = "common.wgsl";
    /// Particle integration
    pub const PARTICLE: &'static str = "particle.wgsl";
    /// Spring force accumulation
    pub const SPRING: &'static str = "spring.wgsl";
    /// Grid construction
    pub const GRID: &'static str = "grid.wgsl";
    /// Grid reset
    pub const CLEAN_GRID: &'static str = "clean_grid.wgsl";

    /// The kernels that ship with the crate
    #[must_use]
    #[inline]
    pub fn embedded() -> Self {
        let mut library = Self::default();
        library.insert(Self::COMMON, include_str!("../assets/shaders/common.wgsl"));
        library.insert(Self::PARTICLE, include_str!("../assets/shaders/particle.wgsl"));
        library.insert(Self::SPRING, include_str!("../assets/shaders/spring.wgsl"));
        library.insert(Self::GRID, include_str!("../assets/shaders/grid.wgsl"));
        library.insert(Self::CLEAN_GRID, include_str!("../assets/shaders/clean_grid.wgsl"));
        library
    }

    /// Add a source, or replace the one already called `name`
    #[inline]
    pub fn insert(&mut self, name: &str, source: &str) {
        if self.sources.insert(name.to_owned(), source.to_owned()).is_some() {
            log::debug!("Replaced shader source `{name}`");
        }
    }

    /// The complete source of `name`: the constant prelude, then the file with its imports
    /// expanded. Each file is only ever included once.
    ///
    /// # Errors
    /// `ShaderNotFound` if `name`, or anything it imports, is unknown
    #[inline]
    pub fn resolve(&self, name: &str) -> Result<String> {
        let mut resolved = wgsl_prelude();
        let mut included = BTreeSet::new();
        self.expand(name, &mut included, &mut resolved)?;
        Ok(resolved)
    }

    /// Append `name` to `output`, recursing into its imports first
    fn expand(&self, name: &str, included: &mut BTreeSet<String>, output: &mut String) -> Result<()> {
        if !included.insert(name.to_owned()) {
            return Ok(());
        }
        let source = self
            .sources
            .get(name)
            .ok_or_else(|| Error::ShaderNotFound(name.to_owned()))?;

        for line in source.lines() {
            if let Some(import) = parse_import(line) {
                self.expand(import, included, output)?;
                continue;
            }
            output.push_str(line);
            output.push('\n');
        }
        Ok(())
    }
}

/// `#import "common.wgsl"` → `common.wgsl`
fn parse_import(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("#import")?;
    rest.trim().strip_prefix('"')?.strip_suffix('"')
}

impl ShaderLoader for ShaderLibrary {
    #[inline]
    fn compile(&self, gpu: &Gpu, name: &str) -> Result<wgpu::ShaderModule> {
        let source = self.resolve(name)?;
        log::debug!("Compiling shader `{name}`");
        gpu.scoped(name, |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })
    }
}

#[expect(clippy::unwrap_used, reason = "Tests")]
#[expect(clippy::panic, reason = "Tests")]
#[cfg(test)]
mod tests {
    use super::*;

    const KERNELS: [&str; 4] = [
        ShaderLibrary::PARTICLE,
        ShaderLibrary::SPRING,
        ShaderLibrary::GRID,
        ShaderLibrary::CLEAN_GRID,
    ];

    fn validate(name: &str, source: &str) {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|error| panic!("{name}:\n{}", error.emit_to_string(source)));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .unwrap_or_else(|error| panic!("{name}: {error:?}"));
    }

    #[test]
    fn every_kernel_parses_and_validates() {
        let library = ShaderLibrary::embedded();
        for name in KERNELS {
            validate(name, &library.resolve(name).unwrap());
        }
    }

    #[test]
    fn every_kernel_has_a_main_entry_point() {
        let library = ShaderLibrary::embedded();
        for name in KERNELS {
            let source = library.resolve(name).unwrap();
            let module = naga::front::wgsl::parse_str(&source).unwrap();
            assert!(
                module
                    .entry_points
                    .iter()
                    .any(|entry| entry.name == "main" && entry.stage == naga::ShaderStage::Compute),
                "{name} has no compute `main`"
            );
        }
    }

    #[test]
    fn imports_are_expanded_once_and_after_the_prelude() {
        let mut library = ShaderLibrary::default();
        library.insert("a.wgsl", "const A: u32 = 1u;");
        library.insert("b.wgsl", "#import \"a.wgsl\"\nconst B: u32 = A;");
        library.insert("main.wgsl", "#import \"a.wgsl\"\n#import \"b.wgsl\"\nconst C: u32 = B;");

        let resolved = library.resolve("main.wgsl").unwrap();
        let prelude = wgsl_prelude();
        assert!(resolved.starts_with(&prelude));
        let body = &resolved[prelude.len()..];
        assert_eq!(body.matches("const A:").count(), 1);
        let a = body.find("const A:").unwrap();
        let b = body.find("const B:").unwrap();
        let c = body.find("const C:").unwrap();
        assert!(a < b && b < c);
        assert!(!resolved.contains("#import"));
    }

    #[test]
    fn circular_imports_terminate() {
        let mut library = ShaderLibrary::default();
        library.insert("a.wgsl", "#import \"b.wgsl\"\n// a");
        library.insert("b.wgsl", "#import \"a.wgsl\"\n// b");
        let resolved = library.resolve("a.wgsl").unwrap();
        assert!(resolved.ends_with("// b\n// a\n"));
    }

    #[test]
    fn unknown_imports_are_reported() {
        let mut library = ShaderLibrary::default();
        library.insert("main.wgsl", "#import \"missing.wgsl\"");
        assert!(matches!(
            library.resolve("main.wgsl"),
            Err(Error::ShaderNotFound(name)) if name == "missing.wgsl"
        ));
        assert!(matches!(
            library.resolve("nope.wgsl"),
            Err(Error::ShaderNotFound(_))
        ));
    }

    #[test]
    fn overriding_a_source_replaces_it() {
        let mut library = ShaderLibrary::embedded();
        library.insert(ShaderLibrary::CLEAN_GRID, "// replaced");
        let resolved = library.resolve(ShaderLibrary::CLEAN_GRID).unwrap();
        assert!(resolved.ends_with("// replaced\n"));
    }

    #[test]
    fn parsing_import_lines() {
        assert_eq!(parse_import("#import \"common.wgsl\""), Some("common.wgsl"));
        assert_eq!(parse_import("  #import   \"x.wgsl\"  "), Some("x.wgsl"));
        assert_eq!(parse_import("// #import \"x.wgsl\""), None);
        assert_eq!(parse_import("#import common.wgsl"), None);
    }
}
