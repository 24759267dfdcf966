//! The lifecycle shared by every compute stage.
//!
//! A stage is driven through [`ComputePipeline`]:
//!   1. `initialize` checks the stage's `requires`, lets it create and register the buffers it
//!      owns, then compiles its kernel.
//!   2. `complete_initialization` checks its `links` and builds its bind groups. Stages that
//!      depend on each other can both be initialized before either is completed.
//!   3. `run` dispatches the kernel into a compute pass.

pub mod buffers;
pub mod builder;
pub mod descriptor;

use std::sync::Arc;

use crate::{
    error::{Error, Result},
    gpu_manager::Gpu,
    registry::Registry,
    shader::ShaderLoader,
};
use buffers::{BindGroupLayouts, BindGroups};
use builder::Builder;
use descriptor::Descriptor;

/// How a stage's kernel is compiled and bound
#[derive(Clone, Copy, Debug)]
#[expect(clippy::exhaustive_structs, reason = "Built as literals by every stage")]
pub struct KernelConfig {
    /// Name of the shader source
    pub shader: &'static str,
    /// Name of the compute entry point
    pub entry_point: &'static str,
    /// Invocations per workgroup, must match `@workgroup_size`
    pub workgroup_size: u32,
    /// Does the kernel bind the global bind group at group 0?
    pub uses_global: bool,
    /// Entries of the stage's own bind groups, in group order. They start at group 1 when the
    /// global group is used, otherwise at group 0.
    pub bind_group_layouts: &'static [&'static [wgpu::BindGroupLayoutEntry]],
}

/// A single simulation stage
pub trait Stage {
    /// Used in labels, logs and errors
    const LABEL: &'static str;

    /// What this stage registers and what it needs registered
    fn descriptor(&self) -> Descriptor;

    /// How to compile and bind the kernel
    fn kernel(&self) -> KernelConfig;

    /// Number of kernel invocations per frame
    fn instance_count(&self) -> u32;

    /// Allocate, seed and register every buffer the descriptor `provides`
    ///
    /// # Errors
    /// If a resource can't be created
    fn create_owned_resources(&mut self, gpu: &Gpu, registry: &mut Registry) -> Result<()>;

    /// Build the stage's own bind groups, one per layout
    ///
    /// # Errors
    /// If a resource the bind groups refer to isn't registered
    fn create_bind_groups(
        &self,
        gpu: &Gpu,
        registry: &Registry,
        layouts: &[wgpu::BindGroupLayout],
    ) -> Result<Vec<wgpu::BindGroup>>;
}

/// Number of workgroups needed to cover `count` invocations
#[must_use]
#[inline]
pub const fn workgroup_count(count: u32, workgroup_size: u32) -> u32 {
    count.div_ceil(workgroup_size)
}

/// A compiled kernel and the layouts of the stage's own groups
struct Kernel {
    pipeline: wgpu::ComputePipeline,
    layouts: Vec<wgpu::BindGroupLayout>,
}

/// Drives a [`Stage`] through initialization and dispatch
pub struct ComputePipeline<S: Stage> {
    /// The stage being driven
    stage: S,
    /// Set by `initialize`
    kernel: Option<Kernel>,
    /// Set by `complete_initialization`
    bind_groups: Option<Vec<wgpu::BindGroup>>,
    /// Set by `complete_initialization`, when the kernel uses it
    global: Option<Arc<wgpu::BindGroup>>,
}

impl<S: Stage> ComputePipeline<S> {
    /// Wrap a stage. Nothing touches the GPU until `initialize`.
    #[must_use]
    #[inline]
    pub const fn new(stage: S) -> Self {
        Self {
            stage,
            kernel: None,
            bind_groups: None,
            global: None,
        }
    }

    /// The stage being driven
    #[must_use]
    #[inline]
    pub const fn stage(&self) -> &S {
        &self.stage
    }

    /// The stage being driven, mutably
    #[must_use]
    #[inline]
    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    /// Has `initialize` succeeded?
    #[must_use]
    #[inline]
    pub const fn is_initialized(&self) -> bool {
        self.kernel.is_some()
    }

    /// Has `complete_initialization` succeeded?
    #[must_use]
    #[inline]
    pub const fn is_ready(&self) -> bool {
        self.kernel.is_some() && self.bind_groups.is_some()
    }

    /// Check `requires`, create the stage's owned resources and compile its kernel.
    ///
    /// # Errors
    /// `MissingDependency` before anything is created, `Unprovided` if the stage didn't register
    /// everything it promised, or a shader error
    #[inline]
    pub fn initialize(
        &mut self,
        gpu: &Gpu,
        registry: &mut Registry,
        shaders: &dyn ShaderLoader,
    ) -> Result<()> {
        log::debug!("Initializing stage `{}`", S::LABEL);
        let descriptor = self.stage.descriptor();
        descriptor.validate_requires(S::LABEL, registry)?;

        self.stage.create_owned_resources(gpu, registry)?;
        descriptor.validate_provides(S::LABEL, registry)?;

        let config = self.stage.kernel();
        let module = shaders.compile(gpu, config.shader)?;
        let global_layout = if config.uses_global {
            Some(registry.bind_group_layout(BindGroupLayouts::GLOBAL)?)
        } else {
            None
        };

        let kernel = gpu.scoped(config.shader, |device| {
            let builder = Builder::new(device);
            let layouts: Vec<wgpu::BindGroupLayout> = config
                .bind_group_layouts
                .iter()
                .enumerate()
                .map(|(group, entries)| {
                    builder.bind_group_layout(&format!("{} group {group}", S::LABEL), entries)
                })
                .collect();

            let mut all_layouts: Vec<&wgpu::BindGroupLayout> = Vec::new();
            all_layouts.extend(global_layout.as_deref());
            all_layouts.extend(layouts.iter());

            let pipeline =
                builder.compute_pipeline(S::LABEL, &module, config.entry_point, &all_layouts);
            Kernel { pipeline, layouts }
        })?;

        self.kernel = Some(kernel);
        Ok(())
    }

    /// Check `links` and build the stage's bind groups.
    ///
    /// # Errors
    /// `Uninitialized` if `initialize` hasn't succeeded, `MissingDependency` if a linked resource
    /// isn't registered yet
    #[inline]
    pub fn complete_initialization(&mut self, gpu: &Gpu, registry: &Registry) -> Result<()> {
        log::debug!("Completing stage `{}`", S::LABEL);
        let kernel = self.kernel.as_ref().ok_or(Error::Uninitialized(S::LABEL))?;
        self.stage
            .descriptor()
            .validate_links(S::LABEL, registry)?;

        let config = self.stage.kernel();
        self.global = if config.uses_global {
            Some(registry.bind_group(BindGroups::GLOBAL)?)
        } else {
            None
        };
        let bind_groups = self
            .stage
            .create_bind_groups(gpu, registry, &kernel.layouts)?;
        self.bind_groups = Some(bind_groups);
        Ok(())
    }

    /// Record this stage's dispatch. Does nothing until the stage is ready, or while it has
    /// nothing to process.
    #[inline]
    pub fn run(&self, pass: &mut wgpu::ComputePass<'_>) {
        let count = self.stage.instance_count();
        let (Some(kernel), Some(bind_groups)) = (&self.kernel, &self.bind_groups) else {
            log::trace!("Skipping stage `{}`, it isn't ready", S::LABEL);
            return;
        };
        if count == 0 {
            log::trace!("Skipping stage `{}`, it has no instances", S::LABEL);
            return;
        }

        pass.set_pipeline(&kernel.pipeline);
        let mut first_local_group = 0_u32;
        if let Some(global) = &self.global {
            pass.set_bind_group(0, &**global, &[]);
            first_local_group = 1;
        }
        for (bind_group, index) in bind_groups.iter().zip(first_local_group..) {
            pass.set_bind_group(index, bind_group, &[]);
        }

        let workgroups = workgroup_count(count, self.stage.kernel().workgroup_size);
        pass.dispatch_workgroups(workgroups, 1, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workgroups_round_up() {
        assert_eq!(workgroup_count(0, 64), 0);
        assert_eq!(workgroup_count(1, 64), 1);
        assert_eq!(workgroup_count(64, 64), 1);
        assert_eq!(workgroup_count(65, 64), 2);
        assert_eq!(workgroup_count(5151, 64), 81);
    }
}
