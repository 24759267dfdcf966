//! Everything that can go wrong while building or running a simulation.

use crate::registry::ResourceKind;

/// Errors raised by the registry, the stages and the engine
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A stage asked for a resource that no earlier stage has registered yet
    #[error("stage `{stage}` depends on {kind} `{name}`, which hasn't been registered")]
    MissingDependency {
        /// Label of the stage doing the asking
        stage: &'static str,
        /// What kind of resource it is
        kind: ResourceKind,
        /// Name it was expected under
        name: &'static str,
    },

    /// A lookup by name found nothing
    #[error("no {kind} registered as `{name}`")]
    NotFound {
        /// What kind of resource was looked up
        kind: ResourceKind,
        /// The name that was looked up
        name: String,
    },

    /// A stage finished creating its resources without registering one it promised
    #[error("stage `{stage}` didn't register the {kind} `{name}` it provides")]
    Unprovided {
        /// Label of the stage
        stage: &'static str,
        /// What kind of resource is missing
        kind: ResourceKind,
        /// Name it promised to register
        name: &'static str,
    },

    /// A stage's bind groups were needed before its initialization completed
    #[error("stage `{0}` hasn't completed initialization")]
    Uninitialized(&'static str),

    /// The GPU rejected a shader module or a pipeline built from it
    #[error("`{shader}` failed to compile: {message}")]
    CompileFailure {
        /// Name of the shader source
        shader: String,
        /// The validation error reported by the GPU
        message: String,
    },

    /// No shader source is known by this name
    #[error("no shader source called `{0}`")]
    ShaderNotFound(String),

    /// No GPU adapter was found at all
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    /// An adapter exists, but it can't run these kernels
    #[error("adapter `{adapter}` is unsupported: {reason}")]
    UnsupportedAdapter {
        /// Name of the adapter
        adapter: String,
        /// The missing capability
        reason: String,
    },

    /// The adapter refused to hand out a device
    #[error(transparent)]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    /// Mapping a staging buffer for readback failed
    #[error(transparent)]
    BufferMap(#[from] wgpu::BufferAsyncError),

    /// The readback callback never reported back
    #[error("buffer readback channel closed before the map completed")]
    ReadbackChannel,
}

/// Convenience alias used throughout the crate
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dependency_names_the_stage_and_the_resource() {
        let error = Error::MissingDependency {
            stage: "particle",
            kind: ResourceKind::Buffer,
            name: "forces",
        };
        assert_eq!(
            error.to_string(),
            "stage `particle` depends on buffer `forces`, which hasn't been registered"
        );
    }

    #[test]
    fn not_found_names_the_kind() {
        let error = Error::NotFound {
            kind: ResourceKind::BindGroupLayout,
            name: "global".to_owned(),
        };
        assert_eq!(error.to_string(), "no bind group layout registered as `global`");
    }
}
