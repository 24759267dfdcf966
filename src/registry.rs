//! Named store of the GPU resources shared between stages.
//!
//! Buffers, bind groups and bind group layouts live in three separate namespaces, so the same name
//! can refer to, say, both a buffer and a layout. Every entry is shared by reference. Registering
//! a name twice replaces the old entry and logs a warning.

use core::fmt;
use std::{collections::BTreeMap, sync::Arc};

use crate::error::{Error, Result};

/// Which namespace a resource lives in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum ResourceKind {
    /// A `wgpu::Buffer`
    Buffer,
    /// A `wgpu::BindGroup`
    BindGroup,
    /// A `wgpu::BindGroupLayout`
    BindGroupLayout,
}

impl fmt::Display for ResourceKind {
    #[inline]
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::Buffer => "buffer",
            Self::BindGroup => "bind group",
            Self::BindGroupLayout => "bind group layout",
        };
        formatter.write_str(name)
    }
}

/// What happened to a registration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Registration {
    /// The name was new
    Inserted,
    /// The name was already taken, its previous resource has been dropped from the registry
    Replaced,
}

/// Anything that can answer "is this resource registered?". Lets dependency checks run without
/// a GPU.
pub trait ResourceLookup {
    /// Is there a `kind` registered as `name`?
    fn contains(&self, kind: ResourceKind, name: &str) -> bool;
}

/// One namespace of the registry
struct Namespace<T> {
    kind: ResourceKind,
    entries: BTreeMap<String, Arc<T>>,
}

impl<T> Namespace<T> {
    const fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    fn register(&mut self, name: &str, resource: T) -> Registration {
        if self.entries.insert(name.to_owned(), Arc::new(resource)).is_some() {
            log::warn!("Replacing already registered {} `{name}`", self.kind);
            return Registration::Replaced;
        }
        Registration::Inserted
    }

    fn get(&self, name: &str) -> Result<Arc<T>> {
        self.entries.get(name).cloned().ok_or_else(|| Error::NotFound {
            kind: self.kind,
            name: name.to_owned(),
        })
    }

    fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

/// The registry itself. Owned by the engine and lent to every stage during initialization.
pub struct Registry {
    /// Storage and uniform buffers
    buffers: Namespace<wgpu::Buffer>,
    /// Ready-made bind groups
    bind_groups: Namespace<wgpu::BindGroup>,
    /// Layouts that other stages build their pipelines against
    bind_group_layouts: Namespace<wgpu::BindGroupLayout>,
}

impl Default for Registry {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self {
            buffers: Namespace::new(ResourceKind::Buffer),
            bind_groups: Namespace::new(ResourceKind::BindGroup),
            bind_group_layouts: Namespace::new(ResourceKind::BindGroupLayout),
        }
    }

    /// Store a buffer, replacing any buffer already under `name`
    #[inline]
    pub fn register_buffer(&mut self, name: &str, buffer: wgpu::Buffer) -> Registration {
        self.buffers.register(name, buffer)
    }

    /// Store a bind group, replacing any bind group already under `name`
    #[inline]
    pub fn register_bind_group(&mut self, name: &str, bind_group: wgpu::BindGroup) -> Registration {
        self.bind_groups.register(name, bind_group)
    }

    /// Store a bind group layout, replacing any layout already under `name`
    #[inline]
    pub fn register_bind_group_layout(
        &mut self,
        name: &str,
        layout: wgpu::BindGroupLayout,
    ) -> Registration {
        self.bind_group_layouts.register(name, layout)
    }

    /// # Errors
    /// `NotFound` if no buffer is registered as `name`
    #[inline]
    pub fn buffer(&self, name: &str) -> Result<Arc<wgpu::Buffer>> {
        self.buffers.get(name)
    }

    /// # Errors
    /// `NotFound` if no bind group is registered as `name`
    #[inline]
    pub fn bind_group(&self, name: &str) -> Result<Arc<wgpu::BindGroup>> {
        self.bind_groups.get(name)
    }

    /// # Errors
    /// `NotFound` if no bind group layout is registered as `name`
    #[inline]
    pub fn bind_group_layout(&self, name: &str) -> Result<Arc<wgpu::BindGroupLayout>> {
        self.bind_group_layouts.get(name)
    }

    /// Is there a buffer called `name`?
    #[must_use]
    #[inline]
    pub fn has_buffer(&self, name: &str) -> bool {
        self.buffers.has(name)
    }

    /// Is there a bind group called `name`?
    #[must_use]
    #[inline]
    pub fn has_bind_group(&self, name: &str) -> bool {
        self.bind_groups.has(name)
    }

    /// Is there a bind group layout called `name`?
    #[must_use]
    #[inline]
    pub fn has_bind_group_layout(&self, name: &str) -> bool {
        self.bind_group_layouts.has(name)
    }

    /// Log every registered name at debug level
    #[inline]
    pub fn log_contents(&self) {
        log::debug!("Registered buffers: {:?}", self.buffers.names());
        log::debug!("Registered bind groups: {:?}", self.bind_groups.names());
        log::debug!(
            "Registered bind group layouts: {:?}",
            self.bind_group_layouts.names()
        );
    }

    /// Drop every entry. Resources still referenced elsewhere stay alive until those go too.
    #[inline]
    pub fn clear(&mut self) {
        self.buffers.entries.clear();
        self.bind_groups.entries.clear();
        self.bind_group_layouts.entries.clear();
    }

    /// Number of entries across all namespaces
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.entries.len()
            + self.bind_groups.entries.len()
            + self.bind_group_layouts.entries.len()
    }

    /// Is nothing registered at all?
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceLookup for Registry {
    #[inline]
    fn contains(&self, kind: ResourceKind, name: &str) -> bool {
        match kind {
            ResourceKind::Buffer => self.has_buffer(name),
            ResourceKind::BindGroup => self.has_bind_group(name),
            ResourceKind::BindGroupLayout => self.has_bind_group_layout(name),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_a_new_name_inserts() {
        let mut namespace = Namespace::new(ResourceKind::Buffer);
        assert_eq!(namespace.register("particles", 1_u32), Registration::Inserted);
        assert!(namespace.has("particles"));
        assert_eq!(*namespace.get("particles").unwrap(), 1);
    }

    #[test]
    fn registering_a_taken_name_replaces_and_warns() {
        let mut namespace = Namespace::new(ResourceKind::Buffer);
        namespace.register("particles", 1_u32);
        assert_eq!(namespace.register("particles", 2_u32), Registration::Replaced);
        assert_eq!(*namespace.get("particles").unwrap(), 2);
        assert_eq!(namespace.names(), vec!["particles"]);
    }

    #[test]
    fn getting_a_missing_name_fails() {
        let namespace: Namespace<u32> = Namespace::new(ResourceKind::BindGroup);
        let error = namespace.get("global").unwrap_err();
        assert!(matches!(
            error,
            Error::NotFound {
                kind: ResourceKind::BindGroup,
                ref name
            } if name == "global"
        ));
    }

    #[test]
    fn replaced_resources_stay_alive_for_existing_holders() {
        let mut namespace = Namespace::new(ResourceKind::Buffer);
        namespace.register("forces", String::from("old"));
        let held = namespace.get("forces").unwrap();
        namespace.register("forces", String::from("new"));
        assert_eq!(*held, "old");
        assert_eq!(*namespace.get("forces").unwrap(), "new");
    }

    #[test]
    fn an_empty_registry_has_nothing() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert!(!registry.contains(ResourceKind::Buffer, "particles"));
        assert!(!registry.contains(ResourceKind::BindGroupLayout, "global"));
    }
}
