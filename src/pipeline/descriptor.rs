//! What a stage provides to, and expects from, the registry.

use crate::{
    error::{Error, Result},
    registry::{ResourceKind, ResourceLookup},
};

/// Names of resources, one list per registry namespace
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[expect(clippy::exhaustive_structs, reason = "Built as literals by every stage")]
pub struct ResourceSet {
    /// Buffer names
    pub buffers: &'static [&'static str],
    /// Bind group names
    pub bind_groups: &'static [&'static str],
    /// Bind group layout names
    pub bind_group_layouts: &'static [&'static str],
}

impl ResourceSet {
    /// Nothing at all
    pub const EMPTY: Self = Self {
        buffers: &[],
        bind_groups: &[],
        bind_group_layouts: &[],
    };

    /// Every entry tagged with its namespace
    #[inline]
    pub fn entries(&self) -> impl Iterator<Item = (ResourceKind, &'static str)> {
        let Self {
            buffers,
            bind_groups,
            bind_group_layouts,
        } = *self;
        let buffers = buffers.iter().map(|&name| (ResourceKind::Buffer, name));
        let bind_groups = bind_groups
            .iter()
            .map(|&name| (ResourceKind::BindGroup, name));
        let layouts = bind_group_layouts
            .iter()
            .map(|&name| (ResourceKind::BindGroupLayout, name));
        buffers.chain(bind_groups).chain(layouts)
    }

    /// The first entry that `lookup` doesn't have
    #[inline]
    pub fn first_missing(
        &self,
        lookup: &impl ResourceLookup,
    ) -> Option<(ResourceKind, &'static str)> {
        self.entries()
            .find(|&(kind, name)| !lookup.contains(kind, name))
    }
}

/// A stage's dependency declaration.
///
/// Dependencies come in two flavours. `requires` must be registered before the stage is even
/// initialized. `links` only have to exist by the time its bind groups are built, which is what
/// lets two stages depend on each other's buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[expect(clippy::exhaustive_structs, reason = "Built as literals by every stage")]
pub struct Descriptor {
    /// Registered by the stage while creating its owned resources
    pub provides: ResourceSet,
    /// Needed before initialization
    pub requires: ResourceSet,
    /// Needed before bind groups are built
    pub links: ResourceSet,
}

impl Descriptor {
    /// Check everything needed to initialize
    ///
    /// # Errors
    /// `MissingDependency` naming the first absent resource
    #[inline]
    pub fn validate_requires(&self, stage: &'static str, lookup: &impl ResourceLookup) -> Result<()> {
        missing_dependency(stage, self.requires.first_missing(lookup))
    }

    /// Check everything needed to build bind groups, which is `requires` and `links`
    ///
    /// # Errors
    /// `MissingDependency` naming the first absent resource
    #[inline]
    pub fn validate_links(&self, stage: &'static str, lookup: &impl ResourceLookup) -> Result<()> {
        self.validate_requires(stage, lookup)?;
        missing_dependency(stage, self.links.first_missing(lookup))
    }

    /// Check that the stage registered everything it said it would
    ///
    /// # Errors
    /// `Unprovided` naming the first absent resource
    #[inline]
    pub fn validate_provides(&self, stage: &'static str, lookup: &impl ResourceLookup) -> Result<()> {
        match self.provides.first_missing(lookup) {
            Some((kind, name)) => Err(Error::Unprovided { stage, kind, name }),
            None => Ok(()),
        }
    }
}

fn missing_dependency(stage: &'static str, missing: Option<(ResourceKind, &'static str)>) -> Result<()> {
    match missing {
        Some((kind, name)) => Err(Error::MissingDependency { stage, kind, name }),
        None => Ok(()),
    }
}

#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    impl ResourceLookup for HashSet<(ResourceKind, &'static str)> {
        fn contains(&self, kind: ResourceKind, name: &str) -> bool {
            self.iter()
                .any(|&(entry_kind, entry_name)| entry_kind == kind && entry_name == name)
        }
    }

    const DESCRIPTOR: Descriptor = Descriptor {
        provides: ResourceSet {
            buffers: &["mine"],
            ..ResourceSet::EMPTY
        },
        requires: ResourceSet {
            buffers: &["before"],
            bind_group_layouts: &["layout"],
            ..ResourceSet::EMPTY
        },
        links: ResourceSet {
            buffers: &["later"],
            ..ResourceSet::EMPTY
        },
    };

    #[test]
    fn entries_are_tagged_with_their_namespace() {
        let entries: Vec<_> = DESCRIPTOR.requires.entries().collect();
        assert_eq!(
            entries,
            vec![
                (ResourceKind::Buffer, "before"),
                (ResourceKind::BindGroupLayout, "layout")
            ]
        );
    }

    #[test]
    fn requires_are_checked_per_namespace() {
        // A buffer called "layout" doesn't satisfy a layout called "layout"
        let registered = HashSet::from([
            (ResourceKind::Buffer, "before"),
            (ResourceKind::Buffer, "layout"),
        ]);
        let error = DESCRIPTOR.validate_requires("test", &registered).unwrap_err();
        assert!(matches!(
            error,
            Error::MissingDependency {
                stage: "test",
                kind: ResourceKind::BindGroupLayout,
                name: "layout"
            }
        ));
    }

    #[test]
    fn links_are_not_needed_to_initialize() {
        let registered = HashSet::from([
            (ResourceKind::Buffer, "before"),
            (ResourceKind::BindGroupLayout, "layout"),
        ]);
        assert!(DESCRIPTOR.validate_requires("test", &registered).is_ok());
        assert!(matches!(
            DESCRIPTOR.validate_links("test", &registered),
            Err(Error::MissingDependency { name: "later", .. })
        ));
    }

    #[test]
    fn links_also_recheck_requires() {
        let registered = HashSet::from([(ResourceKind::Buffer, "later")]);
        assert!(matches!(
            DESCRIPTOR.validate_links("test", &registered),
            Err(Error::MissingDependency { name: "before", .. })
        ));
    }

    #[test]
    fn unprovided_resources_are_reported() {
        let registered = HashSet::new();
        assert!(matches!(
            DESCRIPTOR.validate_provides("test", &registered),
            Err(Error::Unprovided { name: "mine", .. })
        ));
        let registered = HashSet::from([(ResourceKind::Buffer, "mine")]);
        assert!(DESCRIPTOR.validate_provides("test", &registered).is_ok());
    }
}
