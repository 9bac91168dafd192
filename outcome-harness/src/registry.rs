// Copyright (c) The outcome-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery of test classes.
//!
//! Test classes are declared up front in a [`TestRegistry`], each with the name of its parent
//! class. [`discover_test_classes`] walks every declared class up its ancestor chain and
//! collects the classes that derive directly from [`BASE_CLASS`].
//!
//! Only direct children of the base are collected. A class two or more levels below the base
//! contributes its direct-child ancestor rather than itself, so that ancestor is collected
//! again, and a warning is logged. Suites built from such a registry fail the duplicate-name
//! check.

use crate::{context::ExecutionContext, errors::DiscoveryError, unit_test::UnitTest};
use indexmap::IndexMap;
use std::{collections::HashSet, fmt, io, sync::Arc};
use tracing::warn;

/// The name of the base class all test classes derive from.
pub const BASE_CLASS: &str = "UnitTest";

/// A resolved class: its name and the name of its immediate ancestor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassInfo {
    /// The name of the class.
    pub name: String,

    /// The name of the immediate ancestor, or `None` for a root class.
    pub parent: Option<String>,
}

/// A source of classes that can be searched for tests.
pub trait ClassCatalog {
    /// Lists the names of every class in the catalog.
    fn class_names(&self) -> io::Result<Vec<String>>;

    /// Resolves a class name, returning `None` if it's unknown.
    fn resolve(&self, name: &str) -> Option<ClassInfo>;
}

/// Returns every class in `catalog` that derives directly from [`BASE_CLASS`], following the
/// ancestor chain of each listed class.
///
/// Fails without partial results if the catalog can't be listed, if a class or one of its
/// ancestors can't be resolved, or if an ancestor chain loops.
pub fn discover_test_classes(
    catalog: &(impl ClassCatalog + ?Sized),
) -> Result<Vec<String>, DiscoveryError> {
    let names = catalog.class_names().map_err(DiscoveryError::CatalogRead)?;

    let mut classes = Vec::new();
    for name in names {
        if let Some(direct_child) = find_direct_child(catalog, &name)? {
            classes.push(direct_child);
        }
    }
    Ok(classes)
}

fn find_direct_child(
    catalog: &(impl ClassCatalog + ?Sized),
    name: &str,
) -> Result<Option<String>, DiscoveryError> {
    let resolve = |name: &str| {
        catalog
            .resolve(name)
            .ok_or_else(|| DiscoveryError::ClassResolution {
                name: name.to_owned(),
            })
    };

    let mut seen = HashSet::new();
    let mut current = resolve(name)?;
    loop {
        if !seen.insert(current.name.clone()) {
            return Err(DiscoveryError::InheritanceCycle {
                name: name.to_owned(),
            });
        }
        match current.parent.as_deref() {
            Some(BASE_CLASS) => {
                if current.name != name {
                    warn!(
                        class = name,
                        collected = %current.name,
                        "class is not a direct child of {BASE_CLASS}, collecting its ancestor instead",
                    );
                }
                return Ok(Some(current.name));
            }
            Some(parent) => current = resolve(parent)?,
            None => return Ok(None),
        }
    }
}

/// A factory that creates a test given the suite's execution context.
pub type TestFactory<C> = fn(Arc<C>) -> UnitTest<C>;

/// The list of classes available for discovery.
///
/// Registering a name twice replaces the earlier registration.
pub struct TestRegistry<C: ExecutionContext> {
    classes: IndexMap<String, RegisteredClass<C>>,
}

struct RegisteredClass<C: ExecutionContext> {
    parent: Option<String>,
    factory: Option<TestFactory<C>>,
}

impl<C: ExecutionContext> TestRegistry<C> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            classes: IndexMap::new(),
        }
    }

    /// Registers a test class deriving directly from [`BASE_CLASS`].
    pub fn register_test(
        &mut self,
        name: impl Into<String>,
        factory: TestFactory<C>,
    ) -> &mut Self {
        self.insert(name.into(), Some(BASE_CLASS.to_owned()), Some(factory))
    }

    /// Registers a test class deriving from another registered class.
    pub fn register_subtest(
        &mut self,
        name: impl Into<String>,
        parent: impl Into<String>,
        factory: TestFactory<C>,
    ) -> &mut Self {
        self.insert(name.into(), Some(parent.into()), Some(factory))
    }

    /// Registers a class that can't be instantiated, such as a shared intermediate class or
    /// a helper class that isn't a test.
    pub fn register_class(&mut self, name: impl Into<String>, parent: Option<&str>) -> &mut Self {
        self.insert(name.into(), parent.map(str::to_owned), None)
    }

    /// Returns the number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if no classes are registered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Returns the test classes found in this registry.
    pub fn discover(&self) -> Result<Vec<String>, DiscoveryError> {
        discover_test_classes(self)
    }

    /// Discovers test classes and creates one test for each.
    pub fn instantiate(&self, context: &Arc<C>) -> Result<Vec<UnitTest<C>>, DiscoveryError> {
        let names = self.discover()?;
        let factories = names
            .into_iter()
            .map(|name| {
                self.classes
                    .get(&name)
                    .and_then(|class| class.factory)
                    .ok_or(DiscoveryError::NotInstantiable { name })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(factories
            .into_iter()
            .map(|factory| factory(context.clone()))
            .collect())
    }

    fn insert(
        &mut self,
        name: String,
        parent: Option<String>,
        factory: Option<TestFactory<C>>,
    ) -> &mut Self {
        self.classes.insert(name, RegisteredClass { parent, factory });
        self
    }
}

impl<C: ExecutionContext> Default for TestRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ExecutionContext> fmt::Debug for TestRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.classes.iter().map(|(name, class)| (name, &class.parent)))
            .finish()
    }
}

impl<C: ExecutionContext> ClassCatalog for TestRegistry<C> {
    fn class_names(&self) -> io::Result<Vec<String>> {
        Ok(self.classes.keys().cloned().collect())
    }

    fn resolve(&self, name: &str) -> Option<ClassInfo> {
        if let Some(class) = self.classes.get(name) {
            return Some(ClassInfo {
                name: name.to_owned(),
                parent: class.parent.clone(),
            });
        }
        // The base class is always resolvable, even if it wasn't registered.
        (name == BASE_CLASS).then(|| ClassInfo {
            name: BASE_CLASS.to_owned(),
            parent: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::LocalContext, unit_test::check_duplicate_names};
    use pretty_assertions::assert_eq;

    fn passing_test(name: &str, context: Arc<LocalContext>) -> UnitTest<LocalContext> {
        UnitTest::from_fn(name, context, |cx| {
            cx.mark_passed();
            Ok(())
        })
    }

    fn kernel_add(context: Arc<LocalContext>) -> UnitTest<LocalContext> {
        passing_test("kernel_add", context)
    }

    fn kernel_copy(context: Arc<LocalContext>) -> UnitTest<LocalContext> {
        passing_test("kernel_copy", context)
    }

    fn kernel_copy_2d(context: Arc<LocalContext>) -> UnitTest<LocalContext> {
        passing_test("kernel_copy_2d", context)
    }

    #[test]
    fn discovers_direct_children_in_order() {
        let mut registry = TestRegistry::<LocalContext>::new();
        registry
            .register_test("kernel_copy", kernel_copy)
            .register_class("AllocationHelper", None)
            .register_test("kernel_add", kernel_add);

        assert_eq!(
            registry.discover().expect("discovery succeeds"),
            vec!["kernel_copy".to_owned(), "kernel_add".to_owned()],
        );

        let tests = registry
            .instantiate(&Arc::new(LocalContext::new()))
            .expect("instantiation succeeds");
        let names: Vec<_> = tests.iter().map(|test| test.name()).collect();
        assert_eq!(names, vec!["kernel_copy", "kernel_add"]);
    }

    #[test]
    fn base_class_itself_is_not_a_test() {
        let mut registry = TestRegistry::<LocalContext>::new();
        registry.register_class(BASE_CLASS, None);
        let classes = registry.discover().expect("discovery succeeds");
        assert_eq!(classes, Vec::<String>::new());
    }

    #[test]
    fn deeper_descendants_collect_their_direct_child_ancestor() {
        let mut registry = TestRegistry::<LocalContext>::new();
        registry
            .register_test("kernel_copy", kernel_copy)
            .register_subtest("kernel_copy_2d", "kernel_copy", kernel_copy_2d);

        assert_eq!(
            registry.discover().expect("discovery succeeds"),
            vec!["kernel_copy".to_owned(), "kernel_copy".to_owned()],
        );

        let tests = registry
            .instantiate(&Arc::new(LocalContext::new()))
            .expect("instantiation succeeds");
        let error = check_duplicate_names(&tests).expect_err("ancestor is collected twice");
        assert_eq!(error.duplicates(), ["kernel_copy".to_owned()]);
    }

    #[test]
    fn abstract_direct_child_is_not_instantiable() {
        let mut registry = TestRegistry::<LocalContext>::new();
        registry
            .register_class("KernelTestBase", Some(BASE_CLASS))
            .register_subtest("kernel_add", "KernelTestBase", kernel_add);

        assert_eq!(
            registry.discover().expect("discovery succeeds"),
            vec!["KernelTestBase".to_owned(), "KernelTestBase".to_owned()],
        );
        let error = registry
            .instantiate(&Arc::new(LocalContext::new()))
            .expect_err("abstract class has no factory");
        assert!(
            matches!(&error, DiscoveryError::NotInstantiable { name } if name == "KernelTestBase"),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn unresolvable_ancestor_aborts_discovery() {
        let mut registry = TestRegistry::<LocalContext>::new();
        registry
            .register_test("kernel_add", kernel_add)
            .register_subtest("kernel_copy", "MissingBase", kernel_copy);

        let error = registry.discover().expect_err("MissingBase is not registered");
        assert!(
            matches!(&error, DiscoveryError::ClassResolution { name } if name == "MissingBase"),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn inheritance_cycle_is_detected() {
        let mut registry = TestRegistry::<LocalContext>::new();
        registry
            .register_class("A", Some("B"))
            .register_class("B", Some("A"));

        let error = registry.discover().expect_err("A and B form a cycle");
        assert!(
            matches!(&error, DiscoveryError::InheritanceCycle { name } if name == "A"),
            "unexpected error: {error}"
        );
    }

    struct ListedCatalog {
        names: Vec<&'static str>,
    }

    impl ClassCatalog for ListedCatalog {
        fn class_names(&self) -> io::Result<Vec<String>> {
            Ok(self.names.iter().map(|name| (*name).to_owned()).collect())
        }

        fn resolve(&self, name: &str) -> Option<ClassInfo> {
            let parent = match name {
                "kernel_add" => Some(BASE_CLASS),
                "UnitTest" => None,
                _ => return None,
            };
            Some(ClassInfo {
                name: name.to_owned(),
                parent: parent.map(str::to_owned),
            })
        }
    }

    #[test]
    fn unresolvable_listed_class_aborts_discovery() {
        let catalog = ListedCatalog {
            names: vec!["kernel_add", "Stale"],
        };
        let error = discover_test_classes(&catalog).expect_err("Stale can't be resolved");
        assert!(
            matches!(&error, DiscoveryError::ClassResolution { name } if name == "Stale"),
            "unexpected error: {error}"
        );
    }

    struct UnreadableCatalog;

    impl ClassCatalog for UnreadableCatalog {
        fn class_names(&self) -> io::Result<Vec<String>> {
            Err(io::Error::new(io::ErrorKind::NotFound, "code path missing"))
        }

        fn resolve(&self, _name: &str) -> Option<ClassInfo> {
            None
        }
    }

    #[test]
    fn catalog_read_error_aborts_discovery() {
        let error = discover_test_classes(&UnreadableCatalog).expect_err("catalog can't be read");
        assert!(
            matches!(error, DiscoveryError::CatalogRead(_)),
            "unexpected error: {error}"
        );
    }
}
