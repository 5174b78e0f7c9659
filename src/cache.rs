//! Run-scoped cache of parsed classes and hierarchy lookups.

use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::class_data::{ClassData, FieldData, MethodData, ParseError};
use crate::resources::{class_resource_name, Resources};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("can't find class {0}")]
    ClassNotFound(String),
    #[error("{resource}: {source}")]
    Parse {
        resource: String,
        #[source]
        source: ParseError,
    },
    #[error("can't read {resource}: {source}")]
    Io {
        resource: String,
        #[source]
        source: std::io::Error,
    },
}

/// A method found through the hierarchy together with the class that
/// declares it.
#[derive(Clone, Debug)]
pub struct ResolvedMethod {
    pub class: Rc<ClassData>,
    index: usize,
}

impl ResolvedMethod {
    pub fn method(&self) -> &MethodData {
        &self.class.methods()[self.index]
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedField {
    pub class: Rc<ClassData>,
    index: usize,
}

impl ResolvedField {
    pub fn field(&self) -> &FieldData {
        &self.class.fields()[self.index]
    }
}

/// Owns every [`ClassData`] parsed during one translation run. Absent
/// classes are remembered too, so a missing class is probed only once.
pub struct ClassDataCache<'r> {
    resources: &'r dyn Resources,
    classes: RefCell<FxHashMap<String, Option<Rc<ClassData>>>>,
}

impl<'r> ClassDataCache<'r> {
    pub fn new(resources: &'r dyn Resources) -> Self {
        ClassDataCache {
            resources,
            classes: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn resources(&self) -> &'r dyn Resources {
        self.resources
    }

    /// Loads a class, or `None` if no provider has it.
    pub fn find_class(&self, name: &str) -> Result<Option<Rc<ClassData>>, CacheError> {
        if let Some(entry) = self.classes.borrow().get(name) {
            return Ok(entry.clone());
        }
        let loaded = self.load(name)?;
        self.classes
            .borrow_mut()
            .insert(name.to_string(), loaded.clone());
        Ok(loaded)
    }

    /// Like [`find_class`](Self::find_class) but absence is an error.
    pub fn get_class(&self, name: &str) -> Result<Rc<ClassData>, CacheError> {
        self.find_class(name)?
            .ok_or_else(|| CacheError::ClassNotFound(name.to_string()))
    }

    fn load(&self, name: &str) -> Result<Option<Rc<ClassData>>, CacheError> {
        if name.starts_with('[') {
            return Ok(None);
        }
        let resource = class_resource_name(name);
        let bytes = match self.resources.get(&resource) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::trace!("no resource for {name}");
                return Ok(None);
            }
            Err(source) => return Err(CacheError::Io { resource, source }),
        };
        let class = ClassData::parse(&bytes).map_err(|source| CacheError::Parse {
            resource: resource.clone(),
            source,
        })?;
        if class.name() != name {
            tracing::warn!("{resource} declares class {}", class.name());
        }
        tracing::trace!("parsed {name}");
        Ok(Some(Rc::new(class)))
    }

    /// Visits `start`, its superclass chain, then every interface reachable
    /// from the chain (depth first, each interface once). Missing classes
    /// are skipped.
    pub fn traverse_hierarchy<F>(&self, start: &str, mut visit: F) -> Result<ControlFlow<()>, CacheError>
    where
        F: FnMut(&Rc<ClassData>) -> ControlFlow<()>,
    {
        let mut seen = FxHashSet::default();
        let mut chain = Vec::new();
        let mut next = Some(start.to_string());
        while let Some(name) = next.take() {
            if !seen.insert(name.clone()) {
                break;
            }
            let Some(class) = self.find_class(&name)? else {
                break;
            };
            if visit(&class).is_break() {
                return Ok(ControlFlow::Break(()));
            }
            next = class.super_name().map(str::to_string);
            chain.push(class);
        }

        let mut pending: Vec<String> = Vec::new();
        for class in &chain {
            for iface in class.interfaces().iter().rev() {
                pending.push(iface.clone());
            }
            while let Some(name) = pending.pop() {
                if !seen.insert(name.clone()) {
                    continue;
                }
                let Some(iface) = self.find_class(&name)? else {
                    continue;
                };
                if visit(&iface).is_break() {
                    return Ok(ControlFlow::Break(()));
                }
                for sup in iface.interfaces().iter().rev() {
                    pending.push(sup.clone());
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Calls `visitor` for every declaration of `name` + `descriptor` in the
    /// hierarchy of `class`, in lookup order, until it breaks.
    pub fn find_methods<F>(
        &self,
        class: &str,
        name: &str,
        descriptor: &str,
        mut visitor: F,
    ) -> Result<ControlFlow<()>, CacheError>
    where
        F: FnMut(&ResolvedMethod) -> ControlFlow<()>,
    {
        self.traverse_hierarchy(class, |cd| match cd.method(name, descriptor) {
            Some((index, _)) => visitor(&ResolvedMethod {
                class: Rc::clone(cd),
                index,
            }),
            None => ControlFlow::Continue(()),
        })
    }

    /// First declaration found walking up from `class`.
    pub fn find_method(
        &self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<Option<ResolvedMethod>, CacheError> {
        let mut found = None;
        self.find_methods(class, name, descriptor, |m| {
            found = Some(m.clone());
            ControlFlow::Break(())
        })?;
        Ok(found)
    }

    pub fn find_field(
        &self,
        class: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<Option<ResolvedField>, CacheError> {
        let mut found = None;
        self.traverse_hierarchy(class, |cd| match cd.field(name, descriptor) {
            Some((index, _)) => {
                found = Some(ResolvedField {
                    class: Rc::clone(cd),
                    index,
                });
                ControlFlow::Break(())
            }
            None => ControlFlow::Continue(()),
        })?;
        Ok(found)
    }

    /// Number of names probed so far, present or not.
    pub fn len(&self) -> usize {
        self.classes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.borrow().is_empty()
    }
}
