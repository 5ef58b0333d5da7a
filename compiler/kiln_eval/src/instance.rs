//! Template instances and inheritance.
//!
//! Every template taking part in a render gets an [`Instance`] in an arena
//! owned by the render. An instance carries two name tables:
//!
//! - `overrides`: bare block names → the block that answers to them. When a
//!   template extends a parent, the child's entries are copied into the
//!   parent's table, so the parent's own calls reach the child's blocks.
//! - `methods`: names reachable as `parent.name`, `self.name`, ... Own
//!   blocks map to [`Method::Own`]; names only the parent defines map to
//!   [`Method::Forward`], resolved through the current `parent` link when
//!   called.
//!
//! ```text
//! child ──parent──▶ base
//!   ▲                 │
//!   └─────child───────┘     base.self = child.self
//! ```

use std::sync::Arc;

use kiln_codegen::{CompiledTemplate, FuncId};
use kiln_diagnostic::RenderErrorKind;
use kiln_ir::MAIN_FUNCTION;
use rustc_hash::FxHashMap;

/// Index of an instance in its render's arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct InstanceId(u32);

impl InstanceId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A function together with the instance it runs in.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct FuncRef {
    pub instance: InstanceId,
    pub func: FuncId,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Method {
    Own(FuncId),
    /// Defined by an ancestor; resolved through `parent` at call time.
    Forward,
}

/// Names that refer to related instances instead of values.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Relation {
    Local,
    SelfRef,
    Parent,
    Child,
}

impl Relation {
    pub fn from_name(name: &str) -> Option<Relation> {
        match name {
            "local" => Some(Relation::Local),
            "self" => Some(Relation::SelfRef),
            "parent" => Some(Relation::Parent),
            "child" => Some(Relation::Child),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Instance {
    pub template: Arc<CompiledTemplate>,
    pub overrides: FxHashMap<String, FuncRef>,
    pub methods: FxHashMap<String, Method>,
    pub imports: FxHashMap<String, InstanceId>,
    pub parent: Option<InstanceId>,
    pub child: Option<InstanceId>,
    /// The most-derived instance of the chain this one belongs to.
    pub self_ref: InstanceId,
}

#[derive(Debug, Default)]
pub struct Instances {
    arena: Vec<Instance>,
}

impl Instances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh, unlinked instance of `template`.
    pub fn instantiate(&mut self, template: Arc<CompiledTemplate>) -> InstanceId {
        let id = InstanceId(u32::try_from(self.arena.len()).unwrap_or(u32::MAX));
        let mut overrides = FxHashMap::default();
        let mut methods = FxHashMap::default();
        for (func, function) in template.blocks() {
            overrides.insert(function.name.clone(), FuncRef { instance: id, func });
            methods.insert(function.name.clone(), Method::Own(func));
        }
        self.arena.push(Instance {
            template,
            overrides,
            methods,
            imports: FxHashMap::default(),
            parent: None,
            child: None,
            self_ref: id,
        });
        id
    }

    #[inline]
    pub fn get(&self, id: InstanceId) -> &Instance {
        &self.arena[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: InstanceId) -> &mut Instance {
        &mut self.arena[id.index()]
    }

    /// Instantiate `template` as the parent of `child` and link the two.
    pub fn extend(&mut self, child: InstanceId, template: Arc<CompiledTemplate>) -> InstanceId {
        let parent = self.instantiate(template);

        let child_overrides: Vec<(String, FuncRef)> = self
            .get(child)
            .overrides
            .iter()
            .map(|(name, entry)| (name.clone(), *entry))
            .collect();
        let inherited: Vec<(String, FuncRef)> = self
            .get(parent)
            .overrides
            .iter()
            .filter(|(name, _)| !self.get(child).overrides.contains_key(*name))
            .map(|(name, entry)| (name.clone(), *entry))
            .collect();
        let self_ref = self.get(child).self_ref;

        let p = self.get_mut(parent);
        p.overrides.extend(child_overrides);
        p.child = Some(child);
        p.self_ref = self_ref;

        let c = self.get_mut(child);
        for (name, entry) in inherited {
            c.methods.entry(name.clone()).or_insert(Method::Forward);
            c.overrides.insert(name, entry);
        }
        c.parent = Some(parent);

        tracing::trace!(
            child = %self.get(child).template.filename(),
            parent = %self.get(parent).template.filename(),
            "extended template"
        );
        parent
    }

    /// `id` followed by every instance below it through `child` links,
    /// ending at the most-derived one.
    pub fn lineage(&self, id: InstanceId) -> impl Iterator<Item = InstanceId> + '_ {
        std::iter::successors(Some(id), |&id| self.get(id).child)
    }

    pub fn relative(&self, id: InstanceId, relation: Relation) -> Result<InstanceId, RenderErrorKind> {
        let instance = self.get(id);
        match relation {
            Relation::Local => Ok(id),
            Relation::SelfRef => Ok(instance.self_ref),
            Relation::Parent => instance
                .parent
                .ok_or(RenderErrorKind::NoRelative { relation: "parent" }),
            Relation::Child => instance
                .child
                .ok_or(RenderErrorKind::NoRelative { relation: "child" }),
        }
    }

    /// The block a bare `name` refers to inside `id`.
    ///
    /// Falls back to the parent chain for names an ancestor defines after
    /// this instance was linked.
    pub fn resolve_override(&self, mut id: InstanceId, name: &str) -> Option<FuncRef> {
        loop {
            let instance = self.get(id);
            if let Some(entry) = instance.overrides.get(name) {
                return Some(*entry);
            }
            id = instance.parent?;
        }
    }

    /// The block `instance.name` refers to.
    pub fn resolve_method(&self, mut id: InstanceId, name: &str) -> Result<FuncRef, RenderErrorKind> {
        if name == MAIN_FUNCTION {
            return Ok(FuncRef {
                instance: id,
                func: FuncId::MAIN,
            });
        }
        loop {
            let instance = self.get(id);
            match instance.methods.get(name) {
                Some(Method::Own(func)) => {
                    return Ok(FuncRef {
                        instance: id,
                        func: *func,
                    })
                }
                Some(Method::Forward) | None => match instance.parent {
                    Some(parent) => id = parent,
                    None => {
                        return Err(RenderErrorKind::MissingBlock {
                            name: name.to_owned(),
                        })
                    }
                },
            }
        }
    }
}
