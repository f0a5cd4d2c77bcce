use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, EntityId, LessonId, ModuleId};

/// A typed parent → child association in the catalog graph.
///
/// Implemented by zero-sized markers so that links, repositories and services
/// can be generic over which junction table they address.
pub trait Relation: Send + Sync + 'static {
    type Parent: EntityId;
    type Child: EntityId;

    /// Stable name, also used as the storage discriminator.
    const NAME: &'static str;
}

/// Course → Module junction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseModules {}

impl Relation for CourseModules {
    type Parent = CourseId;
    type Child = ModuleId;
    const NAME: &'static str = "course_modules";
}

/// Module → Lesson junction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleLessons {}

impl Relation for ModuleLessons {
    type Parent = ModuleId;
    type Child = LessonId;
    const NAME: &'static str = "module_lessons";
}

//
// ─── LINK ──────────────────────────────────────────────────────────────────────
//

/// An ordered association record. Unique on `(parent, child)`.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Link<R: Relation> {
    pub parent: R::Parent,
    pub child: R::Child,
    pub order: u32,
    #[serde(skip)]
    relation: PhantomData<fn() -> R>,
}

pub type CourseModuleLink = Link<CourseModules>;
pub type ModuleLessonLink = Link<ModuleLessons>;

impl<R: Relation> Link<R> {
    #[must_use]
    pub fn new(parent: R::Parent, child: R::Child, order: u32) -> Self {
        Self {
            parent,
            child,
            order,
            relation: PhantomData,
        }
    }

    /// Whether `other` addresses the same `(parent, child)` pair.
    #[must_use]
    pub fn same_pair(&self, other: &Self) -> bool {
        self.parent == other.parent && self.child == other.child
    }
}

// Manual impls: derives would require `R: Clone`/`R: PartialEq` on the marker.
impl<R: Relation> Clone for Link<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: Relation> Copy for Link<R> {}

impl<R: Relation> PartialEq for Link<R> {
    fn eq(&self, other: &Self) -> bool {
        self.same_pair(other) && self.order == other.order
    }
}

impl<R: Relation> Eq for Link<R> {}

impl<R: Relation> fmt::Debug for Link<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("relation", &R::NAME)
            .field("parent", &self.parent)
            .field("child", &self.child)
            .field("order", &self.order)
            .finish()
    }
}

//
// ─── LEGACY REFERENCE ──────────────────────────────────────────────────────────
//

/// A parent reference read from a legacy direct foreign key column.
pub struct LegacyRef<R: Relation> {
    pub parent: R::Parent,
    pub child: R::Child,
    relation: PhantomData<fn() -> R>,
}

impl<R: Relation> LegacyRef<R> {
    #[must_use]
    pub fn new(parent: R::Parent, child: R::Child) -> Self {
        Self {
            parent,
            child,
            relation: PhantomData,
        }
    }
}

impl<R: Relation> Clone for LegacyRef<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: Relation> Copy for LegacyRef<R> {}

impl<R: Relation> PartialEq for LegacyRef<R> {
    fn eq(&self, other: &Self) -> bool {
        self.parent == other.parent && self.child == other.child
    }
}

impl<R: Relation> Eq for LegacyRef<R> {}

impl<R: Relation> fmt::Debug for LegacyRef<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyRef")
            .field("relation", &R::NAME)
            .field("parent", &self.parent)
            .field("child", &self.child)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_pair_ignores_order() {
        let a = CourseModuleLink::new(CourseId::new(1), ModuleId::new(2), 0);
        let b = CourseModuleLink::new(CourseId::new(1), ModuleId::new(2), 5);
        assert!(a.same_pair(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn link_serializes_without_marker() {
        let link = ModuleLessonLink::new(ModuleId::new(3), LessonId::new(4), 1);
        let json = serde_json::to_value(link).unwrap();
        assert_eq!(json, serde_json::json!({"parent": 3, "child": 4, "order": 1}));
    }
}
