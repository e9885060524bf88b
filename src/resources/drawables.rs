//! Shared drawable collection.
//!
//! [`DrawableSet`] is a cheap-to-clone handle: the simulation keeps one clone
//! to add, remove and edit drawables, the render unit keeps another and takes
//! a [`snapshot`](DrawableSet::snapshot) at the start of every pass. A
//! snapshot is a vector of `Arc`s, so it costs one refcount bump per entity
//! and is immune to structural changes made while the pass is drawing: each
//! insert or removal is seen either entirely before or entirely after.
//!
//! Color edits go through [`DrawableSet::set_color`], which pushes the id
//! onto an invalidation channel drained by the draw dispatcher's color cache.

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::components::color::LogicalColor;
use crate::components::drawable::{Drawable, DrawableId};

#[derive(Clone)]
pub struct DrawableSet {
    items: Arc<RwLock<Vec<Arc<Drawable>>>>,
    tx_invalidate: Sender<DrawableId>,
    rx_invalidate: Receiver<DrawableId>,
}

impl Default for DrawableSet {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawableSet {
    pub fn new() -> Self {
        let (tx_invalidate, rx_invalidate) = unbounded();
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            tx_invalidate,
            rx_invalidate,
        }
    }

    pub fn from_drawables(drawables: impl IntoIterator<Item = Drawable>) -> Self {
        let set = Self::new();
        set.replace(drawables);
        set
    }

    /// Receiver of color invalidations, consumed by the render side.
    pub fn invalidations(&self) -> Receiver<DrawableId> {
        self.rx_invalidate.clone()
    }

    fn invalidate(&self, id: DrawableId) {
        let _ = self.tx_invalidate.send(id);
    }

    /// Append a drawable. Drawing order is insertion order. An existing
    /// drawable with the same id is replaced in place.
    pub fn insert(&self, drawable: Drawable) {
        let id = drawable.id;
        let mut items = self.items.write();
        match items.iter().position(|d| d.id == id) {
            Some(pos) => {
                items[pos] = Arc::new(drawable);
                drop(items);
                self.invalidate(id);
            }
            None => items.push(Arc::new(drawable)),
        }
    }

    /// Remove a drawable; returns it if it was present.
    pub fn remove(&self, id: DrawableId) -> Option<Drawable> {
        let removed = {
            let mut items = self.items.write();
            let pos = items.iter().position(|d| d.id == id)?;
            items.remove(pos)
        };
        self.invalidate(id);
        Some(Arc::unwrap_or_clone(removed))
    }

    /// Edit a drawable in place. Color edits made here are *not* seen by
    /// the color cache; use [`set_color`](Self::set_color) for those.
    pub fn update<F>(&self, id: DrawableId, edit: F) -> bool
    where
        F: FnOnce(&mut Drawable),
    {
        let mut items = self.items.write();
        match items.iter_mut().find(|d| d.id == id) {
            Some(slot) => {
                edit(Arc::make_mut(slot));
                true
            }
            None => false,
        }
    }

    /// Change the logical color and invalidate its cached native color.
    pub fn set_color(&self, id: DrawableId, color: Option<LogicalColor>) -> bool {
        let changed = self.update(id, |d| d.color = color);
        if changed {
            self.invalidate(id);
        }
        changed
    }

    /// Swap the whole collection for `drawables`.
    ///
    /// Only ids that disappeared or whose color changed are invalidated, so
    /// a frame that re-submits the same drawables keeps the color cache warm.
    pub fn replace(&self, drawables: impl IntoIterator<Item = Drawable>) {
        let fresh: Vec<Arc<Drawable>> = drawables.into_iter().map(Arc::new).collect();
        let colors: FxHashMap<DrawableId, Option<LogicalColor>> = fresh.iter().map(|d| (d.id, d.color)).collect();
        let old = std::mem::replace(&mut *self.items.write(), fresh);
        for d in old {
            if colors.get(&d.id) != Some(&d.color) {
                self.invalidate(d.id);
            }
        }
    }

    pub fn clear(&self) {
        self.replace(std::iter::empty());
    }

    pub fn get(&self, id: DrawableId) -> Option<Arc<Drawable>> {
        self.items.read().iter().find(|d| d.id == id).cloned()
    }

    /// Consistent copy of the current collection for one draw pass.
    pub fn snapshot(&self) -> Vec<Arc<Drawable>> {
        self.items.read().clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}
