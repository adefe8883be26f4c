//! Drag-driven manual reordering.
//!
//! A session tracks one drag: pointer positions produce a live preview order
//! and dropping yields the final order for [`PageLibrary::reorder`].
//! Nothing is persisted until the drop.
//!
//! [`PageLibrary::reorder`]: super::page::PageLibrary::reorder

/// Extent of one displayed item along the layout axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemBounds {
    pub start: f64,
    pub extent: f64,
}

impl ItemBounds {
    pub fn new(start: f64, extent: f64) -> Self {
        Self { start, extent }
    }

    pub fn midpoint(&self) -> f64 {
        self.start + self.extent / 2.0
    }
}

/// Index of the first item whose midpoint is at or past `pointer`.
///
/// Returns `bounds.len()` when the pointer is past every midpoint. The result
/// never exceeds `sentinel`, the position of the "add new" entry.
pub fn compute_insertion_index(bounds: &[ItemBounds], pointer: f64, sentinel: Option<usize>) -> usize {
    let index = bounds
        .iter()
        .position(|item| item.midpoint() >= pointer)
        .unwrap_or(bounds.len());

    match sentinel {
        Some(limit) => index.min(limit),
        None => index,
    }
}

/// Move `dragged` to `target`, keeping it ahead of the sentinel.
///
/// The clamp happens after removal since removing shifts indices. Unknown
/// items, the sentinel itself and `target` equal to the current index leave
/// the order unchanged.
pub fn preview_move<T: Clone + PartialEq>(
    order: &[T],
    dragged: &T,
    target: usize,
    sentinel: Option<&T>,
) -> Vec<T> {
    let Some(current) = order.iter().position(|item| item == dragged) else {
        return order.to_vec();
    };
    if target == current || sentinel == Some(dragged) {
        return order.to_vec();
    }

    let mut next = order.to_vec();
    let item = next.remove(current);

    let mut index = target.min(next.len());
    if let Some(limit) = sentinel.and_then(|s| next.iter().position(|item| item == s)) {
        index = index.min(limit);
    }

    next.insert(index, item);
    next
}

/// Transient state of one drag gesture
#[derive(Debug, Clone)]
pub struct DragReorderSession<T> {
    original: Vec<T>,
    preview: Vec<T>,
    dragged: T,
    sentinel: Option<T>,
}

impl<T: Clone + PartialEq> DragReorderSession<T> {
    /// Start dragging `dragged` within `order` (display order)
    pub fn new(order: Vec<T>, dragged: T) -> Self {
        Self {
            preview: order.clone(),
            original: order,
            dragged,
            sentinel: None,
        }
    }

    /// Mark the non-reorderable "add new" entry present in the order
    pub fn with_sentinel(mut self, sentinel: T) -> Self {
        self.sentinel = Some(sentinel);
        self
    }

    /// Order as currently displayed
    pub fn preview(&self) -> &[T] {
        &self.preview
    }

    pub fn is_changed(&self) -> bool {
        self.preview != self.original
    }

    fn sentinel_position(&self) -> Option<usize> {
        let sentinel = self.sentinel.as_ref()?;
        self.preview.iter().position(|item| item == sentinel)
    }

    /// Pointer moved; `bounds` describe the preview as displayed
    pub fn pointer_moved(&mut self, bounds: &[ItemBounds], pointer: f64) -> &[T] {
        let index = compute_insertion_index(bounds, pointer, self.sentinel_position());
        self.move_to(index)
    }

    /// Move the dragged item to an explicit index of the preview
    pub fn move_to(&mut self, target: usize) -> &[T] {
        self.preview = preview_move(&self.preview, &self.dragged, target, self.sentinel.as_ref());
        &self.preview
    }

    /// Drop: the final order, without the sentinel, ready to commit
    pub fn finish(self) -> Vec<T> {
        strip_sentinel(self.preview, self.sentinel.as_ref())
    }

    /// Abort: the order from before the drag, without the sentinel
    pub fn cancel(self) -> Vec<T> {
        strip_sentinel(self.original, self.sentinel.as_ref())
    }
}

fn strip_sentinel<T: PartialEq>(mut order: Vec<T>, sentinel: Option<&T>) -> Vec<T> {
    if let Some(sentinel) = sentinel {
        order.retain(|item| item != sentinel);
    }
    order
}
