//! Status slot table.
//!
//! Shared layout for the reserved region: an ordered vector of slots, each
//! free or bound to exactly one status line, plus an unbounded FIFO overflow
//! queue for lines waiting for a slot.
//!
//! Invariants:
//! * A `LineId` is bound to at most one slot and is never both bound and queued.
//! * Promotion always appends the promoted line at the tail; later slots shift
//!   one position toward the front. A long-lived line may therefore move to a
//!   different physical row when an earlier one is released.
//! * `text` is stored unclipped; clipping to the terminal width happens when a
//!   pass renders it.
//! * `rendered` mirrors what the last pass put on screen. `None` means unknown,
//!   so the next pass repaints the row unconditionally.
//!
//! The table is plain data. It does not lock, signal, or write; callers hold
//! the console mutex around it and decide when to request a pass from the
//! return values of the mutating calls. Unknown ids are ignored everywhere.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one status line. Allocated per handle and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(u64);

impl LineId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        LineId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(raw: u64) -> Self {
        LineId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Placement of a line: a slot index, a queue position (0 = next to be
/// promoted), or nowhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePosition {
    Slot(usize),
    Queued(usize),
    Absent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slot {
    owner: Option<LineId>,
    text: String,
    rendered: Option<String>,
}

impl Slot {
    fn bound(owner: LineId, text: String) -> Self {
        Self {
            owner: Some(owner),
            text,
            rendered: None,
        }
    }

    pub fn owner(&self) -> Option<LineId> {
        self.owner
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn rendered(&self) -> Option<&str> {
        self.rendered.as_deref()
    }

    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }
}

#[derive(Debug, Default)]
pub struct SlotTable {
    slots: Vec<Slot>,
    overflow: VecDeque<(LineId, String)>,
}

impl SlotTable {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![Slot::default(); slot_count],
            overflow: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn queued_len(&self) -> usize {
        self.overflow.len()
    }

    pub fn bound_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_free()).count()
    }

    /// Queued ids, oldest first.
    pub fn queued(&self) -> impl Iterator<Item = LineId> + '_ {
        self.overflow.iter().map(|(id, _)| *id)
    }

    pub fn slot_of(&self, id: LineId) -> Option<usize> {
        self.slots.iter().position(|s| s.owner == Some(id))
    }

    pub fn is_queued(&self, id: LineId) -> bool {
        self.overflow.iter().any(|(q, _)| *q == id)
    }

    /// Current text of a bound or queued line.
    pub fn text_of(&self, id: LineId) -> Option<&str> {
        match self.slot_of(id) {
            Some(idx) => Some(self.slots[idx].text()),
            None => self.pending_text(id),
        }
    }

    /// Where `id` currently lives.
    pub fn position(&self, id: LineId) -> LinePosition {
        if let Some(idx) = self.slot_of(id) {
            return LinePosition::Slot(idx);
        }
        match self.overflow.iter().position(|(q, _)| *q == id) {
            Some(pos) => LinePosition::Queued(pos),
            None => LinePosition::Absent,
        }
    }

    pub fn pending_text(&self, id: LineId) -> Option<&str> {
        self.overflow
            .iter()
            .find(|(q, _)| *q == id)
            .map(|(_, t)| t.as_str())
    }

    /// Grow or shrink to exactly `n` slots.
    ///
    /// Growing appends free slots and promotes queued lines into them. Each
    /// shrink step drops a free trailing slot, else moves the trailing binding
    /// into the first free slot, else evicts the trailing line to the front of
    /// the overflow queue. Every step removes one slot, so the loop ends.
    pub fn resize(&mut self, n: usize) {
        if n >= self.slots.len() {
            self.slots.resize_with(n, Slot::default);
            self.promote();
            return;
        }
        while self.slots.len() > n {
            let Some(last) = self.slots.pop() else { break };
            let Some(owner) = last.owner else { continue };
            if let Some(free) = self.slots.iter().position(Slot::is_free) {
                self.slots[free] = Slot::bound(owner, last.text);
            } else {
                self.overflow.push_front((owner, last.text));
            }
        }
        tracing::trace!(
            target: "console.slots",
            slots = self.slots.len(),
            queued = self.overflow.len(),
            "resized"
        );
    }

    /// Bind `id` to the first free slot or queue it. No-op when `id` is
    /// already bound or queued.
    pub fn acquire(&mut self, id: LineId) {
        if self.slot_of(id).is_some() || self.is_queued(id) {
            return;
        }
        match self.slots.iter_mut().find(|s| s.is_free()) {
            Some(slot) => {
                slot.owner = Some(id);
                slot.text.clear();
            }
            None => self.overflow.push_back((id, String::new())),
        }
    }

    /// Free `id`'s slot (promoting queued lines) or drop its queue entry.
    /// Returns `true` when the visible region changed.
    pub fn release(&mut self, id: LineId) -> bool {
        if let Some(idx) = self.slot_of(id) {
            let slot = &mut self.slots[idx];
            slot.owner = None;
            slot.text.clear();
            self.promote();
            return true;
        }
        if let Some(pos) = self.overflow.iter().position(|(q, _)| *q == id) {
            self.overflow.remove(pos);
        }
        false
    }

    /// Replace `id`'s text. Returns `true` when the line is visible and a pass
    /// is needed; queued lines only update their pending text.
    pub fn update(&mut self, id: LineId, text: String) -> bool {
        if let Some(idx) = self.slot_of(id) {
            self.slots[idx].text = text;
            return true;
        }
        if let Some((_, pending)) = self.overflow.iter_mut().find(|(q, _)| *q == id) {
            *pending = text;
        }
        false
    }

    /// Fill free slots from the overflow queue, oldest first.
    pub fn promote(&mut self) {
        while !self.overflow.is_empty() {
            let Some(free) = self.slots.iter().position(Slot::is_free) else {
                return;
            };
            let Some((id, text)) = self.overflow.pop_front() else {
                return;
            };
            self.slots.remove(free);
            for slot in &mut self.slots[free..] {
                slot.rendered = None;
            }
            self.slots.push(Slot::bound(id, text));
            tracing::trace!(target: "console.slots", line = id.raw(), from = free, "promoted");
        }
    }

    /// Forget what is on screen so the next pass repaints every row.
    pub fn invalidate_all(&mut self) {
        for slot in &mut self.slots {
            slot.rendered = None;
        }
    }

    /// Collect the rows whose text differs from what is on screen, marking
    /// them rendered. Index `i` of the result is `Some(text)` when row `i`
    /// must be rewritten.
    pub fn take_changes(&mut self) -> Vec<Option<String>> {
        self.slots
            .iter_mut()
            .map(|slot| {
                if slot.rendered.as_deref() == Some(slot.text.as_str()) {
                    None
                } else {
                    slot.rendered = Some(slot.text.clone());
                    Some(slot.text.clone())
                }
            })
            .collect()
    }
}
