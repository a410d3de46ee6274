//! Generational cell arena backing every runtime value.

use std::fmt;

use crate::object::Object;
use crate::value::Value;

struct Cell {
    generation: u32,
    marked: bool,
    object: Option<Object>,
}

/// Arena of heap cells with generational indices and a free list.
///
/// Freed slots are reused, bumping the generation so stale [`Value`] handles
/// no longer resolve.
pub(crate) struct Heap {
    cells: Vec<Cell>,
    free_list: Vec<u32>,
    live: usize,
    total_allocations: usize,
}

impl Heap {
    pub(crate) fn new() -> Self {
        Self {
            cells: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            total_allocations: 0,
        }
    }

    pub(crate) fn alloc(&mut self, object: Object) -> Value {
        self.live += 1;
        self.total_allocations += 1;

        if let Some(index) = self.free_list.pop() {
            let cell = &mut self.cells[index as usize];
            cell.object = Some(object);
            cell.marked = false;
            Value::new(index, cell.generation)
        } else {
            let index = self.cells.len() as u32;
            self.cells.push(Cell {
                generation: 0,
                marked: false,
                object: Some(object),
            });
            Value::new(index, 0)
        }
    }

    pub(crate) fn get(&self, value: Value) -> Option<&Object> {
        let cell = self.cells.get(value.index as usize)?;
        if cell.generation != value.generation {
            return None;
        }
        cell.object.as_ref()
    }

    pub(crate) fn get_mut(&mut self, value: Value) -> Option<&mut Object> {
        let cell = self.cells.get_mut(value.index as usize)?;
        if cell.generation != value.generation {
            return None;
        }
        cell.object.as_mut()
    }

    pub(crate) fn is_live(&self, value: Value) -> bool {
        self.get(value).is_some()
    }

    /// Sets the mark bit. Returns `true` if the cell was live and unmarked.
    pub(crate) fn mark(&mut self, value: Value) -> bool {
        match self.cells.get_mut(value.index as usize) {
            Some(cell)
                if cell.generation == value.generation
                    && cell.object.is_some()
                    && !cell.marked =>
            {
                cell.marked = true;
                true
            }
            _ => false,
        }
    }

    /// Removes every unmarked cell and clears the marks of the survivors.
    ///
    /// Returns the handles and payloads of the swept cells; the caller owns
    /// running any finalisation on them.
    pub(crate) fn sweep(&mut self) -> Vec<(Value, Object)> {
        let mut swept = Vec::new();
        for (index, cell) in self.cells.iter_mut().enumerate() {
            if cell.object.is_none() {
                continue;
            }
            if cell.marked {
                cell.marked = false;
                continue;
            }
            if let Some(object) = cell.object.take() {
                swept.push((Value::new(index as u32, cell.generation), object));
                cell.generation = cell.generation.wrapping_add(1);
                self.free_list.push(index as u32);
            }
        }
        self.live -= swept.len();
        swept
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live
    }

    pub(crate) fn total_allocations(&self) -> usize {
        self.total_allocations
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("slot_count", &self.cells.len())
            .field("live_count", &self.live)
            .field("free_count", &self.free_list.len())
            .finish()
    }
}
