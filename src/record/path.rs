//! Path-addressed access to the output record.
//!
//! Paths follow the grammar `segment ( '.' segment )*` with
//! `segment := name ( '[' index ']' )?`, e.g.
//! `engine[0].exhaust_gas_temperature[3]`. A path naming a field that does
//! not exist makes [`Accessor::has`] return false and turns the other
//! operations into no-ops.

use super::{Fields, Mark, Slot, SlotMut, Value};

/// A mutable facade over one record, interpreting path strings.
pub struct Accessor<'a> {
    root: &'a mut dyn Fields,
}

impl<'a> Accessor<'a> {
    pub fn new(root: &'a mut dyn Fields) -> Self {
        Self { root }
    }

    /// Whether the path resolves and the addressed field holds a value. A
    /// repeated field without an index is considered present.
    pub fn has(&self, path: &str) -> bool {
        let Some((slot, index)) = resolve(&*self.root, path) else {
            return false;
        };
        match slot {
            Slot::Int(v) => v.is_some(),
            Slot::Float(v) => v.is_some(),
            Slot::Mark(v) => v.is_some(),
            Slot::IntList(v) => index.is_none_or(|i| v.len() > i),
            Slot::FloatList(v) => index.is_none_or(|i| v.len() > i),
            Slot::Engines(v) => index.is_none_or(|i| v.len() > i),
        }
    }

    /// Read the addressed value. Enum fields read as their [`Mark`] value;
    /// message fields have no scalar reading.
    pub fn get(&self, path: &str) -> Option<Value> {
        let (slot, index) = resolve(&*self.root, path)?;
        match slot {
            Slot::Int(v) => v.map(Value::from),
            Slot::Float(v) => v.map(Value::from),
            Slot::Mark(v) => v.map(Value::from),
            Slot::IntList(v) => v.get(index?).copied().map(Value::from),
            Slot::FloatList(v) => v.get(index?).copied().map(Value::from),
            Slot::Engines(_) => None,
        }
    }

    /// Write the addressed value, coercing to the destination type: integer
    /// fields take the integer part, float fields round to one decimal, and
    /// enum fields map numeric values by ordinal. Writing one element past
    /// the end of a repeated field appends it.
    pub fn set(&mut self, path: &str, value: Value) {
        let Some((slot, index)) = resolve_mut(&mut *self.root, path) else {
            return;
        };
        match slot {
            SlotMut::Int(v) => *v = Some(value.as_i64() as i32),
            SlotMut::Float(v) => *v = Some(round_tenth(value.as_f64())),
            SlotMut::Mark(v) => match value {
                Value::Mark(mark) => *v = Some(mark),
                // An out-of-range ordinal leaves the field unchanged.
                numeric => {
                    if let Some(mark) = Mark::from_ordinal(numeric.as_i64()) {
                        *v = Some(mark);
                    }
                }
            },
            SlotMut::IntList(v) => {
                if let Some(i) = index {
                    store(v, i, value.as_i64() as i32);
                }
            }
            SlotMut::FloatList(v) => {
                if let Some(i) = index {
                    store(v, i, round_tenth(value.as_f64()));
                }
            }
            SlotMut::Engines(_) => {}
        }
    }

    /// Unset a scalar field, or zero an element of a repeated field (zero is
    /// the in-band "cleared" sentinel for repeated elements).
    pub fn clear(&mut self, path: &str) {
        if !self.has(path) {
            return;
        }
        let Some((slot, index)) = resolve_mut(&mut *self.root, path) else {
            return;
        };
        match slot {
            SlotMut::Int(v) => *v = None,
            SlotMut::Float(v) => *v = None,
            SlotMut::Mark(v) => *v = None,
            SlotMut::IntList(v) => {
                if let Some(i) = index {
                    store(v, i, 0);
                }
            }
            SlotMut::FloatList(v) => {
                if let Some(i) = index {
                    store(v, i, 0.0);
                }
            }
            SlotMut::Engines(_) => {}
        }
    }
}

fn round_tenth(value: f64) -> f32 {
    ((value * 10.0).round() / 10.0) as f32
}

fn store<T>(list: &mut Vec<T>, index: usize, value: T) {
    if list.len() <= index {
        list.push(value);
    } else {
        list[index] = value;
    }
}

struct Segment<'s> {
    name: &'s str,
    index: Option<usize>,
}

fn parse_segment(text: &str) -> Option<Segment<'_>> {
    match text.split_once('[') {
        None => Some(Segment {
            name: text,
            index: None,
        }),
        Some((name, rest)) => {
            let index = rest.strip_suffix(']')?.parse().ok()?;
            Some(Segment {
                name,
                index: Some(index),
            })
        }
    }
}

fn resolve<'r>(mut container: &'r dyn Fields, path: &str) -> Option<(Slot<'r>, Option<usize>)> {
    let mut segments = path.split('.').peekable();
    loop {
        let segment = parse_segment(segments.next()?)?;
        let slot = container.slot(segment.name)?;
        if segments.peek().is_none() {
            return Some((slot, segment.index));
        }
        let Slot::Engines(list) = slot else {
            return None;
        };
        container = list.get(segment.index?)?;
    }
}

/// As [`resolve`], but auto-extending intermediate repeated messages with
/// default entries up to the addressed index.
fn resolve_mut<'r>(
    mut container: &'r mut dyn Fields,
    path: &str,
) -> Option<(SlotMut<'r>, Option<usize>)> {
    let mut segments = path.split('.').peekable();
    loop {
        let segment = parse_segment(segments.next()?)?;
        let current = container;
        let slot = current.slot_mut(segment.name)?;
        if segments.peek().is_none() {
            return Some((slot, segment.index));
        }
        let SlotMut::Engines(list) = slot else {
            return None;
        };
        let index = segment.index?;
        while list.len() <= index {
            list.push(Default::default());
        }
        container = &mut list[index];
    }
}
