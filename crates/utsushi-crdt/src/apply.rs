//! Fold patch records into a plain host snapshot.
//!
//! Folding every record of a diff from the empty document into an empty object
//! yields the same tree as materializing the document. Records whose parent
//! path no longer resolves are skipped. Conflict, mark and unknown records
//! carry no value change and are ignored.

use utsushi_types::{HostValue, Patch, Prop};

/// Apply `patches` to `root` in order.
pub fn apply_patches(root: &mut HostValue, patches: &[Patch]) {
    for patch in patches {
        apply_patch(root, patch);
    }
}

fn apply_patch(root: &mut HostValue, patch: &Patch) {
    let Some((last, parent_path)) = patch.path().split_last() else {
        return;
    };
    let Some(target) = walk(root, parent_path) else {
        return;
    };

    match patch {
        Patch::Put { value, .. } => put(target, last, value.clone()),
        Patch::Del { length, .. } => delete(target, last, length.unwrap_or(1)),
        Patch::Insert { values, .. } => {
            if let (HostValue::Array(array), Prop::Index(at)) = (target, last) {
                let at = (*at).min(array.items.len());
                array.items.splice(at..at, values.iter().cloned());
            }
        }
        Patch::Splice { value, .. } => {
            if let (HostValue::String(text), Prop::Index(at)) = (target, last) {
                let byte = char_to_byte(text, *at);
                text.insert_str(byte, value);
            }
        }
        Patch::Inc { value, .. } => {
            if let Some(HostValue::Number(n)) = child_mut(target, last) {
                *n += value;
            }
        }
        Patch::Mark { .. } | Patch::Conflict { .. } | Patch::Unknown { .. } => {}
    }
}

fn walk<'a>(mut node: &'a mut HostValue, path: &[Prop]) -> Option<&'a mut HostValue> {
    for prop in path {
        node = child_mut(node, prop)?;
    }
    Some(node)
}

fn child_mut<'a>(node: &'a mut HostValue, prop: &Prop) -> Option<&'a mut HostValue> {
    match (node, prop) {
        (HostValue::Object(object), Prop::Key(k)) => object.entries.get_mut(k),
        (HostValue::Array(array), Prop::Index(i)) => array.items.get_mut(*i),
        _ => None,
    }
}

fn put(target: &mut HostValue, prop: &Prop, value: HostValue) {
    match (target, prop) {
        (HostValue::Object(object), Prop::Key(k)) => {
            object.entries.insert(k.clone(), value);
        }
        (HostValue::Array(array), Prop::Index(i)) => {
            if let Some(slot) = array.items.get_mut(*i) {
                *slot = value;
            } else if *i == array.items.len() {
                array.items.push(value);
            }
        }
        _ => {}
    }
}

fn delete(target: &mut HostValue, prop: &Prop, length: usize) {
    match (target, prop) {
        (HostValue::Object(object), Prop::Key(k)) => {
            object.entries.shift_remove(k);
        }
        (HostValue::Array(array), Prop::Index(i)) => {
            let start = (*i).min(array.items.len());
            let end = start.saturating_add(length).min(array.items.len());
            array.items.drain(start..end);
        }
        (HostValue::String(text), Prop::Index(i)) => {
            let start = char_to_byte(text, *i);
            let end = char_to_byte(text, i.saturating_add(length));
            text.replace_range(start..end, "");
        }
        _ => {}
    }
}

/// Byte offset of the `index`th character, clamped to the end.
fn char_to_byte(text: &str, index: usize) -> usize {
    text.char_indices()
        .nth(index)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}
