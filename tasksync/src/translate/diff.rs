//! Field-level change detection between two snapshots.
//!
//! A field transition needs a remote write only if it was *updated* (new
//! value present and different from, or newer than, the old one) or
//! *removed* (old value present, new value absent). Equality is whatever
//! `PartialEq` means for the field's type: instants compare as instants,
//! tags compare as sets.

use crate::model::TaskSnapshot;

/// Outcome of comparing one field across two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change<'a, T: ?Sized> {
    /// Both absent, or equal.
    Unchanged,
    /// New value present and different.
    Updated(&'a T),
    /// Old value present, new value absent.
    Removed,
}

/// Returns `true` if `field` is present in `new` and absent from, or
/// unequal to, the value in `old`.
pub fn was_updated<T, F>(old: &TaskSnapshot, new: &TaskSnapshot, field: F) -> bool
where
    T: PartialEq + ?Sized,
    F: Fn(&TaskSnapshot) -> Option<&T>,
{
    match (field(old), field(new)) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(before), Some(after)) => before != after,
    }
}

/// Returns `true` if `field` is present in `old` and absent from `new`.
pub fn was_removed<T, F>(old: &TaskSnapshot, new: &TaskSnapshot, field: F) -> bool
where
    T: ?Sized,
    F: Fn(&TaskSnapshot) -> Option<&T>,
{
    field(old).is_some() && field(new).is_none()
}

/// Classifies the transition of `field` from `old` to `new`.
pub fn change<'a, T, F>(old: &'a TaskSnapshot, new: &'a TaskSnapshot, field: F) -> Change<'a, T>
where
    T: PartialEq + ?Sized,
    F: Fn(&'a TaskSnapshot) -> Option<&'a T>,
{
    match (field(old), field(new)) {
        (None, Some(after)) => Change::Updated(after),
        (Some(before), Some(after)) if before != after => Change::Updated(after),
        (Some(_), None) => Change::Removed,
        _ => Change::Unchanged,
    }
}
