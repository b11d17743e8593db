//! Wire names of replicated collection operations.

pub const ADD: &str = "Add";
pub const REMOVE: &str = "Remove";
pub const REMOVE_AT: &str = "RemoveAt";
pub const CLEAR: &str = "Clear";
pub const INSERT: &str = "Insert";
pub const INDEXER: &str = "[]";
pub const ADD_ITEM: &str = "AddItem";
pub const REMOVE_ITEM: &str = "RemoveItem";
/// Collection-interface add on sets, distinct from the value-returning add.
pub const ADD_UNIT: &str = "Add2";
