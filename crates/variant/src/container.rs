//! Operations on the container variants: array, object and tuple.
//!
//! Containers hold strong references to their members. All operations go
//! through the handle with interior mutability, so shared containers can
//! be grown and shrunk from any holder.

use purc_core::error::{CoreError, CoreResult};

use crate::variant::{Variant, VariantData};

impl Variant {
    fn wrong_type(&self, expected: &str) -> CoreError {
        CoreError::wrong_data_type(expected, self.variant_type().as_str())
    }

    /// Number of members of an array.
    pub fn array_size(&self) -> CoreResult<usize> {
        match &self.cell.data {
            VariantData::Array(items) => Ok(items.borrow().len()),
            _ => Err(self.wrong_type("array")),
        }
    }

    /// The member at `index` of an array.
    pub fn array_get(&self, index: usize) -> Option<Variant> {
        match &self.cell.data {
            VariantData::Array(items) => items.borrow().get(index).cloned(),
            _ => None,
        }
    }

    /// Replaces the member at `index` of an array.
    pub fn array_set(&self, index: usize, value: Variant) -> CoreResult<()> {
        match &self.cell.data {
            VariantData::Array(items) => {
                let mut items = items.borrow_mut();
                match items.get_mut(index) {
                    Some(slot) => {
                        *slot = value;
                        Ok(())
                    }
                    None => Err(CoreError::invalid_value(format!(
                        "array index {index} out of bounds ({})",
                        items.len()
                    ))),
                }
            }
            _ => Err(self.wrong_type("array")),
        }
    }

    /// Appends a member to an array.
    pub fn array_append(&self, value: Variant) -> CoreResult<()> {
        match &self.cell.data {
            VariantData::Array(items) => {
                items.borrow_mut().push(value);
                Ok(())
            }
            _ => Err(self.wrong_type("array")),
        }
    }

    /// Inserts a member into an array before `index`.
    pub fn array_insert(&self, index: usize, value: Variant) -> CoreResult<()> {
        match &self.cell.data {
            VariantData::Array(items) => {
                let mut items = items.borrow_mut();
                if index > items.len() {
                    return Err(CoreError::invalid_value(format!(
                        "array index {index} out of bounds ({})",
                        items.len()
                    )));
                }
                items.insert(index, value);
                Ok(())
            }
            _ => Err(self.wrong_type("array")),
        }
    }

    /// Removes and returns the member at `index` of an array.
    pub fn array_remove(&self, index: usize) -> CoreResult<Variant> {
        match &self.cell.data {
            VariantData::Array(items) => {
                let mut items = items.borrow_mut();
                if index >= items.len() {
                    return Err(CoreError::invalid_value(format!(
                        "array index {index} out of bounds ({})",
                        items.len()
                    )));
                }
                Ok(items.remove(index))
            }
            _ => Err(self.wrong_type("array")),
        }
    }

    /// Number of entries of an object.
    pub fn object_size(&self) -> CoreResult<usize> {
        match &self.cell.data {
            VariantData::Object(map) => Ok(map.borrow().len()),
            _ => Err(self.wrong_type("object")),
        }
    }

    /// The value bound to `key` in an object.
    pub fn object_get(&self, key: &str) -> Option<Variant> {
        match &self.cell.data {
            VariantData::Object(map) => map.borrow().get(key).cloned(),
            _ => None,
        }
    }

    /// Binds `key` to `value` in an object, preserving insertion order for
    /// new keys. Returns the replaced value, if any.
    pub fn object_set(&self, key: &str, value: Variant) -> CoreResult<Option<Variant>> {
        match &self.cell.data {
            VariantData::Object(map) => Ok(map.borrow_mut().insert(key.to_string(), value)),
            _ => Err(self.wrong_type("object")),
        }
    }

    /// Removes `key` from an object, returning its value.
    pub fn object_remove(&self, key: &str) -> CoreResult<Option<Variant>> {
        match &self.cell.data {
            VariantData::Object(map) => Ok(map.borrow_mut().shift_remove(key)),
            _ => Err(self.wrong_type("object")),
        }
    }

    /// The keys of an object, in insertion order.
    pub fn object_keys(&self) -> CoreResult<Vec<String>> {
        match &self.cell.data {
            VariantData::Object(map) => Ok(map.borrow().keys().cloned().collect()),
            _ => Err(self.wrong_type("object")),
        }
    }

    /// The entries of an object, in insertion order.
    pub fn object_entries(&self) -> CoreResult<Vec<(String, Variant)>> {
        match &self.cell.data {
            VariantData::Object(map) => Ok(map
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            _ => Err(self.wrong_type("object")),
        }
    }

    /// Number of members of a tuple.
    pub fn tuple_size(&self) -> CoreResult<usize> {
        match &self.cell.data {
            VariantData::Tuple(items) => Ok(items.borrow().len()),
            _ => Err(self.wrong_type("tuple")),
        }
    }

    /// The member at `index` of a tuple.
    pub fn tuple_get(&self, index: usize) -> Option<Variant> {
        match &self.cell.data {
            VariantData::Tuple(items) => items.borrow().get(index).cloned(),
            _ => None,
        }
    }

    /// Replaces the member at `index` of a tuple. Tuples never grow.
    pub fn tuple_set(&self, index: usize, value: Variant) -> CoreResult<()> {
        match &self.cell.data {
            VariantData::Tuple(items) => {
                let mut items = items.borrow_mut();
                match items.get_mut(index) {
                    Some(slot) => {
                        *slot = value;
                        Ok(())
                    }
                    None => Err(CoreError::invalid_value(format!(
                        "tuple index {index} out of bounds ({})",
                        items.len()
                    ))),
                }
            }
            _ => Err(self.wrong_type("tuple")),
        }
    }

    /// Number of members of a linear container (array, set or tuple).
    pub fn linear_size(&self) -> Option<usize> {
        match &self.cell.data {
            VariantData::Array(items) | VariantData::Tuple(items) => Some(items.borrow().len()),
            VariantData::Set(set) => Some(set.borrow().len()),
            _ => None,
        }
    }

    /// The member at `index` of a linear container.
    pub fn linear_get(&self, index: usize) -> Option<Variant> {
        match &self.cell.data {
            VariantData::Array(items) | VariantData::Tuple(items) => {
                items.borrow().get(index).cloned()
            }
            VariantData::Set(set) => set.borrow().get(index),
            _ => None,
        }
    }

    /// Snapshot of the members of a linear container, or of an object's
    /// values.
    pub fn members(&self) -> CoreResult<Vec<Variant>> {
        match &self.cell.data {
            VariantData::Array(items) | VariantData::Tuple(items) => Ok(items.borrow().clone()),
            VariantData::Set(set) => Ok(set.borrow().records().to_vec()),
            VariantData::Object(map) => Ok(map.borrow().values().cloned().collect()),
            _ => Err(self.wrong_type("container")),
        }
    }

    /// Empties a container, returning how many members were dropped.
    pub fn container_clear(&self) -> CoreResult<usize> {
        match &self.cell.data {
            VariantData::Array(items) | VariantData::Tuple(items) => {
                let mut items = items.borrow_mut();
                let count = items.len();
                items.clear();
                Ok(count)
            }
            VariantData::Object(map) => {
                let mut map = map.borrow_mut();
                let count = map.len();
                map.clear();
                Ok(count)
            }
            VariantData::Set(set) => Ok(set.borrow_mut().clear()),
            _ => Err(self.wrong_type("container")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_ops() {
        let array = Variant::array(vec![Variant::longint(1)]);
        array.array_append(Variant::longint(2)).unwrap();
        array.array_insert(0, Variant::longint(0)).unwrap();
        assert_eq!(array.array_size().unwrap(), 3);
        assert_eq!(array.array_get(0).unwrap().as_longint(), Some(0));

        array.array_set(2, Variant::longint(9)).unwrap();
        assert_eq!(array.array_get(2).unwrap().as_longint(), Some(9));

        let removed = array.array_remove(1).unwrap();
        assert_eq!(removed.as_longint(), Some(1));
        assert_eq!(array.array_size().unwrap(), 2);

        assert!(array.array_set(10, Variant::null()).is_err());
    }

    #[test]
    fn test_object_preserves_insertion_order() {
        let object = Variant::object();
        object.object_set("zebra", Variant::longint(1)).unwrap();
        object.object_set("apple", Variant::longint(2)).unwrap();
        object.object_set("mango", Variant::longint(3)).unwrap();
        assert_eq!(object.object_keys().unwrap(), ["zebra", "apple", "mango"]);

        let replaced = object.object_set("apple", Variant::longint(9)).unwrap();
        assert_eq!(replaced.and_then(|v| v.as_longint()), Some(2));
        assert_eq!(object.object_keys().unwrap(), ["zebra", "apple", "mango"]);
    }

    #[test]
    fn test_tuple_is_fixed_size() {
        let tuple = Variant::tuple(vec![Variant::null(), Variant::longint(5)]);
        assert_eq!(tuple.tuple_size().unwrap(), 2);
        tuple.tuple_set(0, Variant::string("head")).unwrap();
        assert_eq!(tuple.tuple_get(0).unwrap().get_string(), Some("head"));
        assert!(tuple.tuple_set(2, Variant::null()).is_err());
    }

    #[test]
    fn test_linear_helpers() {
        let array = Variant::array(vec![Variant::longint(1), Variant::longint(2)]);
        assert_eq!(array.linear_size(), Some(2));
        assert_eq!(array.linear_get(1).unwrap().as_longint(), Some(2));
        assert_eq!(Variant::object().linear_size(), None);
    }

    #[test]
    fn test_clear_reports_count() {
        let array = Variant::array(vec![Variant::longint(1), Variant::longint(2)]);
        assert_eq!(array.container_clear().unwrap(), 2);
        assert_eq!(array.array_size().unwrap(), 0);
        assert!(Variant::number(1.0).container_clear().is_err());
    }

    #[test]
    fn test_wrong_type_errors() {
        let object = Variant::object();
        assert!(object.array_append(Variant::null()).is_err());
        assert!(Variant::longint(1).object_set("k", Variant::null()).is_err());
    }
}
