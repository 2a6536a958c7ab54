use super::Uuid;
use super::data::DataStore;

/// Kind of a compound object. Discriminants are part of the native contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ObjectType {
    Tile = 0,
    Sphere = 1,
    Tube = 2,
    Box = 3,
    Disk = 4,
    Polymesh = 5,
    Cone = 6,
}

/// A named group of primitives created together by one compound generator.
#[derive(Debug, Clone)]
pub struct CompoundObject {
    pub(crate) object_type: ObjectType,
    pub(crate) uuids: Vec<Uuid>,
    pub(crate) data: DataStore,
}

impl CompoundObject {
    pub(crate) fn new(object_type: ObjectType, uuids: Vec<Uuid>) -> Self {
        Self {
            object_type,
            uuids,
            data: DataStore::new(),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Member primitives in creation order.
    pub fn primitive_uuids(&self) -> &[Uuid] {
        &self.uuids
    }

    pub fn data(&self) -> &DataStore {
        &self.data
    }
}
