use crate::attribute::RawAttribute;
use crate::flags::FieldFlags;

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub access_flags: FieldFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<RawAttribute>,
}
