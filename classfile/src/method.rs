use crate::attribute::RawAttribute;
use crate::flags::MethodFlags;

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub access_flags: MethodFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<RawAttribute>,
}
