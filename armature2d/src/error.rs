use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown skin: {name}")]
    UnknownSkin { name: String },

    #[error("duplicate bone name: {name}")]
    DuplicateBone { name: String },

    #[error("bone '{bone}' references parent index {parent}, which is not an earlier bone")]
    InvalidBoneParent { bone: String, parent: usize },

    #[error("duplicate slot name: {name}")]
    DuplicateSlot { name: String },

    #[error("unknown bone index {bone} referenced by slot '{slot}'")]
    UnknownSlotBone { slot: String, bone: usize },

    #[error("unknown slot '{slot}' referenced by skin '{skin}'")]
    UnknownSkinSlot { skin: String, slot: String },

    #[error("invalid mesh data for display '{display}': {message}")]
    InvalidMeshData { display: String, message: String },
}
