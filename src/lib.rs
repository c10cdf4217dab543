//! Readers for 3D model assets: Wavefront `.obj` meshes with their `.mtl`
//! material libraries, and Inter-Quake Model (`.iqm`) skinned meshes with
//! skeletal animations.
//!
//! The text parsers ([`obj::parse`], [`mtl::parse`]) give the raw file
//! contents. [`load_model`] and friends turn them into engine-neutral
//! [`Model`]s. Files referenced from inside another file are fetched through
//! a caller-supplied [`ResourceLoader`].
#![crate_type = "lib"]
#![deny(missing_docs)]
#![deny(unreachable_pub)]

pub use error::{Error, Result};
pub use lex::{split_lines, LineSpan};

pub use anim::{load_iqm_animations, Animation};
pub use iqm::load_iqm;
pub use model::{load_model, load_obj, Mesh, Model};
pub use mtl::{Material, MtlSet};
pub use obj::{ObjOptions, ObjSet};
pub use pose::{compose_pose, BoneInfo, Skeleton, Transform};
pub use resource::{NoResources, ResourceLoader, ResourceMap};

mod lex;
mod util;

mod context;
pub mod error;
pub mod resource;

pub mod mtl;
pub mod obj;

pub mod anim;
pub mod iqm;
pub mod model;
pub mod pose;
