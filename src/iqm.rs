//! A reader for Inter-Quake Model (`.iqm`) version 2 files: skinned meshes,
//! their skeleton, and (see [`crate::anim`]) animations.
//!
//! Every section of the file is located through byte offsets in the header.
//! Each one is sliced out of the buffer with a bounds check before any record
//! is decoded, so an inconsistent header yields [`Error::MalformedInput`]
//! rather than garbage.
use std::collections::HashMap;
use std::io::Cursor;
use std::ops::Range;

use binrw::{binrw, BinRead, Endian, VecArgs};
use glam::{Quat, Vec3};

use crate::error::{vec_with_capacity, Error, Result};
use crate::model::{Mesh, Model};
use crate::mtl::Material;
use crate::pose::{compose_pose, BoneInfo, Skeleton, Transform};

/// File signature, including its terminating NUL.
pub const MAGIC: &[u8; 16] = b"INTERQUAKEMODEL\0";
/// The only supported format version.
pub const VERSION: u32 = 2;
/// Size of [`Header`] on disk.
pub const HEADER_SIZE: usize = 124;

/// Vertex array semantics.
#[allow(missing_docs)]
pub mod semantic {
  pub const POSITION: u32 = 0;
  pub const TEXCOORD: u32 = 1;
  pub const NORMAL: u32 = 2;
  pub const TANGENT: u32 = 3;
  pub const BLENDINDEXES: u32 = 4;
  pub const BLENDWEIGHTS: u32 = 5;
  pub const COLOR: u32 = 6;
  pub const CUSTOM: u32 = 0x10;
}

/// Vertex array component formats.
#[allow(missing_docs)]
pub mod format {
  pub const BYTE: u32 = 0;
  pub const UBYTE: u32 = 1;
  pub const SHORT: u32 = 2;
  pub const USHORT: u32 = 3;
  pub const INT: u32 = 4;
  pub const UINT: u32 = 5;
  pub const HALF: u32 = 6;
  pub const FLOAT: u32 = 7;
  pub const DOUBLE: u32 = 8;
}

/// The fixed-size header at the start of every file. All `ofs_*` fields are
/// absolute byte offsets.
#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Header {
  pub magic: [u8; 16],
  pub version: u32,
  pub filesize: u32,
  pub flags: u32,
  pub num_text: u32,
  pub ofs_text: u32,
  pub num_meshes: u32,
  pub ofs_meshes: u32,
  pub num_vertexarrays: u32,
  pub num_vertexes: u32,
  pub ofs_vertexarrays: u32,
  pub num_triangles: u32,
  pub ofs_triangles: u32,
  pub ofs_adjacency: u32,
  pub num_joints: u32,
  pub ofs_joints: u32,
  pub num_poses: u32,
  pub ofs_poses: u32,
  pub num_anims: u32,
  pub ofs_anims: u32,
  pub num_frames: u32,
  pub num_framechannels: u32,
  pub ofs_frames: u32,
  pub ofs_bounds: u32,
  pub num_comment: u32,
  pub ofs_comment: u32,
  pub num_extensions: u32,
  pub ofs_extensions: u32,
}

impl Header {
  fn check(&self) -> Result<()> {
    if &self.magic != MAGIC {
      return Err(Error::UnsupportedFormat("not an IQM file".to_owned()));
    }
    if self.version != VERSION {
      return Err(Error::UnsupportedFormat(format!(
        "IQM version {} (only {} is supported)",
        self.version, VERSION
      )));
    }
    Ok(())
  }
}

/// A mesh: a range of the global vertex and triangle arrays. `name` and
/// `material` are offsets into the text section.
#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct MeshRecord {
  pub name: u32,
  pub material: u32,
  pub first_vertex: u32,
  pub num_vertexes: u32,
  pub first_triangle: u32,
  pub num_triangles: u32,
}

/// Three global vertex indices.
#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Triangle {
  pub vertex: [u32; 3],
}

/// A skeleton bone with its parent-relative rest transform.
#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[allow(missing_docs)]
pub struct Joint {
  pub name: u32,
  pub parent: i32,
  pub translate: [f32; 3],
  pub rotate: [f32; 4],
  pub scale: [f32; 3],
}

/// Describes where one per-vertex attribute lives.
#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct VertexArray {
  /// One of [`semantic`].
  pub kind: u32,
  pub flags: u32,
  /// One of [`format`].
  pub format: u32,
  /// Components per vertex.
  pub size: u32,
  pub offset: u32,
}

/// How one bone's ten animation channels are encoded.
///
/// Channels are translate x/y/z, rotate x/y/z/w, scale x/y/z. A channel
/// whose bit is set in `mask` reads one `u16` per frame, scaled by
/// `channelscale`; every channel adds `channeloffset`.
#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[allow(missing_docs)]
pub struct Pose {
  pub parent: i32,
  pub mask: u32,
  pub channeloffset: [f32; 10],
  pub channelscale: [f32; 10],
}

/// A named range of frames.
#[binrw]
#[brw(little)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[allow(missing_docs)]
pub struct Anim {
  pub name: u32,
  pub first_frame: u32,
  pub num_frames: u32,
  pub framerate: f32,
  pub flags: u32,
}

/// Something with a fixed on-disk size that can be read in bulk.
pub(crate) trait Record: for<'a> BinRead<Args<'a> = ()> + 'static {
  const SIZE: usize;
}

macro_rules! record {
  ($($t:ty = $size:expr),* $(,)?) => {
    $(impl Record for $t {
      const SIZE: usize = $size;
    })*
  };
}

record!(
  u8 = 1,
  u16 = 2,
  f32 = 4,
  MeshRecord = 24,
  Triangle = 12,
  Joint = 48,
  VertexArray = 20,
  Pose = 88,
  Anim = 20,
);

/// Checks the signature and version. `Ok(None)` means "not something we
/// read", which callers turn into an empty result.
pub(crate) fn open(bytes: &[u8]) -> Result<Option<Header>> {
  if bytes.is_empty() {
    return Err(Error::InvalidParameter("iqm buffer is empty"));
  }
  if !bytes.starts_with(MAGIC) {
    log::warn!("iqm: not an IQM file");
    return Ok(None);
  }

  let header = Header::read(&mut Cursor::new(bytes))?;
  if let Err(err) = header.check() {
    log::warn!("iqm: {}", err);
    return Ok(None);
  }
  Ok(Some(header))
}

/// Bounds-checked access to the sections of one file.
pub(crate) struct Reader<'a> {
  bytes: &'a [u8],
  text: &'a [u8],
}

impl<'a> Reader<'a> {
  pub(crate) fn new(bytes: &'a [u8], header: &Header) -> Result<Reader<'a>> {
    let text = section(bytes, "text", header.ofs_text, header.num_text as usize, 1)?;
    Ok(Reader { bytes, text })
  }

  pub(crate) fn read_vec<T: Record>(
    &self,
    what: &str,
    offset: u32,
    count: usize,
  ) -> Result<Vec<T>> {
    let data = section(self.bytes, what, offset, count, T::SIZE)?;
    if count == 0 {
      return Ok(vec![]);
    }
    let records = Vec::<T>::read_options(
      &mut Cursor::new(data),
      Endian::Little,
      VecArgs { count, inner: () },
    )?;
    Ok(records)
  }

  /// The NUL-terminated string at `offset` in the text section.
  pub(crate) fn text(&self, offset: u32) -> Result<String> {
    if self.text.is_empty() && offset == 0 {
      return Ok(String::new());
    }
    let tail = self.text.get(offset as usize..).ok_or_else(|| {
      Error::MalformedInput(format!(
        "text offset {} outside a {}-byte text section",
        offset,
        self.text.len()
      ))
    })?;
    let end = tail.iter().position(|&c| c == 0).unwrap_or(tail.len());
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
  }
}

fn section<'a>(
  bytes: &'a [u8],
  what: &str,
  offset: u32,
  count: usize,
  size: usize,
) -> Result<&'a [u8]> {
  if count == 0 {
    return Ok(&[]);
  }
  let start = offset as usize;
  let end = count
    .checked_mul(size)
    .and_then(|len| start.checked_add(len));
  end
    .and_then(|end| bytes.get(start..end))
    .ok_or_else(|| {
      Error::MalformedInput(format!(
        "{} {} x {} bytes at offset {} overrun a {}-byte buffer",
        what,
        count,
        size,
        offset,
        bytes.len()
      ))
    })
}

/// `first..first + count`, provided it fits in `len`.
fn sub_range(what: &str, first: u32, count: u32, len: usize) -> Result<Range<usize>> {
  let start = first as usize;
  let end = start + count as usize;
  if end > len {
    return Err(Error::MalformedInput(format!(
      "{} {}..{} outside of {} available",
      what, start, end, len
    )));
  }
  Ok(start..end)
}

/// Rebases a mesh's triangles onto its own vertices, flipping the winding:
/// IQM triangles are clockwise, ours are counter-clockwise.
fn mesh_indices(record: &MeshRecord, triangles: &[Triangle]) -> Result<Vec<u32>> {
  let range = sub_range(
    "triangles",
    record.first_triangle,
    record.num_triangles,
    triangles.len(),
  )?;
  let mut indices = vec_with_capacity(range.len() * 3)?;

  for triangle in &triangles[range] {
    for &vertex in triangle.vertex.iter().rev() {
      let local = vertex
        .checked_sub(record.first_vertex)
        .filter(|&local| local < record.num_vertexes)
        .ok_or_else(|| {
          Error::MalformedInput(format!(
            "triangle vertex {} outside mesh vertices {}..{}",
            vertex,
            record.first_vertex,
            record.first_vertex as u64 + record.num_vertexes as u64
          ))
        })?;
      indices.push(local);
    }
  }

  Ok(indices)
}

/// A mesh's share of a global per-vertex array with `N` components.
fn per_vertex<T: Copy + Default, const N: usize>(
  data: &[T],
  record: &MeshRecord,
) -> Result<Vec<[T; N]>> {
  let range = sub_range(
    "vertices",
    record.first_vertex,
    record.num_vertexes,
    data.len() / N,
  )?;
  let mut out = vec_with_capacity(range.len())?;
  out.extend(data[range.start * N..range.end * N].chunks_exact(N).map(|c| {
    let mut v = [T::default(); N];
    v.copy_from_slice(c);
    v
  }));
  Ok(out)
}

fn read_vertex_array(
  reader: &Reader<'_>,
  header: &Header,
  array: &VertexArray,
  records: &[MeshRecord],
  meshes: &mut [Mesh],
) -> Result<()> {
  use self::format::{FLOAT, UBYTE};
  use self::semantic::*;

  let count = header.num_vertexes as usize * array.size as usize;
  let pairs = records.iter().zip(meshes.iter_mut());

  match (array.kind, array.format, array.size) {
    (POSITION, FLOAT, 3) => {
      let data = reader.read_vec::<f32>("positions", array.offset, count)?;
      for (record, mesh) in pairs {
        mesh.vertices = per_vertex(&data, record)?;
        mesh.anim_vertices = mesh.vertices.clone();
      }
    }
    (NORMAL, FLOAT, 3) => {
      let data = reader.read_vec::<f32>("normals", array.offset, count)?;
      for (record, mesh) in pairs {
        mesh.normals = per_vertex(&data, record)?;
        mesh.anim_normals = mesh.normals.clone();
      }
    }
    (TEXCOORD, FLOAT, 2) => {
      let data = reader.read_vec::<f32>("texcoords", array.offset, count)?;
      for (record, mesh) in pairs {
        mesh.texcoords = per_vertex(&data, record)?;
      }
    }
    (BLENDINDEXES, UBYTE, 4) => {
      let data = reader.read_vec::<u8>("blend indexes", array.offset, count)?;
      for (record, mesh) in pairs {
        mesh.bone_ids = per_vertex(&data, record)?;
      }
    }
    (BLENDWEIGHTS, UBYTE, 4) => {
      let data = reader.read_vec::<u8>("blend weights", array.offset, count)?;
      for (record, mesh) in pairs {
        mesh.bone_weights = per_vertex::<u8, 4>(&data, record)?
          .into_iter()
          .map(|w| w.map(|w| w as f32 / 255.))
          .collect();
      }
    }
    (COLOR, UBYTE, 4) => {
      let data = reader.read_vec::<u8>("colors", array.offset, count)?;
      for (record, mesh) in pairs {
        mesh.colors = per_vertex(&data, record)?;
      }
    }
    (TANGENT, ..) => {}
    (kind, ..) if kind >= CUSTOM => {}
    (kind, format, size) => log::warn!(
      "iqm: skipping vertex array {} with format {} x {}",
      kind,
      format,
      size
    ),
  }
  Ok(())
}

fn read_skeleton(reader: &Reader<'_>, joints: &[Joint]) -> Result<Skeleton> {
  let mut bones = vec_with_capacity(joints.len())?;
  let mut bind_pose = vec_with_capacity(joints.len())?;
  for joint in joints {
    bones.push(BoneInfo {
      name: reader.text(joint.name)?,
      parent: joint.parent,
    });
    bind_pose.push(Transform {
      translation: Vec3::from_array(joint.translate),
      rotation: Quat::from_array(joint.rotate),
      scale: Vec3::from_array(joint.scale),
    });
  }
  compose_pose(&bones, &mut bind_pose);
  Ok(Skeleton { bones, bind_pose })
}

/// Loads the meshes and skeleton of an `.iqm` file.
///
/// A buffer with the wrong signature or version gives an empty [`Model`]
/// rather than an error; an empty buffer is [`Error::InvalidParameter`].
pub fn load_iqm(bytes: &[u8]) -> Result<Model> {
  let header = match open(bytes)? {
    Some(header) => header,
    None => return Ok(Model::default()),
  };
  let reader = Reader::new(bytes, &header)?;

  let records = reader.read_vec::<MeshRecord>(
    "meshes",
    header.ofs_meshes,
    header.num_meshes as usize,
  )?;
  let mut meshes = vec_with_capacity(records.len())?;
  let mut materials = vec![];
  let mut material_ids = HashMap::new();
  let mut mesh_material = vec_with_capacity(records.len())?;

  for record in &records {
    let name = reader.text(record.name)?;
    let range = sub_range(
      "mesh vertices",
      record.first_vertex,
      record.num_vertexes,
      header.num_vertexes as usize,
    )?;
    let mut vertices = vec_with_capacity(range.len())?;
    vertices.resize(range.len(), [0.; 3]);
    meshes.push(Mesh {
      name: Some(name).filter(|n| !n.is_empty()),
      vertices,
      ..Mesh::default()
    });

    let material = reader.text(record.material)?;
    if material.is_empty() {
      mesh_material.push(None);
    } else {
      let id = *material_ids.entry(material.clone()).or_insert_with(|| {
        materials.push(Material::named(material));
        materials.len() - 1
      });
      mesh_material.push(Some(id));
    }
  }

  let triangles = reader.read_vec::<Triangle>(
    "triangles",
    header.ofs_triangles,
    header.num_triangles as usize,
  )?;
  for (record, mesh) in records.iter().zip(meshes.iter_mut()) {
    mesh.indices = mesh_indices(record, &triangles)?;
  }

  let arrays = reader.read_vec::<VertexArray>(
    "vertex arrays",
    header.ofs_vertexarrays,
    header.num_vertexarrays as usize,
  )?;
  for array in &arrays {
    read_vertex_array(&reader, &header, array, &records, &mut meshes)?;
  }

  let joints = reader.read_vec::<Joint>("joints", header.ofs_joints, header.num_joints as usize)?;
  let skeleton = if joints.is_empty() {
    None
  } else {
    Some(read_skeleton(&reader, &joints)?)
  };

  log::debug!(
    "iqm: {} meshes, {} vertices, {} triangles, {} joints",
    meshes.len(),
    header.num_vertexes,
    header.num_triangles,
    joints.len()
  );

  Ok(Model {
    meshes,
    materials,
    mesh_material,
    skeleton,
  })
}

#[cfg(test)]
pub(crate) mod fixture {
  //! Writes small IQM files for tests.
  use std::io::{Cursor, Seek};

  use binrw::{BinWrite, BinWriterExt};

  use super::*;

  fn pos(out: &mut Cursor<Vec<u8>>) -> u32 {
    out.stream_position().unwrap() as u32
  }

  #[derive(Default)]
  pub(crate) struct IqmBuilder {
    pub(crate) version: u32,
    pub(crate) text: Vec<u8>,
    pub(crate) num_vertexes: u32,
    pub(crate) meshes: Vec<MeshRecord>,
    /// (kind, format, size, little-endian data)
    pub(crate) arrays: Vec<(u32, u32, u32, Vec<u8>)>,
    pub(crate) triangles: Vec<Triangle>,
    pub(crate) joints: Vec<Joint>,
    pub(crate) poses: Vec<Pose>,
    pub(crate) anims: Vec<Anim>,
    pub(crate) num_framechannels: u32,
    pub(crate) frames: Vec<u16>,
  }

  impl IqmBuilder {
    pub(crate) fn new() -> IqmBuilder {
      IqmBuilder {
        version: VERSION,
        text: vec![0],
        ..IqmBuilder::default()
      }
    }

    /// Appends a string to the text section and returns its offset.
    pub(crate) fn text(&mut self, s: &str) -> u32 {
      let offset = self.text.len() as u32;
      self.text.extend_from_slice(s.as_bytes());
      self.text.push(0);
      offset
    }

    pub(crate) fn floats(&mut self, kind: u32, size: u32, data: &[f32]) {
      let bytes = data.iter().flat_map(|f| f.to_le_bytes()).collect();
      self.arrays.push((kind, format::FLOAT, size, bytes));
    }

    pub(crate) fn ubytes(&mut self, kind: u32, data: &[u8]) {
      self.arrays.push((kind, format::UBYTE, 4, data.to_vec()));
    }

    pub(crate) fn build(&self) -> Vec<u8> {
      let mut out = Cursor::new(Vec::new());
      let mut header = Header {
        magic: *MAGIC,
        version: self.version,
        num_vertexes: self.num_vertexes,
        num_framechannels: self.num_framechannels,
        ..Header::default()
      };
      header.write(&mut out).unwrap();

      header.ofs_text = pos(&mut out);
      header.num_text = self.text.len() as u32;
      out.write_le(&self.text).unwrap();

      header.ofs_meshes = pos(&mut out);
      header.num_meshes = self.meshes.len() as u32;
      out.write_le(&self.meshes).unwrap();

      let mut arrays = vec![];
      for (kind, format, size, data) in &self.arrays {
        arrays.push(VertexArray {
          kind: *kind,
          flags: 0,
          format: *format,
          size: *size,
          offset: pos(&mut out),
        });
        out.write_le(data).unwrap();
      }
      header.ofs_vertexarrays = pos(&mut out);
      header.num_vertexarrays = arrays.len() as u32;
      out.write_le(&arrays).unwrap();

      header.ofs_triangles = pos(&mut out);
      header.num_triangles = self.triangles.len() as u32;
      out.write_le(&self.triangles).unwrap();

      header.ofs_joints = pos(&mut out);
      header.num_joints = self.joints.len() as u32;
      out.write_le(&self.joints).unwrap();

      header.ofs_poses = pos(&mut out);
      header.num_poses = self.poses.len() as u32;
      out.write_le(&self.poses).unwrap();

      header.ofs_anims = pos(&mut out);
      header.num_anims = self.anims.len() as u32;
      out.write_le(&self.anims).unwrap();

      header.ofs_frames = pos(&mut out);
      header.num_frames = if self.num_framechannels == 0 {
        0
      } else {
        self.frames.len() as u32 / self.num_framechannels
      };
      out.write_le(&self.frames).unwrap();

      header.filesize = pos(&mut out);
      out.set_position(0);
      header.write(&mut out).unwrap();
      out.into_inner()
    }
  }
}

#[cfg(test)]
fn two_mesh_file() -> fixture::IqmBuilder {
  use self::semantic::*;

  let mut b = fixture::IqmBuilder::new();
  let body = b.text("body");
  let skin = b.text("skin.png");
  let head = b.text("head");
  let root = b.text("root");
  let neck = b.text("neck");

  b.num_vertexes = 5;
  b.meshes = vec![
    MeshRecord {
      name: body,
      material: skin,
      first_vertex: 0,
      num_vertexes: 3,
      first_triangle: 0,
      num_triangles: 1,
    },
    MeshRecord {
      name: head,
      material: skin,
      first_vertex: 3,
      num_vertexes: 2,
      first_triangle: 1,
      num_triangles: 1,
    },
  ];
  b.floats(
    POSITION,
    3,
    &[0., 0., 0., 1., 0., 0., 0., 1., 0., 5., 5., 5., 6., 6., 6.],
  );
  b.floats(TEXCOORD, 2, &[0., 0., 1., 0., 0., 1., 0.5, 0.5, 0.25, 0.75]);
  b.ubytes(BLENDINDEXES, &[0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0]);
  b.ubytes(
    BLENDWEIGHTS,
    &[255, 0, 0, 0, 51, 204, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0],
  );
  b.triangles = vec![
    Triangle { vertex: [0, 1, 2] },
    Triangle { vertex: [3, 4, 3] },
  ];
  b.joints = vec![
    Joint {
      name: root,
      parent: -1,
      translate: [0., 1., 0.],
      rotate: [0., 0., 0., 1.],
      scale: [1., 1., 1.],
    },
    Joint {
      name: neck,
      parent: 0,
      translate: [1., 0., 0.],
      rotate: [0., 0., 0., 1.],
      scale: [1., 1., 1.],
    },
  ];
  b
}

#[test]
fn test_load_meshes_and_skeleton() {
  let model = load_iqm(&two_mesh_file().build()).unwrap();

  assert_eq!(model.mesh_count(), 2);
  let body = &model.meshes[0];
  let head = &model.meshes[1];
  assert_eq!(body.name.as_deref(), Some("body"));
  assert_eq!(body.vertices, vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.]]);
  assert_eq!(body.anim_vertices, body.vertices);
  assert_eq!(head.vertices, vec![[5., 5., 5.], [6., 6., 6.]]);
  // Texcoords are taken as stored.
  assert_eq!(head.texcoords, vec![[0.5, 0.5], [0.25, 0.75]]);
  assert!(body.normals.is_empty());

  // Winding reversed and rebased per mesh.
  assert_eq!(body.indices, vec![2, 1, 0]);
  assert_eq!(head.indices, vec![0, 1, 0]);

  assert_eq!(body.bone_ids[1], [0, 1, 0, 0]);
  assert_eq!(body.bone_weights[0], [1., 0., 0., 0.]);
  assert!((body.bone_weights[1][0] - 0.2).abs() < 1e-6);
  assert!((body.bone_weights[1][1] - 0.8).abs() < 1e-6);
  assert_eq!(head.bone_ids[0], [1, 0, 0, 0]);

  assert_eq!(model.materials, vec![Material::named("skin.png")]);
  assert_eq!(model.mesh_material, vec![Some(0), Some(0)]);

  let skeleton = model.skeleton.unwrap();
  assert_eq!(skeleton.bones[1].name, "neck");
  assert_eq!(skeleton.bones[1].parent, 0);
  assert!(skeleton.bind_pose[1]
    .translation
    .abs_diff_eq(Vec3::new(1., 1., 0.), 1e-6));
}

#[test]
fn test_wrong_version_gives_empty_model() {
  let mut b = two_mesh_file();
  b.version = 1;
  let model = load_iqm(&b.build()).unwrap();
  assert_eq!(model.mesh_count(), 0);
  assert!(model.is_empty());
}

#[test]
fn test_wrong_magic_gives_empty_model() {
  let mut bytes = two_mesh_file().build();
  bytes[0] = b'X';
  assert!(load_iqm(&bytes).unwrap().is_empty());
  assert!(load_iqm(b"short").unwrap().is_empty());
  assert!(matches!(load_iqm(&[]), Err(Error::InvalidParameter(_))));
}

#[test]
fn test_truncated_file_is_malformed() {
  let bytes = two_mesh_file().build();
  let truncated = &bytes[..bytes.len() - 8];
  assert!(matches!(load_iqm(truncated), Err(Error::MalformedInput(_))));

  let header_only = &bytes[..60];
  assert!(matches!(load_iqm(header_only), Err(Error::MalformedInput(_))));
}

#[test]
fn test_triangle_outside_its_mesh_is_malformed() {
  let mut b = two_mesh_file();
  b.triangles[1] = Triangle { vertex: [0, 3, 4] };
  assert!(matches!(load_iqm(&b.build()), Err(Error::MalformedInput(_))));
}

#[test]
fn test_unexpected_array_format_is_skipped() {
  let mut b = two_mesh_file();
  b.arrays[0].1 = format::UBYTE;
  let model = load_iqm(&b.build()).unwrap();
  assert_eq!(model.meshes[0].vertices, vec![[0.; 3]; 3]);
  assert!(model.meshes[0].anim_vertices.is_empty());
}

#[test]
fn test_mesh_vertices_past_header_count_are_malformed() {
  let mut b = two_mesh_file();
  b.arrays.clear();
  b.meshes[1].num_vertexes = 20_000_000;
  let bytes = b.build();
  assert!(bytes.len() < 1024);
  assert!(matches!(load_iqm(&bytes), Err(Error::MalformedInput(_))));

  let mut b = two_mesh_file();
  b.meshes[1].first_vertex = 4;
  assert!(matches!(load_iqm(&b.build()), Err(Error::MalformedInput(_))));
}

#[test]
fn test_normals_and_colors_are_split_per_mesh() {
  let mut b = two_mesh_file();
  b.floats(
    semantic::NORMAL,
    3,
    &[0., 0., 1., 0., 1., 0., 1., 0., 0., 0., 0., -1., 0., -1., 0.],
  );
  b.ubytes(
    semantic::COLOR,
    &[255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 10, 20, 30, 40, 50, 60, 70, 80],
  );
  let model = load_iqm(&b.build()).unwrap();
  let body = &model.meshes[0];
  let head = &model.meshes[1];

  assert_eq!(body.normals, vec![[0., 0., 1.], [0., 1., 0.], [1., 0., 0.]]);
  assert_eq!(head.normals, vec![[0., 0., -1.], [0., -1., 0.]]);
  assert_eq!(body.anim_normals, body.normals);
  assert_eq!(head.anim_normals, head.normals);

  assert_eq!(body.colors, vec![[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]]);
  assert_eq!(head.colors, vec![[10, 20, 30, 40], [50, 60, 70, 80]]);
}
