//! The engine-neutral output of every reader: meshes, materials and an
//! optional skeleton.
use std::path::Path;

use crate::error::{vec_with_capacity, Error, Result};
use crate::iqm;
use crate::mtl::Material;
use crate::obj::{self, Attrib, FaceVertex, ObjOptions, Shape};
use crate::pose::Skeleton;
use crate::resource::ResourceLoader;

/// Vertex data ready for upload.
///
/// `.obj` meshes are triangle soups: `indices` is empty and every three
/// vertices form a triangle. `.iqm` meshes share vertices between triangles
/// through `indices`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
  /// Shape or mesh name, if the file gave one.
  pub name: Option<String>,
  /// Positions.
  pub vertices: Vec<[f32; 3]>,
  /// Texture coordinates, empty when the file has none.
  pub texcoords: Vec<[f32; 2]>,
  /// Normals, empty when the file has none.
  pub normals: Vec<[f32; 3]>,
  /// Vertex colors, empty when the file has none.
  pub colors: Vec<[u8; 4]>,
  /// Triangle list into `vertices`, three entries per triangle.
  pub indices: Vec<u32>,
  /// Up to four influencing bones per vertex.
  pub bone_ids: Vec<[u8; 4]>,
  /// Weight of each entry in `bone_ids`.
  pub bone_weights: Vec<[f32; 4]>,
  /// Skinned positions, seeded from `vertices`.
  pub anim_vertices: Vec<[f32; 3]>,
  /// Skinned normals, seeded from `normals`.
  pub anim_normals: Vec<[f32; 3]>,
}

impl Mesh {
  /// Number of vertices.
  pub fn vertex_count(&self) -> usize {
    self.vertices.len()
  }

  /// Number of triangles.
  pub fn triangle_count(&self) -> usize {
    if self.indices.is_empty() {
      self.vertices.len() / 3
    } else {
      self.indices.len() / 3
    }
  }

  /// Whether the mesh carries bone influences.
  pub fn is_skinned(&self) -> bool {
    !self.bone_ids.is_empty() && !self.bone_weights.is_empty()
  }
}

/// A loaded model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
  /// Meshes, in file order.
  pub meshes: Vec<Mesh>,
  /// Materials referenced by `mesh_material`.
  pub materials: Vec<Material>,
  /// Material of each mesh; `None` leaves the choice to the renderer.
  pub mesh_material: Vec<Option<usize>>,
  /// Bones and bind pose, for skinned models.
  pub skeleton: Option<Skeleton>,
}

impl Model {
  /// Number of meshes.
  pub fn mesh_count(&self) -> usize {
    self.meshes.len()
  }

  /// Whether nothing was loaded.
  pub fn is_empty(&self) -> bool {
    self.meshes.is_empty() && self.skeleton.is_none()
  }
}

/// The directory part of `file_name`, against which its references resolve.
fn working_dir_of(file_name: &str) -> String {
  Path::new(file_name)
    .parent()
    .map(|dir| dir.to_string_lossy().into_owned())
    .unwrap_or_default()
}

fn fetch<T: Copy + Default>(pool: &[T], index: Option<u32>, misses: &mut usize) -> T {
  match index {
    Some(i) => pool.get(i as usize).copied().unwrap_or_else(|| {
      *misses += 1;
      T::default()
    }),
    None => T::default(),
  }
}

fn mesh_from_shape(attrib: &Attrib, corner_offsets: &[usize], shape: &Shape) -> Result<Mesh> {
  let faces = shape.face_offset as usize..(shape.face_offset + shape.length) as usize;
  let corners: Vec<&FaceVertex> = faces
    .flat_map(|face| {
      let start = corner_offsets[face];
      attrib.faces[start..start + attrib.face_num_verts[face] as usize].iter()
    })
    .collect();

  let has_texcoords = !attrib.texcoords.is_empty();
  let has_normals = !attrib.normals.is_empty();

  let mut mesh = Mesh {
    name: shape.name.clone(),
    vertices: vec_with_capacity(corners.len())?,
    texcoords: vec_with_capacity(if has_texcoords { corners.len() } else { 0 })?,
    normals: vec_with_capacity(if has_normals { corners.len() } else { 0 })?,
    ..Mesh::default()
  };

  let mut misses = 0;
  for corner in corners {
    mesh
      .vertices
      .push(fetch(&attrib.vertices, Some(corner.v), &mut misses));
    if has_texcoords {
      // .obj puts the texture origin bottom-left.
      let [u, v] = fetch(&attrib.texcoords, corner.vt, &mut misses);
      mesh.texcoords.push([u, 1. - v]);
    }
    if has_normals {
      mesh
        .normals
        .push(fetch(&attrib.normals, corner.vn, &mut misses));
    }
  }
  if misses > 0 {
    log::warn!(
      "obj: {} out-of-range indices in shape {:?}",
      misses,
      shape.name
    );
  }

  Ok(mesh)
}

/// Loads an `.obj` file into one triangulated [`Mesh`] per shape.
///
/// `file_name` only locates the material library: its directory becomes the
/// working directory handed to `resources`.
pub fn load_obj<R>(file_name: &str, text: &[u8], resources: &R) -> Result<Model>
where
  R: ResourceLoader + ?Sized,
{
  let options = ObjOptions {
    triangulate: true,
    working_dir: working_dir_of(file_name),
  };
  let set = obj::parse(text, &options, resources)?;
  let corner_offsets = set.attrib.face_corner_offsets();

  let mut meshes = vec_with_capacity(set.shapes.len())?;
  let mut mesh_material = vec_with_capacity(set.shapes.len())?;
  for shape in &set.shapes {
    meshes.push(mesh_from_shape(&set.attrib, &corner_offsets, shape)?);

    let material = set
      .attrib
      .material_ids
      .get(shape.face_offset as usize)
      .copied()
      .filter(|&id| id >= 0 && (id as usize) < set.materials.len())
      .map(|id| id as usize);
    mesh_material.push(material);
  }

  log::debug!(
    "obj: loaded `{}` with {} meshes and {} materials",
    file_name,
    meshes.len(),
    set.materials.len()
  );

  Ok(Model {
    meshes,
    materials: set.materials,
    mesh_material,
    skeleton: None,
  })
}

/// Fetches `path` through `resources` and loads it according to its
/// extension (`.obj` or `.iqm`).
pub fn load_model<R>(path: &str, resources: &R) -> Result<Model>
where
  R: ResourceLoader + ?Sized,
{
  let extension = Path::new(path)
    .extension()
    .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

  match extension.as_deref() {
    Some("obj") => {
      let data = resources.load(path, "")?;
      load_obj(path, &data, resources)
    }
    Some("iqm") => {
      let data = resources.load(path, "")?;
      iqm::load_iqm(&data)
    }
    _ => Err(Error::UnsupportedFormat(format!(
      "no reader for `{}`",
      path
    ))),
  }
}

#[cfg(test)]
const QUAD: &str = "\
mtllib quad.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
o first
usemtl blue
f 1/1/1 2/2/1 3/3/1 4/4/1
o second
f 1 3 4
";

#[cfg(test)]
fn quad_resources() -> crate::resource::ResourceMap {
  let mut res = crate::resource::ResourceMap::new();
  res.insert("assets/quad.obj", QUAD);
  res.insert("assets/quad.mtl", "newmtl red\nKd 1 0 0\nnewmtl blue\nKd 0 0 1\n");
  res
}

#[test]
fn test_load_obj_builds_one_mesh_per_shape() {
  let res = quad_resources();
  let model = load_obj("assets/quad.obj", QUAD.as_bytes(), &res).unwrap();

  assert_eq!(model.mesh_count(), 2);
  assert_eq!(model.materials.len(), 2);
  assert_eq!(model.mesh_material, vec![Some(1), Some(1)]);

  let first = &model.meshes[0];
  assert_eq!(first.name.as_deref(), Some("first"));
  assert_eq!(first.vertex_count(), 6);
  assert_eq!(first.triangle_count(), 2);
  assert!(first.indices.is_empty());
  assert_eq!(
    first.vertices[..3],
    [[0., 0., 0.], [1., 0., 0.], [1., 1., 0.]]
  );
  // V is flipped.
  assert_eq!(first.texcoords[..3], [[0., 1.], [1., 1.], [1., 0.]]);
  assert_eq!(first.normals[0], [0., 0., 1.]);

  let second = &model.meshes[1];
  assert_eq!(second.triangle_count(), 1);
  assert_eq!(second.vertices[1], [1., 1., 0.]);
  // No vt/vn on these corners.
  assert_eq!(second.texcoords[0], [0., 1.]);
  assert_eq!(second.normals[0], [0., 0., 0.]);
}

#[test]
fn test_load_model_dispatches_on_extension() {
  let res = quad_resources();
  let model = load_model("assets/quad.obj", &res).unwrap();
  assert_eq!(model.mesh_count(), 2);

  match load_model("assets/quad.fbx", &res) {
    Err(Error::UnsupportedFormat(_)) => {}
    other => panic!("unexpected {:?}", other),
  }
  match load_model("assets/missing.iqm", &res) {
    Err(Error::ResourceNotFound(path)) => assert_eq!(path, "assets/missing.iqm"),
    other => panic!("unexpected {:?}", other),
  }
}

#[test]
fn test_faces_without_material_have_none() {
  use crate::resource::NoResources;

  let model = load_obj("plain.obj", b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\nf 3 2 9\n", &NoResources)
    .unwrap();
  assert_eq!(model.mesh_material, vec![None]);
  assert!(model.materials.is_empty());
  // Out-of-range corners read as the origin.
  assert_eq!(model.meshes[0].vertices[5], [0., 0., 0.]);
}
