use crate::error::{vec_with_capacity, Result};
use crate::mtl::MtlSet;
use crate::obj::{fix_index, Attrib, Command, Counts, FaceVertex, FaceVertexRef, Shape};

/// The state threaded through the second pass over an `.obj` file's
/// commands.
pub(crate) struct Context<'m> {
  attrib: Attrib,
  materials: &'m MtlSet,
  material_id: i32,

  // shape being collected
  name: Option<String>,
  face_offset: u32,

  // result
  shapes: Vec<Shape>,
}

impl<'m> Context<'m> {
  pub(crate) fn new(counts: &Counts, materials: &'m MtlSet) -> Result<Context<'m>> {
    let attrib = Attrib {
      vertices: vec_with_capacity(counts.v)?,
      normals: vec_with_capacity(counts.vn)?,
      texcoords: vec_with_capacity(counts.vt)?,
      faces: vec_with_capacity(counts.f)?,
      face_num_verts: vec_with_capacity(counts.faces)?,
      material_ids: vec_with_capacity(counts.faces)?,
    };

    Ok(Context {
      attrib,
      materials,
      material_id: -1,
      name: None,
      face_offset: 0,
      shapes: vec![],
    })
  }

  pub(crate) fn apply(&mut self, command: &Command) {
    match command {
      Command::Vertex(v) => self.attrib.vertices.push(*v),
      Command::Normal(n) => self.attrib.normals.push(*n),
      Command::Texcoord(t) => self.attrib.texcoords.push(*t),
      Command::Face { indices, num_verts } => self.add_face(indices, num_verts),
      Command::ObjectName(name) | Command::GroupName(name) => self.set_name(name),
      Command::UseMaterial(name) => self.set_material_name(name),
      Command::MaterialLib(_) | Command::Empty => {}
    }
  }

  pub(crate) fn finish(mut self) -> (Attrib, Vec<Shape>) {
    self.close_shape();
    (self.attrib, self.shapes)
  }

  fn face_count(&self) -> u32 {
    self.attrib.face_num_verts.len() as u32
  }

  /// Emits the pending shape if any face arrived since it was opened.
  fn close_shape(&mut self) {
    let face_count = self.face_count();
    if face_count > self.face_offset {
      self.shapes.push(Shape {
        name: self.name.take(),
        face_offset: self.face_offset,
        length: face_count - self.face_offset,
      });
      self.face_offset = face_count;
    }
  }

  fn set_name(&mut self, name: &str) {
    self.close_shape();
    self.name = if name.is_empty() {
      None
    } else {
      Some(name.to_owned())
    };
  }

  fn set_material_name(&mut self, name: &str) {
    if name.is_empty() {
      return;
    }
    self.material_id = match self.materials.id_of(name) {
      Some(id) => id as i32,
      None => {
        log::warn!("obj: unknown material `{}`", name);
        -1
      }
    };
  }

  fn add_face(&mut self, indices: &[FaceVertexRef], num_verts: &[u32]) {
    let material_id = self.material_id;
    let attrib = &mut self.attrib;
    let (v_count, vt_count, vn_count) = (
      attrib.vertices.len(),
      attrib.texcoords.len(),
      attrib.normals.len(),
    );

    attrib.faces.extend(indices.iter().map(|raw| FaceVertex {
      v: fix_index(raw.v, v_count),
      vt: raw.vt.map(|vt| fix_index(vt, vt_count)),
      vn: raw.vn.map(|vn| fix_index(vn, vn_count)),
    }));
    attrib.face_num_verts.extend_from_slice(num_verts);
    attrib
      .material_ids
      .extend(num_verts.iter().map(|_| material_id));
  }
}
