//! A parser for Wavefront's `.obj` file format for storing 3D meshes.
//!
//! Parsing happens in two passes over the file's lines. The first classifies
//! every line into a [`Command`] and counts how much of everything there is;
//! the second walks the commands again to fill the attribute pools, resolve
//! relative indices, tag faces with materials and cut the face list into
//! named [`Shape`]s.
use crate::context::Context;
use crate::error::{vec_with_capacity, Error, Result};
use crate::lex::{parse_i32, split_lines, Lexer};
use crate::mtl::{self, Material, MtlSet};
use crate::resource::ResourceLoader;

/// Knobs for [`parse`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjOptions {
  /// Fan-triangulate polygons with more than three corners.
  pub triangulate: bool,
  /// Directory that `mtllib` references are resolved against.
  pub working_dir: String,
}

impl Default for ObjOptions {
  fn default() -> ObjOptions {
    ObjOptions {
      triangulate: true,
      working_dir: String::new(),
    }
  }
}

/// A face corner exactly as written: 1-based or negative (relative)
/// indices, texture and normal parts optional.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FaceVertexRef {
  /// Position index.
  pub v: i32,
  /// Texture coordinate index, if given.
  pub vt: Option<i32>,
  /// Normal index, if given.
  pub vn: Option<i32>,
}

/// A face corner resolved to 0-based indices into the [`Attrib`] pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FaceVertex {
  /// Index into `Attrib::vertices`.
  pub v: u32,
  /// Index into `Attrib::texcoords`.
  pub vt: Option<u32>,
  /// Index into `Attrib::normals`.
  pub vn: Option<u32>,
}

/// The attribute pools of one `.obj` file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attrib {
  /// Positions, in file order.
  pub vertices: Vec<[f32; 3]>,
  /// Normals, in file order.
  pub normals: Vec<[f32; 3]>,
  /// Texture coordinates, in file order.
  pub texcoords: Vec<[f32; 2]>,
  /// Every face corner, face after face.
  pub faces: Vec<FaceVertex>,
  /// Number of corners of each face. With triangulation on, every entry is 3.
  pub face_num_verts: Vec<u32>,
  /// Material of each face, `-1` when none was assigned.
  pub material_ids: Vec<i32>,
}

impl Attrib {
  /// Number of faces, i.e. entries in `face_num_verts`.
  pub fn num_faces(&self) -> usize {
    self.face_num_verts.len()
  }

  /// Index into `faces` of the first corner of every face.
  pub fn face_corner_offsets(&self) -> Vec<usize> {
    self
      .face_num_verts
      .iter()
      .scan(0usize, |offset, &n| {
        let start = *offset;
        *offset += n as usize;
        Some(start)
      })
      .collect()
  }
}

/// A named run of faces, one per `o`/`g` scope that actually holds faces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shape {
  /// The object or group name; `None` for faces before any `o`/`g`, or
  /// for a group statement without a name.
  pub name: Option<String>,
  /// Index of the first face (in `Attrib::face_num_verts` units).
  pub face_offset: u32,
  /// Number of faces.
  pub length: u32,
}

/// Everything read from one `.obj` file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjSet {
  /// Attribute pools and faces.
  pub attrib: Attrib,
  /// Face ranges, in file order.
  pub shapes: Vec<Shape>,
  /// Materials of the referenced library, indexed by `Attrib::material_ids`.
  pub materials: Vec<Material>,
  /// Which material library was referenced, if any.
  pub material_library: Option<String>,
}

/// One classified line.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
  /// Blank lines, comments and anything unrecognised.
  Empty,
  /// `v x y z`
  Vertex([f32; 3]),
  /// `vn x y z`
  Normal([f32; 3]),
  /// `vt u v`
  Texcoord([f32; 2]),
  /// `f ...`, possibly already split into triangles.
  Face {
    /// Corners of all produced faces, back to back.
    indices: Vec<FaceVertexRef>,
    /// Corner count of each produced face.
    num_verts: Vec<u32>,
  },
  /// `o name`
  ObjectName(String),
  /// `g name`
  GroupName(String),
  /// `usemtl name`
  UseMaterial(String),
  /// `mtllib file`
  MaterialLib(String),
}

impl Command {
  /// Classifies and parses a single line. Never fails: malformed numbers
  /// read as zero and unknown directives become [`Command::Empty`].
  pub fn parse(line: &[u8], triangulate: bool) -> Command {
    let mut lexer = Lexer::new(line);
    if lexer.is_comment() {
      return Command::Empty;
    }
    let tag = match lexer.next_word() {
      Some(tag) => tag,
      None => return Command::Empty,
    };

    match tag {
      b"v" => Command::Vertex(parse_xyz(&mut lexer)),
      b"vn" => Command::Normal(parse_xyz(&mut lexer)),
      b"vt" => {
        let u = lexer.next_f32();
        let v = lexer.next_f32();
        Command::Texcoord([u, v])
      }
      b"f" => parse_face(&mut lexer, triangulate),
      b"o" => Command::ObjectName(lexer.rest_string()),
      b"g" => Command::GroupName(lexer.rest_string()),
      b"usemtl" => Command::UseMaterial(lexer.rest_string()),
      b"mtllib" => Command::MaterialLib(lexer.rest_string()),
      _ => {
        log::trace!("obj: ignoring `{}`", String::from_utf8_lossy(tag));
        Command::Empty
      }
    }
  }

  /// Number of face corners this command contributes.
  pub fn num_f(&self) -> usize {
    match self {
      Command::Face { indices, .. } => indices.len(),
      _ => 0,
    }
  }

  /// Number of faces this command contributes.
  pub fn num_f_num_verts(&self) -> usize {
    match self {
      Command::Face { num_verts, .. } => num_verts.len(),
      _ => 0,
    }
  }
}

fn parse_xyz(lexer: &mut Lexer<'_>) -> [f32; 3] {
  let x = lexer.next_f32();
  let y = lexer.next_f32();
  let z = lexer.next_f32();
  [x, y, z]
}

/// Parses `v`, `v/vt`, `v//vn` or `v/vt/vn`.
fn parse_corner(word: &[u8]) -> FaceVertexRef {
  let mut parts = word.split(|&c| c == b'/');
  let v = parts.next().map_or(0, parse_i32);
  let vt = parts.next().filter(|p| !p.is_empty()).map(parse_i32);
  let vn = parts.next().filter(|p| !p.is_empty()).map(parse_i32);
  FaceVertexRef { v, vt, vn }
}

/// Fans a convex polygon around its first corner.
fn to_triangles(xs: &[FaceVertexRef]) -> Vec<FaceVertexRef> {
  let first = match xs.first() {
    Some(&first) if xs.len() >= 3 => first,
    _ => return vec![],
  };

  xs[1..]
    .windows(2)
    .flat_map(|pair| [first, pair[0], pair[1]])
    .collect()
}

fn parse_face(lexer: &mut Lexer<'_>, triangulate: bool) -> Command {
  let mut corners = Vec::new();
  while let Some(word) = lexer.next_word() {
    corners.push(parse_corner(word));
  }

  if corners.is_empty() {
    return Command::Empty;
  }

  if triangulate {
    let indices = to_triangles(&corners);
    let num_verts = vec![3; indices.len() / 3];
    Command::Face { indices, num_verts }
  } else {
    let num_verts = vec![corners.len() as u32];
    Command::Face {
      indices: corners,
      num_verts,
    }
  }
}

/// Resolves a raw index against the number of elements defined so far.
///
/// Positive indices are 1-based, negative ones count back from the latest
/// element (`-1` is the last one). Zero, which is not a valid `.obj` index,
/// maps to the first element. A relative index reaching before the start of
/// the pool is clamped to `0`.
pub fn fix_index(raw: i32, count: usize) -> u32 {
  if raw > 0 {
    (raw - 1) as u32
  } else if raw == 0 {
    0
  } else {
    let resolved = count as i64 + raw as i64;
    if resolved < 0 {
      log::warn!("obj: relative index {} with only {} elements", raw, count);
      0
    } else {
      resolved as u32
    }
  }
}

/// Pass one: how big everything is going to be.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Counts {
  pub(crate) v: usize,
  pub(crate) vn: usize,
  pub(crate) vt: usize,
  pub(crate) f: usize,
  pub(crate) faces: usize,
  /// Index of the last usable `mtllib` command.
  pub(crate) mtllib: Option<usize>,
}

impl Counts {
  pub(crate) fn of(commands: &[Command]) -> Counts {
    commands
      .iter()
      .enumerate()
      .fold(Counts::default(), |mut counts, (i, command)| {
        match command {
          Command::Vertex(_) => counts.v += 1,
          Command::Normal(_) => counts.vn += 1,
          Command::Texcoord(_) => counts.vt += 1,
          Command::Face { .. } => {
            counts.f += command.num_f();
            counts.faces += command.num_f_num_verts();
          }
          Command::MaterialLib(name) if !name.is_empty() => counts.mtllib = Some(i),
          _ => {}
        }
        counts
      })
  }
}

fn load_materials<R>(resources: &R, file: &str, working_dir: &str) -> MtlSet
where
  R: ResourceLoader + ?Sized,
{
  mtl::load(resources, file, working_dir).unwrap_or_else(|err| {
    log::warn!("obj: failed to load material library: {}", err);
    MtlSet::default()
  })
}

/// Parses a wavefront `.obj` buffer.
///
/// The only failures are an empty buffer ([`Error::InvalidParameter`]) and
/// running out of memory. A material library that cannot be loaded is
/// logged and leaves every face without a material.
pub fn parse<B, R>(input: B, options: &ObjOptions, resources: &R) -> Result<ObjSet>
where
  B: AsRef<[u8]>,
  R: ResourceLoader + ?Sized,
{
  let buf = input.as_ref();
  if buf.is_empty() {
    return Err(Error::InvalidParameter("obj buffer is empty"));
  }
  let lines = split_lines(buf)?;

  let mut commands = vec_with_capacity(lines.len())?;
  commands.extend(
    lines
      .iter()
      .map(|span| Command::parse(span.slice(buf), options.triangulate)),
  );
  let counts = Counts::of(&commands);

  let material_library = counts.mtllib.and_then(|i| match &commands[i] {
    Command::MaterialLib(name) => Some(name.clone()),
    _ => None,
  });
  let mtl = match &material_library {
    Some(file) => load_materials(resources, file, &options.working_dir),
    None => MtlSet::default(),
  };

  let mut context = Context::new(&counts, &mtl)?;
  for command in &commands {
    context.apply(command);
  }
  let (attrib, shapes) = context.finish();

  log::debug!(
    "obj: {} vertices, {} normals, {} texcoords, {} faces, {} shapes, {} materials",
    attrib.vertices.len(),
    attrib.normals.len(),
    attrib.texcoords.len(),
    attrib.num_faces(),
    shapes.len(),
    mtl.materials.len()
  );

  Ok(ObjSet {
    attrib,
    shapes,
    materials: mtl.materials,
    material_library,
  })
}

#[cfg(test)]
fn parse_str(input: &str, triangulate: bool) -> ObjSet {
  use crate::resource::NoResources;

  let options = ObjOptions {
    triangulate,
    ..ObjOptions::default()
  };
  parse(input, &options, &NoResources).unwrap()
}

#[test]
fn test_command_parse() {
  assert_eq!(Command::parse(b"v 1 2 3", true), Command::Vertex([1., 2., 3.]));
  assert_eq!(
    Command::parse(b"  vn 0 -1 0.5", true),
    Command::Normal([0., -1., 0.5])
  );
  assert_eq!(Command::parse(b"vt 0.25", true), Command::Texcoord([0.25, 0.]));
  assert_eq!(
    Command::parse(b"o Cube.001", true),
    Command::ObjectName("Cube.001".to_owned())
  );
  assert_eq!(
    Command::parse(b"g left arm ", true),
    Command::GroupName("left arm".to_owned())
  );
  assert_eq!(
    Command::parse(b"usemtl Material", true),
    Command::UseMaterial("Material".to_owned())
  );
  assert_eq!(
    Command::parse(b"mtllib cube.mtl", true),
    Command::MaterialLib("cube.mtl".to_owned())
  );
  assert_eq!(Command::parse(b"# v 1 2 3", true), Command::Empty);
  assert_eq!(Command::parse(b"   ", true), Command::Empty);
  assert_eq!(Command::parse(b"s off", true), Command::Empty);
  assert_eq!(Command::parse(b"f", true), Command::Empty);
}

#[test]
fn test_face_corner_forms() {
  let face = Command::parse(b"f 1 2/3 -1//4 5/6/7", false);
  let expected = vec![
    FaceVertexRef { v: 1, vt: None, vn: None },
    FaceVertexRef { v: 2, vt: Some(3), vn: None },
    FaceVertexRef { v: -1, vt: None, vn: Some(4) },
    FaceVertexRef { v: 5, vt: Some(6), vn: Some(7) },
  ];
  assert_eq!(
    face,
    Command::Face {
      indices: expected,
      num_verts: vec![4],
    }
  );
  assert_eq!(face.num_f(), 4);
  assert_eq!(face.num_f_num_verts(), 1);
}

#[test]
fn test_fan_triangulation() {
  let face = Command::parse(b"f 1 2 3 4 5", true);
  let v = |v| FaceVertexRef { v, vt: None, vn: None };
  assert_eq!(
    face,
    Command::Face {
      indices: vec![v(1), v(2), v(3), v(1), v(3), v(4), v(1), v(4), v(5)],
      num_verts: vec![3, 3, 3],
    }
  );

  // Degenerate polygons produce nothing once triangulated.
  let line = Command::parse(b"f 1 2", true);
  assert_eq!(line.num_f(), 0);
  assert_eq!(line.num_f_num_verts(), 0);
}

#[test]
fn test_fix_index() {
  assert_eq!(fix_index(1, 10), 0);
  assert_eq!(fix_index(10, 10), 9);
  assert_eq!(fix_index(-1, 10), 9);
  assert_eq!(fix_index(-10, 10), 0);
  assert_eq!(fix_index(0, 10), 0);
  assert_eq!(fix_index(-11, 10), 0);
}

#[test]
fn test_shape_boundaries() {
  let set = parse_str("o A\nf 1 2 3\nf 1 2 4\no B\nf 2 3 4", false);
  assert_eq!(
    set.shapes,
    vec![
      Shape {
        name: Some("A".to_owned()),
        face_offset: 0,
        length: 2,
      },
      Shape {
        name: Some("B".to_owned()),
        face_offset: 2,
        length: 1,
      },
    ]
  );
}

#[test]
fn test_empty_groups_and_leading_region() {
  let set = parse_str(
    "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\ng empty\ng\ng full\nf 1 2 3\nf 3 2 1\no trailing\n",
    true,
  );
  assert_eq!(
    set.shapes,
    vec![
      Shape {
        name: None,
        face_offset: 0,
        length: 1,
      },
      Shape {
        name: Some("full".to_owned()),
        face_offset: 1,
        length: 2,
      },
    ]
  );
}

#[test]
fn test_relative_indices() {
  let set = parse_str(
    "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvn 0 0 1\n\
     f -3/-2/-1 -2/-1/-1 -1//-1\nv 5 5 5\nf -4 -3 -1\n",
    true,
  );
  let a = &set.attrib;
  assert_eq!(
    a.faces[..3],
    [
      FaceVertex { v: 0, vt: Some(0), vn: Some(0) },
      FaceVertex { v: 1, vt: Some(1), vn: Some(0) },
      FaceVertex { v: 2, vt: None, vn: Some(0) },
    ]
  );
  // Relative to the four vertices defined by then.
  let v: Vec<u32> = a.faces[3..].iter().map(|f| f.v).collect();
  assert_eq!(v, vec![0, 1, 3]);
}

#[test]
fn test_quads_with_and_without_triangulation() {
  let input = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\nf 1 2 3\n";

  let tri = parse_str(input, true);
  assert_eq!(tri.attrib.faces.len(), 9);
  assert_eq!(tri.attrib.face_num_verts, vec![3, 3, 3]);
  assert_eq!(tri.attrib.material_ids, vec![-1, -1, -1]);
  assert_eq!(tri.shapes[0].length, 3);

  let poly = parse_str(input, false);
  assert_eq!(poly.attrib.faces.len(), 7);
  assert_eq!(poly.attrib.face_num_verts, vec![4, 3]);
  assert_eq!(poly.attrib.face_corner_offsets(), vec![0, 4]);
}

#[test]
fn test_materials_are_resolved() {
  use crate::resource::ResourceMap;

  let mut res = ResourceMap::new();
  res.insert(
    "models/cube.mtl",
    "newmtl red\nKd 1 0 0\nnewmtl green\nKd 0 1 0\n",
  );
  let options = ObjOptions {
    triangulate: true,
    working_dir: "models".to_owned(),
  };
  let input = "\
mtllib cube.mtl
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3
usemtl green
f 1 2 3 4
usemtl missing
f 1 2 3
usemtl red
f 4 3 2
";
  let set = parse(input, &options, &res).unwrap();
  assert_eq!(set.material_library.as_deref(), Some("cube.mtl"));
  assert_eq!(set.materials.len(), 2);
  assert_eq!(set.attrib.material_ids, vec![-1, 1, 1, -1, 0]);
}

#[test]
fn test_missing_material_library_is_not_fatal() {
  let set = parse_str("mtllib nowhere.mtl\nusemtl a\nv 0 0 0\nf 1 1 1\n", true);
  assert_eq!(set.material_library.as_deref(), Some("nowhere.mtl"));
  assert!(set.materials.is_empty());
  assert_eq!(set.attrib.material_ids, vec![-1]);
}

#[test]
fn test_cube() {
  let test_case = r#"
# Blender v2.71 (sub 0) OBJ File: 'cube.blend'
# www.blender.org
mtllib cube.mtl
o Cube
v 1.000000 -1.000000 -1.000000
v 1.000000 -1.000000 1.000000
v -1.000000 -1.000000 1.000000
v -1.000000 -1.000000 -1.000000
v 1.000000 1.000000 -0.999999
v 0.999999 1.000000 1.000001
v -1.000000 1.000000 1.000000
v -1.000000 1.000000 -1.000000
vt 1.004952 0.498633
vt 0.754996 0.498236
vt 0.755393 0.248279
vt 1.005349 0.248677
vt 0.255083 0.497442
vt 0.255480 0.247485
vt 0.505437 0.247882
vt 0.505039 0.497839
vt 0.754598 0.748193
vt 0.504642 0.747795
vt 0.505834 -0.002074
vt 0.755790 -0.001677
vt 0.005127 0.497044
vt 0.005524 0.247088
usemtl Material
s off
f 1/1 2/2 3/3 4/4
f 5/5 8/6 7/7 6/8
f 1/9 5/10 6/8 2/2
f 2/2 6/8 7/7 3/3
f 3/3 7/7 8/11 4/12
f 5/5 1/13 4/14 8/6
"#;

  let set = parse_str(test_case, true);
  let a = &set.attrib;
  assert_eq!(a.vertices.len(), 8);
  assert_eq!(a.texcoords.len(), 14);
  assert!(a.normals.is_empty());
  assert_eq!(a.vertices[5], [0.999999, 1.0, 1.000001]);
  assert_eq!(a.texcoords[13], [0.005524, 0.247088]);
  assert_eq!(a.num_faces(), 12);
  assert_eq!(a.faces.len(), 36);
  assert_eq!(
    a.faces[..6],
    [
      FaceVertex { v: 0, vt: Some(0), vn: None },
      FaceVertex { v: 1, vt: Some(1), vn: None },
      FaceVertex { v: 2, vt: Some(2), vn: None },
      FaceVertex { v: 0, vt: Some(0), vn: None },
      FaceVertex { v: 2, vt: Some(2), vn: None },
      FaceVertex { v: 3, vt: Some(3), vn: None },
    ]
  );
  assert_eq!(
    set.shapes,
    vec![Shape {
      name: Some("Cube".to_owned()),
      face_offset: 0,
      length: 12,
    }]
  );
}

#[test]
fn test_empty_input_is_rejected() {
  use crate::resource::NoResources;

  let r = parse("", &ObjOptions::default(), &NoResources);
  assert!(matches!(r, Err(Error::InvalidParameter(_))));
}

#[test]
fn test_bare_group_closes_shape() {
  let set = parse_str("v 0 0 0\nv 1 0 0\nv 0 1 0\no body\nf 1 2 3\ng\nf 3 2 1\n", true);
  assert_eq!(
    set.shapes,
    vec![
      Shape {
        name: Some("body".to_owned()),
        face_offset: 0,
        length: 1,
      },
      Shape {
        name: None,
        face_offset: 1,
        length: 1,
      },
    ]
  );
}
