//! A parser for Wavefront's `.mtl` file format, for storing information about
//! the material of which a 3D mesh is composed.
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::lex::{split_lines, Lexer};
use crate::resource::ResourceLoader;
use crate::util::{fuzzy_cmp, fuzzy_cmp_slice, OrderingExt, EPSILON};

/// A set of materials in one `.mtl` file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MtlSet {
  /// Materials in file order.
  pub materials: Vec<Material>,
  /// Position of each material in `materials`, by name.
  pub name_index: HashMap<String, u32>,
}

impl MtlSet {
  /// Looks up a material id by name.
  pub fn id_of(&self, name: &str) -> Option<u32> {
    self.name_index.get(name).copied()
  }
}

/// A single material that can be applied to any face. They are generally
/// applied by using the Phong shading model.
#[derive(Clone, Debug)]
#[allow(missing_docs)]
pub struct Material {
  pub name: String,

  pub ambient: [f32; 3],
  pub diffuse: [f32; 3],
  pub specular: [f32; 3],
  pub transmittance: [f32; 3],
  pub emission: [f32; 3],
  /// Index of refraction (`Ni`).
  pub ior: f32,
  /// Phong specular exponent (`Ns`).
  pub shininess: f32,
  /// Opacity, `1` is opaque. Set by `d`, or by `Tr` as `1 - Tr`.
  pub dissolve: f32,
  pub illum: i32,

  pub ambient_texname: Option<String>,
  pub diffuse_texname: Option<String>,
  pub specular_texname: Option<String>,
  pub specular_highlight_texname: Option<String>,
  pub bump_texname: Option<String>,
  pub alpha_texname: Option<String>,
  pub displacement_texname: Option<String>,
}

impl Default for Material {
  fn default() -> Material {
    Material {
      name: String::new(),
      ambient: [0.; 3],
      diffuse: [0.; 3],
      specular: [0.; 3],
      transmittance: [0.; 3],
      emission: [0.; 3],
      ior: 1.,
      shininess: 1.,
      dissolve: 1.,
      illum: 0,
      ambient_texname: None,
      diffuse_texname: None,
      specular_texname: None,
      specular_highlight_texname: None,
      bump_texname: None,
      alpha_texname: None,
      displacement_texname: None,
    }
  }
}

impl Material {
  /// A default material carrying the given name.
  pub fn named<S: Into<String>>(name: S) -> Material {
    Material {
      name: name.into(),
      ..Material::default()
    }
  }

  fn texture_names(&self) -> [&Option<String>; 7] {
    [
      &self.ambient_texname,
      &self.diffuse_texname,
      &self.specular_texname,
      &self.specular_highlight_texname,
      &self.bump_texname,
      &self.alpha_texname,
      &self.displacement_texname,
    ]
  }
}

impl PartialEq for Material {
  fn eq(&self, other: &Material) -> bool {
    self.partial_cmp(other) == Some(Ordering::Equal)
  }
}

impl PartialOrd for Material {
  fn partial_cmp(&self, other: &Material) -> Option<Ordering> {
    Some(
      self
        .name
        .cmp(&other.name)
        .lexico(|| fuzzy_cmp_slice(&self.ambient, &other.ambient))
        .lexico(|| fuzzy_cmp_slice(&self.diffuse, &other.diffuse))
        .lexico(|| fuzzy_cmp_slice(&self.specular, &other.specular))
        .lexico(|| fuzzy_cmp_slice(&self.transmittance, &other.transmittance))
        .lexico(|| fuzzy_cmp_slice(&self.emission, &other.emission))
        .lexico(|| fuzzy_cmp(self.ior, other.ior, EPSILON))
        .lexico(|| fuzzy_cmp(self.shininess, other.shininess, EPSILON))
        .lexico(|| fuzzy_cmp(self.dissolve, other.dissolve, EPSILON))
        .lexico(|| self.illum.cmp(&other.illum))
        .lexico(|| self.texture_names().cmp(&other.texture_names())),
    )
  }
}

/// The state carried from one line to the next.
#[derive(Default)]
struct Accumulator {
  set: MtlSet,
  current: Option<Material>,
}

impl Accumulator {
  fn flush(&mut self) {
    if let Some(material) = self.current.take() {
      self.set.materials.push(material);
    }
  }

  fn newmtl(mut self, lexer: &mut Lexer<'_>) -> Accumulator {
    self.flush();

    let name = lexer
      .next_word()
      .map(|w| String::from_utf8_lossy(w).into_owned())
      .unwrap_or_default();
    // Later duplicates shadow earlier ones.
    self
      .set
      .name_index
      .insert(name.clone(), self.set.materials.len() as u32);
    self.current = Some(Material::named(name));
    self
  }

  fn line(mut self, line: &[u8]) -> Accumulator {
    let mut lexer = Lexer::new(line);
    if lexer.is_comment() {
      return self;
    }
    let tag = match lexer.next_word() {
      Some(tag) => tag,
      None => return self,
    };
    if tag == b"newmtl" {
      return self.newmtl(&mut lexer);
    }

    // Properties before the first `newmtl` have no material to land in.
    match self.current.as_mut() {
      Some(material) => apply_property(material, tag, &mut lexer),
      None => log::trace!("mtl: `{}` outside of any material", String::from_utf8_lossy(tag)),
    }
    self
  }

  fn finish(mut self) -> MtlSet {
    self.flush();
    self.set
  }
}

fn parse_color(lexer: &mut Lexer<'_>) -> [f32; 3] {
  let r = lexer.next_f32();
  let g = lexer.next_f32();
  let b = lexer.next_f32();
  [r, g, b]
}

fn parse_texname(lexer: &mut Lexer<'_>) -> Option<String> {
  Some(lexer.rest_string())
}

fn apply_property(m: &mut Material, tag: &[u8], lexer: &mut Lexer<'_>) {
  match tag {
    b"Ka" => m.ambient = parse_color(lexer),
    b"Kd" => m.diffuse = parse_color(lexer),
    b"Ks" => m.specular = parse_color(lexer),
    b"Kt" => m.transmittance = parse_color(lexer),
    b"Ke" => m.emission = parse_color(lexer),
    b"Ni" => m.ior = lexer.next_f32(),
    b"Ns" => m.shininess = lexer.next_f32(),
    b"illum" => m.illum = lexer.next_i32(),
    b"d" => m.dissolve = lexer.next_f32(),
    // Tr is assumed to be in [0, 1].
    b"Tr" => m.dissolve = 1. - lexer.next_f32(),
    b"map_Ka" => m.ambient_texname = parse_texname(lexer),
    b"map_Kd" => m.diffuse_texname = parse_texname(lexer),
    b"map_Ks" => m.specular_texname = parse_texname(lexer),
    b"map_Ns" => m.specular_highlight_texname = parse_texname(lexer),
    b"map_bump" | b"bump" => m.bump_texname = parse_texname(lexer),
    b"map_d" => m.alpha_texname = parse_texname(lexer),
    b"disp" => m.displacement_texname = parse_texname(lexer),
    _ => log::trace!("mtl: ignoring `{}`", String::from_utf8_lossy(tag)),
  }
}

/// Parses a wavefront `.mtl` file. This never fails: unknown directives and
/// malformed values are skipped or defaulted, and an empty buffer simply has
/// no materials.
pub fn parse<B: AsRef<[u8]>>(input: B) -> MtlSet {
  let buf = input.as_ref();
  let lines = match split_lines(buf) {
    Ok(lines) => lines,
    Err(_) => return MtlSet::default(),
  };

  let set = lines
    .iter()
    .fold(Accumulator::default(), |acc, span| acc.line(span.slice(buf)))
    .finish();

  log::debug!("mtl: parsed {} materials", set.materials.len());
  set
}

/// Fetches `file` through the resource collaborator and parses it.
pub fn load<R>(resources: &R, file: &str, working_dir: &str) -> Result<MtlSet>
where
  R: ResourceLoader + ?Sized,
{
  let data = resources
    .load(file, working_dir)
    .map_err(|err| Error::FileOperation {
      file: file.to_owned(),
      reason: err.to_string(),
    })?;
  Ok(parse(data))
}

#[test]
fn test_parse() {
  let test_case = r#"
# Blender MTL File: 'None'
# Material Count: 2

# name
newmtl Material
# Phong specular coefficient
Ns 96.078431
# ambient color (weighted)
Ka 0.000000 0.000000 0.000000
# diffuse color (weighted)
Kd 0.640000 0.640000 0.640000
# dissolve factor (weighted)
Ks 0.500000 0.500000 0.500000
# emissive color (weighted)
Ke 0.100000 0.100000 0.100000
# optical density (refraction)
Ni 1.450000
# alpha
d 1.000000
# illumination: 0=ambient, 1=ambient+diffuse, 2=ambient+diffuse+specular
illum 2

newmtl None
Ns 0
# ambient
Ka 0.000000 0.000000 0.000000
# diffuse
Kd 0.8 0.8 0.8
# specular
Ks 0.8 0.8 0.8
d 1
illum 2"#;

  let set = parse(test_case);

  let expected = vec![
    Material {
      name: "Material".to_owned(),
      shininess: 96.078431,
      diffuse: [0.64, 0.64, 0.64],
      specular: [0.5, 0.5, 0.5],
      emission: [0.1, 0.1, 0.1],
      ior: 1.45,
      dissolve: 1.0,
      illum: 2,
      ..Material::default()
    },
    Material {
      name: "None".to_owned(),
      shininess: 0.0,
      diffuse: [0.8, 0.8, 0.8],
      specular: [0.8, 0.8, 0.8],
      illum: 2,
      ..Material::default()
    },
  ];

  assert_eq!(set.materials, expected);
  assert_eq!(set.id_of("Material"), Some(0));
  assert_eq!(set.id_of("None"), Some(1));
  assert_eq!(set.id_of("Missing"), None);
}

#[test]
fn test_cube() {
  let test_case = "\
newmtl Material\r
Ns 96.078431\r
Kd 0.640000 0.640000 0.640000\r
Kt 0.1 0.2 0.3\r
map_Kd cube-uv-num.png\r
map_Ka amb.png\r
map_Ks spec.png\r
map_Ns hi.png\r
bump -bm 0.5 normal map.png\r
map_d alpha.png\r
disp height.png\r
";

  let set = parse(test_case);
  assert_eq!(set.materials.len(), 1);
  let m = &set.materials[0];
  assert_eq!(m.transmittance, [0.1, 0.2, 0.3]);
  assert_eq!(m.diffuse_texname.as_deref(), Some("cube-uv-num.png"));
  assert_eq!(m.ambient_texname.as_deref(), Some("amb.png"));
  assert_eq!(m.specular_texname.as_deref(), Some("spec.png"));
  assert_eq!(m.specular_highlight_texname.as_deref(), Some("hi.png"));
  assert_eq!(m.bump_texname.as_deref(), Some("-bm 0.5 normal map.png"));
  assert_eq!(m.alpha_texname.as_deref(), Some("alpha.png"));
  assert_eq!(m.displacement_texname.as_deref(), Some("height.png"));
}

#[test]
fn test_transparency_directives() {
  let tr = parse("newmtl a\nTr 0.3\n");
  assert!((tr.materials[0].dissolve - 0.7).abs() < EPSILON);

  let d = parse("newmtl a\nd 0.7\n");
  assert!((d.materials[0].dissolve - 0.7).abs() < EPSILON);

  let map_bump = parse("newmtl a\nmap_bump n.png\n");
  assert_eq!(map_bump.materials[0].bump_texname.as_deref(), Some("n.png"));
}

#[test]
fn test_properties_before_first_newmtl_are_dropped() {
  let set = parse("Kd 1 0 0\nillum 4\nnewmtl first\nnewmtl second\nKd 0 1 0\n");
  assert_eq!(set.materials.len(), 2);
  assert_eq!(set.materials[0], Material::named("first"));
  assert_eq!(set.materials[1].diffuse, [0., 1., 0.]);
}

#[test]
fn test_malformed_values_default() {
  let set = parse("newmtl a\nKd x 1\nNs ?\nwhatever 1 2 3\n");
  let m = &set.materials[0];
  assert_eq!(m.diffuse, [0., 1., 0.]);
  assert_eq!(m.shininess, 0.);
}

#[test]
fn test_duplicate_names_point_at_last() {
  let set = parse("newmtl a\nnewmtl b\nnewmtl a\n");
  assert_eq!(set.materials.len(), 3);
  assert_eq!(set.id_of("a"), Some(2));
}

#[test]
fn test_load_failure_is_file_operation() {
  use crate::resource::NoResources;

  match load(&NoResources, "missing.mtl", "dir") {
    Err(Error::FileOperation { file, .. }) => assert_eq!(file, "missing.mtl"),
    other => panic!("unexpected {:?}", other),
  }
}

#[test]
fn test_bare_newmtl_starts_unnamed_material() {
  let set = parse("newmtl\nKd 1 0 0\nnewmtl red\n");
  assert_eq!(set.materials.len(), 2);
  assert_eq!(set.materials[0].name, "");
  assert_eq!(set.materials[0].diffuse, [1., 0., 0.]);
  assert_eq!(set.id_of(""), Some(0));
}
