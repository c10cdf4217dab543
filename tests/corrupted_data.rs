extern crate meshload;
extern crate proptest;

use meshload::obj::{self, fix_index, ObjOptions};
use meshload::{anim, iqm, mtl, Error, NoResources};
use proptest::prelude::*;

fn init_logging() {
  let _ = env_logger::builder().is_test(true).try_init();
}

proptest! {
  #[test]
  fn obj_tolerates_arbitrary_text(s in "[ -~\n]{1,200}") {
    init_logging();
    let result = obj::parse(&s, &ObjOptions::default(), &NoResources);
    prop_assert!(result.is_ok());
  }

  #[test]
  fn mtl_tolerates_arbitrary_text(s in "[ -~\n]{0,200}") {
    let set = mtl::parse(&s);
    prop_assert!(set.materials.len() <= s.matches("newmtl").count());
  }

  #[test]
  fn iqm_never_panics_on_arbitrary_bytes(bytes in proptest::collection::vec(any::<u8>(), 1..512)) {
    let _ = iqm::load_iqm(&bytes);
    let _ = anim::load_iqm_animations(&bytes);
  }

  #[test]
  fn iqm_never_panics_on_corrupted_headers(tail in proptest::collection::vec(any::<u8>(), 0..512)) {
    let mut bytes = iqm::MAGIC.to_vec();
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&tail);
    match iqm::load_iqm(&bytes) {
      Ok(_) | Err(Error::MalformedInput(_)) | Err(Error::Allocation(_)) => {}
      Err(err) => prop_assert!(false, "unexpected error {}", err),
    }
    let _ = anim::load_iqm_animations(&bytes);
  }

  #[test]
  fn fan_triangulation_emits_n_minus_two_triangles(n in 3usize..12) {
    let corners: Vec<String> = (1..=n).map(|i| i.to_string()).collect();
    let mut text = String::new();
    for _ in 0..n {
      text.push_str("v 0 0 0\n");
    }
    text.push_str(&format!("f {}\n", corners.join(" ")));

    let set = obj::parse(&text, &ObjOptions::default(), &NoResources).unwrap();
    prop_assert_eq!(set.attrib.num_faces(), n - 2);
    prop_assert_eq!(set.attrib.faces.len(), 3 * (n - 2));
    prop_assert!(set.attrib.face_num_verts.iter().all(|&k| k == 3));
  }

  #[test]
  fn relative_indices_count_back_from_the_end(count in 1usize..10_000, back in 1i32..10_000) {
    prop_assume!(back as usize <= count);
    prop_assert_eq!(fix_index(-back, count) as usize, count - back as usize);
    prop_assert_eq!(fix_index(back, count), back as u32 - 1);
  }

  #[test]
  fn every_newmtl_yields_a_material(k in 0usize..20) {
    let text: String = (0..k).map(|i| format!("newmtl m{}\nKd 1 1 1\n", i)).collect();
    let set = mtl::parse(&text);
    prop_assert_eq!(set.materials.len(), k);
    for (i, material) in set.materials.iter().enumerate() {
      prop_assert_eq!(set.id_of(&material.name), Some(i as u32));
    }
  }
}

#[test]
fn empty_inputs_are_invalid() {
  assert!(matches!(
    obj::parse("", &ObjOptions::default(), &NoResources),
    Err(Error::InvalidParameter(_))
  ));
  assert!(matches!(iqm::load_iqm(&[]), Err(Error::InvalidParameter(_))));
  assert!(matches!(
    anim::load_iqm_animations(&[]),
    Err(Error::InvalidParameter(_))
  ));
}
